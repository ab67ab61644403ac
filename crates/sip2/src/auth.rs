//! Patron login through SIP2 patron status.

use std::sync::Arc;

use async_trait::async_trait;
use stacks_core::auth::{require_credentials, Authenticator};
use stacks_core::config::Sip2Config;
use stacks_core::db::repository::PatronRepository;
use stacks_core::error::{Result, StacksError};
use stacks_core::models::patron::{Patron, PatronField};
use tracing::{debug, info, warn};

use crate::client::Sip2Client;
use crate::message::{Sip2Request, Sip2Response, ACS_STATUS, PATRON_STATUS_RESPONSE};
use crate::transport::{Sip2Connector, TcpConnector};

/// Authenticates patrons with an SC status / patron status exchange.
pub struct Sip2Authenticator {
    config: Sip2Config,
    connector: Arc<dyn Sip2Connector>,
    repository: Arc<dyn PatronRepository>,
}

impl Sip2Authenticator {
    pub fn new(config: &Sip2Config, repository: Arc<dyn PatronRepository>) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector::new(config)), repository)
    }

    pub fn with_connector(
        config: &Sip2Config,
        connector: Arc<dyn Sip2Connector>,
        repository: Arc<dyn PatronRepository>,
    ) -> Self {
        Self {
            config: config.clone(),
            connector,
            repository,
        }
    }

    async fn patron_status(
        &self,
        client: &mut Sip2Client,
        username: &str,
        password: &str,
    ) -> Result<Sip2Response> {
        let status = client.send(&Sip2Request::sc_status()).await?;
        if status.command() != ACS_STATUS {
            return Err(StacksError::Backend(format!(
                "unexpected reply {} to SC status",
                status.command()
            )));
        }
        let institution = status.field("AO").unwrap_or_default();
        debug!(
            institution = %institution,
            terminal = %status.field("AN").unwrap_or_default(),
            "SIP2 server online"
        );

        let terminal_password = self.config.terminal_password.as_deref().unwrap_or_default();
        let request = Sip2Request::patron_status(institution, username, terminal_password, password);
        let response = client.send(&request).await?;
        if response.command() != PATRON_STATUS_RESPONSE {
            return Err(StacksError::Backend(format!(
                "unexpected reply {} to patron status",
                response.command()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Authenticator for Sip2Authenticator {
    fn method(&self) -> &'static str {
        "sip2"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Patron> {
        require_credentials(username, password)?;

        let transport = self.connector.connect().await?;
        let mut client = Sip2Client::new(transport, &self.config);
        let outcome = self.patron_status(&mut client, username, password).await;
        if let Err(e) = client.close().await {
            warn!(error = %e, "SIP2 disconnect failed");
        }
        let response = outcome?;

        // Only a literal "Y" counts; "N", blanks, and missing fields all reject.
        let valid_patron = response.field("BL") == Some("Y");
        let valid_password = response.field("CQ") == Some("Y");
        if !(valid_patron && valid_password) {
            debug!(
                username = %username,
                valid_patron,
                valid_password,
                screen_messages = ?response.fields("AF"),
                "SIP2 rejected patron"
            );
            return Err(StacksError::InvalidCredentials);
        }

        let patron = patron_from_response(&response, username, password);
        let stored = self.repository.upsert_patron(&patron).await?;
        info!(username = %stored.username, "patron authenticated via SIP2");
        Ok(stored)
    }
}

fn patron_from_response(response: &Sip2Response, username: &str, password: &str) -> Patron {
    let login = response
        .field("AA")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(username);
    let mut patron = Patron::new(login);

    // Personal name arrives as "Last, First".
    let name = response.field("AE").unwrap_or_default();
    match name.split_once(',') {
        Some((last, first)) => {
            patron.set(PatronField::Lastname, last.trim());
            patron.set(PatronField::Firstname, first.trim());
        }
        None => patron.set(PatronField::Lastname, name.trim()),
    }

    patron.set(PatronField::Email, response.field("BE").unwrap_or_default());
    patron.set(PatronField::CatUsername, username);
    patron.set(PatronField::CatPassword, password);
    patron
}
