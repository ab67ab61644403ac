//! Directory login: locate the patron entry, bind as it, map its attributes.

use std::sync::Arc;

use async_trait::async_trait;
use ldap3::ldap_escape;
use stacks_core::auth::{require_credentials, Authenticator};
use stacks_core::config::LdapConfig;
use stacks_core::db::repository::PatronRepository;
use stacks_core::error::{Result, StacksError};
use stacks_core::models::patron::{Patron, PatronField};
use tracing::{debug, info, warn};

use crate::session::{Ldap3Connector, LdapConnector, LdapEntry, LdapSession};

/// Required settings, checked once at construction.
#[derive(Debug, Clone)]
struct Settings {
    basedn: String,
    username_attr: String,
    service_bind: Option<(String, String)>,
}

pub struct LdapAuthenticator {
    settings: Settings,
    mapping: Vec<(PatronField, String)>,
    connector: Arc<dyn LdapConnector>,
    repository: Arc<dyn PatronRepository>,
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StacksError::Config(format!("missing LDAP setting: ldap.{key}")))
}

impl LdapAuthenticator {
    pub fn new(config: &LdapConfig, repository: Arc<dyn PatronRepository>) -> Result<Self> {
        let host = required(&config.host, "host")?;
        let port = config
            .port
            .ok_or_else(|| StacksError::Config("missing LDAP setting: ldap.port".into()))?;
        let connector = Arc::new(Ldap3Connector::new(host, port, config.tls_verify));
        Self::with_connector(config, connector, repository)
    }

    pub fn with_connector(
        config: &LdapConfig,
        connector: Arc<dyn LdapConnector>,
        repository: Arc<dyn PatronRepository>,
    ) -> Result<Self> {
        required(&config.host, "host")?;
        if config.port.is_none() {
            return Err(StacksError::Config("missing LDAP setting: ldap.port".into()));
        }
        let basedn = required(&config.basedn, "basedn")?.to_string();
        let username_attr = required(&config.username, "username")?.to_string();

        let service_bind = match (&config.bind_username, &config.bind_password) {
            (Some(user), Some(password)) if !user.trim().is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        };

        let mapping = PatronField::ALL
            .iter()
            .filter_map(|field| {
                attribute_for(config, *field)
                    .map(str::trim)
                    .filter(|attr| !attr.is_empty())
                    .map(|attr| (*field, attr.to_string()))
            })
            .collect();

        Ok(Self {
            settings: Settings {
                basedn,
                username_attr,
                service_bind,
            },
            mapping,
            connector,
            repository,
        })
    }

    async fn login(
        &self,
        session: &mut dyn LdapSession,
        username: &str,
        password: &str,
    ) -> Result<Patron> {
        if let Some((dn, secret)) = &self.settings.service_bind {
            if !session.bind(dn, secret).await? {
                return Err(StacksError::Backend(format!(
                    "LDAP service bind as {dn} rejected"
                )));
            }
        }

        let filter = format!(
            "({}={})",
            self.settings.username_attr,
            ldap_escape(username)
        );
        let entries = session
            .search(&self.settings.basedn, &filter, &["dn"])
            .await?;
        let Some(found) = entries.into_iter().next() else {
            debug!(filter = %filter, "no LDAP entry for patron");
            return Err(StacksError::InvalidCredentials);
        };

        if password.is_empty() || !session.bind(&found.dn, password).await? {
            debug!(dn = %found.dn, "LDAP rejected patron bind");
            return Err(StacksError::InvalidCredentials);
        }

        // Attributes may only be readable once bound as the patron.
        let entry = session
            .search(&self.settings.basedn, &filter, &["*"])
            .await?
            .into_iter()
            .next()
            .unwrap_or(found);

        Ok(self.map_entry(username, &entry))
    }

    fn map_entry(&self, username: &str, entry: &LdapEntry) -> Patron {
        let mut patron = Patron::new(username);
        for (field, attr) in &self.mapping {
            if let Some(value) = entry.first_value(attr) {
                patron.set(*field, value);
            }
        }
        patron
    }
}

fn attribute_for(config: &LdapConfig, field: PatronField) -> Option<&str> {
    let attr = match field {
        PatronField::Firstname => &config.firstname,
        PatronField::Lastname => &config.lastname,
        PatronField::Email => &config.email,
        PatronField::CatUsername => &config.cat_username,
        PatronField::CatPassword => &config.cat_password,
        PatronField::College => &config.college,
        PatronField::Major => &config.major,
    };
    attr.as_deref()
}

#[async_trait]
impl Authenticator for LdapAuthenticator {
    fn method(&self) -> &'static str {
        "ldap"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Patron> {
        require_credentials(username, password)?;

        let mut session = self.connector.connect().await?;
        let outcome = self.login(session.as_mut(), username, password).await;
        if let Err(e) = session.unbind().await {
            warn!(error = %e, "LDAP unbind failed");
        }
        let patron = outcome?;

        let stored = self.repository.upsert_patron(&patron).await?;
        info!(username = %stored.username, "patron authenticated via LDAP");
        Ok(stored)
    }
}
