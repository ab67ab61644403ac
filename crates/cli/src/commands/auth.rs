use std::sync::Arc;

use stacks_core::auth::{Authenticator, IlsAuthenticator};
use stacks_core::config::{AuthMethod, StacksConfig};
use stacks_core::db::repository::PatronRepository;
use stacks_core::error::StacksError;
use stacks_core::ils::connection::Connection;
use stacks_core::ils::registry::DriverRegistry;
use stacks_core::models::patron::{Patron, FIELD_PLACEHOLDER};
use stacks_ldap::auth::LdapAuthenticator;
use stacks_sip2::auth::Sip2Authenticator;
use tracing::info;

/// Run the `auth` command: authenticate a patron and print the stored record.
pub async fn run(config_path: &str, username: &str, password: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let repository: Arc<dyn PatronRepository> = Arc::new(super::open_repository(&config).await?);
    let authenticator = build_authenticator(&config, repository)?;

    info!(method = authenticator.method(), username = %username, "authenticating patron");
    let patron = match authenticator.authenticate(username, password).await {
        Ok(patron) => patron,
        Err(e) => anyhow::bail!(failure_message(&e)),
    };
    println!("{}", serde_json::to_string_pretty(&redacted(patron))?);
    Ok(())
}

/// Printable copy of a stored patron; the catalog password is masked.
fn redacted(mut patron: Patron) -> Patron {
    if patron.cat_password != FIELD_PLACEHOLDER {
        patron.cat_password = "********".into();
    }
    patron
}

fn failure_message(err: &StacksError) -> String {
    if err.is_user_correctable() {
        "login rejected: check the username and password".into()
    } else {
        format!("login failed: {err}")
    }
}

/// Pick the backend named by `auth.method`.
pub fn build_authenticator(
    config: &StacksConfig,
    repository: Arc<dyn PatronRepository>,
) -> anyhow::Result<Box<dyn Authenticator>> {
    let authenticator: Box<dyn Authenticator> = match config.auth.method {
        AuthMethod::Ils => {
            let connection = Connection::new(&config.catalog, &DriverRegistry::with_builtin())?;
            Box::new(IlsAuthenticator::new(Arc::new(connection), repository))
        }
        AuthMethod::Sip2 => {
            let sip2 = config
                .sip2
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("[sip2] section is required when auth.method is sip2"))?;
            Box::new(Sip2Authenticator::new(sip2, repository))
        }
        AuthMethod::Ldap => {
            let ldap = config
                .ldap
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("[ldap] section is required when auth.method is ldap"))?;
            Box::new(LdapAuthenticator::new(ldap, repository)?)
        }
    };
    Ok(authenticator)
}
