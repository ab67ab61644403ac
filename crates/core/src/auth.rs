//! Patron authentication front door shared by every backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::db::repository::PatronRepository;
use crate::error::{Result, StacksError};
use crate::ils::connection::Connection;
use crate::ils::types::IlsPatron;
use crate::models::patron::{Patron, PatronField};

/// Checks a username/password pair and returns the stored patron.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Backend identifier used in logs.
    fn method(&self) -> &'static str;

    /// On success the patron has been written to the patron store.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Patron>;
}

/// Reject blank credentials before any backend is contacted.
pub fn require_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.trim().is_empty() {
        return Err(StacksError::InvalidCredentials);
    }
    Ok(())
}

/// Authenticates against the ILS through the connection facade.
pub struct IlsAuthenticator {
    connection: Arc<Connection>,
    repository: Arc<dyn PatronRepository>,
}

impl IlsAuthenticator {
    pub fn new(connection: Arc<Connection>, repository: Arc<dyn PatronRepository>) -> Self {
        Self {
            connection,
            repository,
        }
    }
}

#[async_trait]
impl Authenticator for IlsAuthenticator {
    fn method(&self) -> &'static str {
        "ils"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Patron> {
        require_credentials(username, password)?;

        let ils_patron = self
            .connection
            .patron_login(username, password)
            .await?
            .ok_or(StacksError::InvalidCredentials)?;
        debug!(username = %username, ils_id = %ils_patron.id, "ILS accepted patron login");

        let patron = patron_from_ils(username, &ils_patron);
        let stored = self.repository.upsert_patron(&patron).await?;
        info!(username = %stored.username, driver = %self.connection.driver_name(), "patron authenticated");
        Ok(stored)
    }
}

fn patron_from_ils(username: &str, ils: &IlsPatron) -> Patron {
    let mut patron = Patron::new(username);
    patron.set(PatronField::Firstname, &ils.firstname);
    patron.set(PatronField::Lastname, &ils.lastname);
    patron.set(PatronField::CatUsername, &ils.cat_username);
    patron.set(PatronField::CatPassword, &ils.cat_password);
    patron.set(PatronField::Email, ils.email.as_deref().unwrap_or_default());
    patron.set(PatronField::College, ils.college.as_deref().unwrap_or_default());
    patron.set(PatronField::Major, ils.major.as_deref().unwrap_or_default());
    patron
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::db::sqlite::SqliteRepository;
    use crate::db::DatabasePool;
    use crate::error::ErrorKind;
    use crate::ils::registry::DriverRegistry;
    use crate::models::patron::FIELD_PLACEHOLDER;

    async fn authenticator(driver: &str) -> (IlsAuthenticator, Arc<SqliteRepository>) {
        let DatabasePool::Sqlite(pool) = DatabasePool::new_sqlite_memory().await.unwrap();
        let repository = Arc::new(SqliteRepository::new(pool));
        let config = CatalogConfig {
            driver: driver.into(),
            ..CatalogConfig::default()
        };
        let connection = Connection::new(&config, &DriverRegistry::with_builtin()).unwrap();
        let auth = IlsAuthenticator::new(Arc::new(connection), repository.clone());
        (auth, repository)
    }

    #[test]
    fn blank_credentials_rejected() {
        assert!(require_credentials("", "pw").is_err());
        assert!(require_credentials("jdoe", "  ").is_err());
        assert!(require_credentials("jdoe", "pw").is_ok());
    }

    #[tokio::test]
    async fn successful_login_stores_patron() {
        let (auth, repository) = authenticator("demo").await;
        let patron = auth.authenticate("reader", "pw").await.unwrap();
        assert!(patron.id.is_some());
        assert_eq!(patron.firstname, "Lib");
        assert_eq!(patron.cat_username, "reader");
        assert_eq!(patron.cat_password, "pw");
        assert_eq!(patron.email, "reader@library.example.org");
        assert_eq!(patron.college, FIELD_PLACEHOLDER);

        let stored = repository
            .get_patron_by_username("reader")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, patron.id);
    }

    #[tokio::test]
    async fn rejected_login_is_invalid_credentials() {
        let (auth, repository) = authenticator("sample").await;
        let err = auth.authenticate("sample", "wrong").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert!(repository
            .get_patron_by_username("sample")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn noils_never_authenticates() {
        let (auth, _) = authenticator("noils").await;
        let err = auth.authenticate("jdoe", "pw").await.unwrap_err();
        assert!(matches!(err, StacksError::InvalidCredentials));
    }
}
