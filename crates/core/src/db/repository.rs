use async_trait::async_trait;

use crate::error::Result;
use crate::models::patron::Patron;

/// Storage for patrons keyed by username.
#[async_trait]
pub trait PatronRepository: Send + Sync {
    /// Insert the patron, or update the existing row with the same username in place.
    ///
    /// Returns the stored record, including its row id and creation time.
    async fn upsert_patron(&self, patron: &Patron) -> Result<Patron>;
    async fn get_patron_by_username(&self, username: &str) -> Result<Option<Patron>>;
}
