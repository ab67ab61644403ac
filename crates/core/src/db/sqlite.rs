use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{Result, StacksError};
use crate::models::patron::Patron;

use super::repository::PatronRepository;

/// SQLite-backed implementation of the repository traits.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn datetime_to_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StacksError::Serialization(format!("invalid timestamp {s:?}: {e}")))
}

fn row_to_patron(row: &SqliteRow) -> Result<Patron> {
    let created: String = row.try_get("created")?;
    Ok(Patron {
        id: Some(row.try_get("id")?),
        username: row.try_get("username")?,
        firstname: row.try_get("firstname")?,
        lastname: row.try_get("lastname")?,
        email: row.try_get("email")?,
        cat_username: row.try_get("cat_username")?,
        cat_password: row.try_get("cat_password")?,
        college: row.try_get("college")?,
        major: row.try_get("major")?,
        created: Some(str_to_datetime(&created)?),
    })
}

#[async_trait]
impl PatronRepository for SqliteRepository {
    async fn upsert_patron(&self, patron: &Patron) -> Result<Patron> {
        let created = patron.created.unwrap_or_else(Utc::now);

        sqlx::query(
            "INSERT INTO patrons (username, firstname, lastname, email, cat_username, cat_password, college, major, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(username) DO UPDATE SET
                firstname = excluded.firstname,
                lastname = excluded.lastname,
                email = excluded.email,
                cat_username = excluded.cat_username,
                cat_password = excluded.cat_password,
                college = excluded.college,
                major = excluded.major",
        )
        .bind(&patron.username)
        .bind(&patron.firstname)
        .bind(&patron.lastname)
        .bind(&patron.email)
        .bind(&patron.cat_username)
        .bind(&patron.cat_password)
        .bind(&patron.college)
        .bind(&patron.major)
        .bind(datetime_to_str(&created))
        .execute(&self.pool)
        .await?;

        debug!(username = %patron.username, "patron upserted");

        self.get_patron_by_username(&patron.username)
            .await?
            .ok_or_else(|| {
                StacksError::Backend(format!(
                    "patron {} missing after upsert",
                    patron.username
                ))
            })
    }

    async fn get_patron_by_username(&self, username: &str) -> Result<Option<Patron>> {
        let row = sqlx::query("SELECT * FROM patrons WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_patron).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;
    use crate::models::patron::{PatronField, FIELD_PLACEHOLDER};

    async fn setup() -> SqliteRepository {
        let pool = DatabasePool::new_sqlite_memory().await.unwrap();
        match pool {
            DatabasePool::Sqlite(p) => SqliteRepository::new(p),
        }
    }

    fn sample_patron() -> Patron {
        let mut patron = Patron::new("jdoe");
        patron.set(PatronField::Firstname, "Jane");
        patron.set(PatronField::Lastname, "Doe");
        patron.set(PatronField::CatUsername, "21234000123456");
        patron.set(PatronField::CatPassword, "1234");
        patron
    }

    #[tokio::test]
    async fn patron_insert_and_get() {
        let repo = setup().await;
        let stored = repo.upsert_patron(&sample_patron()).await.unwrap();

        assert!(stored.id.is_some());
        assert!(stored.created.is_some());
        assert_eq!(stored.firstname, "Jane");
        assert_eq!(stored.email, FIELD_PLACEHOLDER);

        let fetched = repo.get_patron_by_username("jdoe").await.unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn patron_upsert_updates_in_place() {
        let repo = setup().await;
        let first = repo.upsert_patron(&sample_patron()).await.unwrap();

        let mut changed = sample_patron();
        changed.set(PatronField::Email, "jane@example.org");
        changed.set(PatronField::Firstname, "Janet");
        let second = repo.upsert_patron(&changed).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created, first.created);
        assert_eq!(second.firstname, "Janet");
        assert_eq!(second.email, "jane@example.org");
    }

    #[tokio::test]
    async fn get_missing_patron_returns_none() {
        let repo = setup().await;
        assert!(repo.get_patron_by_username("nobody").await.unwrap().is_none());
    }
}
