use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value stored for patron fields a backend did not supply.
pub const FIELD_PLACEHOLDER: &str = " ";

/// A patron identity produced by an authentication backend.
///
/// Every text field is always populated: values a backend does not return are
/// set to [`FIELD_PLACEHOLDER`] so downstream consumers never see nulls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patron {
    /// Database row id; `None` until the patron has been stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub cat_username: String,
    pub cat_password: String,
    pub college: String,
    pub major: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Patron fields an authentication backend may map from its own attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatronField {
    Firstname,
    Lastname,
    Email,
    CatUsername,
    CatPassword,
    College,
    Major,
}

impl PatronField {
    pub const ALL: [PatronField; 7] = [
        PatronField::Firstname,
        PatronField::Lastname,
        PatronField::Email,
        PatronField::CatUsername,
        PatronField::CatPassword,
        PatronField::College,
        PatronField::Major,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatronField::Firstname => "firstname",
            PatronField::Lastname => "lastname",
            PatronField::Email => "email",
            PatronField::CatUsername => "cat_username",
            PatronField::CatPassword => "cat_password",
            PatronField::College => "college",
            PatronField::Major => "major",
        }
    }
}

impl Patron {
    /// Create a patron with every field except `username` set to the placeholder.
    pub fn new(username: &str) -> Self {
        Self {
            id: None,
            username: username.to_string(),
            firstname: FIELD_PLACEHOLDER.to_string(),
            lastname: FIELD_PLACEHOLDER.to_string(),
            email: FIELD_PLACEHOLDER.to_string(),
            cat_username: FIELD_PLACEHOLDER.to_string(),
            cat_password: FIELD_PLACEHOLDER.to_string(),
            college: FIELD_PLACEHOLDER.to_string(),
            major: FIELD_PLACEHOLDER.to_string(),
            created: None,
        }
    }

    /// Set a mapped field. Blank values fall back to the placeholder.
    pub fn set(&mut self, field: PatronField, value: &str) {
        let value = if value.trim().is_empty() {
            FIELD_PLACEHOLDER.to_string()
        } else {
            value.to_string()
        };
        *self.field_mut(field) = value;
    }

    pub fn get(&self, field: PatronField) -> &str {
        match field {
            PatronField::Firstname => &self.firstname,
            PatronField::Lastname => &self.lastname,
            PatronField::Email => &self.email,
            PatronField::CatUsername => &self.cat_username,
            PatronField::CatPassword => &self.cat_password,
            PatronField::College => &self.college,
            PatronField::Major => &self.major,
        }
    }

    fn field_mut(&mut self, field: PatronField) -> &mut String {
        match field {
            PatronField::Firstname => &mut self.firstname,
            PatronField::Lastname => &mut self.lastname,
            PatronField::Email => &mut self.email,
            PatronField::CatUsername => &mut self.cat_username,
            PatronField::CatPassword => &mut self.cat_password,
            PatronField::College => &mut self.college,
            PatronField::Major => &mut self.major,
        }
    }
}
