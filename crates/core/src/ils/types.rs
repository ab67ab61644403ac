//! Records exchanged between the connection facade and ILS drivers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Availability of one copy of a bibliographic record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemStatus {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub status: String,
    pub location: String,
    #[serde(default)]
    pub reserve: bool,
    pub callnumber: String,
    pub availability: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duedate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
}

/// A holdings line: status plus copy-level details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    #[serde(flatten)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub summary: Vec<String>,
    /// Whether the copy accepts item-level holds.
    #[serde(default)]
    pub is_holdable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseHistoryEntry {
    pub issue: String,
}

/// Patron as known to the ILS after a successful `patron_login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IlsPatron {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub cat_username: String,
    pub cat_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatronProfile {
    pub firstname: String,
    pub lastname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A checked-out item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub item_id: String,
    pub duedate: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub renew: u32,
    pub renewable: bool,
}

/// A hold currently placed by a patron.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hold {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub reqnum: String,
    pub location: String,
    pub create: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default)]
    pub available: bool,
}

/// Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fine {
    pub amount: i64,
    pub balance: i64,
    pub fine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duedate: Option<NaiveDate>,
    pub createdate: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldRequest {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub patron: IlsPatron,
    pub pickup_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_by: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Outcome reported by the ILS for an operation it accepted or refused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_message: Option<String>,
}

impl OperationResult {
    pub fn ok(status: &str) -> Self {
        Self {
            success: true,
            status: Some(status.to_string()),
            sys_message: None,
        }
    }

    pub fn failed(status: &str, sys_message: Option<String>) -> Self {
        Self {
            success: false,
            status: Some(status.to_string()),
            sys_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancelHoldsRequest {
    /// Opaque per-hold strings from `get_cancel_hold_details`.
    pub details: Vec<String>,
    pub patron: IlsPatron,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancelHoldsResult {
    pub count: usize,
    pub items: BTreeMap<String, OperationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenewRequest {
    /// Opaque per-loan strings from `get_renew_details`.
    pub details: Vec<String>,
    pub patron: IlsPatron,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenewStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_date: Option<NaiveDate>,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenewResult {
    /// Patron-level blocks that prevented every renewal.
    #[serde(default)]
    pub blocks: Vec<String>,
    pub details: BTreeMap<String, RenewStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordChange {
    pub patron: IlsPatron,
    pub old_password: String,
    pub new_password: String,
}
