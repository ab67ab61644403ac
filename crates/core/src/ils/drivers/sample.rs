//! Minimal driver for catalogs whose ILS only offers its own web pages for requests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Result, StacksError};
use crate::ils::types::{Hold, Holding, IlsPatron, ItemStatus, PurchaseHistoryEntry};
use crate::ils::{CancelHoldLinker, HoldLinker, IlsDriver};

const SAMPLE_CATALOG_URL: &str = "https://catalog.example.org";
const SAMPLE_USERNAME: &str = "sample";
const SAMPLE_PASSWORD: &str = "sample";

pub struct SampleDriver {
    base_url: String,
}

impl SampleDriver {
    pub const NAME: &'static str = "sample";

    pub fn new() -> Self {
        Self {
            base_url: SAMPLE_CATALOG_URL.to_string(),
        }
    }

    /// Override the ILS web catalog URL.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

impl Default for SampleDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IlsDriver for SampleDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_status(&self, id: &str) -> Result<Vec<ItemStatus>> {
        Ok(vec![ItemStatus {
            id: id.to_string(),
            item_id: None,
            status: "Available".to_string(),
            location: "3rd Floor Main Library".to_string(),
            reserve: false,
            callnumber: "A1234.567".to_string(),
            availability: true,
            duedate: None,
            barcode: None,
        }])
    }

    async fn get_holding(&self, id: &str, _patron: Option<&IlsPatron>) -> Result<Vec<Holding>> {
        let status = self.get_status(id).await?;
        Ok(status
            .into_iter()
            .map(|status| Holding {
                status,
                number: Some(1),
                notes: Vec::new(),
                summary: Vec::new(),
                is_holdable: true,
            })
            .collect())
    }

    async fn get_purchase_history(&self, _id: &str) -> Result<Vec<PurchaseHistoryEntry>> {
        Ok(Vec::new())
    }

    async fn patron_login(&self, username: &str, password: &str) -> Result<Option<IlsPatron>> {
        if username != SAMPLE_USERNAME || password != SAMPLE_PASSWORD {
            return Ok(None);
        }
        Ok(Some(IlsPatron {
            id: "1".to_string(),
            firstname: "Sample".to_string(),
            lastname: "Patron".to_string(),
            cat_username: username.to_string(),
            cat_password: password.to_string(),
            email: None,
            major: None,
            college: None,
        }))
    }

    fn as_hold_linker(&self) -> Option<&dyn HoldLinker> {
        Some(self)
    }

    fn as_cancel_hold_linker(&self) -> Option<&dyn CancelHoldLinker> {
        Some(self)
    }
}

impl HoldLinker for SampleDriver {
    fn hold_link(&self, id: &str, details: &BTreeMap<String, String>) -> Result<String> {
        if id.is_empty() {
            return Err(StacksError::Backend("hold link requires a record id".into()));
        }
        let mut link = format!("{}/hold?id={}", self.base_url, encode(id));
        if let Some(item) = details.get("item_id") {
            link.push_str(&format!("&item={}", encode(item)));
        }
        Ok(link)
    }
}

impl CancelHoldLinker for SampleDriver {
    fn cancel_hold_link(&self, hold: &Hold) -> Result<String> {
        Ok(format!(
            "{}/account/holds?cancel={}",
            self.base_url,
            encode(&hold.reqnum)
        ))
    }
}

/// Percent-encode everything outside the unreserved URL characters.
fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
