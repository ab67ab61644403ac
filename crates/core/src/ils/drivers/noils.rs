//! Stand-in driver used while no ILS is reachable.

use async_trait::async_trait;

use crate::config::NoIlsConfig;
use crate::error::Result;
use crate::ils::types::{Holding, IlsPatron, ItemStatus, PurchaseHistoryEntry};
use crate::ils::IlsDriver;

/// Driver that answers every query without contacting an ILS.
///
/// Status and holdings lines are either empty or a configured placeholder,
/// logins always fail, and no optional capability is exposed.
pub struct NoIlsDriver {
    config: NoIlsConfig,
}

impl NoIlsDriver {
    pub const NAME: &'static str = "noils";

    pub fn new(config: &NoIlsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn placeholder_status(&self, id: &str) -> ItemStatus {
        ItemStatus {
            id: id.to_string(),
            item_id: None,
            status: self.config.status_text.clone(),
            location: self.config.location_text.clone(),
            reserve: false,
            callnumber: String::new(),
            availability: false,
            duedate: None,
            barcode: None,
        }
    }
}

#[async_trait]
impl IlsDriver for NoIlsDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_status(&self, id: &str) -> Result<Vec<ItemStatus>> {
        if self.config.use_status {
            Ok(vec![self.placeholder_status(id)])
        } else {
            Ok(Vec::new())
        }
    }

    async fn get_holding(&self, id: &str, _patron: Option<&IlsPatron>) -> Result<Vec<Holding>> {
        if !self.config.use_holdings {
            return Ok(Vec::new());
        }
        Ok(vec![Holding {
            status: self.placeholder_status(id),
            number: None,
            notes: Vec::new(),
            summary: Vec::new(),
            is_holdable: false,
        }])
    }

    async fn get_purchase_history(&self, _id: &str) -> Result<Vec<PurchaseHistoryEntry>> {
        Ok(Vec::new())
    }

    async fn patron_login(&self, _username: &str, _password: &str) -> Result<Option<IlsPatron>> {
        Ok(None)
    }

    fn offline_mode(&self) -> Option<String> {
        Some(self.config.mode.as_str().to_string())
    }

    fn login_is_hidden(&self) -> Option<bool> {
        Some(self.config.hide_login)
    }

    fn has_holdings(&self, _id: &str) -> Option<bool> {
        Some(self.config.use_holdings)
    }
}
