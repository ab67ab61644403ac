//! ILS driver contract and the connection facade built on top of it.
//!
//! Every driver implements [`IlsDriver`]. Optional features (placing holds,
//! renewing loans, ...) are separate traits a driver opts into by overriding
//! the matching `as_*` accessor, so callers discover support through typed
//! lookups instead of probing for methods.

pub mod capability;
pub mod connection;
pub mod drivers;
pub mod registry;
pub mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::{FunctionConfig, HoldsMode, TitleHoldsMode};
use crate::error::Result;

use self::types::{
    CancelHoldsRequest, CancelHoldsResult, Fine, Hold, HoldRequest, Holding, IlsPatron,
    ItemStatus, OperationResult, PasswordChange, PatronProfile, PurchaseHistoryEntry,
    RenewRequest, RenewResult, Transaction,
};

/// Base contract every ILS driver fulfils.
#[async_trait]
pub trait IlsDriver: Send + Sync {
    /// Registry identifier of the driver.
    fn name(&self) -> &str;

    async fn get_status(&self, id: &str) -> Result<Vec<ItemStatus>>;

    async fn get_statuses(&self, ids: &[String]) -> Result<Vec<Vec<ItemStatus>>> {
        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            statuses.push(self.get_status(id).await?);
        }
        Ok(statuses)
    }

    async fn get_holding(&self, id: &str, patron: Option<&IlsPatron>) -> Result<Vec<Holding>>;

    async fn get_purchase_history(&self, id: &str) -> Result<Vec<PurchaseHistoryEntry>>;

    /// Returns `None` when the ILS does not recognise the credentials.
    async fn patron_login(&self, username: &str, password: &str) -> Result<Option<IlsPatron>>;

    /// Driver defaults for a function; `catalog.functions` entries take precedence.
    fn function_config(&self, _function: &str) -> Option<FunctionConfig> {
        None
    }

    fn holds_mode(&self) -> Option<HoldsMode> {
        None
    }

    fn title_holds_mode(&self) -> Option<TitleHoldsMode> {
        None
    }

    /// `Some(mode)` while the ILS is unavailable.
    fn offline_mode(&self) -> Option<String> {
        None
    }

    fn login_is_hidden(&self) -> Option<bool> {
        None
    }

    fn has_holdings(&self, _id: &str) -> Option<bool> {
        None
    }

    fn check_request_is_valid(
        &self,
        _id: &str,
        _data: &BTreeMap<String, String>,
        _patron: &IlsPatron,
    ) -> Option<bool> {
        None
    }

    fn as_patron_account(&self) -> Option<&dyn PatronAccount> {
        None
    }

    fn as_hold_placer(&self) -> Option<&dyn HoldPlacer> {
        None
    }

    fn as_hold_linker(&self) -> Option<&dyn HoldLinker> {
        None
    }

    fn as_hold_canceller(&self) -> Option<&dyn HoldCanceller> {
        None
    }

    fn as_cancel_hold_linker(&self) -> Option<&dyn CancelHoldLinker> {
        None
    }

    fn as_item_renewer(&self) -> Option<&dyn ItemRenewer> {
        None
    }

    fn as_renewal_linker(&self) -> Option<&dyn RenewalLinker> {
        None
    }

    fn as_password_changer(&self) -> Option<&dyn PasswordChanger> {
        None
    }
}

/// Patron account pages: profile, loans, holds, fines.
#[async_trait]
pub trait PatronAccount: Send + Sync {
    async fn get_my_profile(&self, patron: &IlsPatron) -> Result<PatronProfile>;
    async fn get_my_transactions(&self, patron: &IlsPatron) -> Result<Vec<Transaction>>;
    async fn get_my_holds(&self, patron: &IlsPatron) -> Result<Vec<Hold>>;
    async fn get_my_fines(&self, patron: &IlsPatron) -> Result<Vec<Fine>>;
}

/// Places holds from a detail form.
#[async_trait]
pub trait HoldPlacer: Send + Sync {
    async fn place_hold(&self, request: &HoldRequest) -> Result<OperationResult>;
}

/// Sends patrons to the ILS's own hold page.
pub trait HoldLinker: Send + Sync {
    fn hold_link(&self, id: &str, details: &BTreeMap<String, String>) -> Result<String>;
}

#[async_trait]
pub trait HoldCanceller: Send + Sync {
    async fn cancel_holds(&self, request: &CancelHoldsRequest) -> Result<CancelHoldsResult>;
    /// Opaque string identifying `hold` in a later `cancel_holds` call.
    fn cancel_hold_details(&self, hold: &Hold) -> String;
}

pub trait CancelHoldLinker: Send + Sync {
    fn cancel_hold_link(&self, hold: &Hold) -> Result<String>;
}

#[async_trait]
pub trait ItemRenewer: Send + Sync {
    async fn renew_my_items(&self, request: &RenewRequest) -> Result<RenewResult>;
    /// Opaque string identifying `loan` in a later `renew_my_items` call.
    fn renew_details(&self, loan: &Transaction) -> String;
}

pub trait RenewalLinker: Send + Sync {
    fn renew_my_items_link(&self, loan: &Transaction) -> Result<String>;
}

#[async_trait]
pub trait PasswordChanger: Send + Sync {
    async fn change_password(&self, request: &PasswordChange) -> Result<OperationResult>;
}
