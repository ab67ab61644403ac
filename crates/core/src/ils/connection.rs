//! The connection facade: one stable interface over whichever driver is active.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{CatalogConfig, FunctionConfig, HoldsMode, TitleHoldsMode};
use crate::crypto;
use crate::error::{Result, StacksError};

use super::capability::{split_list, CapabilityDescriptor, DriverCapabilities, DriverFunction};
use super::drivers::NoIlsDriver;
use super::registry::DriverRegistry;
use super::types::{
    CancelHoldsRequest, CancelHoldsResult, Fine, Hold, HoldRequest, Holding, IlsPatron,
    ItemStatus, OperationResult, PasswordChange, PatronProfile, PurchaseHistoryEntry,
    RenewRequest, RenewResult, Transaction,
};
use super::{
    CancelHoldLinker, HoldCanceller, HoldLinker, HoldPlacer, IlsDriver, ItemRenewer,
    PasswordChanger, PatronAccount, RenewalLinker,
};

/// What to do when the configured driver cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Substitute the NoILS driver and keep running.
    NoIls,
    /// Report a configuration error.
    Fail,
}

impl FallbackPolicy {
    pub fn from_config(config: &CatalogConfig) -> Self {
        if config.load_no_ils_on_failure {
            FallbackPolicy::NoIls
        } else {
            FallbackPolicy::Fail
        }
    }
}

/// Feature checks `check_function` knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckedFunction {
    Holds,
    CancelHolds,
    Renewals,
    ChangePassword,
}

impl CheckedFunction {
    fn parse(name: &str) -> Option<Self> {
        [
            ("holds", CheckedFunction::Holds),
            ("cancelholds", CheckedFunction::CancelHolds),
            ("renewals", CheckedFunction::Renewals),
            ("changepassword", CheckedFunction::ChangePassword),
        ]
        .into_iter()
        .find(|(key, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, function)| function)
    }
}

/// Facade over the active ILS driver.
pub struct Connection {
    driver: Box<dyn IlsDriver>,
    config: CatalogConfig,
    capabilities: DriverCapabilities,
    fallback: bool,
}

impl Connection {
    /// Build the driver named by `config.driver`, applying the configured fallback policy.
    pub fn new(config: &CatalogConfig, registry: &DriverRegistry) -> Result<Self> {
        Self::with_policy(config, registry, FallbackPolicy::from_config(config))
    }

    /// Build the driver named by `config.driver` with an explicit fallback policy.
    pub fn with_policy(
        config: &CatalogConfig,
        registry: &DriverRegistry,
        policy: FallbackPolicy,
    ) -> Result<Self> {
        match registry.instantiate(&config.driver, config) {
            Ok(driver) => {
                info!(driver = %driver.name(), "ILS driver loaded");
                Ok(Self::assemble(driver, config, false))
            }
            Err(e) => match policy {
                FallbackPolicy::NoIls => {
                    warn!(
                        driver = %config.driver,
                        error = %e,
                        "ILS driver failed to load, falling back to NoILS"
                    );
                    let driver: Box<dyn IlsDriver> = Box::new(NoIlsDriver::new(&config.no_ils));
                    Ok(Self::assemble(driver, config, true))
                }
                FallbackPolicy::Fail => Err(match e {
                    StacksError::Config(_) => e,
                    other => StacksError::Config(format!(
                        "failed to initialize ILS driver {}: {other}",
                        config.driver
                    )),
                }),
            },
        }
    }

    /// Wrap an already constructed driver.
    pub fn with_driver(driver: Box<dyn IlsDriver>, config: &CatalogConfig) -> Self {
        Self::assemble(driver, config, false)
    }

    fn assemble(driver: Box<dyn IlsDriver>, config: &CatalogConfig, fallback: bool) -> Self {
        let capabilities = DriverCapabilities::probe(driver.as_ref());
        debug!(driver = %driver.name(), ?capabilities, "driver capabilities probed");
        Self {
            driver,
            config: config.clone(),
            capabilities,
            fallback,
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Whether the NoILS driver replaced a driver that failed to load.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    // --- capability negotiation -------------------------------------------

    /// Report whether `function` is supported and how to invoke it.
    ///
    /// Unknown function names are reported as unsupported. The check has no
    /// side effects.
    pub fn check_function(&self, function: &str) -> Option<CapabilityDescriptor> {
        let checked = CheckedFunction::parse(function)?;
        let function_config = self.function_config(function);
        match checked {
            CheckedFunction::Holds => self.check_holds(function_config.as_ref()),
            CheckedFunction::CancelHolds => self.check_cancel_holds(),
            CheckedFunction::Renewals => self.check_renewals(),
            CheckedFunction::ChangePassword => {
                self.check_change_password(function_config.as_ref())
            }
        }
    }

    /// Operator settings win over the driver's defaults.
    fn function_config(&self, function: &str) -> Option<FunctionConfig> {
        self.config
            .function(function)
            .cloned()
            .or_else(|| self.driver.function_config(function))
    }

    fn check_holds(&self, function_config: Option<&FunctionConfig>) -> Option<CapabilityDescriptor> {
        if self.holds_mode() == HoldsMode::None {
            return None;
        }

        let hmac_keys = function_config.and_then(|c| c.hmac_keys.as_deref());
        if let (true, Some(keys)) = (self.capabilities.place_hold, hmac_keys) {
            let mut descriptor = CapabilityDescriptor::new(DriverFunction::PlaceHold);
            descriptor.hmac_keys = split_list(keys);
            descriptor.default_required_date =
                function_config.and_then(|c| c.default_required_date.clone());
            descriptor.extra_hold_fields = function_config
                .and_then(|c| c.extra_hold_fields.as_deref())
                .map(split_list)
                .unwrap_or_default();
            return Some(descriptor);
        }

        if self.capabilities.hold_link {
            return Some(CapabilityDescriptor::new(DriverFunction::GetHoldLink));
        }
        None
    }

    fn check_cancel_holds(&self) -> Option<CapabilityDescriptor> {
        if !self.config.cancel_holds_enabled {
            return None;
        }
        if self.capabilities.cancel_holds {
            Some(CapabilityDescriptor::new(DriverFunction::CancelHolds))
        } else if self.capabilities.cancel_hold_link {
            Some(CapabilityDescriptor::new(DriverFunction::GetCancelHoldLink))
        } else {
            None
        }
    }

    fn check_renewals(&self) -> Option<CapabilityDescriptor> {
        if !self.config.renewals_enabled {
            return None;
        }
        if self.capabilities.renew_items {
            Some(CapabilityDescriptor::new(DriverFunction::RenewMyItems))
        } else if self.capabilities.renew_link {
            Some(CapabilityDescriptor::new(DriverFunction::RenewMyItemsLink))
        } else {
            None
        }
    }

    fn check_change_password(
        &self,
        function_config: Option<&FunctionConfig>,
    ) -> Option<CapabilityDescriptor> {
        let enabled = function_config.and_then(|c| c.enabled).unwrap_or(false);
        if enabled && self.capabilities.change_password {
            Some(CapabilityDescriptor::new(DriverFunction::ChangePassword))
        } else {
            None
        }
    }

    // --- graceful-degradation accessors ------------------------------------

    pub fn holds_mode(&self) -> HoldsMode {
        self.driver
            .holds_mode()
            .unwrap_or(self.config.holds_mode)
    }

    pub fn title_holds_mode(&self) -> TitleHoldsMode {
        self.driver
            .title_holds_mode()
            .unwrap_or(self.config.title_holds_mode)
    }

    /// `None` while the ILS is online.
    pub fn offline_mode(&self) -> Option<String> {
        self.driver.offline_mode()
    }

    pub fn has_holdings(&self, id: &str) -> bool {
        self.driver.has_holdings(id).unwrap_or(true)
    }

    pub fn login_is_hidden(&self) -> bool {
        self.driver.login_is_hidden().unwrap_or(false)
    }

    pub fn check_request_is_valid(
        &self,
        id: &str,
        data: &BTreeMap<String, String>,
        patron: &IlsPatron,
    ) -> bool {
        self.driver
            .check_request_is_valid(id, data, patron)
            .unwrap_or(true)
    }

    // --- hold request keys -------------------------------------------------

    fn hold_keys(&self) -> Result<(String, Vec<String>)> {
        let descriptor = self
            .check_function("Holds")
            .filter(|d| d.function == DriverFunction::PlaceHold)
            .ok_or_else(|| StacksError::Unsupported(DriverFunction::PlaceHold.as_str().into()))?;
        let secret = self.config.hmac_secret.clone().unwrap_or_default();
        Ok((secret, descriptor.hmac_keys))
    }

    /// Key protecting the hold detail fields named by the `Holds` HMAC keys.
    pub fn hold_request_key(&self, details: &BTreeMap<String, String>) -> Result<String> {
        let (secret, keys) = self.hold_keys()?;
        crypto::hold_request_key(&secret, &keys, details)
    }

    pub fn verify_hold_request_key(
        &self,
        details: &BTreeMap<String, String>,
        key: &str,
    ) -> Result<bool> {
        let (secret, keys) = self.hold_keys()?;
        crypto::verify_hold_request_key(&secret, &keys, details, key)
    }

    // --- forwarded driver operations ---------------------------------------

    pub async fn get_status(&self, id: &str) -> Result<Vec<ItemStatus>> {
        self.driver.get_status(id).await
    }

    pub async fn get_statuses(&self, ids: &[String]) -> Result<Vec<Vec<ItemStatus>>> {
        self.driver.get_statuses(ids).await
    }

    pub async fn get_holding(&self, id: &str, patron: Option<&IlsPatron>) -> Result<Vec<Holding>> {
        self.driver.get_holding(id, patron).await
    }

    pub async fn get_purchase_history(&self, id: &str) -> Result<Vec<PurchaseHistoryEntry>> {
        self.driver.get_purchase_history(id).await
    }

    pub async fn patron_login(&self, username: &str, password: &str) -> Result<Option<IlsPatron>> {
        self.driver.patron_login(username, password).await
    }

    fn patron_account(&self, operation: &str) -> Result<&dyn PatronAccount> {
        self.driver
            .as_patron_account()
            .ok_or_else(|| unsupported(operation))
    }

    pub async fn get_my_profile(&self, patron: &IlsPatron) -> Result<PatronProfile> {
        self.patron_account("getMyProfile")?
            .get_my_profile(patron)
            .await
    }

    pub async fn get_my_transactions(&self, patron: &IlsPatron) -> Result<Vec<Transaction>> {
        self.patron_account("getMyTransactions")?
            .get_my_transactions(patron)
            .await
    }

    pub async fn get_my_holds(&self, patron: &IlsPatron) -> Result<Vec<Hold>> {
        self.patron_account("getMyHolds")?
            .get_my_holds(patron)
            .await
    }

    pub async fn get_my_fines(&self, patron: &IlsPatron) -> Result<Vec<Fine>> {
        self.patron_account("getMyFines")?
            .get_my_fines(patron)
            .await
    }

    pub async fn place_hold(&self, request: &HoldRequest) -> Result<OperationResult> {
        let placer: &dyn HoldPlacer = self
            .driver
            .as_hold_placer()
            .ok_or_else(|| unsupported(DriverFunction::PlaceHold.as_str()))?;
        placer.place_hold(request).await
    }

    pub fn get_hold_link(&self, id: &str, details: &BTreeMap<String, String>) -> Result<String> {
        let linker: &dyn HoldLinker = self
            .driver
            .as_hold_linker()
            .ok_or_else(|| unsupported(DriverFunction::GetHoldLink.as_str()))?;
        linker.hold_link(id, details)
    }

    pub async fn cancel_holds(&self, request: &CancelHoldsRequest) -> Result<CancelHoldsResult> {
        let canceller: &dyn HoldCanceller = self
            .driver
            .as_hold_canceller()
            .ok_or_else(|| unsupported(DriverFunction::CancelHolds.as_str()))?;
        canceller.cancel_holds(request).await
    }

    pub fn get_cancel_hold_details(&self, hold: &Hold) -> Result<String> {
        let canceller: &dyn HoldCanceller = self
            .driver
            .as_hold_canceller()
            .ok_or_else(|| unsupported("getCancelHoldDetails"))?;
        Ok(canceller.cancel_hold_details(hold))
    }

    pub fn get_cancel_hold_link(&self, hold: &Hold) -> Result<String> {
        let linker: &dyn CancelHoldLinker = self
            .driver
            .as_cancel_hold_linker()
            .ok_or_else(|| unsupported(DriverFunction::GetCancelHoldLink.as_str()))?;
        linker.cancel_hold_link(hold)
    }

    pub async fn renew_my_items(&self, request: &RenewRequest) -> Result<RenewResult> {
        let renewer: &dyn ItemRenewer = self
            .driver
            .as_item_renewer()
            .ok_or_else(|| unsupported(DriverFunction::RenewMyItems.as_str()))?;
        renewer.renew_my_items(request).await
    }

    pub fn get_renew_details(&self, loan: &Transaction) -> Result<String> {
        let renewer: &dyn ItemRenewer = self
            .driver
            .as_item_renewer()
            .ok_or_else(|| unsupported("getRenewDetails"))?;
        Ok(renewer.renew_details(loan))
    }

    pub fn renew_my_items_link(&self, loan: &Transaction) -> Result<String> {
        let linker: &dyn RenewalLinker = self
            .driver
            .as_renewal_linker()
            .ok_or_else(|| unsupported(DriverFunction::RenewMyItemsLink.as_str()))?;
        linker.renew_my_items_link(loan)
    }

    pub async fn change_password(&self, request: &PasswordChange) -> Result<OperationResult> {
        let changer: &dyn PasswordChanger = self
            .driver
            .as_password_changer()
            .ok_or_else(|| unsupported(DriverFunction::ChangePassword.as_str()))?;
        changer.change_password(request).await
    }
}

fn unsupported(operation: &str) -> StacksError {
    StacksError::Unsupported(operation.to_string())
}
