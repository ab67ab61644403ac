use serde::Serialize;

use super::IlsDriver;

/// How a caller invokes a supported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// Collect details in a local form and call the driver.
    Form,
    /// Send the patron to a URL produced by the driver.
    Link,
}

/// Concrete driver operation named by a capability descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriverFunction {
    #[serde(rename = "placeHold")]
    PlaceHold,
    #[serde(rename = "getHoldLink")]
    GetHoldLink,
    #[serde(rename = "cancelHolds")]
    CancelHolds,
    #[serde(rename = "getCancelHoldLink")]
    GetCancelHoldLink,
    #[serde(rename = "renewMyItems")]
    RenewMyItems,
    #[serde(rename = "renewMyItemsLink")]
    RenewMyItemsLink,
    #[serde(rename = "changePassword")]
    ChangePassword,
}

impl DriverFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverFunction::PlaceHold => "placeHold",
            DriverFunction::GetHoldLink => "getHoldLink",
            DriverFunction::CancelHolds => "cancelHolds",
            DriverFunction::GetCancelHoldLink => "getCancelHoldLink",
            DriverFunction::RenewMyItems => "renewMyItems",
            DriverFunction::RenewMyItemsLink => "renewMyItemsLink",
            DriverFunction::ChangePassword => "changePassword",
        }
    }

    pub fn mode(&self) -> InvocationMode {
        match self {
            DriverFunction::GetHoldLink
            | DriverFunction::GetCancelHoldLink
            | DriverFunction::RenewMyItemsLink => InvocationMode::Link,
            DriverFunction::PlaceHold
            | DriverFunction::CancelHolds
            | DriverFunction::RenewMyItems
            | DriverFunction::ChangePassword => InvocationMode::Form,
        }
    }
}

/// Answer to "is this feature supported, and how do I invoke it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub function: DriverFunction,
    pub mode: InvocationMode,
    /// Hold detail fields covered by the request key.
    #[serde(rename = "HMACKeys", skip_serializing_if = "Vec::is_empty")]
    pub hmac_keys: Vec<String>,
    #[serde(rename = "defaultRequiredDate", skip_serializing_if = "Option::is_none")]
    pub default_required_date: Option<String>,
    #[serde(rename = "extraHoldFields", skip_serializing_if = "Vec::is_empty")]
    pub extra_hold_fields: Vec<String>,
}

impl CapabilityDescriptor {
    pub fn new(function: DriverFunction) -> Self {
        Self {
            function,
            mode: function.mode(),
            hmac_keys: Vec::new(),
            default_required_date: None,
            extra_hold_fields: Vec::new(),
        }
    }
}

/// Split a colon-separated setting, dropping empty entries.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Optional capabilities a driver exposes, captured once when the connection is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverCapabilities {
    pub patron_account: bool,
    pub place_hold: bool,
    pub hold_link: bool,
    pub cancel_holds: bool,
    pub cancel_hold_link: bool,
    pub renew_items: bool,
    pub renew_link: bool,
    pub change_password: bool,
}

impl DriverCapabilities {
    pub fn probe(driver: &dyn IlsDriver) -> Self {
        Self {
            patron_account: driver.as_patron_account().is_some(),
            place_hold: driver.as_hold_placer().is_some(),
            hold_link: driver.as_hold_linker().is_some(),
            cancel_holds: driver.as_hold_canceller().is_some(),
            cancel_hold_link: driver.as_cancel_hold_linker().is_some(),
            renew_items: driver.as_item_renewer().is_some(),
            renew_link: driver.as_renewal_linker().is_some(),
            change_password: driver.as_password_changer().is_some(),
        }
    }
}
