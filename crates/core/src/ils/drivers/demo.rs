//! In-memory ILS that implements every optional capability.
//!
//! Statuses are derived deterministically from the record id. Loans, holds,
//! and passwords live in process memory and reset on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::FunctionConfig;
use crate::error::{Result, StacksError};
use crate::ils::types::{
    CancelHoldsRequest, CancelHoldsResult, Fine, Hold, HoldRequest, Holding, IlsPatron,
    ItemStatus, OperationResult, PasswordChange, PatronProfile, PurchaseHistoryEntry,
    RenewRequest, RenewResult, RenewStatus, Transaction,
};
use crate::ils::{
    HoldCanceller, HoldPlacer, IlsDriver, ItemRenewer, PasswordChanger, PatronAccount,
};

const LOCATIONS: [&str; 3] = ["Main Library", "Branch Library", "Reference Desk"];
const LOAN_PERIOD_DAYS: u64 = 14;
const MAX_RENEWALS: u32 = 3;
const HOLD_EXPIRY_DAYS: u64 = 180;

#[derive(Default)]
struct DemoState {
    holds: HashMap<String, Vec<Hold>>,
    loans: HashMap<String, Vec<Transaction>>,
    passwords: HashMap<String, String>,
    next_reqnum: u64,
}

pub struct DemoDriver {
    state: Mutex<DemoState>,
}

impl DemoDriver {
    pub const NAME: &'static str = "demo";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(DemoState::default()),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn seed(id: &str) -> usize {
        id.bytes().map(usize::from).sum()
    }

    fn copies(id: &str) -> Vec<ItemStatus> {
        let seed = Self::seed(id);
        (0..seed % 3 + 1)
            .map(|n| {
                let available = (seed + n) % 2 == 0;
                ItemStatus {
                    id: id.to_string(),
                    item_id: Some(format!("{id}-{}", n + 1)),
                    status: if available { "Available" } else { "Checked Out" }.to_string(),
                    location: LOCATIONS[(seed + n) % LOCATIONS.len()].to_string(),
                    reserve: false,
                    callnumber: format!("QA{}.{}", 76 + seed % 10, n + 1),
                    availability: available,
                    duedate: (!available).then(|| {
                        (Self::today() + Days::new(LOAN_PERIOD_DAYS)).to_string()
                    }),
                    barcode: Some(format!("3{:012}", seed * 10 + n)),
                }
            })
            .collect()
    }

    fn seeded_loans(patron: &IlsPatron) -> Vec<Transaction> {
        let today = Self::today();
        (1..=3)
            .map(|n| {
                let id = format!("{}", 1000 + n);
                Transaction {
                    item_id: format!("{id}-1"),
                    id,
                    duedate: today + Days::new(n * 3),
                    barcode: Some(format!("3{:012}", n)),
                    renew: 0,
                    renewable: !patron.cat_username.is_empty(),
                }
            })
            .collect()
    }
}

impl Default for DemoDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IlsDriver for DemoDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get_status(&self, id: &str) -> Result<Vec<ItemStatus>> {
        Ok(Self::copies(id))
    }

    async fn get_holding(&self, id: &str, _patron: Option<&IlsPatron>) -> Result<Vec<Holding>> {
        Ok(Self::copies(id)
            .into_iter()
            .enumerate()
            .map(|(n, status)| Holding {
                status,
                number: Some(n as u32 + 1),
                notes: Vec::new(),
                summary: Vec::new(),
                is_holdable: true,
            })
            .collect())
    }

    async fn get_purchase_history(&self, id: &str) -> Result<Vec<PurchaseHistoryEntry>> {
        let seed = Self::seed(id);
        Ok((0..seed % 2)
            .map(|n| PurchaseHistoryEntry {
                issue: format!("Volume {}", n + 1),
            })
            .collect())
    }

    async fn patron_login(&self, username: &str, password: &str) -> Result<Option<IlsPatron>> {
        if username.trim().is_empty() || password.is_empty() {
            return Ok(None);
        }
        let state = self.state.lock().await;
        if let Some(stored) = state.passwords.get(username) {
            if stored != password {
                return Ok(None);
            }
        }
        Ok(Some(IlsPatron {
            id: format!("P{}", Self::seed(username)),
            firstname: "Lib".to_string(),
            lastname: "Rarian".to_string(),
            cat_username: username.to_string(),
            cat_password: password.to_string(),
            email: Some(format!("{username}@library.example.org")),
            major: None,
            college: None,
        }))
    }

    fn function_config(&self, function: &str) -> Option<FunctionConfig> {
        if function.eq_ignore_ascii_case("holds") {
            Some(FunctionConfig {
                enabled: None,
                hmac_keys: Some("id:item_id".into()),
                default_required_date: Some("0:1:0".into()),
                extra_hold_fields: Some("comments:pickUpLocation:requiredByDate".into()),
            })
        } else if function.eq_ignore_ascii_case("changePassword") {
            Some(FunctionConfig {
                enabled: Some(true),
                ..FunctionConfig::default()
            })
        } else {
            None
        }
    }

    fn as_patron_account(&self) -> Option<&dyn PatronAccount> {
        Some(self)
    }

    fn as_hold_placer(&self) -> Option<&dyn HoldPlacer> {
        Some(self)
    }

    fn as_hold_canceller(&self) -> Option<&dyn HoldCanceller> {
        Some(self)
    }

    fn as_item_renewer(&self) -> Option<&dyn ItemRenewer> {
        Some(self)
    }

    fn as_password_changer(&self) -> Option<&dyn PasswordChanger> {
        Some(self)
    }
}

#[async_trait]
impl PatronAccount for DemoDriver {
    async fn get_my_profile(&self, patron: &IlsPatron) -> Result<PatronProfile> {
        Ok(PatronProfile {
            firstname: patron.firstname.clone(),
            lastname: patron.lastname.clone(),
            address1: Some("1 Main Street".to_string()),
            zip: Some("12345".to_string()),
            phone: Some("555-0100".to_string()),
            group: Some("Patron".to_string()),
        })
    }

    async fn get_my_transactions(&self, patron: &IlsPatron) -> Result<Vec<Transaction>> {
        let mut state = self.state.lock().await;
        Ok(state
            .loans
            .entry(patron.id.clone())
            .or_insert_with(|| Self::seeded_loans(patron))
            .clone())
    }

    async fn get_my_holds(&self, patron: &IlsPatron) -> Result<Vec<Hold>> {
        let state = self.state.lock().await;
        Ok(state.holds.get(&patron.id).cloned().unwrap_or_default())
    }

    async fn get_my_fines(&self, _patron: &IlsPatron) -> Result<Vec<Fine>> {
        let today = Self::today();
        Ok(vec![Fine {
            amount: 250,
            balance: 250,
            fine: "Overdue".to_string(),
            checkout: today.checked_sub_days(Days::new(30)),
            duedate: today.checked_sub_days(Days::new(16)),
            createdate: today,
            id: Some("1005".to_string()),
        }])
    }
}

#[async_trait]
impl HoldPlacer for DemoDriver {
    async fn place_hold(&self, request: &HoldRequest) -> Result<OperationResult> {
        if !LOCATIONS.contains(&request.pickup_location.as_str()) {
            return Ok(OperationResult::failed(
                "hold_invalid_pickup",
                Some(format!("unknown pickup location {}", request.pickup_location)),
            ));
        }

        let today = Self::today();
        if matches!(request.required_by, Some(date) if date < today) {
            return Ok(OperationResult::failed("hold_date_invalid", None));
        }

        let mut state = self.state.lock().await;
        let already_held = state
            .holds
            .get(&request.patron.id)
            .is_some_and(|holds| {
                holds
                    .iter()
                    .any(|h| h.id == request.id && h.item_id == request.item_id)
            });
        if already_held {
            return Ok(OperationResult::failed("hold_error_already_held", None));
        }

        state.next_reqnum += 1;
        let hold = Hold {
            id: request.id.clone(),
            item_id: request.item_id.clone(),
            reqnum: state.next_reqnum.to_string(),
            location: request.pickup_location.clone(),
            create: today,
            expire: request
                .required_by
                .or_else(|| today.checked_add_days(Days::new(HOLD_EXPIRY_DAYS))),
            position: Some(1),
            available: false,
        };
        debug!(patron = %request.patron.id, reqnum = %hold.reqnum, "demo hold placed");
        state
            .holds
            .entry(request.patron.id.clone())
            .or_default()
            .push(hold);

        Ok(OperationResult::ok("hold_success"))
    }
}

#[async_trait]
impl HoldCanceller for DemoDriver {
    async fn cancel_holds(&self, request: &CancelHoldsRequest) -> Result<CancelHoldsResult> {
        let mut state = self.state.lock().await;
        let holds = state.holds.entry(request.patron.id.clone()).or_default();

        let mut items = BTreeMap::new();
        let mut count = 0;
        for reqnum in &request.details {
            let before = holds.len();
            holds.retain(|h| &h.reqnum != reqnum);
            let result = if holds.len() < before {
                count += 1;
                OperationResult::ok("hold_cancel_success")
            } else {
                OperationResult::failed("hold_cancel_fail", Some(format!("no hold {reqnum}")))
            };
            items.insert(reqnum.clone(), result);
        }

        Ok(CancelHoldsResult { count, items })
    }

    fn cancel_hold_details(&self, hold: &Hold) -> String {
        hold.reqnum.clone()
    }
}

#[async_trait]
impl ItemRenewer for DemoDriver {
    async fn renew_my_items(&self, request: &RenewRequest) -> Result<RenewResult> {
        let mut state = self.state.lock().await;
        let loans = state
            .loans
            .entry(request.patron.id.clone())
            .or_insert_with(|| Self::seeded_loans(&request.patron));

        let mut details = BTreeMap::new();
        for item_id in &request.details {
            let status = match loans.iter_mut().find(|l| &l.item_id == item_id) {
                Some(loan) if loan.renewable && loan.renew < MAX_RENEWALS => {
                    loan.renew += 1;
                    loan.duedate = loan
                        .duedate
                        .checked_add_days(Days::new(LOAN_PERIOD_DAYS))
                        .ok_or_else(|| StacksError::Backend("due date overflow".into()))?;
                    loan.renewable = loan.renew < MAX_RENEWALS;
                    RenewStatus {
                        success: true,
                        new_date: Some(loan.duedate),
                        item_id: item_id.clone(),
                        sys_message: None,
                    }
                }
                Some(_) => RenewStatus {
                    success: false,
                    new_date: None,
                    item_id: item_id.clone(),
                    sys_message: Some("Renewal limit reached".to_string()),
                },
                None => RenewStatus {
                    success: false,
                    new_date: None,
                    item_id: item_id.clone(),
                    sys_message: Some("Item is not checked out".to_string()),
                },
            };
            details.insert(item_id.clone(), status);
        }

        Ok(RenewResult {
            blocks: Vec::new(),
            details,
        })
    }

    fn renew_details(&self, loan: &Transaction) -> String {
        loan.item_id.clone()
    }
}

#[async_trait]
impl PasswordChanger for DemoDriver {
    async fn change_password(&self, request: &PasswordChange) -> Result<OperationResult> {
        let mut state = self.state.lock().await;
        let username = request.patron.cat_username.clone();
        let current = state
            .passwords
            .get(&username)
            .cloned()
            .unwrap_or_else(|| request.patron.cat_password.clone());

        if current != request.old_password {
            return Ok(OperationResult::failed("authentication_error_invalid", None));
        }
        if request.new_password.is_empty() {
            return Ok(OperationResult::failed("password_error_invalid", None));
        }

        state.passwords.insert(username, request.new_password.clone());
        Ok(OperationResult::ok("new_password_success"))
    }
}
