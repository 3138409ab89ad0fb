//! In-memory state of the reference reward backend.
//!
//! Tokens are single use: validation succeeds once, and a play consumes the
//! token for good. Customers are keyed by phone. Spin counts are kept
//! per calendar day for both the network address and the customer.

use std::collections::{HashMap, HashSet};

use api_types::{
    FailureCode,
    customer::{Customer, CustomerUpsert},
    play::{PlayRequest, PlayResult},
    prize::Prize,
    quota::CountSelector,
    review::ReviewClick,
    session::BranchSession,
    share::VoucherShare,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::ServerError;

/// Spins allowed per address or customer per day.
pub const DAILY_SPIN_CAP: u32 = 2;

#[derive(Clone, Debug, Deserialize)]
pub struct BranchSeed {
    pub id: Uuid,
    pub name: String,
    pub review_url: String,
    /// Tokens usable from startup.
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PrizeSeed {
    pub name: String,
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub branches: Vec<BranchSeed>,
    #[serde(default)]
    pub prizes: Vec<PrizeSeed>,
    pub voucher_prefix: Option<String>,
}

#[derive(Debug)]
struct TokenState {
    branch_id: Uuid,
    validated: bool,
    consumed: bool,
}

#[derive(Debug)]
struct PrizeEntry {
    prize: Prize,
    active: bool,
}

#[derive(Debug, Default)]
pub struct Store {
    branches: HashMap<Uuid, BranchSession>,
    tokens: HashMap<String, TokenState>,
    customers: HashMap<String, Customer>,
    spins: HashMap<(NaiveDate, CountSelector), u32>,
    reviews: HashSet<(Uuid, Uuid, NaiveDate)>,
    prizes: Vec<PrizeEntry>,
    shares: Vec<VoucherShare>,
    /// Last day seen; older counts, reviews and shares are dropped on change.
    current_day: Option<NaiveDate>,
    voucher_prefix: String,
    vouchers_issued: u32,
}

impl Store {
    pub fn from_seed(seed: Seed) -> Self {
        let mut store = Store {
            voucher_prefix: seed.voucher_prefix.unwrap_or_else(|| "TBK".to_string()),
            ..Default::default()
        };

        for branch in seed.branches {
            for token in branch.tokens {
                store.tokens.insert(
                    token,
                    TokenState {
                        branch_id: branch.id,
                        validated: false,
                        consumed: false,
                    },
                );
            }
            store.branches.insert(
                branch.id,
                BranchSession {
                    branch_id: branch.id,
                    branch_name: branch.name,
                    review_url: branch.review_url,
                },
            );
        }

        store.prizes = seed
            .prizes
            .into_iter()
            .map(|p| PrizeEntry {
                prize: Prize {
                    id: Uuid::new_v4(),
                    name: p.name,
                    color: p.color,
                },
                active: p.active,
            })
            .collect();

        tracing::info!(
            "store seeded with {} branches, {} tokens, {} prizes",
            store.branches.len(),
            store.tokens.len(),
            store.prizes.len()
        );
        store
    }

    pub fn issue_token(&mut self, branch_id: Uuid) -> Result<String, ServerError> {
        if !self.branches.contains_key(&branch_id) {
            return Err(ServerError::NotFound(format!("branch {branch_id}")));
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(
            token.clone(),
            TokenState {
                branch_id,
                validated: false,
                consumed: false,
            },
        );
        Ok(token)
    }

    /// Succeeds once per token. Later calls are rejected even before a play.
    pub fn validate(&mut self, token: &str) -> Result<BranchSession, ServerError> {
        let branch = self.unspent_branch(token)?;
        let Some(state) = self.tokens.get_mut(token) else {
            return Err(token_rejected("token is invalid"));
        };
        if state.validated {
            return Err(token_rejected("token has already been used"));
        }
        state.validated = true;
        Ok(branch)
    }

    /// Branch of a token that no play has consumed yet.
    fn unspent_branch(&self, token: &str) -> Result<BranchSession, ServerError> {
        let state = self
            .tokens
            .get(token)
            .ok_or_else(|| token_rejected("token is invalid"))?;
        if state.consumed {
            return Err(token_rejected("token has already been used"));
        }
        self.branches
            .get(&state.branch_id)
            .cloned()
            .ok_or_else(|| token_rejected("token branch no longer exists"))
    }

    pub fn upsert_customer(&mut self, req: &CustomerUpsert) -> Result<Customer, ServerError> {
        let phone = req.phone.trim();
        let digits = phone.strip_prefix('+').unwrap_or_default();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ServerError::Validation(format!("invalid phone {phone}")));
        }

        let customer = self
            .customers
            .entry(phone.to_string())
            .and_modify(|c| {
                c.first_name = req.first_name.clone();
                c.last_name = req.last_name.clone();
                if req.email.is_some() {
                    c.email = req.email.clone();
                }
            })
            .or_insert_with(|| Customer {
                id: Uuid::new_v4(),
                phone: phone.to_string(),
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
                email: req.email.clone(),
            });
        Ok(customer.clone())
    }

    pub fn spin_count(&self, selector: &CountSelector, today: NaiveDate) -> u32 {
        self.spins
            .get(&(today, selector.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn reviewed_today(&self, customer_id: Uuid, branch_id: Uuid, today: NaiveDate) -> bool {
        self.reviews.contains(&(customer_id, branch_id, today))
    }

    /// Only the first click of the day counts.
    pub fn log_review_click(&mut self, click: &ReviewClick, today: NaiveDate) {
        self.roll_day(today);
        if click.clicked {
            self.reviews
                .insert((click.customer_id, click.branch_id, today));
        }
    }

    pub fn active_prizes(&self) -> Vec<Prize> {
        self.prizes
            .iter()
            .filter(|p| p.active)
            .map(|p| p.prize.clone())
            .collect()
    }

    /// Consume the token and draw a prize.
    ///
    /// `pick` receives the number of active prizes and returns the index won.
    pub fn play<F>(
        &mut self,
        req: &PlayRequest,
        today: NaiveDate,
        pick: F,
    ) -> Result<PlayResult, ServerError>
    where
        F: FnOnce(usize) -> usize,
    {
        self.unspent_branch(&req.token)?;
        self.roll_day(today);

        let prizes = self.active_prizes();
        if prizes.is_empty() {
            return Err(ServerError::Rejected(
                FailureCode::NoPrizesConfigured,
                "no prizes configured".to_string(),
            ));
        }

        let customer = self.upsert_customer(&CustomerUpsert {
            phone: req.phone.clone(),
            email: req.email.clone(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
        })?;

        let mut keys = vec![CountSelector::Customer(customer.id)];
        if let Some(address) = req.network_address.as_deref().map(str::trim)
            && !address.is_empty()
        {
            keys.push(CountSelector::NetworkAddress(address.to_string()));
        }
        if keys
            .iter()
            .any(|key| self.spin_count(key, today) >= DAILY_SPIN_CAP)
        {
            return Err(ServerError::Rejected(
                FailureCode::DailyLimitExceeded,
                "daily spin limit reached".to_string(),
            ));
        }

        let index = pick(prizes.len()).min(prizes.len() - 1);
        let prize = prizes[index].clone();

        if let Some(state) = self.tokens.get_mut(&req.token) {
            state.consumed = true;
        }
        for key in keys {
            *self.spins.entry((today, key)).or_insert(0) += 1;
        }
        self.vouchers_issued += 1;
        let voucher_code = format!("{}-{:04}", self.voucher_prefix, self.vouchers_issued);

        tracing::info!("customer {} won {} ({voucher_code})", customer.id, prize.name);
        Ok(PlayResult {
            prize,
            voucher_code,
        })
    }

    pub fn log_share(&mut self, share: VoucherShare, today: NaiveDate) {
        self.roll_day(today);
        self.shares.push(share);
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if self.current_day.is_some_and(|day| day >= today) {
            return;
        }
        self.current_day = Some(today);
        self.spins.retain(|(day, _), _| *day >= today);
        self.reviews.retain(|(_, _, day)| *day >= today);
        self.shares
            .retain(|share| share.shared_at.date_naive() >= today);
        tracing::debug!("day rolled over to {today}");
    }

    pub fn shares(&self) -> &[VoucherShare] {
        &self.shares
    }
}

fn token_rejected(message: &str) -> ServerError {
    ServerError::Rejected(FailureCode::TokenInvalidOrUsed, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn store() -> (Store, Uuid) {
        let branch = Uuid::new_v4();
        let store = Store::from_seed(Seed {
            branches: vec![BranchSeed {
                id: branch,
                name: "Manama".to_string(),
                review_url: "https://example.com/review".to_string(),
                tokens: vec!["T1".to_string(), "T2".to_string(), "T3".to_string()],
            }],
            prizes: vec![
                PrizeSeed {
                    name: "A".to_string(),
                    color: "#111111".to_string(),
                    active: true,
                },
                PrizeSeed {
                    name: "Hidden".to_string(),
                    color: "#222222".to_string(),
                    active: false,
                },
                PrizeSeed {
                    name: "B".to_string(),
                    color: "#333333".to_string(),
                    active: true,
                },
            ],
            voucher_prefix: None,
        });
        (store, branch)
    }

    fn play_request(token: &str, address: Option<&str>) -> PlayRequest {
        PlayRequest {
            token: token.to_string(),
            phone: "+97312345678".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: None,
            network_address: address.map(str::to_string),
        }
    }

    #[test]
    fn consumed_token_fails_validation() {
        let (mut store, branch) = store();
        assert_eq!(store.validate("T1").unwrap().branch_id, branch);

        store.play(&play_request("T1", None), today(), |_| 1).unwrap();
        assert!(matches!(
            store.validate("T1"),
            Err(ServerError::Rejected(FailureCode::TokenInvalidOrUsed, _))
        ));
        assert!(matches!(
            store.play(&play_request("T1", None), today(), |_| 0),
            Err(ServerError::Rejected(FailureCode::TokenInvalidOrUsed, _))
        ));
    }

    #[test]
    fn upsert_by_phone_keeps_identity() {
        let (mut store, _) = store();
        let req = CustomerUpsert {
            phone: "+97312345678".to_string(),
            email: None,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        };
        let first = store.upsert_customer(&req).unwrap();
        let second = store
            .upsert_customer(&CustomerUpsert {
                email: Some("jane@example.com".to_string()),
                ..req
            })
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.email.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn only_active_prizes_in_order() {
        let (store, _) = store();
        let names: Vec<_> = store.active_prizes().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn third_play_of_the_day_is_rejected() {
        let (mut store, _) = store();
        let first = store
            .play(&play_request("T1", Some("10.0.0.1")), today(), |_| 1)
            .unwrap();
        assert_eq!(first.prize.name, "B");
        assert_eq!(first.voucher_code, "TBK-0001");
        store
            .play(&play_request("T2", Some("10.0.0.2")), today(), |_| 0)
            .unwrap();

        let selector = CountSelector::NetworkAddress("10.0.0.1".to_string());
        assert_eq!(store.spin_count(&selector, today()), 1);

        let err = store
            .play(&play_request("T3", Some("10.0.0.3")), today(), |_| 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Rejected(FailureCode::DailyLimitExceeded, _)
        ));
        // The token survives a rejected play.
        assert!(store.validate("T3").is_ok());

        let tomorrow = today().succ_opt().unwrap();
        assert!(store.play(&play_request("T3", None), tomorrow, |_| 0).is_ok());
    }

    #[test]
    fn review_click_counts_for_the_day() {
        let (mut store, branch) = store();
        let customer = Uuid::new_v4();
        assert!(!store.reviewed_today(customer, branch, today()));
        store.log_review_click(
            &ReviewClick {
                customer_id: customer,
                branch_id: branch,
                clicked: true,
            },
            today(),
        );
        assert!(store.reviewed_today(customer, branch, today()));
        assert!(!store.reviewed_today(customer, branch, today().succ_opt().unwrap()));
    }

    #[test]
    fn unknown_branch_cannot_get_tokens() {
        let (mut store, branch) = store();
        assert!(store.issue_token(Uuid::new_v4()).is_err());
        let token = store.issue_token(branch).unwrap();
        assert!(store.validate(&token).is_ok());
    }

    #[test]
    fn second_validation_is_rejected() {
        let (mut store, _) = store();
        assert!(store.validate("T1").is_ok());
        assert!(matches!(
            store.validate("T1"),
            Err(ServerError::Rejected(FailureCode::TokenInvalidOrUsed, _))
        ));
        // The validated token still authorizes its play.
        assert!(store.play(&play_request("T1", None), today(), |_| 0).is_ok());
    }

    #[test]
    fn past_days_are_dropped_on_rollover() {
        let (mut store, branch) = store();
        let customer = Uuid::new_v4();
        store
            .play(&play_request("T1", Some("10.0.0.1")), today(), |_| 0)
            .unwrap();
        store.log_review_click(
            &ReviewClick {
                customer_id: customer,
                branch_id: branch,
                clicked: true,
            },
            today(),
        );
        store.log_share(
            VoucherShare {
                voucher_code: "TBK-0001".to_string(),
                from_customer_id: customer,
                branch_id: branch,
                shared_at: today().and_hms_opt(10, 0, 0).unwrap().and_utc(),
            },
            today(),
        );
        assert_eq!(store.spins.len(), 2);
        assert_eq!(store.shares().len(), 1);

        let tomorrow = today().succ_opt().unwrap();
        store
            .play(&play_request("T2", Some("10.0.0.1")), tomorrow, |_| 0)
            .unwrap();
        assert_eq!(store.spins.len(), 2);
        assert!(store.spins.keys().all(|(day, _)| *day == tomorrow));
        assert!(store.reviews.is_empty());
        assert!(store.shares().is_empty());
    }
}
