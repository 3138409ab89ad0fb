//! Seams to the external reward backend.
//!
//! The session never owns tokens, customers, quotas, reviews or prizes: it
//! only consumes these contracts. Implementations must return `Send` futures
//! so best-effort calls can run as detached tasks.

use std::future::Future;

use api_types::{
    customer::{Customer, CustomerUpsert},
    play::{PlayRequest, PlayResult},
    prize::Prize,
    quota::CountSelector,
    review::ReviewClick,
    session::BranchSession,
    share::VoucherShare,
};
use uuid::Uuid;

use crate::BackendError;

pub trait RewardBackend: Send + Sync + 'static {
    /// Validate a token and return the branch it is bound to.
    fn validate_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<BranchSession, BackendError>> + Send;

    /// Insert or update a customer, keyed by phone.
    fn upsert_customer(
        &self,
        customer: &CustomerUpsert,
    ) -> impl Future<Output = Result<Customer, BackendError>> + Send;

    fn daily_spin_count(
        &self,
        selector: &CountSelector,
    ) -> impl Future<Output = Result<u32, BackendError>> + Send;

    fn has_reviewed_today(
        &self,
        customer_id: Uuid,
        branch_id: Uuid,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    fn log_review_click(
        &self,
        click: &ReviewClick,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Active prizes in wheel order.
    fn active_prizes(&self) -> impl Future<Output = Result<Vec<Prize>, BackendError>> + Send;

    /// Consume the token and draw the authoritative outcome.
    fn play(
        &self,
        request: &PlayRequest,
    ) -> impl Future<Output = Result<PlayResult, BackendError>> + Send;

    fn log_voucher_share(
        &self,
        share: &VoucherShare,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Best-effort resolution of the caller's public network address.
pub trait AddressLookup: Send + Sync + 'static {
    fn lookup(&self) -> impl Future<Output = Result<String, BackendError>> + Send;
}

/// Lookup that never resolves an address; quota falls back to the customer id.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAddressLookup;

impl AddressLookup for NoAddressLookup {
    async fn lookup(&self) -> Result<String, BackendError> {
        Err(BackendError::Transport(
            "address lookup disabled".to_string(),
        ))
    }
}
