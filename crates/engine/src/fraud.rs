//! Daily quota pre-check.
//!
//! The backend is authoritative; this only rejects early so the customer
//! never reaches the wheel when the cap is already used up.

use api_types::quota::CountSelector;
use uuid::Uuid;

use crate::{RewardBackend, SessionError};

/// Maximum spins per network address or customer per calendar day.
pub const DAILY_SPIN_CAP: u32 = 2;

/// Count by network address when one was resolved, by customer otherwise.
pub fn quota_selector(network_address: Option<&str>, customer_id: Uuid) -> CountSelector {
    match network_address {
        Some(address) if !address.trim().is_empty() => {
            CountSelector::NetworkAddress(address.trim().to_string())
        }
        _ => CountSelector::Customer(customer_id),
    }
}

pub(crate) async fn check_quota<B: RewardBackend>(
    backend: &B,
    selector: &CountSelector,
) -> Result<u32, SessionError> {
    let count = backend.daily_spin_count(selector).await?;
    tracing::debug!("daily spin count for {selector:?}: {count}");
    if count >= DAILY_SPIN_CAP {
        tracing::info!("daily spin cap reached for {selector:?}");
        return Err(SessionError::DailyLimitExceeded);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_network_address() {
        let id = Uuid::new_v4();
        assert_eq!(
            quota_selector(Some("203.0.113.7"), id),
            CountSelector::NetworkAddress("203.0.113.7".to_string())
        );
    }

    #[test]
    fn falls_back_to_customer() {
        let id = Uuid::new_v4();
        assert_eq!(quota_selector(None, id), CountSelector::Customer(id));
        assert_eq!(quota_selector(Some("  "), id), CountSelector::Customer(id));
    }
}
