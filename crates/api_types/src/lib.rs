use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Machine-readable failure reason attached to an error body.
///
/// Any failure without a code is treated by clients as a generic server error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    TokenInvalidOrUsed,
    DailyLimitExceeded,
    NoPrizesConfigured,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenInvalidOrUsed => "TOKEN_INVALID_OR_USED",
            Self::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            Self::NoPrizesConfigured => "NO_PRIZES_CONFIGURED",
        }
    }
}

/// JSON body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<FailureCode>,
}

pub mod session {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SessionValidate {
        pub token: String,
    }

    /// Branch-bound session record returned by a successful validation.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BranchSession {
        pub branch_id: Uuid,
        pub branch_name: String,
        /// External page where the customer can leave a rating.
        pub review_url: String,
    }

    /// Admin request for a new single-use token.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TokenIssue {
        pub branch_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TokenIssued {
        pub token: String,
        pub branch_id: Uuid,
    }
}

pub mod customer {
    use super::*;

    /// Upsert keyed by phone: the same phone always resolves to the same id.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CustomerUpsert {
        pub phone: String,
        pub email: Option<String>,
        pub first_name: String,
        pub last_name: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Customer {
        pub id: Uuid,
        pub phone: String,
        pub first_name: String,
        pub last_name: String,
        pub email: Option<String>,
    }
}

pub mod quota {
    use super::*;

    /// Key used to count today's spins.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "value", rename_all = "snake_case")]
    pub enum CountSelector {
        NetworkAddress(String),
        Customer(Uuid),
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpinCountQuery {
        pub selector: CountSelector,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SpinCount {
        pub count: u32,
    }
}

pub mod review {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReviewQuery {
        pub customer_id: Uuid,
        pub branch_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReviewStatus {
        pub reviewed_today: bool,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ReviewClick {
        pub customer_id: Uuid,
        pub branch_id: Uuid,
        pub clicked: bool,
    }
}

pub mod prize {
    use super::*;

    /// One wheel segment. `color` is a CSS-style colour string (e.g. `#e4572e`).
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Prize {
        pub id: Uuid,
        pub name: String,
        pub color: String,
    }

    /// Active prizes, in wheel order.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PrizeList {
        pub prizes: Vec<Prize>,
    }
}

pub mod play {
    use super::*;
    use crate::prize::Prize;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PlayRequest {
        pub token: String,
        pub phone: String,
        pub first_name: String,
        pub last_name: String,
        pub email: Option<String>,
        pub network_address: Option<String>,
    }

    /// Server-authoritative outcome of a play.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PlayResult {
        pub prize: Prize,
        pub voucher_code: String,
    }
}

pub mod share {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct VoucherShare {
        pub voucher_code: String,
        pub from_customer_id: Uuid,
        pub branch_id: Uuid,
        pub shared_at: chrono::DateTime<chrono::Utc>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_code_uses_screaming_snake_case() {
        let body = ErrorBody {
            error: "token already used".to_string(),
            code: Some(FailureCode::TokenInvalidOrUsed),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"TOKEN_INVALID_OR_USED\""));
        assert_eq!(
            FailureCode::TokenInvalidOrUsed.as_str(),
            "TOKEN_INVALID_OR_USED"
        );
    }

    #[test]
    fn error_body_without_code_parses() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(body.error, "boom");
        assert!(body.code.is_none());
    }

    #[test]
    fn count_selector_is_tagged() {
        let json = serde_json::to_value(quota::CountSelector::NetworkAddress(
            "10.0.0.1".to_string(),
        ))
        .unwrap();
        assert_eq!(json["kind"], "network_address");
        assert_eq!(json["value"], "10.0.0.1");
    }
}
