//! Review gate in front of the wheel.
//!
//! The gate is bypassed when the backend reports a review already logged
//! today for the customer at this branch. Otherwise the customer opens the
//! external review page and confirms; the confirmation is trusted as-is.

use std::sync::Arc;

use api_types::review::ReviewClick;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::{RewardBackend, events::SessionEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewGate {
    review_url: String,
    customer_id: Uuid,
    branch_id: Uuid,
    rated: bool,
}

impl ReviewGate {
    pub fn new(review_url: &str, customer_id: Uuid, branch_id: Uuid) -> Self {
        Self {
            review_url: review_url.to_string(),
            customer_id,
            branch_id,
            rated: false,
        }
    }

    pub fn review_url(&self) -> &str {
        &self.review_url
    }

    /// Whether the "I have rated" confirmation is available.
    pub fn can_confirm(&self) -> bool {
        self.rated
    }

    /// Open the review page: logs the click in the background and flips the
    /// confirmation affordance. Returns the URL to open in a new context.
    pub(crate) fn open<B: RewardBackend>(
        &mut self,
        backend: &Arc<B>,
        events: Option<UnboundedSender<SessionEvent>>,
    ) -> &str {
        let click = ReviewClick {
            customer_id: self.customer_id,
            branch_id: self.branch_id,
            clicked: true,
        };
        let backend = Arc::clone(backend);
        crate::events::detach("log review click", events, async move {
            backend.log_review_click(&click).await
        });

        self.rated = true;
        &self.review_url
    }
}

/// Whether the gate can be skipped. A failed lookup counts as "not reviewed".
pub(crate) async fn reviewed_today<B: RewardBackend>(
    backend: &B,
    customer_id: Uuid,
    branch_id: Uuid,
    events: Option<&UnboundedSender<SessionEvent>>,
) -> bool {
    match backend.has_reviewed_today(customer_id, branch_id).await {
        Ok(reviewed) => reviewed,
        Err(err) => {
            tracing::warn!("review check failed, showing the gate: {err}");
            if let Some(events) = events {
                let _ = events.send(SessionEvent::BestEffortFailed {
                    operation: "check review",
                    message: err.to_string(),
                });
            }
            false
        }
    }
}
