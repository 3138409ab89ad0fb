//! Review gate bookkeeping

use api_types::review::{ReviewClick, ReviewQuery, ReviewStatus};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{ServerError, server::ServerState};

pub async fn today(
    State(state): State<ServerState>,
    Json(payload): Json<ReviewQuery>,
) -> Result<Json<ReviewStatus>, ServerError> {
    let today = Utc::now().date_naive();
    let reviewed_today =
        state
            .store
            .lock()
            .await
            .reviewed_today(payload.customer_id, payload.branch_id, today);
    Ok(Json(ReviewStatus { reviewed_today }))
}

pub async fn click(
    State(state): State<ServerState>,
    Json(payload): Json<ReviewClick>,
) -> Result<StatusCode, ServerError> {
    let today = Utc::now().date_naive();
    state.store.lock().await.log_review_click(&payload, today);
    Ok(StatusCode::NO_CONTENT)
}
