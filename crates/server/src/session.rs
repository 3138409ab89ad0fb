//! Token validation and issuance.

use api_types::session::{BranchSession, SessionValidate, TokenIssue, TokenIssued};
use axum::{Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState};

/// Check that a token is known and unused. Succeeds once per token; only a
/// play consumes it.
pub async fn validate(
    State(state): State<ServerState>,
    Json(payload): Json<SessionValidate>,
) -> Result<Json<BranchSession>, ServerError> {
    let mut store = state.store.lock().await;
    Ok(Json(store.validate(payload.token.trim())?))
}

/// Issue a single-use token for a branch. Admin only.
pub async fn issue_token(
    State(state): State<ServerState>,
    Json(payload): Json<TokenIssue>,
) -> Result<(StatusCode, Json<TokenIssued>), ServerError> {
    let token = state.store.lock().await.issue_token(payload.branch_id)?;
    tracing::info!("issued token for branch {}", payload.branch_id);

    Ok((
        StatusCode::CREATED,
        Json(TokenIssued {
            token,
            branch_id: payload.branch_id,
        }),
    ))
}
