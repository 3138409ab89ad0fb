//! Quota, prizes, plays and voucher shares.

use api_types::{
    play::{PlayRequest, PlayResult},
    prize::PrizeList,
    quota::{SpinCount, SpinCountQuery},
    share::VoucherShare,
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use rand::Rng;

use crate::{ServerError, server::ServerState};

pub async fn spin_count(
    State(state): State<ServerState>,
    Json(payload): Json<SpinCountQuery>,
) -> Result<Json<SpinCount>, ServerError> {
    let today = Utc::now().date_naive();
    let count = state.store.lock().await.spin_count(&payload.selector, today);
    Ok(Json(SpinCount { count }))
}

/// Active prizes in wheel order
pub async fn prizes(State(state): State<ServerState>) -> Result<Json<PrizeList>, ServerError> {
    let prizes = state.store.lock().await.active_prizes();
    Ok(Json(PrizeList { prizes }))
}

/// Draw a prize for a valid token and issue its voucher code.
pub async fn play(
    State(state): State<ServerState>,
    Json(payload): Json<PlayRequest>,
) -> Result<Json<PlayResult>, ServerError> {
    let today = Utc::now().date_naive();
    let result = state
        .store
        .lock()
        .await
        .play(&payload, today, uniform_pick)?;
    Ok(Json(result))
}

pub async fn share(
    State(state): State<ServerState>,
    Json(payload): Json<VoucherShare>,
) -> Result<StatusCode, ServerError> {
    tracing::debug!("voucher {} shared", payload.voucher_code);
    let today = Utc::now().date_naive();
    state.store.lock().await.log_share(payload, today);
    Ok(StatusCode::NO_CONTENT)
}

fn uniform_pick(count: usize) -> usize {
    rand::rng().random_range(0..count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_pick_stays_in_range() {
        for count in 1..=8 {
            for _ in 0..200 {
                assert!(uniform_pick(count) < count);
            }
        }
    }

    #[test]
    fn uniform_pick_reaches_every_prize() {
        let mut seen = [false; 4];
        for _ in 0..1000 {
            seen[uniform_pick(4)] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }
}
