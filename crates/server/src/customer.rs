use api_types::customer::{Customer, CustomerUpsert};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

/// Create or update a customer keyed by phone
pub async fn upsert(
    State(state): State<ServerState>,
    Json(payload): Json<CustomerUpsert>,
) -> Result<Json<Customer>, ServerError> {
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ServerError::Validation("name required".to_string()));
    }
    let customer = state.store.lock().await.upsert_customer(&payload)?;
    Ok(Json(customer))
}
