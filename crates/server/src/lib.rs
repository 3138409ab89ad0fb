//! Reference reward backend.
//!
//! An in-memory axum service speaking the same JSON protocol the `client`
//! crate expects. Prize selection is uniform over the active prizes.

use api_types::{ErrorBody, FailureCode};
use axum::{Json, http::StatusCode, response::IntoResponse};

pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};
pub use store::{BranchSeed, DAILY_SPIN_CAP, PrizeSeed, Seed, Store};

mod customer;
mod play;
mod review;
mod server;
mod session;
mod store;

#[derive(Debug)]
pub enum ServerError {
    /// Business rejection the client classifies by its failure code.
    Rejected(FailureCode, String),
    NotFound(String),
    Validation(String),
}

fn status_for_code(code: FailureCode) -> StatusCode {
    match code {
        FailureCode::TokenInvalidOrUsed => StatusCode::FORBIDDEN,
        FailureCode::DailyLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        FailureCode::NoPrizesConfigured => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Rejected(code, error) => {
                tracing::debug!("rejected with {}: {error}", code.as_str());
                (
                    status_for_code(code),
                    ErrorBody {
                        error,
                        code: Some(code),
                    },
                )
            }
            ServerError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("{what} not found"),
                    code: None,
                },
            ),
            ServerError::Validation(error) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody { error, code: None },
            ),
        };

        (status, Json(body)).into_response()
    }
}
