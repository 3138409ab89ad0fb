use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use tokio::sync::Mutex;

use std::sync::Arc;

use crate::{customer, play, review, session, store::Store};

#[derive(Clone, Debug)]
struct AdminCredentials {
    username: String,
    password: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<Mutex<Store>>,
    admin: Option<Arc<AdminCredentials>>,
}

impl ServerState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            admin: None,
        }
    }

    /// Enable the admin endpoints for these credentials.
    pub fn with_admin(mut self, username: &str, password: &str) -> Self {
        self.admin = Some(Arc::new(AdminCredentials {
            username: username.to_string(),
            password: password.to_string(),
        }));
        self
    }
}

async fn admin_auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (Some(admin), Some(TypedHeader(auth))) = (state.admin.as_deref(), auth_header) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if auth.username().is_empty() || auth.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if auth.username() != admin.username || auth.password() != admin.password {
        tracing::warn!("rejected admin credentials for {}", auth.username());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let admin = Router::new()
        .route("/tokens", post(session::issue_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/session/validate", post(session::validate))
        .route("/customers", post(customer::upsert))
        .route("/spins/count", post(play::spin_count))
        .route("/reviews/today", post(review::today))
        .route("/reviews/click", post(review::click))
        .route("/prizes", get(play::prizes))
        .route("/play", post(play::play))
        .route("/vouchers/share", post(play::share))
        .merge(admin)
        .with_state(state)
}

pub async fn run(state: ServerState, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(state, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
