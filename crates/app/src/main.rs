use std::{sync::Arc, time::Duration};

use client::{HttpAddressLookup, HttpBackend};
use engine::NoAddressLookup;
use server::{ServerState, Store};

mod error;
mod redeem;
mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::load()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spinwheel={level},engine={level},client={level},server={level}",
            level = settings.level
        ))
        .init();

    if let Some(server) = settings.server.clone() {
        tracing::info!("Found server settings...");
        let mut state = ServerState::new(Store::from_seed(server.seed()));
        if let (Some(username), Some(password)) = (&server.admin_username, &server.admin_password)
        {
            state = state.with_admin(username, password);
        }
        // Bound before the session starts so a local link can reach it.
        let listener = tokio::net::TcpListener::bind(server.addr()).await?;
        tasks.spawn(async move {
            if let Err(err) = server::run_with_listener(state, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(link) = settings.link.clone() {
        let backend = Arc::new(
            HttpBackend::builder()
                .base_url(&settings.base_url)
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()?,
        );
        let timeout = Duration::from_secs(settings.timeout_secs);
        let lookup = settings
            .lookup_url
            .as_deref()
            .map(|url| HttpAddressLookup::new(url, timeout))
            .transpose()?;

        tasks.spawn(async move {
            let result = match lookup {
                Some(lookup) => redeem::run(&settings, &link, backend, Arc::new(lookup)).await,
                None => redeem::run(&settings, &link, backend, Arc::new(NoAddressLookup)).await,
            };
            if let Err(err) = result {
                tracing::error!("session ended: {err}");
            }
        });
    } else if tasks.is_empty() {
        tracing::warn!("nothing to do: pass --link to redeem or --serve to run the backend");
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}
