pub mod config;
pub mod dispatch;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod notification;
pub mod service;
pub mod submission;
pub mod telegram;

#[cfg(test)]
mod testutils;

use crate::errors::RelayError;
use crate::handler::ContactRelay;
use crate::service::RelayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves the contact endpoint and the admin probes until either listener
/// fails.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    let relay = Arc::new(ContactRelay::new(&config)?);

    if !relay.is_ready() {
        tracing::warn!(
            bot_token_set = config.telegram.bot_token().is_some(),
            chat_ids_set = !config.telegram.recipients().is_empty(),
            "Telegram credentials incomplete; contact requests will fail until configured"
        );
    }

    let relay_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        RelayService::new(relay.clone()),
    );

    let admin_relay = relay.clone();
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(move || admin_relay.is_ready()),
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}
