//! Board-session server command: `crm-kanban serve`.

use std::sync::Arc;

use anyhow::Result;
use crm_kanban::client::HttpCrmClient;
use crm_kanban::kanban_config::KanbanConfig;
use crm_kanban::service::{ServerConfig, start_server};

pub async fn cmd_serve(config: &KanbanConfig, port: Option<u16>, dev: bool) -> Result<()> {
    config.ensure_valid()?;
    let client = HttpCrmClient::from_config(config)?;
    tracing::info!(backend = client.base_url(), "using CRM backend");

    start_server(
        ServerConfig {
            port: port.unwrap_or(config.toml.server.port),
            dev_mode: dev || config.toml.server.dev_mode,
            controller: config.controller_options(),
        },
        Arc::new(client),
    )
    .await
}
