//! Conversation server entry point.

use std::sync::Arc;

use anyhow::Context;
use mimalloc::MiMalloc;

use chat_sessions::config::AppConfig;
use chat_sessions::llm::{GatewaySettings, GeminiDriver};
use chat_sessions::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before anything reads the environment
    let _ = dotenvy::dotenv();

    telemetry::init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let settings = GatewaySettings::from_config(&config.gateway)
        .map_err(|msg| anyhow::anyhow!("Configuration error: {msg}"))?;

    tracing::info!(
        provider = ?settings.provider,
        base_url = %settings.base_url,
        api_key_present = settings.api_key.is_some(),
        "Model gateway configured"
    );

    if let Some(warning) = settings.credential_warning() {
        tracing::warn!(provider = ?settings.provider, "{warning}");
    }

    let gateway = Arc::new(GeminiDriver::new(settings));

    server::start_server(Arc::new(config), gateway).await
}
