use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when no path is given.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Model used when a request does not name one
    #[arg(long, env = "DEFAULT_CHAT_MODEL_NAME")]
    pub default_model: Option<String>,

    /// Seconds to wait for the model before rolling back an exchange
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// `google_ai` or `vertex_ai`.
    pub provider: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub project: Option<String>,
    pub region: Option<String>,
    pub default_model: Option<String>,
    pub timeout_secs: u64,
    pub system_instruction: Option<String>,
}

impl GatewayConfig {
    /// Bound on a single model call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 9797)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("gateway.provider", "google_ai")?
            .set_default("gateway.timeout_secs", 120)?;

        // 2. Config file: explicit path, else ./config.yaml if present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if Path::new(CWD_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(CWD_CONFIG_FILE).required(false));
        }

        // 3. Prefixed environment, e.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Overrides beat every source: legacy env names first, then CLI
        //    flags (and the env vars clap binds to them)
        for (var, key) in [
            ("GOOGLE_PROJECT_NAME", "gateway.project"),
            ("GOOGLE_REGION", "gateway.region"),
            ("GOOGLE_API_KEY", "gateway.api_key"),
        ] {
            if let Ok(val) = env::var(var)
                && !val.trim().is_empty()
            {
                builder = builder.set_override(key, val)?;
            }
        }

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(model) = cli.default_model.filter(|m| !m.trim().is_empty()) {
            builder = builder.set_override("gateway.default_model", model)?;
        }
        if let Some(secs) = cli.timeout_secs {
            builder = builder.set_override("gateway.timeout_secs", secs)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
