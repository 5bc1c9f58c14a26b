//! Layered gateway configuration.
//!
//! Priority: CLI flag > CLI env var > `GATEWAY_`-prefixed env vars > config
//! file > defaults. The legacy unprefixed names of the deployed services
//! (`LLM_PROXY_URL`, `LLM_PROXY_TOKEN`, `AUTH_SERVICE_URL`) keep working via
//! the CLI env fallbacks.

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the token-streaming upstream
    #[arg(long, env = "LLM_PROXY_URL")]
    pub upstream_url: Option<String>,

    /// Bearer credential for the upstream
    #[arg(long, env = "LLM_PROXY_TOKEN")]
    pub upstream_token: Option<String>,

    /// Base URL of the identity service used for token verification
    #[arg(long, env = "AUTH_SERVICE_URL")]
    pub auth_service_url: Option<String>,

    /// Allowed CORS origin ("*" for any)
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Empty means not configured: the streaming routes answer 503.
    pub base_url: String,
    pub token: String,
}

impl UpstreamConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Empty means open mode: no token verification on any route.
    pub service_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.service_url.trim().is_empty()
    }

    /// Profile endpoint derived from the service base URL.
    #[must_use]
    pub fn profile_url(&self) -> String {
        format!(
            "{}/api/v1/user/profile",
            self.service_url.trim().trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Stricter limiter guarding the authenticated chat routes.
    pub auth_limit: usize,
    pub auth_window_secs: u64,
    /// Looser limiter guarding every route.
    pub general_limit: usize,
    pub general_window_secs: u64,
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

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8090)?
            .set_default("server.allowed_origins", "*")?
            .set_default("upstream.base_url", "")?
            .set_default("upstream.token", "")?
            .set_default("auth.service_url", "")?
            .set_default("limits.auth_limit", 50)?
            .set_default("limits.auth_window_secs", 60)?
            .set_default("limits.general_limit", 100)?
            .set_default("limits.general_window_secs", 60)?;

        // Optional config file: explicit path wins, ./config.* is a fallback.
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }

        // Environment variables prefixed with GATEWAY_, e.g. GATEWAY_SERVER__PORT.
        builder = builder.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags and their env fallbacks override everything else.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.upstream_url {
            builder = builder.set_override("upstream.base_url", url)?;
        }
        if let Some(token) = cli.upstream_token {
            builder = builder.set_override("upstream.token", token)?;
        }
        if let Some(url) = cli.auth_service_url {
            builder = builder.set_override("auth.service_url", url)?;
        }
        if let Some(origins) = cli.allowed_origins {
            builder = builder.set_override("server.allowed_origins", origins)?;
        }

        builder.build()?.try_deserialize()
    }
}
