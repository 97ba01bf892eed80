//! Application settings.
//!
//! Read from the TOML file named by `SPARAGNE_CONFIG` (default `settings`,
//! optional), then overridden by `SPARAGNE__<SECTION>__<KEY>` environment
//! variables. A missing `server` or `telegram` section disables that service.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = "settings";

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
    /// Seconds in-flight requests get to finish once shutdown starts.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Recognizer {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    pub server: String,
    /// Email of the service account. When a telegram section is present the
    /// server lets only this account act for linked chats.
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub allowed_users: Vec<u64>,
    pub login_ttl_secs: Option<u64>,
    /// IANA name, e.g. `Asia/Jakarta`.
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    pub recognizer: Option<Recognizer>,
    pub telegram: Option<Telegram>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_shutdown_grace() -> u64 {
    10
}

fn default_port() -> u16 {
    3400
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let path = std::env::var("SPARAGNE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
        Self::from_config(
            Config::builder()
                .add_source(File::with_name(&path).required(false))
                .add_source(
                    Environment::with_prefix("SPARAGNE")
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true)
                        .list_separator(",")
                        .with_list_parse_key("telegram.allowed_users"),
                )
                .build()?,
        )
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }
}
