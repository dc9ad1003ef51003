use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub payfast: PayFastConfig,
    #[serde(default)]
    pub yoco: YocoConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PayFastConfig {
    pub merchant_id: Option<String>,
    pub merchant_key: Option<String>,
    pub passphrase: Option<String>,
    /// Server-to-server confirmation of received notifications against
    /// the gateway's /query/validate endpoint before trusting them.
    #[serde(default)]
    pub validate_with_gateway: bool,
    #[serde(default = "default_payfast_host")]
    pub host: String,
    #[serde(default)]
    pub enabled: bool,
}

fn default_payfast_host() -> String {
    "https://www.payfast.co.za".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct YocoConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_yoco_host")]
    pub host: String,
    #[serde(default)]
    pub enabled: bool,
}

fn default_yoco_host() -> String {
    "https://payments.yoco.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Window length in seconds shared by all route classes.
    pub window_secs: u64,
    pub auth_limit: u32,
    pub read_limit: u32,
    pub write_limit: u32,
    /// Maximum number of caller windows held in memory at once.
    pub max_tracked_callers: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            auth_limit: 10,
            read_limit: 120,
            write_limit: 30,
            max_tracked_callers: 10_000,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.max_connections", 10)?
            .set_default("payfast.enabled", false)?
            .set_default("yoco.enabled", false)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with SALTO__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("SALTO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://salto.db".to_string(),
                max_connections: 10,
            },
            payfast: PayFastConfig::default(),
            yoco: YocoConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
