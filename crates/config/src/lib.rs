use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parley.toml",
    "config/parley.toml",
    "crates/config/parley.toml",
    "../parley.toml",
    "../config/parley.toml",
    "../crates/config/parley.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Connection settings for the message store.
///
/// ```
/// use parley_config::DatabaseConfig;
///
/// let database = DatabaseConfig::default();
/// assert_eq!(database.connect_attempts, 10);
/// assert_eq!(database.retry_delay().as_secs(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "DatabaseConfig::default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "DatabaseConfig::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl DatabaseConfig {
    const fn default_connect_attempts() -> u32 {
        10
    }

    const fn default_retry_delay_ms() -> u64 {
        2_000
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parley.db".to_string(),
            max_connections: 10,
            connect_attempts: Self::default_connect_attempts(),
            retry_delay_ms: Self::default_retry_delay_ms(),
        }
    }
}

/// Tuning for the connection registry and broadcast engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Pending frames a client may have queued before it is dropped as too slow.
    #[serde(default = "ChatConfig::default_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Upper bound on a message body in bytes. Unset means unbounded.
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
}

impl ChatConfig {
    const fn default_queue_capacity() -> usize {
        100
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: Self::default_queue_capacity(),
            max_body_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origin_prefixes: Vec<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Whether a browser origin may talk to the API or open a live connection.
    ///
    /// ```
    /// use parley_config::CorsConfig;
    ///
    /// let cors = CorsConfig::default();
    /// assert!(cors.allows("http://localhost:3000"));
    /// assert!(cors.allows("http://client:80"));
    /// assert!(!cors.allows("https://evil.example"));
    /// ```
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
            || self
                .allowed_origin_prefixes
                .iter()
                .any(|prefix| origin.starts_with(prefix.as_str()))
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin_prefixes: vec![
                "http://192.168.".to_string(),
                "http://localhost:".to_string(),
            ],
            allowed_origins: vec!["http://client:80".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "RateLimitConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RateLimitConfig::default_per_second")]
    pub per_second: f64,
    #[serde(default = "RateLimitConfig::default_burst")]
    pub burst: u32,
}

impl RateLimitConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_per_second() -> f64 {
        1.0
    }

    const fn default_burst() -> u32 {
        4
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            per_second: Self::default_per_second(),
            burst: Self::default_burst(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parley_config::load;
///
/// std::env::remove_var("PARLEY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?;

    let environment_overrides = config::Environment::with_prefix("PARLEY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLEY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLEY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.chat.outbound_queue_capacity == 0 {
        config.chat.outbound_queue_capacity = 1;
    }
    if config.database.connect_attempts == 0 {
        config.database.connect_attempts = 1;
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
