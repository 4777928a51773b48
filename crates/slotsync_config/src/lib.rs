use chrono::Weekday;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use std::env;
pub mod models;
pub use models::*;

/// Loads the layered configuration:
/// `config/default.*`, then `config/{RUN_ENV}.*`, then `SLOTSYNC_*` environment variables.
///
/// Every field has a default, so a missing config directory is not an error.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "SLOTSYNC".to_string());

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", run_env)).required(false))
        .add_source(
            Environment::with_prefix(&prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cache.popular_days"),
        );

    tracing::debug!("Loading configuration for RUN_ENV={}", run_env);

    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Parses a TOML document into a validated `AppConfig`.
pub fn parse_config(toml: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Rejects values the sync core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Message(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if !(self.realtime.ws_url.starts_with("ws://") || self.realtime.ws_url.starts_with("wss://"))
        {
            return Err(ConfigError::Message(format!(
                "realtime.ws_url must be a ws(s) URL, got '{}'",
                self.realtime.ws_url
            )));
        }
        if self.realtime.max_reconnect_attempts == 0 {
            return Err(ConfigError::Message(
                "realtime.max_reconnect_attempts must be at least 1".to_string(),
            ));
        }
        if self.realtime.reconnect_base_ms == 0
            || self.realtime.reconnect_max_ms < self.realtime.reconnect_base_ms
        {
            return Err(ConfigError::Message(
                "realtime reconnect delays must satisfy 0 < base <= max".to_string(),
            ));
        }
        if self.cache.popular_ttl_secs == 0 || self.cache.regular_ttl_secs == 0 {
            return Err(ConfigError::Message("cache TTLs must be non-zero".to_string()));
        }
        let intervals = [
            ("realtime.heartbeat_secs", self.realtime.heartbeat_secs),
            ("realtime.connect_timeout_secs", self.realtime.connect_timeout_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs),
            ("notifications.toast_ttl_secs", self.notifications.toast_ttl_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Message(format!("{} must be non-zero", name)));
        }
        self.popular_weekdays()?;
        self.time_zone()?;
        Ok(())
    }

    /// The configured popular weekdays, parsed.
    pub fn popular_weekdays(&self) -> Result<Vec<Weekday>, ConfigError> {
        self.cache
            .popular_days
            .iter()
            .map(|day| {
                day.trim().parse::<Weekday>().map_err(|_| {
                    ConfigError::Message(format!("unknown weekday in cache.popular_days: '{}'", day))
                })
            })
            .collect()
    }

    /// The configured booking time zone, parsed.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.booking.time_zone.parse::<Tz>().map_err(|_| {
            ConfigError::Message(format!(
                "unknown time zone in booking.time_zone: '{}'",
                self.booking.time_zone
            ))
        })
    }
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Loads the dotenv file into the process environment exactly once.
///
/// The path is taken from `DOTENV_OVERRIDE`, falling back to `.env`.
/// Returns the path that was (or would have been) loaded.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}
