// --- File: crates/slotsync_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- Pull API Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the booking API, without trailing slash.
    /// `GET {base_url}/availability` and `POST {base_url}/bulk-availability` hang off it.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

// --- Live Feed Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RealtimeConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Upper bound on one WebSocket handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Open the live connection as soon as the sync core is built.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_secs: default_connect_timeout_secs(),
            auto_connect: true,
        }
    }
}

// --- Availability Cache Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_popular_ttl_secs")]
    pub popular_ttl_secs: u64,
    #[serde(default = "default_regular_ttl_secs")]
    pub regular_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Weekday names ("Mon".."Sun") that count as high-contention dates.
    #[serde(default = "default_popular_days")]
    pub popular_days: Vec<String>,
    #[serde(default = "default_prefetch_lookahead_days")]
    pub prefetch_lookahead_days: i64,
    #[serde(default = "default_popular_horizon_days")]
    pub popular_horizon_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            popular_ttl_secs: default_popular_ttl_secs(),
            regular_ttl_secs: default_regular_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            popular_days: default_popular_days(),
            prefetch_lookahead_days: default_prefetch_lookahead_days(),
            popular_horizon_days: default_popular_horizon_days(),
        }
    }
}

// --- Notification Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_toast_ttl_secs")]
    pub toast_ttl_secs: u64,
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            toast_ttl_secs: default_toast_ttl_secs(),
            dedup_window_ms: default_dedup_window_ms(),
        }
    }
}

// --- Booking Flow Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BookingConfig {
    /// IANA zone that defines "today" for prefetch and suggestions.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_min_advance_days")]
    pub min_advance_days: i64,
    #[serde(default = "default_suggestion_window_days")]
    pub suggestion_window_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            min_advance_days: default_min_advance_days(),
            suggestion_window_days: default_suggestion_window_days(),
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api/booking".to_string()
}
fn default_api_timeout_secs() -> u64 {
    30
}
fn default_ws_url() -> String {
    "ws://localhost:8000/ws/booking-updates".to_string()
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_reconnect_base_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_popular_ttl_secs() -> u64 {
    120
}
fn default_regular_ttl_secs() -> u64 {
    300
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_popular_days() -> Vec<String> {
    vec!["Fri".to_string(), "Sat".to_string(), "Sun".to_string()]
}
fn default_prefetch_lookahead_days() -> i64 {
    3
}
fn default_popular_horizon_days() -> i64 {
    14
}
fn default_toast_ttl_secs() -> u64 {
    5
}
fn default_dedup_window_ms() -> u64 {
    1_000
}
fn default_time_zone() -> String {
    "UTC".to_string()
}
fn default_min_advance_days() -> i64 {
    2
}
fn default_suggestion_window_days() -> i64 {
    30
}
