//! Timing configuration for keyword and device operations

use lazy_static::lazy_static;
use std::env;
use std::time::Duration;

/// Longest wait or delay any keyword accepts
pub const MAX_WAIT: Duration = Duration::from_secs(7 * 24 * 3600);

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Defaults applied by the by-locator keywords when no primitive is supplied
#[derive(Debug, Clone)]
pub struct LocatorTimingConfig {
    pub default_timeout: f64,
    pub set_text_timeout: f64,
    pub long_click_duration: f64,
    pub exists_delay: f64,
}

impl Default for LocatorTimingConfig {
    fn default() -> Self {
        Self {
            default_timeout: env_f64("U2KW_LOCATOR_TIMEOUT", 10.0),
            set_text_timeout: env_f64("U2KW_SET_TEXT_TIMEOUT", 5.0),
            long_click_duration: env_f64("U2KW_LONG_CLICK_DURATION", 1.0),
            exists_delay: env_f64("U2KW_EXISTS_DELAY", 0.0),
        }
    }
}

/// Xpath query timing
#[derive(Debug, Clone)]
pub struct XpathTimingConfig {
    pub default_timeout: f64,
    pub poll_interval: f64,
}

impl Default for XpathTimingConfig {
    fn default() -> Self {
        Self {
            default_timeout: env_f64("U2KW_XPATH_TIMEOUT", 10.0),
            poll_interval: env_f64("U2KW_XPATH_POLL_INTERVAL", 0.5),
        }
    }
}

/// Device timing configuration for screen and app operations
#[derive(Debug, Clone)]
pub struct DeviceTimingConfig {
    pub double_click_interval: f64,
    pub long_click_duration: f64,
    pub swipe_steps: u32,
    pub deep_scroll_delay: f64,
    pub deep_scroll_max_rounds: u32,
    pub activity_timeout: f64,
    pub app_start_timeout: f64,
    pub toast_wait: f64,
    pub toast_cache: f64,
}

impl Default for DeviceTimingConfig {
    fn default() -> Self {
        Self {
            double_click_interval: env_f64("U2KW_DOUBLE_CLICK_INTERVAL", 0.1),
            long_click_duration: env_f64("U2KW_SCREEN_LONG_CLICK_DURATION", 1.0),
            swipe_steps: env_u32("U2KW_SWIPE_STEPS", 55),
            deep_scroll_delay: env_f64("U2KW_DEEP_SCROLL_DELAY", 3.0),
            deep_scroll_max_rounds: env_u32("U2KW_DEEP_SCROLL_MAX_ROUNDS", 30),
            activity_timeout: env_f64("U2KW_ACTIVITY_TIMEOUT", 10.0),
            app_start_timeout: env_f64("U2KW_APP_START_TIMEOUT", 20.0),
            toast_wait: env_f64("U2KW_TOAST_WAIT", 10.0),
            toast_cache: env_f64("U2KW_TOAST_CACHE", 10.0),
        }
    }
}

/// Connection timing configuration for the device agent
#[derive(Debug, Clone)]
pub struct ConnectionTimingConfig {
    pub connect_timeout: f64,
    pub rpc_timeout: f64,
}

impl Default for ConnectionTimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout: env_f64("U2KW_CONNECT_TIMEOUT", 10.0),
            rpc_timeout: env_f64("U2KW_RPC_TIMEOUT", 60.0),
        }
    }
}

/// Master timing configuration
#[derive(Debug, Clone, Default)]
pub struct TimingConfig {
    pub locator: LocatorTimingConfig,
    pub xpath: XpathTimingConfig,
    pub device: DeviceTimingConfig,
    pub connection: ConnectionTimingConfig,
}

/// Seconds as a `Duration`; `None` when negative, NaN or longer than `MAX_WAIT`
pub fn try_secs(value: f64) -> Option<Duration> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| *d <= MAX_WAIT)
}

/// Convert a configured number of seconds into a `Duration`, clamped to `0..=MAX_WAIT`
pub fn secs(value: f64) -> Duration {
    if value.is_nan() {
        return Duration::ZERO;
    }
    try_secs(value.max(0.0)).unwrap_or(MAX_WAIT)
}

lazy_static! {
    /// Global timing configuration instance
    pub static ref TIMING_CONFIG: TimingConfig = TimingConfig::default();
}
