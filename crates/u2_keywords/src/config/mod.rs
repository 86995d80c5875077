//! Configuration module
//!
//! - `timing`: default timeouts, delays and loop bounds, overridable through `U2KW_*` env vars

mod timing;

pub use timing::{
    secs, try_secs, ConnectionTimingConfig, DeviceTimingConfig, LocatorTimingConfig, TimingConfig,
    XpathTimingConfig, MAX_WAIT, TIMING_CONFIG,
};

/// Port the device agent listens on; it proxies the uiautomator JSON-RPC server
pub const AGENT_PORT: u16 = 7912;

/// Path of the JSON-RPC endpoint on the device agent
pub const JSONRPC_PATH: &str = "/jsonrpc/0";
