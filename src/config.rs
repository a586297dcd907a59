use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::spreadsheet::DEFAULT_MAX_CELLS;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_TTL_SECS: u64 = 60 * 60; // 1 hour
const DEFAULT_SWEEP_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Server settings.
///
/// Defaults are overridden by environment variables:
/// * `SHEETEDIT_ADDR` - listen address (`host:port`); `PORT` alone changes only the port
/// * `SHEETEDIT_TTL_SECS` - idle time before an upload is evicted, `0` keeps uploads forever
/// * `SHEETEDIT_SWEEP_SECS` - how often expired uploads are swept
/// * `SHEETEDIT_MAX_UPLOAD_BYTES` - request body limit for uploads
/// * `SHEETEDIT_MAX_CELLS` - data cells a sheet may grow to through cell edits
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub max_upload_bytes: usize,
    pub max_cells: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            ttl: Some(Duration::from_secs(DEFAULT_TTL_SECS)),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = ServerConfig::default();

        if let Some(addr) = lookup("SHEETEDIT_ADDR") {
            config.addr = parse_addr(&addr)?;
        } else if let Some(port) = lookup("PORT") {
            config.addr.set_port(parse_number("PORT", &port)?);
        }

        if let Some(ttl) = lookup("SHEETEDIT_TTL_SECS") {
            let secs: u64 = parse_number("SHEETEDIT_TTL_SECS", &ttl)?;
            config.ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(sweep) = lookup("SHEETEDIT_SWEEP_SECS") {
            let secs: u64 = parse_number("SHEETEDIT_SWEEP_SECS", &sweep)?;
            if secs == 0 {
                return Err("SHEETEDIT_SWEEP_SECS must be positive".to_string());
            }
            config.sweep_interval = Duration::from_secs(secs);
        }

        if let Some(limit) = lookup("SHEETEDIT_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_number("SHEETEDIT_MAX_UPLOAD_BYTES", &limit)?;
        }

        if let Some(cells) = lookup("SHEETEDIT_MAX_CELLS") {
            config.max_cells = parse_number("SHEETEDIT_MAX_CELLS", &cells)?;
        }

        Ok(config)
    }
}

pub fn parse_addr(value: &str) -> Result<SocketAddr, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid listen address: {}", value))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a number, got {:?}", key, value))
}
