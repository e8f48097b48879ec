//! Environment-driven server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the server reads from its environment, with defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upstream Solana RPC endpoint (`CHAINMIX_RPC_URL`).
    pub rpc_url: String,
    /// Default finalized blocks per draw (`CHAINMIX_BLOCKS`).
    pub default_blocks: usize,
    /// Draw history directory (`CHAINMIX_STORE_DIR`).
    pub store_dir: PathBuf,
    /// Whether the periodic auto-draw task runs (`CHAINMIX_AUTO_DRAW`).
    pub auto_draw: bool,
    /// Pause between auto draws, seconds (`CHAINMIX_AUTO_DRAW_INTERVAL_SECS`).
    pub auto_draw_interval: Duration,
    /// Idle entropy pools older than this are evicted
    /// (`CHAINMIX_POOL_IDLE_SECS`).
    pub pool_idle: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            default_blocks: 3,
            store_dir: PathBuf::from("./storage/draws"),
            auto_draw: true,
            auto_draw_interval: Duration::from_secs(10),
            pool_idle: Duration::from_secs(3600),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rpc_url: env_string("CHAINMIX_RPC_URL").unwrap_or(defaults.rpc_url),
            default_blocks: env_parsed("CHAINMIX_BLOCKS").unwrap_or(defaults.default_blocks),
            store_dir: env_string("CHAINMIX_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            auto_draw: env_parsed("CHAINMIX_AUTO_DRAW").unwrap_or(defaults.auto_draw),
            auto_draw_interval: env_parsed("CHAINMIX_AUTO_DRAW_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.auto_draw_interval),
            pool_idle: env_parsed("CHAINMIX_POOL_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring malformed {key}={raw}");
            None
        }
    }
}
