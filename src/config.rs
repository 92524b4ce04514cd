use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::schema::Address;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - The ordered list of monitored addresses
// - Collection cadence and per-call timeout
// - Backend endpoints (token node, DWH)
// - The InfluxDB sink
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Addresses to monitor, processed in this order every cycle
    pub addresses: Vec<Address>,

    /// Seconds between collection cycles
    #[serde(default = "default_secs")]
    pub interval_secs: u64,

    /// Timeout applied to each individual backend call
    #[serde(default = "default_secs")]
    pub call_timeout_secs: u64,

    pub token: TokenConfig,

    pub dwh: DwhConfig,

    pub influx: InfluxConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

fn default_secs() -> u64 {
    60
}

// ------------------------------------------------------------
// Token API configuration
// ------------------------------------------------------------
//
// Balances are read with `eth_call` against an Ethereum JSON-RPC
// node, calling `balanceOf` on the token contract.
//
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// JSON-RPC endpoint URL
    pub url: String,

    /// ERC-20 token contract address
    pub contract: Address,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DwhConfig {
    /// Base URL of the DWH HTTP gateway
    pub url: String,
}

// ------------------------------------------------------------
// InfluxDB configuration
// ------------------------------------------------------------
//
// Notes:
// - Credentials are optional and sent as `u` / `p` query params.
// - `demo` disables network writes; points are only logged.
//
#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub url: String,

    pub database: String,

    pub username: Option<String>,

    pub password: Option<String>,

    pub demo: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Enables debug level logging when RUST_LOG is not set
    pub log: Option<bool>,
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_json(&data).with_context(|| format!("invalid config file {path}"))
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.addresses.is_empty() {
            bail!("`addresses` must list at least one address");
        }
        if self.interval_secs == 0 {
            bail!("`interval_secs` must be greater than zero");
        }
        if self.call_timeout_secs == 0 {
            bail!("`call_timeout_secs` must be greater than zero");
        }

        let mut seen = HashSet::with_capacity(self.addresses.len());
        for addr in &self.addresses {
            if !seen.insert(addr) {
                bail!("address {addr} is listed more than once");
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn verbose(&self) -> bool {
        self.debug.as_ref().and_then(|d| d.log).unwrap_or(false)
    }
}
