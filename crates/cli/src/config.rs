//! Client configuration: optional TOML file layered under `OTTER__*` variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use otter_sdk::{ContractAddresses, DispatchConfig, Network};
use otter_types::{Address, OtterError, OtterResult};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `OTTER__NETWORK__RPC_URL`
pub const ENV_PREFIX: &str = "OTTER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtterConfig {
    pub network: NetworkConfig,
    pub contracts: ContractAddresses,
    pub wallet: WalletConfig,
    pub history: HistoryConfig,
    pub dispatch: DispatchSettings,
    pub events: EventSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
}

/// Account the node signs for; read-only commands work without one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub account: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Persisted transaction log
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let anvil = Network::anvil();
        Self {
            chain_id: anvil.chain_id,
            rpc_url: anvil.rpc_url,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("otter-history.json"),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            receipt_poll_interval_ms: 1000,
            receipt_timeout_secs: 120,
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { poll_interval_secs: 4 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OtterConfig {
    /// Load `path` if it exists, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.to_path_buf()).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {}", path.display()))
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> OtterResult<()> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(OtterError::invalid_parameter("network.rpc_url", "empty", "RPC endpoint URL"));
        }
        if self.network.chain_id == 0 {
            return Err(OtterError::invalid_parameter("network.chain_id", "0", "greater than 0"));
        }

        self.contracts.validate()?;

        if let Some(account) = self.wallet.account {
            if account.is_zero() {
                return Err(OtterError::invalid_parameter("wallet.account", &account.to_string(), "non-zero address"));
            }
        }

        if self.dispatch.receipt_poll_interval_ms == 0 {
            return Err(OtterError::invalid_parameter("dispatch.receipt_poll_interval_ms", "0", "greater than 0"));
        }
        if self.dispatch.receipt_timeout_secs * 1000 < self.dispatch.receipt_poll_interval_ms {
            return Err(OtterError::invalid_parameter(
                "dispatch.receipt_timeout_secs",
                &self.dispatch.receipt_timeout_secs.to_string(),
                "at least one poll interval",
            ));
        }
        if self.events.poll_interval_secs == 0 {
            return Err(OtterError::invalid_parameter("events.poll_interval_secs", "0", "greater than 0"));
        }
        if self.history.path.as_os_str().is_empty() {
            return Err(OtterError::invalid_parameter("history.path", "empty", "file path"));
        }
        Ok(())
    }

    /// Known chain with the configured endpoint
    pub fn network(&self) -> Network {
        Network::with_rpc_url(self.network.chain_id, &self.network.rpc_url)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            receipt_poll_interval: Duration::from_millis(self.dispatch.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_secs(self.dispatch.receipt_timeout_secs),
        }
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_secs(self.events.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = OtterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network().chain_id, 31337);
        assert_eq!(config.dispatch_config(), DispatchConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = OtterConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.history.path, PathBuf::from("otter-history.json"));
        assert_eq!(config.contracts, ContractAddresses::local());
    }

    #[test]
    fn test_file_overrides_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("otter.toml");
        std::fs::write(
            &path,
            r#"
[network]
chain_id = 4202
rpc_url = "https://rpc.sepolia-api.lisk.com"

[wallet]
account = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"

[dispatch]
receipt_timeout_secs = 30

[contracts]
asset_registry = "0x1111111111111111111111111111111111111111"
"#,
        )
        .unwrap();

        let config = OtterConfig::load(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.network().name, "Lisk Sepolia");
        assert!(config.wallet.account.is_some());
        assert_eq!(config.dispatch.receipt_timeout_secs, 30);
        assert_eq!(config.dispatch.receipt_poll_interval_ms, 1000);
        assert_eq!(config.contracts.asset_registry, Address([0x11; 20]));
        assert_eq!(config.contracts.settlement_token, ContractAddresses::local().settlement_token);
    }

    #[test]
    fn test_validation() {
        let mut config = OtterConfig::default();
        config.network.rpc_url = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.dispatch.receipt_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.events.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.contracts.revenue_escrow = config.contracts.revenue_oracle;
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.wallet.account = Some(Address::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = OtterConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[network]"));
        let parsed: OtterConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
