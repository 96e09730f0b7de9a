//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (wallet id, bot token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::intake::IntakeConfig;
use crate::engine::settlement::SettlementConfig;
use crate::odds::OddsConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub wallet: WalletConfig,
    pub fullnode: FullnodeConfig,
    pub telegram: TelegramConfig,
    pub dice: DiceConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    /// Network name used in explorer links ("mainnet", "testnet").
    pub network: String,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// Headless wallet base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub wallet_id_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FullnodeConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiceConfig {
    pub contract_id: String,
    pub token_id: String,
    pub bit_length: u32,
    pub house_edge_basis_points: u32,
    pub max_multiplier: f64,
    pub min_threshold: u64,
    pub max_threshold: u64,
    /// Largest accepted stake, in minor units (1 HTR = 100).
    pub max_bet_minor_units: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub ledger_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn odds_config(&self) -> OddsConfig {
        OddsConfig {
            bit_length: self.dice.bit_length,
            house_edge_basis_points: self.dice.house_edge_basis_points,
            max_multiplier: self.dice.max_multiplier,
            min_threshold: self.dice.min_threshold,
            max_threshold: self.dice.max_threshold,
        }
    }

    pub fn intake_config(&self) -> IntakeConfig {
        IntakeConfig {
            contract_id: self.dice.contract_id.clone(),
            token_id: self.dice.token_id.clone(),
            max_bet_minor_units: self.dice.max_bet_minor_units,
        }
    }

    pub fn settlement_config(&self) -> SettlementConfig {
        SettlementConfig {
            contract_id: self.dice.contract_id.clone(),
            token_id: self.dice.token_id.clone(),
            network: self.bot.network.clone(),
            poll_interval: Duration::from_secs(self.bot.poll_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [bot]
            name = "DICE-001"
            network = "testnet"
            poll_interval_secs = 15

            [wallet]
            base_url = "http://localhost:8000"
            wallet_id_env = "HATHOR_WALLET_ID"

            [fullnode]
            base_url = "https://node1.testnet.hathor.network"

            [telegram]
            bot_token_env = "TELEGRAM_BOT_TOKEN"

            [dice]
            contract_id = "00c0ffee"
            token_id = "00"
            bit_length = 16
            house_edge_basis_points = 190
            max_multiplier = 100.0
            min_threshold = 1
            max_threshold = 65535
            max_bet_minor_units = 10000

            [storage]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.bot.network, "testnet");
        assert_eq!(cfg.bot.poll_interval_secs, 15);
        assert_eq!(cfg.dice.bit_length, 16);
        assert_eq!(cfg.dice.house_edge_basis_points, 190);
        assert!(cfg.storage.ledger_path.is_none());

        let odds = cfg.odds_config();
        assert_eq!(odds.max_threshold, 65535);
        let settlement = cfg.settlement_config();
        assert_eq!(settlement.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("DEFINITELY_NOT_SET_12345").is_err());
    }
}
