//! Deployment configuration
//!
//! The parameters a ledger is deployed with. Stored as `config.json` in the
//! data directory; CLI flags override individual fields.

use crate::token::units::amount_string;
use crate::token::{MintPolicy, TokenError, TokenMetadata};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid token parameters: {0}")]
    InvalidToken(#[from] TokenError),
}

/// Ledger deployment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Raw units credited to the deployer
    #[serde(with = "amount_string")]
    pub initial_supply: u128,
    pub mint_policy: MintPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: "Testing Token".to_string(),
            symbol: "TT".to_string(),
            decimals: 6,
            // 100 000 TT
            initial_supply: 100_000_000_000,
            mint_policy: MintPolicy::Owner,
        }
    }
}

impl LedgerConfig {
    /// Validated token metadata
    pub fn metadata(&self) -> Result<TokenMetadata, TokenError> {
        TokenMetadata::new(self.name.clone(), self.symbol.clone(), self.decimals)
    }

    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.metadata()?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        let metadata = config.metadata().unwrap();

        assert_eq!(metadata.name, "Testing Token");
        assert_eq!(metadata.symbol, "TT");
        assert_eq!(metadata.decimals, 6);
        assert_eq!(config.mint_policy, MintPolicy::Owner);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig::load(&temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn test_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        let config = LedgerConfig {
            name: "Other".to_string(),
            symbol: "OTH".to_string(),
            decimals: 2,
            initial_supply: 5_000,
            mint_policy: MintPolicy::Open,
        };
        config.save(&path).unwrap();

        assert_eq!(LedgerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"symbol":"XYZ"}"#).unwrap();

        let config = LedgerConfig::load(&path).unwrap();
        assert_eq!(config.symbol, "XYZ");
        assert_eq!(config.name, "Testing Token");
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"decimals":30}"#).unwrap();

        assert!(matches!(
            LedgerConfig::load(&path),
            Err(ConfigError::InvalidToken(TokenError::InvalidDecimals))
        ));
    }
}
