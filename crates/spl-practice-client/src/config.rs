//! Runtime configuration.
//!
//! A [`Config`] is built once at startup, from the process environment
//! (optionally seeded from a `.env` file), from any key lookup, or from
//! JSON, and is immutable afterwards. Services receive it behind an `Arc`.

use serde::{Deserialize, Deserializer};
use spl_practice_sdk::address::address_to_bytes;

use crate::error::ConfigError;
use crate::types::{Cluster, Commitment};

pub const ENV_PROGRAM_ID: &str = "SPL_PRACTICE_PROGRAM_ID";
pub const ENV_RPC_URL: &str = "SPL_PRACTICE_RPC_URL";
pub const ENV_CLUSTER: &str = "SPL_PRACTICE_CLUSTER";
pub const ENV_MINT: &str = "SPL_PRACTICE_MINT";
pub const ENV_MINT_AUTHORITY: &str = "SPL_PRACTICE_MINT_AUTHORITY";
pub const ENV_COMMITMENT: &str = "SPL_PRACTICE_COMMITMENT";
pub const ENV_HISTORY_PAGE_SIZE: &str = "SPL_PRACTICE_HISTORY_PAGE_SIZE";

/// Placeholder mint used when none is configured.
pub const DEMO_MINT: &str = "11111111111111111111111111111112";
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    pub program_id: [u8; 32],
    pub cluster: Cluster,
    pub rpc_url: String,
    pub mint: [u8; 32],
    /// Authority passed to `mint_daily_tokens`. `None` means the
    /// connected wallet.
    pub mint_authority: Option<[u8; 32]>,
    pub commitment: Commitment,
    pub history_page_size: usize,
}

/// Serialized form of [`Config`]. A missing `rpc_url` follows the cluster.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(deserialize_with = "de_address")]
    program_id: [u8; 32],
    #[serde(default = "default_cluster")]
    cluster: Cluster,
    #[serde(default)]
    rpc_url: Option<String>,
    #[serde(default = "default_mint", deserialize_with = "de_address")]
    mint: [u8; 32],
    #[serde(default, deserialize_with = "de_opt_address")]
    mint_authority: Option<[u8; 32]>,
    #[serde(default = "default_commitment")]
    commitment: Commitment,
    #[serde(default = "default_page_size")]
    history_page_size: usize,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            program_id: file.program_id,
            cluster: file.cluster,
            rpc_url: file
                .rpc_url
                .unwrap_or_else(|| file.cluster.default_rpc_url().to_string()),
            mint: file.mint,
            mint_authority: file.mint_authority,
            commitment: file.commitment,
            history_page_size: file.history_page_size,
        }
    }
}

impl Config {
    /// Defaults for everything except the program address.
    pub fn new(program_id: [u8; 32]) -> Self {
        Self {
            program_id,
            cluster: Cluster::Devnet,
            rpc_url: Cluster::Devnet.default_rpc_url().to_string(),
            mint: default_mint(),
            mint_authority: None,
            commitment: Commitment::Confirmed,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    /// Read the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let program_id = get(ENV_PROGRAM_ID).ok_or(ConfigError::Missing(ENV_PROGRAM_ID))?;
        let mut config = Config::new(parse_address(ENV_PROGRAM_ID, &program_id)?);

        if let Some(cluster) = get(ENV_CLUSTER) {
            config.cluster = cluster.parse()?;
        }
        config.rpc_url = get(ENV_RPC_URL)
            .unwrap_or_else(|| config.cluster.default_rpc_url().to_string());
        if let Some(mint) = get(ENV_MINT) {
            config.mint = parse_address(ENV_MINT, &mint)?;
        }
        if let Some(authority) = get(ENV_MINT_AUTHORITY) {
            config.mint_authority = Some(parse_address(ENV_MINT_AUTHORITY, &authority)?);
        }
        if let Some(commitment) = get(ENV_COMMITMENT) {
            config.commitment = commitment.parse()?;
        }
        if let Some(size) = get(ENV_HISTORY_PAGE_SIZE) {
            config.history_page_size = parse_page_size(&size)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json).map_err(|e| ConfigError::Invalid {
            key: "config",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_HISTORY_PAGE_SIZE,
                reason: "must be at least 1".into(),
            });
        }
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: ENV_RPC_URL,
                reason: format!("`{}` is not an http(s) URL", self.rpc_url),
            });
        }
        Ok(())
    }
}

fn parse_address(key: &'static str, value: &str) -> Result<[u8; 32], ConfigError> {
    address_to_bytes(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_page_size(value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: ENV_HISTORY_PAGE_SIZE,
        reason: format!("`{value}` is not a number"),
    })
}

// ─── serde helpers ──────────────────────────────────────────────────

fn de_address<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
    let s = String::deserialize(d)?;
    address_to_bytes(&s).map_err(serde::de::Error::custom)
}

fn de_opt_address<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) => address_to_bytes(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn default_cluster() -> Cluster {
    Cluster::Devnet
}

fn default_mint() -> [u8; 32] {
    let mut mint = [0u8; 32];
    mint[31] = 1;
    mint
}

fn default_commitment() -> Commitment {
    Commitment::Confirmed
}

fn default_page_size() -> usize {
    DEFAULT_HISTORY_PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PROGRAM: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_program_id_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_PROGRAM_ID)));
    }

    #[test]
    fn blank_program_id_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[(ENV_PROGRAM_ID, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn invalid_program_id() {
        let err = Config::from_lookup(lookup(&[(ENV_PROGRAM_ID, "0OIl")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_PROGRAM_ID, .. }));
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[(ENV_PROGRAM_ID, PROGRAM)])).unwrap();
        assert_eq!(config.program_id, address_to_bytes(PROGRAM).unwrap());
        assert_eq!(config.cluster, Cluster::Devnet);
        assert_eq!(config.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.mint, address_to_bytes(DEMO_MINT).unwrap());
        assert_eq!(config.mint_authority, None);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.history_page_size, DEFAULT_HISTORY_PAGE_SIZE);
    }

    #[test]
    fn default_mint_matches_demo_address() {
        assert_eq!(default_mint(), address_to_bytes(DEMO_MINT).unwrap());
    }

    #[test]
    fn cluster_drives_default_rpc_url() {
        let config = Config::from_lookup(lookup(&[
            (ENV_PROGRAM_ID, PROGRAM),
            (ENV_CLUSTER, "localnet"),
        ]))
        .unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8899");
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_PROGRAM_ID, PROGRAM),
            (ENV_RPC_URL, "http://localhost:9000"),
            (ENV_MINT, "So11111111111111111111111111111111111111112"),
            (ENV_MINT_AUTHORITY, PROGRAM),
            (ENV_COMMITMENT, "finalized"),
            (ENV_HISTORY_PAGE_SIZE, "5"),
        ]))
        .unwrap();
        assert_eq!(config.rpc_url, "http://localhost:9000");
        assert_eq!(
            config.mint,
            address_to_bytes("So11111111111111111111111111111111111111112").unwrap()
        );
        assert!(config.mint_authority.is_some());
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.history_page_size, 5);
    }

    #[test]
    fn rejects_zero_page_size() {
        let err = Config::from_lookup(lookup(&[
            (ENV_PROGRAM_ID, PROGRAM),
            (ENV_HISTORY_PAGE_SIZE, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = Config::from_lookup(lookup(&[
            (ENV_PROGRAM_ID, PROGRAM),
            (ENV_RPC_URL, "ftp://example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_RPC_URL, .. }));
    }

    #[test]
    fn from_json_with_defaults() {
        let config = Config::from_json(&format!(r#"{{"program_id":"{PROGRAM}"}}"#)).unwrap();
        assert_eq!(config, Config::new(address_to_bytes(PROGRAM).unwrap()));
    }

    #[test]
    fn from_json_full() {
        let json = format!(
            r#"{{
                "program_id": "{PROGRAM}",
                "cluster": "testnet",
                "rpc_url": "https://api.testnet.solana.com",
                "mint_authority": "{PROGRAM}",
                "commitment": "processed",
                "history_page_size": 3
            }}"#
        );
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.cluster, Cluster::Testnet);
        assert_eq!(config.commitment, Commitment::Processed);
        assert_eq!(config.mint_authority, Some(config.program_id));
        assert_eq!(config.history_page_size, 3);
    }

    #[test]
    fn from_json_rpc_url_follows_cluster() {
        let json = format!(r#"{{"program_id":"{PROGRAM}","cluster":"mainnet-beta"}}"#);
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.cluster, Cluster::MainnetBeta);
        assert_eq!(config.rpc_url, "https://api.mainnet-beta.solana.com");
    }

    #[test]
    fn from_json_explicit_rpc_url_wins() {
        let json = format!(
            r#"{{"program_id":"{PROGRAM}","cluster":"mainnet-beta","rpc_url":"http://localhost:8899"}}"#
        );
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8899");
    }

    #[test]
    fn from_json_bad_address() {
        let err = Config::from_json(r#"{"program_id":"nope!"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "config", .. }));
    }
}
