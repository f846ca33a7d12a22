//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{Result, TenderError};
use crate::ledger::GatewayTimings;
use crate::types::{Address, NetworkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStoreKind {
    /// Pinata pinning API + IPFS HTTP gateway.
    Gateway,
    /// Local SQLite content table.
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the ledger node
    pub rpc_url: String,
    /// Tender contract address on every supported network
    pub contract_address: Address,
    /// Network the board is served for
    pub network_id: NetworkId,
    /// Allow-list; reads and writes elsewhere are refused
    pub supported_networks: Vec<NetworkId>,
    pub content_store: ContentStoreKind,
    pub ipfs_gateway: String,
    pub pinata_api_url: String,
    pub pinata_jwt: Option<String>,
    /// Path to the SQLite database file (sqlite content store only)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the tender board is re-listed
    pub refresh_interval_secs: u64,
    pub read_timeout_secs: u64,
    pub confirmation_poll_ms: u64,
    pub confirmation_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let contract_address = lookup("CONTRACT_ADDRESS").ok_or_else(|| {
            TenderError::Config("CONTRACT_ADDRESS environment variable is required".to_string())
        })?;
        let contract_address = Address::parse(&contract_address)
            .map_err(|_| TenderError::Config("Invalid CONTRACT_ADDRESS".to_string()))?;

        let network_id = NetworkId(parse(&var("NETWORK_ID", "11155111"), "NETWORK_ID")?);
        let supported_networks = var("SUPPORTED_NETWORKS", "11155111")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse(s, "SUPPORTED_NETWORKS").map(NetworkId))
            .collect::<Result<Vec<_>>>()?;
        if !supported_networks.contains(&network_id) {
            return Err(TenderError::Config(format!(
                "NETWORK_ID {network_id} is not in SUPPORTED_NETWORKS"
            )));
        }

        let content_store = match var("CONTENT_STORE", "gateway").as_str() {
            "gateway" => ContentStoreKind::Gateway,
            "sqlite" => ContentStoreKind::Sqlite,
            other => {
                return Err(TenderError::Config(format!(
                    "Invalid CONTENT_STORE {other:?} (expected gateway or sqlite)"
                )))
            }
        };

        Ok(Config {
            rpc_url: var("RPC_URL", "http://127.0.0.1:8545"),
            contract_address,
            network_id,
            supported_networks,
            content_store,
            ipfs_gateway: var("IPFS_GATEWAY", "https://gateway.pinata.cloud/ipfs"),
            pinata_api_url: var("PINATA_API_URL", "https://api.pinata.cloud"),
            pinata_jwt: lookup("PINATA_JWT").filter(|s| !s.trim().is_empty()),
            database_url: var("DATABASE_URL", "sqlite:./content.db"),
            api_port: parse(&var("API_PORT", "3001"), "API_PORT")?,
            refresh_interval_secs: parse(&var("REFRESH_INTERVAL_SECS", "15"), "REFRESH_INTERVAL_SECS")?,
            read_timeout_secs: parse(&var("READ_TIMEOUT_SECS", "10"), "READ_TIMEOUT_SECS")?,
            confirmation_poll_ms: parse(&var("CONFIRMATION_POLL_MS", "1500"), "CONFIRMATION_POLL_MS")?,
            confirmation_timeout_secs: parse(
                &var("CONFIRMATION_TIMEOUT_SECS", "180"),
                "CONFIRMATION_TIMEOUT_SECS",
            )?,
        })
    }

    pub fn timings(&self) -> GatewayTimings {
        GatewayTimings {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            confirmation_poll: Duration::from_millis(self.confirmation_poll_ms),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            ..GatewayTimings::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TenderError::Config(format!("Invalid {key}")))
}
