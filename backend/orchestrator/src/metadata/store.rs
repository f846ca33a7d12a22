//! Content-addressed storage backends for off-chain tender documents.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::bid::keccak256;
use crate::errors::{Result, TenderError};
use crate::types::ContentHash;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Publish `bytes` and return their address. `name` is a label only.
    async fn store(&self, bytes: Vec<u8>, name: &str) -> Result<ContentHash>;

    /// `Ok(None)` when nothing is published at `hash`.
    async fn fetch(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;
}

/// Address used by local stores: `0x` + Keccak-256 of the bytes.
pub fn local_content_address(bytes: &[u8]) -> ContentHash {
    ContentHash::new(format!("0x{}", hex::encode(keccak256(bytes))))
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pins JSON through the Pinata API and reads through an IPFS HTTP gateway.
pub struct GatewayStore {
    client: Client,
    gateway_url: String,
    pin_api_url: String,
    jwt: Option<String>,
}

impl GatewayStore {
    pub fn new(client: Client, gateway_url: String, pin_api_url: String, jwt: Option<String>) -> Self {
        Self {
            client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            pin_api_url: pin_api_url.trim_end_matches('/').to_string(),
            jwt,
        }
    }

    fn fetch_url(&self, hash: &ContentHash) -> String {
        format!("{}/{}", self.gateway_url, hash)
    }
}

#[async_trait]
impl ContentStore for GatewayStore {
    async fn store(&self, bytes: Vec<u8>, name: &str) -> Result<ContentHash> {
        let jwt = self
            .jwt
            .as_deref()
            .ok_or_else(|| TenderError::Config("PINATA_JWT is required to publish content".into()))?;
        let content: Value = serde_json::from_slice(&bytes)
            .map_err(|e| TenderError::Validation(format!("metadata must be JSON: {e}")))?;

        let resp = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", self.pin_api_url))
            .bearer_auth(jwt)
            .json(&json!({
                "pinataContent": content,
                "pinataMetadata": { "name": name },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TenderError::Unavailable(format!("content upload failed ({status}): {body}")));
        }
        let pinned: PinResponse = resp.json().await?;
        info!(hash = %pinned.ipfs_hash, "Pinned {name}");
        Ok(ContentHash::new(pinned.ipfs_hash))
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let resp = self.client.get(self.fetch_url(hash)).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp.bytes().await?.to_vec()));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(%hash, "Gateway answered {status}");
            return Err(TenderError::Unavailable(format!("gateway answered {status}")));
        }
        debug!(%hash, "Gateway has no content ({status})");
        Ok(None)
    }
}
