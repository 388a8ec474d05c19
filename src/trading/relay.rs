//! Signed transaction relays
//!
//! A relay takes one signed artifact and answers exactly once with a
//! transaction signature or an error. Nothing here retries; a failed
//! submission goes back to the operator, who decides whether to try again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use solana_client::client_error::ClientErrorKind;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::RpcError;
use tracing::{info, warn};

use crate::config::{RelayConfig, RelayKind};
use crate::error::{Error, Result};

use super::signer::SignedArtifact;

/// Submission endpoint for signed transactions
#[async_trait]
pub trait Relay: Send + Sync {
    /// Relay name for logging
    fn name(&self) -> &'static str;

    /// Submit one artifact, returning its transaction signature
    async fn submit(&self, artifact: &SignedArtifact) -> Result<String>;
}

/// Build the relay selected in config
pub fn relay_from_config(config: &RelayConfig) -> Result<Box<dyn Relay>> {
    Ok(match config.kind {
        RelayKind::Jito => Box::new(JitoRelay::new(config)?),
        RelayKind::Rpc => Box::new(RpcRelay::new(config)),
    })
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Jito block engine relay (`sendTransaction` on /api/v1/transactions)
pub struct JitoRelay {
    client: Client,
    endpoint: String,
}

impl JitoRelay {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!("{}/api/v1/transactions", config.url.trim_end_matches('/'));
        info!("Jito relay initialized for {}", config.url);

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Relay for JitoRelay {
    fn name(&self) -> &'static str {
        "jito"
    }

    async fn submit(&self, artifact: &SignedArtifact) -> Result<String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": "sendTransaction",
            "params": [artifact.encoded(), { "encoding": "base64" }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Submission(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Submission(format!("Failed to read response: {}", e)))?;

        let parsed: JsonRpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(Error::Submission(format!("HTTP {}: {}", status, text)))
            }
            Err(e) => {
                return Err(Error::Submission(format!("Malformed relay response: {}", e)))
            }
        };

        if let Some(error) = parsed.error {
            warn!("Jito rejected transaction ({}): {}", error.code, error.message);
            return Err(Error::RelayRejected(error.message));
        }

        parsed
            .result
            .ok_or_else(|| Error::Submission("No signature in relay response".to_string()))
    }
}

/// Plain Solana RPC relay, preflight skipped
pub struct RpcRelay {
    client: RpcClient,
}

impl RpcRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout(
                config.url.clone(),
                Duration::from_millis(config.timeout_ms),
            ),
        }
    }
}

#[async_trait]
impl Relay for RpcRelay {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn submit(&self, artifact: &SignedArtifact) -> Result<String> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            ..Default::default()
        };

        match self
            .client
            .send_transaction_with_config(artifact.transaction(), config)
            .await
        {
            Ok(signature) => Ok(signature.to_string()),
            Err(e) => match e.kind() {
                ClientErrorKind::RpcError(RpcError::RpcResponseError { message, .. }) => {
                    Err(Error::RelayRejected(message.clone()))
                }
                _ => Err(Error::Submission(e.to_string())),
            },
        }
    }
}
