//! Transaction builder client
//!
//! The builder turns a public `BuildRequest` into an unsigned transaction
//! template. Signing happens locally afterwards; the builder never sees keys.
//!
//! Responses are either JSON (`{ success, transaction, error }`, transaction in
//! base64) or a raw `application/octet-stream` body holding the serialized
//! transaction, which is what PumpPortal's trade-local endpoint returns.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::BuilderConfig;
use crate::error::{Error, Result};

use super::operation::BuildRequest;

/// Unsigned transaction template as returned by the builder
#[derive(Clone, PartialEq, Eq)]
pub struct UnsignedTemplate {
    bytes: Vec<u8>,
}

impl UnsignedTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::BuilderRejected(format!("Template is not valid base64: {}", e)))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for UnsignedTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnsignedTemplate({} bytes)", self.bytes.len())
    }
}

/// Remote service producing unsigned templates
#[async_trait]
pub trait TemplateBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<UnsignedTemplate>;
}

/// Builder response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    #[serde(default)]
    pub success: Option<bool>,
    /// Base64 encoded unsigned transaction
    #[serde(default, alias = "transactionTemplate")]
    pub transaction: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

impl BuildResponse {
    /// The builder's own error message, if it sent one
    pub fn message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        self.errors
            .as_ref()
            .filter(|errors| !errors.is_empty())
            .map(|errors| errors.join(", "))
    }

    /// Extract the template or the builder's own error message
    pub fn into_template(self) -> Result<UnsignedTemplate> {
        if let Some(message) = self.message() {
            return Err(Error::BuilderRejected(message));
        }
        if self.success == Some(false) {
            return Err(Error::BuilderRejected(
                "Builder reported failure without a message".to_string(),
            ));
        }

        let encoded = self
            .transaction
            .ok_or_else(|| Error::BuilderRejected("No transaction in response".to_string()))?;
        UnsignedTemplate::from_base64(&encoded)
    }
}

/// HTTP transaction builder
pub struct HttpTemplateBuilder {
    client: Client,
    url: String,
}

impl HttpTemplateBuilder {
    pub fn new(config: &BuilderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl TemplateBuilder for HttpTemplateBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<UnsignedTemplate> {
        debug!(
            "Requesting {} template for {}",
            request.action, request.public_key
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::BuilderRequest(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let is_binary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/octet-stream"));

        if status.is_success() && is_binary {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::BuilderRequest(format!("Failed to read body: {}", e)))?;
            return Ok(UnsignedTemplate::from_bytes(bytes.to_vec()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::BuilderRequest(format!("Failed to read body: {}", e)))?;

        parse_build_response(status, &body)
    }
}

/// Interpret a JSON (or unparseable) builder reply.
///
/// A non-2xx reply without a builder message keeps the status and the start
/// of the body.
fn parse_build_response(status: StatusCode, body: &str) -> Result<UnsignedTemplate> {
    match serde_json::from_str::<BuildResponse>(body) {
        Ok(parsed) if status.is_success() => parsed.into_template(),
        Ok(parsed) => Err(Error::BuilderRejected(parsed.message().unwrap_or_else(|| {
            format!("HTTP {}: {}", status, truncate(body, 200))
        }))),
        Err(_) if status.is_success() => Err(Error::BuilderRejected(format!(
            "Malformed builder response: {}",
            truncate(body, 200)
        ))),
        Err(_) => Err(Error::BuilderRejected(format!(
            "HTTP {}: {}",
            status,
            truncate(body, 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
