//! IP access for broadcast documents, behind the network policy gate.
//!
//! Documents reach the network through a fixed API endpoint:
//! `{api_base}/api/get/{uri}` and `{api_base}/api/post/{uri}`. When the gate
//! is closed (network disabled, or played-back content) requests return the
//! same canonical failure as a transport error, without any I/O.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::BridgeError;

/// Connection type reported to documents: non-real-time point-to-point.
pub const CONNECTION_TYPE: i32 = 403;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Raw HTTP answer returned by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Result of `get`; the default value is the canonical failure (`{}`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u8>>,
}

impl GetResult {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn is_failure(&self) -> bool {
        self.status_code.is_none()
    }
}

impl From<HttpResponse> for GetResult {
    fn from(response: HttpResponse) -> Self {
        Self {
            status_code: Some(response.status),
            headers: response.headers,
            response: Some(response.body),
        }
    }
}

/// Result of `transmitTextDataOverIP`.
///
/// `result_code` is `None` for the NaN failure code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmitResult {
    pub result_code: Option<u8>,
    pub status_code: String,
    pub response: Vec<u8>,
}

impl TransmitResult {
    pub fn failed() -> Self {
        Self {
            result_code: None,
            status_code: String::new(),
            response: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.result_code.is_none()
    }
}

impl From<HttpResponse> for TransmitResult {
    fn from(response: HttpResponse) -> Self {
        Self {
            result_code: Some(1),
            status_code: response.status.to_string(),
            response: response.body,
        }
    }
}

/// HTTP seam used by [`IpClient`].
#[async_trait]
pub trait IpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, BridgeError>;

    /// Posts an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, body: String) -> Result<HttpResponse, BridgeError>;
}

/// [`IpTransport`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Uses a caller-provided client (shared pool, proxy settings...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn collect(response: reqwest::Response) -> Result<HttpResponse, BridgeError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl IpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, BridgeError> {
        let response = self.client.get(url).send().await?;
        Self::collect(response).await
    }

    async fn post_form(&self, url: &str, body: String) -> Result<HttpResponse, BridgeError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        Self::collect(response).await
    }
}

/// Gated IP client.
///
/// The gate decision is taken by the caller (the controller owns the session
/// flags) and passed in as `allowed`.
#[derive(Clone)]
pub struct IpClient {
    transport: Arc<dyn IpTransport>,
    api_base: String,
}

impl IpClient {
    pub fn new(transport: Arc<dyn IpTransport>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            transport,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn get_url(&self, uri: &str) -> String {
        format!("{}/api/get/{}", self.api_base, uri)
    }

    pub fn post_url(&self, uri: &str) -> String {
        format!("{}/api/post/{}", self.api_base, uri)
    }

    pub async fn get(&self, allowed: bool, uri: &str) -> GetResult {
        match self.try_get(allowed, uri).await {
            Ok(result) => result,
            Err(BridgeError::NetworkGated) => {
                debug!(uri, "GET refused, network gated");
                GetResult::failed()
            }
            Err(e) => {
                warn!(uri, error = %e, "GET failed");
                GetResult::failed()
            }
        }
    }

    pub async fn transmit(&self, allowed: bool, uri: &str, body: String) -> TransmitResult {
        match self.try_transmit(allowed, uri, body).await {
            Ok(result) => result,
            Err(BridgeError::NetworkGated) => {
                debug!(uri, "POST refused, network gated");
                TransmitResult::failed()
            }
            Err(e) => {
                warn!(uri, error = %e, "POST failed");
                TransmitResult::failed()
            }
        }
    }

    async fn try_get(&self, allowed: bool, uri: &str) -> Result<GetResult, BridgeError> {
        if !allowed {
            return Err(BridgeError::NetworkGated);
        }
        let response = self.transport.get(&self.get_url(uri)).await?;
        Ok(response.into())
    }

    async fn try_transmit(
        &self,
        allowed: bool,
        uri: &str,
        body: String,
    ) -> Result<TransmitResult, BridgeError> {
        if !allowed {
            return Err(BridgeError::NetworkGated);
        }
        let response = self.transport.post_form(&self.post_url(uri), body).await?;
        Ok(response.into())
    }
}

impl std::fmt::Debug for IpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}
