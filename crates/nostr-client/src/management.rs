//! Relay management RPC client
//!
//! Relays expose moderation procedures over HTTP as JSON-RPC style calls:
//! a POST of `{"method": <name>, "params": [...]}` answered by
//! `{"result": <value>}` or `{"error": <message>}` (NIP-86).
//!
//! The watcher only needs `hidecontent`, but the client is generic over method
//! names so the dashboard side can share it.

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Content type for management calls
pub const MANAGEMENT_CONTENT_TYPE: &str = "application/nostr+json+rpc";

/// Default method used to hide an event or account
pub const DEFAULT_HIDE_METHOD: &str = "hidecontent";

// =============================================================================
// Error Types
// =============================================================================

/// Management RPC error with HTTP status and message
///
/// Status `0` marks transport and decoding failures that never produced an
/// HTTP response.
///
/// # Examples
/// ```
/// use nostr_client::management::ManagementError;
///
/// let error = ManagementError::new(503, "Unavailable", "relay is restarting");
/// assert_eq!(error.status(), 503);
/// assert!(error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementError {
    status: u16,
    error: String,
    message: String,
}

impl ManagementError {
    /// Create a new management error
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, error: error.into(), message: message.into() }
    }

    /// HTTP status code, `0` if no response was received
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error code
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure came from the network or an overloaded relay
    pub fn is_network_error(&self) -> bool {
        matches!(self.status, 0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524)
    }
}

impl std::fmt::Display for ManagementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "management error {}: {} - {}", self.status, self.error, self.message)
    }
}

impl std::error::Error for ManagementError {}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Management call body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementRequest {
    /// Method name
    pub method: String,
    /// Positional parameters
    pub params: Vec<Value>,
}

impl ManagementRequest {
    /// Create a call with no parameters
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), params: Vec::new() }
    }

    /// Append a parameter
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Management response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagementResponse {
    /// Result value on success
    #[serde(default)]
    pub result: Option<Value>,
    /// Error message on failure
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the management client
#[derive(Debug, Clone)]
pub struct ManagementClientConfig {
    /// Management endpoint URL (usually the relay's HTTP URL)
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers sent with every call (e.g. `Authorization`)
    pub default_headers: HashMap<String, String>,
}

impl Default for ManagementClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7777".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("relay-moderation/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl ManagementClientConfig {
    /// Create a config for an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Default::default() }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the relay management RPC surface
///
/// # Examples
/// ```no_run
/// use nostr_client::management::{ManagementClient, ManagementClientConfig};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ManagementClient::new(ManagementClientConfig::new("https://relay.example.com"))?;
///     let hidden = client.hide_content("event-id", "auto: csam via clientX").await?;
///     assert!(hidden);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: ReqwestClient,
    config: ManagementClientConfig,
    hide_method: String,
}

impl ManagementClient {
    /// Create a new management client
    pub fn new(config: ManagementClientConfig) -> Result<Self, ManagementError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ManagementError::new(0, "ClientError", e.to_string()))?;

        Ok(Self { client, config, hide_method: DEFAULT_HIDE_METHOD.to_string() })
    }

    /// Use a different method name for hiding content
    pub fn with_hide_method(mut self, method: impl Into<String>) -> Self {
        self.hide_method = method.into();
        self
    }

    /// Hide an event or account, returning whether the relay reported success
    ///
    /// Called exactly once per enforcement; this method never retries.
    pub async fn hide_content(&self, target_id: &str, reason: &str) -> Result<bool, ManagementError> {
        let request = ManagementRequest::new(self.hide_method.as_str())
            .param(target_id)
            .param(reason);
        let result: Value = self.call(request).await?;

        Ok(match result {
            Value::Bool(ok) => ok,
            Value::Null => false,
            _ => true,
        })
    }

    /// Invoke a management method and decode its result
    pub async fn call<T>(&self, request: ManagementRequest) -> Result<T, ManagementError>
    where
        T: DeserializeOwned,
    {
        let mut req = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", MANAGEMENT_CONTENT_TYPE);

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        let body = serde_json::to_vec(&request)
            .map_err(|e| ManagementError::new(0, "EncodeError", e.to_string()))?;

        let response = req
            .body(body)
            .send()
            .await
            .map_err(|e| ManagementError::new(0, "NetworkError", format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }

    async fn parse_response<T>(&self, response: ReqwestResponse) -> Result<T, ManagementError>
    where
        T: DeserializeOwned,
    {
        let status = response.status().as_u16();
        let success = response.status().is_success();

        let body = response.text().await.map_err(|e| {
            ManagementError::new(0, "ParseError", format!("Failed to read response: {}", e))
        })?;

        let envelope = serde_json::from_str::<ManagementResponse>(&body);

        if !success {
            let message = match envelope {
                Ok(ManagementResponse { error: Some(message), .. }) => message,
                _ => format!("HTTP {}: {}", status, body),
            };
            return Err(ManagementError::new(status, "HttpError", message));
        }

        let envelope = envelope.map_err(|e| {
            ManagementError::new(0, "ParseError", format!("Failed to parse JSON: {}", e))
        })?;

        if let Some(message) = envelope.error {
            return Err(ManagementError::new(status, "RpcError", message));
        }

        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| {
            ManagementError::new(0, "ParseError", format!("Unexpected result: {}", e))
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ManagementClientConfig {
        &self.config
    }

    /// Method name used by [`ManagementClient::hide_content`]
    pub fn hide_method(&self) -> &str {
        &self.hide_method
    }
}
