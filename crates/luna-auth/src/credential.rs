//! OAuth 2.0 client credentials flow for Azure AD service principals.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AuthError, Result};

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Scope granting access to Azure Resource Manager and the Azure ML APIs.
pub const DEFAULT_SCOPE: &str = "https://management.azure.com/.default";

/// Service principal identity used for the client credentials grant.
#[derive(Clone)]
pub struct ServicePrincipalConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
    pub scope: String,
}

impl std::fmt::Debug for ServicePrincipalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipalConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority_host", &self.authority_host)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ServicePrincipalConfig {
    /// Create a config against the public Azure cloud.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    /// Use a different authority host (sovereign clouds, tests).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Request a different scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// The tenant's v2.0 token endpoint.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// Access token returned from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub expires_in: u64,
    /// Absolute expiry in unix milliseconds.
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default)]
    pub created_at: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Some AAD endpoints encode `expires_in` as a string.
fn u64_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Current time in unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Request a fresh access token with the client credentials grant.
pub async fn request_token(
    http: &reqwest::Client,
    config: &ServicePrincipalConfig,
) -> Result<AccessToken> {
    if config.tenant_id.is_empty() || config.client_id.is_empty() {
        return Err(AuthError::Config(
            "tenant_id and client_id are required".to_string(),
        ));
    }

    let form = ClientCredentialsRequest {
        grant_type: "client_credentials",
        client_id: &config.client_id,
        client_secret: &config.client_secret,
        scope: &config.scope,
    };

    tracing::debug!(
        tenant = %config.tenant_id,
        client = %config.client_id,
        "Requesting access token"
    );

    let response = http
        .post(config.token_url())
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::Network(format!("Token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => AuthError::Rejected {
                code: err.error,
                description: err.error_description,
            },
            Err(_) => AuthError::Backend(format!(
                "Token request failed (HTTP {}): {}",
                status, body
            )),
        });
    }

    let mut token: AccessToken = response
        .json()
        .await
        .map_err(|e| AuthError::Serialization(format!("Failed to parse token response: {}", e)))?;

    token.expires_at = now_millis().saturating_add(token.expires_in.saturating_mul(1000));
    token.created_at = chrono::Utc::now().to_rfc3339();

    Ok(token)
}
