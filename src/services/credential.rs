// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Azure credential sources for outbound bearer tokens.
//!
//! Three variants, chosen once at startup from configuration:
//! - Local development: the signed-in Azure CLI user
//! - System-assigned managed identity
//! - User-assigned managed identity (by client ID)

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
/// Lifetime assumed when a token response carries no expiry.
const FALLBACK_TOKEN_LIFETIME_SECS: i64 = 600;

/// A bearer token and its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can mint a bearer token for an OAuth scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Fetch a new token. Fails with [`AppError::CredentialUnavailable`].
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AppError>;
}

/// Which credential the process authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKind {
    /// Developer machine: token from `az account get-access-token`.
    AzureCli,
    SystemAssigned,
    UserAssigned { client_id: String },
}

impl CredentialKind {
    pub fn from_config(config: &Config) -> Self {
        if config.is_localhost {
            return CredentialKind::AzureCli;
        }
        match &config.azure_client_id {
            Some(client_id) => CredentialKind::UserAssigned {
                client_id: client_id.clone(),
            },
            None => CredentialKind::SystemAssigned,
        }
    }

    /// Build the credential for this kind.
    pub fn build(&self, timeout: Duration) -> anyhow::Result<Arc<dyn TokenCredential>> {
        let credential: Arc<dyn TokenCredential> = match self {
            CredentialKind::AzureCli => Arc::new(AzureCliCredential::new(timeout)),
            CredentialKind::SystemAssigned => {
                Arc::new(ManagedIdentityCredential::from_environment(None, timeout)?)
            }
            CredentialKind::UserAssigned { client_id } => Arc::new(
                ManagedIdentityCredential::from_environment(Some(client_id.clone()), timeout)?,
            ),
        };
        Ok(credential)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Managed identity
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum IdentityEndpoint {
    /// App Service / Container Apps local token endpoint.
    AppService { url: String, header: String },
    /// Azure Instance Metadata Service.
    Imds { url: String },
}

/// Managed identity credential (system- or user-assigned).
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// Detect the hosting environment's token endpoint.
    ///
    /// `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` (Container Apps, App Service) win
    /// over IMDS.
    pub fn from_environment(client_id: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(url), Ok(header)) => IdentityEndpoint::AppService { url, header },
            _ => IdentityEndpoint::Imds {
                url: IMDS_TOKEN_URL.to_string(),
            },
        };

        tracing::info!(
            user_assigned = client_id.is_some(),
            endpoint = ?endpoint_kind(&endpoint),
            "Using managed identity credential"
        );

        Self::with_endpoint(endpoint, client_id, timeout)
    }

    /// Credential against an explicit App Service style endpoint.
    pub fn with_app_service_endpoint(
        url: impl Into<String>,
        header: impl Into<String>,
        client_id: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Self::with_endpoint(
            IdentityEndpoint::AppService {
                url: url.into(),
                header: header.into(),
            },
            client_id,
            timeout,
        )
    }

    fn with_endpoint(
        endpoint: IdentityEndpoint,
        client_id: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building managed identity HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            client_id,
        })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let resource = scope_to_resource(scope);

        let request = match &self.endpoint {
            IdentityEndpoint::AppService { url, header } => self
                .http
                .get(url)
                .header("X-IDENTITY-HEADER", header)
                .query(&[("api-version", APP_SERVICE_API_VERSION), ("resource", resource)]),
            IdentityEndpoint::Imds { url } => self
                .http
                .get(url)
                .header("Metadata", "true")
                .query(&[("api-version", IMDS_API_VERSION), ("resource", resource)]),
        };
        let request = match &self.client_id {
            Some(client_id) => request.query(&[("client_id", client_id.as_str())]),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            AppError::CredentialUnavailable(format!("managed identity request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CredentialUnavailable(format!(
                "managed identity endpoint returned {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let body: ManagedIdentityTokenResponse = response.json().await.map_err(|e| {
            AppError::CredentialUnavailable(format!("invalid managed identity response: {}", e))
        })?;

        let expires_at = body
            .expires_on
            .as_ref()
            .and_then(epoch_secs)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                body.expires_in
                    .as_ref()
                    .and_then(epoch_secs)
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            })
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(FALLBACK_TOKEN_LIFETIME_SECS));

        Ok(AccessToken {
            token: body.access_token,
            expires_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    expires_on: Option<serde_json::Value>,
    expires_in: Option<serde_json::Value>,
}

fn endpoint_kind(endpoint: &IdentityEndpoint) -> &'static str {
    match endpoint {
        IdentityEndpoint::AppService { .. } => "app_service",
        IdentityEndpoint::Imds { .. } => "imds",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Azure CLI (local development)
// ─────────────────────────────────────────────────────────────────────────────

/// Token from the developer's `az login` session.
pub struct AzureCliCredential {
    timeout: Duration,
}

impl AzureCliCredential {
    pub fn new(timeout: Duration) -> Self {
        tracing::info!("Local debug mode: using Azure CLI credential");
        Self { timeout }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("az")
                .args(["account", "get-access-token", "--output", "json", "--scope"])
                .arg(scope)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AppError::CredentialUnavailable("az CLI timed out".to_string()))?
        .map_err(|e| AppError::CredentialUnavailable(format!("failed to run az CLI: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::CredentialUnavailable(format!(
                "az CLI failed: {}",
                truncate(stderr.trim(), 200)
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Local time, e.g. "2025-01-01 12:00:00.000000"
    #[serde(rename = "expiresOn")]
    expires_on_local: Option<String>,
    /// Unix seconds (newer CLI versions)
    expires_on: Option<serde_json::Value>,
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, AppError> {
    let body: CliTokenResponse = serde_json::from_slice(stdout).map_err(|e| {
        AppError::CredentialUnavailable(format!("unreadable az CLI output: {}", e))
    })?;

    let expires_at = body
        .expires_on
        .as_ref()
        .and_then(epoch_secs)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| body.expires_on_local.as_deref().and_then(parse_local_time))
        .ok_or_else(|| {
            AppError::CredentialUnavailable("az CLI output has no expiry".to_string())
        })?;

    Ok(AccessToken {
        token: body.access_token,
        expires_at,
    })
}

fn parse_local_time(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// `https://x/.default` → `https://x` (managed identity endpoints take a resource).
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Seconds given either as a JSON number or a numeric string.
fn epoch_secs(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
