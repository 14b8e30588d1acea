// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Azure Key Vault secret lookup (startup only).

use crate::error::AppError;
use crate::services::TokenManager;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const KEY_VAULT_API_VERSION: &str = "7.4";

/// Opaque name → value secret lookup.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// `Ok(None)` when the secret does not exist.
    async fn get_secret(&self, name: &str) -> crate::error::Result<Option<String>>;
}

/// Key Vault secrets client using the REST API.
pub struct KeyVaultClient {
    http: reqwest::Client,
    vault_url: String,
    tokens: Arc<TokenManager>,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

impl KeyVaultClient {
    pub fn new(
        vault_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building Key Vault HTTP client")?;

        Ok(Self {
            http,
            vault_url: vault_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }
}

#[async_trait]
impl SecretSource for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> crate::error::Result<Option<String>> {
        let token = self.tokens.current_token().await?;
        let url = format!("{}/secrets/{}", self.vault_url, urlencoding::encode(name));

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Key Vault request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Internal(anyhow::anyhow!(
                "Key Vault returned {} for secret '{}'",
                status,
                name
            )));
        }

        let bundle: SecretBundle = response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid Key Vault response: {}", e)))?;

        tracing::info!(secret = name, "Loaded secret from Key Vault");
        Ok(bundle.value)
    }
}
