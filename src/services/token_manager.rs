// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token lifecycle for one credential source and scope.
//!
//! Holds the last fetched token and refreshes it synchronously once it is
//! within the safety margin of expiry. Refreshes are single-flight: callers
//! that arrive while a refresh is running wait for it and reuse its token.

use crate::error::AppError;
use crate::services::credential::{AccessToken, TokenCredential};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Default margin before expiry at which a token is refreshed.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(120);

/// Keeps one bearer token valid for a scope.
pub struct TokenManager {
    credential: Arc<dyn TokenCredential>,
    scope: String,
    margin: chrono::Duration,
    current: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self::with_margin(credential, scope, DEFAULT_REFRESH_MARGIN)
    }

    pub fn with_margin(
        credential: Arc<dyn TokenCredential>,
        scope: impl Into<String>,
        margin: Duration,
    ) -> Self {
        Self {
            credential,
            scope: scope.into(),
            margin: chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero()),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Return a token that is valid beyond the safety margin, refreshing if needed.
    ///
    /// Refresh failures are not cached; the next call asks the credential again.
    pub async fn current_token(&self) -> Result<String, AppError> {
        // Fast path: no lock contention with other readers
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        tracing::debug!(scope = %self.scope, "Refreshing bearer token");

        let fetched = self.credential.get_token(&self.scope).await.map_err(|e| {
            tracing::warn!(scope = %self.scope, error = %e, "Token refresh failed");
            match e {
                AppError::CredentialUnavailable(_) => e,
                other => AppError::CredentialUnavailable(other.to_string()),
            }
        })?;

        let token = fetched.token.clone();
        tracing::info!(
            scope = %self.scope,
            expires_at = %fetched.expires_at,
            "Bearer token refreshed"
        );
        *self.current.write().await = Some(fetched);

        Ok(token)
    }

    async fn fresh_token(&self) -> Option<String> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|t| Utc::now() + self.margin < t.expires_at)
            .map(|t| t.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLifetime {
        lifetime: chrono::Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenCredential for FixedLifetime {
        async fn get_token(&self, _scope: &str) -> Result<AccessToken, AppError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                token: format!("token-{n}"),
                expires_at: Utc::now() + self.lifetime,
            })
        }
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refreshed_every_call() {
        let credential = Arc::new(FixedLifetime {
            lifetime: chrono::Duration::seconds(60),
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(credential.clone(), "scope/.default");

        assert_eq!(manager.current_token().await.unwrap(), "token-1");
        // 60s lifetime is inside the 120s margin, so the next call refreshes.
        assert_eq!(manager.current_token().await.unwrap(), "token-2");
        assert_eq!(credential.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_margin_reuses_short_token() {
        let credential = Arc::new(FixedLifetime {
            lifetime: chrono::Duration::seconds(60),
            calls: AtomicUsize::new(0),
        });
        let manager =
            TokenManager::with_margin(credential.clone(), "scope/.default", Duration::ZERO);

        manager.current_token().await.unwrap();
        manager.current_token().await.unwrap();
        assert_eq!(credential.calls.load(Ordering::SeqCst), 1);
    }
}
