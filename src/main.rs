// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Todo-AI API Server
//!
//! Serves an owner's to-do list from a remote GraphQL store and attaches
//! AI-generated recommendations to items.

use std::sync::Arc;
use std::time::Duration;
use todo_ai::{
    config::{Config, ConfigError},
    db::GraphQlStore,
    services::{
        key_vault::KEY_VAULT_SCOPE, recommendation::AOAI_SCOPE, AzureOpenAiProvider,
        CredentialKind, KeyVaultClient, RecommendationEngine, RetryPolicy, SecretSource,
        TodoCache, TodoService, TokenManager,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between sweeps of expired cache entries.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Todo-AI API");

    // One credential for the whole process, chosen from configuration
    let credential_kind = CredentialKind::from_config(&config);
    let credential = credential_kind.build(config.request_timeout)?;
    tracing::info!(credential = ?credential_kind, "Credential initialized");

    let token_manager = |scope: String| {
        Arc::new(TokenManager::with_margin(
            credential.clone(),
            scope,
            config.token_refresh_margin,
        ))
    };

    // Endpoint settings: Key Vault first, environment as fallback
    let key_vault = match config.key_vault_url() {
        Some(url) => {
            tracing::info!(vault = %url, "Loading settings from Key Vault");
            Some(
                KeyVaultClient::new(
                    url,
                    token_manager(KEY_VAULT_SCOPE.to_string()),
                    config.request_timeout,
                )
                .map_err(|e| ConfigError::KeyVault(e.to_string()))?,
            )
        }
        None => None,
    };
    let endpoints = config
        .resolve_endpoints(key_vault.as_ref().map(|kv| kv as &dyn SecretSource))
        .await?;

    // Remote store + cache
    let store = GraphQlStore::new(
        endpoints.api_url.clone(),
        token_manager(config.api_scope()),
        config.request_timeout,
    )?;
    let cache = Arc::new(TodoCache::new(config.cache_ttl));
    tracing::info!(
        api_url = %endpoints.api_url,
        ttl_secs = config.cache_ttl.as_secs(),
        "Todo store initialized"
    );

    // Recommendation engine
    let provider = AzureOpenAiProvider::new(
        &endpoints.openai_endpoint,
        &endpoints.openai_deployment,
        token_manager(AOAI_SCOPE.to_string()),
        config.recommendation_timeout,
    )?;
    let policy = RetryPolicy::from(&config);
    tracing::info!(
        deployment = %endpoints.openai_deployment,
        max_attempts = policy.max_attempts,
        "Recommendation engine initialized"
    );
    let recommender = RecommendationEngine::new(Arc::new(provider), policy);

    // Sweep expired cache entries in the background
    let sweeper = cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Purged expired cache entries");
            }
        }
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        todos: TodoService::new(store, cache),
        recommender,
    });

    // Build router
    let app = todo_ai::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("todo_ai=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
