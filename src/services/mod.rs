// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod cache;
pub mod credential;
pub mod key_vault;
pub mod recommendation;
pub mod todo;
pub mod token_manager;

pub use cache::TodoCache;
pub use credential::{AccessToken, CredentialKind, TokenCredential};
pub use key_vault::{KeyVaultClient, SecretSource};
pub use recommendation::{
    AzureOpenAiProvider, ChatProvider, ChatRequest, ProviderError, RecommendationEngine,
    RetryPolicy,
};
pub use todo::{TodoService, TodoUpdate};
pub use token_manager::TokenManager;
