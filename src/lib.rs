// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Todo-AI: a to-do list backend with AI-generated recommendations
//!
//! Items live in a remote GraphQL store reached with managed-identity
//! bearer tokens; recommendations come from Azure OpenAI.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

use config::Config;
use services::{RecommendationEngine, TodoService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub todos: TodoService,
    pub recommender: RecommendationEngine,
}
