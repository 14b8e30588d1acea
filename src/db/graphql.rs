// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GraphQL client for the todo API (Data API Builder).
//!
//! Each operation issues exactly one request carrying a bearer token from the
//! [`TokenManager`]. Error statuses and `errors` entries become
//! [`AppError::RemoteOperationFailed`]; nothing here retries.

use crate::db::queries;
use crate::error::AppError;
use crate::models::{Todo, TodoPatch};
use crate::services::TokenManager;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Max characters of a raw error body kept in an error message.
const ERROR_BODY_EXCERPT: usize = 200;

/// Remote todo store.
#[derive(Clone)]
pub struct GraphQlStore {
    http: reqwest::Client,
    api_url: String,
    tokens: Arc<TokenManager>,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl GraphQlStore {
    pub fn new(
        api_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building GraphQL HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            tokens,
        })
    }

    /// Execute a query or mutation and decode its `data` object.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, AppError> {
        let token = self.tokens.current_token().await?;

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "GraphQL request failed");
                AppError::RemoteOperationFailed(format!("API request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::RemoteOperationFailed(format!("Failed to read API response: {}", e))
        })?;

        if !status.is_success() {
            let message = first_error_message(&body).unwrap_or_else(|| {
                format!(
                    "API error (status {}): {}",
                    status.as_u16(),
                    body.chars().take(ERROR_BODY_EXCERPT).collect::<String>()
                )
            });
            tracing::error!(status = %status, error = %message, "GraphQL query failed");
            return Err(AppError::RemoteOperationFailed(message));
        }

        let parsed: GraphQlResponse<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Invalid JSON response from API");
            AppError::RemoteOperationFailed(format!("Invalid JSON response from API: {}", e))
        })?;

        if let Some(error) = parsed.errors.as_ref().and_then(|errors| errors.first()) {
            tracing::error!(error = %error.message, "GraphQL query returned errors");
            return Err(AppError::RemoteOperationFailed(error.message.clone()));
        }

        parsed
            .data
            .ok_or_else(|| AppError::RemoteOperationFailed("API response has no data".to_string()))
    }

    // ─── Todo Operations ─────────────────────────────────────────

    /// All todos owned by `oid`.
    pub async fn list_todos(&self, oid: &str) -> Result<Vec<Todo>, AppError> {
        #[derive(Deserialize)]
        struct Data {
            todos: Option<Items>,
        }
        #[derive(Deserialize)]
        struct Items {
            items: Option<Vec<Todo>>,
        }

        let data: Data = self
            .execute(queries::LIST_TODOS, Some(json!({ "oid": oid })))
            .await?;

        Ok(data.todos.and_then(|t| t.items).unwrap_or_default())
    }

    /// A single todo, or `None` if the store has no such ID.
    pub async fn get_todo(&self, id: i64) -> Result<Option<Todo>, AppError> {
        #[derive(Deserialize)]
        struct Data {
            todo_by_pk: Option<Todo>,
        }

        let data: Data = self
            .execute(queries::GET_TODO, Some(json!({ "id": id })))
            .await?;
        Ok(data.todo_by_pk)
    }

    pub async fn create_todo(&self, name: &str, oid: &str) -> Result<Todo, AppError> {
        #[derive(Deserialize)]
        struct Data {
            createtodo: Option<Todo>,
        }

        let data: Data = self
            .execute(
                queries::CREATE_TODO,
                Some(json!({ "name": name, "oid": oid })),
            )
            .await?;

        data.createtodo.ok_or_else(|| {
            AppError::RemoteOperationFailed("Create returned no todo".to_string())
        })
    }

    /// Apply a partial update; fields absent from `patch` are left untouched.
    pub async fn update_todo(&self, id: i64, patch: &TodoPatch) -> Result<Option<Todo>, AppError> {
        #[derive(Deserialize)]
        struct Data {
            updatetodo: Option<Todo>,
        }

        let mut variables = patch_variables(patch)?;
        let mutation = build_update_mutation(&variables);
        variables.insert("id".to_string(), json!(id));

        let data: Data = self
            .execute(&mutation, Some(Value::Object(variables)))
            .await?;
        Ok(data.updatetodo)
    }

    /// Delete a todo. Returns whether the store reported a deleted item.
    pub async fn delete_todo(&self, id: i64) -> Result<bool, AppError> {
        #[derive(Deserialize)]
        struct Data {
            deletetodo: Option<Value>,
        }

        let data: Data = self
            .execute(queries::DELETE_TODO, Some(json!({ "id": id })))
            .await?;
        Ok(data.deletetodo.is_some_and(|v| !v.is_null()))
    }
}

fn first_error_message(body: &str) -> Option<String> {
    let parsed: GraphQlResponse<Value> = serde_json::from_str(body).ok()?;
    parsed.errors?.into_iter().next().map(|e| e.message)
}

fn patch_variables(patch: &TodoPatch) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(patch) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Internal(anyhow::anyhow!(
            "todo patch did not serialize to an object"
        ))),
        Err(e) => Err(AppError::Internal(e.into())),
    }
}

/// Build an update mutation mentioning only the supplied fields.
///
/// Unused variable declarations are invalid GraphQL, so both the signature and
/// the item object are derived from the same set of keys.
fn build_update_mutation(supplied: &Map<String, Value>) -> String {
    let mut declarations = vec!["$id: Int!".to_string()];
    let mut assignments = Vec::new();

    for (field, graphql_type) in queries::UPDATABLE_FIELDS {
        if supplied.contains_key(*field) {
            declarations.push(format!("${}: {}", field, graphql_type));
            assignments.push(format!("{}: ${}", field, field));
        }
    }

    format!(
        "mutation UpdateTodo({}) {{ updatetodo(id: $id, item: {{ {} }}) {{ {} }} }}",
        declarations.join(", "),
        assignments.join(", "),
        queries::TODO_FIELDS
    )
}
