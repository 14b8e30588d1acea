// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Todo API routes for authenticated owners.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Recommendation, Todo};
use crate::services::TodoUpdate;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/todos", get(list_todos).post(create_todo))
        .route(
            "/api/todos/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route("/api/todos/{id}/complete", post(set_completed))
        .route("/api/todos/{id}/recommendations", post(recommend))
}

/// A todo with its stored recommendations decoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    #[serde(flatten)]
    pub todo: Todo,
    pub recommendations: Vec<Recommendation>,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        let recommendations = todo.recommendations();
        Self {
            todo,
            recommendations,
        }
    }
}

// ─── Listing & Lookup ────────────────────────────────────────

async fn list_todos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<TodoResponse>>> {
    let todos = state.todos.list_todos(&user.oid).await?;
    Ok(Json(
        todos.iter().cloned().map(TodoResponse::from).collect(),
    ))
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<TodoResponse>> {
    let todo = state.todos.get_todo(&id, &user.oid).await?;
    Ok(Json(todo.into()))
}

// ─── Mutations ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub name: String,
}

async fn create_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>)> {
    let todo = state.todos.create_todo(&body.name, &user.oid).await?;
    Ok((StatusCode::CREATED, Json(todo.into())))
}

/// Edit body. Priority is accepted as a number or a string.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub name: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub priority: Option<String>,
}

impl From<UpdateTodoRequest> for TodoUpdate {
    fn from(body: UpdateTodoRequest) -> Self {
        TodoUpdate {
            name: body.name,
            due_date: body.due_date,
            notes: body.notes,
            priority: body.priority,
        }
    }
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>> {
    let todo = state
        .todos
        .update_todo(&id, &user.oid, &body.into())
        .await?;
    Ok(Json(todo.into()))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub completed: bool,
}

async fn set_completed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<TodoResponse>> {
    let todo = state
        .todos
        .set_completed(&id, &user.oid, body.completed)
        .await?;
    Ok(Json(todo.into()))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.todos.delete_todo(&id, &user.oid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Recommendations ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    /// Exclude links from the previous recommendations
    #[serde(default)]
    pub refresh: bool,
}

/// Generate and store recommendations for a todo.
///
/// The engine never fails; only the lookup and the final save can.
async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<TodoResponse>> {
    let todo = state.todos.get_todo(&id, &user.oid).await?;

    let previous_links = query.refresh.then(|| todo.previous_links());
    let recommendations = state
        .recommender
        .get_recommendations(&todo.name, previous_links.as_deref())
        .await;

    tracing::info!(
        oid = %user.oid,
        todo_id = todo.id,
        count = recommendations.len(),
        refresh = query.refresh,
        "Recommendations generated"
    );

    let todo = state
        .todos
        .save_recommendations(todo.id, &user.oid, &recommendations)
        .await?;
    Ok(Json(todo.into()))
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_priority_forms() {
        let numeric: UpdateTodoRequest =
            serde_json::from_value(serde_json::json!({ "priority": 2 })).unwrap();
        assert_eq!(numeric.priority.as_deref(), Some("2"));

        let text: UpdateTodoRequest =
            serde_json::from_value(serde_json::json!({ "priority": "3" })).unwrap();
        assert_eq!(text.priority.as_deref(), Some("3"));

        let absent: UpdateTodoRequest =
            serde_json::from_value(serde_json::json!({ "priority": null })).unwrap();
        assert_eq!(absent.priority, None);
    }

    #[test]
    fn test_todo_response_decodes_recommendations() {
        let todo = Todo {
            id: 1,
            name: "Buy milk".to_string(),
            due_date: None,
            notes: None,
            priority: None,
            completed: false,
            oid: Some("u1".to_string()),
            recommendations_json: Some(r#"[{"title":"A","link":"https://a"}]"#.to_string()),
        };

        let body = serde_json::to_value(TodoResponse::from(todo)).unwrap();
        assert_eq!(body["name"], "Buy milk");
        assert_eq!(body["recommendations"][0]["link"], "https://a");
    }
}
