// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use todo_ai::config::Config;
use todo_ai::db::GraphQlStore;
use todo_ai::error::AppError;
use todo_ai::models::Todo;
use todo_ai::routes::create_router;
use todo_ai::services::{
    AccessToken, ChatProvider, ChatRequest, ProviderError, RecommendationEngine, RetryPolicy,
    TodoCache, TodoService, TokenCredential, TokenManager,
};
use todo_ai::AppState;

// ─── Credentials ─────────────────────────────────────────────

/// Credential that counts fetches and hands out one-hour tokens.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingCredential {
    pub calls: AtomicUsize,
    /// Delay before answering, to widen race windows
    pub delay: Duration,
    /// Fail the next N fetches
    pub failures: AtomicUsize,
}

#[allow(dead_code)]
impl CountingCredential {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCredential for CountingCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::CredentialUnavailable(format!(
                "identity endpoint down for {}",
                scope
            )));
        }

        Ok(AccessToken {
            token: format!("token-{}", n),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        })
    }
}

// ─── Fake GraphQL store ──────────────────────────────────────

/// How the fake store answers.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Normal,
    /// 400 with a structured `errors` entry
    GraphQlError,
    /// 503 with a non-JSON body
    Unavailable,
}

/// A request the fake store received.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: String,
    pub variables: Value,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct StoreState {
    todos: BTreeMap<i64, Todo>,
    next_id: i64,
}

/// In-process GraphQL endpoint backed by a map of todos.
pub struct FakeGraphQl {
    pub url: String,
    state: Mutex<StoreState>,
    mode: Mutex<StoreMode>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[allow(dead_code)]
impl FakeGraphQl {
    pub async fn start() -> Arc<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake GraphQL server");
        let addr = listener.local_addr().unwrap();

        let fake = Arc::new(Self {
            url: format!("http://{}/graphql", addr),
            state: Mutex::new(StoreState {
                todos: BTreeMap::new(),
                next_id: 1,
            }),
            mode: Mutex::new(StoreMode::Normal),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/graphql", post(handle_graphql))
            .with_state(fake.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        fake
    }

    pub fn set_mode(&self, mode: StoreMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Insert a todo directly, bypassing request counting.
    pub fn seed(&self, name: &str, oid: &str) -> Todo {
        let mut state = self.state.lock().unwrap();
        let todo = new_todo(state.next_id, name, oid);
        state.next_id += 1;
        state.todos.insert(todo.id, todo.clone());
        todo
    }

    pub fn stored(&self, id: i64) -> Option<Todo> {
        self.state.lock().unwrap().todos.get(&id).cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn new_todo(id: i64, name: &str, oid: &str) -> Todo {
    Todo {
        id,
        name: name.to_string(),
        due_date: None,
        notes: None,
        priority: None,
        completed: false,
        oid: Some(oid.to_string()),
        recommendations_json: None,
    }
}

async fn handle_graphql(
    State(fake): State<Arc<FakeGraphQl>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    let variables = body.get("variables").cloned().unwrap_or(Value::Null);

    fake.requests.lock().unwrap().push(RecordedRequest {
        query: query.clone(),
        variables: variables.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    match *fake.mode.lock().unwrap() {
        StoreMode::Normal => {}
        StoreMode::GraphQlError => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": [{ "message": "The current user is not authorized" }] })),
            )
                .into_response();
        }
        StoreMode::Unavailable => {
            return (StatusCode::SERVICE_UNAVAILABLE, "<html>upstream down</html>").into_response();
        }
    }

    let mut state = fake.state.lock().unwrap();
    let data = if query.contains("TodosByOwner") {
        let oid = variables["oid"].as_str().unwrap_or_default();
        let items: Vec<&Todo> = state
            .todos
            .values()
            .filter(|t| t.oid.as_deref() == Some(oid))
            .collect();
        json!({ "todos": { "items": items } })
    } else if query.contains("Todo_by_pk") {
        let id = variables["id"].as_i64().unwrap_or_default();
        json!({ "todo_by_pk": state.todos.get(&id) })
    } else if query.contains("Createtodo") {
        let id = state.next_id;
        state.next_id += 1;
        let todo = new_todo(
            id,
            variables["name"].as_str().unwrap_or_default(),
            variables["oid"].as_str().unwrap_or_default(),
        );
        state.todos.insert(id, todo.clone());
        json!({ "createtodo": todo })
    } else if query.contains("UpdateTodo") {
        let id = variables["id"].as_i64().unwrap_or_default();
        match state.todos.get(&id).cloned() {
            Some(todo) => {
                let mut merged = serde_json::to_value(&todo).unwrap();
                for (key, value) in variables.as_object().unwrap() {
                    if key != "id" {
                        merged[key] = value.clone();
                    }
                }
                let updated: Todo = serde_json::from_value(merged).unwrap();
                state.todos.insert(id, updated.clone());
                json!({ "updatetodo": updated })
            }
            None => json!({ "updatetodo": null }),
        }
    } else if query.contains("RemoveTodo") {
        let id = variables["id"].as_i64().unwrap_or_default();
        match state.todos.remove(&id) {
            Some(todo) => json!({ "deletetodo": { "id": todo.id } }),
            None => json!({ "deletetodo": null }),
        }
    } else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": [{ "message": "Unknown operation" }] })),
        )
            .into_response();
    };

    Json(json!({ "data": data })).into_response()
}

// ─── Scripted chat provider ──────────────────────────────────

/// One scripted provider answer.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Empty,
    Fail,
    Panic,
    Hang,
}

/// Provider that replays a script, repeating the last step once exhausted.
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let step = {
            let next = self.steps.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(step) => {
                    *last = Some(step.clone());
                    step
                }
                None => last.clone().unwrap_or(Step::Empty),
            }
        };

        match step {
            Step::Text(text) => Ok(Some(text)),
            Step::Empty => Ok(None),
            Step::Fail => Err(ProviderError::Status {
                status: 429,
                body: "rate limited".to_string(),
            }),
            Step::Panic => panic!("provider exploded"),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

/// Retry policy with millisecond delays for tests.
#[allow(dead_code)]
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        call_timeout: Duration::from_millis(200),
    }
}

#[allow(dead_code)]
pub fn recommendations_json(links: &[&str]) -> String {
    let entries: Vec<Value> = links
        .iter()
        .enumerate()
        .map(|(i, link)| json!({ "title": format!("Resource {}", i + 1), "link": link }))
        .collect();
    Value::Array(entries).to_string()
}

// ─── App wiring ──────────────────────────────────────────────

/// Store + service over a fake GraphQL server.
#[allow(dead_code)]
pub fn test_service(fake: &FakeGraphQl, ttl: Duration) -> (TodoService, Arc<CountingCredential>) {
    let credential = Arc::new(CountingCredential::default());
    let tokens = Arc::new(TokenManager::new(credential.clone(), "api://todo-api/.default"));
    let store = GraphQlStore::new(fake.url.clone(), tokens, Duration::from_secs(5))
        .expect("build store");
    let service = TodoService::new(store, Arc::new(TodoCache::new(ttl)));
    (service, credential)
}

/// Full router over a fake store and a scripted provider.
#[allow(dead_code)]
pub fn create_test_app(
    fake: &FakeGraphQl,
    provider: Arc<ScriptedProvider>,
) -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let (todos, _) = test_service(fake, config.cache_ttl);

    let state = Arc::new(AppState {
        config,
        todos,
        recommender: RecommendationEngine::new(provider, fast_policy()),
    });

    (create_router(state.clone()), state)
}

/// Session JWT for tests.
#[allow(dead_code)]
pub fn create_test_jwt(oid: &str) -> String {
    todo_ai::middleware::auth::create_jwt(oid, &Config::default().session_signing_key)
        .expect("create test JWT")
}
