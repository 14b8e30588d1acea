// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Todo operations for an authenticated owner.
//!
//! Input is validated before any remote call, sanitized again just before it
//! is stored, and every successful mutation drops the owner's cached list.

use crate::db::GraphQlStore;
use crate::error::{AppError, Result};
use crate::models::{Recommendation, Todo, TodoPatch};
use crate::services::TodoCache;
use crate::validation::{
    sanitize_string, validate_due_date, validate_notes, validate_priority, validate_todo_id,
    validate_todo_name, NOTES_MAX_LENGTH, TODO_NAME_MAX_LENGTH,
};
use std::sync::Arc;

/// Raw user edits; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TodoUpdate {
    pub name: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<String>,
}

#[derive(Clone)]
pub struct TodoService {
    store: GraphQlStore,
    cache: Arc<TodoCache>,
}

impl TodoService {
    pub fn new(store: GraphQlStore, cache: Arc<TodoCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<TodoCache> {
        &self.cache
    }

    /// Owner's todos, served from cache when fresh.
    pub async fn list_todos(&self, oid: &str) -> Result<Arc<Vec<Todo>>> {
        if let Some(todos) = self.cache.get(oid) {
            return Ok(todos);
        }

        tracing::debug!(oid, "Todo cache miss");
        let todos = self.store.list_todos(oid).await?;
        Ok(self.cache.set(oid, todos))
    }

    /// A single todo owned by `oid`. Other owners' items are reported as not found.
    pub async fn get_todo(&self, raw_id: &str, oid: &str) -> Result<Todo> {
        let id = validate_todo_id(raw_id)?;
        self.owned_todo(id, oid).await
    }

    pub async fn create_todo(&self, name: &str, oid: &str) -> Result<Todo> {
        let name = validate_todo_name(name)?;
        let name = sanitize_string(&name, TODO_NAME_MAX_LENGTH);

        let todo = self.store.create_todo(&name, oid).await?;
        self.cache.invalidate(oid);
        tracing::info!(oid, todo_id = todo.id, "Todo created");
        Ok(todo)
    }

    /// Apply user edits. Every supplied field is validated before the store is contacted.
    pub async fn update_todo(&self, raw_id: &str, oid: &str, update: &TodoUpdate) -> Result<Todo> {
        let id = validate_todo_id(raw_id)?;

        let name = update
            .name
            .as_deref()
            .map(validate_todo_name)
            .transpose()?
            .map(|name| sanitize_string(&name, TODO_NAME_MAX_LENGTH));
        let priority = validate_priority(update.priority.as_deref())?;
        let due_date = validate_due_date(update.due_date.as_deref())?;
        let notes = validate_notes(update.notes.as_deref())?
            .map(|notes| sanitize_string(&notes, NOTES_MAX_LENGTH));

        let patch = TodoPatch {
            name,
            due_date,
            notes,
            priority,
            ..TodoPatch::default()
        };

        let current = self.owned_todo(id, oid).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        self.apply_patch(id, oid, &patch).await
    }

    pub async fn set_completed(&self, raw_id: &str, oid: &str, completed: bool) -> Result<Todo> {
        let id = validate_todo_id(raw_id)?;
        self.owned_todo(id, oid).await?;
        self.apply_patch(id, oid, &TodoPatch::completed(completed)).await
    }

    pub async fn delete_todo(&self, raw_id: &str, oid: &str) -> Result<()> {
        let id = validate_todo_id(raw_id)?;
        self.owned_todo(id, oid).await?;

        if !self.store.delete_todo(id).await? {
            return Err(AppError::NotFound(format!("Todo {} not found", id)));
        }
        self.cache.invalidate(oid);
        tracing::info!(oid, todo_id = id, "Todo deleted");
        Ok(())
    }

    /// Persist a recommendation list on an item the caller already owns.
    pub async fn save_recommendations(
        &self,
        id: i64,
        oid: &str,
        recommendations: &[Recommendation],
    ) -> Result<Todo> {
        let json = serde_json::to_string(recommendations).map_err(|e| AppError::Internal(e.into()))?;
        let patch = TodoPatch {
            recommendations_json: Some(json),
            ..TodoPatch::default()
        };
        self.apply_patch(id, oid, &patch).await
    }

    async fn owned_todo(&self, id: i64, oid: &str) -> Result<Todo> {
        match self.store.get_todo(id).await? {
            Some(todo) if todo.is_owned_by(oid) => Ok(todo),
            Some(_) => {
                tracing::warn!(oid, todo_id = id, "Todo requested by non-owner");
                Err(AppError::NotFound(format!("Todo {} not found", id)))
            }
            None => Err(AppError::NotFound(format!("Todo {} not found", id))),
        }
    }

    async fn apply_patch(&self, id: i64, oid: &str, patch: &TodoPatch) -> Result<Todo> {
        let updated = self.store.update_todo(id, patch).await?;
        self.cache.invalidate(oid);

        updated.ok_or_else(|| AppError::NotFound(format!("Todo {} not found", id)))
    }
}
