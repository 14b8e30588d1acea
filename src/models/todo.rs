// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Todo item model as stored by the GraphQL API.

use super::Recommendation;
use serde::{Deserialize, Deserializer, Serialize};

/// A todo item. The remote store owns it; every other copy is disposable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Store-assigned ID
    pub id: i64,
    pub name: String,
    /// Due date (YYYY-MM-DD)
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Priority level 0-3
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub completed: bool,
    /// Owner identity (subject `oid`)
    #[serde(default)]
    pub oid: Option<String>,
    /// Serialized `[{title, link}]` from the last recommendation request
    #[serde(default)]
    pub recommendations_json: Option<String>,
}

impl Todo {
    /// Whether this item belongs to the given owner.
    pub fn is_owned_by(&self, oid: &str) -> bool {
        self.oid.as_deref() == Some(oid)
    }

    /// Recommendations stored with the item. Unreadable text yields an empty list.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.recommendations_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Links from the stored recommendations, for excluding them on refresh.
    pub fn previous_links(&self) -> Vec<String> {
        self.recommendations()
            .into_iter()
            .map(|r| r.link)
            .filter(|link| !link.is_empty())
            .collect()
    }
}

/// Partial update of a todo. Only `Some` fields are sent to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations_json: Option<String>,
}

impl TodoPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
