// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recommendation model.

use serde::{Deserialize, Serialize};

pub const TITLE_MAX_LENGTH: usize = 200;
pub const LINK_MAX_LENGTH: usize = 500;

/// A single recommended resource for a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub link: String,
}

impl Recommendation {
    /// Build an entry, capping title and link lengths.
    pub fn new(title: &str, link: &str) -> Self {
        Self {
            title: title.chars().take(TITLE_MAX_LENGTH).collect(),
            link: link.chars().take(LINK_MAX_LENGTH).collect(),
        }
    }

    /// Synthetic entry shown in place of a failed or malformed result.
    pub fn placeholder(title: &str) -> Self {
        Self {
            title: title.to_string(),
            link: String::new(),
        }
    }
}
