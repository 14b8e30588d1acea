// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod recommendation;
pub mod todo;

pub use recommendation::Recommendation;
pub use todo::{Todo, TodoPatch};
