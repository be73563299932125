pub mod store;

pub use store::{SubscriptionId, TodoChange, TodoStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure text handed back to the model when an id does not resolve.
pub const NOT_FOUND_MESSAGE: &str = "No todo found with that id";

/// Seed list shown on startup.
pub const SAMPLE_TODOS: &[&str] = &[
    "Learn how to use the AI SDK",
    "Buy Milk",
    "Learn how to use the AI SDK",
];

/// A single task in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub done: bool,
}

impl Todo {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            content: content.into(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    #[error("No todo found with that id")]
    NotFound(String),
}

/// Opaque identifier for a new todo. Uniqueness comes from UUID v4.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
