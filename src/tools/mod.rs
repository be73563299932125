pub mod todo;

use serde_json::Value;

use crate::todo::{Todo, TodoError, TodoStore};

/// Value returned to the conversation as a tool result.
///
/// Both variants are ordinary data from the model's point of view; a
/// failure is never raised as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Todo(Todo),
    Failure(String),
}

impl ToolOutput {
    /// Text placed in the `tool` message: the item as JSON, or the failure verbatim.
    pub fn to_message(&self) -> String {
        match self {
            ToolOutput::Todo(todo) => serde_json::to_string(todo).unwrap_or_default(),
            ToolOutput::Failure(msg) => msg.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutput::Failure(_))
    }
}

impl From<Result<Todo, TodoError>> for ToolOutput {
    fn from(result: Result<Todo, TodoError>) -> Self {
        match result {
            Ok(todo) => ToolOutput::Todo(todo),
            Err(e) => ToolOutput::Failure(e.to_string()),
        }
    }
}

/// Returns all tool definitions as JSON (OpenAI function calling format).
pub fn get_tool_definitions() -> Vec<Value> {
    vec![todo::definition()]
}

/// Apply a model-issued tool call to the store.
///
/// Returns `None` for tool names this dispatcher does not own, leaving the
/// call for other handlers.
pub fn dispatch(store: &mut TodoStore, name: &str, args: &Value) -> Option<ToolOutput> {
    match name {
        todo::NAME => {
            let output = todo::execute(store, args);
            tracing::info!(
                tool = name,
                failed = output.is_failure(),
                todos = store.len(),
                "tool call applied"
            );
            Some(output)
        }
        _ => None,
    }
}
