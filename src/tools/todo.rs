use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ToolOutput;
use crate::todo::TodoStore;

pub const NAME: &str = "todo";

/// Arguments of the `todo` tool, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TodoToolArgs {
    Add {
        content: String,
    },
    #[serde(rename = "mark-down", alias = "mark-done")]
    MarkDone {
        id: String,
    },
    Update {
        id: String,
        content: String,
    },
}

/// Returns the tool definition for `todo` in OpenAI function calling format.
pub fn definition() -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": NAME,
            "description": "Manage the user's todo list. Use type \"add\" to create a todo, \"update\" to change the text of an existing todo, and \"mark-down\" to mark an existing todo as done. Existing todos are referenced by the id shown in the current todo list.",
            "parameters": {
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["add", "update", "mark-down"],
                        "description": "The operation to perform"
                    },
                    "content": {
                        "type": "string",
                        "description": "Text of the todo. Required for add and update."
                    },
                    "id": {
                        "type": "string",
                        "description": "Id of an existing todo. Required for update and mark-down."
                    }
                },
                "required": ["type"]
            }
        }
    })
}

/// Validate raw arguments and apply them to the store.
pub fn execute(store: &mut TodoStore, args: &Value) -> ToolOutput {
    match TodoToolArgs::deserialize(args) {
        Ok(parsed) => apply(store, parsed),
        Err(e) => {
            tracing::warn!(error = %e, "rejected todo tool arguments");
            ToolOutput::Failure(format!("Error: invalid todo arguments: {}", e))
        }
    }
}

pub fn apply(store: &mut TodoStore, args: TodoToolArgs) -> ToolOutput {
    match args {
        TodoToolArgs::Add { content } => ToolOutput::Todo(store.add(content)),
        TodoToolArgs::MarkDone { id } => store.mark_done(&id).into(),
        TodoToolArgs::Update { id, content } => store.update(&id, content).into(),
    }
}
