use anyhow::Result;
use serde_json::Value;
use std::fmt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::core::api::{AccumulatedToolCall, ChatClient, StreamEvent};
use crate::todo::Todo;
use crate::tools;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Do not include a summary of todos in your responses. You are helping a user manage their todo list. If the user says they've done something, use the todo tool.";

pub const TODOS_CONTEXT_PREFIX: &str =
    "These are my current todos. Do not repeat them back to me in your response.\n";

// ── Tool reply channel ───────────────────────────────────────────────────

/// One-shot answer slot for a tool call handed to the UI thread.
pub struct ToolReply(oneshot::Sender<String>);

impl ToolReply {
    pub fn new(tx: oneshot::Sender<String>) -> Self {
        Self(tx)
    }

    /// True once the engine stopped waiting, e.g. the turn was cancelled.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Returns false if the engine stopped waiting (e.g. the turn was cancelled).
    pub fn send(self, result: String) -> bool {
        self.0.send(result).is_ok()
    }
}

impl fmt::Debug for ToolReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ToolReply(..)")
    }
}

// ── Chat Events (for UI consumption) ────────────────────────────────────

/// Events emitted by the ChatEngine for UI updates.
#[derive(Debug)]
pub enum ChatEvent {
    /// A new assistant streaming message started.
    StreamStart,
    /// Content chunk received.
    ContentChunk(String),
    /// Streaming finished, final message ready.
    StreamEnd(FinalMessage),
    /// The model asked for a tool. The UI thread applies it and answers on `reply`.
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
        reply: ToolReply,
    },
    /// A tool call has its result.
    ToolExecutionDone {
        call_id: String,
        name: String,
        result: String,
    },
    /// The turn used all of its model calls.
    StepLimitReached(u32),
    /// Transport or model failure; the turn is over.
    Error(String),
    /// Updated token usage (prompt, completion, total).
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
}

/// The final assistant message after streaming completes.
#[derive(Debug, Clone)]
pub struct FinalMessage {
    pub content: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
}

// ── Chat Engine ─────────────────────────────────────────────────────────

pub struct ChatEngine {
    client: ChatClient,
    model: String,
    max_steps: u32,
    history: Vec<Value>,
    todos: watch::Receiver<Vec<Todo>>,
    total_tokens: u64,
    cancel_token: CancellationToken,
}

impl ChatEngine {
    pub fn new(
        client: ChatClient,
        model: &str,
        max_steps: u32,
        todos: watch::Receiver<Vec<Todo>>,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_steps: max_steps.max(1),
            history: Vec::new(),
            todos,
            total_tokens: 0,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn history(&self) -> &[Value] {
        &self.history
    }

    /// Set an external cancel token (from the UI) so Esc can interrupt the turn.
    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel_token = token;
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.total_tokens = 0;
        self.cancel_token = CancellationToken::new();
    }

    /// Request messages: system, stored history, then the current todos.
    /// The todos message is rebuilt for every request and never stored.
    pub fn build_request_messages(&self) -> Vec<Value> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": SYSTEM_PROMPT
        }));
        messages.extend(self.history.iter().cloned());
        messages.push(todos_context_message(&self.todos.borrow()));
        messages
    }

    /// Send a user message and run tool round trips until the model stops
    /// calling tools or `max_steps` model calls have been made.
    pub async fn send_message(
        &mut self,
        user_input: &str,
        event_tx: mpsc::UnboundedSender<ChatEvent>,
    ) -> Result<()> {
        self.history.push(serde_json::json!({
            "role": "user",
            "content": user_input
        }));

        let tool_defs = tools::get_tool_definitions();

        for step in 1..=self.max_steps {
            if self.cancel_token.is_cancelled() {
                break;
            }

            let _ = event_tx.send(ChatEvent::StreamStart);
            let messages = self.build_request_messages();

            // Forward stream events to chat events
            let (stream_tx, mut stream_rx) = mpsc::unbounded_channel::<StreamEvent>();
            let event_tx_clone = event_tx.clone();
            let forward_handle = tokio::spawn(async move {
                while let Some(evt) = stream_rx.recv().await {
                    let chat_evt = match evt {
                        StreamEvent::ContentChunk(c) => ChatEvent::ContentChunk(c),
                        StreamEvent::Done(usage) => ChatEvent::TokenUsage {
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            total_tokens: usage.total_tokens,
                        },
                    };
                    let _ = event_tx_clone.send(chat_evt);
                }
            });

            let result = self
                .client
                .stream_chat(
                    &self.model,
                    &messages,
                    &tool_defs,
                    Some(stream_tx),
                    self.cancel_token.clone(),
                )
                .await;

            // Wait for forwarding to finish
            let _ = forward_handle.await;

            let result = match result {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(step, error = %e, "model call failed");
                    let _ = event_tx.send(ChatEvent::Error(e.to_string()));
                    break;
                }
            };

            self.total_tokens += result.usage.total_tokens;
            tracing::info!(
                step,
                tool_calls = result.tool_calls.len(),
                finish_reason = %result.finish_reason,
                "model step finished"
            );

            let tool_calls: Vec<AccumulatedToolCall> = result
                .tool_calls
                .into_iter()
                .map(|mut tc| {
                    if serde_json::from_str::<Value>(&tc.function.arguments).is_err() {
                        tc.function.arguments = "{}".to_string();
                    }
                    tc
                })
                .collect();

            let _ = event_tx.send(ChatEvent::StreamEnd(FinalMessage {
                content: result.content.clone(),
                tool_calls: tool_calls.clone(),
            }));

            let mut entry = serde_json::json!({
                "role": "assistant",
                "content": result.content
            });
            if !tool_calls.is_empty() {
                entry["tool_calls"] = serde_json::json!(tool_calls);
            }
            self.history.push(entry);

            if tool_calls.is_empty() {
                break;
            }

            // Every tool call gets a tool message, even when cancelled, so the
            // history stays valid for the next request.
            let results = self.execute_tool_calls(&tool_calls, &event_tx).await;
            for (call_id, result) in results {
                self.history.push(serde_json::json!({
                    "role": "tool",
                    "content": result,
                    "tool_call_id": call_id
                }));
            }

            if self.cancel_token.is_cancelled() {
                break;
            }
            if step == self.max_steps {
                tracing::info!(max_steps = self.max_steps, "step limit reached");
                let _ = event_tx.send(ChatEvent::StepLimitReached(self.max_steps));
            }
        }

        Ok(())
    }

    /// Hand each tool call to the UI thread in order and wait for its answer.
    /// Returns `(call_id, result)` pairs in call order.
    pub async fn execute_tool_calls(
        &self,
        calls: &[AccumulatedToolCall],
        event_tx: &mpsc::UnboundedSender<ChatEvent>,
    ) -> Vec<(String, String)> {
        let mut results = Vec::with_capacity(calls.len());

        for tc in calls {
            let result = if self.cancel_token.is_cancelled() {
                "Cancelled by user".to_string()
            } else {
                let arguments = serde_json::from_str::<Value>(&tc.function.arguments)
                    .unwrap_or(Value::Null);
                let (reply_tx, reply_rx) = oneshot::channel::<String>();
                tracing::debug!(call_id = %tc.id, name = %tc.function.name, "queueing tool call");

                let sent = event_tx.send(ChatEvent::ToolCall {
                    call_id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments,
                    reply: ToolReply(reply_tx),
                });

                if sent.is_err() {
                    "Error: tool call could not be delivered".to_string()
                } else {
                    tokio::select! {
                        answer = reply_rx => answer.unwrap_or_else(|_| {
                            "Error: tool call was not answered".to_string()
                        }),
                        _ = self.cancel_token.cancelled() => "Cancelled by user".to_string(),
                    }
                }
            };

            let _ = event_tx.send(ChatEvent::ToolExecutionDone {
                call_id: tc.id.clone(),
                name: tc.function.name.clone(),
                result: result.clone(),
            });
            results.push((tc.id.clone(), result));
        }

        results
    }
}

/// Synthetic user message carrying the current list.
pub fn todos_context_message(todos: &[Todo]) -> Value {
    let listing = serde_json::to_string_pretty(todos).unwrap_or_else(|_| "[]".to_string());
    serde_json::json!({
        "role": "user",
        "content": format!("{}{}", TODOS_CONTEXT_PREFIX, listing)
    })
}
