use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub content: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub usage: Usage,
    pub finish_reason: String,
}

/// Events emitted during streaming.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    ContentChunk(String),
    Done(Usage),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("API error: {0}")]
    Provider(String),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("No response received from API (0 chunks)")]
    Empty,
}

// ── Client ──────────────────────────────────────────────────────────────

/// Streaming client for OpenAI-compatible chat-completions endpoints.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self::with_http(reqwest::Client::new(), api_key, base_url)
    }

    pub fn with_http(http: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("API key contains characters not allowed in a header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Stream a chat completion, sending events to the provided channel.
    /// Returns the final accumulated result.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
        event_tx: Option<mpsc::UnboundedSender<StreamEvent>>,
        cancel: CancellationToken,
    ) -> Result<StreamResult> {
        let body = build_request_body(model, messages, tools);
        let url = self.completions_url();
        tracing::debug!(%url, model, messages = messages.len(), "starting chat completion");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "chat completion rejected");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: parse_error_body(&text),
            }
            .into());
        }

        let mut acc = StreamAccumulator::default();
        let mut stream = response.bytes_stream();

        // SSE buffer for partial lines
        let mut line_buffer = String::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("chat completion cancelled");
                    break;
                }
                chunk = stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            line_buffer.push_str(&String::from_utf8_lossy(&bytes));
                            while let Some(line_end) = line_buffer.find('\n') {
                                let line = line_buffer[..line_end].trim_end_matches('\r').to_string();
                                line_buffer.drain(..=line_end);
                                acc.process_line(&line, event_tx.as_ref());
                            }
                        }
                        Some(Err(e)) => {
                            return Err(ApiError::Stream(e.to_string()).into());
                        }
                        None => break,
                    }
                }
            }
        }

        // A final line without trailing newline
        if !line_buffer.trim().is_empty() {
            acc.process_line(line_buffer.trim_end(), event_tx.as_ref());
        }

        let result = acc.finish(cancel.is_cancelled())?;
        if let Some(tx) = &event_tx {
            let _ = tx.send(StreamEvent::Done(result.usage.clone()));
        }
        Ok(result)
    }
}

pub fn build_request_body(model: &str, messages: &[Value], tools: &[Value]) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });
    if !tools.is_empty() {
        body["tools"] = serde_json::json!(tools);
        body["tool_choice"] = serde_json::json!("auto");
    }
    body
}

/// Pull a readable message out of an error response body.
///
/// Handles `{"error": {"message": ...}}`, the same wrapped in an array, and
/// `{"error": "..."}`. Anything else is returned as-is.
pub fn parse_error_body(text: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        return text.trim().to_string();
    };
    let root = match &json {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };
    match root.get("error") {
        Some(Value::String(msg)) => msg.clone(),
        Some(err) => err
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| err.to_string()),
        None => text.trim().to_string(),
    }
}

// ── Stream accumulation ──────────────────────────────────────────────────

/// Folds SSE chunks into content, ordered tool calls and usage.
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, AccumulatedToolCall>,
    usage: Usage,
    finish_reason: String,
    chunk_count: u64,
    api_error: Option<String>,
}

impl StreamAccumulator {
    fn process_line(&mut self, line: &str, event_tx: Option<&mpsc::UnboundedSender<StreamEvent>>) {
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(chunk) => {
                self.chunk_count += 1;
                self.process_chunk(&chunk, event_tx);
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed SSE chunk"),
        }
    }

    fn process_chunk(&mut self, chunk: &Value, event_tx: Option<&mpsc::UnboundedSender<StreamEvent>>) {
        if let Some(u) = chunk.get("usage").filter(|u| u.is_object()) {
            let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
            self.usage = Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            };
        }

        // API-level error inside the stream
        if let Some(err) = chunk.get("error") {
            let msg = err
                .get("message")
                .and_then(|v| v.as_str())
                .or_else(|| err.as_str())
                .unwrap_or("Unknown API error");
            self.api_error = Some(msg.to_string());
            return;
        }

        let Some(choice) = chunk.get("choices").and_then(|c| c.get(0)) else {
            return;
        };

        if let Some(fr) = choice.get("finish_reason").and_then(|v| v.as_str()) {
            self.finish_reason = fr.to_string();
        }

        let Some(delta) = choice.get("delta") else {
            return;
        };

        if let Some(c) = delta.get("content").and_then(|v| v.as_str()) {
            if !c.is_empty() {
                self.content.push_str(c);
                if let Some(tx) = event_tx {
                    let _ = tx.send(StreamEvent::ContentChunk(c.to_string()));
                }
            }
        }

        if let Some(tcs) = delta.get("tool_calls").and_then(|v| v.as_array()) {
            for (pos, tc) in tcs.iter().enumerate() {
                // Some providers omit the index; fall back to array position.
                let idx = tc
                    .get("index")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize)
                    .unwrap_or(pos);

                let entry = self.tool_calls.entry(idx).or_insert_with(|| AccumulatedToolCall {
                    id: String::new(),
                    call_type: "function".to_string(),
                    function: ToolCallFunction {
                        name: String::new(),
                        arguments: String::new(),
                    },
                });

                if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                    entry.id = id.to_string();
                }
                if let Some(func) = tc.get("function") {
                    if let Some(name) = func.get("name").and_then(|v| v.as_str()) {
                        entry.function.name = name.to_string();
                    }
                    if let Some(args) = func.get("arguments").and_then(|v| v.as_str()) {
                        entry.function.arguments.push_str(args);
                    }
                }
            }
        }
    }

    fn finish(self, cancelled: bool) -> std::result::Result<StreamResult, ApiError> {
        if let Some(msg) = self.api_error {
            return Err(ApiError::Provider(msg));
        }
        if !cancelled && self.chunk_count == 0 {
            return Err(ApiError::Empty);
        }
        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|(idx, mut tc)| {
                if tc.id.is_empty() {
                    tc.id = format!("call_{}", idx);
                }
                tc
            })
            .collect();
        Ok(StreamResult {
            content: self.content,
            tool_calls,
            usage: self.usage,
            finish_reason: self.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_content_chunk() {
        let mut acc = StreamAccumulator::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        acc.process_line(
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            Some(&tx),
        );
        assert_eq!(acc.content, "Hello");
        match rx.try_recv().unwrap() {
            StreamEvent::ContentChunk(c) => assert_eq!(c, "Hello"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn ignores_comments_and_done_marker() {
        let mut acc = StreamAccumulator::default();
        acc.process_line(": keep-alive", None);
        acc.process_line("data: [DONE]", None);
        acc.process_line("event: ping", None);
        assert_eq!(acc.chunk_count, 0);
    }

    #[test]
    fn tool_call_accumulation() {
        let mut acc = StreamAccumulator::default();

        // First delta: tool call id + name
        let chunk1 = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_123",
                        "function": { "name": "todo", "arguments": "{\"type\":\"ad" }
                    }]
                }
            }]
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        acc.process_chunk(&chunk1, Some(&tx));

        // Second delta: more arguments
        let chunk2 = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "function": { "arguments": "d\",\"content\":\"Walk the dog\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        acc.process_chunk(&chunk2, Some(&tx));

        // Partial tool calls stay inside the accumulator.
        assert!(rx.try_recv().is_err());
        assert_eq!(acc.tool_calls.len(), 1);
        let tc = acc.tool_calls.get(&0).unwrap();
        assert_eq!(tc.id, "call_123");
        assert_eq!(tc.function.name, "todo");
        assert_eq!(
            tc.function.arguments,
            r#"{"type":"add","content":"Walk the dog"}"#
        );
        assert_eq!(acc.finish_reason, "tool_calls");
    }

    #[test]
    fn tool_calls_without_ids_get_stable_ids_in_order() {
        let mut acc = StreamAccumulator::default();
        let chunk = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [
                        { "function": { "name": "todo", "arguments": "{}" } },
                        { "function": { "name": "todo", "arguments": "{}" } }
                    ]
                }
            }]
        });
        acc.process_chunk(&chunk, None);
        let result = acc.finish(false).unwrap();
        let ids: Vec<&str> = result.tool_calls.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["call_0", "call_1"]);
    }

    #[test]
    fn usage_extraction() {
        let chunk = serde_json::json!({
            "usage": {
                "prompt_tokens": 100,
                "completion_tokens": 50,
                "total_tokens": 150
            },
            "choices": [{"delta": {}}]
        });
        let mut acc = StreamAccumulator::default();
        acc.process_chunk(&chunk, None);
        assert_eq!(
            acc.usage,
            Usage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150
            }
        );
    }

    #[test]
    fn error_chunk_fails_the_stream() {
        let mut acc = StreamAccumulator::default();
        acc.process_line(r#"data: {"error":{"message":"quota exceeded"}}"#, None);
        let err = acc.finish(false).unwrap_err();
        assert_eq!(err.to_string(), "API error: quota exceeded");
    }

    #[test]
    fn empty_stream_is_an_error_unless_cancelled() {
        assert!(matches!(
            StreamAccumulator::default().finish(false),
            Err(ApiError::Empty)
        ));
        assert!(StreamAccumulator::default().finish(true).is_ok());
    }

    #[test]
    fn parse_error_body_shapes() {
        assert_eq!(
            parse_error_body(r#"{"error":{"message":"bad key","code":401}}"#),
            "bad key"
        );
        assert_eq!(
            parse_error_body(r#"[{"error":{"code":400,"message":"API key not valid"}}]"#),
            "API key not valid"
        );
        assert_eq!(parse_error_body(r#"{"error":"nope"}"#), "nope");
        assert_eq!(parse_error_body("gateway timeout\n"), "gateway timeout");
    }

    #[test]
    fn request_body_includes_tools_only_when_present() {
        let messages = vec![serde_json::json!({"role": "user", "content": "hi"})];
        let body = build_request_body("m", &messages, &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);

        let tools = vec![crate::tools::todo::definition()];
        let body = build_request_body("m", &messages, &tools);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "todo");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ChatClient::new("k", "https://example.com/v1/");
        assert_eq!(client.completions_url(), "https://example.com/v1/chat/completions");
    }
}
