//! HTTP client for a running inference server.
//!
//! Ollama is asked through `/api/generate`, vLLM and llama.cpp through the
//! OpenAI-compatible `/v1/chat/completions`, and a LeRobot policy server through
//! `/predict`.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::internal::server::ServerType;

/// Longest prompt `solo query` will send.
pub const MAX_PROMPT_CHARS: usize = 9000;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is {0} characters long; the maximum is {MAX_PROMPT_CHARS}")]
    TooLong(usize),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("{0} does not accept observations")]
    Unsupported(&'static str),
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// HTTP client for whichever server `solo serve` started.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    pub base_url: String,
    pub server: ServerType,
    pub model: String,
    http_client: HttpClient,
}

impl InferenceClient {
    pub fn new(server: ServerType, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to build HTTP client with timeout: {}. Using default client.",
                    e
                );
                HttpClient::new()
            });
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server,
            model: model.into(),
            http_client,
        }
    }

    /// Send a text prompt using the server's native API.
    pub async fn ask(&self, prompt: &str) -> Result<String, QueryError> {
        check_prompt(prompt)?;
        match self.server {
            ServerType::Ollama => self.ollama_generate(prompt).await,
            _ => self.chat(prompt).await,
        }
    }

    /// OpenAI-compatible `/v1/chat/completions`.
    pub async fn chat(&self, prompt: &str) -> Result<String, QueryError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let value = self.post("/v1/chat/completions", &body).await?;
        let response: ChatResponse =
            serde_json::from_value(value).map_err(|e| QueryError::Response(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| QueryError::Response("no choices in response".to_string()))
    }

    /// Ollama `/api/generate` without streaming.
    pub async fn ollama_generate(&self, prompt: &str) -> Result<String, QueryError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let value = self.post("/api/generate", &body).await?;
        let response: GenerateResponse =
            serde_json::from_value(value).map_err(|e| QueryError::Response(e.to_string()))?;
        Ok(response.response)
    }

    /// LeRobot policy server `/predict`; returns the `action` field.
    pub async fn predict(&self, observation: Value) -> Result<Value, QueryError> {
        if self.server != ServerType::Lerobot {
            return Err(QueryError::Unsupported(self.server.label()));
        }
        let value = self
            .post("/predict", &serde_json::json!({ "observation": observation }))
            .await?;
        value
            .get("action")
            .cloned()
            .ok_or_else(|| QueryError::Response(format!("missing `action` in {value}")))
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, QueryError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "posting query");
        let response = self.http_client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

pub fn check_prompt(prompt: &str) -> Result<(), QueryError> {
    let len = prompt.chars().count();
    if len > MAX_PROMPT_CHARS {
        Err(QueryError::TooLong(len))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// Answer a single request with `status` and `body`; yields the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    #[test]
    fn test_prompt_length_limit() {
        assert!(check_prompt(&"a".repeat(MAX_PROMPT_CHARS)).is_ok());
        assert!(matches!(
            check_prompt(&"a".repeat(MAX_PROMPT_CHARS + 1)),
            Err(QueryError::TooLong(9001))
        ));
    }

    #[tokio::test]
    async fn test_chat_reads_first_choice() {
        let (url, server) =
            serve_once("200 OK", r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#).await;
        let client = InferenceClient::new(ServerType::Vllm, url, "m");
        assert_eq!(client.ask("hello").await.unwrap(), "hi there");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.contains(r#""content":"hello""#));
    }

    #[tokio::test]
    async fn test_ollama_generate_disables_streaming() {
        let (url, server) = serve_once("200 OK", r#"{"response":"42","done":true}"#).await;
        let client = InferenceClient::new(ServerType::Ollama, url, "llama3.2");
        assert_eq!(client.ask("answer?").await.unwrap(), "42");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/generate"));
        assert!(request.contains(r#""stream":false"#));
    }

    #[tokio::test]
    async fn test_predict_returns_action() {
        let (url, _server) = serve_once("200 OK", r#"{"action":[0.1,0.2]}"#).await;
        let client = InferenceClient::new(ServerType::Lerobot, url, "lerobot/act_so101");
        let action = client.predict(serde_json::json!({"state": [0, 1]})).await.unwrap();
        assert_eq!(action, serde_json::json!([0.1, 0.2]));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = InferenceClient::new(ServerType::LlamaCpp, url, "m");
        match client.chat("x").await {
            Err(QueryError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_predict_rejected_for_text_servers() {
        let client = InferenceClient::new(ServerType::Ollama, "http://127.0.0.1:1", "m");
        assert!(matches!(
            client.predict(Value::Null).await,
            Err(QueryError::Unsupported("Ollama"))
        ));
    }
}
