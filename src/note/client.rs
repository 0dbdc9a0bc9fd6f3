use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000/api/ask";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("could not reach completion proxy: {0}")]
    Transport(String),
    #[error("completion proxy answered with HTTP {0}")]
    Status(u16),
    #[error("completion proxy reported failure: {0}")]
    Rejected(String),
    #[error("completion proxy reply has no text")]
    MissingReply,
    #[error("malformed completion reply: {0}")]
    Decode(#[from] std::io::Error),
}

/// Anything that turns a prompt into text.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    ai: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ProxyReply {
    fn into_text(self) -> Result<String, CompletionError> {
        if !self.success {
            let reason = match self.error {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "unknown error".to_string(),
            };
            return Err(CompletionError::Rejected(reason));
        }
        match self.ai {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(CompletionError::MissingReply),
        }
    }
}

/// JSON client for the local completion proxy.
#[derive(Clone)]
pub struct ProxyClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl ProxyClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { endpoint: endpoint.into(), agent }
    }
}

impl CompletionClient for ProxyClient {
    fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(ProxyRequest { message: prompt })
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => CompletionError::Status(code),
                ureq::Error::Transport(t) => CompletionError::Transport(t.to_string()),
            })?;

        let reply: ProxyReply = response.into_json()?;
        reply.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, CompletionError> {
        serde_json::from_str::<ProxyReply>(json).unwrap().into_text()
    }

    #[test]
    fn test_successful_reply() {
        assert_eq!(parse(r#"{"success": true, "ai": "- one\n- two"}"#).unwrap(), "- one\n- two");
    }

    #[test]
    fn test_failure_reply_carries_reason() {
        match parse(r#"{"success": false, "error": "rate limited"}"#) {
            Err(CompletionError::Rejected(reason)) => assert_eq!(reason, "rate limited"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_structured_error_is_stringified() {
        match parse(r#"{"success": false, "error": {"type": "overloaded"}}"#) {
            Err(CompletionError::Rejected(reason)) => assert!(reason.contains("overloaded")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_ai_field() {
        assert!(matches!(parse(r#"{"success": true}"#), Err(CompletionError::MissingReply)));
    }

    #[test]
    fn test_missing_success_is_failure() {
        assert!(matches!(parse(r#"{"ai": "text"}"#), Err(CompletionError::Rejected(_))));
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_string(&ProxyRequest { message: "Explain Lex" }).unwrap();
        assert_eq!(body, r#"{"message":"Explain Lex"}"#);
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let client = ProxyClient::new("http://127.0.0.1:9/api/ask", Duration::from_millis(200));
        assert!(matches!(client.complete("hi"), Err(CompletionError::Transport(_))));
    }
}
