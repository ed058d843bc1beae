//! Agent HTTP client: forward one inbound message, get back reply text and/or a file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A base64-encoded file payload on the webhook wire (both directions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub base64: String,
    pub filename: String,
    pub mimetype: String,
}

/// Webhook request body: `{"sender","text","attachment"}`.
/// `attachment` is serialized as null when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRequest {
    pub sender: String,
    pub text: String,
    pub attachment: Option<FilePayload>,
}

/// Webhook response body: `{"reply"?, "file"?}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub file: Option<FilePayload>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("agent api error: {0}")]
    Api(String),
}

/// One forwarding call to the agent.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn ask(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// Client for the agent webhook endpoint.
#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    client: reqwest::Client,
}

impl AgentClient {
    /// `timeout` bounds the whole webhook call (connect + response body).
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => {
                log::warn!("building agent http client failed ({}), using default", e);
                reqwest::Client::new()
            }
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl AgentBackend for AgentClient {
    /// POST {base}/webhook with the message; parse `{"reply"?, "file"?}`.
    async fn ask(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let url = format!("{}/webhook", self.base_url);
        let res = self.client.post(&url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AgentError::Api(format!("{} {}", status, body)));
        }
        let data: AgentResponse = res.json().await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_null_attachment() {
        let request = AgentRequest {
            sender: "15197310464@s.whatsapp.net".to_string(),
            text: "status?".to_string(),
            attachment: None,
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert_eq!(
            json,
            r#"{"sender":"15197310464@s.whatsapp.net","text":"status?","attachment":null}"#
        );
    }

    #[test]
    fn response_fields_are_optional() {
        let res: AgentResponse = serde_json::from_str("{}").expect("parse");
        assert!(res.reply.is_none());
        assert!(res.file.is_none());

        let res: AgentResponse = serde_json::from_str(
            r#"{"reply":"done","file":{"base64":"aGk=","filename":"a.txt","mimetype":"text/plain"}}"#,
        )
        .expect("parse");
        assert_eq!(res.reply.as_deref(), Some("done"));
        assert_eq!(res.file.as_ref().map(|f| f.filename.as_str()), Some("a.txt"));
    }
}
