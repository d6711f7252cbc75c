use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::http::StatusCode;
use futures_util::stream::BoxStream;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{dto::ChatMessage, sse::token_stream};
use crate::{
    config::CompletionConfig,
    error::{AppError, AppResult},
};

pub type TokenStream = BoxStream<'static, Result<String, AppError>>;

/// Hosted language model that answers a transcript with a token stream.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Resolves once the upstream has accepted the request; tokens then
    /// arrive on the returned stream.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq, OpenAI, ...).
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(cfg: &CompletionConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build completion http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Upstream {
            status: StatusCode::GATEWAY_TIMEOUT,
            message: "Completion API timed out".into(),
        }
    } else {
        AppError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: format!("Completion API unreachable: {e}"),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    #[instrument(skip(self, messages), fields(model = %self.model, turns = messages.len()))]
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream> {
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            stream: true,
        };
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status, message });
        }

        debug!(%status, "completion stream opened");
        Ok(token_stream(res.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::dto::Role;

    fn cfg(base_url: &str) -> CompletionConfig {
        CompletionConfig {
            api_key: "test-key".into(),
            base_url: base_url.into(),
            model: "test-model".into(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let c = OpenAiCompatClient::new(&cfg("https://api.groq.com/openai/v1/")).unwrap();
        assert_eq!(c.endpoint, "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![ChatMessage {
            role: Role::User,
            content: "hi".into(),
        }];
        let body = serde_json::to_value(CompletionRequest {
            model: "m",
            messages: &messages,
            stream: true,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let c = OpenAiCompatClient::new(&cfg("http://127.0.0.1:1")).unwrap();
        let err = match c.stream_chat(Vec::new()).await {
            Err(e) => e,
            Ok(_) => panic!("expected transport failure"),
        };
        assert!(matches!(
            err.status(),
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ));
    }
}
