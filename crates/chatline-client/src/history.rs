//! Recent-message collaborator used to seed the visible list on bind.

use std::sync::Arc;

use async_trait::async_trait;
use chatline_core::{classify_value, ChannelId, ChatMessage, Inbound};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;
use crate::credentials::{present_token, CredentialProvider};
use crate::endpoint::history_url;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("history request returned status {0}")]
    Status(u16),
    #[error("missing credential")]
    MissingCredential,
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_messages(&self, channel: &ChannelId) -> Result<Vec<ChatMessage>, HistoryError>;
}

/// History source that never returns anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

#[async_trait]
impl HistorySource for NoHistory {
    async fn fetch_messages(&self, _channel: &ChannelId) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(Vec::new())
    }
}

/// Fixed message list, handed out for every channel.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory(pub Vec<ChatMessage>);

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch_messages(&self, _channel: &ChannelId) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(self.0.clone())
    }
}

/// `GET {api_base}/channels/{channel}/messages?limit=N` with bearer auth.
///
/// The body must be a JSON array of inbound-envelope objects; entries that do
/// not classify as visible messages are skipped.
pub struct HttpHistorySource {
    client: reqwest::Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
    limit: usize,
}

impl HttpHistorySource {
    pub fn new(
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        limit: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            credentials,
            limit,
        }
    }

    /// Uses `config.history_limit` as the page size.
    pub fn from_config(
        api_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(api_base, credentials, config.history_limit)
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch_messages(&self, channel: &ChannelId) -> Result<Vec<ChatMessage>, HistoryError> {
        let token = present_token(self.credentials.as_ref()).ok_or(HistoryError::MissingCredential)?;
        let response = self
            .client
            .get(history_url(&self.api_base, channel))
            .query(&[("limit", self.limit)])
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status.as_u16()));
        }
        let entries: Vec<Value> = response.json().await?;
        Ok(visible_messages(entries))
    }
}

fn visible_messages(entries: Vec<Value>) -> Vec<ChatMessage> {
    entries
        .into_iter()
        .filter_map(|entry| match classify_value(entry) {
            Ok(Inbound::Visible(message)) => Some(message),
            Ok(other) => {
                debug!(?other, "skipping non-visible history entry");
                None
            }
            Err(err) => {
                debug!("skipping history entry: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticToken;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn messages(
        Path(channel): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok());
        if auth != Some("Bearer secret") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        assert_eq!(query.get("limit").map(String::as_str), Some("20"));
        Ok(Json(json!([
            {"id": "h1", "type": "message", "content": format!("hello {channel}")},
            {"type": "join", "author_name": "ann"},
            "garbage",
            {"id": 7, "type": "media", "media_url": "https://cdn.example/7.png"}
        ])))
    }

    async fn serve() -> String {
        let app = Router::new().route("/channels/:channel/messages", get(messages));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_source_keeps_visible_messages() {
        let base = serve().await;
        let config = ClientConfig {
            history_limit: 20,
            ..ClientConfig::default()
        };
        let source =
            HttpHistorySource::from_config(base, Arc::new(StaticToken::new("secret")), &config);
        let channel = ChannelId::parse("general").expect("channel");

        let fetched = source.fetch_messages(&channel).await.expect("history");
        let ids: Vec<&str> = fetched.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "7"]);
        assert_eq!(fetched[0].content, "hello general");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_source_reports_rejected_status() {
        let base = serve().await;
        let source = HttpHistorySource::new(base, Arc::new(StaticToken::new("wrong")), 20);
        let channel = ChannelId::parse("general").expect("channel");

        match source.fetch_messages(&channel).await {
            Err(HistoryError::Status(401)) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_source_requires_a_token() {
        let source = HttpHistorySource::new("http://127.0.0.1:9", Arc::new(StaticToken::none()), 20);
        let channel = ChannelId::parse("general").expect("channel");
        assert!(matches!(
            source.fetch_messages(&channel).await,
            Err(HistoryError::MissingCredential)
        ));
    }
}
