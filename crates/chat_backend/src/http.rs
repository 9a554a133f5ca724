use async_trait::async_trait;
use chat_core::HistoryRecord;
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, CreateSessionRequest, CreateSessionResponse, SendMessageRequest};
use crate::error::{BackendError, Result};
use crate::feed::{DocumentFeed, SessionFilter, Subscription, SESSIONS_COLLECTION};
use crate::sse::change_stream_from_sse;

/// reqwest client for the chat service, including its SSE change feed.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await?;
        Err(BackendError::Api(format!("HTTP {}: {}", status, text)))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreateSessionResponse> {
        let url = format!("{}/chat/sessions", self.base_url);
        tracing::debug!(url = %url, user_id = %request.user.id, "Creating chat session");

        let response = self.client.post(url).json(&request).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<()> {
        let url = format!("{}/chat/sessions/{}/messages", self.base_url, request.id);
        tracing::debug!(url = %url, "Sending chat message");

        let response = self.client.post(url).json(&request).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_chat_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        let url = format!("{}/chats", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentFeed for HttpChatBackend {
    async fn subscribe(&self, filter: SessionFilter) -> Result<Subscription> {
        let url = format!("{}/{}/changes", self.base_url, SESSIONS_COLLECTION);
        let response = self
            .client
            .get(url)
            .query(&[("id", filter.session_id.as_str())])
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response).await?;

        tracing::info!(session_id = %filter.session_id, "Subscribed to session changes");

        let stream = change_stream_from_sse(response);
        Ok(Subscription::new(filter, stream, CancellationToken::new()))
    }
}
