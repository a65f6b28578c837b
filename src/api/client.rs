use super::decoder::text_stream;
use super::types::*;
use super::utils::{check_response_status, with_retries};
use super::{ChatService, ChunkStream};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::session::SessionId;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use std::time::Duration;

/// `ChatService` backed by the chat HTTP API
#[derive(Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
    max_retries: u32,
}

impl HttpChatService {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ChatError::Config(format!("Invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ChatError::Config(format!(
                "base_url cannot be used as a base: {}",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain"));

        // No total timeout on the client itself: a streamed reply may take
        // longer than any single request is allowed to.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries,
        })
    }

    /// Build `<base_url>/<segments...>`, percent-encoding every segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("Invalid base_url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl ChatService for HttpChatService {
    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let url = self.endpoint(&["chat", "sessions"])?;

        let response = with_retries("list sessions", self.max_retries, || {
            let request = self.client.get(url.clone()).timeout(self.request_timeout);
            async move { request.send().await?.error_for_status() }
        })
        .await?;

        let raw: Vec<String> = response.json().await?;
        let sessions = raw
            .into_iter()
            .filter_map(|id| match SessionId::new(id) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid session id from server");
                    None
                }
            })
            .collect();

        Ok(sessions)
    }

    async fn create_session(&self) -> Result<SessionId> {
        let url = self.endpoint(&["chat", "sessions"])?;

        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_response_status(response).await?;
        let created: SessionResponse = response.json().await?;

        tracing::debug!(session = %created.session_id, "Session created");
        Ok(created.session_id)
    }

    async fn rename_session(&self, old: &SessionId, new: &SessionId) -> Result<()> {
        let url = self.endpoint(&["chat", "sessions", old.as_str()])?;

        let response = self
            .client
            .put(url)
            .timeout(self.request_timeout)
            .json(&RenameSessionRequest {
                new_session_id: new.as_str(),
            })
            .send()
            .await?;
        check_response_status(response).await?;

        Ok(())
    }

    async fn delete_session(&self, session: &SessionId) -> Result<()> {
        let url = self.endpoint(&["chat", "sessions", session.as_str()])?;

        let response = self
            .client
            .delete(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        check_response_status(response).await?;

        Ok(())
    }

    async fn get_history(&self, session: &SessionId) -> Result<Vec<HistoryEntry>> {
        let url = self.endpoint(&["chat", "history", session.as_str()])?;

        let response = with_retries("load history", self.max_retries, || {
            let request = self.client.get(url.clone()).timeout(self.request_timeout);
            async move { request.send().await?.error_for_status() }
        })
        .await?;

        Ok(response.json().await?)
    }

    async fn send_message(&self, session: &SessionId, message: &str) -> Result<ChunkStream> {
        let url = self.endpoint(&["chat", "chat", "rag"])?;

        let response = self
            .client
            .post(url)
            .json(&SendMessageRequest {
                message,
                session_id: session.as_str(),
            })
            .send()
            .await?;
        let response = check_response_status(response).await?;

        tracing::debug!(session = %session, status = %response.status(), "Reply stream opened");
        Ok(text_stream(response.bytes_stream()))
    }
}
