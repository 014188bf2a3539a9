//! HTTP client for the remote engine service
//!
//! Every call is a single request against `{base_url}/{endpoint}`. Session
//! start is a POST whose body is the start descriptor; the rest are GETs
//! with the session id and call parameters in the query string.

use std::time::Duration;

use async_trait::async_trait;

use tempo_core::error::EngineError;
use tempo_core::EngineService;
use tempo_protocol::endpoint;
use tempo_protocol::{ClockBudget, EngineMove, NewGameResponse, SessionId, StartDescriptor};

/// [`EngineService`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpEngine {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEngine {
    /// Create a client for the service at `base_url`.
    ///
    /// `timeout` bounds every request, including reading the reply.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Transport {
                endpoint: "client",
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Send a GET and return the reply body if the status is a success
    async fn get(
        &self,
        endpoint: &'static str,
        query: &[(&'static str, String)],
    ) -> Result<String, EngineError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        read_body(endpoint, response).await
    }
}

fn transport(endpoint: &'static str, error: reqwest::Error) -> EngineError {
    EngineError::Transport {
        endpoint,
        message: error.to_string(),
    }
}

async fn read_body(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<String, EngineError> {
    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|e| transport(endpoint, e))
}

fn session_query(session: SessionId) -> Vec<(&'static str, String)> {
    vec![(endpoint::PLAYER_ID, session.as_u64().to_string())]
}

#[async_trait]
impl EngineService for HttpEngine {
    async fn start_session(&self, descriptor: &StartDescriptor) -> Result<SessionId, EngineError> {
        let response = self
            .client
            .post(self.url(endpoint::NEW_GAME))
            .header("Content-Type", "application/json")
            .body(descriptor.to_body())
            .send()
            .await
            .map_err(|e| transport(endpoint::NEW_GAME, e))?;

        let body = read_body(endpoint::NEW_GAME, response).await?;
        let reply: NewGameResponse =
            serde_json::from_str(&body).map_err(|e| EngineError::MalformedReply {
                endpoint: endpoint::NEW_GAME,
                message: e.to_string(),
            })?;

        tracing::info!("Engine assigned {} for {}", reply.player_id, descriptor);
        Ok(reply.player_id)
    }

    async fn best_move(
        &self,
        session: SessionId,
        budget: ClockBudget,
    ) -> Result<EngineMove, EngineError> {
        let body = self.get(endpoint::BEST_MOVE, &budget.query(session)).await?;
        EngineMove::parse(&body).map_err(|e| EngineError::MalformedReply {
            endpoint: endpoint::BEST_MOVE,
            message: e.to_string(),
        })
    }

    async fn report_move(&self, session: SessionId, mv: &EngineMove) -> Result<(), EngineError> {
        let mut query = session_query(session);
        query.push((endpoint::MOVE, mv.to_string()));
        self.get(endpoint::PLAYER_MOVE, &query).await?;
        Ok(())
    }

    async fn end_session(&self, session: SessionId) -> Result<(), EngineError> {
        self.get(endpoint::END_GAME, &session_query(session)).await?;
        tracing::debug!("Ended {}", session);
        Ok(())
    }

    async fn keep_alive(&self, session: SessionId) -> Result<(), EngineError> {
        self.get(endpoint::KEEP_ALIVE, &session_query(session)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let engine = HttpEngine::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(engine.base_url(), "http://localhost:8080");
        assert_eq!(engine.url(endpoint::END_GAME), "http://localhost:8080/endgame/");
    }

    #[test]
    fn test_session_query() {
        assert_eq!(
            session_query(SessionId::new(12)),
            vec![("playerID", "12".to_string())]
        );
    }
}
