use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NarrativeError, NarrativeGenerator, ProviderError, SubscoreProvider};
use crate::scoring::domain::ScoreKey;
use crate::scoring::report::NarrativeContext;

#[derive(Debug, Serialize)]
struct SubscoreRequest {
    user_id: i64,
    year: i32,
    quarter: u8,
}

#[derive(Debug, Deserialize)]
struct SubscoreResponse {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NarrativeResponse {
    text: String,
}

/// Subscore provider backed by an HTTP scoring job.
///
/// POSTs `{user_id, year, quarter}` and expects `{"score": number | null}`. A `404` is read
/// as "no data for this user".
pub struct RemoteSubscoreProvider {
    client: Client,
    endpoint: String,
}

impl RemoteSubscoreProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SubscoreProvider for RemoteSubscoreProvider {
    async fn compute(&self, key: &ScoreKey) -> Result<Option<f64>, ProviderError> {
        let request = SubscoreRequest {
            user_id: key.user_id.0,
            year: key.period.year,
            quarter: key.period.quarter.number(),
        };
        debug!(endpoint = %self.endpoint, user_id = %key.user_id, period = %key.period, "requesting subscore");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<SubscoreResponse>()
                .await
                .map(|body| body.score)
                .map_err(|err| ProviderError::Malformed(err.to_string())),
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            other => Err(ProviderError::Status(other.as_u16())),
        }
    }
}

/// Narrative generator backed by an HTTP text-generation service.
///
/// POSTs the [`NarrativeContext`] as JSON and expects `{"text": "..."}`.
pub struct RemoteNarrativeGenerator {
    client: Client,
    endpoint: String,
}

impl RemoteNarrativeGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NarrativeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NarrativeError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NarrativeGenerator for RemoteNarrativeGenerator {
    async fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(context)
            .send()
            .await
            .map_err(|err| NarrativeError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrativeError::Status(status.as_u16()));
        }

        response
            .json::<NarrativeResponse>()
            .await
            .map(|body| body.text)
            .map_err(|err| NarrativeError::Malformed(err.to_string()))
    }
}
