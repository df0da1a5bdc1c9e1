use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

use super::RatingPredictor;
use crate::{
    error::{AppError, AppResult},
    models::{JokeId, UserId},
};

/// Response body of the model server's predict endpoint
#[derive(Debug, Deserialize)]
pub struct RemoteEstimate {
    pub estimate: f64,
}

/// Rating model served by a separate process over HTTP
///
/// Calls `GET {base_url}/predict?user_id=..&joke_id=..` and expects
/// `{"estimate": <f64>}` back.
#[derive(Clone)]
pub struct RemoteModel {
    http_client: HttpClient,
    base_url: String,
}

impl RemoteModel {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }
}

#[async_trait::async_trait]
impl RatingPredictor for RemoteModel {
    async fn estimate(&self, user_id: UserId, joke_id: JokeId) -> AppResult<f64> {
        let response = self
            .http_client
            .get(self.predict_url())
            .query(&[("user_id", user_id), ("joke_id", joke_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                user_id,
                joke_id,
                status = %status,
                body = %body,
                "Model server request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "model server returned status {}: {}",
                status, body
            )));
        }

        let remote: RemoteEstimate = response.json().await?;
        Ok(remote.estimate)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
