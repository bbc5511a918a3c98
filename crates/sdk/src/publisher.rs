use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{ClientError, Result},
    types::{ClientConfig, HealthStatus, StreamSummary},
};

/// Request/response side of the SDK: create streams, post documents, inspect the server.
///
/// # Example
///
/// ```ignore
/// use eventcast_sdk::{ClientConfig, Publisher};
///
/// let publisher = Publisher::new(ClientConfig::new("http://localhost:9012"))?;
/// publisher.create_stream("orders").await?;
/// let seq = publisher.post("orders", &serde_json::json!({"id": 1})).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Publisher {
    config: ClientConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct AppendResponse {
    seq: u64,
}

#[derive(Deserialize)]
struct ListResponse {
    streams: Vec<StreamSummary>,
}

impl Publisher {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a stream. Fails with [`ClientError::Conflict`] if it already exists.
    pub async fn create_stream(&self, name: &str) -> Result<()> {
        let url = self.config.url(&["create", name])?;
        debug!(stream = %name, url = %url, "Creating stream");

        let response = self.http_client.post(url).send().await?;
        check_status(response).await?;

        info!(stream = %name, "Stream created");
        Ok(())
    }

    /// Post a document to a stream and return its sequence number.
    ///
    /// The payload must serialize to a JSON object.
    pub async fn post<T>(&self, name: &str, payload: &T) -> Result<u64>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload)?;
        if !value.is_object() {
            return Err(ClientError::NotAnObject);
        }

        let url = self.config.url(&[name])?;
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&value)
            .send()
            .await?;
        let response = check_status(response).await?;

        let AppendResponse { seq } = response.json().await?;
        debug!(stream = %name, seq = seq, "Posted message");
        Ok(seq)
    }

    /// List all streams on the server.
    pub async fn list(&self) -> Result<Vec<StreamSummary>> {
        let url = self.config.url(&[])?;
        let response = check_status(self.http_client.get(url).send().await?).await?;
        let ListResponse { streams } = response.json().await?;
        Ok(streams)
    }

    /// Query the liveness check.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.config.url(&["health"])?;
        let response = check_status(self.http_client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_status(status, body))
}
