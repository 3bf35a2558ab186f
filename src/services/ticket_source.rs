use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::ForecastError;
use crate::models::{decode_ticket_batch, TicketRecord};

/// Where a forecasting cycle gets its ticket batch from.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TicketRecord>, ForecastError>;

    /// Short label for logs and health output.
    fn describe(&self) -> String;
}

/// Batch held in process, fed through the API or by tests.
#[derive(Debug, Default)]
pub struct InMemoryTicketSource {
    records: RwLock<Vec<TicketRecord>>,
}

impl InMemoryTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TicketRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replaces the whole batch.
    pub async fn replace(&self, records: Vec<TicketRecord>) {
        *self.records.write().await = records;
    }

    pub async fn extend(&self, records: impl IntoIterator<Item = TicketRecord>) {
        self.records.write().await.extend(records);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TicketSource for InMemoryTicketSource {
    async fn fetch(&self) -> Result<Vec<TicketRecord>, ForecastError> {
        Ok(self.records.read().await.clone())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

/// Ticket listing fetched over HTTP from the ticket store.
pub struct HttpTicketSource {
    client: Client,
    url: String,
}

impl HttpTicketSource {
    /// Build a source using a reqwest client with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to construct reqwest client for ticket source")?;

        Ok(Self::with_client(url, client))
    }

    /// Build a source from an existing client (useful for testing).
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TicketSource for HttpTicketSource {
    async fn fetch(&self) -> Result<Vec<TicketRecord>, ForecastError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "ticket source request failed");
                ForecastError::SourceUnavailable(format!("request to {} failed: {}", self.url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForecastError::SourceUnavailable(format!(
                "{} responded with {}",
                self.url, status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ForecastError::SourceUnavailable(format!(
                "could not decode response from {}: {}",
                self.url, e
            ))
        })?;

        let records = decode_ticket_batch(body)?;
        debug!(url = %self.url, count = records.len(), "fetched ticket batch");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("http({})", self.url)
    }
}
