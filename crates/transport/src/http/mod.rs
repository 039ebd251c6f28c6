use async_trait::async_trait;
use beacon_core::metrics::{DailyTrends, DashboardSummary, Distribution, PageVisitCount};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::sink::{AnalyticsSource, EventSink, SourceError, TransportError};

const SUMMARY_PATH: &str = "/analytics/summary";
const MOST_VISITED_PATH: &str = "/analytics/most-visited-pages";
const DAILY_TRENDS_PATH: &str = "/analytics/daily-trends";
const DEVICE_DISTRIBUTION_PATH: &str = "/analytics/device-distribution";
const BROWSER_DISTRIBUTION_PATH: &str = "/analytics/browser-distribution";
const CATEGORY_DISTRIBUTION_PATH: &str = "/analytics/page-category-distribution";

fn join(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Posts event bodies to the analytics API.
#[derive(Clone)]
pub struct HttpEventSink {
    client: Client,
    base_url: String,
}

impl HttpEventSink {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn send(&self, path: &str, payload: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(join(&self.base_url, path))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("POST {path} answered {status}");
            return Err(TransportError::HttpStatus(status));
        }
        Ok(())
    }
}

/// `{ success, message, data }` wrapper the analytics API puts around reads.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<T, SourceError> {
        if !self.success {
            return Err(SourceError::Rejected {
                message: self.message.unwrap_or_else(|| "no message".into()),
            });
        }
        self.data.ok_or(SourceError::EmptyResponse)
    }
}

/// Reads the aggregation endpoints of the analytics API.
#[derive(Clone)]
pub struct HttpAnalyticsSource {
    client: Client,
    base_url: String,
}

impl HttpAnalyticsSource {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, u32)],
    ) -> Result<T, SourceError> {
        let response = self
            .client
            .get(join(&self.base_url, path))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("GET {path} answered {status}");
            return Err(SourceError::HttpStatus(status));
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        envelope.into_data()
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    async fn summary(&self) -> Result<DashboardSummary, SourceError> {
        self.get(SUMMARY_PATH, &[]).await
    }

    async fn most_visited_pages(&self, limit: u32) -> Result<Vec<PageVisitCount>, SourceError> {
        self.get(MOST_VISITED_PATH, &[("limit", limit)]).await
    }

    async fn daily_trends(&self, days: u32) -> Result<DailyTrends, SourceError> {
        self.get(DAILY_TRENDS_PATH, &[("days", days)]).await
    }

    async fn device_distribution(&self) -> Result<Distribution, SourceError> {
        self.get(DEVICE_DISTRIBUTION_PATH, &[]).await
    }

    async fn browser_distribution(&self) -> Result<Distribution, SourceError> {
        self.get(BROWSER_DISTRIBUTION_PATH, &[]).await
    }

    async fn page_category_distribution(&self) -> Result<Distribution, SourceError> {
        self.get(CATEGORY_DISTRIBUTION_PATH, &[]).await
    }
}
