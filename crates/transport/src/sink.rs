use async_trait::async_trait;
use beacon_core::Clock;
use beacon_core::metrics::{
    self, DailyTrends, DashboardSummary, Distribution, PageVisitCount,
};
use beacon_core::model::{CustomEvent, PageVisitEvent, TelemetryEvent};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by event delivery. The tracker logs these and drops them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("ingestion endpoint answered with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("payload rejected: {0}")]
    Rejected(#[from] beacon_core::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by dashboard reads. These reach the user.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("analytics endpoint answered with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("analytics request was refused: {message}")]
    Rejected { message: String },

    #[error("analytics response carried no data")]
    EmptyResponse,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Write side: delivers one JSON body to an ingestion path.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `payload` to `path` (relative to the analytics base URL).
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on network failure or a non-2xx answer.
    async fn send(&self, path: &str, payload: &Value) -> Result<(), TransportError>;
}

/// Read side: the aggregation endpoints the dashboard pulls from.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `SourceError` if the summary cannot be fetched.
    async fn summary(&self) -> Result<DashboardSummary, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` if the ranking cannot be fetched.
    async fn most_visited_pages(&self, limit: u32) -> Result<Vec<PageVisitCount>, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` if the trends cannot be fetched.
    async fn daily_trends(&self, days: u32) -> Result<DailyTrends, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` if the distribution cannot be fetched.
    async fn device_distribution(&self) -> Result<Distribution, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` if the distribution cannot be fetched.
    async fn browser_distribution(&self) -> Result<Distribution, SourceError>;

    /// # Errors
    ///
    /// Returns `SourceError` if the distribution cannot be fetched.
    async fn page_category_distribution(&self) -> Result<Distribution, SourceError>;
}

/// In-memory ingestion and aggregation for tests and local demos.
///
/// Accepts the same JSON bodies as the HTTP endpoints and answers the same
/// reads. `set_available(false)` makes every call fail, which is how tests
/// simulate an outage.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    clock: Clock,
    received: Arc<Mutex<Vec<TelemetryEvent>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryEventLog {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            received: Arc::new(Mutex::new(Vec::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Everything received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<TelemetryEvent> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Page visits ordered by their own timestamp.
    #[must_use]
    pub fn visits(&self) -> Vec<PageVisitEvent> {
        let mut visits: Vec<PageVisitEvent> = self
            .received()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Visit(visit) => Some(visit),
                TelemetryEvent::Custom(_) => None,
            })
            .collect();
        visits.sort_by_key(|v| v.visited_at);
        visits
    }

    /// Custom events ordered by their own timestamp.
    #[must_use]
    pub fn custom_events(&self) -> Vec<CustomEvent> {
        let mut events: Vec<CustomEvent> = self
            .received()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Custom(custom) => Some(custom),
                TelemetryEvent::Visit(_) => None,
            })
            .collect();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// Custom events with the given name, ordered by timestamp.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<CustomEvent> {
        self.custom_events()
            .into_iter()
            .filter(|e| e.event_name == name)
            .collect()
    }

    fn ensure_readable(&self) -> Result<(), SourceError> {
        if self.is_offline() {
            return Err(SourceError::Unavailable("in-memory backend is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn send(&self, path: &str, payload: &Value) -> Result<(), TransportError> {
        if self.is_offline() {
            return Err(TransportError::Unavailable(
                "in-memory backend is offline".into(),
            ));
        }
        let event = TelemetryEvent::from_wire(path, payload)?;
        let mut guard = self
            .received
            .lock()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        guard.push(event);
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSource for InMemoryEventLog {
    async fn summary(&self) -> Result<DashboardSummary, SourceError> {
        self.ensure_readable()?;
        Ok(metrics::aggregate(
            &self.visits(),
            &self.custom_events(),
            self.clock.now(),
        ))
    }

    async fn most_visited_pages(&self, limit: u32) -> Result<Vec<PageVisitCount>, SourceError> {
        self.ensure_readable()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(metrics::most_visited_pages(&self.visits(), limit))
    }

    async fn daily_trends(&self, days: u32) -> Result<DailyTrends, SourceError> {
        self.ensure_readable()?;
        let now = self.clock.now();
        let visit_times: Vec<_> = self.visits().iter().map(|v| v.visited_at).collect();
        let contact_times: Vec<_> = self
            .custom_events()
            .iter()
            .filter(|e| metrics::is_contact(e))
            .map(|e| e.timestamp)
            .collect();
        Ok(DailyTrends {
            page_visit_trends: metrics::daily_counts(&visit_times, now, days),
            contact_trends: metrics::daily_counts(&contact_times, now, days),
            days,
        })
    }

    async fn device_distribution(&self) -> Result<Distribution, SourceError> {
        self.ensure_readable()?;
        let visits = self.visits();
        Ok(metrics::distribution(
            visits.iter().map(|v| v.device_type.as_str()),
        ))
    }

    async fn browser_distribution(&self) -> Result<Distribution, SourceError> {
        self.ensure_readable()?;
        let visits = self.visits();
        Ok(metrics::distribution(visits.iter().map(|v| v.browser.as_str())))
    }

    async fn page_category_distribution(&self) -> Result<Distribution, SourceError> {
        self.ensure_readable()?;
        let visits = self.visits();
        Ok(metrics::distribution(
            visits.iter().map(|v| v.page_category.as_str()),
        ))
    }
}

/// Write and read adapters behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Backend {
    pub sink: Arc<dyn EventSink>,
    pub source: Arc<dyn AnalyticsSource>,
}

impl Backend {
    #[must_use]
    pub fn in_memory(clock: Clock) -> (Self, InMemoryEventLog) {
        let log = InMemoryEventLog::new(clock);
        let sink: Arc<dyn EventSink> = Arc::new(log.clone());
        let source: Arc<dyn AnalyticsSource> = Arc::new(log.clone());
        (Self { sink, source }, log)
    }

    #[must_use]
    pub fn http(base_url: &str) -> Self {
        let client = reqwest::Client::new();
        let sink: Arc<dyn EventSink> =
            Arc::new(crate::http::HttpEventSink::with_client(client.clone(), base_url));
        let source: Arc<dyn AnalyticsSource> =
            Arc::new(crate::http::HttpAnalyticsSource::with_client(client, base_url));
        Self { sink, source }
    }
}
