use std::sync::Arc;

use beacon_core::metrics::{DailyTrends, DashboardSummary, Distribution, PageVisitCount, TrendPoint};
use transport::AnalyticsSource;

use crate::config::TelemetryConfig;
use crate::error::DashboardError;

/// Message shown when a dashboard read fails.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load analytics data";

/// What the dashboard renders once a load has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub summary: DashboardSummary,
    pub trend: Vec<TrendPoint>,
    pub top_pages: Vec<PageVisitCount>,
}

/// Load state of the dashboard. A failed read is shown as such, never as
/// zeros.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DashboardState {
    /// Initial state before the first `load` settles.
    #[default]
    Loading,
    Ready(Box<DashboardView>),
    Failed { message: String },
}

impl DashboardState {
    #[must_use]
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn view(&self) -> Option<&DashboardView> {
        match self {
            Self::Ready(view) => Some(&**view),
            _ => None,
        }
    }
}

/// Read side of the pipeline: pulls aggregates for the dashboard.
#[derive(Clone)]
pub struct DashboardService {
    source: Arc<dyn AnalyticsSource>,
    limit: u32,
    days: u32,
}

impl DashboardService {
    #[must_use]
    pub fn new(source: Arc<dyn AnalyticsSource>, limit: u32, days: u32) -> Self {
        Self {
            source,
            limit,
            days,
        }
    }

    #[must_use]
    pub fn from_config(source: Arc<dyn AnalyticsSource>, config: &TelemetryConfig) -> Self {
        Self::new(source, config.dashboard_limit, config.trend_days)
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn summary(&self) -> Result<DashboardSummary, DashboardError> {
        logged("summary", self.source.summary().await)
    }

    /// Most visited pages, capped at the configured limit.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn most_visited_pages(&self) -> Result<Vec<PageVisitCount>, DashboardError> {
        logged(
            "most visited pages",
            self.source.most_visited_pages(self.limit).await,
        )
    }

    /// Visits and contacts per day over the configured window.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn daily_trends(&self) -> Result<DailyTrends, DashboardError> {
        logged("daily trends", self.source.daily_trends(self.days).await)
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn device_distribution(&self) -> Result<Distribution, DashboardError> {
        logged(
            "device distribution",
            self.source.device_distribution().await,
        )
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn browser_distribution(&self) -> Result<Distribution, DashboardError> {
        logged(
            "browser distribution",
            self.source.browser_distribution().await,
        )
    }

    /// # Errors
    ///
    /// Returns `DashboardError::Source` if the aggregator cannot be read.
    pub async fn page_category_distribution(&self) -> Result<Distribution, DashboardError> {
        logged(
            "page category distribution",
            self.source.page_category_distribution().await,
        )
    }

    /// Load everything the dashboard shows. Any failed read turns the whole
    /// load into `Failed`; calling `load` again is the retry.
    pub async fn load(&self) -> DashboardState {
        match self.load_view().await {
            Ok(view) => DashboardState::Ready(Box::new(view)),
            Err(_) => DashboardState::Failed {
                message: LOAD_FAILED_MESSAGE.to_string(),
            },
        }
    }

    async fn load_view(&self) -> Result<DashboardView, DashboardError> {
        let summary = self.summary().await?;
        let trend = self.daily_trends().await?.series();
        let top_pages = self.most_visited_pages().await?;
        Ok(DashboardView {
            summary,
            trend,
            top_pages,
        })
    }
}

fn logged<T>(
    what: &str,
    result: Result<T, transport::SourceError>,
) -> Result<T, DashboardError> {
    result.map_err(|err| {
        log::error!("failed to load {what}: {err}");
        DashboardError::from(err)
    })
}

//
// ─── FORMATTING ────────────────────────────────────────────────────────────────
//

/// Compact count: `999`, `1.2K`, `3.4M`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// One decimal and a percent sign.
#[must_use]
pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}

/// `Xm Ys` from a seconds value; fractional seconds are dropped.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}m {}s", total / 60, total % 60)
}

/// Growth rate with an explicit sign: `+12.5%`, `-3.0%`, `0.0%`.
#[must_use]
pub fn format_growth(rate: f64) -> String {
    if rate > 0.0 {
        format!("+{}", format_percentage(rate))
    } else {
        format_percentage(rate)
    }
}
