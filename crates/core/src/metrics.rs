//! Dashboard metrics: the read-side shape served by the aggregation endpoints
//! and a reference aggregation over raw events.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CustomEvent, PageVisitEvent, names};

/// Label → count, ordered by label for stable output.
pub type Distribution = BTreeMap<String, u64>;

/// `YYYY-MM-DD` → count.
pub type DailyCounts = BTreeMap<String, u64>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const WEEK_DAYS: i64 = 7;
const AVERAGE_WINDOW_DAYS: i64 = 30;
const DASHBOARD_TREND_DAYS: u32 = 7;
const DASHBOARD_TOP_PAGES: usize = 10;

//
// ─── READ MODELS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisitCount {
    pub page_url: String,
    #[serde(default)]
    pub page_title: String,
    pub visit_count: u64,
}

/// Week-over-week and per-day performance figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    pub avg_visits_per_day: f64,
    pub avg_contacts_per_day: f64,
    pub visit_growth_rate: f64,
    pub contact_growth_rate: f64,
    pub this_week_visits: u64,
    pub last_week_visits: u64,
    pub this_week_contacts: u64,
    pub last_week_contacts: u64,
}

/// Everything the dashboard renders from `GET /analytics/summary`.
///
/// Missing fields deserialize to zero/empty so a partially populated backend
/// still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSummary {
    pub total_visits: u64,
    pub unique_sessions: u64,
    pub unique_users: u64,
    pub total_contacts: u64,
    pub today_visits: u64,
    pub today_contacts: u64,
    pub avg_time_on_page: f64,
    pub contact_conversion_rate: f64,
    pub most_visited_pages: Vec<PageVisitCount>,
    pub device_distribution: Distribution,
    pub browser_distribution: Distribution,
    pub page_category_distribution: Distribution,
    pub daily_page_visit_trends: DailyCounts,
    pub daily_contact_trends: DailyCounts,
    pub performance_metrics: PerformanceMetrics,
}

/// One point of the visits-vs-contacts chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub visits: u64,
    pub contacts: u64,
}

/// Body of `GET /analytics/daily-trends?days=N`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyTrends {
    pub page_visit_trends: DailyCounts,
    pub contact_trends: DailyCounts,
    pub days: u32,
}

impl DailyTrends {
    /// Per-date series keyed on visit dates; dates without contacts read 0.
    #[must_use]
    pub fn series(&self) -> Vec<TrendPoint> {
        merge_trends(&self.page_visit_trends, &self.contact_trends)
    }
}

impl DashboardSummary {
    #[must_use]
    pub fn trend_series(&self) -> Vec<TrendPoint> {
        merge_trends(&self.daily_page_visit_trends, &self.daily_contact_trends)
    }
}

fn merge_trends(visits: &DailyCounts, contacts: &DailyCounts) -> Vec<TrendPoint> {
    visits
        .iter()
        .map(|(date, visits)| TrendPoint {
            date: date.clone(),
            visits: *visits,
            contacts: contacts.get(date).copied().unwrap_or(0),
        })
        .collect()
}

//
// ─── RATES ─────────────────────────────────────────────────────────────────────
//

/// Percentage change from `previous` to `current`; 0 when there is no baseline.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

/// Contacts per hundred visits; 0 when there were no visits.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn conversion_rate(contacts: u64, visits: u64) -> f64 {
    if visits == 0 {
        return 0.0;
    }
    contacts as f64 / visits as f64 * 100.0
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Whether a custom event counts as a contact for conversion metrics.
#[must_use]
pub fn is_contact(event: &CustomEvent) -> bool {
    event.event_name == names::FORM_SUBMISSION
}

/// Computes the dashboard view from raw events, as of `now`.
///
/// Ordering is by each event's own timestamp; arrival order is irrelevant.
#[must_use]
pub fn aggregate(
    visits: &[PageVisitEvent],
    events: &[CustomEvent],
    now: DateTime<Utc>,
) -> DashboardSummary {
    let contacts: Vec<DateTime<Utc>> = events
        .iter()
        .filter(|e| is_contact(e))
        .map(|e| e.timestamp)
        .collect();
    let visit_times: Vec<DateTime<Utc>> = visits.iter().map(|v| v.visited_at).collect();

    let total_visits = visits.len() as u64;
    let total_contacts = contacts.len() as u64;
    let today = now.date_naive();

    let unique_sessions = visits
        .iter()
        .map(|v| &v.session_id)
        .collect::<HashSet<_>>()
        .len() as u64;
    let unique_users = visits
        .iter()
        .filter_map(|v| v.user_id.as_deref())
        .collect::<HashSet<_>>()
        .len() as u64;

    let this_week_visits = count_between(&visit_times, now - Duration::days(WEEK_DAYS), now);
    let last_week_visits = count_between(
        &visit_times,
        now - Duration::days(2 * WEEK_DAYS),
        now - Duration::days(WEEK_DAYS),
    );
    let this_week_contacts = count_between(&contacts, now - Duration::days(WEEK_DAYS), now);
    let last_week_contacts = count_between(
        &contacts,
        now - Duration::days(2 * WEEK_DAYS),
        now - Duration::days(WEEK_DAYS),
    );
    let window_start = now - Duration::days(AVERAGE_WINDOW_DAYS);

    DashboardSummary {
        total_visits,
        unique_sessions,
        unique_users,
        total_contacts,
        today_visits: count_on(&visit_times, today),
        today_contacts: count_on(&contacts, today),
        avg_time_on_page: average_time_on_page(visits),
        contact_conversion_rate: conversion_rate(total_contacts, total_visits),
        most_visited_pages: most_visited_pages(visits, DASHBOARD_TOP_PAGES),
        device_distribution: distribution(visits.iter().map(|v| v.device_type.as_str())),
        browser_distribution: distribution(visits.iter().map(|v| v.browser.as_str())),
        page_category_distribution: distribution(visits.iter().map(|v| v.page_category.as_str())),
        daily_page_visit_trends: daily_counts(&visit_times, now, DASHBOARD_TREND_DAYS),
        daily_contact_trends: daily_counts(&contacts, now, DASHBOARD_TREND_DAYS),
        performance_metrics: PerformanceMetrics {
            avg_visits_per_day: per_day(count_between(&visit_times, window_start, now)),
            avg_contacts_per_day: per_day(count_between(&contacts, window_start, now)),
            visit_growth_rate: growth_rate(this_week_visits, last_week_visits),
            contact_growth_rate: growth_rate(this_week_contacts, last_week_contacts),
            this_week_visits,
            last_week_visits,
            this_week_contacts,
            last_week_contacts,
        },
    }
}

/// Mean `time_on_page` over visits that carry one; 0 when none do.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_time_on_page(visits: &[PageVisitEvent]) -> f64 {
    let timed: Vec<u64> = visits.iter().filter_map(|v| v.time_on_page).collect();
    if timed.is_empty() {
        return 0.0;
    }
    timed.iter().sum::<u64>() as f64 / timed.len() as f64
}

/// Pages ranked by visit count, ties broken by URL. The title is the one from
/// the most recent visit.
#[must_use]
pub fn most_visited_pages(visits: &[PageVisitEvent], limit: usize) -> Vec<PageVisitCount> {
    let mut by_url: HashMap<&str, (u64, &PageVisitEvent)> = HashMap::new();
    for visit in visits {
        let entry = by_url.entry(visit.page_url.as_str()).or_insert((0, visit));
        entry.0 += 1;
        if visit.visited_at >= entry.1.visited_at {
            entry.1 = visit;
        }
    }

    let mut ranked: Vec<PageVisitCount> = by_url
        .into_iter()
        .map(|(url, (count, latest))| PageVisitCount {
            page_url: url.to_string(),
            page_title: latest.page_title.clone(),
            visit_count: count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.visit_count
            .cmp(&a.visit_count)
            .then_with(|| a.page_url.cmp(&b.page_url))
    });
    ranked.truncate(limit);
    ranked
}

/// Count occurrences of each label.
pub fn distribution<'a>(labels: impl Iterator<Item = &'a str>) -> Distribution {
    let mut counts = Distribution::new();
    for label in labels {
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Per-date counts for instants within the last `days` days up to `now`.
#[must_use]
pub fn daily_counts(times: &[DateTime<Utc>], now: DateTime<Utc>, days: u32) -> DailyCounts {
    let start = now - Duration::days(i64::from(days));
    let mut counts = DailyCounts::new();
    for at in times.iter().filter(|t| **t >= start && **t <= now) {
        *counts.entry(at.format(DATE_FORMAT).to_string()).or_insert(0) += 1;
    }
    counts
}

/// Instants in `(start, end]`.
fn count_between(times: &[DateTime<Utc>], start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    times.iter().filter(|t| **t > start && **t <= end).count() as u64
}

fn count_on(times: &[DateTime<Utc>], day: NaiveDate) -> u64 {
    times.iter().filter(|t| t.date_naive() == day).count() as u64
}

#[allow(clippy::cast_precision_loss)]
fn per_day(count: u64) -> f64 {
    count as f64 / AVERAGE_WINDOW_DAYS as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Browser, DeviceType, OperatingSystem, UtmParams};
    use crate::model::SessionId;
    use crate::time::fixed_now;
    use serde_json::{Map, json};

    fn visit(url: &str, session: &str, secs_ago: i64, time_on_page: Option<u64>) -> PageVisitEvent {
        PageVisitEvent {
            page_url: url.into(),
            page_title: format!("Title {url}"),
            page_category: "products".into(),
            session_id: session.parse::<SessionId>().unwrap(),
            user_id: None,
            time_on_page,
            referrer: String::new(),
            device_type: DeviceType::Desktop,
            browser: Browser::Firefox,
            operating_system: OperatingSystem::Linux,
            utm: UtmParams::default(),
            visited_at: fixed_now() - Duration::seconds(secs_ago),
        }
    }

    fn contact(days_ago: i64) -> CustomEvent {
        CustomEvent {
            event_name: names::FORM_SUBMISSION.into(),
            event_data: Map::new(),
            session_id: "session_1_a".parse().unwrap(),
            timestamp: fixed_now() - Duration::days(days_ago),
            page_url: "/contact".into(),
            page_title: "Contact".into(),
        }
    }

    #[test]
    fn growth_rate_handles_missing_baseline() {
        assert_eq!(growth_rate(10, 0), 0.0);
        assert!((growth_rate(15, 10) - 50.0).abs() < f64::EPSILON);
        assert!((growth_rate(5, 10) + 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn conversion_rate_is_percentage_of_visits() {
        assert_eq!(conversion_rate(3, 0), 0.0);
        assert!((conversion_rate(1, 4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_ignores_untimed_visits() {
        let visits = vec![
            visit("/", "session_1_a", 0, None),
            visit("/a", "session_1_a", 0, Some(10)),
            visit("/b", "session_1_a", 0, Some(20)),
        ];
        assert!((average_time_on_page(&visits) - 15.0).abs() < f64::EPSILON);
        assert_eq!(average_time_on_page(&visits[..1]), 0.0);
    }

    #[test]
    fn most_visited_ranks_by_count_then_url() {
        let visits = vec![
            visit("/b", "session_1_a", 0, None),
            visit("/a", "session_1_a", 0, None),
            visit("/c", "session_1_a", 0, None),
            visit("/c", "session_1_b", 0, None),
        ];
        let ranked = most_visited_pages(&visits, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].page_url, "/c");
        assert_eq!(ranked[0].visit_count, 2);
        assert_eq!(ranked[1].page_url, "/a");
    }

    #[test]
    fn aggregate_orders_by_event_time_not_arrival() {
        // Arrival order is scrambled; the week buckets only look at visited_at.
        let day = 24 * 60 * 60;
        let visits = vec![
            visit("/", "session_1_a", 9 * day, None),
            visit("/", "session_1_b", 60, Some(4)),
            visit("/x", "session_1_b", 8 * day, Some(8)),
            visit("/", "session_1_c", 2 * day, None),
        ];
        let events = vec![contact(1), contact(10), contact(3)];

        let summary = aggregate(&visits, &events, fixed_now());

        assert_eq!(summary.total_visits, 4);
        assert_eq!(summary.unique_sessions, 3);
        assert_eq!(summary.total_contacts, 3);
        assert_eq!(summary.today_visits, 1);
        assert_eq!(summary.performance_metrics.this_week_visits, 2);
        assert_eq!(summary.performance_metrics.last_week_visits, 2);
        assert_eq!(summary.performance_metrics.visit_growth_rate, 0.0);
        assert_eq!(summary.performance_metrics.this_week_contacts, 2);
        assert_eq!(summary.performance_metrics.last_week_contacts, 1);
        assert!((summary.performance_metrics.contact_growth_rate - 100.0).abs() < f64::EPSILON);
        assert!((summary.contact_conversion_rate - 75.0).abs() < f64::EPSILON);
        assert!((summary.avg_time_on_page - 6.0).abs() < f64::EPSILON);
        assert_eq!(summary.device_distribution.get("desktop"), Some(&4));
        assert_eq!(summary.browser_distribution.get("Firefox"), Some(&4));
        assert_eq!(summary.most_visited_pages[0].page_url, "/");
        assert_eq!(summary.daily_page_visit_trends.get("2023-11-14"), Some(&1));
        assert!(!summary.daily_page_visit_trends.contains_key("2023-11-05"));
    }

    #[test]
    fn trend_series_fills_missing_contacts_with_zero() {
        let trends = DailyTrends {
            page_visit_trends: [("2023-11-13".to_string(), 4), ("2023-11-14".to_string(), 2)]
                .into_iter()
                .collect(),
            contact_trends: [("2023-11-14".to_string(), 1)].into_iter().collect(),
            days: 7,
        };
        assert_eq!(
            trends.series(),
            vec![
                TrendPoint { date: "2023-11-13".into(), visits: 4, contacts: 0 },
                TrendPoint { date: "2023-11-14".into(), visits: 2, contacts: 1 },
            ]
        );
    }

    #[test]
    fn summary_tolerates_missing_fields() {
        let summary: DashboardSummary =
            serde_json::from_value(json!({ "totalVisits": 12, "avgTimeOnPage": 3.5 })).unwrap();
        assert_eq!(summary.total_visits, 12);
        assert_eq!(summary.unique_sessions, 0);
        assert!(summary.device_distribution.is_empty());
        assert_eq!(summary.performance_metrics, PerformanceMetrics::default());
    }
}
