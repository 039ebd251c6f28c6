use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::{Browser, DeviceType, OperatingSystem, UtmParams, VisitorContext};
use crate::error::Error;
use crate::model::SessionId;

/// Category the tracker tags the landing page with.
pub const LANDING_CATEGORY: &str = "homepage";
/// Category carried by the event emitted when the page is unloaded.
pub const PAGE_LEAVE_CATEGORY: &str = "page-leave";

/// Custom event names emitted by the tracker itself.
pub mod names {
    pub const SCROLL_DEPTH: &str = "scroll_depth";
    pub const PAGE_HIDDEN: &str = "page_hidden";
    pub const PAGE_VISIBLE: &str = "page_visible";
    pub const FORM_SUBMISSION: &str = "form_submission";
    pub const BUTTON_CLICK: &str = "button_click";
    pub const LINK_CLICK: &str = "link_click";
}

//
// ─── ENDPOINTS ─────────────────────────────────────────────────────────────────
//

/// Ingestion endpoints, relative to the analytics API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Track,
    Event,
}

impl Endpoint {
    pub const TRACK_PATH: &'static str = "/analytics/track";
    pub const EVENT_PATH: &'static str = "/analytics/event";

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Track => Self::TRACK_PATH,
            Endpoint::Event => Self::EVENT_PATH,
        }
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            Self::TRACK_PATH => Some(Endpoint::Track),
            Self::EVENT_PATH => Some(Endpoint::Event),
            _ => None,
        }
    }
}

//
// ─── PAGE VISIT ────────────────────────────────────────────────────────────────
//

/// Body of `POST /analytics/track`.
///
/// `time_on_page` is the whole seconds spent on the previous page and is
/// `None` only for the first visit of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisitEvent {
    pub page_url: String,
    pub page_title: String,
    pub page_category: String,
    pub session_id: SessionId,
    pub user_id: Option<String>,
    pub time_on_page: Option<u64>,
    pub referrer: String,
    pub device_type: DeviceType,
    pub browser: Browser,
    pub operating_system: OperatingSystem,
    #[serde(flatten)]
    pub utm: UtmParams,
    pub visited_at: DateTime<Utc>,
}

/// Page-specific inputs for a visit; the rest comes from the session and the
/// classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVisitDraft {
    pub page_url: String,
    pub page_title: String,
    pub page_category: String,
    pub user_id: Option<String>,
    pub time_on_page: Option<u64>,
    pub referrer: String,
}

impl PageVisitDraft {
    #[must_use]
    pub fn into_event(
        self,
        session_id: SessionId,
        context: VisitorContext,
        visited_at: DateTime<Utc>,
    ) -> PageVisitEvent {
        PageVisitEvent {
            page_url: self.page_url,
            page_title: self.page_title,
            page_category: self.page_category,
            session_id,
            user_id: self.user_id,
            time_on_page: self.time_on_page,
            referrer: self.referrer,
            device_type: context.device_type,
            browser: context.browser,
            operating_system: context.operating_system,
            utm: context.utm,
            visited_at,
        }
    }
}

impl PageVisitEvent {
    #[must_use]
    pub fn is_page_leave(&self) -> bool {
        self.page_category == PAGE_LEAVE_CATEGORY
    }
}

//
// ─── CUSTOM EVENT ──────────────────────────────────────────────────────────────
//

/// Body of `POST /analytics/event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub event_name: String,
    #[serde(default)]
    pub event_data: Map<String, Value>,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub page_url: String,
    pub page_title: String,
}

impl CustomEvent {
    /// Look up a string field in `event_data`.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.event_data.get(key).and_then(Value::as_str)
    }
}

//
// ─── WIRE ──────────────────────────────────────────────────────────────────────
//

/// A payload as received by an ingestion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Visit(PageVisitEvent),
    Custom(CustomEvent),
}

impl TelemetryEvent {
    /// Decode a JSON body posted to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownEndpoint` for paths other than the two ingestion
    /// endpoints and `Error::Json` when the body does not match the endpoint.
    pub fn from_wire(path: &str, body: &Value) -> Result<Self, Error> {
        match Endpoint::from_path(path) {
            Some(Endpoint::Track) => Ok(Self::Visit(PageVisitEvent::deserialize(body)?)),
            Some(Endpoint::Event) => Ok(Self::Custom(CustomEvent::deserialize(body)?)),
            None => Err(Error::UnknownEndpoint(path.to_string())),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Visit(visit) => &visit.session_id,
            Self::Custom(event) => &event.session_id,
        }
    }

    /// When the event happened on the client.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Visit(visit) => visit.visited_at,
            Self::Custom(event) => event.timestamp,
        }
    }
}
