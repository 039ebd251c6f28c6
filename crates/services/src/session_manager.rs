use beacon_core::Clock;
use beacon_core::model::{Session, SessionId};
use chrono::{DateTime, Utc};

/// Where the tracker believes the visitor is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// No visit recorded yet in this session.
    Unvisited,
    OnPage {
        url: String,
        entered_at: DateTime<Utc>,
    },
}

/// Owns the session and the current-page pointer for one page load.
///
/// The session never changes after construction. The page pointer is moved
/// only by the page visit tracker.
#[derive(Debug)]
pub struct SessionManager {
    session: Session,
    page: PageState,
}

impl SessionManager {
    /// Start a new session at the clock's current time.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            session: Session::start(clock.now(), &mut rand::rng()),
            page: PageState::Unvisited,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    #[must_use]
    pub fn page(&self) -> &PageState {
        &self.page
    }

    #[must_use]
    pub fn current_page(&self) -> Option<&str> {
        match &self.page {
            PageState::Unvisited => None,
            PageState::OnPage { url, .. } => Some(url.as_str()),
        }
    }

    #[must_use]
    pub fn page_entered_at(&self) -> Option<DateTime<Utc>> {
        match &self.page {
            PageState::Unvisited => None,
            PageState::OnPage { entered_at, .. } => Some(*entered_at),
        }
    }

    /// Whole seconds since the current page was entered, floored; `None`
    /// before the first visit. Clock skew backwards reads as zero.
    #[must_use]
    pub fn seconds_on_page(&self, now: DateTime<Utc>) -> Option<u64> {
        self.page_entered_at()
            .map(|entered| u64::try_from((now - entered).num_seconds()).unwrap_or(0))
    }

    pub(crate) fn enter_page(&mut self, url: &str, at: DateTime<Utc>) {
        self.page = PageState::OnPage {
            url: url.to_string(),
            entered_at: at,
        };
    }
}
