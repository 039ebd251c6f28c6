use std::sync::Arc;

use beacon_core::Clock;
use beacon_core::classify::VisitorContext;
use beacon_core::model::{
    CustomEvent, Endpoint, LANDING_CATEGORY, PAGE_LEAVE_CATEGORY, PageVisitDraft, PageVisitEvent, SessionId, names,
};
use beacon_core::scroll::{ScrollDepthSampler, ScrollPosition};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use transport::EventSink;

use crate::dispatch::{Delivery, Dispatcher};
use crate::environment::Environment;
use crate::session_manager::{PageState, SessionManager};

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Per-page-load tracker: page visits, custom events and scroll milestones.
///
/// Every method that touches page or scroll state takes `&mut self` and is
/// synchronous up to the moment it hands a payload to the dispatcher, so
/// state updates never wait on the network. Nothing here returns a delivery
/// error; the returned `Delivery` can be dropped.
pub struct PageVisitTracker {
    clock: Clock,
    environment: Arc<dyn Environment>,
    session: SessionManager,
    dispatcher: Dispatcher,
    scroll: ScrollDepthSampler,
    left: bool,
}

impl PageVisitTracker {
    #[must_use]
    pub fn new(clock: Clock, environment: Arc<dyn Environment>, sink: Arc<dyn EventSink>) -> Self {
        let session = SessionManager::new(&clock);
        Self {
            clock,
            environment,
            session,
            dispatcher: Dispatcher::new(sink),
            scroll: ScrollDepthSampler::new(),
            left: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn current_page(&self) -> Option<&str> {
        self.session.current_page()
    }

    #[must_use]
    pub fn scroll_state(&self) -> &ScrollDepthSampler {
        &self.scroll
    }

    /// Record a navigation to `page_url`.
    ///
    /// The event carries the time spent on the previous page and uses it as
    /// referrer; the first visit of a session carries no time and the
    /// document's own referrer. The page pointer moves and the scroll sampler
    /// resets whatever happens to the send.
    pub fn record_visit(
        &mut self,
        page_url: &str,
        page_title: &str,
        page_category: &str,
        user_id: Option<&str>,
    ) -> Delivery {
        let now = self.clock.now();
        let referrer = match self.session.page() {
            PageState::Unvisited => self.environment.document_referrer(),
            PageState::OnPage { url, .. } => url.clone(),
        };

        let event = self.visit_event(
            PageVisitDraft {
                page_url: page_url.to_string(),
                page_title: page_title.to_string(),
                page_category: page_category.to_string(),
                user_id: user_id.map(str::to_string),
                time_on_page: self.session.seconds_on_page(now),
                referrer,
            },
            now,
        );
        let delivery = self.dispatcher.dispatch(Endpoint::Track, "page visit", &event);

        self.session.enter_page(page_url, now);
        self.scroll.reset();
        delivery
    }

    /// Record the page the host is currently showing under the landing
    /// category.
    pub fn record_landing(&mut self) -> Delivery {
        let href = self.environment.location_href();
        let title = self.environment.document_title();
        self.record_visit(&href, &title, LANDING_CATEGORY, None)
    }

    /// Report the time spent on the page being left.
    ///
    /// Emits at most once per tracker, and only after a page was recorded.
    /// Does not move the page pointer.
    pub fn record_leave(&mut self) -> Option<Delivery> {
        let PageState::OnPage { url, .. } = self.session.page() else {
            return None;
        };
        if self.left {
            return None;
        }
        self.left = true;

        let url = url.clone();
        let now = self.clock.now();
        let time_on_page = self.session.seconds_on_page(now);
        if let Some(secs) = time_on_page {
            log::info!("time spent on {url}: {secs} seconds");
        }

        let event = self.visit_event(
            PageVisitDraft {
                page_url: url.clone(),
                page_title: self.environment.document_title(),
                page_category: PAGE_LEAVE_CATEGORY.to_string(),
                user_id: None,
                time_on_page,
                referrer: url,
            },
            now,
        );
        Some(self.dispatcher.dispatch(Endpoint::Track, "page leave", &event))
    }

    /// Send a named event with arbitrary data, stamped with the current
    /// location and title.
    pub fn track_event(&self, event_name: &str, event_data: Map<String, Value>) -> Delivery {
        let event = CustomEvent {
            event_name: event_name.to_string(),
            event_data,
            session_id: self.session.session_id().clone(),
            timestamp: self.clock.now(),
            page_url: self.environment.location_href(),
            page_title: self.environment.document_title(),
        };
        self.dispatcher.dispatch(Endpoint::Event, event_name, &event)
    }

    pub fn track_form_submission(&self, form_name: &str, form_data: Value) -> Delivery {
        self.track_event(
            names::FORM_SUBMISSION,
            object(json!({ "formName": form_name, "formData": form_data })),
        )
    }

    pub fn track_button_click(&self, button_name: &str, button_location: &str) -> Delivery {
        self.track_event(
            names::BUTTON_CLICK,
            object(json!({ "buttonName": button_name, "buttonLocation": button_location })),
        )
    }

    pub fn track_link_click(&self, link_url: &str, link_text: &str) -> Delivery {
        self.track_event(
            names::LINK_CLICK,
            object(json!({ "linkUrl": link_url, "linkText": link_text })),
        )
    }

    /// Feed a scroll signal; emits `scroll_depth` when a milestone fires.
    pub fn observe_scroll(&mut self, position: ScrollPosition) -> Option<Delivery> {
        let depth = self.scroll.observe(position)?;
        let page_url = self.environment.location_href();
        Some(self.track_event(
            names::SCROLL_DEPTH,
            object(json!({ "depth": depth, "pageUrl": page_url })),
        ))
    }

    fn visit_event(&self, draft: PageVisitDraft, now: DateTime<Utc>) -> PageVisitEvent {
        let context = VisitorContext::classify(
            &self.environment.user_agent(),
            &self.environment.location_href(),
        );
        draft.into_event(self.session.session_id().clone(), context, now)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticEnvironment;
    use beacon_core::time::manual_clock;
    use chrono::Duration;
    use transport::InMemoryEventLog;

    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn setup() -> (PageVisitTracker, InMemoryEventLog, Clock, Arc<StaticEnvironment>) {
        let clock = manual_clock();
        let log = InMemoryEventLog::new(clock.clone());
        let env = Arc::new(
            StaticEnvironment::new(DESKTOP_UA, "https://shop.example/?utm_source=newsletter")
                .with_title("Home")
                .with_referrer("https://search.example/"),
        );
        let tracker = PageVisitTracker::new(clock.clone(), env.clone(), Arc::new(log.clone()));
        (tracker, log, clock, env)
    }

    #[tokio::test]
    async fn first_visit_has_no_time_and_native_referrer() {
        let (mut tracker, log, _clock, _env) = setup();

        tracker
            .record_visit("https://shop.example/", "Home", "homepage", None)
            .settled()
            .await;

        let visits = log.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].time_on_page, None);
        assert_eq!(visits[0].referrer, "https://search.example/");
        assert_eq!(visits[0].utm.utm_source.as_deref(), Some("newsletter"));
        assert_eq!(visits[0].browser.as_str(), "Firefox");
        assert_eq!(&visits[0].session_id, tracker.session_id());
    }

    #[tokio::test]
    async fn later_visit_carries_previous_page_and_elapsed_seconds() {
        let (mut tracker, log, mut clock, env) = setup();

        tracker
            .record_visit("https://shop.example/", "Home", "homepage", None)
            .settled()
            .await;
        clock.advance(Duration::milliseconds(12_700));
        env.navigate("https://shop.example/seeds", "Seeds");
        tracker
            .record_visit("https://shop.example/seeds", "Seeds", "products", Some("u-7"))
            .settled()
            .await;

        let visits = log.visits();
        assert_eq!(visits[1].time_on_page, Some(12));
        assert_eq!(visits[1].referrer, "https://shop.example/");
        assert_eq!(visits[1].user_id.as_deref(), Some("u-7"));
        assert_eq!(tracker.current_page(), Some("https://shop.example/seeds"));
    }

    #[tokio::test]
    async fn leave_before_any_visit_is_a_no_op() {
        let (mut tracker, log, _clock, _env) = setup();

        assert!(tracker.record_leave().is_none());

        tracker
            .record_visit("https://shop.example/", "Home", "homepage", None)
            .settled()
            .await;
        tracker.record_leave().unwrap().settled().await;
        assert_eq!(log.visits().len(), 2);
    }

    #[tokio::test]
    async fn leave_emits_page_leave_category_once() {
        let (mut tracker, log, mut clock, _env) = setup();

        tracker
            .record_visit("https://shop.example/", "Home", "homepage", None)
            .settled()
            .await;
        clock.advance(Duration::seconds(30));
        tracker.record_leave().unwrap().settled().await;
        assert!(tracker.record_leave().is_none());

        let visits = log.visits();
        assert_eq!(visits.len(), 2);
        assert!(visits[1].is_page_leave());
        assert_eq!(visits[1].time_on_page, Some(30));
        assert_eq!(visits[1].page_url, "https://shop.example/");
        assert_eq!(tracker.current_page(), Some("https://shop.example/"));
        assert_eq!(
            tracker.session().page_entered_at(),
            Some(beacon_core::time::fixed_now())
        );
    }

    #[tokio::test]
    async fn convenience_events_carry_expected_data() {
        let (tracker, log, _clock, _env) = setup();

        tracker.track_button_click("order", "hero").settled().await;
        tracker
            .track_form_submission("contact", json!({ "farmType": "dairy" }))
            .settled()
            .await;
        tracker
            .track_link_click("https://shop.example/faq", "FAQ")
            .settled()
            .await;

        let clicks = log.events_named(names::BUTTON_CLICK);
        assert_eq!(clicks[0].data_str("buttonLocation"), Some("hero"));
        assert_eq!(clicks[0].page_title, "Home");

        let forms = log.events_named(names::FORM_SUBMISSION);
        assert_eq!(forms[0].data_str("formName"), Some("contact"));
        assert_eq!(forms[0].event_data["formData"]["farmType"], "dairy");

        let links = log.events_named(names::LINK_CLICK);
        assert_eq!(links[0].data_str("linkText"), Some("FAQ"));
    }

    #[tokio::test]
    async fn scroll_milestones_reset_on_navigation() {
        let (mut tracker, log, _clock, _env) = setup();
        let at = |pct: f64| ScrollPosition::new(pct * 10.0, 1_200.0, 200.0);

        tracker.record_visit("https://shop.example/", "Home", "homepage", None);
        tracker.observe_scroll(at(25.0)).unwrap().settled().await;
        assert!(tracker.observe_scroll(at(25.0)).is_none());

        tracker.record_visit("https://shop.example/seeds", "Seeds", "products", None);
        assert_eq!(tracker.scroll_state().max_depth_reached(), 0);
        tracker.observe_scroll(at(25.0)).unwrap().settled().await;

        let depths: Vec<u64> = log
            .events_named(names::SCROLL_DEPTH)
            .iter()
            .filter_map(|e| e.event_data["depth"].as_u64())
            .collect();
        assert_eq!(depths, vec![25, 25]);
    }
}
