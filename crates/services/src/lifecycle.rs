use beacon_core::model::names;
use beacon_core::scroll::ScrollPosition;
use serde_json::Map;

use crate::dispatch::Delivery;
use crate::tracker::PageVisitTracker;

/// Document visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// Host signals the binder reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleSignal {
    /// The page is about to go away.
    Unload,
    VisibilityChange(Visibility),
    Scroll(ScrollPosition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderState {
    Unbound,
    Bound,
    Disposed,
}

/// Connects host lifecycle signals to a tracker.
///
/// `init` records the landing visit once; `dispose` stops all further
/// reactions. Signals arriving in any state other than `Bound` are ignored.
/// Unload does not unbind: the page may keep running after it, and the leave
/// event itself is emitted at most once by the tracker.
pub struct LifecycleBinder {
    tracker: PageVisitTracker,
    state: BinderState,
}

impl LifecycleBinder {
    #[must_use]
    pub fn new(tracker: PageVisitTracker) -> Self {
        Self {
            tracker,
            state: BinderState::Unbound,
        }
    }

    #[must_use]
    pub fn state(&self) -> BinderState {
        self.state
    }

    #[must_use]
    pub fn tracker(&self) -> &PageVisitTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PageVisitTracker {
        &mut self.tracker
    }

    /// Bind and record the landing visit for the current location.
    ///
    /// Returns `None` when already initialised or disposed.
    pub fn init(&mut self) -> Option<Delivery> {
        if self.state != BinderState::Unbound {
            log::debug!("lifecycle binder already initialised ({:?})", self.state);
            return None;
        }
        self.state = BinderState::Bound;
        log::info!("analytics bound for session {}", self.tracker.session_id());

        Some(self.tracker.record_landing())
    }

    pub fn handle(&mut self, signal: LifecycleSignal) -> Option<Delivery> {
        if self.state != BinderState::Bound {
            return None;
        }

        match signal {
            LifecycleSignal::Unload => self.tracker.record_leave(),
            LifecycleSignal::VisibilityChange(Visibility::Hidden) => {
                Some(self.tracker.track_event(names::PAGE_HIDDEN, Map::new()))
            }
            LifecycleSignal::VisibilityChange(Visibility::Visible) => {
                Some(self.tracker.track_event(names::PAGE_VISIBLE, Map::new()))
            }
            LifecycleSignal::Scroll(position) => self.tracker.observe_scroll(position),
        }
    }

    /// Stop reacting to signals. Idempotent.
    pub fn dispose(&mut self) {
        if self.state != BinderState::Disposed {
            log::info!("analytics unbound for session {}", self.tracker.session_id());
            self.state = BinderState::Disposed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::model::LANDING_CATEGORY;
    use crate::environment::StaticEnvironment;
    use beacon_core::time::manual_clock;
    use std::sync::Arc;
    use transport::InMemoryEventLog;

    fn binder() -> (LifecycleBinder, InMemoryEventLog) {
        let clock = manual_clock();
        let log = InMemoryEventLog::new(clock.clone());
        let env = Arc::new(StaticEnvironment::new("ua", "https://shop.example/").with_title("Home"));
        let tracker = PageVisitTracker::new(clock, env, Arc::new(log.clone()));
        (LifecycleBinder::new(tracker), log)
    }

    #[tokio::test]
    async fn init_records_landing_visit_once() {
        let (mut binder, log) = binder();

        binder.init().unwrap().settled().await;
        assert!(binder.init().is_none());

        let visits = log.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].page_category, LANDING_CATEGORY);
        assert_eq!(binder.state(), BinderState::Bound);
    }

    #[tokio::test]
    async fn signals_before_init_are_ignored() {
        let (mut binder, log) = binder();
        assert!(binder.handle(LifecycleSignal::Unload).is_none());
        assert!(
            binder
                .handle(LifecycleSignal::VisibilityChange(Visibility::Hidden))
                .is_none()
        );
        assert!(log.received().is_empty());
    }

    #[tokio::test]
    async fn visibility_changes_emit_named_events() {
        let (mut binder, log) = binder();
        binder.init();

        binder
            .handle(LifecycleSignal::VisibilityChange(Visibility::Hidden))
            .unwrap()
            .settled()
            .await;
        binder
            .handle(LifecycleSignal::VisibilityChange(Visibility::Visible))
            .unwrap()
            .settled()
            .await;

        assert_eq!(log.events_named(names::PAGE_HIDDEN).len(), 1);
        assert_eq!(log.events_named(names::PAGE_VISIBLE).len(), 1);
    }

    #[tokio::test]
    async fn leave_is_emitted_once_per_page_load() {
        let (mut binder, log) = binder();
        binder.init().unwrap().settled().await;

        binder.handle(LifecycleSignal::Unload).unwrap().settled().await;
        assert!(binder.handle(LifecycleSignal::Unload).is_none());

        let leaves: Vec<_> = log.visits().into_iter().filter(|v| v.is_page_leave()).collect();
        assert_eq!(leaves.len(), 1);
    }

    #[tokio::test]
    async fn visibility_and_scroll_stay_bound_after_unload() {
        let (mut binder, log) = binder();
        binder.init().unwrap().settled().await;
        binder.handle(LifecycleSignal::Unload).unwrap().settled().await;

        binder
            .handle(LifecycleSignal::VisibilityChange(Visibility::Hidden))
            .unwrap()
            .settled()
            .await;
        binder
            .handle(LifecycleSignal::Scroll(ScrollPosition::new(250.0, 1_200.0, 200.0)))
            .unwrap()
            .settled()
            .await;

        assert_eq!(binder.state(), BinderState::Bound);
        assert_eq!(log.events_named(names::PAGE_HIDDEN).len(), 1);
        assert_eq!(log.events_named(names::SCROLL_DEPTH).len(), 1);
    }

    #[tokio::test]
    async fn dispose_stops_reactions() {
        let (mut binder, log) = binder();
        binder.init().unwrap().settled().await;
        binder.dispose();
        binder.dispose();

        assert!(binder.handle(LifecycleSignal::Unload).is_none());
        assert!(binder.init().is_none());
        assert_eq!(log.received().len(), 1);
    }
}
