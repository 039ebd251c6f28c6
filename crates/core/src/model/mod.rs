mod event;
mod ids;
mod session;

pub use event::{
    CustomEvent, Endpoint, LANDING_CATEGORY, PAGE_LEAVE_CATEGORY, PageVisitDraft, PageVisitEvent,
    TelemetryEvent, names,
};
pub use ids::{ParseSessionIdError, SessionId};
pub use session::Session;
