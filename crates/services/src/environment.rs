use std::sync::{PoisonError, RwLock};

/// What the tracker may read from the hosting page.
///
/// Every read reflects the current state; implementations must not cache.
pub trait Environment: Send + Sync {
    fn user_agent(&self) -> String;
    /// Absolute URL of the current location, query string included.
    fn location_href(&self) -> String;
    fn document_title(&self) -> String;
    /// The document's native referrer, empty when there is none.
    fn document_referrer(&self) -> String;
}

#[derive(Debug, Clone)]
struct Location {
    href: String,
    title: String,
}

/// An `Environment` backed by plain strings, updated by whoever drives
/// navigation. Used by the demo binary and by tests.
#[derive(Debug)]
pub struct StaticEnvironment {
    user_agent: String,
    referrer: String,
    location: RwLock<Location>,
}

impl StaticEnvironment {
    #[must_use]
    pub fn new(user_agent: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            referrer: String::new(),
            location: RwLock::new(Location {
                href: href.into(),
                title: String::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.location
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .title = title.into();
        self
    }

    /// Move to a new location, as a client-side route change would.
    pub fn navigate(&self, href: impl Into<String>, title: impl Into<String>) {
        let mut location = self.location.write().unwrap_or_else(PoisonError::into_inner);
        location.href = href.into();
        location.title = title.into();
    }

    fn location(&self) -> Location {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Environment for StaticEnvironment {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn location_href(&self) -> String {
        self.location().href
    }

    fn document_title(&self) -> String {
        self.location().title
    }

    fn document_referrer(&self) -> String {
        self.referrer.clone()
    }
}
