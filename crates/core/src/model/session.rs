use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::SessionId;

/// One page load's correlation scope.
///
/// Created once per execution context and never mutated; it goes away with
/// the context that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: SessionId,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session at `now`, drawing the id suffix from `rng`.
    #[must_use]
    pub fn start<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        Self {
            session_id: SessionId::generate(now, rng),
            created_at: now,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
