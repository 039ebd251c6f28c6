use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SESSION_PREFIX: &str = "session_";
const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque analytics correlation key for one page load.
///
/// Formatted as `session_<epoch millis>_<9 base36 chars>`. Unique with high
/// probability within one deployment's traffic; it is neither a secret nor a
/// privacy-preserving identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new id from the given instant and random source.
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
            .collect();
        Self(format!(
            "{SESSION_PREFIX}{}_{suffix}",
            now.timestamp_millis()
        ))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementation ────────────────────────────────────────────────────

/// Error type for parsing a session id from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSessionIdError {
    raw: String,
}

impl fmt::Display for ParseSessionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse SessionId from {:?}", self.raw)
    }
}

impl std::error::Error for ParseSessionIdError {}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSessionIdError { raw: s.to_string() };
        let rest = s.strip_prefix(SESSION_PREFIX).ok_or_else(err)?;
        let (millis, suffix) = rest.split_once('_').ok_or_else(err)?;
        if millis.parse::<i64>().is_err()
            || suffix.is_empty()
            || !suffix.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(err());
        }
        Ok(Self(s.to_string()))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
