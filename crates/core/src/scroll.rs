//! Scroll depth sampling.
//!
//! A milestone fires when the deepest percentage reached so far is *exactly*
//! equal to it. A single scroll signal that jumps over a milestone (10% to
//! 60%) never fires it for that page. This mirrors the production tracker and
//! is kept on purpose; switching to crossing semantics changes the reported
//! numbers and needs sign-off from whoever reads the dashboard.

/// Percentages that produce a `scroll_depth` event.
pub const MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Raw scroll geometry as reported by the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub document_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    #[must_use]
    pub fn new(scroll_top: f64, document_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            document_height,
            viewport_height,
        }
    }

    /// Rounded scroll percentage, or `None` when the page cannot scroll.
    #[must_use]
    pub fn percent(&self) -> Option<i64> {
        let scrollable = self.document_height - self.viewport_height;
        if !scrollable.is_finite() || scrollable <= 0.0 || !self.scroll_top.is_finite() {
            return None;
        }
        // `as` saturates on out-of-range floats.
        #[allow(clippy::cast_possible_truncation)]
        Some((self.scroll_top / scrollable * 100.0).round() as i64)
    }
}

/// Per-page scroll state: deepest percentage seen and milestones already sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollDepthSampler {
    max_depth_reached: i64,
    fired: [bool; MILESTONES.len()],
}

impl ScrollDepthSampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_depth_reached(&self) -> i64 {
        self.max_depth_reached
    }

    /// Milestones already reported for this page, ascending.
    #[must_use]
    pub fn fired_milestones(&self) -> Vec<u8> {
        MILESTONES
            .iter()
            .zip(self.fired)
            .filter_map(|(m, fired)| fired.then_some(*m))
            .collect()
    }

    /// Feed one scroll signal; returns the milestone that fires, if any.
    ///
    /// At most one milestone can match because the maximum is a single value.
    pub fn observe(&mut self, position: ScrollPosition) -> Option<u8> {
        let percent = position.percent()?;
        if percent > self.max_depth_reached {
            self.max_depth_reached = percent;
        }

        let index = MILESTONES
            .iter()
            .position(|m| i64::from(*m) == self.max_depth_reached)?;
        if self.fired[index] {
            return None;
        }
        self.fired[index] = true;
        Some(MILESTONES[index])
    }

    /// Forget everything; called on every recorded navigation.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
