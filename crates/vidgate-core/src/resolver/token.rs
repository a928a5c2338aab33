//! Supersession guard for in-flight resolutions

/// Identifies one resolution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing tokens; only the latest one may apply
/// its result
#[derive(Debug, Default)]
pub struct ResolutionTracker {
    latest: u64,
    pending: bool,
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding any earlier one
    pub fn begin(&mut self) -> RequestToken {
        self.latest += 1;
        self.pending = true;
        RequestToken(self.latest)
    }

    /// Settle a request. Returns false when the token has been superseded or
    /// invalidated, in which case the result must be discarded.
    pub fn complete(&mut self, token: RequestToken) -> bool {
        if self.pending && token.0 == self.latest {
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Abandon whatever is in flight
    pub fn invalidate(&mut self) {
        self.latest += 1;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_wins() {
        let mut tracker = ResolutionTracker::new();
        let first = tracker.begin();
        let second = tracker.begin();
        assert!(!tracker.complete(first));
        assert!(tracker.complete(second));
        assert!(!tracker.complete(second));
    }

    #[test]
    fn test_invalidate_discards_in_flight() {
        let mut tracker = ResolutionTracker::new();
        let token = tracker.begin();
        tracker.invalidate();
        assert!(!tracker.is_pending());
        assert!(!tracker.complete(token));
    }
}
