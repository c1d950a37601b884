/// Step scrubbing state machine
///
/// Decides, for every step change coming from the slider, whether the
/// step is served from the cache, resolved right away, or deferred until
/// the slider has been quiet for the debounce interval.
use std::time::Duration;

/// Default quiet interval before a scrubbed step is resolved
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Identifies one started debounce timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceToken {
    epoch: u64,
    seq: u64,
}

/// Identifies one started resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveTicket {
    epoch: u64,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubPhase {
    Idle,
    AwaitingDebounce(DebounceToken),
    Resolving(ResolveTicket),
}

/// What the owner must do with a step change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubDecision {
    /// The step has a valid cache entry; show it, no fetch
    FromCache,
    /// First interaction of the session; resolve immediately
    ResolveNow,
    /// Start a timer for `delay` and report back with the token
    Defer { token: DebounceToken, delay: Duration },
}

#[derive(Debug)]
pub struct ScrubController {
    requested_step: usize,
    phase: ScrubPhase,
    debounce: Duration,
    /// Bumped on reset so tokens of a previous session never match
    epoch: u64,
    next_seq: u64,
}

impl ScrubController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            requested_step: 0,
            phase: ScrubPhase::Idle,
            debounce,
            epoch: 0,
            next_seq: 0,
        }
    }

    pub fn requested_step(&self) -> usize {
        self.requested_step
    }

    pub fn phase(&self) -> ScrubPhase {
        self.phase
    }

    pub fn has_pending_timer(&self) -> bool {
        matches!(self.phase, ScrubPhase::AwaitingDebounce(_))
    }

    /// Record a step change and decide how to serve it
    ///
    /// `cached` tells whether the step has a valid cache entry,
    /// `cache_empty` whether the session cache holds nothing at all.
    pub fn request(&mut self, step: usize, cached: bool, cache_empty: bool) -> ScrubDecision {
        self.requested_step = step;
        self.cancel_pending();

        if cached {
            ScrubDecision::FromCache
        } else if cache_empty {
            ScrubDecision::ResolveNow
        } else {
            let token = DebounceToken {
                epoch: self.epoch,
                seq: self.bump(),
            };
            self.phase = ScrubPhase::AwaitingDebounce(token);
            ScrubDecision::Defer {
                token,
                delay: self.debounce,
            }
        }
    }

    /// A debounce timer fired; returns the step to resolve if it was
    /// still the pending one
    pub fn timer_elapsed(&mut self, token: DebounceToken) -> Option<usize> {
        if self.phase != ScrubPhase::AwaitingDebounce(token) {
            return None;
        }
        self.phase = ScrubPhase::Idle;
        Some(self.requested_step)
    }

    /// The slider was released: drop any pending timer and resolve now
    pub fn commit(&mut self) -> usize {
        self.cancel_pending();
        self.requested_step
    }

    pub fn begin_resolve(&mut self) -> ResolveTicket {
        let ticket = ResolveTicket {
            epoch: self.epoch,
            seq: self.bump(),
        };
        self.phase = ScrubPhase::Resolving(ticket);
        ticket
    }

    /// Returns false if a newer request has taken over since
    pub fn finish_resolve(&mut self, ticket: ResolveTicket) -> bool {
        if self.phase == ScrubPhase::Resolving(ticket) {
            self.phase = ScrubPhase::Idle;
            true
        } else {
            false
        }
    }

    /// Back to idle at step 0, invalidating every outstanding token
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = ScrubPhase::Idle;
        self.requested_step = 0;
    }

    fn cancel_pending(&mut self) {
        if let ScrubPhase::AwaitingDebounce(_) = self.phase {
            self.phase = ScrubPhase::Idle;
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

impl Default for ScrubController {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defer_token(decision: ScrubDecision) -> DebounceToken {
        match decision {
            ScrubDecision::Defer { token, .. } => token,
            other => panic!("expected a deferred decision, got {:?}", other),
        }
    }

    #[test]
    fn test_first_request_resolves_immediately() {
        let mut scrub = ScrubController::default();
        assert_eq!(scrub.request(1, false, true), ScrubDecision::ResolveNow);
        assert_eq!(scrub.requested_step(), 1);
        assert!(!scrub.has_pending_timer());
    }

    #[test]
    fn test_cached_step_skips_debounce() {
        let mut scrub = ScrubController::default();
        assert_eq!(scrub.request(3, true, false), ScrubDecision::FromCache);
        assert_eq!(scrub.phase(), ScrubPhase::Idle);
    }

    #[test]
    fn test_uncached_step_defers_with_configured_delay() {
        let mut scrub = ScrubController::new(Duration::from_millis(250));
        match scrub.request(2, false, false) {
            ScrubDecision::Defer { delay, .. } => assert_eq!(delay, Duration::from_millis(250)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(scrub.has_pending_timer());
    }

    #[test]
    fn test_only_latest_timer_resolves_latest_step() {
        let mut scrub = ScrubController::default();
        let first = defer_token(scrub.request(0, false, false));
        let second = defer_token(scrub.request(2, false, false));
        assert_ne!(first, second);

        assert_eq!(scrub.timer_elapsed(first), None);
        assert_eq!(scrub.timer_elapsed(second), Some(2));
        assert_eq!(scrub.phase(), ScrubPhase::Idle);
        // a timer fires at most once
        assert_eq!(scrub.timer_elapsed(second), None);
    }

    #[test]
    fn test_cache_hit_cancels_pending_timer() {
        let mut scrub = ScrubController::default();
        let token = defer_token(scrub.request(5, false, false));
        assert_eq!(scrub.request(1, true, false), ScrubDecision::FromCache);

        assert!(!scrub.has_pending_timer());
        assert_eq!(scrub.timer_elapsed(token), None);
    }

    #[test]
    fn test_commit_cancels_pending_timer() {
        let mut scrub = ScrubController::default();
        let token = defer_token(scrub.request(7, false, false));

        assert_eq!(scrub.commit(), 7);
        assert!(!scrub.has_pending_timer());
        assert_eq!(scrub.timer_elapsed(token), None);
    }

    #[test]
    fn test_resolve_tickets_track_latest() {
        let mut scrub = ScrubController::default();
        let first = scrub.begin_resolve();
        let second = scrub.begin_resolve();

        assert!(!scrub.finish_resolve(first));
        assert!(scrub.finish_resolve(second));
        assert_eq!(scrub.phase(), ScrubPhase::Idle);
    }

    #[test]
    fn test_reset_invalidates_tokens() {
        let mut scrub = ScrubController::default();
        let token = defer_token(scrub.request(4, false, false));
        let ticket = scrub.begin_resolve();
        scrub.reset();

        assert_eq!(scrub.requested_step(), 0);
        assert_eq!(scrub.phase(), ScrubPhase::Idle);
        assert_eq!(scrub.timer_elapsed(token), None);
        assert!(!scrub.finish_resolve(ticket));
    }
}
