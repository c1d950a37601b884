/// Time-limited cache of resolved sample references, keyed by step index
///
/// Entries expire after a fixed validity window. Expired entries are
/// treated as absent on lookup but only removed when their scheduled
/// eviction fires, or when the cache is cleared.
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default validity window of a cache entry (5 minutes)
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(5 * 60);

/// One resolved step
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<R> {
    pub step_index: usize,
    pub resource_ref: R,
    pub expires_at: Instant,
    /// Identifies the `put` that created this entry
    stamp: u64,
}

/// Handle for a deferred eviction, returned by [`StepCache::put`]
///
/// The owner waits until `expires_at` and hands the ticket back to
/// [`StepCache::evict`]. Tickets from a cleared epoch or a superseded
/// `put` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionTicket {
    epoch: u64,
    stamp: u64,
    pub step_index: usize,
    pub expires_at: Instant,
}

impl EvictionTicket {
    /// How long to wait from `now` before handing the ticket back
    pub fn delay_from(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[derive(Debug)]
pub struct StepCache<R> {
    entries: HashMap<usize, CacheEntry<R>>,
    validity: Duration,
    /// Bumped by `clear`, invalidating every outstanding ticket
    epoch: u64,
    next_stamp: u64,
}

impl<R> StepCache<R> {
    pub fn new(validity: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            validity,
            epoch: 0,
            next_stamp: 0,
        }
    }

    /// Look up a step; absent if missing or expired at `now`
    pub fn get(&self, step_index: usize, now: Instant) -> Option<&CacheEntry<R>> {
        self.entries
            .get(&step_index)
            .filter(|entry| now < entry.expires_at)
    }

    /// Insert or replace the entry for `step_index`, resetting its expiry
    ///
    /// Returns the eviction ticket for the new entry and the resource it
    /// replaced, if any.
    pub fn put(&mut self, step_index: usize, resource_ref: R, now: Instant) -> (EvictionTicket, Option<R>) {
        self.next_stamp += 1;
        let expires_at = now + self.validity;
        let previous = self.entries.insert(
            step_index,
            CacheEntry {
                step_index,
                resource_ref,
                expires_at,
                stamp: self.next_stamp,
            },
        );

        let ticket = EvictionTicket {
            epoch: self.epoch,
            stamp: self.next_stamp,
            step_index,
            expires_at,
        };
        (ticket, previous.map(|entry| entry.resource_ref))
    }

    /// Run a scheduled eviction
    ///
    /// Removes the entry only if the ticket is still current and the entry
    /// has actually expired. Returns the released resource.
    pub fn evict(&mut self, ticket: EvictionTicket, now: Instant) -> Option<R> {
        if ticket.epoch != self.epoch {
            return None;
        }
        let current = self.entries.get(&ticket.step_index)?;
        if current.stamp != ticket.stamp || now < current.expires_at {
            return None;
        }
        self.entries
            .remove(&ticket.step_index)
            .map(|entry| entry.resource_ref)
    }

    /// Eviction ticket of the entry currently held for `step_index`
    pub fn ticket(&self, step_index: usize) -> Option<EvictionTicket> {
        self.entries.get(&step_index).map(|entry| EvictionTicket {
            epoch: self.epoch,
            stamp: entry.stamp,
            step_index,
            expires_at: entry.expires_at,
        })
    }

    /// Drop a single entry, leaving the others untouched
    pub fn remove(&mut self, step_index: usize) -> Option<R> {
        self.entries
            .remove(&step_index)
            .map(|entry| entry.resource_ref)
    }

    /// Empty the cache and cancel every scheduled eviction
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.entries.clear();
    }

    /// True when nothing was put since the last clear (stale entries count)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Step indices currently held, sorted
    pub fn steps(&self) -> Vec<usize> {
        let mut steps: Vec<usize> = self.entries.keys().copied().collect();
        steps.sort_unstable();
        steps
    }
}

impl<R> Default for StepCache<R> {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDITY)
    }
}
