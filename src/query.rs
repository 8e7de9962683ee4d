//! Scheduled outgoing queries, RFC 6762 §5.2: fire immediately, then
//! again after 1s, doubling each time up to a one-hour ceiling, so a
//! long-running browse doesn't keep hammering the link. Plain
//! synchronous state driven by the node actor's timer, the same shape as
//! `cache.rs`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::codec::DomainName;
use crate::enums::RecordType;

const INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(60 * 60);

struct ScheduledQuery {
    next_fire: Instant,
    interval: Duration,
    max_interval: Duration,
}

#[derive(Default)]
pub struct QueryEngine {
    queries: HashMap<(DomainName, RecordType), ScheduledQuery>,
}

impl QueryEngine {
    pub fn new() -> Self {
        QueryEngine::default()
    }

    /// Starts a repeating query for `(name, qtype)`, firing immediately
    /// and then backing off from `min_delay` (default [`INITIAL_INTERVAL`])
    /// up to `max_delay` (default [`MAX_INTERVAL`]), per spec's
    /// `startQuery({type, protocol, minDelay?, maxDelay?})`. Returns
    /// `false` without disturbing the existing schedule if this
    /// `(name, qtype)` is already being queried (SPEC_FULL.md §C.4
    /// coalescing).
    pub fn start_query(
        &mut self,
        name: DomainName,
        qtype: RecordType,
        now: Instant,
        min_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> bool {
        let key = (name, qtype);
        if self.queries.contains_key(&key) {
            return false;
        }
        self.queries.insert(
            key,
            ScheduledQuery {
                next_fire: now,
                interval: min_delay.unwrap_or(INITIAL_INTERVAL),
                max_interval: max_delay.unwrap_or(MAX_INTERVAL),
            },
        );
        true
    }

    pub fn stop_query(&mut self, name: &DomainName, qtype: RecordType) -> bool {
        self.queries.remove(&(name.clone(), qtype)).is_some()
    }

    pub fn is_active(&self, name: &DomainName, qtype: RecordType) -> bool {
        self.queries.contains_key(&(name.clone(), qtype))
    }

    /// Every `(name, qtype)` due to fire as of `now`; advances each one's
    /// schedule (doubling its interval up to its own `max_interval`)
    /// before returning.
    pub fn due(&mut self, now: Instant) -> Vec<(DomainName, RecordType)> {
        let mut fired = Vec::new();
        for (key, scheduled) in self.queries.iter_mut() {
            if scheduled.next_fire <= now {
                fired.push(key.clone());
                scheduled.interval = (scheduled.interval * 2).min(scheduled.max_interval);
                scheduled.next_fire = now + scheduled.interval;
            }
        }
        fired
    }

    pub fn next_wake(&self) -> Option<Instant> {
        self.queries.values().map(|s| s.next_fire).min()
    }

    pub fn active_count(&self) -> usize {
        self.queries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_query_fires_immediately() {
        let mut engine = QueryEngine::new();
        let now = Instant::now();
        assert!(engine.start_query(DomainName::new("_http._tcp.local"), RecordType::PTR, now, None, None));
        let due = engine.due(now);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn repeated_start_coalesces() {
        let mut engine = QueryEngine::new();
        let now = Instant::now();
        assert!(engine.start_query(DomainName::new("_http._tcp.local"), RecordType::PTR, now, None, None));
        assert!(!engine.start_query(DomainName::new("_http._tcp.local"), RecordType::PTR, now, None, None));
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn interval_doubles_and_caps() {
        let mut engine = QueryEngine::new();
        let mut now = Instant::now();
        engine.start_query(DomainName::new("host.local"), RecordType::A, now, None, None);
        for _ in 0..20 {
            let due = engine.due(now);
            if !due.is_empty() {
                now = engine.next_wake().unwrap();
            } else {
                now += Duration::from_secs(1);
            }
        }
        // After many firings the interval should have capped, not grown
        // unbounded.
        let wake = engine.next_wake().unwrap();
        assert!(wake <= now + MAX_INTERVAL);
    }

    #[test]
    fn stop_query_removes_schedule() {
        let mut engine = QueryEngine::new();
        let now = Instant::now();
        engine.start_query(DomainName::new("host.local"), RecordType::A, now, None, None);
        assert!(engine.stop_query(&DomainName::new("host.local"), RecordType::A));
        assert!(!engine.is_active(&DomainName::new("host.local"), RecordType::A));
    }
}
