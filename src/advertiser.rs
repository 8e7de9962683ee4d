//! Announces this node's own records, RFC 6762 §8.3: send the full
//! record set once, then again at least one second later, since a single
//! announcement can be lost to a dropped UDP datagram. A second
//! registration for the same instance before the repeat fires cancels
//! the old repeat and starts a fresh two-shot for the new records
//! (SPEC_FULL.md §C keeps the advertised state consistent with the most
//! recent registration).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::codec::{DomainName, ResourceRecord};

/// Gap RFC 6762 §8.3 requires between the first and second announcement.
const SECOND_SHOT_DELAY: Duration = Duration::from_secs(1);

struct Pending {
    records: Vec<ResourceRecord>,
    fire_at: Instant,
}

#[derive(Default)]
pub struct Advertiser {
    pending: HashMap<DomainName, Pending>,
}

impl Advertiser {
    pub fn new() -> Self {
        Advertiser::default()
    }

    /// Starts (or restarts) the two-shot announce for `fqdn`. Returns the
    /// records to send immediately as the first shot; the second shot is
    /// returned later by [`Advertiser::due`].
    pub fn announce(
        &mut self,
        fqdn: DomainName,
        records: Vec<ResourceRecord>,
        now: Instant,
    ) -> Vec<ResourceRecord> {
        self.pending.insert(
            fqdn,
            Pending {
                records: records.clone(),
                fire_at: now + SECOND_SHOT_DELAY,
            },
        );
        records
    }

    /// A goodbye packet for a service that's being withdrawn: the same
    /// records with their TTL zeroed (RFC 6762 §10.1), sent once. Also
    /// cancels any in-flight second announce shot for `fqdn`, since
    /// there's nothing left to confirm.
    pub fn goodbye(&mut self, fqdn: &DomainName, records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        self.pending.remove(fqdn);
        records
            .into_iter()
            .map(|mut record| {
                record.ttl = 0;
                record
            })
            .collect()
    }

    /// Second announce shots due as of `now`, each paired with its
    /// instance fqdn.
    pub fn due(&mut self, now: Instant) -> Vec<(DomainName, Vec<ResourceRecord>)> {
        let ready: Vec<DomainName> = self
            .pending
            .iter()
            .filter(|(_, p)| p.fire_at <= now)
            .map(|(fqdn, _)| fqdn.clone())
            .collect();

        ready
            .into_iter()
            .filter_map(|fqdn| self.pending.remove(&fqdn).map(|p| (fqdn, p.records)))
            .collect()
    }

    pub fn next_wake(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.fire_at).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RData;
    use std::net::Ipv4Addr;

    fn a_record() -> ResourceRecord {
        ResourceRecord::new(
            DomainName::new("host.local"),
            120,
            true,
            RData::A(Ipv4Addr::new(10, 0, 0, 1)),
        )
    }

    #[test]
    fn announce_schedules_second_shot_one_second_later() {
        let mut advertiser = Advertiser::new();
        let now = Instant::now();
        let first = advertiser.announce(DomainName::new("svc.local"), vec![a_record()], now);
        assert_eq!(first.len(), 1);
        assert!(advertiser.due(now).is_empty());
        let second = advertiser.due(now + SECOND_SHOT_DELAY);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn goodbye_zeroes_ttl_and_cancels_pending_second_shot() {
        let mut advertiser = Advertiser::new();
        let now = Instant::now();
        advertiser.announce(DomainName::new("svc.local"), vec![a_record()], now);
        let goodbye = advertiser.goodbye(&DomainName::new("svc.local"), vec![a_record()]);
        assert_eq!(goodbye[0].ttl, 0);
        assert!(advertiser.due(now + SECOND_SHOT_DELAY).is_empty());
    }

    #[test]
    fn re_announce_before_second_shot_supersedes_old_schedule() {
        let mut advertiser = Advertiser::new();
        let now = Instant::now();
        advertiser.announce(DomainName::new("svc.local"), vec![a_record()], now);
        let later = now + Duration::from_millis(500);
        let mut updated = a_record();
        updated.ttl = 240;
        advertiser.announce(DomainName::new("svc.local"), vec![updated.clone()], later);

        // Original schedule (due at now + 1s) must not fire with stale
        // records; only the superseded one (due at later + 1s) should.
        assert!(advertiser.due(now + SECOND_SHOT_DELAY).is_empty());
        let due = advertiser.due(later + SECOND_SHOT_DELAY);
        assert_eq!(due[0].1[0].ttl, 240);
    }
}
