//! The shared-record cache: every record this node has learned from the
//! network, indexed for the lookups the query/responder/reassembler
//! engines need, with RFC 6762 §10.1/§10.2 TTL and cache-flush semantics.
//!
//! This is plain synchronous state, not its own task — the single actor
//! in `node.rs` owns it and drives expiry off one timer, the same way
//! `datastore::manager` owned the teacher's in-memory zone state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::codec::{DomainName, RData, ResourceRecord};
use crate::enums::RecordType;
use crate::error::{MdnsError, Result};

/// One second grace period RFC 6762 §10.1 requires between seeing a
/// cache-flush record and purging the older records it supersedes, so
/// that records delivered in the same burst of packets aren't raced.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    name: DomainName,
    rtype: RecordType,
}

impl CacheKey {
    fn of(record: &ResourceRecord) -> Self {
        CacheKey {
            name: record.name.clone(),
            rtype: record.record_type(),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    record: ResourceRecord,
    expires_at: Instant,
    inserted_at: Instant,
    seq: u64,
}

/// A record that aged out of the cache, returned by [`RecordCache::expire_due`]
/// so the caller (the reassembler, via the node actor) can emit
/// `SERVICE_REMOVED` for anything that depended on it.
#[derive(Clone, Debug)]
pub struct Expired {
    pub record: ResourceRecord,
}

pub struct RecordCache {
    max: usize,
    /// Primary store: every live entry, keyed by (name, type). Multiple
    /// records can share a key (e.g. several PTR records under the same
    /// service type), so each bucket is a small vec.
    by_key: HashMap<CacheKey, Vec<CacheEntry>>,
    /// FIFO admission order, for eviction once `max` is exceeded.
    insertion_order: Vec<CacheKey>,
    next_seq: u64,
    destroyed: bool,
}

impl RecordCache {
    pub fn new(max: usize) -> Self {
        RecordCache {
            max,
            by_key: HashMap::new(),
            insertion_order: Vec::new(),
            next_seq: 0,
            destroyed: false,
        }
    }

    fn check_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(MdnsError::CacheDestroyed)
        } else {
            Ok(())
        }
    }

    /// Inserts or refreshes a record received at `now`. Honors the
    /// cache-flush bit: when set, every other entry at the same key that
    /// is older than [`FLUSH_GRACE`] is marked to expire immediately
    /// (RFC 6762 §10.2), rather than being purged outright, so entries
    /// that arrived in the same packet burst survive.
    pub fn set(&mut self, record: ResourceRecord, now: Instant) -> Result<()> {
        self.check_alive()?;
        let key = CacheKey::of(&record);
        let ttl = record.ttl;
        let cache_flush = record.cache_flush;

        let bucket = self.by_key.entry(key.clone()).or_default();

        // RFC 6762 §10.1: a goodbye (ttl=0) is floored to one second so a
        // reconstruction pass still has a window to see it in the cache
        // rather than finding it already gone.
        let effective_ttl = ttl.max(1);

        if let Some(existing) = bucket
            .iter_mut()
            .find(|entry| entry.record.rdata == record.rdata)
        {
            // A refresh of a record we already hold: RFC 6762 §5.2, reset
            // the TTL clock without disturbing its position.
            existing.expires_at = now + Duration::from_secs(effective_ttl as u64);
            existing.record.ttl = ttl;
            return Ok(());
        }

        if cache_flush {
            for entry in bucket.iter_mut() {
                if now.duration_since(entry.inserted_at) >= FLUSH_GRACE {
                    entry.expires_at = now;
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        bucket.push(CacheEntry {
            record,
            expires_at: now + Duration::from_secs(effective_ttl as u64),
            inserted_at: now,
            seq,
        });
        self.insertion_order.push(key);
        self.evict_over_capacity();
        Ok(())
    }

    fn evict_over_capacity(&mut self) {
        while self.total_count() > self.max && !self.insertion_order.is_empty() {
            let oldest_key = self.insertion_order.remove(0);
            if let Some(bucket) = self.by_key.get_mut(&oldest_key) {
                if !bucket.is_empty() {
                    bucket.remove(0);
                }
                if bucket.is_empty() {
                    self.by_key.remove(&oldest_key);
                }
            }
        }
    }

    fn total_count(&self) -> usize {
        self.by_key.values().map(|b| b.len()).sum()
    }

    /// Explicit delete, used when the reassembler observes a ttl=0
    /// goodbye and wants the entry gone right away rather than waiting
    /// for the next expiry sweep.
    pub fn delete(&mut self, name: &DomainName, rtype: RecordType) -> Result<()> {
        self.check_alive()?;
        let key = CacheKey {
            name: name.clone(),
            rtype,
        };
        self.by_key.remove(&key);
        self.insertion_order.retain(|k| k != &key);
        Ok(())
    }

    /// All live (non-expired as of `now`) records matching `name`/`rtype`.
    /// `RecordType::ANY` matches every type stored under `name`.
    pub fn where_get(
        &self,
        name: &DomainName,
        rtype: RecordType,
        now: Instant,
    ) -> Vec<&ResourceRecord> {
        if rtype == RecordType::ANY {
            return self
                .by_key
                .iter()
                .filter(|(k, _)| &k.name == name)
                .flat_map(|(_, bucket)| bucket.iter())
                .filter(|entry| entry.expires_at > now)
                .map(|entry| &entry.record)
                .collect();
        }
        let key = CacheKey {
            name: name.clone(),
            rtype,
        };
        self.by_key
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|entry| entry.expires_at > now)
            .map(|entry| &entry.record)
            .collect()
    }

    /// A/AAAA records whose owner name is `hostname` — used by the
    /// reassembler to resolve the address records an SRV target points
    /// at.
    pub fn related_by_hostname(&self, hostname: &DomainName, now: Instant) -> Vec<&ResourceRecord> {
        [RecordType::A, RecordType::AAAA]
            .into_iter()
            .flat_map(|rtype| self.where_get(hostname, rtype, now))
            .collect()
    }

    /// Every live SRV record's owner name whose target equals `hostname`
    /// — the reverse of [`RecordCache::related_by_hostname`], used by the
    /// reassembler to find which services depend on a host's address
    /// records when one of those address records changes or expires.
    pub fn srv_names_targeting(&self, hostname: &DomainName, now: Instant) -> Vec<DomainName> {
        self.by_key
            .iter()
            .filter(|(key, _)| key.rtype == RecordType::SRV)
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|entry| entry.expires_at > now)
            .filter_map(|entry| match &entry.record.rdata {
                RData::Srv { target, .. } if target == hostname => Some(entry.record.name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.total_count()
    }

    /// Removes every entry whose TTL has elapsed as of `now`, returning
    /// them so the caller can react (e.g. emit `SERVICE_REMOVED`). The
    /// node actor calls this off a single timer armed for
    /// [`RecordCache::next_expiry`], rather than a timer per record.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Expired> {
        let mut expired = Vec::new();
        let mut empty_keys = Vec::new();
        for (key, bucket) in self.by_key.iter_mut() {
            let mut i = 0;
            while i < bucket.len() {
                if bucket[i].expires_at <= now {
                    let entry = bucket.remove(i);
                    expired.push(Expired {
                        record: entry.record,
                    });
                } else {
                    i += 1;
                }
            }
            if bucket.is_empty() {
                empty_keys.push(key.clone());
            }
        }
        for key in empty_keys {
            self.by_key.remove(&key);
            self.insertion_order.retain(|k| k != &key);
        }
        expired
    }

    /// Earliest expiry across every live entry, for arming the next
    /// sweep timer. `None` means the cache is empty.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.by_key
            .values()
            .flatten()
            .map(|entry| entry.expires_at)
            .min()
    }

    /// Tears the cache down; any further access returns
    /// [`MdnsError::CacheDestroyed`].
    pub fn destroy(&mut self) {
        self.by_key.clear();
        self.insertion_order.clear();
        self.destroyed = true;
    }
}
