//! Folds inbound response packets into the cache, then tries to
//! reconstruct complete [`Service`] values from whatever the cache now
//! holds, emitting `SERVICE_APPEARED`/`SERVICE_REMOVED` the way spec §4.7
//! describes: cache mutation first, service reconstruction second, so a
//! PTR arriving in the same packet as its SRV/TXT/address records
//! reconstructs in one pass rather than waiting for a second response.

use std::time::Instant;

use crate::cache::RecordCache;
use crate::codec::{DomainName, Packet, RData, ResourceRecord};
use crate::enums::{Protocol, RecordType};
use crate::service::{Service, ServiceEvent};

/// Ingests a response packet: every non-OPT answer/additional record is
/// stored in `cache`, then every FQDN this packet dirtied (spec §4.7
/// step 3) is checked for a now-complete SRV+TXT+address chain.
pub fn ingest_response(cache: &mut RecordCache, packet: &Packet, now: Instant) -> Vec<ServiceEvent> {
    let records: Vec<ResourceRecord> = packet
        .answers
        .iter()
        .chain(&packet.additionals)
        .cloned()
        .filter(|record| !matches!(record.rdata, RData::Opt { .. }))
        .collect();

    for record in &records {
        if let Err(e) = cache.set(record.clone(), now) {
            return vec![ServiceEvent::Error(e.to_string())];
        }
    }

    let mut events = Vec::new();
    for fqdn in dirtied_fqdns(&records, cache, now) {
        if let Some(service) = reconstruct(cache, &fqdn, now) {
            events.push(ServiceEvent::ServiceAppeared(service));
        }
    }
    events
}

/// Reacts to cache entries that aged out: every FQDN the expired records
/// dirty (SRV/TXT by name, PTR by target, A/AAAA by the SRV records that
/// point at the expiring host) is checked again — a service that still
/// reconstructs is emitted as `SERVICE_REMOVED` to signal it just lost a
/// piece (e.g. its address), and one that no longer reconstructs at all
/// falls back to the best-effort description built from the expired SRV
/// record itself, if that's what expired.
pub fn ingest_expired(
    cache: &RecordCache,
    expired: &[crate::cache::Expired],
    now: Instant,
) -> Vec<ServiceEvent> {
    let records: Vec<ResourceRecord> = expired.iter().map(|e| e.record.clone()).collect();

    let mut events = Vec::new();
    for fqdn in dirtied_fqdns(&records, cache, now) {
        if let Some(service) = reconstruct(cache, &fqdn, now) {
            events.push(ServiceEvent::ServiceRemoved(service));
        } else if let Some(srv_record) = records
            .iter()
            .find(|r| r.name == fqdn && matches!(r.rdata, RData::Srv { .. }))
        {
            if let Some(service) = partial_from_name(&fqdn, srv_record) {
                events.push(ServiceEvent::ServiceRemoved(service));
            }
        }
    }
    events
}

/// The dirtied-FQDN reconciliation rule (spec §4.7 step 3): SRV/TXT
/// records dirty their own owner name; a non-meta PTR dirties its
/// target (the instance it points at); an A/AAAA record dirties every
/// cached SRV record whose target is that name, since those services'
/// address resolution just changed.
fn dirtied_fqdns(records: &[ResourceRecord], cache: &RecordCache, now: Instant) -> Vec<DomainName> {
    let mut dirtied = Vec::new();
    for record in records {
        match &record.rdata {
            RData::Srv { .. } | RData::Txt(_) => dirtied.push(record.name.clone()),
            RData::Ptr(target) => {
                if !is_meta_service_ptr(&record.name) {
                    dirtied.push(target.clone());
                }
            }
            RData::A(_) | RData::Aaaa(_) => {
                dirtied.extend(cache.srv_names_targeting(&record.name, now));
            }
            _ => {}
        }
    }
    let mut seen = std::collections::HashSet::new();
    dirtied.retain(|fqdn| seen.insert(fqdn.clone()));
    dirtied
}

/// Whether `name` is the DNS-SD meta-service PTR owner
/// (`_services._dns-sd._udp.<domain>`) rather than a service-type PTR —
/// its target is a service type, not a service instance, so it never
/// participates in instance reconstruction.
fn is_meta_service_ptr(name: &DomainName) -> bool {
    let labels = name.labels();
    labels.len() >= 3 && labels[0] == "_services" && labels[1] == "_dns-sd" && labels[2] == "_udp"
}

fn reconstruct(cache: &RecordCache, instance_fqdn: &DomainName, now: Instant) -> Option<Service> {
    let (instance, service_type, protocol, domain) = parse_instance_fqdn(instance_fqdn)?;

    let srv = cache
        .where_get(instance_fqdn, RecordType::SRV, now)
        .first()
        .cloned()?
        .clone();
    let RData::Srv { port, target, .. } = srv.rdata else {
        return None;
    };

    let txt = cache
        .where_get(instance_fqdn, RecordType::TXT, now)
        .first()
        .and_then(|r| match &r.rdata {
            RData::Txt(pairs) => Some(pairs.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let addresses = cache
        .related_by_hostname(&target, now)
        .into_iter()
        .filter_map(|r| match &r.rdata {
            RData::A(addr) => Some(std::net::IpAddr::V4(*addr)),
            RData::Aaaa(addr) => Some(std::net::IpAddr::V6(*addr)),
            _ => None,
        })
        .collect();

    Some(Service {
        instance,
        service_type,
        protocol,
        domain,
        host: target,
        addresses,
        port,
        txt,
    })
}

/// Best-effort `Service` for an expired SRV record when the rest of its
/// chain has already left the cache too.
fn partial_from_name(instance_fqdn: &DomainName, srv_record: &ResourceRecord) -> Option<Service> {
    let (instance, service_type, protocol, domain) = parse_instance_fqdn(instance_fqdn)?;
    let RData::Srv { port, target, .. } = &srv_record.rdata else {
        return None;
    };
    Some(Service {
        instance,
        service_type,
        protocol,
        domain,
        host: target.clone(),
        addresses: Vec::new(),
        port: *port,
        txt: Vec::new(),
    })
}

fn parse_instance_fqdn(name: &DomainName) -> Option<(String, String, Protocol, String)> {
    let labels = name.labels();
    let n = labels.len();
    if n < 4 {
        return None;
    }
    let domain = labels[n - 1].to_string();
    let protocol = labels[n - 2].trim_start_matches('_').parse::<Protocol>().ok()?;
    let service_type = labels[n - 3].to_string();
    let instance = labels[..n - 3].join(".");
    Some((instance, service_type, protocol, domain))
}
