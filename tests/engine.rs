//! Engine-level scenarios. The synchronous cases drive the pieces that
//! make up a running node directly — cache, local store, responder,
//! reassembler, advertiser — without opening real sockets; the
//! `#[tokio::test]` cases at the bottom construct actual `MdnsNode`
//! instances over real bound loopback sockets and assert on the events
//! each emits, the same way the teacher's `tests/test_harness.rs` drove
//! whole servers rather than calling handler functions directly.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mdnsd::cache::RecordCache;
use mdnsd::codec::{DomainName, Packet, Question, RData, ResourceRecord};
use mdnsd::collaborators::{Interface, NetworkInterfaceProvider, ResolveHostname};
use mdnsd::config::StartOptions;
use mdnsd::enums::{Protocol, RecordType};
use mdnsd::error::Result;
use mdnsd::local_store::LocalStore;
use mdnsd::service::{ServiceEvent, ServiceRegistration};
use mdnsd::{advertiser::Advertiser, reassembler, responder, MdnsNode};

fn local_store_with_printer() -> LocalStore {
    let mut store = LocalStore::new(DomainName::new("host.local"), "local");
    store.set_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5))]);
    store.register(
        ServiceRegistration::new("Office Printer", "_http", Protocol::Tcp, 8080)
            .with_txt(vec![("path".to_string(), Some("/".to_string()))]),
    );
    store
}

/// Scenario: a service registered locally answers a PTR browse query
/// with the full SRV/TXT/address chain as additionals.
#[test]
fn announce_then_observe_via_responder() {
    let mut store = local_store_with_printer();
    let query = Packet::query(
        0,
        vec![Question::new(DomainName::new("_http._tcp.local"), RecordType::PTR)],
    );
    let reply = responder::build_reply(&mut store, &query, Instant::now())
        .expect("a registered service should answer a matching PTR query");

    assert_eq!(reply.answers.len(), 1);
    assert!(matches!(reply.answers[0].rdata, RData::Ptr(_)));
    assert!(reply.additionals.len() >= 3);
}

/// Scenario: a peer's response packet containing the full PTR/SRV/TXT/A
/// chain reconstructs into a `SERVICE_APPEARED` event on the first pass.
#[test]
fn query_driven_discovery_reconstructs_service() {
    let mut cache = RecordCache::new(100);
    let records = vec![
        ResourceRecord::new(
            DomainName::new("_http._tcp.local"),
            4500,
            false,
            RData::Ptr(DomainName::new("Office Printer._http._tcp.local")),
        ),
        ResourceRecord::new(
            DomainName::new("Office Printer._http._tcp.local"),
            4500,
            true,
            RData::Srv {
                priority: 0,
                weight: 0,
                port: 8080,
                target: DomainName::new("printer.local"),
            },
        ),
        ResourceRecord::new(
            DomainName::new("Office Printer._http._tcp.local"),
            4500,
            true,
            RData::Txt(vec![("path".to_string(), Some("/".to_string()))]),
        ),
        ResourceRecord::new(
            DomainName::new("printer.local"),
            120,
            true,
            RData::A(Ipv4Addr::new(192, 168, 1, 50)),
        ),
    ];
    let packet = Packet::response(records, Vec::new());

    let events = reassembler::ingest_response(&mut cache, &packet, Instant::now());
    assert_eq!(events.len(), 1);
    let ServiceEvent::ServiceAppeared(service) = &events[0] else {
        panic!("expected ServiceAppeared");
    };
    assert_eq!(service.instance, "Office Printer");
    assert_eq!(service.addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50))]);
}

/// Scenario: a goodbye (ttl=0) record for a previously-seen SRV record
/// removes it from the cache shortly after, rather than waiting out its
/// original TTL (floored to 1s per RFC 6762 §10.1).
#[test]
fn goodbye_record_expires_cache_entry_shortly_after() {
    let mut cache = RecordCache::new(100);
    let now = Instant::now();
    let srv = ResourceRecord::new(
        DomainName::new("Office Printer._http._tcp.local"),
        4500,
        true,
        RData::Srv {
            priority: 0,
            weight: 0,
            port: 8080,
            target: DomainName::new("printer.local"),
        },
    );
    cache.set(srv.clone(), now).unwrap();
    assert_eq!(
        cache
            .where_get(&DomainName::new("Office Printer._http._tcp.local"), RecordType::SRV, now)
            .len(),
        1
    );

    let mut goodbye = srv;
    goodbye.ttl = 0;
    cache.set(goodbye, now).unwrap();
    let later = now + Duration::from_secs(1);
    let expired = cache.expire_due(later);
    assert_eq!(expired.len(), 1);
}

/// Scenario: the advertiser's two-shot announce produces an immediate
/// first packet's worth of records and a second, identical, shot one
/// second later — and a goodbye cancels any shot still pending.
#[test]
fn advertiser_two_shot_announce_and_goodbye() {
    let mut advertiser = Advertiser::new();
    let now = Instant::now();
    let record = ResourceRecord::new(
        DomainName::new("host.local"),
        120,
        true,
        RData::A(Ipv4Addr::new(192, 168, 1, 5)),
    );

    let first = advertiser.announce(DomainName::new("svc.local"), vec![record.clone()], now);
    assert_eq!(first.len(), 1);

    let second = advertiser.due(now + Duration::from_secs(1));
    assert_eq!(second.len(), 1);

    advertiser.announce(DomainName::new("svc2.local"), vec![record.clone()], now);
    let goodbye = advertiser.goodbye(&DomainName::new("svc2.local"), vec![record]);
    assert_eq!(goodbye[0].ttl, 0);
    assert!(advertiser.due(now + Duration::from_secs(1)).is_empty());
}

/// Scenario: responder dedup — a service with two distinct registered
/// instances under the same type produces two PTR answers and doesn't
/// duplicate the meta-service PTR.
#[test]
fn responder_dedups_meta_service_ptr_across_instances() {
    let mut store = local_store_with_printer();
    store.register(ServiceRegistration::new(
        "Lobby Printer",
        "_http",
        Protocol::Tcp,
        8080,
    ));

    let query = Packet::query(
        0,
        vec![Question::new(
            DomainName::new("_services._dns-sd._udp.local"),
            RecordType::PTR,
        )],
    );
    let reply = responder::build_reply(&mut store, &query, Instant::now())
        .expect("meta-service PTR should answer");
    assert_eq!(reply.answers.len(), 1);
}

/// Scenario: the cache's FIFO eviction keeps it bounded under `max`, and
/// `related_by_hostname` still finds the address records that survived.
#[test]
fn bounded_cache_related_by_hostname_survives_eviction() {
    let mut cache = RecordCache::new(2);
    let now = Instant::now();
    cache
        .set(
            ResourceRecord::new(
                DomainName::new("old.local"),
                120,
                true,
                RData::A(Ipv4Addr::new(10, 0, 0, 1)),
            ),
            now,
        )
        .unwrap();
    cache
        .set(
            ResourceRecord::new(
                DomainName::new("printer.local"),
                120,
                true,
                RData::A(Ipv4Addr::new(192, 168, 1, 50)),
            ),
            now,
        )
        .unwrap();
    cache
        .set(
            ResourceRecord::new(
                DomainName::new("printer.local"),
                120,
                true,
                RData::Aaaa("fe80::1".parse().unwrap()),
            ),
            now,
        )
        .unwrap();

    assert_eq!(cache.count(), 2);
    let related = cache.related_by_hostname(&DomainName::new("printer.local"), now);
    assert_eq!(related.len(), 2);
}

// --- Multi-peer scenarios over real sockets -------------------------------

struct FakeHostname(String);

impl ResolveHostname for FakeHostname {
    fn resolve_hostname(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reports the loopback address but `is_loopback: false` so `bind_fabric`
/// doesn't filter it out — the node behaves exactly as it would on a real
/// link, just bound to 127.0.0.1 so these tests don't touch a physical
/// interface.
struct LoopbackInterface;

impl NetworkInterfaceProvider for LoopbackInterface {
    fn interfaces(&self) -> Result<Vec<Interface>> {
        Ok(vec![Interface {
            name: "lo".to_string(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            prefix_len: 8,
            is_loopback: false,
        }])
    }
}

fn new_node(hostname: &str) -> MdnsNode {
    MdnsNode::new(
        StartOptions::default(),
        Arc::new(FakeHostname(hostname.to_string())),
        Arc::new(LoopbackInterface),
    )
}

async fn wait_for(
    mut rx: tokio::sync::broadcast::Receiver<ServiceEvent>,
    matches: impl Fn(&ServiceEvent) -> bool,
) -> ServiceEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event stream closed before expected event");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for expected event")
}

/// Two real nodes over loopback multicast sockets: one advertises a
/// service, the other browses for it and observes `ServiceAppeared` with
/// the SRV/TXT/address chain intact.
#[tokio::test]
async fn browsing_node_observes_advertised_service() {
    let advertiser = new_node("printer-host");
    advertiser.start().await.unwrap();
    advertiser
        .register_service(
            ServiceRegistration::new("Office Printer", "_http", Protocol::Tcp, 8080)
                .with_txt(vec![("path".to_string(), Some("/".to_string()))]),
        )
        .await
        .unwrap();

    let browser = new_node("browser-host");
    browser.start().await.unwrap();
    let events = browser.subscribe();
    browser
        .start_query(DomainName::new("_http._tcp.local"), RecordType::PTR)
        .await
        .unwrap();

    let event = wait_for(events, |e| {
        matches!(e, ServiceEvent::ServiceAppeared(s) if s.instance == "Office Printer")
    })
    .await;
    match event {
        ServiceEvent::ServiceAppeared(service) => {
            assert_eq!(service.port, 8080);
            assert!(service.txt.iter().any(|(k, _)| k == "path"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    advertiser.destroy().await.unwrap();
    browser.destroy().await.unwrap();
}

/// Unregistering a service sends a goodbye that a browsing node observes
/// as `ServiceRemoved`, without waiting out the record's normal TTL.
#[tokio::test]
async fn unregistering_a_service_is_observed_as_removed() {
    let advertiser = new_node("printer-host-2");
    advertiser.start().await.unwrap();
    advertiser
        .register_service(ServiceRegistration::new(
            "Lobby Printer",
            "_http",
            Protocol::Tcp,
            8080,
        ))
        .await
        .unwrap();

    let browser = new_node("browser-host-2");
    browser.start().await.unwrap();
    let appeared = browser.subscribe();
    browser
        .start_query(DomainName::new("_http._tcp.local"), RecordType::PTR)
        .await
        .unwrap();
    wait_for(appeared, |e| {
        matches!(e, ServiceEvent::ServiceAppeared(s) if s.instance == "Lobby Printer")
    })
    .await;

    let removed = browser.subscribe();
    advertiser
        .unregister_service("Lobby Printer", "_http", Protocol::Tcp)
        .await
        .unwrap();

    wait_for(removed, |e| {
        matches!(e, ServiceEvent::ServiceRemoved(s) if s.instance == "Lobby Printer")
    })
    .await;

    advertiser.destroy().await.unwrap();
    browser.destroy().await.unwrap();
}

/// A query reply is sent only on the socket that received the query:
/// with two independent query-driven nodes on the same loopback fabric,
/// each node's own browse still completes — a regression test for the
/// single-socket reply fix.
#[tokio::test]
async fn query_reply_reaches_browser_on_shared_fabric() {
    let advertiser = new_node("printer-host-3");
    advertiser.start().await.unwrap();
    advertiser
        .register_service(ServiceRegistration::new(
            "Shared Fabric Printer",
            "_http",
            Protocol::Tcp,
            9090,
        ))
        .await
        .unwrap();

    let browser_a = new_node("browser-host-3a");
    let browser_b = new_node("browser-host-3b");
    browser_a.start().await.unwrap();
    browser_b.start().await.unwrap();

    let events_a = browser_a.subscribe();
    let events_b = browser_b.subscribe();
    browser_a
        .start_query(DomainName::new("_http._tcp.local"), RecordType::PTR)
        .await
        .unwrap();
    browser_b
        .start_query(DomainName::new("_http._tcp.local"), RecordType::PTR)
        .await
        .unwrap();

    wait_for(events_a, |e| {
        matches!(e, ServiceEvent::ServiceAppeared(s) if s.instance == "Shared Fabric Printer")
    })
    .await;
    wait_for(events_b, |e| {
        matches!(e, ServiceEvent::ServiceAppeared(s) if s.instance == "Shared Fabric Printer")
    })
    .await;

    advertiser.destroy().await.unwrap();
    browser_a.destroy().await.unwrap();
    browser_b.destroy().await.unwrap();
}
