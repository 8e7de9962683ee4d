//! The public surface: construct a node, start/stop it, register and
//! query services, and subscribe to what it observes. Internally a
//! single actor task owns every piece of mutable state — cache, local
//! store, query schedule, advertiser, and the bound sockets — so nothing
//! needs a lock; callers talk to it over a command channel, the same
//! shape as the teacher's `datastore::manager` plus `Servers`' bundle of
//! `JoinHandle`s.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::advertiser::Advertiser;
use crate::cache::RecordCache;
use crate::codec::{DomainName, Packet};
use crate::collaborators::{NetworkInterfaceProvider, ResolveHostname};
use crate::config::StartOptions;
use crate::enums::{Protocol, RecordType};
use crate::error::{MdnsError, Result};
use crate::local_store::LocalStore;
use crate::query::QueryEngine;
use crate::reassembler;
use crate::responder;
use crate::service::{ServiceEvent, ServiceRegistration};
use crate::socket::{bind_fabric, SocketBinding};

const UDP_BUFFER_SIZE: usize = 9000;
const EVENT_CHANNEL_CAPACITY: usize = 256;

enum Command {
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<()>>),
    Destroy(oneshot::Sender<Result<()>>),
    RegisterService(ServiceRegistration, oneshot::Sender<Result<()>>),
    UnregisterService(String, String, Protocol, oneshot::Sender<Result<()>>),
    StartQuery(
        DomainName,
        RecordType,
        Option<std::time::Duration>,
        Option<std::time::Duration>,
        oneshot::Sender<Result<()>>,
    ),
    StopQuery(DomainName, RecordType, oneshot::Sender<Result<()>>),
}

struct Inbound {
    data: Vec<u8>,
    from: SocketAddr,
    socket_index: usize,
}

/// A running (or not-yet-started) mDNS peer. Cloning is cheap: every
/// clone talks to the same actor task over the same command channel.
#[derive(Clone)]
pub struct MdnsNode {
    command_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ServiceEvent>,
}

impl MdnsNode {
    pub fn new(
        options: StartOptions,
        hostname_resolver: Arc<dyn ResolveHostname>,
        interface_provider: Arc<dyn NetworkInterfaceProvider>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let cache_max = options.cache_max;
        let actor = Actor {
            options,
            hostname_resolver,
            interface_provider,
            running: false,
            destroyed: false,
            cache: RecordCache::new(cache_max),
            local_store: None,
            query_engine: QueryEngine::new(),
            advertiser: Advertiser::new(),
            sockets: Vec::new(),
            reader_handles: Vec::new(),
            inbound_rx: None,
            events_tx: events_tx.clone(),
        };

        tokio::spawn(actor.run(command_rx));

        MdnsNode {
            command_tx,
            events_tx,
        }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(make(tx))
            .await
            .map_err(|e| MdnsError::ChannelClosed(e.to_string()))?;
        rx.await.map_err(|e| MdnsError::ChannelClosed(e.to_string()))?
    }

    pub async fn start(&self) -> Result<()> {
        self.call(Command::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.call(Command::Stop).await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.call(Command::Destroy).await
    }

    pub async fn register_service(&self, registration: ServiceRegistration) -> Result<()> {
        self.call(|tx| Command::RegisterService(registration, tx)).await
    }

    pub async fn unregister_service(
        &self,
        instance: impl Into<String>,
        service_type: impl Into<String>,
        protocol: Protocol,
    ) -> Result<()> {
        let instance = instance.into();
        let service_type = service_type.into();
        self.call(|tx| Command::UnregisterService(instance, service_type, protocol, tx))
            .await
    }

    pub async fn start_query(&self, name: DomainName, qtype: RecordType) -> Result<()> {
        self.start_query_with_delays(name, qtype, None, None).await
    }

    /// As [`MdnsNode::start_query`], but overriding the default backoff
    /// window (spec's `startQuery({type, protocol, minDelay?, maxDelay?})`).
    pub async fn start_query_with_delays(
        &self,
        name: DomainName,
        qtype: RecordType,
        min_delay: Option<std::time::Duration>,
        max_delay: Option<std::time::Duration>,
    ) -> Result<()> {
        self.call(|tx| Command::StartQuery(name, qtype, min_delay, max_delay, tx))
            .await
    }

    pub async fn stop_query(&self, name: DomainName, qtype: RecordType) -> Result<()> {
        self.call(|tx| Command::StopQuery(name, qtype, tx)).await
    }

    /// A fresh subscription to the event stream. Events emitted before
    /// this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events_tx.subscribe()
    }
}

struct Actor {
    options: StartOptions,
    hostname_resolver: Arc<dyn ResolveHostname>,
    interface_provider: Arc<dyn NetworkInterfaceProvider>,
    running: bool,
    destroyed: bool,
    cache: RecordCache,
    local_store: Option<LocalStore>,
    query_engine: QueryEngine,
    advertiser: Advertiser,
    sockets: Vec<Arc<SocketBinding>>,
    reader_handles: Vec<JoinHandle<()>>,
    inbound_rx: Option<mpsc::Receiver<Inbound>>,
    events_tx: broadcast::Sender<ServiceEvent>,
}

impl Actor {
    #[instrument(skip_all)]
    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        loop {
            let wake_at = self.next_wake();
            let sleep = async {
                match wake_at {
                    Some(instant) => tokio::time::sleep_until(instant.into()).await,
                    None => std::future::pending::<()>().await,
                }
            };

            // Taken out of `self` for the duration of the select so that
            // no branch future holds a live borrow of `self` while
            // another branch's body needs `&mut self` — the only thing
            // borrowed by `Self::recv_inbound` here is this local, not a
            // field of `self`.
            let mut inbound_rx = self.inbound_rx.take();

            tokio::select! {
                maybe_command = command_rx.recv() => {
                    self.inbound_rx = inbound_rx;
                    match maybe_command {
                        Some(command) => {
                            let should_stop = self.handle_command(command).await;
                            if should_stop {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                maybe_inbound = Self::recv_inbound(&mut inbound_rx) => {
                    self.inbound_rx = inbound_rx;
                    if let Some(inbound) = maybe_inbound {
                        self.handle_inbound(inbound);
                    }
                }
                _ = sleep => {
                    self.inbound_rx = inbound_rx;
                    self.handle_timers();
                }
            }
        }
    }

    async fn recv_inbound(rx: &mut Option<mpsc::Receiver<Inbound>>) -> Option<Inbound> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        [
            self.cache.next_expiry(),
            self.query_engine.next_wake(),
            self.advertiser.next_wake(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Returns `true` if the actor loop should exit (destroy completed).
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(resp) => {
                let result = self.do_start().await;
                let _ = resp.send(result);
            }
            Command::Stop(resp) => {
                let result = self.do_stop();
                let _ = resp.send(result);
            }
            Command::Destroy(resp) => {
                self.do_stop().ok();
                self.cache.destroy();
                self.destroyed = true;
                let _ = resp.send(Ok(()));
                return true;
            }
            Command::RegisterService(registration, resp) => {
                let result = self.do_register(registration);
                let _ = resp.send(result);
            }
            Command::UnregisterService(instance, service_type, protocol, resp) => {
                let result = self.do_unregister(&instance, &service_type, protocol);
                let _ = resp.send(result);
            }
            Command::StartQuery(name, qtype, min_delay, max_delay, resp) => {
                let result = self.do_start_query(name, qtype, min_delay, max_delay);
                let _ = resp.send(result);
            }
            Command::StopQuery(name, qtype, resp) => {
                let result = self.do_stop_query(name, qtype);
                let _ = resp.send(result);
            }
        }
        false
    }

    fn guard_running(&self) -> Result<()> {
        if self.destroyed {
            return Err(MdnsError::Destroyed);
        }
        if !self.running {
            return Err(MdnsError::NotRunning);
        }
        Ok(())
    }

    async fn do_start(&mut self) -> Result<()> {
        if self.destroyed {
            return Err(MdnsError::Destroyed);
        }
        if self.running {
            return Ok(());
        }
        if !self.options.groups.ipv4 && !self.options.groups.ipv6 {
            return Err(MdnsError::NoGroups);
        }

        let interfaces = self
            .interface_provider
            .interfaces()
            .map_err(|e| MdnsError::Collaborator(e.to_string()))?;
        if interfaces.iter().all(|i| i.is_loopback) {
            return Err(MdnsError::WildcardNoInterfaces);
        }

        let bindings = bind_fabric(&interfaces, self.options.groups.ipv4, self.options.groups.ipv6)?;
        if bindings.is_empty() {
            return Err(MdnsError::WildcardNoInterfaces);
        }

        let hostname = match &self.options.hostname {
            Some(h) => h.clone(),
            None => self
                .hostname_resolver
                .resolve_hostname()
                .map_err(|e| MdnsError::Collaborator(e.to_string()))?,
        };
        let fqdn_hostname = DomainName::new(format!("{hostname}.{}", self.options.domain));

        let mut local_store = LocalStore::new(fqdn_hostname, self.options.domain.clone());
        local_store.set_addresses(bindings.iter().map(|b| b.local_addr).collect());
        self.local_store = Some(local_store);

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let mut sockets = Vec::new();
        for (index, binding) in bindings.into_iter().enumerate() {
            let binding = Arc::new(binding);
            sockets.push(binding.clone());
            let tx = inbound_tx.clone();
            self.reader_handles
                .push(tokio::spawn(read_loop(binding, index, tx)));
        }

        self.sockets = sockets;
        self.inbound_rx = Some(inbound_rx);
        self.running = true;
        debug!(interfaces = self.sockets.len(), "node started");
        Ok(())
    }

    fn do_stop(&mut self) -> Result<()> {
        for handle in self.reader_handles.drain(..) {
            handle.abort();
        }
        self.sockets.clear();
        self.inbound_rx = None;
        self.running = false;
        Ok(())
    }

    fn do_register(&mut self, registration: ServiceRegistration) -> Result<()> {
        self.guard_running()?;
        let advertise = registration.advertise && self.options.advertise;
        let fqdn = self.local_store.as_ref().unwrap().instance_fqdn(
            &registration.instance,
            &registration.service_type,
            registration.protocol,
        );
        self.local_store.as_mut().unwrap().register(registration);

        if advertise {
            let records = self.local_store.as_mut().unwrap().records().to_vec();
            let own_records: Vec<_> = records
                .into_iter()
                .filter(|r| r.name == fqdn || r.name == *self.local_store.as_ref().unwrap().hostname())
                .collect();
            let first_shot = self.advertiser.announce(fqdn, own_records, Instant::now());
            self.broadcast_send(&first_shot, &[]);
        }
        Ok(())
    }

    fn do_unregister(
        &mut self,
        instance: &str,
        service_type: &str,
        protocol: Protocol,
    ) -> Result<()> {
        self.guard_running()?;
        let store = self.local_store.as_mut().unwrap();
        let fqdn = store.instance_fqdn(instance, service_type, protocol);
        let records_before = store.records().to_vec();
        let own_records: Vec<_> = records_before
            .into_iter()
            .filter(|r| r.name == fqdn)
            .collect();

        if store.unregister(instance, service_type, protocol).is_none() {
            return Ok(());
        }

        let goodbye = self.advertiser.goodbye(&fqdn, own_records);
        self.broadcast_send(&goodbye, &[]);
        Ok(())
    }

    fn do_start_query(
        &mut self,
        name: DomainName,
        qtype: RecordType,
        min_delay: Option<std::time::Duration>,
        max_delay: Option<std::time::Duration>,
    ) -> Result<()> {
        self.guard_running()?;
        if self
            .query_engine
            .start_query(name.clone(), qtype, Instant::now(), min_delay, max_delay)
        {
            let packet = Packet::query(0, vec![crate::codec::Question::new(name, qtype)]);
            self.send_packet(&packet);
        }
        Ok(())
    }

    fn do_stop_query(&mut self, name: DomainName, qtype: RecordType) -> Result<()> {
        self.guard_running()?;
        self.query_engine.stop_query(&name, qtype);
        Ok(())
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        let packet = match Packet::parse(&inbound.data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, from = %inbound.from, "dropping unparseable packet");
                let _ = self.events_tx.send(ServiceEvent::Error(e.to_string()));
                return;
            }
        };

        let Some(socket) = self.sockets.get(inbound.socket_index) else {
            return;
        };
        if !socket.in_scope(inbound.from.ip()) {
            debug!(from = %inbound.from, "dropping out-of-subnet-scope packet");
            return;
        }

        let now = Instant::now();
        if packet.is_response() {
            let events = reassembler::ingest_response(&mut self.cache, &packet, now);
            for event in events {
                let _ = self.events_tx.send(event);
            }
        } else if let Some(store) = self.local_store.as_mut() {
            if let Some(reply) = responder::build_reply(store, &packet, now) {
                // Per spec §4.3, replies go out only on the socket that
                // received the query, not the whole fabric.
                let response = Packet::response(reply.answers, reply.additionals);
                self.send_packet_on(inbound.socket_index, &response);
            }
        }
    }

    fn handle_timers(&mut self) {
        let now = Instant::now();

        let expired = self.cache.expire_due(now);
        if !expired.is_empty() {
            let events = reassembler::ingest_expired(&self.cache, &expired, now);
            for event in events {
                let _ = self.events_tx.send(event);
            }
        }

        for (name, qtype) in self.query_engine.due(now) {
            let packet = Packet::query(0, vec![crate::codec::Question::new(name, qtype)]);
            self.send_packet(&packet);
        }

        for (_fqdn, records) in self.advertiser.due(now) {
            self.broadcast_send(&records, &[]);
        }
    }

    /// Sends `packet` to the multicast group on every bound socket. Used
    /// for unsolicited traffic this node originates on its own behalf:
    /// advertisements, goodbyes, and outgoing queries.
    fn send_packet(&self, packet: &Packet) {
        let Some(bytes) = self.encode_outgoing(packet) else {
            return;
        };
        for socket in &self.sockets {
            self.spawn_send(socket.clone(), bytes.clone());
        }
    }

    /// Sends `packet` to the multicast group on only the socket that
    /// received the query it answers (spec §4.3): a query's reply must
    /// not cross interfaces.
    fn send_packet_on(&self, socket_index: usize, packet: &Packet) {
        let Some(bytes) = self.encode_outgoing(packet) else {
            return;
        };
        let Some(socket) = self.sockets.get(socket_index).cloned() else {
            return;
        };
        self.spawn_send(socket, bytes);
    }

    fn encode_outgoing(&self, packet: &Packet) -> Option<Vec<u8>> {
        match packet.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(error = %e, "failed to generate outgoing packet");
                let _ = self.events_tx.send(ServiceEvent::Error(e.to_string()));
                None
            }
        }
    }

    fn spawn_send(&self, socket: Arc<SocketBinding>, bytes: Vec<u8>) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let group = match socket.local_addr {
                std::net::IpAddr::V4(_) => {
                    SocketAddr::new(crate::socket::MDNS_GROUP_V4.into(), crate::socket::MDNS_PORT)
                }
                std::net::IpAddr::V6(_) => {
                    SocketAddr::new(crate::socket::MDNS_GROUP_V6.into(), crate::socket::MDNS_PORT)
                }
            };
            if let Err(e) = socket.socket.send_to(&bytes, group).await {
                warn!(error = %e, "send failed");
                let _ = events_tx.send(ServiceEvent::Error(e.to_string()));
            }
        });
    }

    fn broadcast_send(&self, answers: &[crate::codec::ResourceRecord], additionals: &[crate::codec::ResourceRecord]) {
        if answers.is_empty() && additionals.is_empty() {
            return;
        }
        let packet = Packet::response(answers.to_vec(), additionals.to_vec());
        self.send_packet(&packet);
    }
}

async fn read_loop(binding: Arc<SocketBinding>, index: usize, tx: mpsc::Sender<Inbound>) {
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    loop {
        match binding.socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let inbound = Inbound {
                    data: buf[..len].to_vec(),
                    from,
                    socket_index: index,
                };
                if tx.send(inbound).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(interface = %binding.interface_name, error = %e, "socket read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Interface;
    use std::net::IpAddr;

    struct FakeHostname;
    impl ResolveHostname for FakeHostname {
        fn resolve_hostname(&self) -> Result<String> {
            Ok("testhost".to_string())
        }
    }

    struct FakeInterfaces;
    impl NetworkInterfaceProvider for FakeInterfaces {
        fn interfaces(&self) -> Result<Vec<Interface>> {
            Ok(vec![Interface {
                name: "lo".to_string(),
                addr: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                prefix_len: 8,
                is_loopback: true,
            }])
        }
    }

    #[tokio::test]
    async fn start_with_only_loopback_interfaces_fails() {
        let node = MdnsNode::new(
            StartOptions::default(),
            Arc::new(FakeHostname),
            Arc::new(FakeInterfaces),
        );
        let result = node.start().await;
        assert!(matches!(result, Err(MdnsError::WildcardNoInterfaces)));
    }

    #[tokio::test]
    async fn operations_before_start_return_not_running() {
        let node = MdnsNode::new(
            StartOptions::default(),
            Arc::new(FakeHostname),
            Arc::new(FakeInterfaces),
        );
        let result = node
            .register_service(ServiceRegistration::new("x", "_http", Protocol::Tcp, 80))
            .await;
        assert!(matches!(result, Err(MdnsError::NotRunning)));
    }

    #[tokio::test]
    async fn destroy_then_start_returns_destroyed() {
        let node = MdnsNode::new(
            StartOptions::default(),
            Arc::new(FakeHostname),
            Arc::new(FakeInterfaces),
        );
        node.destroy().await.unwrap();
        let result = node.start().await;
        assert!(matches!(result, Err(MdnsError::Destroyed)));
    }
}
