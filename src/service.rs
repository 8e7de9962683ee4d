//! The public shape of a service: what callers register, what the
//! reassembler hands back once it has pieced one together from the
//! network, and the events a running node emits.

use std::net::IpAddr;

use crate::codec::DomainName;
use crate::enums::Protocol;

/// A service this node advertises, or one reconstructed from records
/// observed on the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    /// Instance label, e.g. `"Office Printer"`.
    pub instance: String,
    /// Service type, e.g. `"_http"`.
    pub service_type: String,
    pub protocol: Protocol,
    /// Always `"local"` for link-local mDNS.
    pub domain: String,
    pub host: DomainName,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    /// TXT record key/value pairs, in wire order, de-duplicated first-key
    /// wins.
    pub txt: Vec<(String, Option<String>)>,
}

impl Service {
    /// The fully-qualified instance name, e.g.
    /// `"Office Printer._http._tcp.local"`.
    pub fn fqdn(&self) -> DomainName {
        DomainName::new(format!(
            "{}.{}._{}.{}",
            self.instance, self.service_type, self.protocol, self.domain
        ))
    }

    /// The service type PTR name a browser queries, e.g.
    /// `"_http._tcp.local"`.
    pub fn type_name(&self) -> DomainName {
        DomainName::new(format!(
            "{}._{}.{}",
            self.service_type, self.protocol, self.domain
        ))
    }
}

/// What a registered service looks like to the caller at registration
/// time, before the host's address records are known to be published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub instance: String,
    pub service_type: String,
    pub protocol: Protocol,
    pub port: u16,
    pub txt: Vec<(String, Option<String>)>,
    /// Skips the advertiser's registration-time two-shot announce while
    /// still building local records for it (SPEC_FULL.md §C.3). Defaults
    /// to `true` via [`ServiceRegistration::new`].
    pub advertise: bool,
}

impl ServiceRegistration {
    pub fn new(
        instance: impl Into<String>,
        service_type: impl Into<String>,
        protocol: Protocol,
        port: u16,
    ) -> Self {
        ServiceRegistration {
            instance: instance.into(),
            service_type: service_type.into(),
            protocol,
            port,
            txt: Vec::new(),
            advertise: true,
        }
    }

    pub fn with_txt(mut self, txt: Vec<(String, Option<String>)>) -> Self {
        self.txt = txt;
        self
    }

    pub fn with_advertise(mut self, advertise: bool) -> Self {
        self.advertise = advertise;
        self
    }
}

/// Emitted on the node's event stream (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceEvent {
    ServiceAppeared(Service),
    ServiceRemoved(Service),
    Error(String),
}
