//! The set of records this node is authoritative for: its own address
//! records plus one PTR/SRV/TXT triple per registered service, and the
//! meta-service PTR RFC 6763 §9 browsers use to discover service types.
//! Regenerated lazily off a dirty flag rather than on every mutation, the
//! same shape as the teacher's in-memory zone cache in `datastore.rs`.

use std::net::IpAddr;

use crate::codec::{DomainName, RData, ResourceRecord};
use crate::service::ServiceRegistration;

/// RFC 6762 §10 default TTL for host address records.
const HOST_TTL: u32 = 120;
/// RFC 6763 §6 default TTL for TXT/SRV records.
const SERVICE_TTL: u32 = 4500;
/// RFC 6763 §6 default TTL for PTR records.
const PTR_TTL: u32 = 4500;

const META_SERVICE_NAME: &str = "_services._dns-sd._udp";

pub struct LocalStore {
    hostname: DomainName,
    addresses: Vec<IpAddr>,
    services: Vec<ServiceRegistration>,
    domain: String,
    dirty: bool,
    generated: Vec<ResourceRecord>,
}

impl LocalStore {
    pub fn new(hostname: DomainName, domain: impl Into<String>) -> Self {
        LocalStore {
            hostname,
            addresses: Vec::new(),
            services: Vec::new(),
            domain: domain.into(),
            dirty: true,
            generated: Vec::new(),
        }
    }

    pub fn set_addresses(&mut self, addresses: Vec<IpAddr>) {
        self.addresses = addresses;
        self.dirty = true;
    }

    pub fn register(&mut self, registration: ServiceRegistration) {
        self.services.retain(|s| {
            !(s.instance == registration.instance
                && s.service_type == registration.service_type
                && s.protocol == registration.protocol)
        });
        self.services.push(registration);
        self.dirty = true;
    }

    /// Removes a registered service, returning it if one matched. The
    /// advertiser uses the returned registration to build a goodbye
    /// packet before the records vanish from here.
    pub fn unregister(
        &mut self,
        instance: &str,
        service_type: &str,
        protocol: crate::enums::Protocol,
    ) -> Option<ServiceRegistration> {
        let position = self.services.iter().position(|s| {
            s.instance == instance && s.service_type == service_type && s.protocol == protocol
        })?;
        self.dirty = true;
        Some(self.services.remove(position))
    }

    pub fn service_type_name(&self, service_type: &str, protocol: crate::enums::Protocol) -> DomainName {
        DomainName::new(format!("{service_type}._{protocol}.{}", self.domain))
    }

    pub fn instance_fqdn(
        &self,
        instance: &str,
        service_type: &str,
        protocol: crate::enums::Protocol,
    ) -> DomainName {
        DomainName::new(format!(
            "{instance}.{service_type}._{protocol}.{}",
            self.domain
        ))
    }

    /// Every record this node is authoritative for. Regenerates from
    /// scratch only when something registered since the last call.
    pub fn records(&mut self) -> &[ResourceRecord] {
        if self.dirty {
            self.generated = self.generate();
            self.dirty = false;
        }
        &self.generated
    }

    fn generate(&self) -> Vec<ResourceRecord> {
        let mut out = Vec::new();

        for addr in &self.addresses {
            let rdata = match addr {
                IpAddr::V4(v4) => RData::A(*v4),
                IpAddr::V6(v6) => RData::Aaaa(*v6),
            };
            out.push(ResourceRecord::new(
                self.hostname.clone(),
                HOST_TTL,
                true,
                rdata,
            ));
        }

        let mut seen_types = std::collections::HashSet::new();

        for service in &self.services {
            let type_name = self.service_type_name(&service.service_type, service.protocol);
            let instance_fqdn =
                self.instance_fqdn(&service.instance, &service.service_type, service.protocol);

            out.push(ResourceRecord::new(
                type_name.clone(),
                PTR_TTL,
                false,
                RData::Ptr(instance_fqdn.clone()),
            ));

            out.push(ResourceRecord::new(
                instance_fqdn.clone(),
                SERVICE_TTL,
                true,
                RData::Srv {
                    priority: 0,
                    weight: 0,
                    port: service.port,
                    target: self.hostname.clone(),
                },
            ));

            out.push(ResourceRecord::new(
                instance_fqdn,
                SERVICE_TTL,
                true,
                RData::Txt(service.txt.clone()),
            ));

            if seen_types.insert(type_name.clone()) {
                out.push(ResourceRecord::new(
                    DomainName::new(format!("{META_SERVICE_NAME}.{}", self.domain)),
                    PTR_TTL,
                    false,
                    RData::Ptr(type_name),
                ));
            }
        }

        out
    }

    pub fn hostname(&self) -> &DomainName {
        &self.hostname
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Protocol;
    use std::net::Ipv4Addr;

    fn store() -> LocalStore {
        let mut store = LocalStore::new(DomainName::new("host.local"), "local");
        store.set_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5))]);
        store
    }

    #[test]
    fn generates_host_address_record() {
        let mut store = store();
        let records = store.records();
        assert!(records
            .iter()
            .any(|r| matches!(r.rdata, RData::A(_)) && r.name == DomainName::new("host.local")));
    }

    #[test]
    fn registering_a_service_adds_ptr_srv_txt_and_meta_ptr() {
        let mut store = store();
        store.register(ServiceRegistration::new(
            "Office Printer",
            "_http",
            Protocol::Tcp,
            8080,
        ));
        let records = store.records();
        let ptr_count = records
            .iter()
            .filter(|r| matches!(r.rdata, RData::Ptr(_)))
            .count();
        // one PTR under the service type, one PTR under the meta-service.
        assert_eq!(ptr_count, 2);
        assert!(records.iter().any(|r| matches!(r.rdata, RData::Srv { .. })));
        assert!(records.iter().any(|r| matches!(r.rdata, RData::Txt(_))));
    }

    #[test]
    fn unregister_removes_service_records() {
        let mut store = store();
        store.register(ServiceRegistration::new(
            "Office Printer",
            "_http",
            Protocol::Tcp,
            8080,
        ));
        let removed = store.unregister("Office Printer", "_http", Protocol::Tcp);
        assert!(removed.is_some());
        let records = store.records();
        assert!(!records.iter().any(|r| matches!(r.rdata, RData::Srv { .. })));
    }
}
