//! External collaborators (spec.md §6): things the node depends on but
//! doesn't own, abstracted as traits so tests can substitute fakes the
//! way the teacher's `datastore` took its `ConfigFile` by trait-ish
//! injection rather than reading the environment directly.

use std::net::IpAddr;

use crate::error::{MdnsError, Result};

/// Resolves this machine's own hostname, used to build the default
/// `<hostname>.local` target for address records.
pub trait ResolveHostname: Send + Sync {
    fn resolve_hostname(&self) -> Result<String>;
}

/// One network interface the socket fabric can bind to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub addr: IpAddr,
    /// CIDR prefix length, used for the subnet-scope filter (spec §4.3).
    pub prefix_len: u8,
    pub is_loopback: bool,
}

/// Enumerates usable network interfaces for a wildcard bind.
pub trait NetworkInterfaceProvider: Send + Sync {
    fn interfaces(&self) -> Result<Vec<Interface>>;
}

/// Default [`ResolveHostname`], backed by `gethostname`.
#[derive(Default)]
pub struct SystemHostnameResolver;

impl ResolveHostname for SystemHostnameResolver {
    fn resolve_hostname(&self) -> Result<String> {
        gethostname::gethostname()
            .into_string()
            .map_err(|_| MdnsError::Collaborator("hostname is not valid UTF-8".to_string()))
    }
}

/// Default [`NetworkInterfaceProvider`], backed by `if-addrs`.
#[derive(Default)]
pub struct SystemInterfaceProvider;

impl NetworkInterfaceProvider for SystemInterfaceProvider {
    fn interfaces(&self) -> Result<Vec<Interface>> {
        let found = if_addrs::get_if_addrs()
            .map_err(|e| MdnsError::Collaborator(format!("failed to enumerate interfaces: {e}")))?;

        Ok(found
            .into_iter()
            .map(|iface| {
                let (addr, prefix_len) = match &iface.addr {
                    if_addrs::IfAddr::V4(v4) => (
                        IpAddr::V4(v4.ip),
                        u32::from(v4.netmask).count_ones() as u8,
                    ),
                    if_addrs::IfAddr::V6(v6) => (
                        IpAddr::V6(v6.ip),
                        u128::from(v6.netmask).count_ones() as u8,
                    ),
                };
                Interface {
                    name: iface.name,
                    addr,
                    prefix_len,
                    is_loopback: iface.is_loopback(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeInterfaces(Vec<Interface>);

    impl NetworkInterfaceProvider for FakeInterfaces {
        fn interfaces(&self) -> Result<Vec<Interface>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fake_provider_returns_configured_interfaces() {
        let fake = FakeInterfaces(vec![Interface {
            name: "eth0".to_string(),
            addr: "192.168.1.10".parse().unwrap(),
            prefix_len: 24,
            is_loopback: false,
        }]);
        let found = fake.interfaces().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "eth0");
    }
}
