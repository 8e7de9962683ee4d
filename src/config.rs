//! Configuration for a running node: what to bind, what to call itself,
//! and the resource limits the cache/query engine enforce. Loaded the
//! same way the teacher's `ConfigFile` was — `config::Config` layering a
//! JSON file under environment variables — but flat, since there's no
//! zone database or web API left to configure.

use std::io::ErrorKind;

use config::Config;
use serde::{Deserialize, Serialize};

/// Multicast groups a node can be asked to join.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Groups {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl Default for Groups {
    fn default() -> Self {
        Groups {
            ipv4: true,
            ipv6: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StartOptions {
    /// Overrides the machine hostname used to build `<hostname>.local`;
    /// `None` means ask [`crate::collaborators::ResolveHostname`].
    pub hostname: Option<String>,
    /// Always `"local"` for link-local mDNS, but left configurable for
    /// tests that want an isolated namespace on the loopback interface.
    pub domain: String,
    pub groups: Groups,
    /// Bind only the link-local scope even when a wildcard interface
    /// enumeration would also return globally routable addresses.
    pub ipv6_only: bool,
    pub reuse_addr: bool,
    /// Upper bound on live cache entries before FIFO eviction kicks in.
    pub cache_max: usize,
    /// Skips the advertiser's registration-time announce for every
    /// service registered under this node unless overridden per-service
    /// (SPEC_FULL.md §C.3).
    pub advertise: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        StartOptions {
            hostname: None,
            domain: "local".to_string(),
            groups: Groups::default(),
            ipv6_only: false,
            reuse_addr: true,
            cache_max: 4096,
            advertise: true,
        }
    }
}

impl StartOptions {
    pub fn as_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("StartOptions always serializes")
    }

    /// Loads from `config_path` if given, else from `./mdnsd.json`, else
    /// falls back to [`StartOptions::default`] — an mDNS peer should
    /// still come up with sane defaults even with zero configuration on
    /// disk, unlike a zone server which has nothing to serve without one.
    pub fn load(config_path: Option<&str>) -> Result<StartOptions, std::io::Error> {
        let path = config_path.unwrap_or("./mdnsd.json");
        if !std::path::Path::new(path).exists() {
            return Ok(StartOptions::default());
        }

        let builder = Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Json))
            .add_source(config::Environment::with_prefix("mdnsd"));

        let built = builder.build().map_err(|e| {
            std::io::Error::new(
                ErrorKind::InvalidData,
                format!("couldn't load config from {path}: {e}"),
            )
        })?;

        built
            .try_deserialize()
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, format!("invalid config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_ipv4_only() {
        let opts = StartOptions::default();
        assert!(opts.groups.ipv4);
        assert!(!opts.groups.ipv6);
    }

    #[test]
    fn load_without_file_falls_back_to_default() {
        let opts = StartOptions::load(Some("/nonexistent/mdnsd.json")).unwrap();
        assert_eq!(opts, StartOptions::default());
    }
}
