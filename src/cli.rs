//! Command-line surface: `run` brings a node up with services registered
//! and queries started from flags, `print-default-config` dumps a
//! starter config file the way the teacher's `default_config` did.

use clap::{Parser, Subcommand};
use tracing::error;

use mdnsd::config::StartOptions;
use mdnsd::enums::Protocol;

#[derive(Parser, Clone, Debug)]
pub struct SharedOpts {
    #[arg(short, long, help = "Configuration file")]
    pub config: Option<String>,
    #[arg(short, long)]
    pub debug: bool,
}

/// One `instance:type:protocol:port` service to register at startup,
/// e.g. `Office Printer:_http:tcp:8080`.
#[derive(Clone, Debug)]
pub struct RegisterArg {
    pub instance: String,
    pub service_type: String,
    pub protocol: Protocol,
    pub port: u16,
}

impl std::str::FromStr for RegisterArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [instance, service_type, protocol, port] = parts.as_slice() else {
            return Err(format!(
                "expected instance:type:protocol:port, got {s:?}"
            ));
        };
        Ok(RegisterArg {
            instance: instance.to_string(),
            service_type: service_type.to_string(),
            protocol: protocol.parse()?,
            port: port
                .parse()
                .map_err(|e| format!("invalid port {port:?}: {e}"))?,
        })
    }
}

/// One `type:protocol` service type to browse for at startup, e.g.
/// `_http:tcp`.
#[derive(Clone, Debug)]
pub struct QueryArg {
    pub service_type: String,
    pub protocol: Protocol,
}

impl std::str::FromStr for QueryArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (service_type, protocol) = s
            .split_once(':')
            .ok_or_else(|| format!("expected type:protocol, got {s:?}"))?;
        Ok(QueryArg {
            service_type: service_type.to_string(),
            protocol: protocol.parse()?,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a node and keep it running until interrupted.
    Run {
        #[clap(flatten)]
        sopt: SharedOpts,
        /// Register a service to advertise: `instance:type:protocol:port`,
        /// repeatable.
        #[arg(long = "register", value_name = "INSTANCE:TYPE:PROTOCOL:PORT")]
        register: Vec<RegisterArg>,
        /// Browse for a service type as soon as the node starts:
        /// `type:protocol`, repeatable.
        #[arg(long = "query", value_name = "TYPE:PROTOCOL")]
        query: Vec<QueryArg>,
    },
    /// Print a default configuration file to stdout.
    PrintDefaultConfig,
}

#[derive(Parser)]
#[command(arg_required_else_help(true))]
/// An mDNS/DNS-SD peer.
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config(&self) -> Option<String> {
        match &self.command {
            Commands::Run { sopt, .. } => sopt.config.clone(),
            Commands::PrintDefaultConfig => None,
        }
    }

    pub fn debug(&self) -> bool {
        match &self.command {
            Commands::Run { sopt, .. } => sopt.debug,
            Commands::PrintDefaultConfig => false,
        }
    }
}

/// `print-default-config` subcommand implementation.
pub fn print_default_config() {
    let output = StartOptions::default().as_json_pretty();
    println!("{output}");
}

impl RegisterArg {
    pub fn validate(&self) -> Result<(), String> {
        if !self.service_type.starts_with('_') {
            error!(service_type = %self.service_type, "service type should start with '_'");
        }
        Ok(())
    }
}
