use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mdnsd::codec::DomainName;
use mdnsd::collaborators::{SystemHostnameResolver, SystemInterfaceProvider};
use mdnsd::config::StartOptions;
use mdnsd::enums::RecordType;
use mdnsd::node::MdnsNode;
use mdnsd::service::{ServiceEvent, ServiceRegistration};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    mdnsd::logging::init_subscriber();

    match cli.command {
        Commands::PrintDefaultConfig => {
            cli::print_default_config();
        }
        Commands::Run {
            register, query, ..
        } => {
            let options = match StartOptions::load(cli.config().as_deref()) {
                Ok(options) => options,
                Err(e) => {
                    error!(error = %e, "failed to load config");
                    std::process::exit(1);
                }
            };

            let node = MdnsNode::new(
                options,
                Arc::new(SystemHostnameResolver),
                Arc::new(SystemInterfaceProvider),
            );

            if let Err(e) = node.start().await {
                error!(error = %e, "failed to start node");
                std::process::exit(1);
            }
            info!("node started");

            for arg in &register {
                if let Err(e) = arg.validate() {
                    error!(error = %e, "invalid --register argument");
                    continue;
                }
                let registration = ServiceRegistration::new(
                    arg.instance.clone(),
                    arg.service_type.clone(),
                    arg.protocol,
                    arg.port,
                );
                if let Err(e) = node.register_service(registration).await {
                    error!(error = %e, instance = %arg.instance, "failed to register service");
                }
            }

            for arg in &query {
                let type_name = DomainName::new(format!("{}._{}.local", arg.service_type, arg.protocol));
                if let Err(e) = node.start_query(type_name, RecordType::PTR).await {
                    error!(error = %e, service_type = %arg.service_type, "failed to start query");
                }
            }

            let mut events = node.subscribe();
            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(ServiceEvent::ServiceAppeared(service)) => {
                                info!(instance = %service.instance, host = %service.host, port = service.port, "service appeared");
                            }
                            Ok(ServiceEvent::ServiceRemoved(service)) => {
                                info!(instance = %service.instance, "service removed");
                            }
                            Ok(ServiceEvent::Error(message)) => {
                                error!(message = %message, "node reported an error");
                            }
                            Err(_) => break,
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutting down");
                        break;
                    }
                }
            }

            let _ = node.stop().await;
        }
    }
}
