use std::{process, sync::Arc};

use pingora_core::server::{configuration::Opt, Server};

use mixgate::{
    config::Config,
    core::{status, Gateway},
    logging::Logger,
    service::{http::GatewayHttpApp, status::StatusHttpApp},
};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = match Config::load_yaml_with_opt_override(&opt) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    // Initialize logging, into a file when configured
    let logger = config.log.clone().map(Logger::new);
    match &logger {
        Some(logger) => logger.init_env_logger(),
        None => env_logger::init(),
    }

    log::info!("Building gateway...");
    let gateway = match Gateway::new(&config.gateway) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            log::error!("Failed to build gateway: {e}");
            eprintln!("Failed to build gateway: {e}");
            process::exit(1);
        }
    };

    let mut mixgate_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    log::info!("Bootstrapping...");
    mixgate_server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    if let Some(logger) = logger {
        mixgate_server.add_service(logger);
    }

    mixgate_server.add_service(GatewayHttpApp::gateway_http_service(
        &config.gateway,
        gateway.clone(),
    ));

    if let Some(status_cfg) = &config.status {
        mixgate_server.add_service(StatusHttpApp::status_http_service(status_cfg, gateway));
    }

    status::mark_ready(config.gateway.listeners.len());

    log::info!("Starting Server...");
    mixgate_server.run_forever();
}
