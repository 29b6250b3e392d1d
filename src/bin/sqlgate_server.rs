use std::{error::Error, sync::Arc};

use clap::Parser;
use log::info;
use sqlgate::{
    ServerConfig, StoreGuard, StoreLock,
    config::{DEFAULT_PORT, resolve_port},
    protocol::SqlServer,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port to listen on; anything unusable falls back to the default
    #[arg(allow_hyphen_values = true, value_name = "PORT")]
    port: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ServerConfig::with_port(resolve_port(cli.port.as_deref()));
    if config.port != DEFAULT_PORT {
        info!("using port {}", config.port);
    }

    let guard = StoreGuard::new(config.store(), Arc::new(StoreLock::new()));
    let server = SqlServer::bind(config.address(), guard)?;
    info!("store at {}", config.database.display());

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || shutdown.trigger())?;

    server.serve()?;
    Ok(())
}
