//! Cyber range server - binary entry point

use clap::Parser;
use cyberrange::{config::RangeConfig, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cyberrange-server")]
#[command(version, about = "Cyber range web API", long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults to ./cyberrange.toml when present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the bind address, e.g. 0.0.0.0:5000
    #[arg(long, value_name = "HOST:PORT")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RangeConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.set_bind_addr(&bind)?;
    }
    logging::init_logging(&config.logging)?;

    cyberrange_server::start_server(config).await
}
