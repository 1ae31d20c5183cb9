//! homestead-dns binary entry point.

use clap::Parser;
use homestead_dns::{telemetry, Config, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Local DNS resolver for owned domains and private reverse zones.
#[derive(Parser, Debug)]
#[command(name = "homestead-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "homestead-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("HOMESTEAD_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        zones = config.dns.zones.len(),
        nameservers = config.dns.nameservers.len(),
        "Starting homestead-dns"
    );

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    // Run DNS server
    let server = DnsServer::new(config.dns)?;
    let result = server.run(cancel).await;

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("homestead-dns shutdown complete");
    Ok(())
}
