use std::process::ExitCode;

use clap::Parser;
use routeros_pppoe_monitor::{Args, CancellationToken, StartError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match start(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Monitor failed to start");
            ExitCode::FAILURE
        }
    }
}

fn start(args: Args) -> Result<(), StartError> {
    let config = args.into_config()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    info!(
        router = %config.router.address,
        interval = ?config.interval,
        "Starting PPPoE monitor"
    );

    runtime.block_on(async {
        let cxl = CancellationToken::new();
        let shutdown = cxl.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "Failed to listen for shutdown signal");

                return;
            }

            info!("Shutdown requested");
            shutdown.cancel();
        });

        routeros_pppoe_monitor::run(cxl, config).await
    })
}
