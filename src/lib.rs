mod cli;
mod line_protocol;
mod metric;
mod monitor;
mod router;
mod routeros;
mod sink;

use std::time::Duration;

pub use cli::{Args, ConfigError};
pub use metric::MetricRecord;
pub use router::{InterfaceSample, RouterConfig, RouterError, SampleSet, Session};
pub use sink::{SinkConfig, SinkError};
use thiserror::Error;
pub use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;
use crate::router::RouterClient;
use crate::sink::LineSink;

/// Polls the router and writes metrics until `cxl` is cancelled.
///
/// Router and sink failures are logged and never end the loop.
///
/// # Errors
///
/// Errors if the HTTP client cannot be constructed.
pub async fn run(cxl: CancellationToken, config: Config) -> Result<(), StartError> {
    let Config { router, sink, interval, once } = config;

    let router_tag = router.address.clone();
    let sink = LineSink::new(sink).map_err(StartError::HttpClient)?;
    let monitor = Monitor::new(RouterClient::new(router), sink, router_tag, interval);

    monitor.run(cxl, once).await;

    Ok(())
}

/// Runtime configuration for the monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Management API connection.
    pub router: RouterConfig,
    /// Line-protocol write endpoint.
    pub sink: SinkConfig,
    /// Poll period; also the elapsed time used to derive bandwidth.
    pub interval: Duration,
    /// Stop after a single cycle.
    pub once: bool,
}

/// Possible failure while starting the monitor.
#[derive(Debug, Error)]
pub enum StartError {
    /// Invalid command-line or environment configuration.
    #[error("Config; err={0}")]
    Config(#[from] ConfigError),
    /// Failed to build the async runtime.
    #[error("Runtime; err={0}")]
    Runtime(#[from] std::io::Error),
    /// Failed to build the HTTP client.
    #[error("Http client; err={0}")]
    HttpClient(SinkError),
}
