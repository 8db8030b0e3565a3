use std::future::Future;
use std::time::Duration;

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::routeros::{ApiConnection, Row};

/// One active PPPoE client as reported by `/ppp/active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub address: String,
    pub service: String,
    /// Router-formatted duration, e.g. `1d2h3m4s`.
    pub uptime: String,
    pub caller_id: Option<String>,
}

impl Session {
    pub(crate) fn from_row(row: &Row) -> Self {
        let text = |key: &str| row.get(key).cloned().unwrap_or_default();

        Session {
            name: text("name"),
            address: text("address"),
            service: text("service"),
            uptime: text("uptime"),
            caller_id: row.get("caller-id").cloned(),
        }
    }
}

/// Cumulative byte counters of one interface at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl InterfaceSample {
    pub(crate) fn from_row(row: &Row) -> Result<Self, RouterError> {
        Ok(InterfaceSample {
            rx_bytes: counter(row, "rx-byte")?,
            tx_bytes: counter(row, "tx-byte")?,
        })
    }
}

fn counter(row: &Row, field: &'static str) -> Result<u64, RouterError> {
    match row.get(field) {
        Some(value) => value
            .parse()
            .map_err(|_| RouterError::Parse { field, value: value.clone() }),
        None => Ok(0),
    }
}

/// One full poll of interface counters keyed by interface name.
pub type SampleSet = HashMap<String, InterfaceSample>;

/// Failure while talking to the router's management API.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Io; err={0}")]
    Io(#[from] std::io::Error),
    #[error("Timeout")]
    Timeout,
    #[error("Trap; message={message}")]
    Trap { message: String },
    #[error("Fatal; message={message}")]
    Fatal { message: String },
    #[error("Protocol; err={0}")]
    Protocol(String),
    #[error("Parse; field={field}; value={value}")]
    Parse { field: &'static str, value: String },
}

/// Connection settings for the router's management API.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Host name or address; also used as the `router` tag on every record.
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Bounds connect, login and query of a single fetch.
    pub timeout: Duration,
}

/// Read side of the router.
pub(crate) trait RouterSource {
    fn sessions(&self) -> impl Future<Output = Result<Vec<Session>, RouterError>>;

    fn interface_counters(&self) -> impl Future<Output = Result<SampleSet, RouterError>>;
}

/// [`RouterSource`] backed by the RouterOS API; opens a fresh connection per fetch.
pub(crate) struct RouterClient {
    config: RouterConfig,
}

impl RouterClient {
    pub(crate) const fn new(config: RouterConfig) -> Self {
        RouterClient { config }
    }

    async fn print(&self, path: &str) -> Result<Vec<Row>, RouterError> {
        let RouterConfig { address, port, username, password, timeout } = &self.config;

        tokio::time::timeout(*timeout, async {
            let mut conn = ApiConnection::connect(address, *port).await?;
            conn.login(username, password).await?;
            conn.print(path).await
        })
        .await
        .map_err(|_| RouterError::Timeout)?
    }
}

impl RouterSource for RouterClient {
    async fn sessions(&self) -> Result<Vec<Session>, RouterError> {
        let rows = self.print("ppp/active").await?;

        Ok(rows.iter().map(Session::from_row).collect())
    }

    async fn interface_counters(&self) -> Result<SampleSet, RouterError> {
        let rows = self.print("interface").await?;

        interface_samples(&rows)
    }
}

/// Maps interface rows to samples keyed by name; rows without a name are skipped.
fn interface_samples(rows: &[Row]) -> Result<SampleSet, RouterError> {
    rows.iter()
        .filter_map(|row| match row.get("name").filter(|name| !name.is_empty()) {
            Some(name) => {
                Some(InterfaceSample::from_row(row).map(|sample| (name.clone(), sample)))
            }
            None => {
                debug!(?row, "Skipping interface without a name");
                None
            }
        })
        .collect()
}

/// Active sessions, or an empty list if the router could not be queried.
pub(crate) async fn fetch_sessions<R: RouterSource>(router: &R) -> Vec<Session> {
    router.sessions().await.unwrap_or_else(|err| {
        error!(%err, "PPPoE session fetch failed");
        Vec::new()
    })
}

/// Interface counters, or an empty set if the router could not be queried.
pub(crate) async fn fetch_interface_counters<R: RouterSource>(router: &R) -> SampleSet {
    router.interface_counters().await.unwrap_or_else(|err| {
        warn!(%err, "Interface counter fetch failed");
        SampleSet::default()
    })
}
