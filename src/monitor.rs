use std::time::Duration;

use itertools::Itertools;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metric::MetricRecord;
use crate::router::{fetch_interface_counters, fetch_sessions, RouterSource, SampleSet};
use crate::sink::MetricSink;

pub(crate) const INTERFACE_BW: &str = "interface_bw";
pub(crate) const PPPOE_CLIENTS: &str = "pppoe_clients";

/// Throughput of one interface between two consecutive polls.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bandwidth {
    pub(crate) interface: String,
    pub(crate) rx_bps: f64,
    pub(crate) tx_bps: f64,
}

/// Bits per second for every interface present in both samples, ordered by
/// interface name.
///
/// `interval` is taken as the exact elapsed time. A counter that went
/// backwards (router reboot) yields a negative rate.
pub(crate) fn bandwidth_deltas(
    previous: &SampleSet,
    current: &SampleSet,
    interval: Duration,
) -> Vec<Bandwidth> {
    let seconds = interval.as_secs_f64();

    current
        .iter()
        .filter_map(|(name, curr)| previous.get(name).map(|prev| (name, prev, curr)))
        .sorted_unstable_by(|a, b| a.0.cmp(b.0))
        .map(|(name, prev, curr)| Bandwidth {
            interface: name.clone(),
            rx_bps: bits_per_second(prev.rx_bytes, curr.rx_bytes, seconds),
            tx_bps: bits_per_second(prev.tx_bytes, curr.tx_bytes, seconds),
        })
        .collect()
}

#[allow(clippy::arithmetic_side_effects, clippy::cast_precision_loss)]
fn bits_per_second(previous: u64, current: u64, seconds: f64) -> f64 {
    // Widen so a counter reset cannot overflow.
    let delta = i128::from(current) - i128::from(previous);

    (delta * 8) as f64 / seconds
}

/// Drives polling cycles, holding the router and sink it was built with.
pub(crate) struct Monitor<R, S> {
    router: R,
    sink: S,
    router_tag: String,
    interval: Duration,
}

impl<R, S> Monitor<R, S>
where
    R: RouterSource,
    S: MetricSink,
{
    pub(crate) const fn new(router: R, sink: S, router_tag: String, interval: Duration) -> Self {
        Monitor { router, sink, router_tag, interval }
    }

    /// Runs cycles every `interval` until `cxl` fires, or a single cycle when
    /// `once` is set.
    pub(crate) async fn run(&self, cxl: CancellationToken, once: bool) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut previous = SampleSet::default();
        loop {
            tokio::select! {
                biased;

                () = cxl.cancelled() => break,
                _ = interval.tick() => previous = self.cycle(&previous).await,
            }

            if once {
                break;
            }
        }

        debug!("Monitor stopped");
    }

    /// Fetches, emits, and returns this cycle's counters as the next baseline.
    ///
    /// The returned set replaces the baseline even when the fetch failed and
    /// it is empty.
    pub(crate) async fn cycle(&self, previous: &SampleSet) -> SampleSet {
        let sessions = fetch_sessions(&self.router).await;
        let counters = fetch_interface_counters(&self.router).await;

        let deltas = bandwidth_deltas(previous, &counters, self.interval);
        for Bandwidth { interface, rx_bps, tx_bps } in deltas {
            let record = MetricRecord::new(INTERFACE_BW)
                .tag("router", self.router_tag.as_str())
                .tag("interface", interface)
                .field("rx_bps", rx_bps)
                .field("tx_bps", tx_bps);
            self.sink.send(&record).await;
        }

        let record = MetricRecord::new(PPPOE_CLIENTS)
            .tag("router", self.router_tag.as_str())
            .field("count", count_field(sessions.len()));
        self.sink.send(&record).await;

        info!(clients = sessions.len(), interfaces = counters.len(), "Poll complete");

        counters
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_field(count: usize) -> f64 {
    count as f64
}
