use std::sync::Arc;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    collector::aggregator::RowAggregator,
    logging::Logger,
    metrics::{METRICS, RuntimeMetrics},
    schema::{Address, WalletRow},
    sink::{FieldValue, Fields, MetricsSink, Tags},
};

/// Measurement every wallet row is written to.
pub const MEASUREMENT: &str = "wallets";

/// Outcome counts of one pass over the address list.
///
/// Only used for logging; failures are already reported per address.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub collected: usize,
    pub written: usize,
    pub failed: usize,
}

/// Runs one collection cycle over all configured addresses.
///
/// GUARANTEES:
/// - Addresses are processed one at a time, in configuration order
/// - A failing address never stops the others
/// - A failed sink write drops that row; it is never retried
///
pub struct CycleRunner {
    addresses: Vec<Address>,
    aggregator: RowAggregator,
    sink: Arc<dyn MetricsSink>,
    log: Logger,
}

impl CycleRunner {
    pub fn new(
        addresses: Vec<Address>,
        aggregator: RowAggregator,
        sink: Arc<dyn MetricsSink>,
        log: Logger,
    ) -> Self {
        Self {
            addresses,
            aggregator,
            sink,
            log,
        }
    }

    pub async fn run_once(&self, cancel: &CancellationToken) -> CycleSummary {
        let mut summary = CycleSummary::default();

        for &addr in &self.addresses {
            if cancel.is_cancelled() {
                debug!(target: self.log.target(), "cycle interrupted before {addr}");
                break;
            }

            let row = match self.aggregator.collect(addr, cancel).await {
                Ok(row) => row,
                Err(err) if err.is_cancelled() => break,
                Err(err) => {
                    summary.failed += 1;
                    warn!(target: self.log.target(), "skipping addr={addr} this cycle: {err}");
                    continue;
                }
            };

            summary.collected += 1;
            RuntimeMetrics::incr(&METRICS.rows_collected);
            debug!(
                target: self.log.target(),
                "row collection done: {}",
                serde_json::to_string(&row).unwrap_or_default()
            );

            let (tags, fields) = to_point(&row);
            match self.sink.write_raw(MEASUREMENT, &tags, &fields).await {
                Ok(()) => {
                    summary.written += 1;
                    RuntimeMetrics::incr(&METRICS.rows_written);
                }
                Err(err) => {
                    RuntimeMetrics::incr(&METRICS.sink_errors);
                    warn!(
                        target: self.log.target(),
                        "failed to write wallet data for addr={addr} into influxdb: {err:#}"
                    );
                }
            }
        }

        summary
    }
}

/// Tag and field sets of one wallet point.
///
/// Counts beyond i64 saturate; the line protocol has no unsigned default.
fn to_point(row: &WalletRow) -> (Tags, Fields) {
    let tags = Tags::from([("addr".to_string(), row.addr.to_string())]);
    let fields = Fields::from([
        ("balance".to_string(), FieldValue::Float(row.balance)),
        (
            "deals".to_string(),
            FieldValue::Int(i64::try_from(row.deals).unwrap_or(i64::MAX)),
        ),
        (
            "orders".to_string(),
            FieldValue::Int(i64::try_from(row.orders).unwrap_or(i64::MAX)),
        ),
    ]);
    (tags, fields)
}
