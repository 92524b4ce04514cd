use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{DwhClient, TokenApi},
    collector::{aggregator::RowAggregator, runner::CycleRunner, scheduler::Scheduler},
    config::Config,
    logging::Logger,
    sink::MetricsSink,
};

/// A monitoring job hosted by the process.
///
/// CONTRACT:
/// - `run` returns only after `cancel` fires
/// - All errors are handled inside the plugin
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, cancel: CancellationToken);
}

/// Wallet balances, deals and orders, written to the `wallets` measurement.
pub struct WalletPlugin {
    scheduler: Scheduler,
}

impl WalletPlugin {
    pub fn new(
        cfg: &Config,
        log: &Logger,
        sink: Arc<dyn MetricsSink>,
        token: Arc<dyn TokenApi>,
        dwh: Arc<dyn DwhClient>,
    ) -> Self {
        let log = log.named("wallet");
        let aggregator = RowAggregator::new(token, dwh, cfg.call_timeout(), log.clone());
        let runner = CycleRunner::new(cfg.addresses.clone(), aggregator, sink, log.clone());

        Self {
            scheduler: Scheduler::new(runner, cfg.interval(), log),
        }
    }
}

#[async_trait]
impl Plugin for WalletPlugin {
    fn name(&self) -> &'static str {
        "wallet"
    }

    async fn run(&self, cancel: CancellationToken) {
        self.scheduler.run(cancel).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::scheduler::SchedulerState;
    use crate::testing::{FakeDwh, FakeToken, RecordingSink, Reply, addr};

    fn config() -> Config {
        Config::from_json(&format!(
            r#"{{
                "addresses": ["{}", "{}"],
                "interval_secs": 10,
                "call_timeout_secs": 2,
                "token": {{ "url": "http://node", "contract": "{}" }},
                "dwh": {{ "url": "http://dwh" }},
                "influx": {{ "url": "http://influx", "database": "monitoring" }}
            }}"#,
            addr(0xab),
            addr(0xde),
            addr(0xff),
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_healthy_wallets_and_skips_broken_ones() {
        let (good, broken) = (addr(0xab), addr(0xde));
        let sink = Arc::new(RecordingSink::default());
        let plugin = Arc::new(WalletPlugin::new(
            &config(),
            &Logger::root("monitoring"),
            sink.clone(),
            Arc::new(FakeToken::default().with(good, Reply::Value(2_500_000_000_000_000_000))),
            Arc::new(
                FakeDwh::default()
                    .with_deals(good, Reply::Value(3))
                    .with_orders(good, Reply::Value(7))
                    .with_orders(broken, Reply::Hang),
            ),
        ));
        assert_eq!(plugin.name(), "wallet");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let plugin = plugin.clone();
            let cancel = cancel.clone();
            async move { plugin.run(cancel).await }
        });

        // first cycle: the broken wallet times out after 2s
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.written_addrs(), vec![good.to_string()]);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(plugin.scheduler.state(), SchedulerState::Stopped);

        let points = sink.points.lock().unwrap();
        let (measurement, tags, _) = &points[0];
        assert_eq!(measurement, "wallets");
        assert_eq!(tags["addr"], good.to_string());
    }
}
