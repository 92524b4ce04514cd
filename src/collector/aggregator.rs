use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join3;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{DealsRequest, DwhClient, OrdersRequest, TokenApi};
use crate::collector::error::CollectError;
use crate::logging::Logger;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::schema::{Address, SubQuery, WalletRow};
use crate::util::scale_balance;

/// Builds one wallet row from the three backends.
///
/// DESIGN:
/// - Balance, deals and orders are queried concurrently
/// - Each call has its own timeout
/// - All calls share the caller's cancellation token
/// - The first failure abandons the remaining calls and fails the row
///
/// No retries happen here; the next cycle tries again.
pub struct RowAggregator {
    token: Arc<dyn TokenApi>,
    dwh: Arc<dyn DwhClient>,
    call_timeout: Duration,
    log: Logger,
}

impl RowAggregator {
    pub fn new(
        token: Arc<dyn TokenApi>,
        dwh: Arc<dyn DwhClient>,
        call_timeout: Duration,
        log: Logger,
    ) -> Self {
        Self {
            token,
            dwh,
            call_timeout,
            log,
        }
    }

    pub async fn collect(
        &self,
        addr: Address,
        cancel: &CancellationToken,
    ) -> Result<WalletRow, CollectError> {
        let balance = self.guarded(SubQuery::Balance, addr, cancel, async {
            let raw = self.token.balance_of(addr).await?;
            Ok::<_, anyhow::Error>(scale_balance(raw))
        });

        let deals = self.guarded(SubQuery::Deals, addr, cancel, async {
            let reply = self.dwh.get_deals(&DealsRequest::accepted_for(addr)).await?;
            Ok::<_, anyhow::Error>(reply.count)
        });

        let orders = self.guarded(SubQuery::Orders, addr, cancel, async {
            let reply = self.dwh.get_orders(&OrdersRequest::active_for(addr)).await?;
            Ok::<_, anyhow::Error>(reply.count)
        });

        // try_join3 drops the pending futures on the first error
        let (balance, deals, orders) = try_join3(balance, deals, orders).await?;

        Ok(WalletRow {
            addr,
            balance,
            deals,
            orders,
        })
    }

    /// Runs one sub-query under its timeout, racing the shared token.
    async fn guarded<T>(
        &self,
        query: SubQuery,
        addr: Address,
        cancel: &CancellationToken,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CollectError> {
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(CollectError::Cancelled { query }),
            res = tokio::time::timeout(self.call_timeout, call) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(source)) => Err(CollectError::Backend { query, source }),
                Err(_) => Err(CollectError::Timeout { query, after: self.call_timeout }),
            },
        };

        match &result {
            Err(err) if err.is_cancelled() => {
                debug!(target: self.log.target(), "{} query for {addr} abandoned: cancelled", err.query());
            }
            Err(err) => {
                RuntimeMetrics::incr(&METRICS.sub_query_errors);
                warn!(target: self.log.target(), "failed to get {query} for addr={addr}: {err}");
            }
            Ok(_) => {}
        }

        result
    }
}
