//! In-memory fakes of the backends and the sink for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use anyhow::anyhow;
use async_trait::async_trait;
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use crate::backend::{CountReply, DealsRequest, DwhClient, OrdersRequest, TokenApi};
use crate::schema::Address;
use crate::sink::{Fields, MetricsSink, Tags};

/// Scripted outcome of one fake backend call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Value(T),
    Fail(&'static str),
    /// Never completes; only a timeout or cancellation ends the call.
    Hang,
}

async fn resolve<T: Clone>(reply: Option<&Reply<T>>, default: T) -> anyhow::Result<T> {
    match reply {
        None => Ok(default),
        Some(Reply::Value(v)) => Ok(v.clone()),
        Some(Reply::Fail(msg)) => Err(anyhow!(*msg)),
        Some(Reply::Hang) => futures_util::future::pending().await,
    }
}

pub fn addr(n: u8) -> Address {
    format!("0x{n:040x}").parse().unwrap()
}

/// Token API answering 1 token for unknown addresses.
#[derive(Default)]
pub struct FakeToken {
    replies: HashMap<Address, Reply<u128>>,
}

impl FakeToken {
    pub fn with(mut self, addr: Address, reply: Reply<u128>) -> Self {
        self.replies.insert(addr, reply);
        self
    }
}

#[async_trait]
impl TokenApi for FakeToken {
    async fn balance_of(&self, addr: Address) -> anyhow::Result<u128> {
        resolve(self.replies.get(&addr), 1_000_000_000_000_000_000).await
    }
}

/// DWH answering zero counts for unknown addresses.
#[derive(Default)]
pub struct FakeDwh {
    deals: HashMap<Address, Reply<u64>>,
    orders: HashMap<Address, Reply<u64>>,
    pub deal_requests: Mutex<Vec<DealsRequest>>,
    pub order_requests: Mutex<Vec<OrdersRequest>>,
}

impl FakeDwh {
    pub fn with_deals(mut self, addr: Address, reply: Reply<u64>) -> Self {
        self.deals.insert(addr, reply);
        self
    }

    pub fn with_orders(mut self, addr: Address, reply: Reply<u64>) -> Self {
        self.orders.insert(addr, reply);
        self
    }
}

#[async_trait]
impl DwhClient for FakeDwh {
    async fn get_deals(&self, req: &DealsRequest) -> anyhow::Result<CountReply> {
        self.deal_requests.lock().unwrap().push(req.clone());
        let count = resolve(self.deals.get(&req.any_user_id), 0).await?;
        Ok(CountReply { count })
    }

    async fn get_orders(&self, req: &OrdersRequest) -> anyhow::Result<CountReply> {
        self.order_requests.lock().unwrap().push(req.clone());
        let count = resolve(self.orders.get(&req.author_id), 0).await?;
        Ok(CountReply { count })
    }
}

/// Sink remembering every successful write.
#[derive(Default)]
pub struct RecordingSink {
    pub points: Mutex<Vec<(String, Tags, Fields)>>,
    /// `addr` tag values whose writes fail
    fail_for: HashSet<String>,
    pub attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn failing_for(mut self, addr: Address) -> Self {
        self.fail_for.insert(addr.to_string());
        self
    }

    pub fn written_addrs(&self) -> Vec<String> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tags, _)| tags["addr"].clone())
            .collect()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn write_raw(&self, measurement: &str, tags: &Tags, fields: &Fields) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if tags.get("addr").is_some_and(|a| self.fail_for.contains(a)) {
            return Err(anyhow!("influx unavailable"));
        }
        self.points
            .lock()
            .unwrap()
            .push((measurement.to_string(), tags.clone(), fields.clone()));
        Ok(())
    }
}

// ------------------------------------------------------------
// Log capture
// ------------------------------------------------------------
//
// One process-wide `log` backend recording every record. Tests run in
// parallel, so each test logs under its own target and only reads back
// records for that target.
//

#[derive(Debug, Clone)]
pub struct Captured {
    pub level: Level,
    pub message: String,
}

#[derive(Default)]
struct CaptureLog {
    records: Mutex<Vec<(String, Captured)>>,
}

impl Log for CaptureLog {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records.lock().unwrap().push((
            record.target().to_string(),
            Captured {
                level: record.level(),
                message: record.args().to_string(),
            },
        ));
    }

    fn flush(&self) {}
}

static CAPTURE: Lazy<CaptureLog> = Lazy::new(CaptureLog::default);
static INSTALL: Once = Once::new();

/// Installs the capturing backend; safe to call from every test.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        if log::set_logger(&*CAPTURE).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Records logged under exactly `target`, in order.
pub fn logs_for(target: &str) -> Vec<Captured> {
    CAPTURE
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(t, _)| t == target)
        .map(|(_, c)| c.clone())
        .collect()
}

pub fn warnings_for(target: &str) -> Vec<String> {
    logs_for(target)
        .into_iter()
        .filter(|c| c.level == Level::Warn)
        .map(|c| c.message)
        .collect()
}
