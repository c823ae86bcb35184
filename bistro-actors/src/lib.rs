pub mod actor;
pub mod application;
pub mod builder;
pub mod ids;
pub mod ordering;
pub mod pool;
pub mod rating;
pub mod registry;
pub mod system;
pub mod table;
pub mod waiter;

use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Construction index of a table, `0..TableCount`.
pub type TableId = usize;
/// Construction index of a waiter, `0..WaiterCount`.
pub type WaiterId = usize;
/// Value handed out by [`ids::IdAllocator`].
pub type OrderId = u64;

/// Highest order priority; orders with fewer items rank higher.
pub const MAX_PRIORITY: u8 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub table_id: TableId,
    /// Set by the waiter that picks the order up.
    pub waiter_id: Option<WaiterId>,
    /// Catalog item ids.
    pub items: Vec<u32>,
    pub priority: u8,
    /// Longest acceptable wait, in time units.
    pub max_wait: u64,
    pub picked_up_at: Option<Instant>,
}

/// A cooked order on its way back to the table that placed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub order: Order,
    pub cooking_time: Duration,
}

#[derive(Debug)]
pub enum TableMsg {
    /// Ask the table for a new order; `None` when it is still waiting on one.
    RequestOrder {
        reply: oneshot::Sender<Option<Order>>,
    },
    Serve {
        delivery: Delivery,
    },
}

#[derive(Debug)]
pub enum WaiterMsg {
    /// Poll every owned table once.
    Tick,
    Deliver(Delivery),
}

/// A long-running top-level unit with an explicit two-step lifecycle.
///
/// `start` runs until `cancel` fires or `shutdown` is called; `shutdown`
/// returns once the run loop has stopped.
#[async_trait::async_trait]
pub trait Service: Send + Sync + 'static {
    async fn start(&self, cancel: CancellationToken) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
}
