//! A waiter owns a fixed set of tables. On every tick it collects new orders
//! from them for the kitchen, and it carries cooked orders back.
use crate::actor::{Actor, Addr, Context};
use crate::ordering::{FoodOrderingController, OrderingError};
use crate::table::Table;
use crate::{Delivery, TableId, TableMsg, WaiterId, WaiterMsg};
use anyhow::Result;
use bistro_config::Configuration;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// A waiter's handle on one of its tables.
#[derive(Clone, Debug)]
pub struct TableRef {
    pub id: TableId,
    pub addr: Addr<Table>,
}

pub struct Waiter {
    id: WaiterId,
    config: Arc<Configuration>,
    tables: Vec<TableRef>,
    ordering: Option<Arc<FoodOrderingController>>,
}

impl Waiter {
    pub fn new(id: WaiterId, config: Arc<Configuration>) -> Self {
        Self {
            id,
            config,
            tables: Vec::new(),
            ordering: None,
        }
    }

    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Append a table. Only called during assignment, before the waiter runs.
    pub fn add_table(&mut self, table: TableRef) {
        self.tables.push(table);
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|t| t.id).collect()
    }

    pub fn set_ordering_controller(&mut self, ordering: Arc<FoodOrderingController>) {
        self.ordering = Some(ordering);
    }

    async fn make_rounds(&self) -> Result<()> {
        for table in &self.tables {
            let (reply, rx) = oneshot::channel();
            if table.addr.send(TableMsg::RequestOrder { reply }).await.is_err() {
                tracing::debug!(waiter = self.id, table = table.id, "waiter.table_gone");
                continue;
            }
            let Ok(Some(mut order)) = rx.await else {
                continue;
            };

            let Some(ordering) = &self.ordering else {
                anyhow::bail!("waiter {} has no ordering controller", self.id);
            };
            order.waiter_id = Some(self.id);
            order.picked_up_at = Some(Instant::now());
            let order_id = order.order_id;
            match ordering.submit(order).await {
                Ok(()) => tracing::debug!(waiter = self.id, table = table.id, order_id, "waiter.order_submitted"),
                Err(OrderingError::Closed) => {
                    tracing::debug!(waiter = self.id, order_id, "waiter.kitchen_closed");
                    return Ok(());
                }
                Err(e) => tracing::warn!(waiter = self.id, order_id, error = %e, "waiter.order_rejected"),
            }
        }
        Ok(())
    }

    async fn deliver(&self, delivery: Delivery) {
        let table_id = delivery.order.table_id;
        let order_id = delivery.order.order_id;
        if let Some(picked_up_at) = delivery.order.picked_up_at {
            let waited = picked_up_at.elapsed();
            if waited > self.config.time_units(delivery.order.max_wait) {
                tracing::debug!(waiter = self.id, table = table_id, order_id, ?waited, "waiter.late_delivery");
            }
        }
        let Some(table) = self.tables.iter().find(|t| t.id == table_id) else {
            tracing::warn!(waiter = self.id, table = table_id, order_id, "waiter.foreign_delivery");
            return;
        };
        if table.addr.send(TableMsg::Serve { delivery }).await.is_err() {
            tracing::debug!(waiter = self.id, table = table_id, order_id, "waiter.table_gone");
        }
    }
}

#[async_trait::async_trait]
impl Actor for Waiter {
    type Msg = WaiterMsg;

    async fn handle(&mut self, msg: WaiterMsg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            WaiterMsg::Tick => self.make_rounds().await,
            WaiterMsg::Deliver(delivery) => {
                self.deliver(delivery).await;
                Ok(())
            }
        }
    }
}
