//! A dining-hall table: places one order at a time and rates the service
//! once the food arrives.
use crate::actor::{Actor, Context};
use crate::ids::IdAllocator;
use crate::rating::{stars_for, RatingSystem};
use crate::{Delivery, Order, OrderId, TableId, TableMsg, MAX_PRIORITY};
use anyhow::Result;
use bistro_config::{Configuration, ItemCatalog};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableState {
    Free,
    Waiting {
        order_id: OrderId,
        max_wait: u64,
        since: Instant,
    },
}

pub struct Table {
    id: TableId,
    ids: Arc<IdAllocator>,
    catalog: Arc<ItemCatalog>,
    config: Arc<Configuration>,
    rating: Option<Arc<RatingSystem>>,
    state: TableState,
}

impl Table {
    pub fn new(
        id: TableId,
        ids: Arc<IdAllocator>,
        catalog: Arc<ItemCatalog>,
        config: Arc<Configuration>,
    ) -> Self {
        Self {
            id,
            ids,
            catalog,
            config,
            rating: None,
            state: TableState::Free,
        }
    }

    /// Attach the hall-wide rating aggregator. Must happen before the table runs.
    pub fn set_rating_system(&mut self, rating: Arc<RatingSystem>) {
        self.rating = Some(rating);
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, TableState::Waiting { .. })
    }

    fn place_order(&mut self) -> Result<Option<Order>> {
        if self.is_waiting() || self.catalog.is_empty() {
            return Ok(None);
        }
        let order_id = self.ids.next_id()?;
        let items = pick_items(order_id, self.id, &self.catalog, self.config.max_order_items);
        let longest = items
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .map(|item| item.preparation_time)
            .max()
            .unwrap_or(0);
        let max_wait = max_wait_for(longest);
        let priority = MAX_PRIORITY.saturating_sub(items.len().saturating_sub(1).min(4) as u8);

        self.state = TableState::Waiting {
            order_id,
            max_wait,
            since: Instant::now(),
        };
        tracing::debug!(table = self.id, order_id, items = items.len(), max_wait, "table.order_placed");

        Ok(Some(Order {
            order_id,
            table_id: self.id,
            waiter_id: None,
            items,
            priority,
            max_wait,
            picked_up_at: None,
        }))
    }

    fn serve(&mut self, delivery: Delivery) {
        let order_id = delivery.order.order_id;
        let TableState::Waiting { order_id: pending, max_wait, since } = self.state.clone() else {
            tracing::warn!(table = self.id, order_id, "table.unexpected_delivery");
            return;
        };
        if pending != order_id {
            tracing::warn!(table = self.id, order_id, pending, "table.mismatched_delivery");
            return;
        }

        let elapsed = since.elapsed();
        let stars = stars_for(elapsed, self.config.time_units(max_wait));
        match &self.rating {
            Some(rating) => rating.rate(stars),
            None => tracing::warn!(table = self.id, order_id, "table.no_rating_system"),
        }
        self.state = TableState::Free;
        tracing::debug!(table = self.id, order_id, stars, ?elapsed, "table.served");
    }
}

/// Choose `1..=max_items` catalog ids for `order_id`.
///
/// Deterministic in its inputs so that runs are reproducible.
fn pick_items(order_id: OrderId, table: TableId, catalog: &ItemCatalog, max_items: usize) -> Vec<u32> {
    let items = catalog.as_slice();
    if items.is_empty() || max_items == 0 {
        return Vec::new();
    }
    let count = 1 + (order_id as usize % max_items);
    let stride = table + 1;
    (0..count)
        .map(|k| items[(order_id as usize).wrapping_add(k.wrapping_mul(stride)) % items.len()].id)
        .collect()
}

/// 1.3 times the longest preparation time, rounded up, never below one unit.
fn max_wait_for(longest_preparation: u64) -> u64 {
    (longest_preparation.saturating_mul(13).saturating_add(9) / 10).max(1)
}

#[async_trait::async_trait]
impl Actor for Table {
    type Msg = TableMsg;

    async fn handle(&mut self, msg: TableMsg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            TableMsg::RequestOrder { reply } => {
                let order = self.place_order()?;
                if reply.send(order).is_err() {
                    tracing::debug!(table = self.id, "table.requester_gone");
                }
            }
            TableMsg::Serve { delivery } => self.serve(delivery),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_actor;
    use bistro_config::Item;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn catalog() -> Arc<ItemCatalog> {
        let item = |id, prep| Item {
            id,
            name: format!("dish-{id}"),
            preparation_time: prep,
            complexity: 1,
            cooking_apparatus: None,
        };
        Arc::new(ItemCatalog::new(vec![item(1, 10), item(2, 20), item(3, 0)]))
    }

    fn table(id: TableId) -> Table {
        Table::new(
            id,
            Arc::new(IdAllocator::new()),
            catalog(),
            Arc::new(Configuration::new(1, 1, 1)),
        )
    }

    #[test]
    fn max_wait_rounds_up_and_has_a_floor() {
        assert_eq!(max_wait_for(0), 1);
        assert_eq!(max_wait_for(10), 13);
        assert_eq!(max_wait_for(11), 15);
    }

    #[test]
    fn picked_items_respect_the_limit_and_exist() {
        let catalog = catalog();
        for order_id in 1..50 {
            let items = pick_items(order_id, 2, &catalog, 4);
            assert!((1..=4).contains(&items.len()));
            assert!(items.iter().all(|id| catalog.get(*id).is_some()));
            assert_eq!(items, pick_items(order_id, 2, &catalog, 4));
        }
    }

    #[test]
    fn only_one_order_at_a_time() {
        let mut t = table(0);
        let first = t.place_order().unwrap().expect("free table orders");
        assert_eq!(first.order_id, 1);
        assert_eq!(first.table_id, 0);
        assert!(first.max_wait >= 1);
        assert!((1..=MAX_PRIORITY).contains(&first.priority));
        assert!(t.place_order().unwrap().is_none());
    }

    #[test]
    fn empty_catalog_never_orders() {
        let mut t = Table::new(
            0,
            Arc::new(IdAllocator::new()),
            Arc::new(ItemCatalog::default()),
            Arc::new(Configuration::new(1, 1, 1)),
        );
        assert!(t.place_order().unwrap().is_none());
    }

    #[test]
    fn exhausted_allocator_is_an_error() {
        let mut t = Table::new(
            0,
            Arc::new(IdAllocator::starting_at(u64::MAX)),
            catalog(),
            Arc::new(Configuration::new(1, 1, 1)),
        );
        assert!(t.place_order().is_err());
    }

    #[test]
    fn matching_delivery_is_rated_and_frees_the_table() {
        let rating = Arc::new(RatingSystem::new());
        let mut t = table(0);
        t.set_rating_system(rating.clone());

        let order = t.place_order().unwrap().unwrap();
        let mut stray = order.clone();
        stray.order_id += 100;
        t.serve(Delivery { order: stray, cooking_time: Duration::ZERO });
        assert!(t.is_waiting());
        assert_eq!(rating.count(), 0);

        t.serve(Delivery { order, cooking_time: Duration::ZERO });
        assert!(!t.is_waiting());
        assert_eq!(rating.count(), 1);
    }

    #[tokio::test]
    async fn answers_order_requests_through_its_mailbox() {
        let handle = spawn_actor(table(3), 4);
        let (reply, rx) = oneshot::channel();
        handle.addr.send(TableMsg::RequestOrder { reply }).await.unwrap();
        let order = rx.await.unwrap().expect("order");
        assert_eq!(order.table_id, 3);
        assert_eq!(order.waiter_id, None);
    }
}
