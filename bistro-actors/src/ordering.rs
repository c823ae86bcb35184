//! Order intake between the waiters and the kitchen, and the restaurant's
//! menu registration.
//!
//! The [`FoodOrderingController`] is built once during assembly and shared
//! with every waiter. Accepted orders are recorded in the [`OrderLedger`]
//! and queued on a bounded channel drained by the application service.
use crate::ids::IdAllocator;
use crate::{Order, OrderId};
use bistro_config::{Configuration, ItemCatalog};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("order {0} was never issued")]
    UnknownOrder(OrderId),
    #[error("order {0} is already in flight")]
    Duplicate(OrderId),
    #[error("order intake is closed")]
    Closed,
}

/// In-flight orders keyed by id.
#[derive(Debug, Default)]
pub struct OrderLedger {
    orders: DashMap<OrderId, Order>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `order`, returning `false` if its id is already present.
    pub fn insert(&self, order: Order) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.orders.entry(order.order_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(order);
                true
            }
        }
    }

    pub fn remove(&self, order_id: OrderId) -> Option<Order> {
        self.orders.remove(&order_id).map(|(_, order)| order)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

pub struct FoodOrderingController {
    ids: Arc<IdAllocator>,
    ledger: Arc<OrderLedger>,
    intake: mpsc::Sender<Order>,
}

impl FoodOrderingController {
    /// Build the controller and the receiving end of its intake queue,
    /// sized by `OrderQueueCapacity`.
    pub fn new(
        ids: Arc<IdAllocator>,
        config: Arc<Configuration>,
        ledger: Arc<OrderLedger>,
    ) -> (Self, mpsc::Receiver<Order>) {
        let (intake, rx) = mpsc::channel(config.order_queue_capacity.max(1));
        (Self { ids, ledger, intake }, rx)
    }

    pub fn ledger(&self) -> &Arc<OrderLedger> {
        &self.ledger
    }

    /// Accept an order for the kitchen. Waits while the intake queue is full.
    pub async fn submit(&self, order: Order) -> Result<(), OrderingError> {
        let order_id = order.order_id;
        if !self.ids.issued(order_id) {
            return Err(OrderingError::UnknownOrder(order_id));
        }
        if !self.ledger.insert(order.clone()) {
            return Err(OrderingError::Duplicate(order_id));
        }
        if self.intake.send(order).await.is_err() {
            self.ledger.remove(order_id);
            return Err(OrderingError::Closed);
        }
        Ok(())
    }

    /// Close out a cooked order, returning it if it was in flight.
    pub fn deliver(&self, order_id: OrderId) -> Option<Order> {
        self.ledger.remove(order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub id: u32,
    pub name: String,
    pub preparation_time: u64,
    pub complexity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooking_apparatus: Option<String>,
}

/// What the dining hall announces about itself at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub restaurant_name: String,
    pub tables: usize,
    pub waiters: usize,
    pub item_count: usize,
    pub menu: Vec<MenuEntry>,
}

/// Build and log the restaurant's menu registration.
///
/// ```
/// use bistro_actors::ordering::register;
/// use bistro_config::{Configuration, ItemCatalog};
///
/// let config = Configuration::new(4, 2, 10);
/// let catalog = ItemCatalog::from_json_str(r#"[{ "id": 1, "name": "pizza", "preparation-time": 20 }]"#).unwrap();
/// let registration = register(&config, &catalog);
/// assert_eq!(registration.restaurant_name, "Dining Hall");
/// assert_eq!(registration.item_count, 1);
/// ```
pub fn register(config: &Configuration, catalog: &ItemCatalog) -> Registration {
    let registration = Registration {
        restaurant_name: config.restaurant_name.clone(),
        tables: config.table_count,
        waiters: config.waiter_count,
        item_count: catalog.len(),
        menu: catalog
            .iter()
            .map(|item| MenuEntry {
                id: item.id,
                name: item.name.clone(),
                preparation_time: item.preparation_time,
                complexity: item.complexity,
                cooking_apparatus: item.cooking_apparatus.clone(),
            })
            .collect(),
    };
    match serde_json::to_string(&registration) {
        Ok(json) => tracing::info!(
            restaurant = %registration.restaurant_name,
            items = registration.item_count,
            registration = %json,
            "ordering.registered"
        ),
        Err(e) => tracing::warn!(error = %e, "ordering.registration_not_serializable"),
    }
    registration
}
