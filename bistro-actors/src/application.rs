//! The kitchen-side application service: takes orders off the intake queue,
//! cooks them, and hands each finished order back to the waiter that owns
//! the table.
use crate::ordering::FoodOrderingController;
use crate::registry::DistributionRegistry;
use crate::{Delivery, Order, Service, WaiterMsg};
use anyhow::Result;
use bistro_config::{Configuration, ItemCatalog};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct Kitchen {
    config: Arc<Configuration>,
    catalog: Arc<ItemCatalog>,
    registry: Arc<DistributionRegistry>,
    ordering: Arc<FoodOrderingController>,
    served: Arc<AtomicU64>,
}

impl Kitchen {
    fn cooking_time(&self, order: &Order) -> Duration {
        let longest = order
            .items
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .map(|item| item.preparation_time)
            .max()
            .unwrap_or(0);
        self.config.time_units(longest)
    }

    async fn cook(self, order: Order, stop: CancellationToken) {
        let order_id = order.order_id;
        let cooking_time = self.cooking_time(&order);
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(cooking_time) => {}
        }

        let Some(order) = self.ordering.deliver(order_id) else {
            tracing::warn!(order_id, "application.order_not_in_ledger");
            return;
        };
        let table = order.table_id;
        let Some(waiter) = self.registry.waiter_for_table(table) else {
            tracing::warn!(order_id, table, "application.no_waiter_for_table");
            return;
        };
        let (waiter_id, addr) = (waiter.id, waiter.addr.clone());
        let delivery = Delivery { order, cooking_time };
        tokio::select! {
            _ = stop.cancelled() => {}
            res = addr.send(WaiterMsg::Deliver(delivery)) => match res {
                Ok(()) => {
                    self.served.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(order_id, table, waiter = waiter_id, ?cooking_time, "application.order_ready");
                }
                Err(_) => tracing::debug!(order_id, table, waiter = waiter_id, "application.waiter_gone"),
            }
        }
    }
}

pub struct Application {
    kitchen: Kitchen,
    intake: Mutex<Option<mpsc::Receiver<Order>>>,
    stop: CancellationToken,
    running: Mutex<()>,
}

impl Application {
    pub fn new(
        config: Arc<Configuration>,
        catalog: Arc<ItemCatalog>,
        intake: mpsc::Receiver<Order>,
        registry: Arc<DistributionRegistry>,
        ordering: Arc<FoodOrderingController>,
    ) -> Self {
        Self {
            kitchen: Kitchen {
                config,
                catalog,
                registry,
                ordering,
                served: Arc::new(AtomicU64::new(0)),
            },
            intake: Mutex::new(Some(intake)),
            stop: CancellationToken::new(),
            running: Mutex::new(()),
        }
    }

    /// Orders cooked and handed to a waiter so far.
    pub fn served(&self) -> u64 {
        self.kitchen.served.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Service for Application {
    /// Run the kitchen until `cancel` fires or [`shutdown`](Service::shutdown)
    /// is called. Can only be started once. Starting after shutdown returns
    /// immediately.
    async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let _running = self.running.lock().await;
        let Some(mut intake) = self.intake.lock().await.take() else {
            if self.stop.is_cancelled() {
                tracing::debug!("application.start_after_shutdown");
                return Ok(());
            }
            anyhow::bail!("application already started");
        };
        let run = self.stop.child_token();
        let mut cooking = JoinSet::new();
        tracing::info!(restaurant = %self.kitchen.config.restaurant_name, "application.started");

        loop {
            tokio::select! {
                biased;
                _ = run.cancelled() => break,
                _ = cancel.cancelled() => break,
                Some(res) = cooking.join_next(), if !cooking.is_empty() => {
                    if let Err(e) = res {
                        tracing::warn!(error = %e, "application.cook_panicked");
                    }
                }
                order = intake.recv() => match order {
                    Some(order) => {
                        tracing::debug!(order_id = order.order_id, table = order.table_id, "application.order_received");
                        cooking.spawn(self.kitchen.clone().cook(order, run.clone()));
                    }
                    None => break,
                },
            }
        }

        run.cancel();
        intake.close();
        while cooking.join_next().await.is_some() {}
        tracing::info!(
            served = self.served(),
            in_flight = self.kitchen.ordering.ledger().len(),
            "application.stopped"
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.stop.cancel();
        let _idle = self.running.lock().await;
        // Never started: close the intake so waiters stop submitting.
        self.intake.lock().await.take();
        tracing::debug!("application.shutdown_complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_actor_reserved;
    use crate::ids::IdAllocator;
    use crate::ordering::{OrderLedger, OrderingError};
    use crate::registry::WaiterRef;
    use crate::waiter::Waiter;
    use bistro_config::Item;

    fn order(id: u64, table: usize) -> Order {
        Order {
            order_id: id,
            table_id: table,
            waiter_id: Some(0),
            items: vec![1],
            priority: 5,
            max_wait: 3,
            picked_up_at: None,
        }
    }

    fn controller(config: &Arc<Configuration>) -> (Arc<IdAllocator>, Arc<FoodOrderingController>, mpsc::Receiver<Order>) {
        let ids = Arc::new(IdAllocator::new());
        let (ordering, rx) = FoodOrderingController::new(ids.clone(), config.clone(), Arc::new(OrderLedger::new()));
        (ids, Arc::new(ordering), rx)
    }

    fn idle_application() -> (Arc<IdAllocator>, Arc<FoodOrderingController>, Application) {
        let config = Arc::new(Configuration::new(0, 0, 1));
        let (ids, ordering, rx) = controller(&config);
        let app = Application::new(
            config,
            Arc::new(ItemCatalog::default()),
            rx,
            Arc::new(DistributionRegistry::new()),
            ordering.clone(),
        );
        (ids, ordering, app)
    }

    #[tokio::test]
    async fn cooked_orders_go_to_the_owning_waiter() {
        let config = Arc::new(Configuration::new(1, 1, 1));
        let catalog = Arc::new(ItemCatalog::new(vec![Item {
            id: 1,
            name: "toast".into(),
            preparation_time: 2,
            complexity: 1,
            cooking_apparatus: None,
        }]));
        let mut waiter_rx = spawn_actor_reserved::<Waiter>("waiter-0", 4);
        let registry = Arc::new(DistributionRegistry::new());
        registry
            .publish(vec![WaiterRef { id: 0, addr: waiter_rx.addr(), tables: vec![0] }])
            .unwrap();
        let (ids, ordering, rx) = controller(&config);

        let app = Arc::new(Application::new(config, catalog, rx, registry, ordering.clone()));
        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let app = app.clone();
            let cancel = cancel.clone();
            async move { app.start(cancel).await }
        });

        ordering.submit(order(ids.next_id().unwrap(), 0)).await.unwrap();
        let msg = tokio::time::timeout(Duration::from_secs(1), waiter_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match msg {
            WaiterMsg::Deliver(d) => {
                assert_eq!(d.order.order_id, 1);
                assert_eq!(d.cooking_time, Duration::from_millis(2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(ordering.ledger().is_empty());

        app.shutdown().await.unwrap();
        run.await.unwrap().unwrap();
        assert_eq!(app.served(), 1);
        let late = order(ids.next_id().unwrap(), 0);
        assert_eq!(ordering.submit(late).await, Err(OrderingError::Closed));
        assert!(ordering.ledger().is_empty());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_stops_the_kitchen_and_start_is_single_use() {
        let (_ids, _ordering, app) = idle_application();
        let cancel = CancellationToken::new();
        cancel.cancel();
        app.start(cancel.clone()).await.unwrap();
        assert!(app.start(cancel).await.is_err());
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_racing_a_fresh_start_still_stops_the_kitchen() {
        let (ids, ordering, app) = idle_application();
        let app = Arc::new(app);
        let run = tokio::spawn({
            let app = app.clone();
            async move { app.start(CancellationToken::new()).await }
        });
        app.shutdown().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("start returns after shutdown")
            .unwrap()
            .unwrap();
        let order = order(ids.next_id().unwrap(), 0);
        assert_eq!(ordering.submit(order).await, Err(OrderingError::Closed));
    }

    #[tokio::test]
    async fn shutdown_before_start_closes_the_intake() {
        let (ids, ordering, app) = idle_application();
        app.shutdown().await.unwrap();
        let order = order(ids.next_id().unwrap(), 0);
        assert_eq!(ordering.submit(order).await, Err(OrderingError::Closed));
        app.start(CancellationToken::new()).await.unwrap();
    }
}
