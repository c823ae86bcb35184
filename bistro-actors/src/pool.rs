//! Construction of the fixed table and waiter pools, round-robin assignment
//! of tables to waiters, and their launch.
//!
//! Every step before [`ActorPool::launch`] is single-threaded setup: mailboxes
//! are reserved up front so waiters can be handed table addresses, and the
//! registry is published while nothing is running yet.
use crate::actor::{spawn_actor_reserved, Reserved};
use crate::builder::Builder;
use crate::ids::IdAllocator;
use crate::ordering::FoodOrderingController;
use crate::rating::RatingSystem;
use crate::registry::{DistributionRegistry, RegistryError, WaiterRef};
use crate::table::Table;
use crate::waiter::{TableRef, Waiter};
use crate::{TableId, WaiterId, WaiterMsg};
use bistro_config::{Configuration, ItemCatalog};
use std::sync::Arc;

pub const TABLE_MAILBOX: usize = 16;
pub const WAITER_MAILBOX: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("{tables} tables configured but no waiters to serve them")]
    NoWaiters { tables: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Assign(#[from] AssignError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Which tables each waiter serves: table `i` goes to waiter `i mod waiters`.
///
/// ```
/// use bistro_actors::pool::round_robin;
///
/// assert_eq!(round_robin(4, 2).unwrap(), vec![vec![0, 2], vec![1, 3]]);
/// assert_eq!(round_robin(0, 0).unwrap(), Vec::<Vec<usize>>::new());
/// assert!(round_robin(1, 0).is_err());
/// ```
pub fn round_robin(tables: usize, waiters: usize) -> Result<Vec<Vec<TableId>>, AssignError> {
    if tables > 0 && waiters == 0 {
        return Err(AssignError::NoWaiters { tables });
    }
    let mut out = vec![Vec::with_capacity(tables.div_ceil(waiters.max(1))); waiters];
    for table in 0..tables {
        out[table % waiters].push(table);
    }
    Ok(out)
}

struct PooledTable {
    table: Table,
    mailbox: Reserved<Table>,
}

struct PooledWaiter {
    waiter: Waiter,
    mailbox: Reserved<Waiter>,
}

pub struct ActorPool {
    config: Arc<Configuration>,
    tables: Vec<PooledTable>,
    waiters: Vec<PooledWaiter>,
    assigned: bool,
}

impl ActorPool {
    /// Construct `TableCount` tables and `WaiterCount` waiters, in index order.
    pub fn build(config: Arc<Configuration>, ids: Arc<IdAllocator>, catalog: Arc<ItemCatalog>) -> Self {
        let tables = (0..config.table_count)
            .map(|i| PooledTable {
                table: Table::new(i, ids.clone(), catalog.clone(), config.clone()),
                mailbox: spawn_actor_reserved(format!("table-{i}"), TABLE_MAILBOX),
            })
            .collect();
        let waiters = (0..config.waiter_count)
            .map(|j| PooledWaiter {
                waiter: Waiter::new(j, config.clone()),
                mailbox: spawn_actor_reserved(format!("waiter-{j}"), WAITER_MAILBOX),
            })
            .collect();
        tracing::debug!(tables = config.table_count, waiters = config.waiter_count, "pool.built");
        Self {
            config,
            tables,
            waiters,
            assigned: false,
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Tables served by waiter `id`, in the order they were assigned.
    pub fn tables_of(&self, id: WaiterId) -> Option<Vec<TableId>> {
        self.waiters.get(id).map(|w| w.waiter.table_ids())
    }

    /// Hand every table to its round-robin waiter. Idempotent.
    pub fn assign(&mut self) -> Result<(), AssignError> {
        if self.assigned {
            return Ok(());
        }
        let plan = round_robin(self.tables.len(), self.waiters.len())?;
        for (waiter, tables) in self.waiters.iter_mut().zip(plan) {
            for id in tables {
                let addr = self.tables[id].mailbox.addr();
                waiter.waiter.add_table(TableRef { id, addr });
            }
            tracing::debug!(waiter = waiter.waiter.id(), tables = ?waiter.waiter.table_ids(), "pool.assigned");
        }
        self.assigned = true;
        Ok(())
    }

    /// Publish the waiter set, assigning tables first if that has not happened yet.
    pub fn publish(&mut self, registry: &DistributionRegistry) -> Result<(), PoolError> {
        self.assign()?;
        let refs = self
            .waiters
            .iter()
            .map(|w| WaiterRef {
                id: w.waiter.id(),
                addr: w.mailbox.addr(),
                tables: w.waiter.table_ids(),
            })
            .collect();
        registry.publish(refs)?;
        Ok(())
    }

    pub fn attach_rating(&mut self, rating: &Arc<RatingSystem>) {
        for t in &mut self.tables {
            t.table.set_rating_system(rating.clone());
        }
    }

    pub fn attach_controller(&mut self, ordering: &Arc<FoodOrderingController>) {
        for w in &mut self.waiters {
            w.waiter.set_ordering_controller(ordering.clone());
        }
    }

    /// Start every table, then every waiter and its ticker. Tables are
    /// assigned first if that has not happened yet, so no waiter starts
    /// without its tables.
    pub fn launch(mut self, builder: &mut Builder) -> Result<(), AssignError> {
        self.assign()?;
        let tick = self.config.time_unit();
        let (tables, waiters) = (self.tables.len(), self.waiters.len());
        for PooledTable { table, mailbox } in self.tables {
            builder.start_reserved(mailbox, table);
        }
        for PooledWaiter { waiter, mailbox } in self.waiters {
            let addr = builder.start_reserved(mailbox, waiter);
            builder.spawn_ticker(addr, tick, || WaiterMsg::Tick);
        }
        tracing::info!(tables, waiters, ?tick, "pool.launched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(tables: usize, waiters: usize) -> ActorPool {
        ActorPool::build(
            Arc::new(Configuration::new(tables, waiters, 1)),
            Arc::new(IdAllocator::new()),
            Arc::new(ItemCatalog::default()),
        )
    }

    #[test]
    fn round_robin_is_balanced_and_exhaustive() {
        for waiters in 1..7 {
            for tables in 0..40 {
                let plan = round_robin(tables, waiters).unwrap();
                assert_eq!(plan.len(), waiters);
                for (w, owned) in plan.iter().enumerate() {
                    assert!(owned.iter().all(|t| t % waiters == w));
                }
                let sizes: Vec<_> = plan.iter().map(Vec::len).collect();
                let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
                assert!(max - min <= 1);
                assert_eq!(sizes.iter().sum::<usize>(), tables);
            }
        }
    }

    #[test]
    fn tables_without_waiters_is_an_error() {
        assert_eq!(round_robin(3, 0), Err(AssignError::NoWaiters { tables: 3 }));
        let mut p = pool(3, 0);
        assert_eq!(p.assign(), Err(AssignError::NoWaiters { tables: 3 }));
    }

    #[test]
    fn four_tables_two_waiters() {
        let mut p = pool(4, 2);
        assert_eq!((p.table_count(), p.waiter_count()), (4, 2));
        p.assign().unwrap();
        p.assign().unwrap();
        assert_eq!(p.tables_of(0), Some(vec![0, 2]));
        assert_eq!(p.tables_of(1), Some(vec![1, 3]));
        assert_eq!(p.tables_of(2), None);
    }

    #[test]
    fn published_registry_mirrors_the_assignment() {
        let mut p = pool(5, 2);
        p.assign().unwrap();
        let registry = DistributionRegistry::new();
        p.publish(&registry).unwrap();
        assert_eq!(registry.waiter_for_table(4).map(|w| w.id), Some(0));
        assert_eq!(registry.waiters()[1].tables, vec![1, 3]);
        assert_eq!(
            p.publish(&registry),
            Err(PoolError::Registry(RegistryError::AlreadyPublished))
        );
    }

    #[test]
    fn publishing_an_unassigned_pool_assigns_it_first() {
        let mut p = pool(4, 2);
        let registry = DistributionRegistry::new();
        p.publish(&registry).unwrap();
        assert_eq!(registry.waiters()[0].tables, vec![0, 2]);
        assert_eq!(registry.waiter_for_table(2).map(|w| w.id), Some(0));
        assert_eq!(p.tables_of(1), Some(vec![1, 3]));

        let mut stranded = pool(2, 0);
        let registry = DistributionRegistry::new();
        assert_eq!(
            stranded.publish(&registry),
            Err(PoolError::Assign(AssignError::NoWaiters { tables: 2 }))
        );
        assert!(!registry.is_published());
    }

    #[test]
    fn empty_pool_is_fine() {
        let mut p = pool(0, 0);
        p.assign().unwrap();
        let registry = DistributionRegistry::new();
        p.publish(&registry).unwrap();
        assert!(registry.is_published());
        assert!(registry.waiters().is_empty());
    }

    #[tokio::test]
    async fn launch_tracks_tables_waiters_and_tickers() {
        let mut p = pool(3, 2);
        p.assign().unwrap();
        let mut b = Builder::new();
        p.launch(&mut b).unwrap();
        assert_eq!(b.len(), 3 + 2 * 2);
        let report = b.graceful_shutdown().await;
        assert_eq!(report.finished, 7);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn launching_an_unassigned_pool_gives_every_waiter_its_tables() {
        let p = pool(2, 1);
        let mut b = Builder::new();
        p.launch(&mut b).unwrap();
        assert_eq!(b.len(), 2 + 2);
        let report = b.graceful_shutdown().await;
        assert_eq!(report.failed, 0);

        let mut b = Builder::new();
        assert_eq!(pool(2, 0).launch(&mut b), Err(AssignError::NoWaiters { tables: 2 }));
        assert!(b.is_empty());
    }
}
