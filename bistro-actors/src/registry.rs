use crate::actor::Addr;
use crate::waiter::Waiter;
use crate::{TableId, WaiterId};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("distribution registry was already published")]
    AlreadyPublished,
}

/// A published waiter together with the tables it serves.
#[derive(Clone, Debug)]
pub struct WaiterRef {
    pub id: WaiterId,
    pub addr: Addr<Waiter>,
    pub tables: Vec<TableId>,
}

#[derive(Debug)]
struct Directory {
    waiters: Vec<WaiterRef>,
    owner: HashMap<TableId, usize>,
}

/// Write-once directory of every waiter and the tables assigned to it.
///
/// Empty until [`publish`](Self::publish) succeeds; afterwards it is
/// read-only and safe to share across every task.
#[derive(Debug, Default)]
pub struct DistributionRegistry {
    inner: OnceLock<Directory>,
}

impl DistributionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, waiters: Vec<WaiterRef>) -> Result<(), RegistryError> {
        let mut built = None;
        self.inner.get_or_init(|| {
            let owner = waiters
                .iter()
                .enumerate()
                .flat_map(|(slot, w)| w.tables.iter().map(move |t| (*t, slot)))
                .collect();
            built = Some(());
            Directory { waiters, owner }
        });
        match built {
            Some(()) => {
                tracing::debug!(waiters = self.waiters().len(), "registry.published");
                Ok(())
            }
            None => Err(RegistryError::AlreadyPublished),
        }
    }

    pub fn is_published(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Every published waiter, in index order. Empty before publication.
    pub fn waiters(&self) -> &[WaiterRef] {
        self.inner.get().map(|d| d.waiters.as_slice()).unwrap_or(&[])
    }

    pub fn waiter_for_table(&self, table: TableId) -> Option<&WaiterRef> {
        let dir = self.inner.get()?;
        dir.owner.get(&table).map(|slot| &dir.waiters[*slot])
    }
}
