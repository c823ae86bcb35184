use crate::actor::{Actor, ActorHandle, Addr, Reserved};
use crate::system::{ActorSystem, DrainReport};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Starts actors and helper tasks against one shared [`ActorSystem`].
///
/// Every task started here is bound to the system's cancellation token and
/// joined by [`Builder::graceful_shutdown`].
pub struct Builder {
    sys: ActorSystem,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            sys: ActorSystem::with_cancellation(cancel),
        }
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.sys.cancellation()
    }

    /// Start a previously reserved actor and track its task.
    pub fn start_reserved<A: Actor>(&mut self, r: Reserved<A>, actor: A) -> Addr<A> {
        let ActorHandle { addr, task } = r.start_with_shutdown(actor, Some(self.sys.cancellation()));
        self.sys.track(async move { task.await? });
        addr
    }

    /// Send `make()` to `addr` every `period` until cancellation.
    ///
    /// Ticks that find the mailbox full are dropped rather than queued.
    pub fn spawn_ticker<A, F>(&mut self, addr: Addr<A>, period: Duration, make: F)
    where
        A: Actor,
        F: Fn() -> A::Msg + Send + 'static,
    {
        let cancel = self.sys.cancellation();
        self.sys.track(async move {
            let mut interval = time::interval(period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if addr.is_closed() {
                            break;
                        }
                        let _ = addr.try_send(make());
                    }
                }
            }
            Ok(())
        });
    }

    /// Number of tasks still tracked.
    pub fn len(&self) -> usize {
        self.sys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sys.is_empty()
    }

    pub async fn graceful_shutdown(self) -> DrainReport {
        self.sys.graceful_shutdown().await
    }
}
