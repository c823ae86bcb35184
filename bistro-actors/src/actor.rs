use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Minimal actor trait. `Self: Sized` avoids object-safety issues when using `Context<Self>`.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

/// Runtime context for an actor instance.
///
/// Holds only a weak reference to the actor's own mailbox so that dropping
/// every external [`Addr`] still closes it.
pub struct Context<A: Actor> {
    me: mpsc::WeakSender<A::Msg>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// This actor's `Addr`, if anyone outside still holds one.
    pub fn addr(&self) -> Option<Addr<A>> {
        self.me.upgrade().map(Addr)
    }

    /// Request a graceful stop after processing the current message.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use bistro_actors::actor::{self, Actor, Context};
    /// # struct StopOnSecond(u8);
    /// # #[async_trait]
    /// # impl Actor for StopOnSecond {
    /// #     type Msg = u8;
    /// #     async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
    /// #         self.0 += msg;
    /// #         if self.0 >= 2 {
    /// #             ctx.stop();
    /// #         }
    /// #         Ok(())
    /// #     }
    /// # }
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let actor::ActorHandle { addr, task } = actor::spawn_actor(StopOnSecond(0), 4);
    ///     addr.send(1).await.unwrap();
    ///     addr.send(1).await.unwrap();
    ///     task.await.unwrap().unwrap();
    /// });
    /// ```
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Address for sending messages to an actor.
pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

/// Manual Clone to avoid unnecessary bounds on `A`/`A::Msg`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> std::fmt::Debug for Addr<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Addr")
            .field("actor", &std::any::type_name::<A>())
            .field("closed", &self.0.is_closed())
            .finish()
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the message if the actor is gone.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// Try to send without waiting. Returns the message if the mailbox is full or closed.
    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Handle to a running actor task.
pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Spawn an actor with a bounded mailbox and no external cancellation.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - every `Addr` is dropped
/// - `ctx.stop()` is called
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use bistro_actors::actor::{self, Actor, Context};
/// # struct Accumulator(u8);
/// # #[async_trait]
/// # impl Actor for Accumulator {
/// #     type Msg = u8;
/// #     async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
/// #         self.0 += msg;
/// #         Ok(())
/// #     }
/// # }
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Accumulator(0), 8);
///     addr.send(2).await.unwrap();
///     addr.send(3).await.unwrap();
///     drop(addr);
///     task.await.unwrap().unwrap();
/// });
/// ```
pub fn spawn_actor<A: Actor>(actor: A, capacity: usize) -> ActorHandle<A> {
    spawn_actor_with_shutdown(actor, capacity, None)
}

/// Like [`spawn_actor`], additionally stopping once `shutdown` is cancelled.
pub fn spawn_actor_with_shutdown<A: Actor>(
    actor: A,
    capacity: usize,
    shutdown: Option<CancellationToken>,
) -> ActorHandle<A> {
    spawn_actor_reserved::<A>(std::any::type_name::<A>(), capacity).start_with_shutdown(actor, shutdown)
}

async fn drive<A: Actor>(
    name: String,
    mut actor: A,
    mut rx: mpsc::Receiver<A::Msg>,
    me: mpsc::WeakSender<A::Msg>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut ctx = Context { me, stop: false };
    tracing::debug!(actor = %name, "actor.started");

    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            maybe_msg = rx.recv() => match maybe_msg {
                Some(msg) => msg,
                None => break,
            },
        };
        if let Err(e) = actor.handle(msg, &mut ctx).await {
            tracing::error!(actor = %name, error = ?e, "actor returned error; stopping");
            return Err(e);
        }
        if ctx.stop {
            break;
        }
    }

    tracing::debug!(actor = %name, "actor.stopped");
    Ok(())
}

/// Reserved spawn: create mailbox+addr now; start the task later.
///
/// The dining hall reserves every table before any waiter exists so that
/// waiters can be handed table addresses while nothing is running yet.
pub struct Reserved<A: Actor> {
    name: String,
    addr: Addr<A>,
    rx: mpsc::Receiver<A::Msg>,
}

impl<A: Actor> Reserved<A> {
    pub fn addr(&self) -> Addr<A> {
        self.addr.clone()
    }

    /// Pull a queued message straight out of the unstarted mailbox.
    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<A::Msg> {
        self.rx.recv().await
    }

    /// Start the actor task using the reserved mailbox.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use bistro_actors::actor::{self, Actor, Context};
    /// # struct Echo;
    /// # #[async_trait]
    /// # impl Actor for Echo {
    /// #     type Msg = &'static str;
    /// #     async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
    /// #         assert_eq!(msg, "ping");
    /// #         ctx.stop();
    /// #         Ok(())
    /// #     }
    /// # }
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let reserved = actor::spawn_actor_reserved::<Echo>("echo", 4);
    ///     let addr = reserved.addr();
    ///     addr.try_send("ping").unwrap(); // queued before the task exists
    ///     let handle = reserved.start(Echo);
    ///     handle.task.await.unwrap().unwrap();
    /// });
    /// ```
    pub fn start(self, actor: A) -> ActorHandle<A> {
        self.start_with_shutdown(actor, None)
    }

    pub fn start_with_shutdown(self, actor: A, shutdown: Option<CancellationToken>) -> ActorHandle<A> {
        let Reserved { name, addr, rx } = self;
        let me = addr.0.downgrade();
        let task = tokio::spawn(drive(name, actor, rx, me, shutdown.unwrap_or_default()));
        ActorHandle { addr, task }
    }
}

/// Factory for reservation.
pub fn spawn_actor_reserved<A: Actor>(name: impl Into<String>, capacity: usize) -> Reserved<A> {
    let (tx, rx) = mpsc::channel::<A::Msg>(capacity);
    Reserved {
        name: name.into(),
        addr: Addr(tx),
        rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Counter {
        seen: u32,
        report: Option<tokio::sync::oneshot::Sender<u32>>,
    }

    #[async_trait::async_trait]
    impl Actor for Counter {
        type Msg = u32;

        async fn handle(&mut self, msg: u32, _ctx: &mut Context<Self>) -> Result<()> {
            anyhow::ensure!(msg != 0, "zero is not allowed");
            self.seen += msg;
            Ok(())
        }
    }

    impl Drop for Counter {
        fn drop(&mut self) {
            if let Some(tx) = self.report.take() {
                let _ = tx.send(self.seen);
            }
        }
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_actor() {
        let token = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let actor = Counter { seen: 0, report: Some(tx) };
        let ActorHandle { addr, task } = spawn_actor_with_shutdown(actor, 4, Some(token.clone()));

        addr.send(5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        task.await.unwrap().unwrap();
        assert_eq!(rx.await.unwrap(), 5);
        assert!(addr.is_closed());
    }

    #[tokio::test]
    async fn handler_error_stops_the_actor() {
        let actor = Counter { seen: 0, report: None };
        let ActorHandle { addr, task } = spawn_actor(actor, 4);
        addr.send(0).await.unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("zero"));
    }

    #[tokio::test]
    async fn dropping_every_addr_closes_the_mailbox() {
        let actor = Counter { seen: 0, report: None };
        let ActorHandle { addr, task } = spawn_actor(actor, 1);
        drop(addr);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("actor should stop once its mailbox closes")
            .unwrap()
            .unwrap();
    }
}
