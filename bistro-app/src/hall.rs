//! Bootstrap and lifecycle of the dining hall.
//!
//! `Loading → Assembling → Running → ShuttingDown → Terminated`, with
//! `Loading → Terminated` when either input file cannot be loaded.
use anyhow::Result;
use bistro_actors::Service;
use bistro_actors::application::Application;
use bistro_actors::builder::Builder;
use bistro_actors::ids::IdAllocator;
use bistro_actors::ordering::{FoodOrderingController, OrderLedger, Registration, register};
use bistro_actors::pool::ActorPool;
use bistro_actors::rating::RatingSystem;
use bistro_actors::registry::DistributionRegistry;
use bistro_actors::system::DrainReport;
use bistro_config::{
    CONFIGURATION_PATH, Configuration, ITEMS_PATH, ItemCatalog, LoadError, load_configuration,
    load_item_catalog,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Assembling,
    Running,
    ShuttingDown,
    Terminated,
}

fn enter(phase: Phase) {
    tracing::info!(phase = ?phase, "hall.phase");
}

/// Where the two input files live.
#[derive(Debug, Clone)]
pub struct Paths {
    pub configuration: PathBuf,
    pub items: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            configuration: CONFIGURATION_PATH.into(),
            items: ITEMS_PATH.into(),
        }
    }
}

/// Load the configuration, then the catalog. Nothing else exists yet.
pub fn load(paths: &Paths) -> Result<(Configuration, ItemCatalog), LoadError> {
    let config = load_configuration(&paths.configuration)?;
    let catalog = load_item_catalog(&paths.items)?;
    tracing::info!(
        tables = config.table_count,
        waiters = config.waiter_count,
        items = catalog.len(),
        time_unit = ?config.time_unit(),
        "hall.loaded"
    );
    Ok((config, catalog))
}

/// Everything built during assembly, wired but not yet running.
pub struct Assembly {
    pub config: Arc<Configuration>,
    pub pool: ActorPool,
    pub registry: Arc<DistributionRegistry>,
    pub rating: Arc<RatingSystem>,
    pub ordering: Arc<FoodOrderingController>,
    pub application: Arc<Application>,
    pub registration: Registration,
}

/// Build the pools, assign tables to waiters and publish the registry.
///
/// Fails when tables are configured without any waiter.
pub fn assemble(config: Configuration, catalog: ItemCatalog) -> Result<Assembly> {
    let config = Arc::new(config);
    let catalog = Arc::new(catalog);
    let ids = Arc::new(IdAllocator::new());

    let mut pool = ActorPool::build(config.clone(), ids.clone(), catalog.clone());
    pool.assign()?;
    let registry = Arc::new(DistributionRegistry::new());
    pool.publish(&registry)?;

    let (ordering, intake) = FoodOrderingController::new(ids, config.clone(), Arc::new(OrderLedger::new()));
    let ordering = Arc::new(ordering);
    pool.attach_controller(&ordering);
    let registration = register(&config, &catalog);

    let application = Arc::new(Application::new(
        config.clone(),
        catalog,
        intake,
        registry.clone(),
        ordering.clone(),
    ));

    Ok(Assembly {
        config,
        pool,
        registry,
        rating: Arc::new(RatingSystem::new()),
        ordering,
        application,
        registration,
    })
}

/// Starts every table, waiter and the top-level service, then tears them
/// down again once told to stop.
pub struct LifecycleCoordinator<S: Service> {
    phase: Phase,
    builder: Builder,
    pool: Option<ActorPool>,
    rating: Arc<RatingSystem>,
    service: Arc<S>,
    service_task: Option<JoinHandle<Result<()>>>,
}

impl<S: Service> LifecycleCoordinator<S> {
    pub fn new(
        pool: ActorPool,
        rating: Arc<RatingSystem>,
        service: Arc<S>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            phase: Phase::Assembling,
            builder: Builder::with_cancellation(cancel),
            pool: Some(pool),
            rating,
            service,
            service_task: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!(from = ?self.phase, to = ?next, "hall.transition");
        self.phase = next;
        enter(next);
    }

    /// Attach the rating aggregator to every table, then start the tables,
    /// the waiters and the service. A pool whose tables cannot be assigned
    /// starts nothing and ends the lifecycle.
    pub fn launch(&mut self) -> Result<()> {
        let Some(mut pool) = self.pool.take() else {
            return Ok(());
        };
        pool.attach_rating(&self.rating);
        if let Err(e) = pool.launch(&mut self.builder) {
            self.transition(Phase::Terminated);
            return Err(e.into());
        }

        let service = self.service.clone();
        let cancel = self.builder.cancellation();
        self.service_task = Some(tokio::spawn(async move { service.start(cancel).await }));
        self.transition(Phase::Running);
        Ok(())
    }

    /// Launch, wait for `signal` (or external cancellation), then shut down.
    ///
    /// A failing `signal` still shuts everything down before its error is
    /// returned.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<DrainReport>
    where
        F: Future<Output = Result<()>>,
    {
        self.launch()?;
        let cancel = self.builder.cancellation();
        let stopped = tokio::select! {
            res = signal => res.inspect(|_| tracing::info!("hall.stop_requested")),
            _ = cancel.cancelled() => {
                tracing::info!("hall.cancelled");
                Ok(())
            }
        };
        let report = self.shutdown().await;
        match stopped {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::error!(
                    error = %format!("{e:#}"),
                    finished = report.finished,
                    failed = report.failed,
                    "hall.stop_signal_failed"
                );
                Err(e)
            }
        }
    }

    /// Cancel every unit, stop the service, then wait for all tracked tasks.
    ///
    /// Only the first call does anything.
    pub async fn shutdown(&mut self) -> DrainReport {
        if matches!(self.phase, Phase::ShuttingDown | Phase::Terminated) {
            return DrainReport::default();
        }
        self.transition(Phase::ShuttingDown);
        let builder = std::mem::take(&mut self.builder);
        builder.cancellation().cancel();

        if let Err(e) = self.service.shutdown().await {
            tracing::warn!(error = ?e, "hall.service_shutdown_failed");
        }

        let mut service = DrainReport::default();
        if let Some(task) = self.service_task.take() {
            match task.await {
                Ok(Ok(())) => service.finished += 1,
                Ok(Err(e)) => {
                    service.failed += 1;
                    tracing::warn!(error = ?e, "hall.service_failed");
                }
                Err(e) => {
                    service.failed += 1;
                    tracing::warn!(error = %e, "hall.service_panicked");
                }
            }
        }

        let actors = builder.graceful_shutdown().await;
        self.transition(Phase::Terminated);
        DrainReport {
            finished: actors.finished + service.finished,
            failed: actors.failed + service.failed,
        }
    }
}

/// The whole life of the process, from loading to the final drain.
pub async fn run<F>(paths: &Paths, cancel: CancellationToken, signal: F) -> Result<DrainReport>
where
    F: Future<Output = Result<()>>,
{
    enter(Phase::Loading);
    let (config, catalog) = load(paths).inspect_err(|_| enter(Phase::Terminated))?;

    enter(Phase::Assembling);
    let assembly = assemble(config, catalog).inspect_err(|_| enter(Phase::Terminated))?;
    let Assembly {
        config,
        pool,
        registry,
        rating,
        ordering,
        application,
        registration,
    } = assembly;
    tracing::info!(
        restaurant = %registration.restaurant_name,
        tables = config.table_count,
        waiters = registry.waiters().len(),
        "hall.assembled"
    );

    let mut coordinator = LifecycleCoordinator::new(pool, rating.clone(), application.clone(), cancel);
    let outcome = coordinator.run_until(signal).await;
    tracing::info!(
        phase = ?coordinator.phase(),
        served = application.served(),
        in_flight = ordering.ledger().len(),
        ratings = rating.count(),
        average = ?rating.average(),
        "hall.closed"
    );
    outcome
}
