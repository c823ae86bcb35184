use anyhow::Context;
use bistro_common::observability::{LogConfig, init_logging};
use bistro_runtime::BistroRuntime;
use std::process::ExitCode;
use std::time::Duration;

mod hall;
mod signals;

const RUNTIME_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    if let Err(e) = init_logging(LogConfig::default()) {
        eprintln!("bistro: logging unavailable: {e:#}");
    }

    let runtime = match BistroRuntime::build("bistro-worker", None) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = ?e, "bistro.runtime_failed");
            return ExitCode::FAILURE;
        }
    };
    let cancel = runtime.handle().cancellation();

    let signal = async {
        let signal = signals::wait_for_shutdown_signal()
            .await
            .context("installing shutdown signal handlers")?;
        tracing::info!(?signal, "bistro.signal");
        anyhow::Ok(())
    };
    let result = runtime.block_on(hall::run(&hall::Paths::default(), cancel, signal));
    runtime.shutdown(RUNTIME_GRACE);

    match result {
        Ok(report) => {
            tracing::info!(finished = report.finished, failed = report.failed, "bistro.exit");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "bistro.fatal");
            ExitCode::FAILURE
        }
    }
}
