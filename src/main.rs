use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use job_tracker::config::TrackerConfig;
use job_tracker::llm::create_provider;
use job_tracker::mail::GmailClient;
use job_tracker::pipeline::{PollDriver, PollSettings, spawn_poll_scheduler};
use job_tracker::store::{Database, LibSqlBackend};

/// Console logging always; a daily-rolling file too when `log_dir` is set.
/// The returned guard must live as long as logging should flush.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "job-tracker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("Job Tracker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   User: {}", config.user_id);
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Services ─────────────────────────────────────────────────────────
    let gmail = GmailClient::from_store(db.as_ref(), &config.user_id, config.google.clone())
        .await
        .context("cannot read mailbox")?;
    let llm = create_provider(&config.llm)?;

    let driver = PollDriver::new(
        Arc::clone(&db),
        Arc::new(gmail),
        llm,
        config.user_id.clone(),
        PollSettings::from_config(&config),
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    match config.poll_interval {
        None => {
            let report = driver.run_once().await?;
            eprintln!(
                "   Done: {} seen, {} reconciled, {} skipped as processed",
                report.seen, report.reconciled, report.already_claimed
            );
        }
        Some(every) => {
            eprintln!("   Polling every {}s. Ctrl-C to stop.\n", every.as_secs());
            let (handle, shutdown) = spawn_poll_scheduler(Arc::new(driver), every);
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            shutdown.store(true, Ordering::Relaxed);
            handle.abort();
            tracing::info!("Stopped");
        }
    }

    Ok(())
}
