//! Cron-driven batch scheduling.
//!
//! Every scheduled tick runs the full batch of opted-in accounts,
//! sequentially, in fresh browser sessions. A tick that fires while a
//! batch is still running is skipped, not queued.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::browser::CdpSessionFactory;
use crate::engine;
use crate::AppState;

/// Schedule configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Enable the cron trigger
    pub enabled: bool,
    /// Six-field cron expression (seconds first)
    pub cron: String,
    /// Display timezone for operators reading the schedule. The cadence
    /// below one hour is timezone-invariant, so ticks run on UTC.
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 */5 * * * *".to_string(),
            timezone: "Africa/Johannesburg".to_string(),
        }
    }
}

/// Start the cron scheduler. Returns the running scheduler handle, or
/// `None` when scheduling is disabled in config.
pub async fn start(state: Arc<AppState>) -> anyhow::Result<Option<JobScheduler>> {
    let schedule = state.config.read().await.schedule.clone();
    if !schedule.enabled {
        info!("Batch scheduling disabled");
        return Ok(None);
    }

    let scheduler = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;

    let cron = schedule.cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            run_scheduled_batch(state).await;
        })
    })
    .with_context(|| format!("invalid cron expression '{}'", cron))?;

    scheduler.add(job).await.context("failed to add batch job")?;
    scheduler.start().await.context("failed to start scheduler")?;

    info!(
        "Batch schedule active: '{}' ({})",
        schedule.cron, schedule.timezone
    );
    Ok(Some(scheduler))
}

/// One scheduled tick: run every opted-in account, unless a batch is
/// already in flight.
pub async fn run_scheduled_batch(state: Arc<AppState>) {
    if state
        .batch_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Previous batch still running, skipping this tick");
        return;
    }

    let accounts = state.accounts.list_scheduled().await;
    if accounts.is_empty() {
        info!("No accounts scheduled for automation");
        state.batch_running.store(false, Ordering::SeqCst);
        return;
    }

    let session_config = state.config.read().await.session_config();
    let factory = CdpSessionFactory::new(session_config);

    let results = engine::run_batch(&factory, &state.locators, &accounts).await;
    *state.last_results.write().await = results;

    state.batch_running.store(false, Ordering::SeqCst);
}
