// History maintenance: prune rows past retention on a fixed boundary, and
// VACUUM on a configurable schedule (cron expression or fixed interval).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::history_repo::HistoryRepo;
use crate::scheduler::{Boundary, Scheduler};

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

/// Spawns the prune loop on `scheduler` and the VACUUM loop beside it.
pub fn spawn(
    scheduler: &Scheduler,
    repo: Arc<HistoryRepo>,
    config: MaintenanceConfig,
) -> Vec<JoinHandle<()>> {
    let prune_repo = repo.clone();
    let prune = scheduler.schedule_recurring(
        "prune",
        Boundary::Every(config.prune_interval_secs),
        move || {
            let repo = prune_repo.clone();
            async move {
                let deleted = repo.prune_old_data().await?;
                if deleted > 0 {
                    info!(deleted, "pruned history rows past retention");
                }
                Ok(())
            }
        },
    );
    let vacuum = tokio::spawn(vacuum_loop(repo, config, scheduler.shutdown_signal()));
    vec![prune, vacuum]
}

async fn vacuum_loop(
    repo: Arc<HistoryRepo>,
    config: MaintenanceConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        let Some(delay) = next_vacuum_delay(&config) else {
            return;
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
        match repo.vacuum().await {
            Ok(()) => info!("vacuum complete"),
            Err(e) => warn!(error = %e, "vacuum failed"),
        }
    }
}

/// Time until the next VACUUM, or `None` if the cron expression is unusable.
pub fn next_vacuum_delay(config: &MaintenanceConfig) -> Option<Duration> {
    let Some(cron_str) = &config.vacuum_schedule else {
        return Some(Duration::from_secs(config.vacuum_interval_secs.max(1)));
    };
    let schedule = match cron::Schedule::from_str(cron_str) {
        Ok(s) => s,
        Err(e) => {
            warn!(cron = %cron_str, error = %e, "invalid vacuum_schedule; VACUUM will not run");
            return None;
        }
    };
    let now = chrono::Local::now();
    match schedule.after(&now).next() {
        Some(next) => Some((next - now).to_std().unwrap_or(Duration::from_secs(1))),
        // Schedule has no future firings (e.g. a fixed past year).
        None => Some(Duration::from_secs(3600)),
    }
}
