use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReaperSettings;
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub disconnected: usize,
    pub idle: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.disconnected + self.idle + self.failed
    }
}

/// One pass over the live sessions. Entries that are disconnected, idle past
/// the threshold, or that fail a bounded liveness probe are evicted.
pub async fn sweep(registry: &SessionRegistry, settings: &ReaperSettings) -> SweepReport {
    let mut report = SweepReport::default();

    for (key, manager) in registry.list_live() {
        report.checked += 1;

        if !manager.is_connected() {
            if registry.evict_if_current(&key, &manager).await {
                debug!(session = %key, "Reaped disconnected session");
                report.disconnected += 1;
            }
            continue;
        }

        let idle = manager.idle_for();
        if idle > settings.idle_threshold() {
            if registry.evict_if_current(&key, &manager).await {
                info!(session = %key, idle_secs = idle.as_secs(), "Reaped idle session");
                report.idle += 1;
            }
            continue;
        }

        match timeout(settings.probe_timeout(), manager.test_connection()).await {
            Ok(check) if check.is_healthy() => {}
            Ok(check) => {
                warn!(session = %key, check = ?check, "Health check failed, evicting");
                if registry.evict_if_current(&key, &manager).await {
                    report.failed += 1;
                }
            }
            Err(_) => {
                warn!(
                    session = %key,
                    timeout_secs = settings.probe_timeout().as_secs(),
                    "Health check timed out, evicting"
                );
                if registry.evict_if_current(&key, &manager).await {
                    report.failed += 1;
                }
            }
        }
    }

    report
}

/// Runs [`sweep`] every `settings.interval()` until `shutdown` fires.
pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    settings: ReaperSettings,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = sweep(&registry, &settings).await;
                    if report.evicted() > 0 {
                        info!(
                            checked = report.checked,
                            disconnected = report.disconnected,
                            idle = report.idle,
                            failed = report.failed,
                            "Reaper sweep evicted sessions"
                        );
                    } else {
                        debug!(checked = report.checked, "Reaper sweep complete");
                    }
                }
            }
        }
    })
}
