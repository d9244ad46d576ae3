use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver};

use super::udev_monitor::UdevMonitor;
use crate::service::ServiceHandle;

/// Minimum spacing between two re-detections
const RATE_LIMIT: Duration = Duration::from_millis(1500);

/// Time for DDC/CI to come up on a freshly plugged monitor
const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Watch udev and ask `handle` to re-detect after each burst of events
///
/// udev's socket is not Send, so it lives on its own thread and forwards
/// bare notifications to an async task that debounces them.
pub fn spawn_hotplug_watcher(handle: ServiceHandle) {
    let (tx, rx) = mpsc::channel(100);

    std::thread::spawn(move || {
        let monitor = match UdevMonitor::new() {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to initialize display hotplug monitoring: {}", e);
                return;
            }
        };

        let _err = monitor.run(|_event| match tx.try_send(()) {
            Ok(_) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Hotplug channel full, skipping event (will debounce)");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        error!("Display hotplug monitoring stopped");
    });

    tokio::spawn(debounce_hotplug(rx, handle, SETTLE_DELAY, RATE_LIMIT));
}

/// Collapse bursts of notifications into single topology refreshes
async fn debounce_hotplug(
    mut rx: Receiver<()>,
    handle: ServiceHandle,
    settle: Duration,
    rate_limit: Duration,
) {
    let mut last_refresh: Option<tokio::time::Instant> = None;

    while rx.recv().await.is_some() {
        if let Some(last) = last_refresh {
            let elapsed = last.elapsed();
            if elapsed < rate_limit {
                tokio::time::sleep(rate_limit - elapsed).await;
            }
        }

        tokio::time::sleep(settle).await;

        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            debug!("Drained {} additional hotplug events", drained);
        }

        info!("Hotplug settled, re-detecting displays");
        handle.topology_changed();
        last_refresh = Some(tokio::time::Instant::now());
    }

    info!("Hotplug monitoring channel closed");
}
