//! Retention sweeper: reclaim on-disk artifacts older than the retention
//! window.
//!
//! Runs on a fixed timer independent of active sessions. The sweeper never
//! coordinates with the broadcaster: its only protection against racing
//! an in-flight session is the age check itself, which is why the
//! configured retention window must comfortably exceed the longest
//! plausible conversion.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the background sweep loop over `root`, deleting entries whose
/// modification time is older than `max_age`, every `every`.
///
/// The returned handle can be aborted to stop sweeping; entries are never
/// touched mid-sweep by more than one tick because ticks run strictly
/// sequentially on one task.
pub fn spawn(root: PathBuf, max_age: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_once(&root, max_age) {
                Ok(0) => {}
                Ok(n) => info!("retention sweep removed {n} stale entries from {}", root.display()),
                Err(e) => warn!("retention sweep of {} failed: {e}", root.display()),
            }
        }
    })
}

/// One sweep pass. Returns how many entries were removed.
///
/// Individual removal failures are logged and skipped; a half-swept tree
/// is retried on the next tick, and a sweep failure must never take down
/// the conversion service.
pub fn sweep_once(root: &Path, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0usize;

    for entry in std::fs::read_dir(root)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("unreadable directory entry under {}: {e}", root.display());
                continue;
            }
        };
        let path = entry.path();
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("cannot stat {}: {e}", path.display());
                continue;
            }
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        let result = if meta.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!("removed stale artifact {} (age {:?})", path.display(), age);
                removed += 1;
            }
            Err(e) => warn!("cannot remove {}: {e}", path.display()),
        }
    }

    Ok(removed)
}
