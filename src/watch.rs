//! External file-change detection.
//!
//! The decision logic lives in [`Reconciler`], a pure state machine keyed on
//! the file's mtime. Delivery is a `notify` watcher feeding an mpsc channel
//! that the editor loop drains; the watcher never decides anything itself.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::UNIX_EPOCH;

/// What the caller should do with a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ignore,
    ExternalChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Unwatched,
    Watching { path: PathBuf, last_mtime: u64 },
    SuppressedOnce { path: PathBuf, last_mtime: u64 },
}

/// File mtime in microseconds since the epoch; 0 when the file cannot be
/// queried (missing, permission error, ...).
pub fn file_mtime_us(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Decides whether an observed mtime drift is a real external change, our
/// own write echoing back, or noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciler {
    state: WatchState,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            state: WatchState::Unwatched,
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            WatchState::Unwatched => None,
            WatchState::Watching { path, .. } | WatchState::SuppressedOnce { path, .. } => {
                Some(path)
            }
        }
    }

    /// Begin watching `path` with the given baseline mtime. An unobservable
    /// path (mtime 0) fails silently into `Unwatched`.
    pub fn start(&mut self, path: PathBuf, mtime: u64) {
        self.state = if mtime == 0 {
            WatchState::Unwatched
        } else {
            WatchState::Watching {
                path,
                last_mtime: mtime,
            }
        };
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        self.state = WatchState::Unwatched;
    }

    /// Arm the one-shot suppression right before the editor itself writes
    /// the file, so the echo of that write is not treated as external. A
    /// single slot, not a queue.
    pub fn mark_own_write(&mut self) {
        if let WatchState::Watching { path, last_mtime } = &self.state {
            self.state = WatchState::SuppressedOnce {
                path: path.clone(),
                last_mtime: *last_mtime,
            };
        }
    }

    pub fn on_change_notification(&mut self, new_mtime: u64) -> Decision {
        match &self.state {
            WatchState::Unwatched => Decision::Ignore,
            WatchState::SuppressedOnce { path, .. } => {
                // our own write echoing back; consume the suppression
                self.state = WatchState::Watching {
                    path: path.clone(),
                    last_mtime: new_mtime,
                };
                Decision::Ignore
            }
            WatchState::Watching { path, last_mtime } => {
                if new_mtime == 0 || new_mtime == *last_mtime {
                    return Decision::Ignore;
                }
                self.state = WatchState::Watching {
                    path: path.clone(),
                    last_mtime: new_mtime,
                };
                Decision::ExternalChange
            }
        }
    }
}

/// Reconciler plus its delivery mechanism: one outstanding `notify`
/// subscription whose events arrive on a channel the editor drains each
/// tick.
pub struct FileWatch {
    reconciler: Reconciler,
    watcher: Option<RecommendedWatcher>,
    events: Receiver<notify::Result<notify::Event>>,
}

impl FileWatch {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        // if the platform watcher cannot be created we degrade to no
        // detection, same as an unobservable path
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .ok();
        Self {
            reconciler: Reconciler::new(),
            watcher,
            events: rx,
        }
    }

    /// Watch `path`, retiring any prior subscription. Fails silently when
    /// the path cannot be observed.
    pub fn start_watching(&mut self, path: &Path) {
        self.stop_watching();
        let mtime = file_mtime_us(path);
        if mtime == 0 {
            return;
        }
        if let Some(w) = self.watcher.as_mut() {
            if w.watch(path, RecursiveMode::NonRecursive).is_ok() {
                self.reconciler.start(path.to_path_buf(), mtime);
            }
        }
    }

    pub fn stop_watching(&mut self) {
        if let Some(path) = self.reconciler.path().map(Path::to_path_buf) {
            if let Some(w) = self.watcher.as_mut() {
                let _ = w.unwatch(&path);
            }
        }
        self.reconciler.stop();
    }

    pub fn mark_own_write(&mut self) {
        self.reconciler.mark_own_write();
    }

    /// Drain pending notifications, re-stat the watched file and feed the
    /// reconciler. Several queued events collapse into one decision; only
    /// the latest mtime matters.
    pub fn poll(&mut self) -> Decision {
        let mut decision = Decision::Ignore;
        loop {
            let res = match self.events.try_recv() {
                Ok(res) => res,
                Err(_) => break,
            };
            let Ok(event) = res else { continue };
            if !relevant(&event.kind) {
                continue;
            }
            let Some(path) = self.reconciler.path().map(Path::to_path_buf) else {
                continue;
            };
            let mtime = file_mtime_us(&path);
            if self.reconciler.on_change_notification(mtime) == Decision::ExternalChange {
                decision = Decision::ExternalChange;
            }
        }
        decision
    }
}

fn relevant(kind: &notify::EventKind) -> bool {
    matches!(
        kind,
        notify::EventKind::Any | notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn watching(mtime: u64) -> Reconciler {
        let mut r = Reconciler::new();
        r.start(PathBuf::from("/tmp/f"), mtime);
        r
    }

    #[test]
    fn test_start_with_zero_mtime_stays_unwatched() {
        let r = watching(0);
        assert_eq!(*r.state(), WatchState::Unwatched);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut r = watching(10);
        r.stop();
        r.stop();
        assert_eq!(*r.state(), WatchState::Unwatched);
    }

    #[test]
    fn test_same_mtime_is_noise() {
        let mut r = watching(10);
        assert_eq!(r.on_change_notification(10), Decision::Ignore);
        assert_eq!(
            *r.state(),
            WatchState::Watching {
                path: PathBuf::from("/tmp/f"),
                last_mtime: 10
            }
        );
    }

    #[test]
    fn test_zero_mtime_is_ignored_without_teardown() {
        let mut r = watching(10);
        assert_eq!(r.on_change_notification(0), Decision::Ignore);
        // the watch survives stat failures
        assert_eq!(
            *r.state(),
            WatchState::Watching {
                path: PathBuf::from("/tmp/f"),
                last_mtime: 10
            }
        );
    }

    #[test]
    fn test_drift_is_external_change() {
        let mut r = watching(10);
        assert_eq!(r.on_change_notification(20), Decision::ExternalChange);
        assert_eq!(
            *r.state(),
            WatchState::Watching {
                path: PathBuf::from("/tmp/f"),
                last_mtime: 20
            }
        );
    }

    #[test]
    fn test_own_write_suppressed_once() {
        let mut r = watching(10);
        r.mark_own_write();
        // any mtime: consumed as our own echo, baseline updated
        assert_eq!(r.on_change_notification(30), Decision::Ignore);
        assert_eq!(
            *r.state(),
            WatchState::Watching {
                path: PathBuf::from("/tmp/f"),
                last_mtime: 30
            }
        );
        // suppression is one-shot: the next drift is external again
        assert_eq!(r.on_change_notification(40), Decision::ExternalChange);
    }

    #[test]
    fn test_unwatched_ignores_everything() {
        let mut r = Reconciler::new();
        assert_eq!(r.on_change_notification(10), Decision::Ignore);
        r.mark_own_write();
        assert_eq!(*r.state(), WatchState::Unwatched);
    }

    #[test]
    fn test_file_mtime_us_missing_file() {
        assert_eq!(file_mtime_us(Path::new("/no/such/file/anywhere")), 0);
    }

    #[test]
    fn test_file_mtime_us_real_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "x").unwrap();
        assert!(file_mtime_us(f.path()) > 0);
    }
}
