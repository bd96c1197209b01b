//! Contract file watcher.
//!
//! Two triggers run one check: a fixed poll tick, and filesystem events for
//! the contract's directory. Mounted config maps are swapped through
//! symlinks, so any event in the directory is treated as a hint and the
//! fingerprint decides whether something actually changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::BoxFuture;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

use crate::contract::fingerprint::Fingerprint;
use crate::lifecycle::resource::{CloseError, ResourceHandle};
use crate::observability::metrics;

/// Error type returned by a change handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives "the contract changed" notifications.
pub trait ContractChangeHandler: Send + Sync {
    /// Called after the contract's fingerprint changed, with the exact bytes
    /// that were fingerprinted.
    ///
    /// The change is only acknowledged when this returns `Ok`.
    fn contract_changed(&self, path: &Path, contents: &[u8]) -> Result<(), HandlerError>;
}

#[derive(Debug, Error)]
pub enum WatchCycleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("change handler failed for {path}: {source}")]
    Handler {
        path: PathBuf,
        #[source]
        source: HandlerError,
    },
}

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Unchanged,
    /// The file does not exist; nothing to publish.
    Missing,
    /// The handler accepted the change and the fingerprint advanced.
    Published(Fingerprint),
}

/// Watched path and the fingerprint of its last successful publish.
#[derive(Debug, Clone)]
pub struct ConfigFileState {
    path: PathBuf,
    last_fingerprint: Option<Fingerprint>,
}

impl ConfigFileState {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.last_fingerprint
    }
}

pub struct ContractWatcher<H> {
    state: ConfigFileState,
    handler: H,
    poll_interval: Duration,
}

impl<H> ContractWatcher<H>
where
    H: ContractChangeHandler + 'static,
{
    pub fn new(path: impl Into<PathBuf>, handler: H, poll_interval: Duration) -> Self {
        Self {
            state: ConfigFileState {
                path: path.into(),
                last_fingerprint: None,
            },
            handler,
            poll_interval,
        }
    }

    pub fn state(&self) -> &ConfigFileState {
        &self.state
    }

    /// Run one fingerprint check.
    ///
    /// The fingerprint advances only after the handler succeeds, so a failed
    /// publish is retried on the next check.
    pub fn check(&mut self) -> Result<CheckOutcome, WatchCycleError> {
        let path = &self.state.path;
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CheckOutcome::Missing),
            Err(source) => {
                return Err(WatchCycleError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };

        let current = Fingerprint::of(&contents);
        if self.state.last_fingerprint == Some(current) {
            return Ok(CheckOutcome::Unchanged);
        }

        tracing::info!(
            path = ?path,
            previous = ?self.state.last_fingerprint,
            current = %current,
            "Contract change detected"
        );
        self.handler
            .contract_changed(path, &contents)
            .map_err(|source| WatchCycleError::Handler {
                path: path.clone(),
                source,
            })?;

        self.state.last_fingerprint = Some(current);
        Ok(CheckOutcome::Published(current))
    }

    /// Start watching in a background task.
    ///
    /// The first check runs immediately, so an existing contract is published
    /// once at startup.
    pub fn start(self) -> WatcherHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let notifier = match self.fs_notifier(events_tx) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                tracing::warn!(
                    path = ?self.state.path,
                    error = %e,
                    "Filesystem notifications unavailable, polling only"
                );
                None
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        tracing::info!(
            path = ?self.state.path,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Contract watcher started"
        );
        let task = tokio::spawn(self.run(stop_rx, events_rx));

        WatcherHandle {
            stop: Some(stop_tx),
            task,
            notifier,
        }
    }

    fn fs_notifier(
        &self,
        tx: mpsc::UnboundedSender<()>,
    ) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.state.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(_) => {
                    let _ = tx.send(());
                }
                Err(e) => tracing::warn!(error = ?e, "Watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    async fn run(
        self,
        mut stop: oneshot::Receiver<()>,
        mut events: mpsc::UnboundedReceiver<()>,
    ) {
        let path = self.state.path.clone();
        let mut ticker = time::interval(self.poll_interval);
        let mut watcher = self;
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {}
                event = events.recv(), if events_open => {
                    if event.is_none() {
                        events_open = false;
                        continue;
                    }
                    // Coalesce a burst of events into a single check.
                    while events.try_recv().is_ok() {}
                }
            }

            // The check reads the file, so it runs on the blocking pool.
            let cycle = task::spawn_blocking(move || {
                let outcome = watcher.check();
                (watcher, outcome)
            })
            .await;
            let outcome = match cycle {
                Ok((returned, outcome)) => {
                    watcher = returned;
                    outcome
                }
                Err(e) => {
                    tracing::error!(path = ?path, error = %e, "Contract check did not complete");
                    return;
                }
            };

            match outcome {
                Ok(CheckOutcome::Missing) => {
                    tracing::debug!(path = ?path, "Contract file not present");
                }
                Ok(_) => {}
                Err(e) => {
                    metrics::record_watch_error();
                    tracing::warn!(error = %e, "Contract watch cycle failed, retrying next cycle");
                }
            }
        }

        tracing::info!(path = ?path, "Contract watcher stopped");
    }
}

/// Running watcher; closing it stops the loop.
pub struct WatcherHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    notifier: Option<RecommendedWatcher>,
}

impl ResourceHandle for WatcherHandle {
    fn name(&self) -> &str {
        "contract-watcher"
    }

    fn close(mut self: Box<Self>) -> BoxFuture<'static, Result<(), CloseError>> {
        Box::pin(async move {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            let result = (&mut self.task)
                .await
                .map_err(|e| CloseError::new(format!("watcher task failed: {e}")));
            drop(self.notifier.take());
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records the contents it saw; fails the first `fail_first` calls.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    impl ContractChangeHandler for Recorder {
        fn contract_changed(&self, _path: &Path, contents: &[u8]) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err("reconciler unavailable".into());
            }
            self.seen.lock().unwrap().push(contents.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_burst_of_changes_coalesces_to_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let recorder = Recorder::default();
        let mut watcher = ContractWatcher::new(&path, recorder.clone(), Duration::from_secs(1));

        fs::write(&path, b"X").unwrap();
        assert!(matches!(watcher.check().unwrap(), CheckOutcome::Published(_)));

        fs::write(&path, b"A").unwrap();
        fs::write(&path, b"B").unwrap();
        fs::write(&path, b"A").unwrap();
        let outcome = watcher.check().unwrap();

        assert_eq!(outcome, CheckOutcome::Published(Fingerprint::of(b"A")));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![b"X".to_vec(), b"A".to_vec()]);
        assert_eq!(watcher.check().unwrap(), CheckOutcome::Unchanged);
    }

    #[test]
    fn test_failed_publish_keeps_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"v1").unwrap();
        let recorder = Recorder {
            fail_first: 1,
            ..Recorder::default()
        };
        let mut watcher = ContractWatcher::new(&path, recorder.clone(), Duration::from_secs(1));

        assert!(matches!(watcher.check(), Err(WatchCycleError::Handler { .. })));
        assert_eq!(watcher.state().last_fingerprint(), None);

        assert_eq!(
            watcher.check().unwrap(),
            CheckOutcome::Published(Fingerprint::of(b"v1"))
        );
        assert_eq!(watcher.state().last_fingerprint(), Some(Fingerprint::of(b"v1")));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_file_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let path = dir.path().join("absent");
        let mut watcher = ContractWatcher::new(path, recorder.clone(), Duration::from_secs(1));

        assert_eq!(watcher.check().unwrap(), CheckOutcome::Missing);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_background_watcher_publishes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"initial").unwrap();

        let recorder = Recorder::default();
        let handle =
            ContractWatcher::new(&path, recorder.clone(), Duration::from_millis(20)).start();

        let mut waited = Duration::ZERO;
        while recorder.seen.lock().unwrap().is_empty() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
        assert_eq!(*recorder.seen.lock().unwrap(), vec![b"initial".to_vec()]);

        Box::new(handle).close().await.unwrap();
    }

    /// Rewrites the file while handling a change, like an update landing
    /// between the fingerprint and the send.
    struct Rewriter {
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
        next: &'static [u8],
    }

    impl ContractChangeHandler for Rewriter {
        fn contract_changed(&self, path: &Path, contents: &[u8]) -> Result<(), HandlerError> {
            let mut seen = self.seen.lock().unwrap();
            if seen.is_empty() {
                fs::write(path, self.next)?;
            }
            seen.push(contents.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_handler_gets_the_fingerprinted_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, b"gen-1").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Rewriter {
            seen: seen.clone(),
            next: b"gen-2",
        };
        let mut watcher = ContractWatcher::new(&path, handler, Duration::from_secs(1));

        assert_eq!(
            watcher.check().unwrap(),
            CheckOutcome::Published(Fingerprint::of(b"gen-1"))
        );
        assert_eq!(*seen.lock().unwrap(), vec![b"gen-1".to_vec()]);

        // The write made during the first publish is its own change.
        assert_eq!(
            watcher.check().unwrap(),
            CheckOutcome::Published(Fingerprint::of(b"gen-2"))
        );
        assert_eq!(*seen.lock().unwrap(), vec![b"gen-1".to_vec(), b"gen-2".to_vec()]);
    }
}
