//! Live change monitoring of tracked files.
//!
//! The monitor watches the parent directory of every tracked path
//! (non-recursively, since a directory may hold files nobody tracks), drops
//! events for untracked paths, debounces the rest per path and hands each
//! settled transition to a [`ChangeSink`].
//!
//! # Architecture
//!
//! The notify callback only translates events and sends them down a channel.
//! A dedicated worker thread owns the [`Debouncer`] and the sink; it waits on
//! the channel for at most the time until the next path settles.
//!
//! The monitor never changes the baseline by itself. Whether a live change
//! is accepted is up to the sink; see [`AcceptingSink`].

pub mod debounce;
pub mod events;

use crate::paths::TrackedPath;
use crate::reconcile::{self, Classification};
use crate::store::BaselineStore;
use debounce::{Debouncer, DirState};
use events::{DirEvent, TransitionKind, from_notify};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default quiet window before a burst of events settles.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Failed to start monitor thread: {0}")]
    Spawn(std::io::Error),
    #[error("Monitor thread panicked")]
    WorkerPanicked,
}

/// Receives every settled transition of a tracked path.
///
/// Called on the monitor's worker thread, one call per transition.
pub trait ChangeSink: Send + 'static {
    fn notify(&mut self, path: &TrackedPath, kind: TransitionKind);
}

impl<F> ChangeSink for F
where
    F: FnMut(&TrackedPath, TransitionKind) + Send + 'static,
{
    fn notify(&mut self, path: &TrackedPath, kind: TransitionKind) {
        self(path, kind)
    }
}

/// Reports transitions as log warnings.
#[derive(Debug, Default)]
pub struct LogSink;

impl ChangeSink for LogSink {
    fn notify(&mut self, path: &TrackedPath, kind: TransitionKind) {
        warn!("{} was {}", path, kind);
    }
}

/// Accepts every transition into the baseline, then forwards it.
///
/// Created and modified files are re-baselined if they are tracked; deleted
/// files are removed from the baseline. Failures are logged and the
/// transition is forwarded regardless.
pub struct AcceptingSink<S> {
    store: Arc<BaselineStore>,
    inner: S,
}

impl<S: ChangeSink> AcceptingSink<S> {
    pub fn new(store: Arc<BaselineStore>, inner: S) -> Self {
        AcceptingSink { store, inner }
    }
}

impl<S: ChangeSink> ChangeSink for AcceptingSink<S> {
    fn notify(&mut self, path: &TrackedPath, kind: TransitionKind) {
        let classification = match kind {
            TransitionKind::Created | TransitionKind::Modified => {
                if self.store.entry(path).is_some() {
                    Some(Classification::Changed)
                } else {
                    None
                }
            }
            TransitionKind::Deleted => Some(Classification::Removed),
        };

        if let Some(classification) = classification
            && let Err(e) = reconcile::accept(&self.store, classification, path, None)
        {
            warn!("Could not accept {} state of {}: {}", classification, path, e);
        }

        self.inner.notify(path, kind);
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// How long a path must be quiet before its transition is delivered.
    pub quiet_window: Duration,
    /// Deliver transitions still in their quiet window on shutdown instead of
    /// dropping them.
    pub flush_on_shutdown: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        MonitorOptions {
            quiet_window: DEFAULT_QUIET_WINDOW,
            flush_on_shutdown: true,
        }
    }
}

enum Message {
    Event(DirEvent),
    Shutdown,
}

/// Feeds directory events to a running monitor.
#[derive(Clone)]
pub struct EventSender(mpsc::Sender<Message>);

impl EventSender {
    /// Returns false if the monitor has stopped.
    pub fn send(&self, event: DirEvent) -> bool {
        self.0.send(Message::Event(event)).is_ok()
    }
}

pub struct ChangeMonitor {
    store: Arc<BaselineStore>,
    sender: mpsc::Sender<Message>,
    watcher: Option<RecommendedWatcher>,
    watched: BTreeSet<PathBuf>,
    worker: Option<JoinHandle<()>>,
}

impl ChangeMonitor {
    /// Start the worker without subscribing to any directory.
    ///
    /// Events are fed through [`ChangeMonitor::sender`].
    pub fn spawn<S: ChangeSink>(
        store: Arc<BaselineStore>,
        sink: S,
        options: MonitorOptions,
    ) -> Result<Self, MonitorError> {
        let (sender, receiver) = mpsc::channel();

        let worker = {
            let store = Arc::clone(&store);
            std::thread::Builder::new()
                .name("integriward-monitor".to_string())
                .spawn(move || run_worker(&store, receiver, sink, &options))
                .map_err(MonitorError::Spawn)?
        };

        Ok(ChangeMonitor {
            store,
            sender,
            watcher: None,
            watched: BTreeSet::new(),
            worker: Some(worker),
        })
    }

    /// Start the worker and watch the parent directory of every tracked path.
    pub fn watch<S: ChangeSink>(
        store: Arc<BaselineStore>,
        sink: S,
        options: MonitorOptions,
    ) -> Result<Self, MonitorError> {
        let mut monitor = Self::spawn(store, sink, options)?;

        let events = monitor.sender();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for event in from_notify(event) {
                        if !events.send(event) {
                            // Worker is gone; nothing left to deliver to.
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })?;
        monitor.watcher = Some(watcher);

        for path in monitor.store.tracked() {
            if !path.as_path().is_file() {
                warn!("{} does not exist; watching for it to appear", path);
            }
        }

        let count = monitor.refresh_watches()?;
        info!("Watching {} directories", count);

        Ok(monitor)
    }

    pub fn sender(&self) -> EventSender {
        EventSender(self.sender.clone())
    }

    /// Watch the directories of paths tracked since the last refresh.
    ///
    /// Returns how many directories were added. Directories that do not exist
    /// are skipped with a warning and retried on the next refresh.
    pub fn refresh_watches(&mut self) -> Result<usize, MonitorError> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(0);
        };

        let wanted: BTreeSet<PathBuf> = self
            .store
            .tracked()
            .iter()
            .filter_map(|path| path.parent().map(Path::to_path_buf))
            .collect();

        let mut added = 0;
        for dir in wanted.difference(&self.watched).cloned().collect::<Vec<_>>() {
            if !dir.is_dir() {
                warn!("Cannot watch {}: not a directory", dir.display());
                continue;
            }
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            debug!("Watching {}", dir.display());
            self.watched.insert(dir);
            added += 1;
        }

        Ok(added)
    }

    /// Directories currently subscribed to, in path order.
    pub fn watched_directories(&self) -> impl Iterator<Item = &Path> {
        self.watched.iter().map(PathBuf::as_path)
    }

    /// Stop watching and wait for the worker to finish.
    ///
    /// Transitions still in their quiet window are delivered or dropped per
    /// [`MonitorOptions::flush_on_shutdown`].
    pub fn shutdown(mut self) -> Result<(), MonitorError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), MonitorError> {
        // Dropping the watcher ends the subscription.
        self.watcher = None;
        self.watched.clear();

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // Fails only if the worker already exited.
        let _ = self.sender.send(Message::Shutdown);
        worker.join().map_err(|_| MonitorError::WorkerPanicked)
    }
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Error stopping monitor: {}", e);
        }
    }
}

fn run_worker<S: ChangeSink>(
    store: &BaselineStore,
    receiver: mpsc::Receiver<Message>,
    mut sink: S,
    options: &MonitorOptions,
) {
    let mut debouncer = Debouncer::new(options.quiet_window);

    loop {
        let received = match debouncer.next_deadline() {
            Some(deadline) => {
                receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Message::Event(event)) => ingest(store, &mut debouncer, event),
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        let settled = debouncer.take_settled(now);
        let mut touched = BTreeSet::new();
        for (path, kind) in settled {
            if let Some(dir) = path.parent() {
                touched.insert(dir.to_path_buf());
            }
            sink.notify(&path, kind);
        }
        for dir in touched {
            if debouncer.directory_state(&dir, now) == DirState::Idle {
                debug!("{} is quiet again", dir.display());
            }
        }
    }

    if options.flush_on_shutdown {
        for (path, kind) in debouncer.drain() {
            sink.notify(&path, kind);
        }
    } else if !debouncer.is_empty() {
        debug!("Dropping unsettled transitions on shutdown");
    }
}

fn ingest(store: &BaselineStore, debouncer: &mut Debouncer, event: DirEvent) {
    let now = Instant::now();

    for (path, kind) in event.transitions() {
        let tracked = match TrackedPath::normalize(&path) {
            Ok(tracked) => tracked,
            Err(e) => {
                debug!("Ignoring event for {}: {}", path.display(), e);
                continue;
            }
        };

        if !store.is_tracked(&tracked) {
            trace!("Ignoring untracked {}", tracked);
            continue;
        }

        if let Some(dir) = tracked.parent()
            && debouncer.directory_state(dir, now) == DirState::Idle
        {
            debug!("Events pending in {}", dir.display());
        }

        debug!("{} {}", kind, tracked);
        debouncer.push(tracked, kind, now);
    }
}
