//! Background auto-saver driven by notify events

use crate::debounce::{is_editor_temp, Debouncer};
use crossbeam_channel::{select, Receiver, Sender};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use undu_core::{Result, StorageContext};
use undu_engine::{SnapshotEngine, AUTO_SAVE_MESSAGE};

/// Wake-up interval while nothing is pending
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Watches a project and records auto-save checkpoints after quiet periods
pub struct AutoSaver {
    /// Kept alive for as long as events should flow
    _watcher: RecommendedWatcher,
    stop_tx: Sender<()>,
    pending: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Start watching with the configured auto-save interval
    pub fn start(engine: Arc<SnapshotEngine>) -> Result<Self> {
        let quiet = Duration::from_millis(engine.config().auto_save.interval_ms);
        Self::with_quiet_period(engine, quiet)
    }

    pub fn with_quiet_period(engine: Arc<SnapshotEngine>, quiet: Duration) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .storage("Failed to create file watcher")?;
        watcher
            .watch(engine.root(), RecursiveMode::Recursive)
            .with_storage(|| format!("Failed to watch {}", engine.root().display()))?;

        let pending = Arc::new(AtomicUsize::new(0));
        let worker = Worker {
            engine,
            debouncer: Debouncer::new(quiet),
            pending: Arc::clone(&pending),
        };
        let handle = std::thread::Builder::new()
            .name("undu-autosave".to_string())
            .spawn(move || worker.run(event_rx, stop_rx))
            .storage("Failed to spawn auto-save thread")?;

        tracing::info!(quiet_ms = quiet.as_millis() as u64, "auto-save watcher started");
        Ok(Self {
            _watcher: watcher,
            stop_tx,
            pending,
            handle: Some(handle),
        })
    }

    /// Changed paths waiting for the quiet period to end
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it; pending changes are not saved
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("auto-save thread panicked");
            }
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    engine: Arc<SnapshotEngine>,
    debouncer: Debouncer,
    pending: Arc<AtomicUsize>,
}

impl Worker {
    fn run(mut self, events: Receiver<notify::Result<Event>>, stop: Receiver<()>) {
        loop {
            let timeout = self
                .debouncer
                .time_until_ready(Instant::now())
                .unwrap_or(IDLE_TICK);

            select! {
                recv(stop) -> _ => break,
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => self.record(event),
                    Ok(Err(e)) => tracing::warn!(error = %e, "file watcher error"),
                    Err(_) => break,
                },
                default(timeout) => {}
            }

            if self.debouncer.is_ready(Instant::now()) {
                let paths = self.debouncer.take();
                self.pending.store(0, Ordering::SeqCst);
                self.flush(paths.len());
            }
        }
        tracing::debug!("auto-save watcher stopped");
    }

    fn record(&mut self, event: Event) {
        let now = Instant::now();
        for path in &event.paths {
            if let Some(relative) = self.relevant(path) {
                self.debouncer.push(relative, now);
            }
        }
        self.pending.store(self.debouncer.pending_count(), Ordering::SeqCst);
    }

    /// Tracked form of `path`, or `None` if it should not trigger a save
    fn relevant(&self, path: &Path) -> Option<String> {
        let scanner = self.engine.scanner();
        let relative = scanner.relativize(path)?;
        let file_name = relative.rsplit('/').next().unwrap_or(relative.as_str());
        if scanner.is_ignored(&relative) || is_editor_temp(file_name) {
            return None;
        }
        Some(relative)
    }

    fn flush(&self, touched: usize) {
        match self.engine.unsaved_changes() {
            Ok(changes) if changes.is_empty() => {
                tracing::debug!(touched, "events settled without changes");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to compute unsaved changes");
                return;
            }
        }

        match self.engine.save(AUTO_SAVE_MESSAGE, true) {
            Ok(checkpoint) => tracing::info!(id = %checkpoint.id, touched, "auto-saved"),
            Err(e) => {
                tracing::warn!(error = %e, "auto-save failed");
                return;
            }
        }

        if let Err(e) = self.engine.prune() {
            tracing::warn!(error = %e, "retention pass failed");
        }
    }
}
