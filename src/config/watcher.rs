//! Configuration file watcher for filter hot reload.
//!
//! Only the filter set is reloaded. Endpoints and tunables are fixed for the
//! lifetime of an engine, so changes to them are logged and ignored.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::event::EventFilter;
use crate::ingest::EventIngestor;

/// Watches the configuration file and emits the filter set when it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<EventFilter>>,
}

impl ConfigWatcher {
    /// Create a new watcher for `path`.
    ///
    /// Returns the watcher and a receiver for filter updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<EventFilter>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config.engine.filters);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Config reload failed, keeping current filters");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply filter updates to `engine` until the channel closes.
///
/// Unchanged filter sets are skipped so editors that write a file several
/// times per save do not produce repeated reloads.
pub fn spawn_filter_reloader(
    engine: Arc<EventIngestor>,
    mut updates: mpsc::UnboundedReceiver<Vec<EventFilter>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(filters) = updates.recv().await {
            if filters == engine.filters() {
                continue;
            }
            match engine.set_filters(filters) {
                Ok(()) => tracing::info!(count = engine.filters().len(), "Event filters reloaded"),
                Err(e) => tracing::error!(error = %e, "Rejected reloaded filters"),
            }
        }
    })
}
