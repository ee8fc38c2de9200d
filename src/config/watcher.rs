//! Configuration file watcher.
//!
//! A valid change to the file becomes a [`Trigger::Reload`], which the
//! orchestrator turns into a full process restart. Invalid edits are logged and
//! the running instance keeps its current configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::{validate_config, ValidationError};
use crate::lifecycle::signals::Trigger;
use crate::scheduler::SchedulerRegistry;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    trigger_tx: mpsc::UnboundedSender<Trigger>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver that yields a reload trigger per valid change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Trigger>) {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                trigger_tx,
            },
            trigger_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as changes should be observed.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.trigger_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Config file change detected");
                        match check(&path) {
                            Ok(()) => {
                                let _ = tx.send(Trigger::Reload);
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Rejected config change: {}. Keeping current configuration.",
                                    e
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Only a file that would start cleanly is worth restarting for. CLI flags are
/// re-applied by the new process, so this is a best-effort check of the file alone.
fn check(path: &Path) -> Result<(), ConfigError> {
    let config = load_config(path)?;
    match validate_config(&config, &SchedulerRegistry::with_builtin()) {
        Ok(()) => Ok(()),
        Err(errors) => {
            // Backends may come from the command line.
            let errors: Vec<_> = errors
                .into_iter()
                .filter(|e| *e != ValidationError::NoBackends)
                .collect();
            if errors.is_empty() {
                Ok(())
            } else {
                Err(ConfigError::Validation(errors))
            }
        }
    }
}
