//! Configuration holder with live reload.
//!
//! ## Architecture
//!
//! - The current [`Config`] lives behind a lock so the download worker
//!   thread can read it at the start of every cycle.
//! - A watcher thread monitors `config.toml`. On change the file is parsed
//!   and validated there; a valid result is handed to the GLib main thread
//!   via `glib::idle_add_once`, which stores it and runs the reload hook.
//! - An invalid file is logged and the previous configuration stays.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use arachne_cdl_core::{Config, SettingsSource};

/// Debounce interval (in ms) for file change events. Editors often trigger
/// multiple events for a single save.
const FILE_CHANGE_DEBOUNCE_MS: u64 = 300;

/// Called on the main thread with the old and the new configuration.
type ReloadHook = Box<dyn Fn(&Config, &Config)>;

thread_local! {
    static RELOAD_HOOK: RefCell<Option<ReloadHook>> = const { RefCell::new(None) };
}

/// Messages sent from the file watcher thread to the main thread.
#[derive(Debug)]
enum ConfigMessage {
    /// A new valid config was loaded.
    Reloaded(Box<Config>),
    /// Config file changed but failed to load/validate.
    Error(String),
}

pub struct ConfigManager {
    config: RwLock<Config>,
    config_path: Option<PathBuf>,
    shutdown_flag: Arc<AtomicBool>,
}

impl ConfigManager {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Run `hook` on the main thread after each successful reload.
    ///
    /// Must be called from the thread running the GLib main loop.
    pub fn on_reload<F>(&self, hook: F)
    where
        F: Fn(&Config, &Config) + 'static,
    {
        RELOAD_HOOK.with(|cell| *cell.borrow_mut() = Some(Box::new(hook)));
    }

    /// Start watching the config file for changes.
    ///
    /// Does nothing if no config file path is set (using defaults).
    pub fn start_watching(self: &Arc<Self>) {
        let Some(path) = self.config_path.clone() else {
            info!("No config file to watch (using defaults)");
            return;
        };

        if !path.exists() {
            warn!(
                "Config file does not exist, cannot watch: {}",
                path.display()
            );
            return;
        }

        info!("Starting config file watcher for: {}", path.display());

        let this = Arc::clone(self);
        thread::spawn(move || this.run_file_watcher(path));
    }

    /// Stop watching the config file.
    pub fn stop_watching(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        debug!("Config watcher stopped");
    }

    /// Run the file watcher loop (called on a background thread).
    fn run_file_watcher(self: Arc<Self>, path: PathBuf) {
        let debounce_duration = Duration::from_millis(FILE_CHANGE_DEBOUNCE_MS);

        // notify reports absolute paths
        let canonical_path = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to canonicalize config path: {}", e);
                return;
            }
        };

        let path_for_handler = canonical_path.clone();
        let this = Arc::clone(&self);
        let mut debouncer =
            match new_debouncer(debounce_duration, move |res: DebounceEventResult| match res {
                Ok(events) => {
                    if events.iter().any(|e| e.path == path_for_handler) {
                        debug!("Config file change detected");
                        this.reload_and_send(&path_for_handler);
                    }
                }
                Err(err) => {
                    error!("File watcher error: {}", err);
                }
            }) {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to create file watcher: {}", e);
                    return;
                }
            };

        // Watch the parent directory; editors often replace the file.
        let watch_dir = canonical_path.parent().unwrap_or(&canonical_path);
        if let Err(e) = debouncer
            .watcher()
            .watch(watch_dir, RecursiveMode::NonRecursive)
        {
            error!("Failed to watch config directory: {}", e);
            return;
        }

        info!("File watcher started, watching: {}", watch_dir.display());

        while !self.shutdown_flag.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(500));
        }

        debug!("Config file watcher thread shutting down");
    }

    /// Reload config from file and hand the result to the main thread.
    fn reload_and_send(self: &Arc<Self>, path: &Path) {
        let msg = match Config::load(path) {
            Ok(new_config) => match new_config.validate() {
                Ok(()) => {
                    for warning in new_config.warnings() {
                        warn!("{}", warning);
                    }
                    info!("Config reloaded from: {}", path.display());
                    ConfigMessage::Reloaded(Box::new(new_config))
                }
                Err(e) => ConfigMessage::Error(format!("Config validation failed: {}", e)),
            },
            Err(e) => ConfigMessage::Error(format!("Failed to reload config: {}", e)),
        };

        let this = Arc::clone(self);
        glib::idle_add_once(move || this.handle_config_message(msg));
    }

    fn handle_config_message(&self, msg: ConfigMessage) {
        match msg {
            ConfigMessage::Reloaded(new_config) => self.apply_config(*new_config),
            ConfigMessage::Error(err) => {
                // Keep using the old config.
                error!("Config reload error: {}", err);
            }
        }
    }

    fn apply_config(&self, new_config: Config) {
        let old_config = {
            let mut current = self.config.write();
            if *current == new_config {
                debug!("Config unchanged");
                return;
            }
            std::mem::replace(&mut *current, new_config.clone())
        };

        RELOAD_HOOK.with(|cell| {
            if let Some(hook) = cell.borrow().as_ref() {
                hook(&old_config, &new_config);
            }
        });
        info!("Configuration applied");
    }
}

impl SettingsSource for ConfigManager {
    fn current(&self) -> Config {
        self.config()
    }
}
