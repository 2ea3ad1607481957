//! One fetch-and-apply cycle.
//!
//! [`DownloadController::run`] is the only entry point for both scheduled
//! and manual downloads. It never panics and never returns an error; every
//! failure ends up in the returned [`Outcome`] and, for the user, in a
//! notification.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::certs;
use crate::config::Config;
use crate::connection::ConnectionService;
use crate::error::DownloadError;
use crate::fetch::{ConfigSource, FetchRequest};
use crate::payload::{Payload, UserConfig};
use crate::policy;
use crate::profile::ConnectionProfile;
use crate::reconcile::{self, Reconciled};
use crate::state::StateFile;

/// Shown when a manual download is requested while one is running.
pub const BUSY_MESSAGE: &str = "A download is already in progress";

/// Receives user-facing messages.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Where the controller reads the configuration for each cycle.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> Config;
}

impl SettingsSource for Config {
    fn current(&self) -> Config {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Timer expiry; subject to the admission policy.
    Scheduled,
    /// Explicit user request; always proceeds.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No active connection admits an unattended download.
    NotAllowed,
    /// Another cycle is still running.
    Busy,
}

/// What a successful cycle changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    ConnectionUpdated { name: String, id: String },
    ConnectionCreated { name: String, id: String },
    FileSaved { path: PathBuf },
}

impl Applied {
    fn from_reconciled(name: &str, reconciled: Reconciled) -> Self {
        let name = name.to_string();
        match reconciled {
            Reconciled::Updated { id } => Applied::ConnectionUpdated { name, id },
            Reconciled::Created { id } => Applied::ConnectionCreated { name, id },
        }
    }
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applied::ConnectionUpdated { name, .. } => {
                write!(f, "Connection '{}' updated", name)
            }
            Applied::ConnectionCreated { name, .. } => {
                write!(f, "Connection '{}' added", name)
            }
            Applied::FileSaved { path } => {
                write!(f, "Configuration saved to {}", path.display())
            }
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    Applied(Applied),
    Failed(DownloadError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// The local user the downloaded material belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub home: PathBuf,
    pub user: String,
}

impl UserContext {
    pub fn new(home: impl Into<PathBuf>, user: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            user: user.into(),
        }
    }

    /// From `$HOME` and `$USER` (or `$LOGNAME`).
    pub fn from_env() -> Option<Self> {
        let home = env::var_os("HOME").map(PathBuf::from)?;
        let user = env::var("USER").or_else(|_| env::var("LOGNAME")).ok()?;
        Some(Self::new(home, user))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DownloadController {
    settings: Arc<dyn SettingsSource>,
    state: Arc<StateFile>,
    source: Arc<dyn ConfigSource>,
    connections: Arc<dyn ConnectionService>,
    notifier: Arc<dyn Notifier>,
    user: UserContext,
    in_flight: AtomicBool,
}

impl DownloadController {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        state: Arc<StateFile>,
        source: Arc<dyn ConfigSource>,
        connections: Arc<dyn ConnectionService>,
        notifier: Arc<dyn Notifier>,
        user: UserContext,
    ) -> Self {
        Self {
            settings,
            state,
            source,
            connections,
            notifier,
            user,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state_file(&self) -> &StateFile {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle.
    pub fn run(&self, trigger: Trigger) -> Outcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            info!("Download already in progress, skipping {:?} download", trigger);
            if trigger == Trigger::Manual {
                self.notifier.info(BUSY_MESSAGE);
            }
            return Outcome::Skipped(SkipReason::Busy);
        };

        let config = self.settings.current();

        if trigger == Trigger::Scheduled && !self.admitted(&config) {
            info!("No active connection allows an automatic download");
            return Outcome::Skipped(SkipReason::NotAllowed);
        }

        match self.fetch_and_apply(&config) {
            Ok(applied) => {
                info!("{}", applied);
                if let Err(e) = self.state.update(|s| s.last_success = Some(Utc::now())) {
                    warn!("Cannot record download time: {}", e);
                }
                if trigger == Trigger::Manual {
                    self.notifier.info(&applied.to_string());
                }
                Outcome::Applied(applied)
            }
            Err(e) => {
                error!("Download failed: {}", e);
                self.notifier
                    .error(&format!("Cannot download configuration: {}", e));
                Outcome::Failed(e)
            }
        }
    }

    fn admitted(&self, config: &Config) -> bool {
        let active = match self.connections.list_active() {
            Ok(active) => active,
            Err(e) => {
                warn!("Cannot list active connections: {}", e);
                return false;
            }
        };
        let managed = self.state.load().managed_connection_id;
        let rules = config.allow.rules(managed.as_deref());

        match policy::admitting_connection(&active, &rules) {
            Some(con) => {
                debug!("Download allowed by {}", con);
                true
            }
            None => {
                for con in &active {
                    debug!("Not allowed: {}", con);
                }
                false
            }
        }
    }

    fn fetch_and_apply(&self, config: &Config) -> Result<Applied, DownloadError> {
        let download_type = config
            .download
            .download_type()
            .ok_or_else(|| DownloadError::UnknownType(config.download.kind.to_string()))?;

        let request = FetchRequest {
            url: config.user_config_url(download_type),
            download_type,
            verify_tls: !config.server.ignore_ssl_errors,
            timeout: config.server.timeout(),
        };

        match self.source.fetch(&request)? {
            Payload::Profile(user_config) => self.apply_profile(&user_config),
            Payload::File(content) => {
                let destination = config.download.destination_dir(self.user.home());
                let path = certs::save_config_file(&destination, &content)?;
                Ok(Applied::FileSaved { path })
            }
        }
    }

    fn apply_profile(&self, user_config: &UserConfig) -> Result<Applied, DownloadError> {
        let cert_dir = certs::cert_dir(self.user.home());
        let paths = certs::materialize(&cert_dir, &user_config.certificates)?;
        let profile = ConnectionProfile::build(user_config, &self.user.user, &paths);

        let managed = self.state.load().managed_connection_id;
        let reconciled = reconcile::reconcile(
            self.connections.as_ref(),
            &profile,
            managed.as_deref(),
        )?;

        if managed.as_deref() != Some(reconciled.id()) {
            let id = reconciled.id().to_string();
            if let Err(e) = self
                .state
                .update(|s| s.managed_connection_id = Some(id))
            {
                warn!("Cannot record managed connection id: {}", e);
            }
        }

        Ok(Applied::from_reconciled(&profile.name, reconciled))
    }
}
