//! Core library for the Arachne config downloader.
//!
//! Everything here is independent of the desktop session: configuration,
//! the admission policy, the HTTPS fetcher, certificate and file writers,
//! the connection reconciler and the scheduling state machine. The binary
//! crate supplies the D-Bus backed [`ConnectionService`] and the GLib timer.

pub mod certs;
pub mod config;
pub mod connection;
pub mod download;
pub mod error;
pub mod fetch;
#[cfg(feature = "kerberos")]
pub mod kerberos;
pub mod logging;
pub mod payload;
pub mod policy;
pub mod profile;
pub mod reconcile;
pub mod schedule;
pub mod state;
pub mod status;

pub use config::{Config, ConfigLoadResult, DownloadType};
pub use connection::{ConnectionService, ConnectionType, NetworkConnection, ServiceError};
pub use download::{DownloadController, Notifier, Outcome, SettingsSource, Trigger, UserContext};
pub use error::{DownloadError, Error, Result};
pub use fetch::{ConfigSource, FetchError, HttpFetcher};
pub use profile::ConnectionProfile;
pub use schedule::Scheduler;
pub use state::{DownloadState, StateFile};
pub use status::DownloadStatus;
