//! Update-or-create of the managed NetworkManager connection.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionService, ServiceError};
use crate::profile::ConnectionProfile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("cannot reach NetworkManager: {0}")]
    Transport(String),

    #[error("NetworkManager rejected connection '{name}': {message}")]
    Rpc { name: String, message: String },
}

impl ReconcileError {
    fn from_service(err: ServiceError, profile: &ConnectionProfile) -> Self {
        match err {
            ServiceError::Transport(msg) => ReconcileError::Transport(msg),
            ServiceError::Rpc(message) => ReconcileError::Rpc {
                name: profile.name.clone(),
                message,
            },
        }
    }
}

/// Which branch a reconcile took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The managed connection existed and was updated in place.
    Updated { id: String },
    /// A new connection was created; `id` replaces the recorded one.
    Created { id: String },
}

impl Reconciled {
    /// The managed connection id after this reconcile.
    pub fn id(&self) -> &str {
        match self {
            Reconciled::Updated { id } | Reconciled::Created { id } => id,
        }
    }
}

/// Apply `profile` to the connection recorded as `managed_id`.
///
/// Exactly one of update or create is issued. A lookup that reports the
/// connection missing, or faults, leads to create; an unreachable service
/// fails the attempt.
pub fn reconcile(
    service: &dyn ConnectionService,
    profile: &ConnectionProfile,
    managed_id: Option<&str>,
) -> Result<Reconciled, ReconcileError> {
    let existing = match managed_id.filter(|id| !id.is_empty()) {
        None => {
            debug!("No managed connection recorded");
            None
        }
        Some(id) => match service.find_by_id(id) {
            Ok(Some(handle)) => Some((id, handle)),
            Ok(None) => {
                info!("Managed connection {} no longer exists", id);
                None
            }
            Err(ServiceError::Rpc(msg)) => {
                warn!("Lookup of managed connection {} failed: {}", id, msg);
                None
            }
            Err(err) => return Err(ReconcileError::from_service(err, profile)),
        },
    };

    match existing {
        Some((id, handle)) => {
            service
                .update(&handle, profile)
                .map_err(|e| ReconcileError::from_service(e, profile))?;
            info!("Updated connection '{}' ({})", profile.name, id);
            Ok(Reconciled::Updated { id: id.to_string() })
        }
        None => {
            let id = service
                .create(profile)
                .map_err(|e| ReconcileError::from_service(e, profile))?;
            info!("Added connection '{}' with uuid {}", profile.name, id);
            Ok(Reconciled::Created { id })
        }
    }
}
