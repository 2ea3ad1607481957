//! Network connections as seen through NetworkManager, and the narrow
//! capability the reconciler needs from the connection-management service.

use std::fmt;

use thiserror::Error;

use crate::profile::ConnectionProfile;

/// NetworkManager `connection.type` for wired Ethernet.
pub const NM_TYPE_WIRED: &str = "802-3-ethernet";
/// NetworkManager `connection.type` for Wi-Fi.
pub const NM_TYPE_WIFI: &str = "802-11-wireless";
/// NetworkManager connection types treated as VPN ("vpn" is OpenVPN & co).
pub const NM_VPN_TYPES: &[&str] = &["vpn", "wireguard"];

/// Coarse connection category used by the admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Wired,
    Wifi,
    Vpn,
    Other,
}

impl ConnectionType {
    /// Map a NetworkManager type string to a category.
    pub fn from_nm_type(nm_type: &str) -> Self {
        match nm_type {
            NM_TYPE_WIRED => ConnectionType::Wired,
            NM_TYPE_WIFI => ConnectionType::Wifi,
            t if NM_VPN_TYPES.contains(&t) => ConnectionType::Vpn,
            _ => ConnectionType::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionType::Wired => "wired",
            ConnectionType::Wifi => "wifi",
            ConnectionType::Vpn => "vpn",
            ConnectionType::Other => "other",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A configured or active network connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConnection {
    pub kind: ConnectionType,
    /// Human-readable connection name (NetworkManager `connection.id`).
    pub name: String,
    /// Connection UUID.
    pub id: String,
}

impl NetworkConnection {
    pub fn new(kind: ConnectionType, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            id: id.into(),
        }
    }

    /// Build from the raw NetworkManager type string.
    pub fn from_nm(nm_type: &str, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(ConnectionType::from_nm_type(nm_type), name, id)
    }
}

impl fmt::Display for NetworkConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={} name={} uuid={}", self.kind, self.name, self.id)
    }
}

/// Opaque handle to an existing connection profile (a D-Bus object path for
/// NetworkManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle(pub String);

/// Failure talking to the connection-management service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The bus or the service itself is unreachable.
    #[error("connection service unreachable: {0}")]
    Transport(String),

    /// The service answered with a fault.
    #[error("connection service rejected the request: {0}")]
    Rpc(String),
}

impl ServiceError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}

/// The operations the downloader needs from the connection-management
/// service. Implementations must be usable from a worker thread.
pub trait ConnectionService: Send + Sync {
    /// Resolve a connection by UUID. `Ok(None)` means it does not exist.
    fn find_by_id(&self, id: &str) -> Result<Option<ConnectionHandle>, ServiceError>;

    /// Create a new connection and return the UUID assigned to it.
    fn create(&self, profile: &ConnectionProfile) -> Result<String, ServiceError>;

    /// Replace the settings of an existing connection.
    fn update(
        &self,
        handle: &ConnectionHandle,
        profile: &ConnectionProfile,
    ) -> Result<(), ServiceError>;

    /// Currently active connections.
    fn list_active(&self) -> Result<Vec<NetworkConnection>, ServiceError>;
}
