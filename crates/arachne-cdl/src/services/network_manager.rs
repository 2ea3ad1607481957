//! NetworkManager access over the system D-Bus.
//!
//! All calls are synchronous (`call_sync`) and meant to run on a worker
//! thread. A fresh handle to the shared system bus connection is taken per
//! operation, so a NetworkManager (or bus) restart between downloads is
//! harmless.

use std::collections::HashMap;

use glib::{Variant, variant::ToVariant};
use tracing::{debug, warn};

use arachne_cdl_core::connection::{ConnectionHandle, ConnectionService, ServiceError};
use arachne_cdl_core::{ConnectionProfile, NetworkConnection};

/// NetworkManager service name.
const NM_SERVICE: &str = "org.freedesktop.NetworkManager";
/// NetworkManager main object path.
const NM_PATH: &str = "/org/freedesktop/NetworkManager";
/// NetworkManager main interface.
const NM_IFACE: &str = "org.freedesktop.NetworkManager";
const NM_SETTINGS_PATH: &str = "/org/freedesktop/NetworkManager/Settings";
const NM_SETTINGS_IFACE: &str = "org.freedesktop.NetworkManager.Settings";
/// Settings.Connection interface.
const IFACE_CONNECTION: &str = "org.freedesktop.NetworkManager.Settings.Connection";
/// Connection.Active interface.
const IFACE_ACTIVE: &str = "org.freedesktop.NetworkManager.Connection.Active";
const IFACE_PROPS: &str = "org.freedesktop.DBus.Properties";

/// Returned by `GetConnectionByUuid` for an unknown UUID.
const ERR_INVALID_CONNECTION: &str = "org.freedesktop.NetworkManager.Settings.InvalidConnection";

/// Remote errors meaning the service itself is not there.
const TRANSPORT_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.freedesktop.DBus.Error.Disconnected",
    "org.freedesktop.DBus.Error.TimedOut",
    "org.freedesktop.DBus.Error.AccessDenied",
];

const CALL_TIMEOUT_MS: i32 = 5000;

/// [`ConnectionService`] backed by NetworkManager.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkManagerClient;

impl NetworkManagerClient {
    pub fn new() -> Self {
        Self
    }

    fn bus() -> Result<gio::DBusConnection, ServiceError> {
        gio::bus_get_sync(gio::BusType::System, None::<&gio::Cancellable>)
            .map_err(|e| ServiceError::Transport(format!("system bus: {}", e)))
    }

    fn call(
        bus: &gio::DBusConnection,
        path: &str,
        iface: &str,
        method: &str,
        args: Option<&Variant>,
        reply: &'static str,
    ) -> Result<Variant, ServiceError> {
        bus.call_sync(
            Some(NM_SERVICE),
            path,
            iface,
            method,
            args,
            glib::VariantTy::new(reply).ok(),
            gio::DBusCallFlags::NONE,
            CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
        )
        .map_err(|e| classify(method, &e))
    }

    /// Every stored connection profile.
    pub fn list_connections(&self) -> Result<Vec<NetworkConnection>, ServiceError> {
        let bus = Self::bus()?;
        let reply = Self::call(
            &bus,
            NM_SETTINGS_PATH,
            NM_SETTINGS_IFACE,
            "ListConnections",
            None,
            "(ao)",
        )?;

        let paths = reply.child_value(0);
        let mut result = Vec::with_capacity(paths.n_children());
        for i in 0..paths.n_children() {
            let path_variant = paths.child_value(i);
            let Some(path) = path_variant.str() else {
                continue;
            };
            let settings = match Self::settings(&bus, path) {
                Ok(s) => s,
                Err(e) => {
                    debug!("Skipping {}: {}", path, e);
                    continue;
                }
            };
            let Some(section) = get_dict_section(&settings, "connection") else {
                continue;
            };
            let (Some(uuid), Some(kind)) = (
                get_string_from_dict(&section, "uuid"),
                get_string_from_dict(&section, "type"),
            ) else {
                continue;
            };
            let name = get_string_from_dict(&section, "id").unwrap_or_default();
            result.push(NetworkConnection::from_nm(&kind, name, uuid));
        }
        Ok(result)
    }

    /// `GetSettings` of a connection, as the inner `a{sa{sv}}`.
    fn settings(bus: &gio::DBusConnection, path: &str) -> Result<Variant, ServiceError> {
        let reply = Self::call(
            bus,
            path,
            IFACE_CONNECTION,
            "GetSettings",
            None,
            "(a{sa{sv}})",
        )?;
        Ok(reply.child_value(0))
    }

    fn uuid_of(bus: &gio::DBusConnection, path: &str) -> Result<String, ServiceError> {
        let settings = Self::settings(bus, path)?;
        get_dict_section(&settings, "connection")
            .and_then(|section| get_string_from_dict(&section, "uuid"))
            .ok_or_else(|| ServiceError::Rpc(format!("connection {} has no uuid", path)))
    }
}

impl ConnectionService for NetworkManagerClient {
    fn find_by_id(&self, id: &str) -> Result<Option<ConnectionHandle>, ServiceError> {
        let bus = Self::bus()?;
        let result = bus.call_sync(
            Some(NM_SERVICE),
            NM_SETTINGS_PATH,
            NM_SETTINGS_IFACE,
            "GetConnectionByUuid",
            Some(&(id,).to_variant()),
            glib::VariantTy::new("(o)").ok(),
            gio::DBusCallFlags::NONE,
            CALL_TIMEOUT_MS,
            None::<&gio::Cancellable>,
        );

        match result {
            Ok(reply) => {
                let path = reply.child_value(0);
                match path.str() {
                    Some(p) => Ok(Some(ConnectionHandle(p.to_string()))),
                    None => Err(ServiceError::Rpc(format!(
                        "GetConnectionByUuid returned no path for {}",
                        id
                    ))),
                }
            }
            Err(e) if remote_name(&e).as_deref() == Some(ERR_INVALID_CONNECTION) => {
                debug!("No connection with uuid {}", id);
                Ok(None)
            }
            Err(e) => Err(classify("GetConnectionByUuid", &e)),
        }
    }

    fn create(&self, profile: &ConnectionProfile) -> Result<String, ServiceError> {
        let bus = Self::bus()?;
        let (uuid, settings) = new_connection_settings(profile);
        let reply = Self::call(
            &bus,
            NM_SETTINGS_PATH,
            NM_SETTINGS_IFACE,
            "AddConnection",
            Some(&(settings,).to_variant()),
            "(o)",
        )?;
        let path_variant = reply.child_value(0);
        debug!(
            "Added connection {} at {}",
            uuid,
            path_variant.str().unwrap_or("?")
        );
        Ok(uuid)
    }

    fn update(
        &self,
        handle: &ConnectionHandle,
        profile: &ConnectionProfile,
    ) -> Result<(), ServiceError> {
        let bus = Self::bus()?;
        // Update replaces every setting, so carry the existing uuid over.
        let uuid = Self::uuid_of(&bus, &handle.0)?;
        let args = (settings_map(profile, Some(&uuid)),).to_variant();
        Self::call(&bus, &handle.0, IFACE_CONNECTION, "Update", Some(&args), "()")?;
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<NetworkConnection>, ServiceError> {
        let bus = Self::bus()?;
        let reply = Self::call(
            &bus,
            NM_PATH,
            IFACE_PROPS,
            "Get",
            Some(&(NM_IFACE, "ActiveConnections").to_variant()),
            "(v)",
        )?;

        let inner = reply.child_value(0);
        let paths = inner.child_value(0);
        let mut result = Vec::with_capacity(paths.n_children());

        for i in 0..paths.n_children() {
            let path_variant = paths.child_value(i);
            let Some(path) = path_variant.str() else {
                continue;
            };
            // Active connections can vanish between the two calls.
            let props = match Self::call(
                &bus,
                path,
                IFACE_PROPS,
                "GetAll",
                Some(&(IFACE_ACTIVE,).to_variant()),
                "(a{sv})",
            ) {
                Ok(v) => v.child_value(0),
                Err(e) => {
                    debug!("Skipping active connection {}: {}", path, e);
                    continue;
                }
            };

            let Some(uuid) = get_string_from_dict(&props, "Uuid") else {
                continue;
            };
            let kind = get_string_from_dict(&props, "Type").unwrap_or_default();
            let name = get_string_from_dict(&props, "Id").unwrap_or_default();
            result.push(NetworkConnection::from_nm(&kind, name, uuid));
        }

        debug!("{} active connection(s)", result.len());
        Ok(result)
    }
}

/// Settings for `AddConnection` with a freshly generated uuid, so the id
/// is known before the call returns.
fn new_connection_settings(
    profile: &ConnectionProfile,
) -> (String, HashMap<String, HashMap<String, Variant>>) {
    let uuid = glib::uuid_string_random().to_string();
    let settings = settings_map(profile, Some(&uuid));
    (uuid, settings)
}

/// The `a{sa{sv}}` settings for a profile.
fn settings_map(
    profile: &ConnectionProfile,
    uuid: Option<&str>,
) -> HashMap<String, HashMap<String, Variant>> {
    let mut connection = HashMap::new();
    connection.insert("id".to_string(), profile.name.to_variant());
    connection.insert("type".to_string(), profile.connection_type().to_variant());
    connection.insert("autoconnect".to_string(), profile.autoconnect.to_variant());
    connection.insert("permissions".to_string(), profile.permissions.to_variant());
    if let Some(uuid) = uuid {
        connection.insert("uuid".to_string(), uuid.to_variant());
    }

    let data: HashMap<String, String> = profile
        .vpn_data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut vpn = HashMap::new();
    vpn.insert("service-type".to_string(), profile.service_type().to_variant());
    vpn.insert("data".to_string(), data.to_variant());

    let mut ipv4 = HashMap::new();
    ipv4.insert("method".to_string(), profile.ipv4_method().to_variant());
    ipv4.insert("never-default".to_string(), profile.never_default.to_variant());
    ipv4.insert("dns-search".to_string(), profile.dns_search.to_variant());
    ipv4.insert("dns".to_string(), profile.dns.to_variant());

    let mut settings = HashMap::new();
    settings.insert("connection".to_string(), connection);
    settings.insert("vpn".to_string(), vpn);
    settings.insert("ipv4".to_string(), ipv4);
    settings
}

fn remote_name(err: &glib::Error) -> Option<String> {
    gio::DBusError::remote_error(err).map(|name| name.to_string())
}

/// Sort a failed call into "NetworkManager unreachable" and "request rejected".
fn classify(method: &str, err: &glib::Error) -> ServiceError {
    let message = format!("{}: {}", method, err);
    match remote_name(err) {
        Some(name) if !TRANSPORT_ERRORS.contains(&name.as_str()) => ServiceError::Rpc(message),
        _ => {
            warn!("NetworkManager unreachable: {}", message);
            ServiceError::Transport(message)
        }
    }
}

/// A section from a settings dict (`a{sa{sv}}`).
fn get_dict_section(dict: &Variant, section: &str) -> Option<Variant> {
    for i in 0..dict.n_children() {
        let entry = dict.child_value(i);
        if entry.child_value(0).str() == Some(section) {
            return Some(entry.child_value(1));
        }
    }
    None
}

/// A string value from an `a{sv}` dict.
fn get_string_from_dict(dict: &Variant, key: &str) -> Option<String> {
    for i in 0..dict.n_children() {
        let entry = dict.child_value(i);
        if entry.child_value(0).str() == Some(key) {
            // The value is boxed in a `v`.
            let inner = entry.child_value(1).child_value(0);
            return inner.str().map(|s| s.to_string());
        }
    }
    None
}
