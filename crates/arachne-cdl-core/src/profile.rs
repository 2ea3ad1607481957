//! The NetworkManager connection profile built from a downloaded
//! [`UserConfig`].

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::certs::CertificatePaths;
use crate::payload::UserConfig;

/// `connection.type` of the managed connection.
pub const CONNECTION_TYPE_VPN: &str = "vpn";
/// `vpn.service-type` of the OpenVPN NetworkManager plugin.
pub const OPENVPN_SERVICE_TYPE: &str = "org.freedesktop.NetworkManager.openvpn";
/// `ipv4.method` of the managed connection.
pub const IPV4_METHOD_AUTO: &str = "auto";

/// Settings for the managed connection, independent of the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// `connection.id`
    pub name: String,
    /// `connection.permissions`, e.g. `["user:alice"]`.
    pub permissions: Vec<String>,
    pub autoconnect: bool,
    /// `vpn.data`
    pub vpn_data: BTreeMap<String, String>,
    pub never_default: bool,
    pub dns_search: Vec<String>,
    /// `ipv4.dns` as NetworkManager expects it: each address as a `u32` in
    /// network byte order.
    pub dns: Vec<u32>,
}

impl ConnectionProfile {
    /// Build the profile for `user`. Payload data is layered over the
    /// certificate file references, so the server may override them.
    pub fn build(config: &UserConfig, user: &str, certs: &CertificatePaths) -> Self {
        let mut vpn_data = BTreeMap::new();
        vpn_data.insert("ca".to_string(), certs.ca.display().to_string());
        vpn_data.insert("cert".to_string(), certs.cert.display().to_string());
        vpn_data.insert("key".to_string(), certs.key.display().to_string());
        vpn_data.extend(config.data_strings());

        Self {
            name: config.name.clone(),
            permissions: vec![format!("user:{}", user)],
            autoconnect: false,
            vpn_data,
            never_default: config.ipv4.never_default,
            dns_search: config.ipv4.dns_search.clone(),
            dns: config.ipv4.dns.iter().copied().map(dns_to_nm).collect(),
        }
    }

    pub fn connection_type(&self) -> &'static str {
        CONNECTION_TYPE_VPN
    }

    pub fn service_type(&self) -> &'static str {
        OPENVPN_SERVICE_TYPE
    }

    pub fn ipv4_method(&self) -> &'static str {
        IPV4_METHOD_AUTO
    }
}

/// An IPv4 address as the `u32` whose in-memory bytes are the address
/// octets (what `htonl` yields on the host).
pub fn dns_to_nm(addr: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(addr.octets())
}
