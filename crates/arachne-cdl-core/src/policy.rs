//! Admission policy for unattended downloads.
//!
//! Decides from the currently active connections whether a scheduled
//! download may run. Manual downloads never consult this.

use std::collections::HashSet;

use crate::connection::{ConnectionType, NetworkConnection};

/// User-configured rules for unattended downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowRules {
    pub allow_wifi: bool,
    pub allow_wired: bool,
    pub allow_vpn: bool,
    /// UUID of the VPN connection that counts for `allow_vpn` (the managed
    /// connection).
    pub vpn_connection_id: Option<String>,
    /// Connection UUIDs that are always allowed.
    pub allow_list: HashSet<String>,
}

impl AllowRules {
    /// Whether this single connection satisfies any admission clause.
    pub fn admits(&self, con: &NetworkConnection) -> bool {
        if self.allow_list.contains(&con.id) {
            return true;
        }
        match con.kind {
            ConnectionType::Wifi => self.allow_wifi,
            ConnectionType::Wired => self.allow_wired,
            ConnectionType::Vpn => {
                self.allow_vpn && self.vpn_connection_id.as_deref() == Some(con.id.as_str())
            }
            ConnectionType::Other => false,
        }
    }
}

/// Whether an unattended download may proceed over the given connections.
pub fn is_download_allowed(active: &[NetworkConnection], rules: &AllowRules) -> bool {
    active.iter().any(|con| rules.admits(con))
}

/// Like [`is_download_allowed`], but returns the connection that admitted
/// the download for logging.
pub fn admitting_connection<'a>(
    active: &'a [NetworkConnection],
    rules: &AllowRules,
) -> Option<&'a NetworkConnection> {
    active.iter().find(|con| rules.admits(con))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wired_only() -> AllowRules {
        AllowRules {
            allow_wifi: false,
            allow_wired: true,
            allow_vpn: false,
            vpn_connection_id: None,
            allow_list: HashSet::new(),
        }
    }

    #[test]
    fn test_wifi_denied_when_only_wired_allowed() {
        let active = vec![NetworkConnection::new(ConnectionType::Wifi, "Cafe", "w1")];
        assert!(!is_download_allowed(&active, &wired_only()));
    }

    #[test]
    fn test_wired_allowed() {
        let active = vec![NetworkConnection::new(ConnectionType::Wired, "eth0", "abc")];
        assert!(is_download_allowed(&active, &wired_only()));
    }

    #[test]
    fn test_no_active_connections() {
        let rules = AllowRules {
            allow_wifi: true,
            allow_wired: true,
            allow_vpn: true,
            ..AllowRules::default()
        };
        assert!(!is_download_allowed(&[], &rules));
    }

    #[test]
    fn test_vpn_requires_matching_id() {
        let mut rules = AllowRules {
            allow_vpn: true,
            vpn_connection_id: Some("managed".into()),
            ..AllowRules::default()
        };
        let other_vpn = vec![NetworkConnection::new(ConnectionType::Vpn, "x", "other")];
        let managed_vpn = vec![NetworkConnection::new(ConnectionType::Vpn, "x", "managed")];

        assert!(!is_download_allowed(&other_vpn, &rules));
        assert!(is_download_allowed(&managed_vpn, &rules));

        rules.allow_vpn = false;
        assert!(!is_download_allowed(&managed_vpn, &rules));
    }

    #[test]
    fn test_vpn_without_managed_id_is_denied() {
        let rules = AllowRules {
            allow_vpn: true,
            ..AllowRules::default()
        };
        let active = vec![NetworkConnection::new(ConnectionType::Vpn, "x", "")];
        assert!(!is_download_allowed(&active, &rules));
    }

    #[test]
    fn test_allow_list_overrides_type_rules() {
        let mut rules = AllowRules::default();
        rules.allow_list.insert("home-wifi".into());
        let active = vec![
            NetworkConnection::new(ConnectionType::Wifi, "Cafe", "cafe"),
            NetworkConnection::new(ConnectionType::Wifi, "Home", "home-wifi"),
        ];
        assert_eq!(
            admitting_connection(&active, &rules).map(|c| c.id.as_str()),
            Some("home-wifi")
        );
    }

    #[test]
    fn test_other_connections_never_admit_by_type() {
        let rules = AllowRules {
            allow_wifi: true,
            allow_wired: true,
            allow_vpn: true,
            vpn_connection_id: Some("lo".into()),
            allow_list: HashSet::new(),
        };
        let active = vec![NetworkConnection::new(ConnectionType::Other, "lo", "lo")];
        assert!(!is_download_allowed(&active, &rules));
    }

    fn arb_kind() -> impl Strategy<Value = ConnectionType> {
        prop_oneof![
            Just(ConnectionType::Wired),
            Just(ConnectionType::Wifi),
            Just(ConnectionType::Vpn),
            Just(ConnectionType::Other),
        ]
    }

    fn arb_connection() -> impl Strategy<Value = NetworkConnection> {
        (arb_kind(), "[a-d]{1,2}").prop_map(|(kind, id)| NetworkConnection::new(kind, "c", id))
    }

    fn arb_rules() -> impl Strategy<Value = AllowRules> {
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            proptest::option::of("[a-d]{1,2}"),
            proptest::collection::hash_set("[a-d]{1,2}", 0..3),
        )
            .prop_map(
                |(allow_wifi, allow_wired, allow_vpn, vpn_connection_id, allow_list)| AllowRules {
                    allow_wifi,
                    allow_wired,
                    allow_vpn,
                    vpn_connection_id,
                    allow_list,
                },
            )
    }

    proptest! {
        #[test]
        fn prop_allowed_iff_some_clause_holds(
            active in proptest::collection::vec(arb_connection(), 0..5),
            rules in arb_rules(),
        ) {
            let expected = active.iter().any(|c| {
                rules.allow_list.contains(&c.id)
                    || (c.kind == ConnectionType::Wifi && rules.allow_wifi)
                    || (c.kind == ConnectionType::Wired && rules.allow_wired)
                    || (c.kind == ConnectionType::Vpn
                        && rules.allow_vpn
                        && rules.vpn_connection_id.as_deref() == Some(c.id.as_str()))
            });
            prop_assert_eq!(is_download_allowed(&active, &rules), expected);
        }

        #[test]
        fn prop_allow_listed_connection_always_admits(
            mut active in proptest::collection::vec(arb_connection(), 0..5),
            mut rules in arb_rules(),
            kind in arb_kind(),
        ) {
            rules.allow_list.insert("listed".to_string());
            active.push(NetworkConnection::new(kind, "listed", "listed"));
            prop_assert!(is_download_allowed(&active, &rules));
        }
    }
}
