//! Configuration types and parsing.
//!
//! The configuration is a TOML file deep-merged over the embedded defaults
//! (`config.toml` at the workspace root). Enumerated settings (download type,
//! time units) are kept as raw [`ChoiceValue`]s and resolved on use, so an
//! unknown unit can be detected by the scheduler instead of rejecting the
//! whole file.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Table;

use crate::error::{Error, Result};
use crate::policy::AllowRules;

/// Embedded default configuration TOML, compiled into the binary.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../config.toml");

/// Path of the user configuration endpoint on the admin server.
pub const USER_CONFIG_API_PATH: &str = "/api/openvpn/user_config";

/// Valid range for `server.timeout_secs`.
const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=9;

/// Longest wait a GLib timeout source can represent (milliseconds in a
/// `guint`), about 49 days.
pub const MAX_WAIT: Duration = Duration::from_millis(u32::MAX as u64);

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Path where config was found, if any.
    pub source: Option<PathBuf>,
    /// Whether defaults were used (no config file found).
    pub used_defaults: bool,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Admin server connection settings.
    pub server: ServerConfig,

    /// What to download and when.
    pub download: DownloadConfig,

    /// Which active connections permit unattended downloads.
    pub allow: AllowConfig,
}

impl Config {
    /// Load configuration from the embedded default TOML string.
    pub fn from_default_toml() -> Result<Self> {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, merging with embedded defaults.
    ///
    /// Returns an error if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_with_defaults(&content)
    }

    /// Parse a TOML string, deep-merged over the embedded defaults.
    pub fn load_with_defaults(user_toml: &str) -> Result<Self> {
        let mut base: Table = toml::from_str(DEFAULT_CONFIG_TOML)
            .expect("embedded DEFAULT_CONFIG_TOML should always be valid");

        let user: Table = toml::from_str(user_toml)?;

        deep_merge_toml(&mut base, user);

        let config: Config = base.try_into()?;
        Ok(config)
    }

    /// Find and load configuration using the XDG lookup chain.
    ///
    /// An explicit path is used strictly (no fallback). Otherwise searches:
    /// 1. `$XDG_CONFIG_HOME/arachne-cdl/config.toml`
    /// 2. `~/.config/arachne-cdl/config.toml`
    /// 3. `./config.toml`
    ///
    /// A file that exists but fails to load is an error; defaults are only
    /// used when no file exists at all.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<ConfigLoadResult> {
        if let Some(path) = explicit_path {
            let config = Self::load(path)?;
            return Ok(ConfigLoadResult {
                config,
                source: Some(path.to_path_buf()),
                used_defaults: false,
            });
        }

        let search_paths = Self::config_search_paths();

        for path in &search_paths {
            if path.exists() {
                return match Self::load(path) {
                    Ok(config) => Ok(ConfigLoadResult {
                        config,
                        source: Some(path.clone()),
                        used_defaults: false,
                    }),
                    Err(e) => {
                        tracing::error!("Config file {:?} exists but failed to load: {}", path, e);
                        Err(e)
                    }
                };
            }
        }

        tracing::info!("No config file found, using built-in default config");
        tracing::debug!(
            "Searched: {}",
            search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ConfigLoadResult {
            config: Self::from_default_toml()?,
            source: None,
            used_defaults: true,
        })
    }

    /// Get the list of paths to search for config files.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_config).join("arachne-cdl/config.toml"));
        }

        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/arachne-cdl/config.toml"));
        }

        paths.push(PathBuf::from("config.toml"));

        paths
    }

    /// Validate the configuration, returning errors for invalid values.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let url = self.server.url.trim();
        if !url.is_empty() && !url.starts_with("https://") && !url.starts_with("http://") {
            errors.push(format!(
                "server.url: invalid value '{}', expected an http:// or https:// URL",
                url
            ));
        }

        if !TIMEOUT_RANGE.contains(&self.server.timeout_secs) {
            errors.push(format!(
                "server.timeout_secs: invalid value '{}', must be between {} and {}",
                self.server.timeout_secs,
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end()
            ));
        }

        if self.download.download_type().is_none() {
            errors.push(format!(
                "download.type: invalid value '{}', expected one of: {}",
                self.download.kind,
                DownloadType::NAMES.join(", ")
            ));
        }

        if self.download.delay == 0 {
            errors.push("download.delay: must be greater than 0".to_string());
        }

        if self.download.interval == 0 {
            errors.push("download.interval: must be greater than 0".to_string());
        }

        let too_long = |d: Option<Duration>| d.is_some_and(|d| d > MAX_WAIT);
        if too_long(self.download.initial_delay()) {
            errors.push(format!(
                "download.delay: {} {} is longer than the maximum of {} hours",
                self.download.delay,
                self.download.delay_unit,
                MAX_WAIT.as_secs() / 3600
            ));
        }
        if too_long(self.download.interval_duration()) {
            errors.push(format!(
                "download.interval: {} {} is longer than the maximum of {} hours",
                self.download.interval,
                self.download.interval_unit,
                MAX_WAIT.as_secs() / 3600
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors))
        }
    }

    /// Non-fatal issues worth surfacing to the user.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.ignore_ssl_errors {
            warnings.push(
                "server.ignore_ssl_errors: TLS certificate verification is disabled; \
                 the admin server's identity is not checked"
                    .to_string(),
            );
        }

        if TimeUnit::resolve(&self.download.delay_unit).is_none() {
            warnings.push(format!(
                "download.delay_unit: unknown unit '{}', automatic downloads will not run",
                self.download.delay_unit
            ));
        }

        if TimeUnit::resolve(&self.download.interval_unit).is_none() {
            warnings.push(format!(
                "download.interval_unit: unknown unit '{}', automatic downloads stop after the first attempt",
                self.download.interval_unit
            ));
        }

        warnings
    }

    /// Admin server base URL, derived from the host's DNS domain when unset.
    pub fn admin_server_url(&self) -> String {
        let url = self.server.url.trim();
        if !url.is_empty() {
            return url.trim_end_matches('/').to_string();
        }
        let host = sysinfo::System::host_name().unwrap_or_default();
        default_admin_server_url(&host)
    }

    /// Full URL of the user configuration endpoint for the given download type.
    pub fn user_config_url(&self, download_type: DownloadType) -> String {
        let mut url = format!("{}{}", self.admin_server_url(), USER_CONFIG_API_PATH);
        if download_type == DownloadType::NetworkManager {
            url.push_str("?format=json");
        }
        url
    }

    /// Human-readable summary of the configuration.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push("Server:".to_string());
        lines.push(format!("  url: {}", self.admin_server_url()));
        lines.push(format!("  timeout: {}s", self.server.timeout_secs));
        lines.push(format!(
            "  tls verification: {}",
            if self.server.ignore_ssl_errors {
                "disabled"
            } else {
                "enabled"
            }
        ));

        lines.push("\nDownload:".to_string());
        lines.push(format!("  type: {}", self.download.kind));
        lines.push(format!(
            "  automatic: {} (delay {} {}, interval {} {})",
            if self.download.auto { "yes" } else { "no" },
            self.download.delay,
            self.download.delay_unit,
            self.download.interval,
            self.download.interval_unit
        ));
        lines.push(format!("  destination: {}", self.download.destination));

        lines.push("\nAllow:".to_string());
        lines.push(format!(
            "  wifi: {}, wired: {}, vpn: {}",
            self.allow.wifi, self.allow.wired, self.allow.vpn
        ));
        if !self.allow.connections.is_empty() {
            lines.push(format!("  connections: {:?}", self.allow.connections));
        }

        lines.join("\n")
    }
}

/// `https://arachne.<domain>/arachne`, where `<domain>` is everything after
/// the first label of the host name.
pub fn default_admin_server_url(host_name: &str) -> String {
    match host_name.split_once('.') {
        Some((_, domain)) if !domain.is_empty() => {
            format!("https://arachne.{}/arachne", domain)
        }
        _ => "https://arachne/arachne".to_string(),
    }
}

/// Deep merge two TOML tables, with `overlay` values taking precedence.
///
/// For nested tables, recursively merges. For arrays and other values,
/// the overlay value completely replaces the base value.
fn deep_merge_toml(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(&key), overlay_value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge_toml(base_table, overlay_table);
            }
            (_, overlay_value) => {
                base.insert(key, overlay_value);
            }
        }
    }
}

/// A stored enumerated setting: either a positional index or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Index(i64),
    Name(String),
}

impl ChoiceValue {
    /// The index this value denotes, if any. Numeric strings count as
    /// indices and take precedence over name matching.
    fn as_index(&self) -> Option<i64> {
        match self {
            ChoiceValue::Index(i) => Some(*i),
            ChoiceValue::Name(s) => s.trim().parse().ok(),
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            ChoiceValue::Index(_) => None,
            ChoiceValue::Name(s) => Some(s.trim()),
        }
    }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceValue::Index(i) => write!(f, "{}", i),
            ChoiceValue::Name(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self {
        ChoiceValue::Name(value.to_string())
    }
}

/// Unit for the download delay and interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    const ALL: [TimeUnit; 3] = [TimeUnit::Seconds, TimeUnit::Minutes, TimeUnit::Hours];

    /// Resolve a stored value. Accepts an index (0 = seconds), the canonical
    /// name (`"minutes"`) or the legacy name (`"MIN"`). Unknown values fall
    /// back to nothing; callers decide what that means.
    pub fn resolve(value: &ChoiceValue) -> Option<Self> {
        if let Some(index) = value.as_index() {
            return usize::try_from(index)
                .ok()
                .and_then(|i| Self::ALL.get(i).copied());
        }
        match value.as_name()? {
            "seconds" | "SEC" => Some(TimeUnit::Seconds),
            "minutes" | "MIN" => Some(TimeUnit::Minutes),
            "hours" | "HOUR" => Some(TimeUnit::Hours),
            _ => None,
        }
    }

    pub fn seconds_per_unit(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
        }
    }

    /// `value` of this unit as a duration.
    pub fn duration(self, value: u32) -> Duration {
        Duration::from_secs(u64::from(value) * self.seconds_per_unit())
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
        }
    }
}

/// What the downloader produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadType {
    /// Create or update a NetworkManager VPN connection.
    NetworkManager,
    /// Save a plain OpenVPN configuration file.
    Ovpn,
}

impl DownloadType {
    const ALL: [DownloadType; 2] = [DownloadType::NetworkManager, DownloadType::Ovpn];
    const NAMES: [&'static str; 2] = ["network-manager", "ovpn"];

    /// Resolve a stored value (index, canonical name or legacy name).
    pub fn resolve(value: &ChoiceValue) -> Option<Self> {
        if let Some(index) = value.as_index() {
            return usize::try_from(index)
                .ok()
                .and_then(|i| Self::ALL.get(i).copied());
        }
        match value.as_name()? {
            "network-manager" | "NETWORK_MANAGER" => Some(DownloadType::NetworkManager),
            "ovpn" | "OVPN" => Some(DownloadType::Ovpn),
            _ => None,
        }
    }
}

/// Admin server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the Arachne admin server. Empty derives
    /// `https://arachne.<domain>/arachne` from the host name.
    pub url: String,

    /// Disable TLS certificate verification.
    pub ignore_ssl_errors: bool,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ignore_ssl_errors: false,
            timeout_secs: 6,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// `"network-manager"` or `"ovpn"`.
    #[serde(rename = "type")]
    pub kind: ChoiceValue,

    /// Download periodically.
    pub auto: bool,

    /// Delay before the first automatic download.
    pub delay: u32,
    pub delay_unit: ChoiceValue,

    /// Interval between automatic downloads.
    pub interval: u32,
    pub interval_unit: ChoiceValue,

    /// Directory receiving the `.ovpn` file in ovpn mode. A leading `~/`
    /// is expanded to the home directory.
    pub destination: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            kind: "network-manager".into(),
            auto: true,
            delay: 5,
            delay_unit: "minutes".into(),
            interval: 60,
            interval_unit: "minutes".into(),
            destination: "~/.config/openvpn".to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn download_type(&self) -> Option<DownloadType> {
        DownloadType::resolve(&self.kind)
    }

    /// Delay before the first automatic download, if the unit resolves.
    pub fn initial_delay(&self) -> Option<Duration> {
        TimeUnit::resolve(&self.delay_unit).map(|unit| unit.duration(self.delay))
    }

    /// Interval between automatic downloads, if the unit resolves.
    pub fn interval_duration(&self) -> Option<Duration> {
        TimeUnit::resolve(&self.interval_unit).map(|unit| unit.duration(self.interval))
    }

    /// Destination directory with `~` expanded against `home`.
    pub fn destination_dir(&self, home: &Path) -> PathBuf {
        expand_home(&self.destination, home)
    }
}

/// Expand a leading `~` or `~/` in `path`.
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Rules for unattended downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllowConfig {
    /// Allow downloads over any Wi-Fi connection.
    pub wifi: bool,
    /// Allow downloads over any wired connection.
    pub wired: bool,
    /// Allow downloads over the managed VPN connection.
    pub vpn: bool,
    /// Connection UUIDs that always allow downloads.
    pub connections: Vec<String>,
}

impl Default for AllowConfig {
    fn default() -> Self {
        Self {
            wifi: true,
            wired: true,
            vpn: true,
            connections: Vec::new(),
        }
    }
}

impl AllowConfig {
    /// Admission rules, with the VPN clause bound to the managed connection.
    pub fn rules(&self, managed_connection_id: Option<&str>) -> AllowRules {
        AllowRules {
            allow_wifi: self.wifi,
            allow_wired: self.wired,
            allow_vpn: self.vpn,
            vpn_connection_id: managed_connection_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            allow_list: self.connections.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_config_parses_and_validates() {
        let config = Config::from_default_toml().unwrap();
        config.validate().unwrap();
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_embedded_default_matches_struct_defaults() {
        let config = Config::from_default_toml().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_defaults_nested_override() {
        let user_toml = r#"
            [download]
            type = "ovpn"
        "#;

        let config = Config::load_with_defaults(user_toml).unwrap();

        assert_eq!(config.download.download_type(), Some(DownloadType::Ovpn));
        assert_eq!(config.download.interval, 60);
        assert!(config.allow.wifi);
    }

    #[test]
    fn test_load_with_defaults_rejects_unknown_fields() {
        let user_toml = r#"
            [allow]
            ethernet = true
        "#;
        assert!(Config::load_with_defaults(user_toml).is_err());
    }

    #[test]
    fn test_load_with_defaults_rejects_unknown_section() {
        assert!(Config::load_with_defaults("[tray]\nicon = \"blue\"").is_err());
    }

    #[test]
    fn test_deep_merge_toml_arrays_replace() {
        let mut base: Table = toml::from_str("[allow]\nconnections = [\"a\", \"b\"]").unwrap();
        let overlay: Table = toml::from_str("[allow]\nconnections = [\"c\"]").unwrap();

        deep_merge_toml(&mut base, overlay);

        let connections = base["allow"]["connections"].as_array().unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].as_str(), Some("c"));
    }

    #[test]
    fn test_time_unit_conversion_is_exact() {
        assert_eq!(TimeUnit::Seconds.duration(7), Duration::from_secs(7));
        assert_eq!(TimeUnit::Minutes.duration(7), Duration::from_secs(420));
        assert_eq!(TimeUnit::Hours.duration(7), Duration::from_secs(25_200));
        assert_eq!(
            TimeUnit::Hours.duration(u32::MAX),
            Duration::from_secs(u64::from(u32::MAX) * 3600)
        );
    }

    #[test]
    fn test_time_unit_resolve_names_and_indices() {
        assert_eq!(TimeUnit::resolve(&"minutes".into()), Some(TimeUnit::Minutes));
        assert_eq!(TimeUnit::resolve(&"HOUR".into()), Some(TimeUnit::Hours));
        assert_eq!(TimeUnit::resolve(&ChoiceValue::Index(0)), Some(TimeUnit::Seconds));
        assert_eq!(TimeUnit::resolve(&"2".into()), Some(TimeUnit::Hours));
        assert_eq!(TimeUnit::resolve(&ChoiceValue::Index(3)), None);
        assert_eq!(TimeUnit::resolve(&ChoiceValue::Index(-1)), None);
        assert_eq!(TimeUnit::resolve(&"fortnights".into()), None);
    }

    #[test]
    fn test_download_type_resolve() {
        assert_eq!(
            DownloadType::resolve(&"NETWORK_MANAGER".into()),
            Some(DownloadType::NetworkManager)
        );
        assert_eq!(
            DownloadType::resolve(&ChoiceValue::Index(1)),
            Some(DownloadType::Ovpn)
        );
        assert_eq!(DownloadType::resolve(&"pdf".into()), None);
    }

    #[test]
    fn test_choice_value_accepts_integers_in_toml() {
        let config = Config::load_with_defaults("[download]\ninterval_unit = 2").unwrap();
        assert_eq!(config.download.interval_unit, ChoiceValue::Index(2));
        assert_eq!(
            config.download.interval_duration(),
            Some(Duration::from_secs(60 * 3600))
        );
    }

    #[test]
    fn test_delay_and_interval_use_their_own_units() {
        let config = Config::load_with_defaults(
            r#"
            [download]
            delay = 30
            delay_unit = "seconds"
            interval = 2
            interval_unit = "hours"
        "#,
        )
        .unwrap();
        assert_eq!(config.download.initial_delay(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.download.interval_duration(),
            Some(Duration::from_secs(7200))
        );
    }

    #[test]
    fn test_validate_multiple_errors() {
        let mut config = Config::default();
        config.server.url = "ftp://arachne".to_string();
        config.server.timeout_secs = 30;
        config.download.kind = "pdf".into();
        config.download.interval = 0;

        match config.validate() {
            Err(Error::ConfigValidation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_waits_beyond_timer_range() {
        let mut config = Config::default();
        config.download.interval = 1200;
        config.download.interval_unit = "hours".into();

        match config.validate() {
            Err(Error::ConfigValidation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("download.interval"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // 1193 hours still fits in u32 milliseconds.
        config.download.interval = 1193;
        assert!(config.validate().is_ok());
        assert!(config.download.interval_duration().unwrap() <= MAX_WAIT);

        config.download.delay = 4_294_968;
        config.download.delay_unit = "seconds".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_unit_is_warning_not_error() {
        let mut config = Config::default();
        config.download.interval_unit = "fortnights".into();

        assert!(config.validate().is_ok());
        assert!(
            config
                .warnings()
                .iter()
                .any(|w| w.starts_with("download.interval_unit"))
        );
    }

    #[test]
    fn test_ignore_ssl_errors_warns() {
        let mut config = Config::default();
        config.server.ignore_ssl_errors = true;
        assert!(
            config
                .warnings()
                .iter()
                .any(|w| w.contains("verification is disabled"))
        );
    }

    #[test]
    fn test_default_admin_server_url() {
        assert_eq!(
            default_admin_server_url("laptop.example.com"),
            "https://arachne.example.com/arachne"
        );
        assert_eq!(default_admin_server_url("laptop"), "https://arachne/arachne");
    }

    #[test]
    fn test_user_config_url() {
        let mut config = Config::default();
        config.server.url = "https://vpn.example.com/arachne/".to_string();

        assert_eq!(
            config.user_config_url(DownloadType::NetworkManager),
            "https://vpn.example.com/arachne/api/openvpn/user_config?format=json"
        );
        assert_eq!(
            config.user_config_url(DownloadType::Ovpn),
            "https://vpn.example.com/arachne/api/openvpn/user_config"
        );
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/alice");
        assert_eq!(expand_home("~/vpn", home), PathBuf::from("/home/alice/vpn"));
        assert_eq!(expand_home("~", home), PathBuf::from("/home/alice"));
        assert_eq!(expand_home("/etc/openvpn", home), PathBuf::from("/etc/openvpn"));
    }

    #[test]
    fn test_allow_rules_bind_managed_id() {
        let allow = AllowConfig {
            connections: vec!["home".to_string()],
            ..AllowConfig::default()
        };

        let rules = allow.rules(Some("managed"));
        assert_eq!(rules.vpn_connection_id.as_deref(), Some("managed"));
        assert!(rules.allow_list.contains("home"));

        assert_eq!(allow.rules(Some("")).vpn_connection_id, None);
        assert_eq!(allow.rules(None).vpn_connection_id, None);
    }

    #[test]
    fn test_config_search_paths() {
        let paths = Config::config_search_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("config.toml")));
    }
}
