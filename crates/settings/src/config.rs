//! Configuration types

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use eagletunnel_core::{Identity, IdentityTable, ProxyMode};

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Address the node accepts ET connections on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Next hop `host:port`; absent means this node is the last hop
    #[serde(default)]
    pub relayer: Option<String>,

    /// Shared one-byte cipher key
    #[serde(default = "default_encrypt_key")]
    pub encrypt_key: u8,

    /// Require credentials from inbound peers
    #[serde(default)]
    pub auth_enabled: bool,

    /// Identity presented to the next hop; absent means `root`
    #[serde(default)]
    pub local_user: Option<UserEntry>,

    /// Identities accepted from inbound peers
    #[serde(default)]
    pub users: Vec<UserEntry>,

    /// Static name → address overrides
    #[serde(default)]
    pub hosts: HashMap<String, String>,

    /// Static address → location code table
    #[serde(default)]
    pub locations: HashMap<String, String>,

    /// Routing policy with a relayer: `enable` or `smart`
    #[serde(default = "default_proxy_mode")]
    pub proxy_mode: String,

    /// Location code `smart` mode reaches directly
    #[serde(default)]
    pub home_location: Option<String>,

    /// Limit on each handshake and authentication read or write
    #[serde(default)]
    pub handshake_timeout_secs: Option<u64>,

    /// Dial timeout for the next hop
    #[serde(default = "default_relay_connect_timeout")]
    pub relay_connect_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// One user credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub password: String,
    /// Only accept this user from this address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_encrypt_key() -> u8 {
    0x22
}

fn default_proxy_mode() -> String {
    ProxyMode::Enable.as_str().to_string()
}

fn default_relay_connect_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            relayer: None,
            encrypt_key: default_encrypt_key(),
            auth_enabled: false,
            local_user: None,
            users: Vec::new(),
            hosts: HashMap::new(),
            locations: HashMap::new(),
            proxy_mode: default_proxy_mode(),
            home_location: None,
            handshake_timeout_secs: None,
            relay_connect_timeout_secs: default_relay_connect_timeout(),
            log_level: default_log_level(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.to_path_buf());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.to_path_buf());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| invalid("listen", format!("not a socket address: {}", self.listen)))
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs.map(Duration::from_secs)
    }

    pub fn relay_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_connect_timeout_secs)
    }

    /// Identity this node presents to its next hop.
    pub fn local_identity(&self) -> Result<Identity> {
        match &self.local_user {
            Some(entry) => entry.to_identity("local_user"),
            None => Ok(Identity::root()),
        }
    }

    /// Table of identities accepted from inbound peers.
    pub fn identity_table(&self) -> Result<IdentityTable> {
        let mut table = IdentityTable::new();
        for entry in &self.users {
            table.insert(entry.to_identity("users")?);
        }
        Ok(table)
    }

    /// Parsed static host overrides.
    pub fn host_overrides(&self) -> Result<Vec<(String, IpAddr)>> {
        self.hosts
            .iter()
            .map(|(name, ip)| Ok((name.clone(), parse_ip("hosts", ip)?)))
            .collect()
    }

    pub fn proxy_mode(&self) -> Result<ProxyMode> {
        match self.proxy_mode.to_ascii_lowercase().as_str() {
            "enable" => Ok(ProxyMode::Enable),
            "smart" => Ok(ProxyMode::Smart),
            other => Err(invalid(
                "proxy_mode",
                format!("expected enable or smart, got {:?}", other),
            )),
        }
    }

    /// Parsed static location table.
    pub fn location_table(&self) -> Result<HashMap<IpAddr, String>> {
        self.locations
            .iter()
            .map(|(ip, code)| Ok((parse_ip("locations", ip)?, code.clone())))
            .collect()
    }
}

impl UserEntry {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
            ip: None,
        }
    }

    fn to_identity(&self, field: &str) -> Result<Identity> {
        if self.id.is_empty() || self.id.contains(':') {
            return Err(invalid(field, format!("invalid user id {:?}", self.id)));
        }
        let identity = Identity::new(&self.id, &self.password);
        match &self.ip {
            Some(ip) => Ok(identity.with_ip(parse_ip(field, ip)?)),
            None => Ok(identity),
        }
    }
}

fn invalid(field: &str, reason: String) -> SettingsError {
    SettingsError::Invalid {
        field: field.to_string(),
        reason,
    }
}

fn parse_ip(field: &str, raw: &str) -> Result<IpAddr> {
    raw.parse()
        .map_err(|_| invalid(field, format!("not an IP address: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.listen, "0.0.0.0:8080");
        assert_eq!(settings.encrypt_key, 0x22);
        assert!(!settings.auth_enabled);
        assert!(settings.relayer.is_none());
        assert!(settings.handshake_timeout().is_none());
        assert_eq!(settings.relay_connect_timeout(), Duration::from_secs(5));
        assert!(settings.local_identity().unwrap().is_root());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.listen, "0.0.0.0:8080");
        assert_eq!(settings.relay_connect_timeout_secs, 5);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.proxy_mode().unwrap(), ProxyMode::Enable);
        assert!(settings.home_location.is_none());
    }

    #[test]
    fn test_proxy_mode() {
        let settings: Settings =
            serde_json::from_str(r#"{ "proxy_mode": "Smart", "home_location": "CN" }"#).unwrap();
        assert_eq!(settings.proxy_mode().unwrap(), ProxyMode::Smart);
        assert_eq!(settings.home_location.as_deref(), Some("CN"));

        let mut settings = Settings::default();
        settings.proxy_mode = "sometimes".to_string();
        assert!(matches!(
            settings.proxy_mode(),
            Err(SettingsError::Invalid { .. })
        ));
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"{
            "listen": "127.0.0.1:9000",
            "relayer": "10.0.0.2:8080",
            "encrypt_key": 51,
            "auth_enabled": true,
            "local_user": { "id": "edge", "password": "pw" },
            "users": [
                { "id": "alice", "password": "a" },
                { "id": "bob", "password": "b", "ip": "192.168.1.5" }
            ],
            "hosts": { "router.lan": "192.168.0.1" },
            "locations": { "114.114.114.114": "CN" },
            "handshake_timeout_secs": 10
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.listen_addr().unwrap().port(), 9000);
        assert_eq!(settings.encrypt_key, 51);
        assert_eq!(settings.handshake_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(settings.local_identity().unwrap().to_wire(), "edge:pw");

        let table = settings.identity_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("bob").unwrap().ip(),
            Some("192.168.1.5".parse().unwrap())
        );

        assert_eq!(settings.host_overrides().unwrap().len(), 1);
        let dns: IpAddr = "114.114.114.114".parse().unwrap();
        assert_eq!(settings.location_table().unwrap()[&dns], "CN");
    }

    #[test]
    fn test_invalid_entries() {
        let mut settings = Settings::default();
        settings.users.push(UserEntry {
            id: "carol".to_string(),
            password: "c".to_string(),
            ip: Some("not-an-ip".to_string()),
        });
        assert!(matches!(
            settings.identity_table(),
            Err(SettingsError::Invalid { .. })
        ));

        let mut settings = Settings::default();
        settings.users.push(UserEntry::new("a:b", "pw"));
        assert!(settings.identity_table().is_err());

        let mut settings = Settings::default();
        settings.listen = "nowhere".to_string();
        assert!(settings.listen_addr().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.relayer = Some("10.0.0.2:8080".to_string());
        settings.users.push(UserEntry::new("alice", "secret"));
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.relayer.as_deref(), Some("10.0.0.2:8080"));
        assert_eq!(loaded.users, vec![UserEntry::new("alice", "secret")]);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.listen, "0.0.0.0:8080");
    }
}
