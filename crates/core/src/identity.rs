//! User identities and the registered-identity table

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashSet;

use crate::{IdentityError, TunnelId};

/// Reserved id meaning "no authentication required".
///
/// Never accepted from a remote peer.
pub const ROOT_ID: &str = "root";

/// A user credential record.
///
/// The same type serves as a registered entry (where `ip` is an optional
/// binding restriction) and as a candidate parsed off the wire (where `ip`
/// is the observed source address of the peer).
pub struct Identity {
    id: String,
    secret: String,
    ip: Option<IpAddr>,
    tunnels: DashSet<TunnelId>,
}

impl Identity {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            ip: None,
            tunnels: DashSet::new(),
        }
    }

    /// The root sentinel identity.
    pub fn root() -> Self {
        Self::new(ROOT_ID, "")
    }

    /// Restrict (registered) or annotate (candidate) this identity with an address.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Parse the `id:secret` credential line sent by a peer.
    pub fn parse(line: &str, source_ip: Option<IpAddr>) -> Result<Self, IdentityError> {
        let line = line.trim();
        let (id, secret) = line.split_once(':').ok_or(IdentityError::Malformed)?;
        if id.is_empty() || secret.is_empty() {
            return Err(IdentityError::Malformed);
        }

        let mut identity = Self::new(id, secret);
        identity.ip = source_ip;
        Ok(identity)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Single-line wire form sent to the next hop.
    pub fn to_wire(&self) -> String {
        format!("{}:{}", self.id, self.secret)
    }

    /// Check a candidate presented by a peer against this registered entry.
    ///
    /// The secret is compared first so a wrong password never reveals
    /// whether an address binding exists.
    pub fn check_auth(&self, candidate: &Identity) -> Result<(), IdentityError> {
        if self.id != candidate.id || self.secret != candidate.secret {
            return Err(IdentityError::IncorrectCredentials);
        }
        if let Some(bound) = self.ip {
            if candidate.ip != Some(bound) {
                return Err(IdentityError::AddressNotAllowed);
            }
        }
        Ok(())
    }

    /// Record a tunnel authenticated under this identity.
    ///
    /// Safe to call concurrently from many connection tasks.
    pub fn add_tunnel(&self, tunnel: TunnelId) {
        self.tunnels.insert(tunnel);
    }

    pub fn has_tunnel(&self, tunnel: &TunnelId) -> bool {
        self.tunnels.contains(tunnel)
    }

    pub fn tunnel_count(&self) -> usize {
        self.tunnels.len()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("ip", &self.ip)
            .field("tunnels", &self.tunnels.len())
            .finish_non_exhaustive()
    }
}

/// Registered identities, keyed by id.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct IdentityTable {
    entries: HashMap<String, Arc<Identity>>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: Identity) -> Arc<Identity> {
        let identity = Arc::new(identity);
        self.entries
            .insert(identity.id().to_string(), identity.clone());
        identity
    }

    pub fn get(&self, id: &str) -> Option<Arc<Identity>> {
        self.entries.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Identity> for IdentityTable {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut table = Self::new();
        for identity in iter {
            table.insert(identity);
        }
        table
    }
}
