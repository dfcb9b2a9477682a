//! Argument bag for outbound `send` calls

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{EtType, Identity, Tunnel};

/// Tunnel shared between the caller of `send` and the handler filling it in.
pub type SharedTunnel = Arc<Mutex<Tunnel>>;

/// Context threaded through a handler's `send`.
///
/// The caller owns the value. `Clone` gives an independent copy: the
/// argument list is reallocated, while the tunnel and identity stay shared
/// references, so two relay attempts derived from one `NetArg` never see
/// each other's edits.
#[derive(Debug, Clone)]
pub struct NetArg {
    pub domain: String,
    pub ip: Option<IpAddr>,
    pub port: u16,
    pub tunnel: Option<SharedTunnel>,
    pub identity: Option<Arc<Identity>>,
    pub ty: EtType,
    pub reply: String,
    pub flag: bool,
    pub args: Vec<String>,
}

impl NetArg {
    pub fn new(ty: EtType) -> Self {
        Self {
            domain: String::new(),
            ip: None,
            port: 0,
            tunnel: None,
            identity: None,
            ty,
            reply: String::new(),
            flag: false,
            args: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tunnel(mut self, tunnel: SharedTunnel) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    pub fn with_identity(mut self, identity: Arc<Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Host part of the target: the domain if set, else the IP.
    pub fn host(&self) -> Option<String> {
        if !self.domain.is_empty() {
            Some(self.domain.clone())
        } else {
            self.ip.map(|ip| ip.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_args_independent() {
        for len in [0usize, 1, 5] {
            let original = NetArg::new(EtType::Ask).with_args((0..len).map(|i| i.to_string()));
            let mut copy = original.clone();

            copy.args.push("extra".to_string());
            if let Some(first) = copy.args.first_mut() {
                first.push('!');
            }

            assert_eq!(original.args.len(), len);
            assert_eq!(copy.args.len(), len + 1);
            for (i, arg) in original.args.iter().enumerate() {
                assert_eq!(arg, &i.to_string());
            }
        }
    }

    #[test]
    fn test_clone_keeps_scalar_fields() {
        let original = NetArg::new(EtType::Tcp)
            .with_domain("example.com")
            .with_port(443);
        let mut copy = original.clone();
        copy.reply = "ok".to_string();
        copy.flag = true;

        assert_eq!(copy.domain, "example.com");
        assert_eq!(copy.port, 443);
        assert_eq!(copy.ty, EtType::Tcp);
        assert!(original.reply.is_empty());
        assert!(!original.flag);
    }

    #[test]
    fn test_clone_shares_tunnel() {
        let tunnel: SharedTunnel = Arc::new(Mutex::new(Tunnel::new(0x22)));
        let original = NetArg::new(EtType::Tcp).with_tunnel(tunnel.clone());
        let copy = original.clone();
        assert!(Arc::ptr_eq(copy.tunnel.as_ref().unwrap(), &tunnel));
        assert_eq!(Arc::strong_count(&tunnel), 3);
    }

    #[test]
    fn test_host_prefers_domain() {
        let ip: IpAddr = "1.1.1.1".parse().unwrap();
        assert_eq!(NetArg::new(EtType::Tcp).host(), None);
        assert_eq!(
            NetArg::new(EtType::Tcp).with_ip(ip).host().as_deref(),
            Some("1.1.1.1")
        );
        assert_eq!(
            NetArg::new(EtType::Tcp)
                .with_ip(ip)
                .with_domain("one.one")
                .host()
                .as_deref(),
            Some("one.one")
        );
    }
}
