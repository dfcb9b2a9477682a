//! Handler set
//!
//! Builds the registry of TCP, DNS, LOCATION and ASK handlers and holds the
//! pieces they share: the relay chainer, the lookup caches, the timeouts and
//! the direct-or-chained routing decision.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use eagletunnel_core::{ProxyMode, Result, Tunnel, MESSAGE_BUFFER_SIZE};
use eagletunnel_relay::{HandlerRegistry, LookupCaches, RelayChainer};

use crate::{AskHandler, DnsHandler, EtRequest, LocationHandler, TcpHandler, REPLY_NOK};

/// Exit-side configuration
#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Shared cipher key for tunnels the handlers open
    pub encrypt_key: u8,
    /// Timeout for dialing a destination directly
    pub dial_timeout: Duration,
    /// Static IP → location code table
    pub locations: HashMap<IpAddr, String>,
    /// Direct-or-chained policy when a relayer is configured
    pub proxy_mode: ProxyMode,
    /// Location code counted as inside in `Smart` mode
    pub home_location: Option<String>,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            encrypt_key: eagletunnel_relay::DEFAULT_ENCRYPT_KEY,
            dial_timeout: Duration::from_secs(10),
            locations: HashMap::new(),
            proxy_mode: ProxyMode::Enable,
            home_location: None,
        }
    }
}

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct ExitContext {
    pub config: Arc<ExitConfig>,
    pub chainer: Arc<RelayChainer>,
    pub caches: Arc<LookupCaches>,
}

impl ExitContext {
    pub fn new(config: ExitConfig, chainer: RelayChainer, caches: Arc<LookupCaches>) -> Self {
        Self {
            config: Arc::new(config),
            chainer: Arc::new(chainer),
            caches,
        }
    }

    /// Chain to the next hop on `tunnel`, send `request` and read the reply.
    ///
    /// The right leg stays on `tunnel` so a TCP exchange can keep using it.
    pub async fn exchange(&self, tunnel: &mut Tunnel, request: &EtRequest) -> Result<String> {
        self.chainer.connect(tunnel).await?;

        let line = request.to_line();
        tunnel.write_right(line.as_bytes()).await?;

        let mut buf = vec![0u8; MESSAGE_BUFFER_SIZE];
        let n = tunnel.read_right(&mut buf).await?;
        let reply = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();

        debug!(
            "Tunnel {} relayed {:?} -> {:?}",
            tunnel.short_id(),
            line,
            reply
        );
        Ok(reply)
    }

    /// Same as [`ExitContext::exchange`] on a throwaway tunnel that is closed afterwards.
    pub async fn exchange_once(&self, request: &EtRequest) -> Result<String> {
        let mut tunnel = Tunnel::new(self.config.encrypt_key);
        let result = self.exchange(&mut tunnel, request).await;
        tunnel.close().await;
        result
    }

    /// Whether traffic for `host` goes through the next hop.
    ///
    /// Never without a relayer, always in `Enable` mode. `Smart` mode goes
    /// direct for inside destinations and chains the rest, unresolvable
    /// names included.
    pub async fn chains_to(&self, host: &str) -> bool {
        if !self.chainer.has_relayer() {
            return false;
        }
        match self.config.proxy_mode {
            ProxyMode::Enable => true,
            ProxyMode::Smart => {
                let ip = match host.parse::<IpAddr>() {
                    Ok(ip) => Some(ip),
                    Err(_) => self.resolve(host).await,
                };
                match ip {
                    Some(ip) => !self.is_inside(ip).await,
                    None => true,
                }
            }
        }
    }

    /// Resolve `domain`, filling the cache on a fresh answer.
    ///
    /// Static hosts and the cache come first. Without a relayer the system
    /// resolver answers. `Enable` asks the next hop and falls back to the
    /// system resolver. `Smart` keeps a local answer that is inside and asks
    /// the next hop otherwise, falling back to the local answer.
    pub async fn resolve(&self, domain: &str) -> Option<IpAddr> {
        if let Some(ip) = self.caches.host(domain) {
            return Some(ip);
        }
        if let Some(ip) = self.caches.resolved(domain) {
            return Some(ip);
        }

        let resolved = if !self.chainer.has_relayer() {
            resolve_system(domain).await
        } else {
            match self.config.proxy_mode {
                ProxyMode::Enable => match self.resolve_remote(domain).await {
                    Some(ip) => Some(ip),
                    None => resolve_system(domain).await,
                },
                ProxyMode::Smart => {
                    let local = resolve_system(domain).await;
                    match local {
                        Some(ip) if self.is_inside(ip).await => Some(ip),
                        _ => self.resolve_remote(domain).await.or(local),
                    }
                }
            }
        };

        if let Some(ip) = resolved {
            self.caches.insert_resolved(domain, ip);
        }
        resolved
    }

    async fn resolve_remote(&self, domain: &str) -> Option<IpAddr> {
        let request = EtRequest::Dns {
            domain: domain.to_string(),
        };
        match self.exchange_once(&request).await {
            Ok(reply) => reply.parse().ok(),
            Err(e) => {
                debug!("Remote resolve of {} failed: {}", domain, e);
                None
            }
        }
    }

    /// Location code for `ip`: cache, next hop, static table.
    pub async fn locate(&self, ip: IpAddr) -> Option<String> {
        if let Some(code) = self.caches.location(&ip) {
            return Some(code);
        }

        if self.chainer.has_relayer() {
            match self.exchange_once(&EtRequest::Location { ip }).await {
                Ok(reply) if !reply.is_empty() && reply != REPLY_NOK => {
                    self.caches.insert_location(ip, reply.clone());
                    return Some(reply);
                }
                Ok(reply) => debug!("Next hop has no location for {}: {:?}", ip, reply),
                Err(e) => debug!("Remote location of {} failed: {}", ip, e),
            }
        }

        let code = self.config.locations.get(&ip).cloned()?;
        self.caches.insert_location(ip, code.clone());
        Some(code)
    }

    /// Whether `ip` is reached without the relayer in `Smart` mode.
    ///
    /// Private, loopback and link-local addresses are inside, as is any
    /// address whose location code matches `home_location`.
    pub async fn is_inside(&self, ip: IpAddr) -> bool {
        if let Some(inside) = self.caches.inside(&ip) {
            return inside;
        }

        let inside = if is_local_address(ip) {
            true
        } else {
            match &self.config.home_location {
                Some(home) => self
                    .locate(ip)
                    .await
                    .is_some_and(|code| code.eq_ignore_ascii_case(home)),
                None => false,
            }
        };

        self.caches.insert_inside(ip, inside);
        inside
    }
}

/// First IPv4 address the system resolver returns for `domain`.
async fn resolve_system(domain: &str) -> Option<IpAddr> {
    match tokio::net::lookup_host((domain, 0)).await {
        Ok(addrs) => addrs.map(|addr| addr.ip()).find(IpAddr::is_ipv4),
        Err(e) => {
            debug!("System resolve of {} failed: {}", domain, e);
            None
        }
    }
}

fn is_local_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

/// Registry with all four handlers sharing `context`.
pub fn build_registry(context: ExitContext) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(TcpHandler::new(context.clone())))
        .register(Arc::new(DnsHandler::new(context.clone())))
        .register(Arc::new(LocationHandler::new(context.clone())))
        .register(Arc::new(AskHandler::new(context)));
    registry
}
