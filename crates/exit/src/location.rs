//! LOCATION handler
//!
//! Answers `LOCATION <ip>` with a location code, or `nok`. Lookup order:
//! cache, next hop, static table.

use std::net::IpAddr;

use async_trait::async_trait;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result, Tunnel};
use eagletunnel_relay::EtHandler;

use crate::{EtRequest, ExitContext, REPLY_NOK};

pub struct LocationHandler {
    context: ExitContext,
}

impl LocationHandler {
    pub fn new(context: ExitContext) -> Self {
        Self { context }
    }

    pub async fn locate(&self, ip: IpAddr) -> Option<String> {
        self.context.locate(ip).await
    }
}

#[async_trait]
impl EtHandler for LocationHandler {
    fn ty(&self) -> EtType {
        EtType::Location
    }

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        let ip = match EtRequest::parse(request)? {
            EtRequest::Location { ip } => ip,
            other => {
                return Err(EtError::InvalidRequest(format!(
                    "expected LOCATION request, got {}",
                    other.ty()
                )))
            }
        };

        let reply = self
            .locate(ip)
            .await
            .unwrap_or_else(|| REPLY_NOK.to_string());
        tunnel.write_left(reply.as_bytes()).await?;
        Ok(false)
    }

    async fn send(&self, arg: &mut NetArg) -> Result<()> {
        let request = EtRequest::from_arg(arg)?;
        arg.reply = self.context.exchange_once(&request).await?;
        if arg.reply.is_empty() || arg.reply == REPLY_NOK {
            return Err(EtError::RequestFailed(format!(
                "no location for {}",
                request.to_line()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use eagletunnel_core::Leg;
    use eagletunnel_relay::{EngineConfig, LookupCaches, RelayChainer};
    use tokio::io::{duplex, AsyncReadExt};

    use crate::ExitConfig;

    const KEY: u8 = 0x22;

    fn handler(caches: Arc<LookupCaches>) -> LocationHandler {
        let mut locations = HashMap::new();
        locations.insert("114.114.114.114".parse().unwrap(), "CN".to_string());
        let config = ExitConfig {
            locations,
            ..ExitConfig::default()
        };
        LocationHandler::new(ExitContext::new(
            config,
            RelayChainer::from_config(&EngineConfig::default()),
            caches,
        ))
    }

    async fn ask(handler: &LocationHandler, line: &str) -> String {
        let (ours, mut peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(KEY, Leg::new(ours, None));
        assert!(!handler.handle(&Request::new(line), &mut tunnel).await.unwrap());

        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_cache_first() {
        let caches = Arc::new(LookupCaches::new());
        caches.insert_location("114.114.114.114".parse().unwrap(), "HK");
        assert_eq!(ask(&handler(caches), "LOCATION 114.114.114.114").await, "HK");
    }

    #[tokio::test]
    async fn test_static_table_fills_cache() {
        let caches = Arc::new(LookupCaches::new());
        let handler = handler(caches.clone());
        assert_eq!(ask(&handler, "LOCATION 114.114.114.114").await, "CN");
        assert_eq!(
            caches.location(&"114.114.114.114".parse().unwrap()).as_deref(),
            Some("CN")
        );
    }

    #[tokio::test]
    async fn test_unknown_ip_replies_nok() {
        let caches = Arc::new(LookupCaches::new());
        assert_eq!(ask(&handler(caches.clone()), "LOCATION 8.8.8.8").await, "nok");
        assert_eq!(caches.locations_len(), 0);
    }

    #[tokio::test]
    async fn test_malformed_ip() {
        let (ours, _peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(KEY, Leg::new(ours, None));
        let result = handler(Arc::new(LookupCaches::new()))
            .handle(&Request::new("LOCATION somewhere"), &mut tunnel)
            .await;
        assert!(matches!(result, Err(EtError::InvalidRequest(_))));
    }
}
