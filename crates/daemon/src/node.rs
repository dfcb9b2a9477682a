//! Node service
//!
//! One task per accepted connection. A task runs the protocol engine on its
//! tunnel, then either pumps bytes until a side closes (TCP keep-alive) or
//! closes both legs.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use eagletunnel_core::{Leg, Tunnel};
use eagletunnel_exit::{build_registry, ExitConfig, ExitContext};
use eagletunnel_relay::{EagleTunnel, EngineConfig, LookupCaches, RelayChainer};
use eagletunnel_settings::Settings;

use crate::Result;

/// How often expired name resolutions are dropped
pub const CACHE_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen: SocketAddr,
    pub engine: EngineConfig,
    pub exit: ExitConfig,
    /// Static host overrides seeded into the lookup caches
    pub hosts: Vec<(String, IpAddr)>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            engine: EngineConfig::default(),
            exit: ExitConfig::default(),
            hosts: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let engine = EngineConfig {
            encrypt_key: settings.encrypt_key,
            auth_enabled: settings.auth_enabled,
            local_identity: Arc::new(settings.local_identity()?),
            identities: Arc::new(settings.identity_table()?),
            relayer: settings.relayer.clone(),
            relay_connect_timeout: settings.relay_connect_timeout(),
            handshake_timeout: settings.handshake_timeout(),
        };
        let exit = ExitConfig {
            encrypt_key: settings.encrypt_key,
            locations: settings.location_table()?,
            proxy_mode: settings.proxy_mode()?,
            home_location: settings.home_location.clone(),
            ..ExitConfig::default()
        };

        Ok(Self {
            listen: settings.listen_addr()?,
            engine,
            exit,
            hosts: settings.host_overrides()?,
        })
    }
}

/// ET node: engine plus listener.
pub struct NodeService {
    listen: SocketAddr,
    engine: Arc<EagleTunnel>,
    caches: Arc<LookupCaches>,
}

impl NodeService {
    pub fn new(config: NodeConfig) -> Self {
        let caches = Arc::new(LookupCaches::new().with_hosts(config.hosts));
        let chainer = RelayChainer::from_config(&config.engine);
        let context = ExitContext::new(config.exit, chainer, caches.clone());
        let engine = EagleTunnel::new(config.engine, build_registry(context));

        Self {
            listen: config.listen,
            engine: Arc::new(engine),
            caches,
        }
    }

    pub fn engine(&self) -> &Arc<EagleTunnel> {
        &self.engine
    }

    pub fn caches(&self) -> &Arc<LookupCaches> {
        &self.caches
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.listen).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    ///
    /// Connections already accepted keep running after the loop exits.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local = listener.local_addr()?;
        info!(
            "ET node listening on {} (relayer: {}, auth: {})",
            local,
            self.engine.config().relayer.as_deref().unwrap_or("none"),
            self.engine.config().auth_enabled
        );

        let evictor = tokio::spawn(evict_periodically(self.caches.clone(), shutdown.clone()));

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("ET node on {} shutting down", local);
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let engine = self.engine.clone();
                            tokio::spawn(
                                handle_connection(engine, stream, peer)
                                    .instrument(info_span!("conn", peer = %peer)),
                            );
                        }
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
            }
        }

        evictor.abort();
        Ok(())
    }
}

async fn evict_periodically(caches: Arc<LookupCaches>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(CACHE_EVICTION_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => caches.evict_expired(),
        }
    }
}

async fn handle_connection(engine: Arc<EagleTunnel>, stream: TcpStream, peer: SocketAddr) {
    let mut tunnel = Tunnel::with_left(engine.config().encrypt_key, Leg::from_tcp(stream));
    let id = tunnel.short_id();
    debug!("Tunnel {} accepted from {}", id, peer);

    match engine.serve(&mut tunnel).await {
        Ok(true) => match tunnel.flow().await {
            Ok((up, down)) => debug!("Tunnel {} closed: {} bytes up, {} bytes down", id, up, down),
            Err(e) => debug!("Tunnel {} flow ended: {}", id, e),
        },
        Ok(false) => {
            tunnel.close().await;
            debug!("Tunnel {} done", id);
        }
        Err(e) => {
            warn!("Tunnel {} from {} rejected: {}", id, peer, e);
            tunnel.close().await;
        }
    }
}
