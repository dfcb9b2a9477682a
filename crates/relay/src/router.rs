//! Request routing
//!
//! After the handshake (and authentication, if enabled) the next message on
//! the left leg is a request line. Its first token picks the handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result, Tunnel, MESSAGE_BUFFER_SIZE};

use crate::io::{decode, read_raw, Side};

/// A request-type handler.
///
/// `handle` serves a request arriving on an already authenticated left leg
/// and reports whether the connection should stay open. `send` performs the
/// same kind of request outbound, filling `arg.reply`.
#[async_trait]
pub trait EtHandler: Send + Sync {
    /// The request type this handler serves.
    fn ty(&self) -> EtType;

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool>;

    async fn send(&self, arg: &mut NetArg) -> Result<()>;
}

#[async_trait]
impl<T: EtHandler + ?Sized> EtHandler for Arc<T> {
    fn ty(&self) -> EtType {
        (**self).ty()
    }

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        (**self).handle(request, tunnel).await
    }

    async fn send(&self, arg: &mut NetArg) -> Result<()> {
        (**self).send(arg).await
    }
}

/// Handlers keyed by request type, populated once at startup.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EtType, Arc<dyn EtHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own type, replacing any previous one.
    ///
    /// Handlers claiming `UNKNOWN` are ignored: that type never dispatches.
    pub fn register(&mut self, handler: Arc<dyn EtHandler>) -> &mut Self {
        let ty = handler.ty();
        if ty != EtType::Unknown {
            self.handlers.insert(ty, handler);
        }
        self
    }

    pub fn get(&self, ty: EtType) -> Option<Arc<dyn EtHandler>> {
        self.handlers.get(&ty).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Outbound dispatch on `arg.ty`.
    pub async fn send(&self, arg: &mut NetArg) -> Result<()> {
        let handler = self
            .get(arg.ty)
            .ok_or_else(|| EtError::InvalidRequest(format!("no handler for {}", arg.ty)))?;
        handler.send(arg).await
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().map(EtType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("types", &types)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RequestRouter {
    registry: Arc<HandlerRegistry>,
    timeout: Option<Duration>,
}

impl RequestRouter {
    pub fn new(registry: Arc<HandlerRegistry>, timeout: Option<Duration>) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Read the next request from the left leg and dispatch it.
    ///
    /// A read that fills the whole buffer may have cut the request short and
    /// is rejected as [`EtError::TruncatedRequest`].
    pub async fn route(&self, tunnel: &mut Tunnel) -> Result<bool> {
        let raw = read_raw(tunnel, Side::Left, self.timeout).await?;
        if raw.len() >= MESSAGE_BUFFER_SIZE {
            return Err(EtError::TruncatedRequest(MESSAGE_BUFFER_SIZE));
        }
        let request = Request::new(decode(&raw));
        self.dispatch(&request, tunnel).await
    }

    /// Hand `request` to its handler.
    ///
    /// Only a TCP handler may keep the connection open; `UNKNOWN` and types
    /// without a handler are not dispatched.
    pub async fn dispatch(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        let ty = request.ty();
        if ty == EtType::Unknown {
            return Ok(false);
        }
        let Some(handler) = self.registry.get(ty) else {
            return Ok(false);
        };

        let keep_alive = handler.handle(request, tunnel).await?;
        Ok(ty == EtType::Tcp && keep_alive)
    }
}
