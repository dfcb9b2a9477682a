//! EagleTunnel Relay
//!
//! The ET protocol engine: version handshake, authentication in both
//! directions, request routing to registered handlers and chaining to the
//! next hop. Logging stays at `debug` (authenticated peers, established
//! chains); failures come back as [`EtError`] values and diagnostics for the
//! peer are written on the wire.
//!
//! [`EtError`]: eagletunnel_core::EtError

mod auth;
mod cache;
mod chain;
mod config;
mod engine;
mod handshake;
mod io;
mod router;

pub use auth::{AuthenticationGate, VALID_AUTH_REPLY};
pub use cache::{LookupCaches, DEFAULT_RESOLVED_TTL};
pub use chain::RelayChainer;
pub use config::{EngineConfig, DEFAULT_ENCRYPT_KEY};
pub use engine::EagleTunnel;
pub use handshake::{
    HandshakeVerdict, VersionNegotiator, INCOMPATIBLE_VERSION_REPLY, VALID_HANDSHAKE_REPLY,
};
pub use router::{EtHandler, HandlerRegistry, RequestRouter};
