//! EagleTunnel Core Types
//!
//! This crate defines the fundamental data structures used throughout EagleTunnel:
//! protocol versions, user identities, request classification, the outbound
//! argument bag (`NetArg`) and the two-legged `Tunnel`.

mod error;
mod identity;
mod netarg;
mod proxy;
mod request;
mod tunnel;
mod version;

pub use error::*;
pub use identity::*;
pub use netarg::*;
pub use proxy::*;
pub use request::*;
pub use tunnel::*;
pub use version::*;

/// Protocol tag that opens every handshake line.
pub const PROTOCOL_TAG: &str = "eagle_tunnel";

/// The only handshake mode this node speaks.
pub const PROTOCOL_MODE: &str = "simple";

/// Fixed size of a single protocol message read.
pub const MESSAGE_BUFFER_SIZE: usize = 1024;
