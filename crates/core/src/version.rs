//! Protocol version values

use std::fmt;
use std::str::FromStr;

use crate::VersionError;

/// Version this node advertises when it opens a handshake as a client.
pub const PROTOCOL_VERSION: Version = Version::new(1, 2);

/// Oldest version this node accepts from an inbound peer.
pub const COMPATIBLE_VERSION: Version = Version::new(1, 1);

/// A `major.minor` protocol version.
///
/// Ordering is lexicographic on `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a `major.minor` string.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        let (major, minor) = raw
            .split_once('.')
            .ok_or_else(|| VersionError::InvalidFormat(raw.to_string()))?;
        if minor.contains('.') {
            return Err(VersionError::InvalidFormat(raw.to_string()));
        }

        Ok(Self {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
        })
    }

    /// True when `self` is at least `floor`.
    pub fn is_same_or_newer(&self, floor: &Version) -> bool {
        self >= floor
    }
}

/// Digits only: `u32::from_str` would also take a leading `+`.
fn parse_component(raw: &str) -> Result<u32, VersionError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidNumber(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| VersionError::InvalidNumber(raw.to_string()))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
