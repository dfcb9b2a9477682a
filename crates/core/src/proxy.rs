//! Proxy routing mode

use std::fmt;

/// How a node with a relayer picks between a direct and a chained path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProxyMode {
    /// Every TCP, DNS and LOCATION lookup goes through the relayer.
    #[default]
    Enable,
    /// Inside destinations are reached directly, everything else through
    /// the relayer.
    Smart,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Smart => "smart",
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
