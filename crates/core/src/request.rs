//! Request classification

use std::fmt;

/// Kind of ET request, selected by the first token of a request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtType {
    Tcp,
    Dns,
    Location,
    Ask,
    Unknown,
}

impl EtType {
    /// Every dispatchable type. `Unknown` is never dispatched.
    pub const DISPATCHABLE: [EtType; 4] = [EtType::Tcp, EtType::Dns, EtType::Location, EtType::Ask];

    /// Map a type token to its type. Anything unrecognised is `Unknown`.
    pub fn parse(token: &str) -> Self {
        match token {
            "TCP" => Self::Tcp,
            "DNS" => Self::Dns,
            "LOCATION" => Self::Location,
            "ASK" => Self::Ask,
            _ => Self::Unknown,
        }
    }

    /// Inverse of [`EtType::parse`] for every dispatchable type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Dns => "DNS",
            Self::Location => "LOCATION",
            Self::Ask => "ASK",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound protocol message: the raw line and its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    raw: String,
    ty: EtType,
}

impl Request {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let ty = EtType::parse(raw.split(' ').next().unwrap_or_default());
        Self { raw, ty }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn ty(&self) -> EtType {
        self.ty
    }

    /// Whitespace-separated tokens, the type token included.
    pub fn tokens(&self) -> Vec<&str> {
        self.raw.split_whitespace().collect()
    }
}
