//! Typed values produced by completers when an argument is accepted.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Address family of a query or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    V4,
    V6,
    Bridge,
}

impl Family {
    /// Maximum prefix length for the family (0 for bridge).
    pub fn max_prefix_len(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
            Self::Bridge => 0,
        }
    }

    /// Family of an address.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "inet"),
            Self::V6 => write!(f, "inet6"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// An IP network prefix with no host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// Build a prefix, rejecting out-of-range lengths and set host bits.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, String> {
        let max = Family::of(&addr).max_prefix_len();
        if len > max {
            return Err(format!("prefix length {len} exceeds {max}"));
        }
        if mask_host_bits(addr, len) != addr {
            return Err(format!("{addr}/{len} has host bits set"));
        }
        Ok(Self { addr, len })
    }

    /// Prefix covering `addr` with host bits cleared.
    pub fn truncating(addr: IpAddr, len: u8) -> Self {
        let len = len.min(Family::of(&addr).max_prefix_len());
        Self {
            addr: mask_host_bits(addr, len),
            len,
        }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn family(&self) -> Family {
        Family::of(&self.addr)
    }
}

fn mask_host_bits(addr: IpAddr, len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(a) => {
            let bits = u32::from(a);
            let mask = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        },
        IpAddr::V6(a) => {
            let bits = u128::from(a);
            let mask = if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        },
    }
}

impl FromStr for Prefix {
    type Err = String;

    /// Parse `addr/len`; a bare address is a full-length prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, len_part) = match s.split_once('/') {
            Some((a, l)) => (a, Some(l)),
            None => (s, None),
        };
        let addr: IpAddr = addr_part
            .parse()
            .map_err(|_| format!("'{addr_part}' does not appear to be an IP address"))?;
        let len = match len_part {
            Some(l) => l
                .parse::<u8>()
                .map_err(|_| format!("'{l}' is not a valid prefix length"))?,
            None => Family::of(&addr).max_prefix_len(),
        };
        Self::new(addr, len)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

/// A parsed argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    /// An existing interface, by name and kernel index.
    Link { name: String, index: u32 },
    /// A numeric id resolved from a lookup table (route table, protocol, ...).
    Id(u32),
    Addr(IpAddr),
    Prefix(Prefix),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Link { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<u32> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Link { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Link { name, .. } => write!(f, "{name}"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Addr(a) => write!(f, "{a}"),
            Self::Prefix(p) => write!(f, "{p}"),
        }
    }
}
