// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4)")]
    InvalidPrefixLength(u8),

    #[error("Host bits set in network address: {0}")]
    HostBitsSet(String),

    #[error("Subnet /{prefix_length} #{index} does not fit inside {parent}")]
    SubnetOutOfRange {
        parent: String,
        prefix_length: u8,
        index: u32,
    },
}

/// IPv4 network block in CIDR notation
///
/// Invariants:
/// - Prefix length 0-32
/// - Network address has no host bits set (`10.0.0.0/16`, never `10.0.1.0/16`)
///
/// # Examples
///
/// ```rust
/// use cim_infrastructure_synth::domain::Ipv4Cidr;
///
/// let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
/// let first = vpc.subnet(24, 0).unwrap();
/// assert_eq!(first.to_string(), "10.0.0.0/24");
/// assert!(vpc.contains_cidr(&first));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    /// Maximum prefix length for IPv4
    pub const MAX_PREFIX: u8 = 32;

    /// Parse a CIDR block such as `10.0.0.0/16`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let network = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(network, prefix_length)
    }

    /// Create from a network address and prefix length
    pub fn from_parts(network: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > Self::MAX_PREFIX {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        // Invariant: canonical network address
        let raw = u32::from(network);
        if raw & !Self::mask(prefix_length) != 0 {
            return Err(NetworkError::HostBitsSet(format!(
                "{}/{}",
                network, prefix_length
            )));
        }

        Ok(Self {
            network,
            prefix_length,
        })
    }

    /// The block that matches every IPv4 address (`0.0.0.0/0`)
    pub fn any_ipv4() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            prefix_length: 0,
        }
    }

    fn mask(prefix_length: u8) -> u32 {
        if prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_length))
        }
    }

    /// Get the network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Get the prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    /// Whether this block matches every address
    pub fn is_any(&self) -> bool {
        self.prefix_length == 0
    }

    /// Check if an address falls within the block
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::mask(self.prefix_length) == u32::from(self.network)
    }

    /// Check if another block lies entirely within this one
    pub fn contains_cidr(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_length >= self.prefix_length && self.contains(other.network)
    }

    /// Check if two blocks share any address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains_cidr(other) || other.contains_cidr(self)
    }

    /// Carve the `index`-th sub-block of the given prefix length
    pub fn subnet(&self, prefix_length: u8, index: u32) -> Result<Ipv4Cidr, NetworkError> {
        if prefix_length < self.prefix_length || prefix_length > Self::MAX_PREFIX {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        let available = 1u64 << u32::from(prefix_length - self.prefix_length);
        if u64::from(index) >= available {
            return Err(NetworkError::SubnetOutOfRange {
                parent: self.to_string(),
                prefix_length,
                index,
            });
        }

        let offset = u64::from(index) << (32 - u32::from(prefix_length));
        let base = u64::from(u32::from(self.network)) + offset;
        // base < 2^32 because the sub-block lies within the parent
        Self::from_parts(Ipv4Addr::from(base as u32), prefix_length)
    }

    /// How many sub-blocks of the given prefix length fit in this block
    pub fn subnet_capacity(&self, prefix_length: u8) -> u64 {
        if prefix_length < self.prefix_length || prefix_length > Self::MAX_PREFIX {
            return 0;
        }
        1u64 << u32::from(prefix_length - self.prefix_length)
    }

    /// Get as CIDR notation string
    pub fn as_cidr(&self) -> String {
        format!("{}/{}", self.network, self.prefix_length)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cidr())
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.as_cidr()
    }
}

/// Subnet tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    /// Internet-reachable through the internet gateway
    Public,
    /// Egress-only through the shared NAT gateway
    Private,
}

impl SubnetTier {
    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// TCP port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    /// A single TCP port
    pub fn tcp(port: u16) -> Self {
        Self { from: port, to: port }
    }

    /// An inclusive TCP port range; bounds are swapped if given in reverse
    pub fn tcp_range(from: u16, to: u16) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    /// First port in the range
    pub fn from_port(&self) -> u16 {
        self.from
    }

    /// Last port in the range
    pub fn to_port(&self) -> u16 {
        self.to
    }

    /// Check whether a port lies in the range
    pub fn contains(&self, port: u16) -> bool {
        (self.from..=self.to).contains(&port)
    }

    /// Whether the range covers exactly one port
    pub fn is_single(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "tcp/{}", self.from)
        } else {
            write!(f, "tcp/{}-{}", self.from, self.to)
        }
    }
}
