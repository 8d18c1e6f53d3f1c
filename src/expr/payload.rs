use serde::Serialize;

use super::{Expression, Register};
use crate::sys::{NFT_PAYLOAD_NETWORK_HEADER, NFT_PAYLOAD_TRANSPORT_HEADER};

/// Payload expressions refer to data from the packet's payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub dreg: Register,
    pub base: u32,
    pub offset: u32,
    pub len: u32,
}

impl Expression for Payload {
    fn get_name() -> &'static str {
        "payload"
    }
}

/// A header field the compiler matches on, resolved to a base, offset and length by
/// [`build`](HighLevelPayload::build). The loaded bytes always land in register 1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HighLevelPayload {
    Network(NetworkHeaderField),
    Transport(TransportHeaderField),
}

impl HighLevelPayload {
    pub fn build(&self) -> Payload {
        let (base, offset, len) = match *self {
            HighLevelPayload::Network(ref f) => (NFT_PAYLOAD_NETWORK_HEADER, f.offset(), f.len()),
            HighLevelPayload::Transport(ref f) => {
                (NFT_PAYLOAD_TRANSPORT_HEADER, f.offset(), f.len())
            }
        };
        Payload {
            dreg: Register::Reg1,
            base,
            offset,
            len,
        }
    }
}

pub trait HeaderField {
    fn offset(&self) -> u32;
    fn len(&self) -> u32;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NetworkHeaderField {
    IPv4(IPv4HeaderField),
    IPv6(IPv6HeaderField),
}

impl HeaderField for NetworkHeaderField {
    fn offset(&self) -> u32 {
        use self::NetworkHeaderField::*;
        match *self {
            IPv4(ref f) => f.offset(),
            IPv6(ref f) => f.offset(),
        }
    }

    fn len(&self) -> u32 {
        use self::NetworkHeaderField::*;
        match *self {
            IPv4(ref f) => f.len(),
            IPv6(ref f) => f.len(),
        }
    }
}

/// Fields of the IPv4 header. `VersionIhl` is the first byte, holding the version in its high
/// nibble.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum IPv4HeaderField {
    VersionIhl,
    Saddr,
    Daddr,
}

impl HeaderField for IPv4HeaderField {
    fn offset(&self) -> u32 {
        use self::IPv4HeaderField::*;
        match *self {
            VersionIhl => 0,
            Saddr => 12,
            Daddr => 16,
        }
    }

    fn len(&self) -> u32 {
        use self::IPv4HeaderField::*;
        match *self {
            VersionIhl => 1,
            Saddr | Daddr => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum IPv6HeaderField {
    Saddr,
    Daddr,
}

impl HeaderField for IPv6HeaderField {
    fn offset(&self) -> u32 {
        use self::IPv6HeaderField::*;
        match *self {
            Saddr => 8,
            Daddr => 24,
        }
    }

    fn len(&self) -> u32 {
        16
    }
}

/// Port fields of the transport header. Both protocols keep the ports at the same place.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransportHeaderField {
    Tcp(TCPHeaderField),
    Udp(UDPHeaderField),
}

impl HeaderField for TransportHeaderField {
    fn offset(&self) -> u32 {
        use self::TransportHeaderField::*;
        match *self {
            Tcp(ref f) => f.offset(),
            Udp(ref f) => f.offset(),
        }
    }

    fn len(&self) -> u32 {
        use self::TransportHeaderField::*;
        match *self {
            Tcp(ref f) => f.len(),
            Udp(ref f) => f.len(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum TCPHeaderField {
    Sport,
    Dport,
}

impl HeaderField for TCPHeaderField {
    fn offset(&self) -> u32 {
        use self::TCPHeaderField::*;
        match *self {
            Sport => 0,
            Dport => 2,
        }
    }

    fn len(&self) -> u32 {
        2
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum UDPHeaderField {
    Sport,
    Dport,
}

impl HeaderField for UDPHeaderField {
    fn offset(&self) -> u32 {
        use self::UDPHeaderField::*;
        match *self {
            Sport => 0,
            Dport => 2,
        }
    }

    fn len(&self) -> u32 {
        2
    }
}
