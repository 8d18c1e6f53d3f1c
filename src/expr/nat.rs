use serde::Serialize;

use super::{Expression, Register};
use crate::sys::{NFT_NAT_DNAT, NFT_NAT_SNAT};
use crate::ProtocolFamily;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[repr(u32)]
pub enum NatType {
    /// Source NAT. Changes the source address of a packet.
    SNat = NFT_NAT_SNAT,
    /// Destination NAT. Changes the destination address of a packet.
    DNat = NFT_NAT_DNAT,
}

/// A source or destination NAT statement. Modifies the source or destination address (and possibly
/// port) of packets. Each bound is read from the register named here; an unset register leaves
/// that part of the tuple to the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nat {
    pub nat_type: NatType,
    pub family: ProtocolFamily,
    pub reg_addr_min: Option<Register>,
    pub reg_addr_max: Option<Register>,
    pub reg_proto_min: Option<Register>,
    pub reg_proto_max: Option<Register>,
    pub flags: u32,
}

impl Nat {
    pub fn new(nat_type: NatType, family: ProtocolFamily) -> Self {
        Nat {
            nat_type,
            family,
            reg_addr_min: None,
            reg_addr_max: None,
            reg_proto_min: None,
            reg_proto_max: None,
            flags: 0,
        }
    }
}

impl Expression for Nat {
    fn get_name() -> &'static str {
        "nat"
    }
}
