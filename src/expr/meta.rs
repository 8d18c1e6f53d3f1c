use serde::Serialize;

use super::{Expression, Register};
use crate::sys;

/// A meta expression refers to meta data associated with a packet.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[repr(u32)]
#[non_exhaustive]
pub enum MetaType {
    /// Packet mark.
    Mark = sys::NFT_META_MARK,
    /// Packet input interface index (dev->ifindex).
    Iif = sys::NFT_META_IIF,
    /// Packet output interface index (dev->ifindex).
    Oif = sys::NFT_META_OIF,
    /// Packet input interface name (dev->name).
    IifName = sys::NFT_META_IIFNAME,
    /// Packet output interface name (dev->name).
    OifName = sys::NFT_META_OIFNAME,
    /// Originating socket UID (fsuid).
    SkUid = sys::NFT_META_SKUID,
    /// Originating socket GID (fsgid).
    SkGid = sys::NFT_META_SKGID,
    /// Netfilter protocol (Transport layer protocol).
    NfProto = sys::NFT_META_NFPROTO,
    /// Layer 4 protocol number.
    L4Proto = sys::NFT_META_L4PROTO,
}

/// Loads a piece of packet metadata into a register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub dreg: Register,
    pub key: MetaType,
}

impl Meta {
    pub fn new(ty: MetaType) -> Self {
        Meta {
            dreg: Register::Reg1,
            key: ty,
        }
    }
}

impl Expression for Meta {
    fn get_name() -> &'static str {
        "meta"
    }
}
