use std::fmt::Debug;

use libc::{NF_ACCEPT, NF_DROP};
use serde::Serialize;

use crate::sys::{NFT_GOTO, NFT_JUMP, NFT_RETURN};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[repr(i32)]
pub enum VerdictType {
    Drop = NF_DROP,
    Accept = NF_ACCEPT,
    Jump = NFT_JUMP,
    Goto = NFT_GOTO,
    Return = NFT_RETURN,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    /// Silently drop the packet.
    Drop,
    /// Accept the packet and let it pass.
    Accept,
    Jump {
        chain: String,
    },
    Goto {
        chain: String,
    },
    Return,
}

impl VerdictKind {
    pub fn code(&self) -> VerdictType {
        match self {
            VerdictKind::Drop => VerdictType::Drop,
            VerdictKind::Accept => VerdictType::Accept,
            VerdictKind::Jump { .. } => VerdictType::Jump,
            VerdictKind::Goto { .. } => VerdictType::Goto,
            VerdictKind::Return => VerdictType::Return,
        }
    }

    /// The chain a jump or a goto transfers control to.
    pub fn target_chain(&self) -> Option<&str> {
        match self {
            VerdictKind::Jump { chain } | VerdictKind::Goto { chain } => Some(chain),
            _ => None,
        }
    }
}
