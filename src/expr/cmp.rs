use serde::Serialize;

use crate::sys::{NFT_CMP_EQ, NFT_CMP_NEQ};

use super::{Expression, Register};

/// Comparison operator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[repr(u32)]
pub enum CmpOp {
    /// Equals.
    Eq = NFT_CMP_EQ,
    /// Not equal.
    Neq = NFT_CMP_NEQ,
}

impl CmpOp {
    /// `Eq` when `invert` is false, `Neq` otherwise.
    pub fn eq_unless(invert: bool) -> Self {
        if invert {
            CmpOp::Neq
        } else {
            CmpOp::Eq
        }
    }
}

/// Comparator expression. Allows comparing the content of the netfilter register with any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cmp {
    pub sreg: Register,
    pub op: CmpOp,
    pub data: Vec<u8>,
}

impl Cmp {
    /// Returns a new comparison expression comparing the value loaded in the register with the
    /// data in `data` using the comparison operator `op`.
    pub fn new(op: CmpOp, data: impl Into<Vec<u8>>) -> Self {
        Cmp {
            sreg: Register::Reg1,
            op,
            data: data.into(),
        }
    }
}

impl Expression for Cmp {
    fn get_name() -> &'static str {
        "cmp"
    }
}
