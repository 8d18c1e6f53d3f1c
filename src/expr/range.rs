use serde::Serialize;

use crate::sys::{NFT_RANGE_EQ, NFT_RANGE_NEQ};

use super::{Expression, Register};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[repr(u32)]
pub enum RangeOp {
    /// The register lies within the bounds.
    Eq = NFT_RANGE_EQ,
    /// The register lies outside of the bounds.
    Neq = NFT_RANGE_NEQ,
}

/// Checks that the content of a register lies between two inclusive bounds. Both bounds must be
/// in network byte order and as long as the loaded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    pub sreg: Register,
    pub op: RangeOp,
    pub from: Vec<u8>,
    pub to: Vec<u8>,
}

impl Range {
    pub fn new(op: RangeOp, from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        Range {
            sreg: Register::Reg1,
            op,
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Expression for Range {
    fn get_name() -> &'static str {
        "range"
    }
}
