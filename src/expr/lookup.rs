use serde::Serialize;

use super::{Expression, Register};
use crate::set::Set;
use crate::sys::NFT_LOOKUP_F_INV;

/// Checks whether the content of a register is an element of a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lookup {
    pub sreg: Register,
    pub set_name: String,
    pub set_id: u32,
    pub flags: u32,
}

impl Lookup {
    /// Creates a new lookup in `set`. When `invert` is set, the expression matches the values
    /// that are *not* part of the set.
    pub fn new(set: &Set, invert: bool) -> Self {
        Lookup {
            sreg: Register::Reg1,
            set_name: set.name.clone(),
            set_id: set.id,
            flags: if invert { NFT_LOOKUP_F_INV } else { 0 },
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.flags & NFT_LOOKUP_F_INV != 0
    }
}

impl Expression for Lookup {
    fn get_name() -> &'static str {
        "lookup"
    }
}
