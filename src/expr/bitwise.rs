use serde::Serialize;

use super::{Expression, Register};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bitwise {
    pub sreg: Register,
    pub dreg: Register,
    pub len: u32,
    pub mask: Vec<u8>,
    pub xor: Vec<u8>,
}

impl Expression for Bitwise {
    fn get_name() -> &'static str {
        "bitwise"
    }
}

impl Bitwise {
    /// Returns a new `Bitwise` instance that first masks the value it's applied to with `mask` and
    /// then performs xor with the value in `xor`
    pub fn new(mask: impl Into<Vec<u8>>, xor: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let mask = mask.into();
        let xor = xor.into();
        if mask.len() != xor.len() {
            return Err(ValidationError::IncompatibleLength);
        }
        Ok(Bitwise {
            sreg: Register::Reg1,
            dreg: Register::Reg1,
            len: mask.len() as u32,
            mask,
            xor,
        })
    }
}
