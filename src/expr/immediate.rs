use serde::Serialize;

use super::{Expression, Register, VerdictKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImmediateData {
    Value(Vec<u8>),
    Verdict(VerdictKind),
}

/// Loads a constant into a register. Loading a verdict into the verdict register is how a rule
/// decides the fate of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Immediate {
    pub dreg: Register,
    pub data: ImmediateData,
}

impl Immediate {
    pub fn new_data(data: Vec<u8>, register: Register) -> Self {
        Immediate {
            dreg: register,
            data: ImmediateData::Value(data),
        }
    }

    pub fn new_verdict(kind: VerdictKind) -> Self {
        Immediate {
            dreg: Register::Verdict,
            data: ImmediateData::Verdict(kind),
        }
    }

    pub fn verdict(&self) -> Option<&VerdictKind> {
        match self.data {
            ImmediateData::Verdict(ref v) => Some(v),
            ImmediateData::Value(_) => None,
        }
    }
}

impl Expression for Immediate {
    fn get_name() -> &'static str {
        "immediate"
    }
}
