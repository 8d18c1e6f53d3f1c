use serde::Serialize;

use super::{Expression, Register};
use crate::ProtocolFamily;

/// Redirects the packet to the local machine, optionally rewriting its destination port to the
/// value held in `reg_proto_min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub reg_proto_min: Option<Register>,
    pub reg_proto_max: Option<Register>,
    pub flags: u32,
}

impl Expression for Redirect {
    fn get_name() -> &'static str {
        "redir"
    }
}

/// Hands the packet to a local transparent proxy socket listening on the port held in
/// `reg_port`, without rewriting the packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TProxy {
    pub family: ProtocolFamily,
    pub reg_port: Register,
}

impl Expression for TProxy {
    fn get_name() -> &'static str {
        "tproxy"
    }
}
