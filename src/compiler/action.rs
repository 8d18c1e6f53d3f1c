use std::net::IpAddr;

use crate::data_type::ip_to_vec;
use crate::error::CompileError;
use crate::expr::{ExpressionList, Immediate, Nat, NatType, Redirect, Register, TProxy, VerdictKind};
use crate::policy::{ip_family, NatAttributes, RuleAction};
use crate::sys::{
    NF_NAT_RANGE_MAP_IPS, NF_NAT_RANGE_PERSISTENT, NF_NAT_RANGE_PROTO_RANDOM,
    NF_NAT_RANGE_PROTO_RANDOM_FULLY, NF_NAT_RANGE_PROTO_SPECIFIED,
};
use crate::ProtocolFamily;

pub(super) fn compile_action(
    exprs: &mut ExpressionList,
    action: &RuleAction,
    family: ProtocolFamily,
) -> Result<(), CompileError> {
    match action {
        RuleAction::Verdict(verdict) => {
            exprs.add_expression(Immediate::new_verdict(VerdictKind::from(verdict)));
        }
        RuleAction::Redirect { port, tproxy } => {
            exprs.add_expression(Immediate::new_data(port.to_be_bytes().to_vec(), Register::Reg1));
            if *tproxy {
                // An inet table serves both families, the proxy then applies to whichever one the
                // packet belongs to.
                let family = match family {
                    ProtocolFamily::Inet => ProtocolFamily::Unspec,
                    f => f,
                };
                exprs.add_expression(TProxy {
                    family,
                    reg_port: Register::Reg1,
                });
            } else {
                exprs.add_expression(Redirect {
                    reg_proto_min: Some(Register::Reg1),
                    reg_proto_max: None,
                    flags: NF_NAT_RANGE_PROTO_SPECIFIED,
                });
            }
        }
        RuleAction::SNat(attrs) => compile_nat(exprs, NatType::SNat, attrs, family)?,
        RuleAction::DNat(attrs) => compile_nat(exprs, NatType::DNat, attrs, family)?,
    }
    Ok(())
}

/// Addresses are loaded in registers 1 and 2, ports in registers 3 and 4.
fn compile_nat(
    exprs: &mut ExpressionList,
    nat_type: NatType,
    attrs: &NatAttributes,
    family: ProtocolFamily,
) -> Result<(), CompileError> {
    let nat_family = match attrs.addr {
        Some((low, _)) => addr_family(&low, family)?,
        None => family,
    };
    let mut nat = Nat::new(nat_type, nat_family);

    if let Some((low, high)) = attrs.addr {
        exprs.add_expression(Immediate::new_data(ip_to_vec(low), Register::Reg1));
        nat.reg_addr_min = Some(Register::Reg1);
        if let Some(high) = high {
            exprs.add_expression(Immediate::new_data(ip_to_vec(high), Register::Reg2));
            nat.reg_addr_max = Some(Register::Reg2);
        }
        nat.flags |= NF_NAT_RANGE_MAP_IPS;
    }
    if let Some((low, high)) = attrs.port {
        exprs.add_expression(Immediate::new_data(low.to_be_bytes().to_vec(), Register::Reg3));
        nat.reg_proto_min = Some(Register::Reg3);
        if let Some(high) = high {
            exprs.add_expression(Immediate::new_data(high.to_be_bytes().to_vec(), Register::Reg4));
            nat.reg_proto_max = Some(Register::Reg4);
        }
        nat.flags |= NF_NAT_RANGE_PROTO_SPECIFIED;
    }
    if attrs.random {
        nat.flags |= NF_NAT_RANGE_PROTO_RANDOM;
    }
    if attrs.fully_random {
        nat.flags |= NF_NAT_RANGE_PROTO_RANDOM_FULLY;
    }
    if attrs.persistent {
        nat.flags |= NF_NAT_RANGE_PERSISTENT;
    }
    exprs.add_expression(nat);
    Ok(())
}

/// The family of the translated address. It must agree with the table unless the table is inet.
fn addr_family(
    addr: &IpAddr,
    table_family: ProtocolFamily,
) -> Result<ProtocolFamily, CompileError> {
    let found = ip_family(addr);
    match table_family {
        ProtocolFamily::Inet => Ok(found),
        expected if expected == found => Ok(found),
        expected => Err(CompileError::FamilyMismatch { expected, found }),
    }
}
