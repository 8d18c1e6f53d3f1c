use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use super::CompiledRule;
use crate::data_type::ip_to_vec;
use crate::error::CompileError;
use crate::expr::{
    Bitwise, Cmp, CmpOp, ExpressionList, HighLevelPayload, IPv4HeaderField, IPv6HeaderField,
    Lookup, Meta, MetaType, NetworkHeaderField, Range, RangeOp,
};
use crate::policy::{is_host, IpAddrSpec, IpVersion, L3Match, L3Rule};
use crate::set::SetBuilder;
use crate::ProtocolFamily;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Direction {
    Src,
    Dst,
}

/// The address field of the network header for `family`. Getting this pair wrong does not fail,
/// it silently matches another part of the header.
fn address_field(family: ProtocolFamily, dir: Direction) -> Result<HighLevelPayload, CompileError> {
    let field = match (family, dir) {
        (ProtocolFamily::Ipv4, Direction::Src) => NetworkHeaderField::IPv4(IPv4HeaderField::Saddr),
        (ProtocolFamily::Ipv4, Direction::Dst) => NetworkHeaderField::IPv4(IPv4HeaderField::Daddr),
        (ProtocolFamily::Ipv6, Direction::Src) => NetworkHeaderField::IPv6(IPv6HeaderField::Saddr),
        (ProtocolFamily::Ipv6, Direction::Dst) => NetworkHeaderField::IPv6(IPv6HeaderField::Daddr),
        (family, _) => return Err(CompileError::UnsupportedFamily(family)),
    };
    Ok(HighLevelPayload::Network(field))
}

pub(super) fn compile_l3(
    compiled: &mut CompiledRule,
    l3: &L3Rule,
    family: ProtocolFamily,
    exclude: bool,
) -> Result<(), CompileError> {
    match l3.target {
        Some(L3Match::Version(version)) => {
            compile_version(&mut compiled.expressions, version, exclude)?
        }
        Some(L3Match::Addr { ref src, ref dst }) => {
            if let Some(spec) = src {
                compile_addr(compiled, spec, family, Direction::Src, exclude)?;
            }
            if let Some(spec) = dst {
                compile_addr(compiled, spec, family, Direction::Dst, exclude)?;
            }
        }
        None => {}
    }
    if let Some(protocol) = l3.protocol {
        compiled.expressions.add_expression(Meta::new(MetaType::L4Proto));
        compiled.expressions.add_expression(Cmp::new(CmpOp::Eq, [protocol]));
    }
    Ok(())
}

/// The version lives in the high nibble of the first byte of both IPv4 and IPv6 headers.
fn compile_version(
    exprs: &mut ExpressionList,
    version: IpVersion,
    exclude: bool,
) -> Result<(), CompileError> {
    let payload = HighLevelPayload::Network(NetworkHeaderField::IPv4(IPv4HeaderField::VersionIhl));
    exprs.add_expression(payload.build());
    exprs.add_expression(Bitwise::new([0xf0], [0])?);
    exprs.add_expression(Cmp::new(CmpOp::eq_unless(exclude), [(version as u8) << 4]));
    Ok(())
}

fn compile_addr(
    compiled: &mut CompiledRule,
    spec: &IpAddrSpec,
    family: ProtocolFamily,
    dir: Direction,
    exclude: bool,
) -> Result<(), CompileError> {
    let found = spec.family().unwrap_or(family);
    let family = match family {
        // An inet table sees both families, the address match is guarded by the family of the
        // packet.
        ProtocolFamily::Inet => {
            compiled.expressions.add_expression(Meta::new(MetaType::NfProto));
            compiled.expressions.add_expression(Cmp::new(CmpOp::Eq, [found as u8]));
            found
        }
        ProtocolFamily::Ipv4 | ProtocolFamily::Ipv6 if family != found => {
            return Err(CompileError::FamilyMismatch {
                expected: family,
                found,
            });
        }
        other => other,
    };
    let field = address_field(family, dir)?;

    match spec {
        IpAddrSpec::List(list) if list.len() == 1 => {
            debug!("Matching {:?} {} inline", dir, list[0]);
            compiled.expressions.add_expression(field.build());
            compile_single(&mut compiled.expressions, &list[0], exclude)?;
        }
        IpAddrSpec::List(list) => {
            debug!("Matching {} {:?} addresses with a set lookup", list.len(), dir);
            let set = match family {
                ProtocolFamily::Ipv4 => {
                    let mut builder = SetBuilder::<Ipv4Addr>::anonymous();
                    for net in list {
                        if let IpAddr::V4(ip) = net.ip() {
                            builder.add(&ip);
                        }
                    }
                    builder.finish()
                }
                _ => {
                    let mut builder = SetBuilder::<Ipv6Addr>::anonymous();
                    for net in list {
                        if let IpAddr::V6(ip) = net.ip() {
                            builder.add(&ip);
                        }
                    }
                    builder.finish()
                }
            };
            compiled.expressions.add_expression(field.build());
            let lookup = Lookup::new(compiled.add_set(set), exclude);
            compiled.expressions.add_expression(lookup);
        }
        IpAddrSpec::Range(low, high) => {
            compiled.expressions.add_expression(field.build());
            let op = if exclude { RangeOp::Neq } else { RangeOp::Eq };
            compiled
                .expressions
                .add_expression(Range::new(op, ip_to_vec(*low), ip_to_vec(*high)));
        }
    }
    Ok(())
}

/// A host address is compared directly, a network is masked first.
fn compile_single(
    exprs: &mut ExpressionList,
    net: &IpNetwork,
    exclude: bool,
) -> Result<(), CompileError> {
    let op = CmpOp::eq_unless(exclude);
    if is_host(net) {
        exprs.add_expression(Cmp::new(op, ip_to_vec(net.ip())));
        return Ok(());
    }
    let mask = ip_to_vec(net.mask());
    let xor = vec![0u8; mask.len()];
    exprs.add_expression(Bitwise::new(mask, xor)?);
    exprs.add_expression(Cmp::new(op, ip_to_vec(net.network())));
    Ok(())
}
