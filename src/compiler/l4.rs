use super::CompiledRule;
use crate::data_type::InetService;
use crate::expr::{
    Cmp, CmpOp, HighLevelPayload, Lookup, Meta, MetaType, Range, RangeOp, TCPHeaderField,
    TransportHeaderField, UDPHeaderField,
};
use crate::policy::{L4Rule, Port, PortMatch};
use crate::set::SetBuilder;

fn port_field(protocol: u8, src: bool) -> HighLevelPayload {
    let field = if protocol == libc::IPPROTO_TCP as u8 {
        TransportHeaderField::Tcp(if src {
            TCPHeaderField::Sport
        } else {
            TCPHeaderField::Dport
        })
    } else {
        TransportHeaderField::Udp(if src {
            UDPHeaderField::Sport
        } else {
            UDPHeaderField::Dport
        })
    };
    HighLevelPayload::Transport(field)
}

/// The protocol is always matched before the ports, which only make sense once the transport
/// header is known to be the expected one.
pub(super) fn compile_l4(compiled: &mut CompiledRule, l4: &L4Rule) {
    compiled.expressions.add_expression(Meta::new(MetaType::L4Proto));
    compiled.expressions.add_expression(Cmp::new(CmpOp::Eq, [l4.protocol]));

    if let Some(ref port) = l4.src {
        compile_port(compiled, port, port_field(l4.protocol, true));
    }
    if let Some(ref port) = l4.dst {
        compile_port(compiled, port, port_field(l4.protocol, false));
    }
}

fn compile_port(compiled: &mut CompiledRule, port: &Port, field: HighLevelPayload) {
    let invert = port.op.is_neq();
    compiled.expressions.add_expression(field.build());
    match port.spec {
        PortMatch::List(ref list) if list.len() == 1 => {
            compiled
                .expressions
                .add_expression(Cmp::new(CmpOp::eq_unless(invert), list[0].to_be_bytes()));
        }
        PortMatch::List(ref list) => {
            debug!("Matching {} ports with a set lookup", list.len());
            let mut builder = SetBuilder::<InetService>::anonymous();
            for p in list {
                builder.add(&InetService(*p));
            }
            let lookup = Lookup::new(compiled.add_set(builder.finish()), invert);
            compiled.expressions.add_expression(lookup);
        }
        PortMatch::Range(low, high) => {
            let op = if invert { RangeOp::Neq } else { RangeOp::Eq };
            compiled
                .expressions
                .add_expression(Range::new(op, low.to_be_bytes(), high.to_be_bytes()));
        }
    }
}
