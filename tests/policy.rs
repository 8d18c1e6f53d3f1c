use std::convert::TryFrom;
use std::net::IpAddr;

use nftkeeper::expr::{ExpressionVariant, VerdictKind};
use nftkeeper::policy::{
    IpAddrSpec, L3Rule, L4Rule, MetaMatch, MetaRule, NatAttributes, Port, RelOp, Rule,
    RuleAction,
};
use nftkeeper::{compile, CompileError, InvalidProtocolFamily, ProtocolFamily, ValidationError};

fn names(rule: &Rule, family: ProtocolFamily) -> Vec<&'static str> {
    compile(rule, family)
        .unwrap()
        .expressions()
        .iter()
        .map(|e| e.get_name())
        .collect()
}

#[test]
fn jump_to_chain_for_a_list_of_destinations() {
    let rule = Rule::new(RuleAction::jump("fake-chain-1")).with_l3(L3Rule::dst(IpAddrSpec::list(
        vec!["1.2.3.4".parse().unwrap(), "2.3.4.5".parse().unwrap()],
    )));
    let compiled = compile(&rule, ProtocolFamily::Ipv4).unwrap();

    assert_eq!(compiled.sets().len(), 1);
    assert_eq!(compiled.sets()[0].elements.len(), 2);
    assert!(compiled.sets()[0].elements.iter().all(|e| e.key.len() == 4));
    assert_eq!(names(&rule, ProtocolFamily::Ipv4), vec!["payload", "lookup", "immediate"]);

    match &compiled.expressions()[2] {
        ExpressionVariant::Immediate(imm) => assert_eq!(
            imm.verdict(),
            Some(&VerdictKind::Jump {
                chain: "fake-chain-1".to_string()
            })
        ),
        other => panic!("expected a verdict, got {:?}", other),
    }
}

#[test]
fn drop_everything_but_one_port() {
    let rule = Rule::new(RuleAction::drop()).with_l4(
        L4Rule::new(libc::IPPROTO_TCP as u8).with_dst(Port::list(vec![8888]).with_op(RelOp::Neq)),
    );
    let compiled = compile(&rule, ProtocolFamily::Ipv6).unwrap();
    assert!(compiled.sets().is_empty());
    assert_eq!(
        names(&rule, ProtocolFamily::Ipv6),
        vec!["meta", "cmp", "payload", "cmp", "immediate"]
    );
}

#[test]
fn masquerade_like_snat() {
    let addr: IpAddr = "198.51.100.7".parse().unwrap();
    let rule = Rule::new(RuleAction::snat(NatAttributes::to_addr(addr).with_port_range(
        10000, 20000,
    )))
    .with_meta(MetaRule::new(vec![MetaMatch::oifname("wan0").unwrap()]));
    assert_eq!(
        names(&rule, ProtocolFamily::Ipv4),
        vec!["meta", "cmp", "immediate", "immediate", "immediate", "nat"]
    );
}

#[test]
fn errors_are_reported_before_compiling() {
    let rule = Rule::new(RuleAction::redirect(9999, true));
    assert_eq!(
        compile(&rule, ProtocolFamily::Ipv4),
        Err(CompileError::Validation(ValidationError::NoCriteria))
    );
}

#[test]
fn protocol_family_from_raw_value() {
    assert_eq!(ProtocolFamily::try_from(libc::NFPROTO_INET), Ok(ProtocolFamily::Inet));
    assert_eq!(ProtocolFamily::try_from(1000), Err(InvalidProtocolFamily(1000)));
}
