use std::sync::Arc;

use ipnetwork::IpNetwork;

use super::{get_test_chain, get_test_store, MockTransport, Op, CHAIN_NAME, TABLE_NAME};
use crate::error::StoreError;
use crate::expr::{ExpressionList, ExpressionVariant};
use crate::policy::{IpAddrSpec, L3Rule, L4Rule, Port, Rule as PolicyRule, RuleAction};
use crate::{ProtocolFamily, Rule, RuleId, RuleStore};

fn get_rule_store(transport: &Arc<MockTransport>) -> Arc<RuleStore> {
    let store = get_test_store(transport);
    store.create_imm(TABLE_NAME, ProtocolFamily::Ipv4).unwrap();
    let chains = store.table(TABLE_NAME, ProtocolFamily::Ipv4).unwrap();
    chains.create_imm(CHAIN_NAME, None).unwrap();
    chains.chain(CHAIN_NAME).unwrap()
}

fn net(s: &str) -> IpNetwork {
    s.parse().unwrap()
}

fn list_rule() -> PolicyRule {
    PolicyRule::new(RuleAction::accept())
        .with_l3(L3Rule::src(IpAddrSpec::list(vec![net("10.0.0.1"), net("10.0.0.2")])))
        .with_l4(L4Rule::new(libc::IPPROTO_TCP as u8).with_dst(Port::list(vec![80, 443])))
}

#[test]
fn rule_id_round_trips_through_userdata() {
    let id = RuleId(0x01020304);
    assert_eq!(RuleId::from_userdata(&id.to_userdata()), Some(id));
    assert_eq!(RuleId::from_userdata(b"mockruledata"), None);
    assert_eq!(RuleId::from_userdata(&[]), None);
}

#[test]
fn create_stages_sets_before_the_rule() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create(&list_rule()).unwrap();
    let staged = transport.staged();
    assert_eq!(staged.len(), 3);

    let (first, second) = match (&staged[0], &staged[1]) {
        (Op::AddSet(a), Op::AddSet(b)) => (a, b),
        other => panic!("expected two sets, got {:?}", other),
    };
    assert_eq!(first.table, TABLE_NAME);
    assert_eq!(second.id, first.id + 1);

    match &staged[2] {
        Op::AddRule(rule) => {
            assert_eq!(rule.id(), Some(id));
            assert_eq!(rule.chain, CHAIN_NAME);
            assert_eq!(rule.handle, None);
            let lookups: Vec<u32> = rule
                .get_expressions()
                .iter()
                .filter_map(|e| match e {
                    ExpressionVariant::Lookup(l) => Some(l.set_id),
                    _ => None,
                })
                .collect();
            assert_eq!(lookups, vec![first.id, second.id]);
        }
        other => panic!("expected a rule, got {:?}", other),
    }
}

#[test]
fn set_ids_are_unique_across_rules() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    rules.create(&list_rule()).unwrap();
    rules.create(&list_rule()).unwrap();
    let mut ids: Vec<u32> = transport
        .staged()
        .iter()
        .filter_map(|op| match op {
            Op::AddSet(set) => Some(set.id),
            _ => None,
        })
        .collect();
    assert_eq!(ids.len(), 4);
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn create_imm_resolves_the_handle() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let first = rules.create_imm(&list_rule()).unwrap();
    let second = rules
        .create_imm(&PolicyRule::new(RuleAction::drop()))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(rules.get(), vec![first, second]);

    let kernel = transport.kernel_rules();
    assert_eq!(kernel.len(), 2);
    assert_eq!(rules.handle(first).unwrap(), kernel[0].handle);
    assert_eq!(rules.handle(second).unwrap(), kernel[1].handle);
    assert_eq!(transport.kernel_sets().len(), 2);
}

#[test]
fn invalid_rule_is_not_staged() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let rule = PolicyRule::new(RuleAction::jump(""));
    assert!(matches!(rules.create(&rule), Err(StoreError::Compile(_))));
    assert!(rules.get().is_empty());
    assert!(transport.staged().is_empty());
}

#[test]
fn failed_create_imm_rolls_back() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    transport.fail_commits(1);
    assert!(rules.create_imm(&list_rule()).is_err());
    assert!(rules.get().is_empty());
    assert!(transport.kernel_rules().is_empty());
}

#[test]
fn delete_of_uncommitted_rule_is_local() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create(&PolicyRule::new(RuleAction::accept())).unwrap();
    // Drop the staged rule, as if the batch had been discarded.
    transport.fail_commits(1);
    assert!(crate::Transport::flush(&*transport).is_err());

    rules.delete(id).unwrap();
    assert!(rules.get().is_empty());
    assert!(transport.staged().is_empty());
}

#[test]
fn delete_withdraws_a_staged_rule() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let withdrawn = rules.create(&list_rule()).unwrap();
    let kept = rules.create(&PolicyRule::new(RuleAction::drop())).unwrap();
    rules.delete(withdrawn).unwrap();
    assert_eq!(rules.get(), vec![kept]);
    match &transport.staged()[..] {
        [Op::AddRule(rule)] => assert_eq!(rule.id(), Some(kept)),
        other => panic!("unexpected staged messages {:?}", other),
    }

    crate::Transport::flush(&*transport).unwrap();
    let kernel = transport.kernel_rules();
    assert_eq!(kernel.len(), 1);
    assert_eq!(kernel[0].id(), Some(kept));
    assert!(transport.kernel_sets().is_empty());
}

#[test]
fn delete_imm_withdraws_a_staged_rule() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create(&list_rule()).unwrap();
    rules.delete_imm(id).unwrap();
    assert!(rules.get().is_empty());
    assert!(transport.staged().is_empty());

    crate::Transport::flush(&*transport).unwrap();
    assert!(transport.kernel_rules().is_empty());
}

#[test]
fn delete_resolves_the_handle() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create(&PolicyRule::new(RuleAction::accept())).unwrap();
    crate::Transport::flush(&*transport).unwrap();
    let handle = transport.kernel_rules()[0].handle;
    assert!(handle.is_some());

    rules.delete(id).unwrap();
    match &transport.staged()[..] {
        [Op::DelRule(rule)] => assert_eq!(rule.handle, handle),
        other => panic!("unexpected staged messages {:?}", other),
    }
    assert!(matches!(rules.delete(id), Err(StoreError::NotFound { kind: "rule", .. })));
}

#[test]
fn delete_imm_retries_while_busy() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create_imm(&PolicyRule::new(RuleAction::accept())).unwrap();
    transport.fail_busy(2);
    rules.delete_imm(id).unwrap();
    assert!(rules.get().is_empty());
    assert!(transport.kernel_rules().is_empty());
}

#[test]
fn sync_absorbs_external_rules() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let local = rules.create_imm(&PolicyRule::new(RuleAction::accept())).unwrap();
    let pending = rules.create(&PolicyRule::new(RuleAction::drop())).unwrap();
    crate::Transport::flush(&*transport).unwrap();

    let external = Rule::new(&get_test_chain()).with_expressions(ExpressionList::default());
    transport.external(Op::AddRule(external));
    // A rule carrying an id already taken locally gets a fresh one.
    let clashing = Rule::new(&get_test_chain()).with_userdata(local.to_userdata());
    transport.external(Op::AddRule(clashing));

    assert_eq!(rules.handle(pending).unwrap(), None);
    rules.sync().unwrap();

    let ids = rules.get();
    assert_eq!(ids.len(), 4);
    assert_eq!(&ids[..2], &[local, pending]);
    assert!(rules.handle(pending).unwrap().is_some());
    assert!(!ids[2..].contains(&local));

    rules.sync().unwrap();
    assert_eq!(rules.get().len(), 4);
}

#[test]
fn sync_reuses_free_ids() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let tagged = Rule::new(&get_test_chain()).with_userdata(RuleId(42).to_userdata());
    transport.external(Op::AddRule(tagged));
    rules.sync().unwrap();
    assert_eq!(rules.get(), vec![RuleId(42)]);

    let next = rules.create(&PolicyRule::new(RuleAction::accept())).unwrap();
    assert!(next.0 > 42);
}

#[test]
fn exist_absorbs_external_rules() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    assert!(!rules.exist(RuleId(7)));
    let tagged = Rule::new(&get_test_chain()).with_userdata(RuleId(7).to_userdata());
    transport.external(Op::AddRule(tagged));
    assert!(rules.exist(RuleId(7)));
    assert_eq!(rules.get(), vec![RuleId(7)]);
}

#[test]
fn exist_is_false_when_absorbing_fails() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);
    let tagged = Rule::new(&get_test_chain()).with_userdata(RuleId(7).to_userdata());
    transport.external(Op::AddRule(tagged));

    transport.fail_listings_after(1);
    assert!(!rules.exist(RuleId(7)));
    assert!(matches!(rules.rule(RuleId(7)), Err(StoreError::NotFound { .. })));
}

#[test]
fn rule_and_dump() {
    let transport = MockTransport::new();
    let rules = get_rule_store(&transport);

    let id = rules.create(&list_rule()).unwrap();
    let rule = rules.rule(id).unwrap();
    assert_eq!(rule.table, TABLE_NAME);
    assert!(matches!(rules.rule(RuleId(999)), Err(StoreError::NotFound { .. })));

    let dump: serde_json::Value = serde_json::from_slice(&rules.dump().unwrap()).unwrap();
    let entries = dump.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.0);
    assert_eq!(entries[0]["sets"].as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["rule"]["expressions"][0]["expr"], "payload");
}
