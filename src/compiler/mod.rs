//! Turns a [`policy::Rule`] into the instruction sequence the kernel evaluates.
//!
//! The sequence is always laid out in the same order: metadata matches, network layer matches,
//! transport layer matches, the optional counter and log statements, then the single terminal
//! action. The kernel stops evaluating a rule at the first expression that does not match, so
//! the coarse network layer checks run before the transport layer ones.
//!
//! Compilation is pure: the result only describes what has to be sent to the kernel.

use serde::Serialize;

use crate::error::CompileError;
use crate::expr::{Cmp, CmpOp, Counter, ExpressionList, ExpressionVariant, Meta};
use crate::policy::{MetaRule, Rule};
use crate::set::Set;
use crate::ProtocolFamily;

mod action;
mod l3;
mod l4;

/// The output of [`compile`]: the expressions of the rule, and the anonymous sets its lookups
/// refer to.
///
/// Until [`bind_sets`](Self::bind_sets) is called, the sets carry their index in [`sets`] as
/// identifier, and so do the lookups referring to them.
///
/// [`sets`]: Self::sets
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CompiledRule {
    expressions: ExpressionList,
    sets: Vec<Set>,
}

impl CompiledRule {
    pub fn expressions(&self) -> &ExpressionList {
        &self.expressions
    }

    pub fn sets(&self) -> &[Set] {
        &self.sets
    }

    pub fn into_parts(self) -> (ExpressionList, Vec<Set>) {
        (self.expressions, self.sets)
    }

    /// Places the sets in `table` and renumbers them, along with the lookups referring to them,
    /// starting from `first_id`. Set identifiers must be unique within a batch.
    pub fn bind_sets(&mut self, family: ProtocolFamily, table: &str, first_id: u32) {
        for set in self.sets.iter_mut() {
            let id = first_id + set.id;
            set.bind(family, table, id);
        }
        for expr in self.expressions.iter_mut() {
            if let ExpressionVariant::Lookup(lookup) = expr {
                lookup.set_id += first_id;
            }
        }
    }

    /// Registers a set built by one of the matchers, giving it the next free local index.
    fn add_set(&mut self, mut set: Set) -> &Set {
        set.id = self.sets.len() as u32;
        self.sets.push(set);
        &self.sets[self.sets.len() - 1]
    }
}

/// Validates `rule` and compiles it for a table of the given family.
pub fn compile(rule: &Rule, family: ProtocolFamily) -> Result<CompiledRule, CompileError> {
    rule.validate()?;

    let mut compiled = CompiledRule::default();
    if let Some(ref meta) = rule.meta {
        compile_meta(&mut compiled.expressions, meta);
    }
    if let Some(ref l3) = rule.l3 {
        l3::compile_l3(&mut compiled, l3, family, rule.exclude)?;
    }
    if let Some(ref l4) = rule.l4 {
        l4::compile_l4(&mut compiled, l4);
    }
    if rule.counter {
        compiled.expressions.add_expression(Counter::new());
    }
    if let Some(ref log) = rule.log {
        compiled.expressions.add_expression(log.clone());
    }
    action::compile_action(&mut compiled.expressions, &rule.action, family)?;

    debug!(
        "Compiled rule into {} expressions and {} sets",
        compiled.expressions.len(),
        compiled.sets.len()
    );
    Ok(compiled)
}

fn compile_meta(exprs: &mut ExpressionList, meta: &MetaRule) {
    for m in &meta.matches {
        exprs.add_expression(Meta::new(m.key));
        exprs.add_expression(Cmp::new(CmpOp::eq_unless(m.op.is_neq()), m.value.clone()));
    }
}
