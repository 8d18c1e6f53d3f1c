use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{lock, reserve_set_ids, retry_busy, RetryPolicy};
use crate::error::StoreError;
use crate::{compile, policy, Chain, Rule, RuleId, Set, Transport};

const KIND: &str = "rule";

#[derive(Debug, Clone, Serialize)]
struct RuleEntry {
    id: RuleId,
    rule: Rule,
    /// Anonymous sets created along with the rule. Empty for rules absorbed by a sync.
    sets: Vec<Set>,
}

#[derive(Debug)]
struct Rules {
    next_id: u32,
    /// In insertion order, which is also the evaluation order of rules appended to the chain.
    entries: Vec<RuleEntry>,
}

impl Rules {
    fn position(&self, id: RuleId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn allocate_id(&mut self) -> RuleId {
        while self.position(RuleId(self.next_id)).is_some() {
            self.next_id += 1;
        }
        let id = RuleId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// The rules of one chain.
///
/// Rules have no name: the store identifies them by a [`RuleId`] it allocates, and records it in
/// the rule userdata so that the rule can be recognized when listed back from the kernel.
pub struct RuleStore {
    chain: Chain,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    rules: Mutex<Rules>,
}

impl RuleStore {
    pub(crate) fn new(chain: Chain, transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        RuleStore {
            chain,
            transport,
            retry,
            rules: Mutex::new(Rules {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    pub fn get_chain(&self) -> &Chain {
        &self.chain
    }

    /// Compiles `rule` for the family of the chain and stages it, along with its sets, at the
    /// end of the chain.
    pub fn create(&self, rule: &policy::Rule) -> Result<RuleId, StoreError> {
        let mut rules = lock(&self.rules);
        self.create_locked(&mut rules, rule)
    }

    /// Same as [`create`](Self::create), then commits the batch and records the handle the
    /// kernel gave to the rule. The rule is removed from the store if the commit fails.
    pub fn create_imm(&self, rule: &policy::Rule) -> Result<RuleId, StoreError> {
        let mut rules = lock(&self.rules);
        let id = self.create_locked(&mut rules, rule)?;
        if let Err(e) = self.transport.flush() {
            warn!("Commit of rule {} in chain {} failed, rolling back", id, self.chain.name);
            if let Some(pos) = rules.position(id) {
                rules.entries.remove(pos);
            }
            return Err(e.into());
        }
        match self.resolve_handle(id) {
            Ok(Some(handle)) => {
                if let Some(pos) = rules.position(id) {
                    rules.entries[pos].rule.handle = Some(handle);
                }
            }
            Ok(None) => warn!("Rule {} is missing from chain {}", id, self.chain.name),
            Err(e) => warn!("Unable to list the rules of chain {}: {}", self.chain.name, e),
        }
        Ok(id)
    }

    fn create_locked(
        &self,
        rules: &mut Rules,
        rule: &policy::Rule,
    ) -> Result<RuleId, StoreError> {
        let mut compiled = compile(rule, self.chain.family)?;
        let first_set_id = reserve_set_ids(compiled.sets().len());
        compiled.bind_sets(self.chain.family, &self.chain.table, first_set_id);
        let (expressions, sets) = compiled.into_parts();

        let id = rules.allocate_id();
        let kernel_rule = Rule::new(&self.chain)
            .with_expressions(expressions)
            .with_userdata(id.to_userdata());
        for set in &sets {
            trace!("Staging set {} of rule {}", set.id, id);
            self.transport.add_set(set)?;
        }
        trace!("Staging rule {} in chain {}", id, self.chain.name);
        self.transport.add_rule(&kernel_rule)?;

        rules.entries.push(RuleEntry {
            id,
            rule: kernel_rule,
            sets,
        });
        Ok(id)
    }

    /// Removes the rule from the store and stages its deletion. A rule still waiting in the
    /// batch is withdrawn from it instead, and a rule the kernel never heard of is only dropped
    /// locally.
    pub fn delete(&self, id: RuleId) -> Result<(), StoreError> {
        let mut rules = lock(&self.rules);
        let rule = match self.take_committed(&mut rules, id)? {
            Some(rule) => rule,
            None => return Ok(()),
        };
        trace!("Staging deletion of rule {} from chain {}", id, self.chain.name);
        self.transport.del_rule(&rule)?;
        Ok(())
    }

    /// Removes the rule from the store and deletes it from the kernel right away, retrying while
    /// the kernel reports it as busy. The rule is gone from the store even when this fails.
    pub fn delete_imm(&self, id: RuleId) -> Result<(), StoreError> {
        let mut rules = lock(&self.rules);
        let rule = match self.take_committed(&mut rules, id)? {
            Some(rule) => rule,
            None => return Ok(()),
        };
        let what = format!("rule {} of chain {}", id, self.chain.name);
        retry_busy(&self.retry, &what, || {
            self.transport.del_rule(&rule)?;
            self.transport.flush()
        })?;
        Ok(())
    }

    /// Removes the entry and returns the kernel rule to delete, with its handle set, or `None`
    /// when the rule cannot reach the kernel anymore.
    fn take_committed(
        &self,
        rules: &mut Rules,
        id: RuleId,
    ) -> Result<Option<Rule>, StoreError> {
        let pos = rules
            .position(id)
            .ok_or_else(|| StoreError::not_found(KIND, id.to_string()))?;
        let mut rule = rules.entries[pos].rule.clone();
        if rule.handle.is_none() {
            rule.handle = self.resolve_handle(id)?;
        }
        if rule.handle.is_none() {
            if self.transport.unstage_rule(&rule, &rules.entries[pos].sets)? {
                debug!("Rule {} withdrawn from the pending batch", id);
            } else {
                // The batch may have been sent since the listing.
                rule.handle = self.resolve_handle(id)?;
            }
        }
        rules.entries.remove(pos);
        if rule.handle.is_none() {
            debug!("Rule {} never reached the kernel, dropping it locally", id);
            return Ok(None);
        }
        Ok(Some(rule))
    }

    fn resolve_handle(&self, id: RuleId) -> Result<Option<u64>, StoreError> {
        let listed = self.transport.list_rules(&self.chain)?;
        Ok(listed
            .into_iter()
            .find(|r| r.id() == Some(id))
            .and_then(|r| r.handle))
    }

    /// Whether the store holds the rule. On a miss the kernel is asked, and a rule found there
    /// is absorbed with a [`sync`](Self::sync). A failed sync reports the rule as missing.
    pub fn exist(&self, id: RuleId) -> bool {
        if lock(&self.rules).position(id).is_some() {
            return true;
        }
        let listed = match self.transport.list_rules(&self.chain) {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Unable to list the rules of chain {}: {}", self.chain.name, e);
                return false;
            }
        };
        if !listed.iter().any(|r| r.id() == Some(id)) {
            return false;
        }
        if let Err(e) = self.sync() {
            warn!("Unable to sync the rules of chain {}: {}", self.chain.name, e);
            return false;
        }
        lock(&self.rules).position(id).is_some()
    }

    /// Absorbs the rules the kernel holds and the store does not. Local entries are never
    /// removed, only completed with the handle the kernel gave them.
    pub fn sync(&self) -> Result<(), StoreError> {
        let listed = self.transport.list_rules(&self.chain)?;
        let mut rules = lock(&self.rules);
        for kernel_rule in listed {
            let handle = kernel_rule.handle;
            if handle.is_some() && rules.entries.iter().any(|e| e.rule.handle == handle) {
                continue;
            }
            if let Some(id) = kernel_rule.id() {
                if let Some(pos) = rules.position(id) {
                    let entry = &mut rules.entries[pos];
                    if entry.rule.handle.is_none() {
                        entry.rule.handle = handle;
                        continue;
                    }
                }
            }
            let id = match kernel_rule.id() {
                Some(id) if rules.position(id).is_none() => {
                    rules.next_id = rules.next_id.max(id.0.saturating_add(1));
                    id
                }
                _ => rules.allocate_id(),
            };
            info!(
                "Absorbing rule with handle {:?} of chain {} as {}",
                handle, self.chain.name, id
            );
            rules.entries.push(RuleEntry {
                id,
                rule: kernel_rule,
                sets: Vec::new(),
            });
        }
        Ok(())
    }

    /// Identifiers of the rules, in insertion order.
    pub fn get(&self) -> Vec<RuleId> {
        lock(&self.rules).entries.iter().map(|e| e.id).collect()
    }

    pub fn rule(&self, id: RuleId) -> Result<Rule, StoreError> {
        let rules = lock(&self.rules);
        rules
            .position(id)
            .map(|pos| rules.entries[pos].rule.clone())
            .ok_or_else(|| StoreError::not_found(KIND, id.to_string()))
    }

    /// The kernel handle of the rule, once known.
    pub fn handle(&self, id: RuleId) -> Result<Option<u64>, StoreError> {
        Ok(self.rule(id)?.handle)
    }

    pub fn dump(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec_pretty(&self.snapshot()?)?)
    }

    pub(crate) fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&lock(&self.rules).entries)
    }
}
