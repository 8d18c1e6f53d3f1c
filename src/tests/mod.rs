use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::errno::Errno;

use crate::error::TransportError;
use crate::{Chain, ProtocolFamily, RetryPolicy, Rule, Set, Table, TableStore, Transport};

mod rule;

pub const TABLE_NAME: &str = "mocktable";
pub const CHAIN_NAME: &str = "mockchain";

/// A message staged to the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    AddTable(Table),
    DelTable(Table),
    AddChain(Chain),
    DelChain(Chain),
    AddSet(Set),
    AddRule(Rule),
    DelRule(Rule),
}

impl Op {
    fn is_deletion(&self) -> bool {
        matches!(self, Op::DelTable(_) | Op::DelChain(_) | Op::DelRule(_))
    }
}

#[derive(Debug, Default)]
struct MockState {
    staged: Vec<Op>,
    committed: Vec<Op>,
    flushes: usize,
    tables: Vec<Table>,
    chains: Vec<Chain>,
    sets: Vec<Set>,
    rules: Vec<Rule>,
    next_handle: u64,
    busy_commits: usize,
    failing_commits: usize,
    /// Listings answered before every further one fails, when set.
    listings_left: Option<usize>,
}

impl MockState {
    fn apply(&mut self, op: Op) {
        match op.clone() {
            Op::AddTable(table) => {
                if !self.tables.contains(&table) {
                    self.tables.push(table);
                }
            }
            Op::DelTable(table) => {
                self.tables.retain(|t| *t != table);
                self.chains.retain(|c| !c.belongs_to(&table));
                self.rules
                    .retain(|r| !(r.table == table.name && r.family == table.family));
            }
            Op::AddChain(chain) => {
                if !self.chains.iter().any(|c| c.name == chain.name && c.table == chain.table) {
                    self.chains.push(chain);
                }
            }
            Op::DelChain(chain) => {
                self.chains
                    .retain(|c| !(c.name == chain.name && c.table == chain.table));
                self.rules
                    .retain(|r| !(r.chain == chain.name && r.table == chain.table));
            }
            Op::AddSet(set) => self.sets.push(set),
            Op::AddRule(mut rule) => {
                self.next_handle += 1;
                rule.handle = Some(self.next_handle);
                self.rules.push(rule);
            }
            Op::DelRule(rule) => self.rules.retain(|r| r.handle != rule.handle),
        }
        self.committed.push(op);
    }
}

/// An in-memory kernel. Staged messages are applied on flush, which can be scripted to fail.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn stage(&self, op: Op) -> Result<(), TransportError> {
        self.state().staged.push(op);
        Ok(())
    }

    /// The next `count` commits containing a deletion fail with `EBUSY`.
    pub fn fail_busy(&self, count: usize) {
        self.state().busy_commits = count;
    }

    /// The next `count` commits fail with `EINVAL`.
    pub fn fail_commits(&self, count: usize) {
        self.state().failing_commits = count;
    }

    /// The next `count` listings succeed, the following ones fail with `EIO`.
    pub fn fail_listings_after(&self, count: usize) {
        self.state().listings_left = Some(count);
    }

    fn listing(&self) -> Result<std::sync::MutexGuard<'_, MockState>, TransportError> {
        let mut state = self.state();
        if let Some(left) = state.listings_left.as_mut() {
            if *left == 0 {
                return Err(Errno::EIO.into());
            }
            *left -= 1;
        }
        Ok(state)
    }

    /// Applies `op` as if another program had committed it.
    pub fn external(&self, op: Op) {
        self.state().apply(op);
    }

    pub fn staged(&self) -> Vec<Op> {
        self.state().staged.clone()
    }

    pub fn committed(&self) -> Vec<Op> {
        self.state().committed.clone()
    }

    pub fn flushes(&self) -> usize {
        self.state().flushes
    }

    pub fn kernel_chains(&self) -> Vec<Chain> {
        self.state().chains.clone()
    }

    pub fn kernel_rules(&self) -> Vec<Rule> {
        self.state().rules.clone()
    }

    pub fn kernel_sets(&self) -> Vec<Set> {
        self.state().sets.clone()
    }
}

impl Transport for MockTransport {
    fn add_table(&self, table: &Table) -> Result<(), TransportError> {
        self.stage(Op::AddTable(table.clone()))
    }

    fn del_table(&self, table: &Table) -> Result<(), TransportError> {
        self.stage(Op::DelTable(table.clone()))
    }

    fn add_chain(&self, chain: &Chain) -> Result<(), TransportError> {
        self.stage(Op::AddChain(chain.clone()))
    }

    fn del_chain(&self, chain: &Chain) -> Result<(), TransportError> {
        self.stage(Op::DelChain(chain.clone()))
    }

    fn add_set(&self, set: &Set) -> Result<(), TransportError> {
        self.stage(Op::AddSet(set.clone()))
    }

    fn add_rule(&self, rule: &Rule) -> Result<(), TransportError> {
        self.stage(Op::AddRule(rule.clone()))
    }

    fn del_rule(&self, rule: &Rule) -> Result<(), TransportError> {
        self.stage(Op::DelRule(rule.clone()))
    }

    fn unstage_rule(&self, rule: &Rule, sets: &[Set]) -> Result<bool, TransportError> {
        let mut state = self.state();
        let before = state.staged.len();
        let staged_rule = Op::AddRule(rule.clone());
        state.staged.retain(|op| *op != staged_rule);
        let found = state.staged.len() != before;
        if found {
            state.staged.retain(|op| !matches!(op, Op::AddSet(set) if sets.contains(set)));
        }
        Ok(found)
    }

    fn flush(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.flushes += 1;
        let staged = std::mem::take(&mut state.staged);
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(Errno::EINVAL.into());
        }
        if state.busy_commits > 0 && staged.iter().any(Op::is_deletion) {
            state.busy_commits -= 1;
            return Err(Errno::EBUSY.into());
        }
        for op in staged {
            state.apply(op);
        }
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<Table>, TransportError> {
        Ok(self.listing()?.tables.clone())
    }

    fn list_chains(&self, table: &Table) -> Result<Vec<Chain>, TransportError> {
        Ok(self
            .listing()?
            .chains
            .iter()
            .filter(|c| c.belongs_to(table))
            .cloned()
            .collect())
    }

    fn list_rules(&self, chain: &Chain) -> Result<Vec<Rule>, TransportError> {
        Ok(self
            .listing()?
            .rules
            .iter()
            .filter(|r| {
                r.chain == chain.name && r.table == chain.table && r.family == chain.family
            })
            .cloned()
            .collect())
    }
}

pub fn get_test_table() -> Table {
    Table::new(TABLE_NAME, ProtocolFamily::Ipv4)
}

pub fn get_test_chain() -> Chain {
    Chain::new(CHAIN_NAME, &get_test_table())
}

/// A short retry policy, so that tests exhausting it stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::with_deadline(Duration::from_millis(200))
}

pub fn get_test_store(transport: &Arc<MockTransport>) -> TableStore {
    TableStore::with_retry_policy(transport.clone(), fast_retry())
}
