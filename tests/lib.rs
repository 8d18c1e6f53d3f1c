#![allow(dead_code)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nftkeeper::{
    Chain, ProtocolFamily, RetryPolicy, Rule, Set, Table, TableStore, Transport, TransportError,
};
use nix::errno::Errno;

pub const TABLE_NAME: &str = "mocktable";
pub const CHAIN_NAME: &str = "mockchain";

#[derive(Debug, Clone)]
enum Staged {
    Table(Table, bool),
    Chain(Chain, bool),
    Set(Set),
    Rule(Rule, bool),
}

#[derive(Debug, Default)]
struct Kernel {
    staged: Vec<Staged>,
    tables: Vec<Table>,
    chains: Vec<Chain>,
    sets: Vec<Set>,
    rules: Vec<Rule>,
    next_handle: u64,
    busy: usize,
    commits: usize,
}

/// Minimal in-memory stand-in for a netlink connection.
#[derive(Debug, Default)]
pub struct FakeKernel {
    inner: Mutex<Kernel>,
}

impl FakeKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeKernel::default())
    }

    /// The next `count` commits that delete something fail with `EBUSY`.
    pub fn busy_for(&self, count: usize) {
        self.inner.lock().unwrap().busy = count;
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    pub fn tables(&self) -> Vec<Table> {
        self.inner.lock().unwrap().tables.clone()
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.inner.lock().unwrap().chains.clone()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.inner.lock().unwrap().rules.clone()
    }

    pub fn sets(&self) -> Vec<Set> {
        self.inner.lock().unwrap().sets.clone()
    }

    /// Inserts a chain behind the back of the stores.
    pub fn insert_chain(&self, chain: Chain) {
        self.inner.lock().unwrap().chains.push(chain);
    }

    fn stage(&self, staged: Staged) -> Result<(), TransportError> {
        self.inner.lock().unwrap().staged.push(staged);
        Ok(())
    }
}

impl Transport for FakeKernel {
    fn add_table(&self, table: &Table) -> Result<(), TransportError> {
        self.stage(Staged::Table(table.clone(), true))
    }

    fn del_table(&self, table: &Table) -> Result<(), TransportError> {
        self.stage(Staged::Table(table.clone(), false))
    }

    fn add_chain(&self, chain: &Chain) -> Result<(), TransportError> {
        self.stage(Staged::Chain(chain.clone(), true))
    }

    fn del_chain(&self, chain: &Chain) -> Result<(), TransportError> {
        self.stage(Staged::Chain(chain.clone(), false))
    }

    fn add_set(&self, set: &Set) -> Result<(), TransportError> {
        self.stage(Staged::Set(set.clone()))
    }

    fn add_rule(&self, rule: &Rule) -> Result<(), TransportError> {
        self.stage(Staged::Rule(rule.clone(), true))
    }

    fn del_rule(&self, rule: &Rule) -> Result<(), TransportError> {
        self.stage(Staged::Rule(rule.clone(), false))
    }

    fn unstage_rule(&self, rule: &Rule, sets: &[Set]) -> Result<bool, TransportError> {
        let mut k = self.inner.lock().unwrap();
        let before = k.staged.len();
        k.staged.retain(|s| !matches!(s, Staged::Rule(r, true) if r == rule));
        let found = k.staged.len() != before;
        if found {
            k.staged.retain(|s| !matches!(s, Staged::Set(set) if sets.contains(set)));
        }
        Ok(found)
    }

    fn flush(&self) -> Result<(), TransportError> {
        let mut k = self.inner.lock().unwrap();
        k.commits += 1;
        let staged = std::mem::take(&mut k.staged);
        let deletes = staged.iter().any(|s| match s {
            Staged::Table(_, add) | Staged::Chain(_, add) | Staged::Rule(_, add) => !add,
            Staged::Set(_) => false,
        });
        if deletes && k.busy > 0 {
            k.busy -= 1;
            return Err(TransportError::from(Errno::EBUSY));
        }
        for s in staged {
            match s {
                Staged::Table(t, true) => k.tables.push(t),
                Staged::Table(t, false) => {
                    k.tables.retain(|x| *x != t);
                    k.chains.retain(|c| !c.belongs_to(&t));
                }
                Staged::Chain(c, true) => k.chains.push(c),
                Staged::Chain(c, false) => k.chains.retain(|x| x.name != c.name),
                Staged::Set(s) => k.sets.push(s),
                Staged::Rule(mut r, true) => {
                    k.next_handle += 1;
                    r.handle = Some(k.next_handle);
                    k.rules.push(r);
                }
                Staged::Rule(r, false) => k.rules.retain(|x| x.handle != r.handle),
            }
        }
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<Table>, TransportError> {
        Ok(self.tables())
    }

    fn list_chains(&self, table: &Table) -> Result<Vec<Chain>, TransportError> {
        Ok(self.chains().into_iter().filter(|c| c.belongs_to(table)).collect())
    }

    fn list_rules(&self, chain: &Chain) -> Result<Vec<Rule>, TransportError> {
        Ok(self
            .rules()
            .into_iter()
            .filter(|r| r.chain == chain.name && r.table == chain.table)
            .collect())
    }
}

pub fn get_test_store(kernel: &Arc<FakeKernel>) -> TableStore {
    TableStore::with_retry_policy(
        kernel.clone(),
        RetryPolicy::with_deadline(Duration::from_millis(300)),
    )
}

pub fn get_test_table() -> Table {
    Table::new(TABLE_NAME, ProtocolFamily::Ipv4)
}
