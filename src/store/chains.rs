use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{lock, retry_busy, RetryPolicy, RuleStore};
use crate::chain::validate_chain_name;
use crate::error::StoreError;
use crate::{Chain, ChainAttributes, Table, Transport};

const KIND: &str = "chain";

struct ChainEntry {
    chain: Chain,
    rules: Arc<RuleStore>,
}

#[derive(Serialize)]
struct ChainDump<'a> {
    #[serde(flatten)]
    chain: &'a Chain,
    base: bool,
    rules: serde_json::Value,
}

/// The chains of one table, each with the store of its rules.
pub struct ChainStore {
    table: Table,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    chains: Mutex<HashMap<String, ChainEntry>>,
}

impl ChainStore {
    pub(crate) fn new(table: Table, transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        ChainStore {
            table,
            transport,
            retry,
            chains: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_table(&self) -> &Table {
        &self.table
    }

    fn new_entry(&self, chain: Chain) -> ChainEntry {
        let rules = Arc::new(RuleStore::new(
            chain.clone(),
            self.transport.clone(),
            self.retry,
        ));
        ChainEntry { chain, rules }
    }

    /// Stages a new chain: a base chain when `attributes` are given, a regular one otherwise.
    ///
    /// Creating a chain that already exists with the same attributes does nothing, creating one
    /// that exists with other attributes is a [`StoreError::Conflict`].
    pub fn create(
        &self,
        name: &str,
        attributes: Option<&ChainAttributes>,
    ) -> Result<(), StoreError> {
        let mut chains = lock(&self.chains);
        self.create_locked(&mut chains, name, attributes)?;
        Ok(())
    }

    /// Same as [`create`](Self::create), then commits the batch. A chain inserted by this call
    /// is removed from the store again if the commit fails.
    pub fn create_imm(
        &self,
        name: &str,
        attributes: Option<&ChainAttributes>,
    ) -> Result<(), StoreError> {
        let mut chains = lock(&self.chains);
        let inserted = self.create_locked(&mut chains, name, attributes)?;
        if let Err(e) = self.transport.flush() {
            if inserted {
                warn!("Commit of chain {} failed, rolling back", name);
                chains.remove(name);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Returns whether a new entry was inserted.
    fn create_locked(
        &self,
        chains: &mut HashMap<String, ChainEntry>,
        name: &str,
        attributes: Option<&ChainAttributes>,
    ) -> Result<bool, StoreError> {
        validate_chain_name(name)?;
        if let Some(attributes) = attributes {
            attributes.validate()?;
        }

        if let Some(entry) = chains.get(name) {
            let equivalent = match attributes {
                Some(attributes) => attributes.matches(&entry.chain),
                None => !entry.chain.is_base(),
            };
            if !equivalent {
                return Err(StoreError::conflict(KIND, name));
            }
            debug!("Chain {} already exists", name);
            return Ok(false);
        }

        let mut chain = Chain::new(name, &self.table);
        if let Some(attributes) = attributes {
            chain = chain.with_attributes(attributes);
        }
        trace!("Staging chain {} in table {}", name, self.table.name);
        self.transport.add_chain(&chain)?;
        chains.insert(name.to_string(), self.new_entry(chain));
        Ok(true)
    }

    /// Removes the chain from the store and stages its deletion.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut chains = lock(&self.chains);
        let entry = chains
            .get(name)
            .ok_or_else(|| StoreError::not_found(KIND, name))?;
        trace!("Staging deletion of chain {} from table {}", name, self.table.name);
        self.transport.del_chain(&entry.chain)?;
        chains.remove(name);
        Ok(())
    }

    /// Removes the chain from the store and deletes it from the kernel right away. While the
    /// kernel reports the chain as busy, the deletion is retried until the deadline of the
    /// [`RetryPolicy`]. The chain is gone from the store whatever the outcome.
    pub fn delete_imm(&self, name: &str) -> Result<(), StoreError> {
        let mut chains = lock(&self.chains);
        let entry = chains
            .remove(name)
            .ok_or_else(|| StoreError::not_found(KIND, name))?;
        let what = format!("chain {}", name);
        retry_busy(&self.retry, &what, || {
            self.transport.del_chain(&entry.chain)?;
            self.transport.flush()
        })?;
        Ok(())
    }

    /// The rule store of the chain.
    pub fn chain(&self, name: &str) -> Result<Arc<RuleStore>, StoreError> {
        lock(&self.chains)
            .get(name)
            .map(|entry| entry.rules.clone())
            .ok_or_else(|| StoreError::not_found(KIND, name))
    }

    /// Whether the store holds the chain. On a miss the kernel is asked, and a chain found there
    /// is absorbed with a [`sync`](Self::sync).
    pub fn exist(&self, name: &str) -> bool {
        if lock(&self.chains).contains_key(name) {
            return true;
        }
        match self.ready(name) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("Unable to list the chains of table {}: {}", self.table.name, e);
                return false;
            }
        }
        if let Err(e) = self.sync() {
            warn!("Unable to sync the chains of table {}: {}", self.table.name, e);
            return false;
        }
        lock(&self.chains).contains_key(name)
    }

    /// Whether the kernel already holds the chain, regardless of the store content.
    pub fn ready(&self, name: &str) -> Result<bool, StoreError> {
        let listed = self.transport.list_chains(&self.table)?;
        Ok(listed.iter().any(|c| c.name == name && c.belongs_to(&self.table)))
    }

    /// Absorbs the chains the kernel holds and the store does not, along with their rules.
    /// Chains already known are left untouched, and chains missing from the kernel are kept.
    pub fn sync(&self) -> Result<(), StoreError> {
        let listed = self.transport.list_chains(&self.table)?;
        let mut absorbed = Vec::new();
        {
            let mut chains = lock(&self.chains);
            for chain in listed {
                if !chain.belongs_to(&self.table) || chains.contains_key(&chain.name) {
                    continue;
                }
                info!(
                    "Absorbing {} chain {} of table {}",
                    if chain.is_base() { "base" } else { "regular" },
                    chain.name,
                    self.table.name
                );
                let entry = self.new_entry(chain);
                absorbed.push(entry.rules.clone());
                chains.insert(entry.chain.name.clone(), entry);
            }
        }
        for rules in absorbed {
            rules.sync()?;
        }
        Ok(())
    }

    /// Names of the chains held by the store, sorted.
    pub fn get(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.chains).keys().cloned().collect();
        names.sort();
        names
    }

    /// The chains of the store and their rules, as JSON.
    pub fn dump(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec_pretty(&self.snapshot()?)?)
    }

    pub(crate) fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut entries: Vec<(Chain, Arc<RuleStore>)> = lock(&self.chains)
            .values()
            .map(|e| (e.chain.clone(), e.rules.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        let mut dumps = Vec::with_capacity(entries.len());
        for (chain, rules) in &entries {
            dumps.push(ChainDump {
                chain,
                base: chain.is_base(),
                rules: rules.snapshot()?,
            });
        }
        serde_json::to_value(dumps)
    }
}
