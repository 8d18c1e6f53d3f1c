use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{lock, retry_busy, ChainStore, RetryPolicy};
use crate::error::{StoreError, ValidationError};
use crate::sys::NFT_TABLE_MAXNAMELEN;
use crate::{ProtocolFamily, Table, Transport};

const KIND: &str = "table";

type TableKey = (String, ProtocolFamily);

struct TableEntry {
    table: Table,
    chains: Arc<ChainStore>,
}

#[derive(Serialize)]
struct TableDump<'a> {
    #[serde(flatten)]
    table: &'a Table,
    chains: serde_json::Value,
}

/// The tables known to a [`Transport`], keyed by name and family. This is the entry point of the
/// store hierarchy: tables hand out their [`ChainStore`], which hand out their [`RuleStore`].
///
/// [`RuleStore`]: crate::RuleStore
pub struct TableStore {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    tables: Mutex<HashMap<TableKey, TableEntry>>,
}

impl TableStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_retry_policy(transport, RetryPolicy::default())
    }

    /// The policy is handed down to every chain and rule store created from this one.
    pub fn with_retry_policy(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        TableStore {
            transport,
            retry,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn new_entry(&self, table: Table) -> TableEntry {
        let chains = Arc::new(ChainStore::new(
            table.clone(),
            self.transport.clone(),
            self.retry,
        ));
        TableEntry { table, chains }
    }

    /// Stages a new table. Creating a table that already exists does nothing.
    pub fn create(&self, name: &str, family: ProtocolFamily) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        self.create_locked(&mut tables, name, family)?;
        Ok(())
    }

    /// Same as [`create`](Self::create), then commits the batch. A table inserted by this call
    /// is removed from the store again if the commit fails.
    pub fn create_imm(&self, name: &str, family: ProtocolFamily) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let inserted = self.create_locked(&mut tables, name, family)?;
        if let Err(e) = self.transport.flush() {
            if inserted {
                warn!("Commit of table {} failed, rolling back", name);
                tables.remove(&(name.to_string(), family));
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn create_locked(
        &self,
        tables: &mut HashMap<TableKey, TableEntry>,
        name: &str,
        family: ProtocolFamily,
    ) -> Result<bool, StoreError> {
        if name.len() >= NFT_TABLE_MAXNAMELEN {
            return Err(ValidationError::TableNameTooLong(name.to_string()).into());
        }
        let key = (name.to_string(), family);
        if tables.contains_key(&key) {
            debug!("Table {} already exists", name);
            return Ok(false);
        }
        let table = Table::new(name, family);
        trace!("Staging table {}", name);
        self.transport.add_table(&table)?;
        tables.insert(key, self.new_entry(table));
        Ok(true)
    }

    /// Removes the table from the store and stages its deletion. The kernel deletes the chains
    /// and rules of the table along with it.
    pub fn delete(&self, name: &str, family: ProtocolFamily) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let key = (name.to_string(), family);
        let entry = tables
            .get(&key)
            .ok_or_else(|| StoreError::not_found(KIND, name))?;
        trace!("Staging deletion of table {}", name);
        self.transport.del_table(&entry.table)?;
        tables.remove(&key);
        Ok(())
    }

    /// Removes the table from the store and deletes it from the kernel right away, retrying
    /// while the kernel reports it as busy.
    pub fn delete_imm(&self, name: &str, family: ProtocolFamily) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        let entry = tables
            .remove(&(name.to_string(), family))
            .ok_or_else(|| StoreError::not_found(KIND, name))?;
        let what = format!("table {}", name);
        retry_busy(&self.retry, &what, || {
            self.transport.del_table(&entry.table)?;
            self.transport.flush()
        })?;
        Ok(())
    }

    /// The chain store of the table.
    pub fn table(
        &self,
        name: &str,
        family: ProtocolFamily,
    ) -> Result<Arc<ChainStore>, StoreError> {
        lock(&self.tables)
            .get(&(name.to_string(), family))
            .map(|entry| entry.chains.clone())
            .ok_or_else(|| StoreError::not_found(KIND, name))
    }

    /// Whether the store holds the table. On a miss the kernel is asked, and a table found there
    /// is absorbed with a [`sync`](Self::sync).
    pub fn exist(&self, name: &str, family: ProtocolFamily) -> bool {
        if lock(&self.tables).contains_key(&(name.to_string(), family)) {
            return true;
        }
        let listed = match self.transport.list_tables() {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Unable to list the tables: {}", e);
                return false;
            }
        };
        if !listed.iter().any(|t| t.name == name && t.family == family) {
            return false;
        }
        if let Err(e) = self.sync() {
            warn!("Unable to sync the tables: {}", e);
            return false;
        }
        lock(&self.tables).contains_key(&(name.to_string(), family))
    }

    /// Absorbs the tables the kernel holds and the store does not, along with their chains and
    /// rules. Tables already known are left untouched, and tables missing from the kernel are
    /// kept.
    pub fn sync(&self) -> Result<(), StoreError> {
        let listed = self.transport.list_tables()?;
        let mut absorbed = Vec::new();
        {
            let mut tables = lock(&self.tables);
            for table in listed {
                let key = (table.name.clone(), table.family);
                if tables.contains_key(&key) {
                    continue;
                }
                info!("Absorbing table {} of family {:?}", table.name, table.family);
                let entry = self.new_entry(table);
                absorbed.push(entry.chains.clone());
                tables.insert(key, entry);
            }
        }
        for chains in absorbed {
            chains.sync()?;
        }
        Ok(())
    }

    /// The tables held by the store, sorted by name then family.
    pub fn get(&self) -> Vec<Table> {
        let mut tables: Vec<Table> = lock(&self.tables)
            .values()
            .map(|entry| entry.table.clone())
            .collect();
        tables.sort_by(|a, b| (&a.name, a.family).cmp(&(&b.name, b.family)));
        tables
    }

    /// The whole store hierarchy, as JSON.
    pub fn dump(&self) -> Result<Vec<u8>, StoreError> {
        let mut entries: Vec<(Table, Arc<ChainStore>)> = lock(&self.tables)
            .values()
            .map(|e| (e.table.clone(), e.chains.clone()))
            .collect();
        entries.sort_by(|a, b| (&a.0.name, a.0.family).cmp(&(&b.0.name, b.0.family)));

        let mut dumps = Vec::with_capacity(entries.len());
        for (table, chains) in &entries {
            dumps.push(TableDump {
                table,
                chains: chains.snapshot()?,
            });
        }
        Ok(serde_json::to_vec_pretty(&dumps)?)
    }
}
