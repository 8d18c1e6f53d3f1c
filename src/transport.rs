use crate::error::TransportError;
use crate::{Chain, Rule, Set, Table};

/// A connection to the nf_tables subsystem.
///
/// The `add_*` and `del_*` methods only stage a message in the current batch. Nothing reaches
/// the kernel until [`flush`](Transport::flush) sends the whole batch as one transaction. The
/// `list_*` methods query the kernel directly and ignore the staged messages.
///
/// Implementations are shared between every store of a [`TableStore`](crate::TableStore), and
/// must therefore synchronize internally.
pub trait Transport: Send + Sync {
    fn add_table(&self, table: &Table) -> Result<(), TransportError>;

    fn del_table(&self, table: &Table) -> Result<(), TransportError>;

    fn add_chain(&self, chain: &Chain) -> Result<(), TransportError>;

    fn del_chain(&self, chain: &Chain) -> Result<(), TransportError>;

    /// Stages the set along with all its elements.
    fn add_set(&self, set: &Set) -> Result<(), TransportError>;

    fn add_rule(&self, rule: &Rule) -> Result<(), TransportError>;

    /// Stages the deletion of the rule with the handle carried by `rule`.
    fn del_rule(&self, rule: &Rule) -> Result<(), TransportError>;

    /// Withdraws a rule added by [`add_rule`](Transport::add_rule) from the current batch, along
    /// with the `sets` staged for it. Returns `false` when the batch does not hold the rule,
    /// either because it was already sent or because it was never staged.
    fn unstage_rule(&self, rule: &Rule, sets: &[Set]) -> Result<bool, TransportError>;

    /// Sends the staged batch, returning the first error the kernel reported. The batch is
    /// emptied whatever the outcome.
    fn flush(&self) -> Result<(), TransportError>;

    fn list_tables(&self) -> Result<Vec<Table>, TransportError>;

    fn list_chains(&self, table: &Table) -> Result<Vec<Chain>, TransportError>;

    /// Rules of `chain` in evaluation order, with their handles set.
    fn list_rules(&self, chain: &Chain) -> Result<Vec<Rule>, TransportError>;
}
