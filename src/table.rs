use serde::Serialize;

use crate::ProtocolFamily;

/// Abstraction of an nf_tables table, the top level container in netfilter. A table has a
/// protocol family and contains [`Chain`]s that in turn hold the rules.
///
/// [`Chain`]: crate::Chain
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct Table {
    pub name: String,
    pub family: ProtocolFamily,
}

impl Table {
    /// Creates a new table instance with the given name and protocol family.
    pub fn new(name: impl Into<String>, family: ProtocolFamily) -> Table {
        Table {
            name: name.into(),
            family,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_family(&self) -> ProtocolFamily {
        self.family
    }
}
