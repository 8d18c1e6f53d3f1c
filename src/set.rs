use std::marker::PhantomData;

use bitflags::bitflags;
use serde::{Serialize, Serializer};

use crate::data_type::DataType;
use crate::sys::{NFT_SET_ANONYMOUS, NFT_SET_CONSTANT};
use crate::ProtocolFamily;

/// Name of the anonymous sets, the kernel replaces `%d` with a free index.
pub const ANONYMOUS_SET_NAME: &str = "__set%d";

bitflags! {
    pub struct SetFlags: u32 {
        const ANONYMOUS = NFT_SET_ANONYMOUS;
        const CONSTANT = NFT_SET_CONSTANT;
    }
}

impl Serialize for SetFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

/// An nf_tables set. The `id` identifies the set inside a single batch, before the kernel gave
/// it a name, and is what [`Lookup`] expressions of the same batch refer to.
///
/// [`Lookup`]: crate::expr::Lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Set {
    pub family: ProtocolFamily,
    pub table: String,
    pub name: String,
    pub id: u32,
    pub key_type: u32,
    pub key_len: u32,
    pub flags: SetFlags,
    pub elements: Vec<SetElement>,
}

impl Set {
    /// Places the set in `table` and gives it its batch identifier.
    pub fn bind(&mut self, family: ProtocolFamily, table: &str, id: u32) {
        self.family = family;
        self.table = table.to_string();
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SetElement {
    pub key: Vec<u8>,
}

/// Builds a constant anonymous set whose keys are all of type `K`.
pub struct SetBuilder<K: DataType> {
    inner: Set,
    _phantom: PhantomData<K>,
}

impl<K: DataType> SetBuilder<K> {
    pub fn anonymous() -> Self {
        SetBuilder {
            inner: Set {
                family: ProtocolFamily::Unspec,
                table: String::new(),
                name: ANONYMOUS_SET_NAME.to_string(),
                id: 0,
                key_type: K::TYPE,
                key_len: K::LEN,
                flags: SetFlags::ANONYMOUS | SetFlags::CONSTANT,
                elements: Vec::new(),
            },
            _phantom: PhantomData,
        }
    }

    pub fn add(&mut self, key: &K) {
        self.inner.elements.push(SetElement { key: key.data() });
    }

    pub fn finish(self) -> Set {
        self.inner
    }
}
