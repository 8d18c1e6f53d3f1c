use std::convert::TryInto;
use std::fmt;

use serde::Serialize;

use crate::chain::Chain;
use crate::expr::ExpressionList;
use crate::ProtocolFamily;

/// Marks rule userdata written by this crate.
const RULE_ID_TAG: &[u8; 4] = b"nfk\0";

/// Identifier a [`RuleStore`] hands out for each rule it holds. It is stored in the userdata of
/// the kernel rule, which is how rules listed from the kernel are matched back to local entries.
///
/// [`RuleStore`]: crate::RuleStore
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl RuleId {
    pub fn to_userdata(self) -> Vec<u8> {
        let mut data = RULE_ID_TAG.to_vec();
        data.extend_from_slice(&self.0.to_be_bytes());
        data
    }

    /// Returns `None` for userdata that was not written by [`to_userdata`](Self::to_userdata).
    pub fn from_userdata(data: &[u8]) -> Option<Self> {
        if data.len() != RULE_ID_TAG.len() + 4 || !data.starts_with(RULE_ID_TAG) {
            return None;
        }
        let raw: [u8; 4] = data[RULE_ID_TAG.len()..].try_into().ok()?;
        Some(RuleId(u32::from_be_bytes(raw)))
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A nftables firewall rule, as it is sent to and listed from the kernel. The `handle` is
/// allocated by the kernel and is unknown until the rule was committed and listed back.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Rule {
    pub family: ProtocolFamily,
    pub table: String,
    pub chain: String,
    pub handle: Option<u64>,
    pub expressions: ExpressionList,
    pub userdata: Vec<u8>,
}

impl Rule {
    /// Creates a new rule object in the given [`Chain`].
    pub fn new(chain: &Chain) -> Rule {
        Rule {
            family: chain.family,
            table: chain.table.clone(),
            chain: chain.name.clone(),
            handle: None,
            expressions: ExpressionList::default(),
            userdata: Vec::new(),
        }
    }

    pub fn with_expressions(mut self, expressions: ExpressionList) -> Self {
        self.expressions = expressions;
        self
    }

    pub fn with_userdata(mut self, userdata: Vec<u8>) -> Self {
        self.userdata = userdata;
        self
    }

    pub fn get_expressions(&self) -> &ExpressionList {
        &self.expressions
    }

    /// The local identifier recorded in the userdata, if this rule was created by a store.
    pub fn id(&self) -> Option<RuleId> {
        RuleId::from_userdata(&self.userdata)
    }
}
