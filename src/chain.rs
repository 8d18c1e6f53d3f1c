use libc::{NF_ACCEPT, NF_DROP};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::sys::{IFNAMSIZ, NFT_CHAIN_MAXNAMELEN};
use crate::{ProtocolFamily, Table};

pub type ChainPriority = i32;

/// The netfilter event hooks a chain can register for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum HookClass {
    /// Hook into the pre-routing stage of netfilter. Corresponds to `NF_INET_PRE_ROUTING`.
    PreRouting = libc::NF_INET_PRE_ROUTING,
    /// Hook into the input stage of netfilter. Corresponds to `NF_INET_LOCAL_IN`.
    In = libc::NF_INET_LOCAL_IN,
    /// Hook into the forward stage of netfilter. Corresponds to `NF_INET_FORWARD`.
    Forward = libc::NF_INET_FORWARD,
    /// Hook into the output stage of netfilter. Corresponds to `NF_INET_LOCAL_OUT`.
    Out = libc::NF_INET_LOCAL_OUT,
    /// Hook into the post-routing stage of netfilter. Corresponds to `NF_INET_POST_ROUTING`.
    PostRouting = libc::NF_INET_POST_ROUTING,
}

impl HookClass {
    fn as_str(&self) -> &'static str {
        match *self {
            HookClass::PreRouting => "prerouting",
            HookClass::In => "input",
            HookClass::Forward => "forward",
            HookClass::Out => "output",
            HookClass::PostRouting => "postrouting",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hook {
    pub class: HookClass,
    pub priority: ChainPriority,
}

impl Hook {
    pub fn new(class: HookClass, priority: ChainPriority) -> Self {
        Hook { class, priority }
    }
}

/// A chain policy. Decides what to do with a packet that was processed by the chain but did not
/// match any rules.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ChainPolicy {
    /// Accept the packet.
    Accept = NF_ACCEPT,
    /// Drop the packet.
    Drop = NF_DROP,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        ChainPolicy::Accept
    }
}

/// Base chain type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// Used to filter packets.
    /// Supported protocols: ip, ip6, inet, arp, and bridge tables.
    Filter,
    /// Used to reroute packets if IP headers or packet marks are modified.
    /// Supported protocols: ip, and ip6 tables.
    Route,
    /// Used to perform NAT.
    /// Supported protocols: ip, and ip6 tables.
    Nat,
}

impl ChainType {
    fn as_str(&self) -> &'static str {
        match *self {
            ChainType::Filter => "filter",
            ChainType::Route => "route",
            ChainType::Nat => "nat",
        }
    }
}

/// Abstraction of an nf_tables chain. Chains reside inside [`Table`]s and they hold [`Rule`]s.
///
/// There are two types of chains, "base chain" and "regular chain". A base chain has a hook and
/// a type and sees the packets of that hook directly, a regular chain only sees the packets
/// another chain jumps to it.
///
/// [`Rule`]: crate::Rule
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Chain {
    pub family: ProtocolFamily,
    pub table: String,
    pub name: String,
    pub hook: Option<Hook>,
    pub policy: Option<ChainPolicy>,
    pub chain_type: Option<ChainType>,
    pub device: Option<String>,
}

impl Chain {
    /// Creates a new regular chain instance inside the given [`Table`].
    pub fn new(name: impl Into<String>, table: &Table) -> Chain {
        Chain {
            family: table.family,
            table: table.name.clone(),
            name: name.into(),
            hook: None,
            policy: None,
            chain_type: None,
            device: None,
        }
    }

    /// Turns this chain into a base chain described by `attributes`. An unspecified policy
    /// defaults to accept.
    pub fn with_attributes(mut self, attributes: &ChainAttributes) -> Chain {
        self.hook = Some(Hook::new(attributes.hook, attributes.priority));
        self.chain_type = Some(attributes.chain_type);
        self.policy = Some(attributes.policy.unwrap_or_default());
        self.device = attributes.device.clone();
        self
    }

    pub fn get_family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_table(&self) -> &str {
        &self.table
    }

    /// A chain attached to a netfilter hook. Chains listed from the kernel are base chains when
    /// they carry both a hook and a type.
    pub fn is_base(&self) -> bool {
        self.hook.is_some() && self.chain_type.is_some()
    }

    pub fn belongs_to(&self, table: &Table) -> bool {
        self.table == table.name && self.family == table.family
    }
}

/// Attributes of a base chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAttributes {
    pub chain_type: ChainType,
    pub hook: HookClass,
    pub priority: ChainPriority,
    pub device: Option<String>,
    pub policy: Option<ChainPolicy>,
}

impl ChainAttributes {
    pub fn new(chain_type: ChainType, hook: HookClass, priority: ChainPriority) -> Self {
        ChainAttributes {
            chain_type,
            hook,
            priority,
            device: None,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let compatible = match self.chain_type {
            ChainType::Filter => true,
            ChainType::Nat => self.hook != HookClass::Forward,
            ChainType::Route => self.hook == HookClass::Out,
        };
        if !compatible {
            return Err(ValidationError::IncompatibleHook {
                chain_type: self.chain_type.as_str(),
                hook: self.hook.as_str(),
            });
        }
        if let Some(ref device) = self.device {
            if device.len() >= IFNAMSIZ {
                return Err(ValidationError::InterfaceNameTooLong(device.clone()));
            }
        }
        Ok(())
    }

    /// Whether `chain` is the chain these attributes would create: same hook, priority and type,
    /// and the same effective policy.
    pub fn matches(&self, chain: &Chain) -> bool {
        chain.is_base()
            && chain.hook == Some(Hook::new(self.hook, self.priority))
            && chain.chain_type == Some(self.chain_type)
            && chain.policy.unwrap_or_default() == self.policy.unwrap_or_default()
    }
}

pub(crate) fn validate_chain_name(name: &str) -> Result<(), ValidationError> {
    if name.len() >= NFT_CHAIN_MAXNAMELEN {
        return Err(ValidationError::ChainNameTooLong(name.to_string()));
    }
    Ok(())
}
