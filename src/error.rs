use nix::errno::Errno;
use thiserror::Error;

use crate::ProtocolFamily;

/// A rule or a chain description is internally inconsistent. Always a caller bug: it is raised
/// before anything is staged to the kernel and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The rule has no match criteria and its action is not a verdict")]
    NoCriteria,

    #[error("The L3 criteria has neither an address, a version nor a protocol to match")]
    EmptyL3,

    #[error("Neither a source nor a destination {0} specification is set")]
    NoSrcOrDst(&'static str),

    #[error("A redirect action requires an L3 or an L4 criteria")]
    RedirectWithoutCriteria,

    #[error("The {0} list is empty")]
    EmptyList(&'static str),

    #[error("The lower bound of the {0} range is greater than its upper bound")]
    InvertedRange(&'static str),

    #[error("The address specification mixes IPv4 and IPv6 addresses")]
    MixedAddressFamilies,

    #[error("Only host addresses can be part of a multi-entry address list, got {0}")]
    PrefixInList(String),

    #[error("The {0} verdict requires a non-empty target chain name")]
    MissingTargetChain(&'static str),

    #[error("The table name {0:?} is longer than the kernel limit")]
    TableNameTooLong(String),

    #[error("The chain name {0:?} is longer than the kernel limit")]
    ChainNameTooLong(String),

    #[error("A NAT action requires an address or a port to translate to")]
    EmptyNat,

    #[error("The log prefix string is more than 127 characters long")]
    TooLongLogPrefix,

    #[error("The interface name {0:?} is too long")]
    InterfaceNameTooLong(String),

    #[error("Protocol {0} has no ports to match")]
    NoPortsForProtocol(u8),

    #[error("The length of the arguments are not compatible with each other")]
    IncompatibleLength,

    #[error("A {chain_type} chain cannot be attached to the {hook} hook")]
    IncompatibleHook {
        chain_type: &'static str,
        hook: &'static str,
    },
}

/// Errors raised while turning a validated rule into an instruction sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("The rule is invalid")]
    Validation(#[from] ValidationError),

    #[error("Addresses cannot be matched in a table of family {0:?}")]
    UnsupportedFamily(ProtocolFamily),

    #[error("An address of family {found:?} cannot be matched in a table of family {expected:?}")]
    FamilyMismatch {
        expected: ProtocolFamily,
        found: ProtocolFamily,
    },
}

/// Failure reported by the connection to the kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Error received from the kernel")]
    Errno(#[source] Errno),

    #[error("Netlink communication failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the kernel reported the object as still in use. This is the only condition the
    /// stores retry on.
    pub fn is_busy(&self) -> bool {
        matches!(self, TransportError::Errno(Errno::EBUSY))
    }
}

impl From<Errno> for TransportError {
    fn from(errno: Errno) -> Self {
        TransportError::Errno(errno)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {name} already exists with different attributes")]
    Conflict { kind: &'static str, name: String },

    #[error("{kind} {name} does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid attributes")]
    InvalidAttributes(#[from] ValidationError),

    #[error("Error while compiling the rule")]
    Compile(#[from] CompileError),

    #[error("Error while talking to the kernel")]
    Transport(#[from] TransportError),

    #[error("Unable to serialize the store content")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        StoreError::Conflict {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error is a kernel "resource busy" report that outlived the retry deadline.
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::Transport(e) if e.is_busy())
    }
}
