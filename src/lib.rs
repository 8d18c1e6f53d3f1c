// Copyryght (c) 2021 GPL lafleur@boum.org and Simon Thoby
//
// This file is free software: you may copy, redistribute and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This file is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see the LICENSE file.
//
// This file incorporates work covered by the following copyright and
// permission notice:
//
//     Copyright 2018 Amagicom AB.
//
//     Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
//     http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
//     <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
//     option. This file may not be copied, modified, or distributed
//     except according to those terms.

//! Declarative firewall rules on top of the in-kernel nf_tables subsystem.
//!
//! The crate has two halves. The first one is a small compiler: a [`policy::Rule`] describes
//! what to match (addresses, ports, protocol, packet metadata) and what to do with matching
//! packets (a verdict, a redirection or some address translation), and [`compile`] turns it into
//! the ordered list of nf_tables [`expr`]essions the kernel evaluates, along with the anonymous
//! [`Set`]s that multi-valued matches need.
//!
//! The second half is an in-memory mirror of the kernel objects: a [`TableStore`] holds
//! [`ChainStore`]s, which hold [`RuleStore`]s. Every store guards its own map with its own lock,
//! so unrelated tables and chains can be modified concurrently. Objects are created locally
//! first and reach the kernel when the [`Transport`] commits its staged batch, either because
//! the caller flushed it or because an `*_imm` method did so. A `sync` pulls whatever the kernel
//! holds that the store does not know about yet.
//!
//! The netlink connection itself is not part of this crate: it is consumed through the
//! [`Transport`] trait.
//!
//! ```
//! use nftkeeper::policy::{IpAddrSpec, L3Rule, Rule, RuleAction};
//! use nftkeeper::{compile, ProtocolFamily};
//!
//! let rule = Rule::new(RuleAction::jump("fake-chain-1")).with_l3(L3Rule::dst(
//!     IpAddrSpec::list(vec!["1.2.3.4".parse().unwrap(), "2.3.4.5".parse().unwrap()]),
//! ));
//! let compiled = compile(&rule, ProtocolFamily::Ipv4).unwrap();
//! assert_eq!(compiled.sets().len(), 1);
//! assert_eq!(compiled.expressions().len(), 3);
//! ```

use std::convert::TryFrom;

use serde::Serialize;

#[macro_use]
extern crate log;

pub mod sys;

mod error;
pub use error::{CompileError, StoreError, TransportError, ValidationError};

pub mod data_type;

pub mod expr;

mod table;
pub use table::Table;

mod chain;
pub use chain::{Chain, ChainAttributes, ChainPolicy, ChainPriority, ChainType, Hook, HookClass};

mod rule;
pub use rule::{Rule, RuleId};

pub mod set;
pub use set::{Set, SetElement, SetFlags};

pub mod policy;

mod compiler;
pub use compiler::{compile, CompiledRule};

mod transport;
pub use transport::Transport;

mod store;
pub use store::{ChainStore, RetryPolicy, RuleStore, TableStore};

#[cfg(test)]
mod tests;

/// Denotes a protocol. Used to specify which protocol a table or set belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize)]
#[repr(i32)]
pub enum ProtocolFamily {
    Unspec = libc::NFPROTO_UNSPEC,
    /// Inet - Means both IPv4 and IPv6
    Inet = libc::NFPROTO_INET,
    Ipv4 = libc::NFPROTO_IPV4,
    Arp = libc::NFPROTO_ARP,
    NetDev = libc::NFPROTO_NETDEV,
    Bridge = libc::NFPROTO_BRIDGE,
    Ipv6 = libc::NFPROTO_IPV6,
    DecNet = libc::NFPROTO_DECNET,
}

impl Default for ProtocolFamily {
    fn default() -> Self {
        Self::Unspec
    }
}

/// The value does not correspond to any `NFPROTO_*` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for a protocol family: {0}")]
pub struct InvalidProtocolFamily(pub i32);

impl TryFrom<i32> for ProtocolFamily {
    type Error = InvalidProtocolFamily;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            libc::NFPROTO_UNSPEC => Ok(ProtocolFamily::Unspec),
            libc::NFPROTO_INET => Ok(ProtocolFamily::Inet),
            libc::NFPROTO_IPV4 => Ok(ProtocolFamily::Ipv4),
            libc::NFPROTO_ARP => Ok(ProtocolFamily::Arp),
            libc::NFPROTO_NETDEV => Ok(ProtocolFamily::NetDev),
            libc::NFPROTO_BRIDGE => Ok(ProtocolFamily::Bridge),
            libc::NFPROTO_IPV6 => Ok(ProtocolFamily::Ipv6),
            libc::NFPROTO_DECNET => Ok(ProtocolFamily::DecNet),
            _ => Err(InvalidProtocolFamily(value)),
        }
    }
}
