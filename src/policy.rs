//! Declarative description of a firewall rule: what to match and what to do with the packets
//! that match. A [`Rule`] is turned into nf_tables expressions by [`compile`](crate::compile).
//!
//! Mutually exclusive shapes are expressed as enums, so a rule can never carry two actions, or a
//! version match along with addresses. What the types cannot express is checked by
//! [`Rule::validate`].

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::chain::validate_chain_name;
use crate::error::ValidationError;
use crate::expr::{Log, LogGroup, LogPrefix, MetaType, VerdictKind};
use crate::sys::IFNAMSIZ;
use crate::ProtocolFamily;

/// Relational operator applied to a port or metadata match.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RelOp {
    Eq,
    Neq,
}

impl Default for RelOp {
    fn default() -> Self {
        RelOp::Eq
    }
}

impl RelOp {
    pub fn is_neq(self) -> bool {
        self == RelOp::Neq
    }
}

/// IP protocol version, as found in the high nibble of the first byte of the network header.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IpVersion {
    V4 = 4,
    V6 = 6,
}

/// Addresses to match, either as a list or as an inclusive range.
///
/// List entries accept a prefix (`10.0.0.0/8`) but only a single-entry list may use one: longer
/// lists are matched with a set lookup, which only holds host addresses.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum IpAddrSpec {
    List(Vec<IpNetwork>),
    Range(IpAddr, IpAddr),
}

impl IpAddrSpec {
    pub fn list(addrs: Vec<IpNetwork>) -> Self {
        IpAddrSpec::List(addrs)
    }

    pub fn single(addr: impl Into<IpNetwork>) -> Self {
        IpAddrSpec::List(vec![addr.into()])
    }

    pub fn range(low: IpAddr, high: IpAddr) -> Self {
        IpAddrSpec::Range(low, high)
    }

    /// The family of the addresses, `None` for an empty list.
    pub fn family(&self) -> Option<ProtocolFamily> {
        let ip = match self {
            IpAddrSpec::List(list) => list.first()?.ip(),
            IpAddrSpec::Range(low, _) => *low,
        };
        Some(ip_family(&ip))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            IpAddrSpec::List(list) => {
                let first = list.first().ok_or(ValidationError::EmptyList("address"))?;
                if list.iter().any(|net| net.is_ipv4() != first.is_ipv4()) {
                    return Err(ValidationError::MixedAddressFamilies);
                }
                if list.len() > 1 {
                    if let Some(net) = list.iter().find(|net| !is_host(net)) {
                        return Err(ValidationError::PrefixInList(net.to_string()));
                    }
                }
            }
            IpAddrSpec::Range(low, high) => {
                if low.is_ipv4() != high.is_ipv4() {
                    return Err(ValidationError::MixedAddressFamilies);
                }
                if low > high {
                    return Err(ValidationError::InvertedRange("address"));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn ip_family(ip: &IpAddr) -> ProtocolFamily {
    match ip {
        IpAddr::V4(_) => ProtocolFamily::Ipv4,
        IpAddr::V6(_) => ProtocolFamily::Ipv6,
    }
}

pub(crate) fn is_host(net: &IpNetwork) -> bool {
    match net {
        IpNetwork::V4(n) => n.prefix() == 32,
        IpNetwork::V6(n) => n.prefix() == 128,
    }
}

/// The network layer target of an [`L3Rule`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum L3Match {
    /// Every packet of the given IP version.
    Version(IpVersion),
    /// Source and/or destination addresses. When both are present, both must match.
    Addr {
        src: Option<IpAddrSpec>,
        dst: Option<IpAddrSpec>,
    },
}

/// Network layer criteria.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct L3Rule {
    pub target: Option<L3Match>,
    /// The upper layer protocol number (`IPPROTO_*`).
    pub protocol: Option<u8>,
}

impl L3Rule {
    pub fn src(spec: IpAddrSpec) -> Self {
        L3Rule::default().with_src(spec)
    }

    pub fn dst(spec: IpAddrSpec) -> Self {
        L3Rule::default().with_dst(spec)
    }

    pub fn version(version: IpVersion) -> Self {
        L3Rule {
            target: Some(L3Match::Version(version)),
            protocol: None,
        }
    }

    pub fn protocol(protocol: u8) -> Self {
        L3Rule {
            target: None,
            protocol: Some(protocol),
        }
    }

    /// Adds a source address match. Replaces a version match.
    pub fn with_src(mut self, spec: IpAddrSpec) -> Self {
        let dst = match self.target.take() {
            Some(L3Match::Addr { dst, .. }) => dst,
            _ => None,
        };
        self.target = Some(L3Match::Addr {
            src: Some(spec),
            dst,
        });
        self
    }

    /// Adds a destination address match. Replaces a version match.
    pub fn with_dst(mut self, spec: IpAddrSpec) -> Self {
        let src = match self.target.take() {
            Some(L3Match::Addr { src, .. }) => src,
            _ => None,
        };
        self.target = Some(L3Match::Addr {
            src,
            dst: Some(spec),
        });
        self
    }

    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.protocol = Some(protocol);
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.target {
            None if self.protocol.is_none() => Err(ValidationError::EmptyL3),
            None | Some(L3Match::Version(_)) => Ok(()),
            Some(L3Match::Addr { ref src, ref dst }) => {
                if src.is_none() && dst.is_none() {
                    return Err(ValidationError::NoSrcOrDst("address"));
                }
                for spec in src.iter().chain(dst.iter()) {
                    spec.validate()?;
                }
                // Source and destination of one packet always share the same family.
                if let (Some(src), Some(dst)) = (src, dst) {
                    if src.family() != dst.family() {
                        return Err(ValidationError::MixedAddressFamilies);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Ports to match, either as a list or as an inclusive range.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PortMatch {
    List(Vec<u16>),
    Range(u16, u16),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Port {
    pub spec: PortMatch,
    pub op: RelOp,
}

impl Port {
    pub fn list(ports: Vec<u16>) -> Self {
        Port {
            spec: PortMatch::List(ports),
            op: RelOp::Eq,
        }
    }

    pub fn range(low: u16, high: u16) -> Self {
        Port {
            spec: PortMatch::Range(low, high),
            op: RelOp::Eq,
        }
    }

    pub fn with_op(mut self, op: RelOp) -> Self {
        self.op = op;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.spec {
            PortMatch::List(ref list) if list.is_empty() => Err(ValidationError::EmptyList("port")),
            PortMatch::Range(low, high) if low > high => {
                Err(ValidationError::InvertedRange("port"))
            }
            _ => Ok(()),
        }
    }
}

/// Transport layer criteria.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct L4Rule {
    /// The transport protocol number (`IPPROTO_*`).
    pub protocol: u8,
    pub src: Option<Port>,
    pub dst: Option<Port>,
}

impl L4Rule {
    pub fn new(protocol: u8) -> Self {
        L4Rule {
            protocol,
            src: None,
            dst: None,
        }
    }

    pub fn with_src(mut self, port: Port) -> Self {
        self.src = Some(port);
        self
    }

    pub fn with_dst(mut self, port: Port) -> Self {
        self.dst = Some(port);
        self
    }

    /// Whether the protocol header starts with a source and a destination port.
    pub fn has_ports(&self) -> bool {
        self.protocol == libc::IPPROTO_TCP as u8 || self.protocol == libc::IPPROTO_UDP as u8
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if (self.src.is_some() || self.dst.is_some()) && !self.has_ports() {
            return Err(ValidationError::NoPortsForProtocol(self.protocol));
        }
        for port in self.src.iter().chain(self.dst.iter()) {
            port.validate()?;
        }
        Ok(())
    }
}

/// A single comparison against a piece of packet metadata. The value is compared as-is against
/// what the kernel loads, so the constructors take care of the byte order.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct MetaMatch {
    pub key: MetaType,
    pub value: Vec<u8>,
    pub op: RelOp,
}

impl MetaMatch {
    pub fn new(key: MetaType, value: impl Into<Vec<u8>>) -> Self {
        MetaMatch {
            key,
            value: value.into(),
            op: RelOp::Eq,
        }
    }

    pub fn mark(mark: u32) -> Self {
        Self::new(MetaType::Mark, mark.to_ne_bytes())
    }

    pub fn iif(index: u32) -> Self {
        Self::new(MetaType::Iif, index.to_ne_bytes())
    }

    pub fn oif(index: u32) -> Self {
        Self::new(MetaType::Oif, index.to_ne_bytes())
    }

    pub fn iifname(name: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(MetaType::IifName, iface_name(name)?))
    }

    pub fn oifname(name: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(MetaType::OifName, iface_name(name)?))
    }

    pub fn skuid(uid: u32) -> Self {
        Self::new(MetaType::SkUid, uid.to_ne_bytes())
    }

    pub fn skgid(gid: u32) -> Self {
        Self::new(MetaType::SkGid, gid.to_ne_bytes())
    }

    pub fn nfproto(family: ProtocolFamily) -> Self {
        Self::new(MetaType::NfProto, [family as u8])
    }

    pub fn l4proto(protocol: u8) -> Self {
        Self::new(MetaType::L4Proto, [protocol])
    }

    pub fn with_op(mut self, op: RelOp) -> Self {
        self.op = op;
        self
    }
}

/// Interface names are compared on their full NUL-padded length.
fn iface_name(name: &str) -> Result<Vec<u8>, ValidationError> {
    if name.len() >= IFNAMSIZ {
        return Err(ValidationError::InterfaceNameTooLong(name.to_string()));
    }
    let mut data = name.as_bytes().to_vec();
    data.resize(IFNAMSIZ, 0);
    Ok(data)
}

/// Metadata criteria. Every match must hold.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct MetaRule {
    pub matches: Vec<MetaMatch>,
}

impl MetaRule {
    pub fn new(matches: Vec<MetaMatch>) -> Self {
        MetaRule { matches }
    }
}

/// The terminal verdict of a rule.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    Accept,
    Drop,
    Return,
    Jump(String),
    Goto(String),
}

impl Verdict {
    fn validate(&self) -> Result<(), ValidationError> {
        let (kind, chain) = match self {
            Verdict::Jump(chain) => ("jump", chain),
            Verdict::Goto(chain) => ("goto", chain),
            _ => return Ok(()),
        };
        if chain.is_empty() {
            return Err(ValidationError::MissingTargetChain(kind));
        }
        validate_chain_name(chain)
    }
}

impl From<&Verdict> for VerdictKind {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Accept => VerdictKind::Accept,
            Verdict::Drop => VerdictKind::Drop,
            Verdict::Return => VerdictKind::Return,
            Verdict::Jump(chain) => VerdictKind::Jump {
                chain: chain.clone(),
            },
            Verdict::Goto(chain) => VerdictKind::Goto {
                chain: chain.clone(),
            },
        }
    }
}

/// Target of a source or destination NAT. An unset address or port is left to the kernel: only
/// the port, respectively only the address, is rewritten.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct NatAttributes {
    /// Lower and optional upper bound of the address range to translate to.
    pub addr: Option<(IpAddr, Option<IpAddr>)>,
    /// Lower and optional upper bound of the port range to translate to.
    pub port: Option<(u16, Option<u16>)>,
    pub random: bool,
    pub fully_random: bool,
    pub persistent: bool,
}

impl NatAttributes {
    pub fn to_addr(addr: IpAddr) -> Self {
        NatAttributes {
            addr: Some((addr, None)),
            ..Default::default()
        }
    }

    pub fn to_port(port: u16) -> Self {
        NatAttributes {
            port: Some((port, None)),
            ..Default::default()
        }
    }

    pub fn with_addr_range(mut self, low: IpAddr, high: IpAddr) -> Self {
        self.addr = Some((low, Some(high)));
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some((port, None));
        self
    }

    pub fn with_port_range(mut self, low: u16, high: u16) -> Self {
        self.port = Some((low, Some(high)));
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.addr.is_none() && self.port.is_none() {
            return Err(ValidationError::EmptyNat);
        }
        if let Some((low, Some(high))) = self.addr {
            if low.is_ipv4() != high.is_ipv4() {
                return Err(ValidationError::MixedAddressFamilies);
            }
            if low > high {
                return Err(ValidationError::InvertedRange("address"));
            }
        }
        if let Some((low, Some(high))) = self.port {
            if low > high {
                return Err(ValidationError::InvertedRange("port"));
            }
        }
        Ok(())
    }
}

/// What happens to the packets a rule matches.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RuleAction {
    Verdict(Verdict),
    /// Redirect to a local port, or hand over to a transparent proxy listening on it.
    Redirect { port: u16, tproxy: bool },
    SNat(NatAttributes),
    DNat(NatAttributes),
}

impl RuleAction {
    pub fn verdict(verdict: Verdict) -> Self {
        RuleAction::Verdict(verdict)
    }

    pub fn accept() -> Self {
        RuleAction::Verdict(Verdict::Accept)
    }

    pub fn drop() -> Self {
        RuleAction::Verdict(Verdict::Drop)
    }

    pub fn jump(chain: impl Into<String>) -> Self {
        RuleAction::Verdict(Verdict::Jump(chain.into()))
    }

    pub fn goto(chain: impl Into<String>) -> Self {
        RuleAction::Verdict(Verdict::Goto(chain.into()))
    }

    pub fn redirect(port: u16, tproxy: bool) -> Self {
        RuleAction::Redirect { port, tproxy }
    }

    pub fn snat(attributes: NatAttributes) -> Self {
        RuleAction::SNat(attributes)
    }

    pub fn dnat(attributes: NatAttributes) -> Self {
        RuleAction::DNat(attributes)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RuleAction::Verdict(verdict) => verdict.validate(),
            RuleAction::Redirect { .. } => Ok(()),
            RuleAction::SNat(attrs) | RuleAction::DNat(attrs) => attrs.validate(),
        }
    }
}

/// A policy statement: packets matching every criteria get `action` applied. When `exclude` is
/// set, the network layer matches are inverted.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Rule {
    pub l3: Option<L3Rule>,
    pub l4: Option<L4Rule>,
    pub meta: Option<MetaRule>,
    pub exclude: bool,
    pub counter: bool,
    pub log: Option<Log>,
    pub action: RuleAction,
}

impl Rule {
    pub fn new(action: RuleAction) -> Self {
        Rule {
            l3: None,
            l4: None,
            meta: None,
            exclude: false,
            counter: false,
            log: None,
            action,
        }
    }

    pub fn with_l3(mut self, l3: L3Rule) -> Self {
        self.l3 = Some(l3);
        self
    }

    pub fn with_l4(mut self, l4: L4Rule) -> Self {
        self.l4 = Some(l4);
        self
    }

    pub fn with_meta(mut self, meta: MetaRule) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_exclude(mut self, exclude: bool) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_counter(mut self) -> Self {
        self.counter = true;
        self
    }

    pub fn with_log(
        mut self,
        group: Option<u16>,
        prefix: Option<&str>,
    ) -> Result<Self, ValidationError> {
        self.log = Some(Log {
            group: group.map(LogGroup),
            prefix: prefix.map(LogPrefix::new).transpose()?,
        });
        Ok(self)
    }

    /// Checks the rule for inconsistencies the types do not rule out, stopping at the first one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_criteria = self.l3.is_some() || self.l4.is_some() || self.meta.is_some();
        if !has_criteria && !matches!(self.action, RuleAction::Verdict(_)) {
            return Err(ValidationError::NoCriteria);
        }
        if let RuleAction::Redirect { .. } = self.action {
            if self.l3.is_none() && self.l4.is_none() {
                return Err(ValidationError::RedirectWithoutCriteria);
            }
        }
        self.action.validate()?;
        if let Some(ref l3) = self.l3 {
            l3.validate()?;
        }
        if let Some(ref l4) = self.l4 {
            l4.validate()?;
        }
        if let Some(ref meta) = self.meta {
            if meta.matches.is_empty() {
                return Err(ValidationError::EmptyList("metadata"));
            }
        }
        Ok(())
    }
}
