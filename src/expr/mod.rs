//! A module with all the nftables expressions that can be added to [`Rule`]s to build up how
//! they match against packets.
//!
//! Expressions are plain data: the netlink connection behind the [`Transport`] is the one that
//! encodes them on the wire. The kernel evaluates them in order and stops at the first one that
//! does not match, so the order of an [`ExpressionList`] is significant.
//!
//! [`Rule`]: crate::Rule
//! [`Transport`]: crate::Transport

use serde::Serialize;

mod bitwise;
pub use self::bitwise::Bitwise;

mod cmp;
pub use self::cmp::{Cmp, CmpOp};

mod counter;
pub use self::counter::Counter;

mod immediate;
pub use self::immediate::{Immediate, ImmediateData};

mod log;
pub use self::log::{Log, LogGroup, LogPrefix};

mod lookup;
pub use self::lookup::Lookup;

mod meta;
pub use self::meta::{Meta, MetaType};

mod nat;
pub use self::nat::{Nat, NatType};

mod payload;
pub use self::payload::*;

mod range;
pub use self::range::{Range, RangeOp};

mod redirect;
pub use self::redirect::{Redirect, TProxy};

mod register;
pub use self::register::Register;

mod verdict;
pub use self::verdict::{VerdictKind, VerdictType};

pub trait Expression {
    fn get_name() -> &'static str;
}

macro_rules! create_expr_variant {
    ($enum:ident $(, [$name:ident, $type:ty])+) => {
        /// Any of the expressions this crate knows how to build.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(tag = "expr", rename_all = "lowercase")]
        pub enum $enum {
            $(
                $name($type),
            )+
        }

        impl $enum {
            /// The name under which the kernel knows this expression.
            pub fn get_name(&self) -> &'static str {
                match self {
                    $(
                        $enum::$name(_) => <$type>::get_name(),
                    )+
                }
            }
        }

        $(
            impl From<$type> for $enum {
                fn from(val: $type) -> Self {
                    $enum::$name(val)
                }
            }
        )+
    };
}

create_expr_variant!(
    ExpressionVariant,
    [Bitwise, Bitwise],
    [Cmp, Cmp],
    [Counter, Counter],
    [Immediate, Immediate],
    [Log, Log],
    [Lookup, Lookup],
    [Meta, Meta],
    [Nat, Nat],
    [Payload, Payload],
    [Range, Range],
    [Redirect, Redirect],
    [TProxy, TProxy]
);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ExpressionList {
    exprs: Vec<ExpressionVariant>,
}

impl ExpressionList {
    pub fn builder() -> Self {
        Self { exprs: Vec::new() }
    }

    pub fn add_expression<T>(&mut self, e: T)
    where
        T: Expression,
        ExpressionVariant: From<T>,
    {
        self.exprs.push(ExpressionVariant::from(e));
    }

    pub fn with_expression<T>(mut self, e: T) -> Self
    where
        T: Expression,
        ExpressionVariant: From<T>,
    {
        self.add_expression(e);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpressionVariant> {
        self.exprs.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExpressionVariant> {
        self.exprs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

impl std::ops::Index<usize> for ExpressionList {
    type Output = ExpressionVariant;

    fn index(&self, idx: usize) -> &ExpressionVariant {
        &self.exprs[idx]
    }
}
