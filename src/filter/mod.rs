//! Predicates for selecting classes.
//!
//! Filters come in two levels. A [`NameFilter`] sees only a qualified name and
//! is cheap enough to run on every scanned entry. A [`ClassFilter`] sees the
//! indexed [`ClassRecord`] together with the whole [`ClassIndex`], so it can
//! ask about flags and supertypes.
//!
//! Any closure with the right signature is a filter of the matching level.
//! The combinators in [`combinator`] work at both levels and treat an empty
//! list as accepting everything, for `And` as well as `Or`.
//!
//! Every regex-based filter uses substring search: a pattern accepts a name if
//! it matches anywhere in it. Anchor the pattern (`^…$`) for a full match.

pub mod class;
pub mod combinator;
pub mod pattern;

use thiserror::Error;

use crate::index::ClassIndex;
use crate::record::ClassRecord;

pub use class::{ModifiersFilter, SubclassFilter, abstract_classes, concrete_classes, interfaces_only};
pub use combinator::{
    AndClassFilter, AndFilter, AndNameFilter, NotClassFilter, NotFilter, NotNameFilter, OrClassFilter,
    OrFilter, OrNameFilter,
};
pub use pattern::{MultiRegexFilter, RegexFilter};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub trait NameFilter: Send + Sync {
    fn accept(&self, name: &str) -> bool;
}

pub trait ClassFilter: Send + Sync {
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool;
}

impl<F> NameFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accept(&self, name: &str) -> bool {
        self(name)
    }
}

impl<F> ClassFilter for F
where
    F: Fn(&ClassRecord, &ClassIndex) -> bool + Send + Sync,
{
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool {
        self(class, index)
    }
}

/// Accepts everything, at either level.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl NameFilter for AcceptAll {
    fn accept(&self, _name: &str) -> bool {
        true
    }
}

impl ClassFilter for AcceptAll {
    fn accept(&self, _class: &ClassRecord, _index: &ClassIndex) -> bool {
        true
    }
}

/// Runs a name filter against a record's name.
#[derive(Debug, Clone)]
pub struct ByName<F>(pub F);

impl<F: NameFilter> ClassFilter for ByName<F> {
    fn accept(&self, class: &ClassRecord, _index: &ClassIndex) -> bool {
        self.0.accept(&class.name)
    }
}
