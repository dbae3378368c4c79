use std::sync::Arc;

use super::combinator::{AndClassFilter, NotClassFilter};
use super::ClassFilter;
use crate::hierarchy::Hierarchy;
use crate::index::ClassIndex;
use crate::record::{ClassRecord, FlagSet};
use crate::resolve::ResolutionContext;

/// Accepts classes carrying any of the flags in the mask.
///
/// Header flags are checked first. A nested class's `static`, `private` and
/// `protected` modifiers are only recorded in its `InnerClasses` attribute, so
/// when a resolution context is attached and the header does not match, a
/// nested class is re-read from the location it was indexed from and its
/// declared flags are checked instead.
#[derive(Debug, Clone)]
pub struct ModifiersFilter {
    mask: FlagSet,
    resolution: Option<Arc<ResolutionContext>>,
}

impl ModifiersFilter {
    pub fn new(mask: FlagSet) -> Self {
        Self {
            mask,
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, context: Arc<ResolutionContext>) -> Self {
        self.resolution = Some(context);
        self
    }

    pub fn mask(&self) -> FlagSet {
        self.mask
    }
}

impl ClassFilter for ModifiersFilter {
    fn accept(&self, class: &ClassRecord, _index: &ClassIndex) -> bool {
        if class.flags.intersects(self.mask) {
            return true;
        }
        match &self.resolution {
            Some(context) if class.is_nested() => context
                .resolve_in(&class.origin, &class.name)
                .is_some_and(|resolved| resolved.declared_flags.intersects(self.mask)),
            _ => false,
        }
    }
}

/// Accepts classes that extend or implement `base`, directly or not.
#[derive(Debug, Clone)]
pub struct SubclassFilter {
    base: String,
}

impl SubclassFilter {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl ClassFilter for SubclassFilter {
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool {
        Hierarchy::new(index).is_subtype_of(class, &self.base)
    }
}

pub fn interfaces_only() -> ModifiersFilter {
    ModifiersFilter::new(FlagSet::INTERFACE)
}

/// Abstract classes, not counting interfaces (which are abstract too).
pub fn abstract_classes() -> AndClassFilter {
    AndClassFilter::new()
        .with(ModifiersFilter::new(FlagSet::ABSTRACT))
        .with(NotClassFilter::new(interfaces_only()))
}

pub fn concrete_classes() -> NotClassFilter {
    NotClassFilter::new(ModifiersFilter::new(FlagSet::ABSTRACT | FlagSet::INTERFACE))
}
