//! `And`, `Or` and `Not`, usable at the name level and the class level.
//!
//! `And` and `Or` are mutable lists evaluated in insertion order with
//! short-circuiting. Both accept everything when empty. Changing a list while
//! another thread calls `accept` on it needs a lock around the filter.

use std::fmt;

use super::{ClassFilter, NameFilter};
use crate::index::ClassIndex;
use crate::record::ClassRecord;

pub struct AndFilter<F: ?Sized> {
    filters: Vec<Box<F>>,
}

pub struct OrFilter<F: ?Sized> {
    filters: Vec<Box<F>>,
}

pub struct NotFilter<F: ?Sized> {
    inner: Box<F>,
}

pub type AndNameFilter = AndFilter<dyn NameFilter>;
pub type AndClassFilter = AndFilter<dyn ClassFilter>;
pub type OrNameFilter = OrFilter<dyn NameFilter>;
pub type OrClassFilter = OrFilter<dyn ClassFilter>;
pub type NotNameFilter = NotFilter<dyn NameFilter>;
pub type NotClassFilter = NotFilter<dyn ClassFilter>;

macro_rules! filter_list {
    ($list:ident, $label:literal) => {
        impl<F: ?Sized> Default for $list<F> {
            fn default() -> Self {
                Self {
                    filters: Vec::new(),
                }
            }
        }

        impl<F: ?Sized> fmt::Debug for $list<F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct($label)
                    .field("filters", &self.filters.len())
                    .finish()
            }
        }

        impl<F: ?Sized> $list<F> {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn push(&mut self, filter: Box<F>) -> &mut Self {
                self.filters.push(filter);
                self
            }

            /// Removes and returns the filter at `position`, if any.
            pub fn remove_filter(&mut self, position: usize) -> Option<Box<F>> {
                (position < self.filters.len()).then(|| self.filters.remove(position))
            }

            pub fn len(&self) -> usize {
                self.filters.len()
            }

            pub fn is_empty(&self) -> bool {
                self.filters.is_empty()
            }

            pub fn clear(&mut self) {
                self.filters.clear();
            }
        }

        impl $list<dyn NameFilter> {
            pub fn add_filter(&mut self, filter: impl NameFilter + 'static) -> &mut Self {
                self.push(Box::new(filter))
            }

            pub fn with(mut self, filter: impl NameFilter + 'static) -> Self {
                self.add_filter(filter);
                self
            }
        }

        impl $list<dyn ClassFilter> {
            pub fn add_filter(&mut self, filter: impl ClassFilter + 'static) -> &mut Self {
                self.push(Box::new(filter))
            }

            pub fn with(mut self, filter: impl ClassFilter + 'static) -> Self {
                self.add_filter(filter);
                self
            }
        }
    };
}

filter_list!(AndFilter, "AndFilter");
filter_list!(OrFilter, "OrFilter");

impl NameFilter for AndFilter<dyn NameFilter> {
    fn accept(&self, name: &str) -> bool {
        self.filters.iter().all(|f| f.accept(name))
    }
}

impl ClassFilter for AndFilter<dyn ClassFilter> {
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool {
        self.filters.iter().all(|f| f.accept(class, index))
    }
}

impl NameFilter for OrFilter<dyn NameFilter> {
    fn accept(&self, name: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.accept(name))
    }
}

impl ClassFilter for OrFilter<dyn ClassFilter> {
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.accept(class, index))
    }
}

impl<F: ?Sized> fmt::Debug for NotFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotFilter")
    }
}

impl NotFilter<dyn NameFilter> {
    pub fn new(filter: impl NameFilter + 'static) -> Self {
        Self {
            inner: Box::new(filter),
        }
    }
}

impl NotFilter<dyn ClassFilter> {
    pub fn new(filter: impl ClassFilter + 'static) -> Self {
        Self {
            inner: Box::new(filter),
        }
    }
}

impl NameFilter for NotFilter<dyn NameFilter> {
    fn accept(&self, name: &str) -> bool {
        !self.inner.accept(name)
    }
}

impl ClassFilter for NotFilter<dyn ClassFilter> {
    fn accept(&self, class: &ClassRecord, index: &ClassIndex) -> bool {
        !self.inner.accept(class, index)
    }
}
