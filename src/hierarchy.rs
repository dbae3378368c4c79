//! Transitive supertype closures over a [`ClassIndex`].
//!
//! Walks stop quietly at a name the index does not hold and never revisit a
//! name, so incomplete and cyclic graphs are both fine.

use std::collections::{HashSet, VecDeque};

use crate::index::ClassIndex;
use crate::record::ClassRecord;

/// One step of a closure: the name as referenced, and its record if indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor<'a> {
    pub name: String,
    pub record: Option<&'a ClassRecord>,
}

#[derive(Debug, Clone, Copy)]
pub struct Hierarchy<'a> {
    index: &'a ClassIndex,
}

impl<'a> Hierarchy<'a> {
    pub fn new(index: &'a ClassIndex) -> Self {
        Self { index }
    }

    /// The superclass chain of `start`, nearest first. The last element may
    /// be unresolved, in which case the walk ended there.
    pub fn superclass_chain(&self, start: &ClassRecord) -> Vec<Ancestor<'a>> {
        let mut visited = HashSet::from([start.name.clone()]);
        let mut chain = Vec::new();
        let mut next = start.superclass_name.clone();

        while let Some(name) = next.take() {
            if !visited.insert(name.clone()) {
                break;
            }
            let record = self.index.get(&name);
            next = record.and_then(|r| r.superclass_name.clone());
            chain.push(Ancestor { name, record });
        }
        chain
    }

    /// Every interface reachable from `start`: its own, those of each class in
    /// its superclass chain, and their super-interfaces, breadth first.
    pub fn interface_closure(&self, start: &ClassRecord) -> Vec<Ancestor<'a>> {
        let mut queue: VecDeque<String> = start.interface_names.iter().cloned().collect();
        for ancestor in self.superclass_chain(start) {
            if let Some(record) = ancestor.record {
                queue.extend(record.interface_names.iter().cloned());
            }
        }

        let mut visited = HashSet::from([start.name.clone()]);
        let mut closure = Vec::new();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let record = self.index.get(&name);
            if let Some(record) = record {
                queue.extend(record.interface_names.iter().cloned());
            }
            closure.push(Ancestor { name, record });
        }
        closure
    }

    /// Indexed superclasses of `start`, nearest first.
    pub fn find_all_super_classes(&self, start: &ClassRecord) -> Vec<&'a ClassRecord> {
        self.superclass_chain(start)
            .into_iter()
            .filter_map(|a| a.record)
            .collect()
    }

    /// Indexed interfaces of `start`, in breadth-first order.
    pub fn find_all_interfaces(&self, start: &ClassRecord) -> Vec<&'a ClassRecord> {
        self.interface_closure(start)
            .into_iter()
            .filter_map(|a| a.record)
            .collect()
    }

    /// True if `base` names a superclass or interface of `start`, whether or
    /// not `base` itself was indexed. A class is not its own subtype here.
    pub fn is_subtype_of(&self, start: &ClassRecord, base: &str) -> bool {
        self.superclass_chain(start).iter().any(|a| a.name == base)
            || self.interface_closure(start).iter().any(|a| a.name == base)
    }
}
