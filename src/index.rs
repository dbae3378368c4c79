use std::collections::HashMap;

use crate::record::ClassRecord;

/// Name to record map built by a scan. The supertype graph it describes is
/// not checked in any way and may be incomplete or cyclic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassIndex {
    classes: HashMap<String, ClassRecord>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under its name, returning the record it replaced.
    pub fn insert(&mut self, record: ClassRecord) -> Option<ClassRecord> {
        self.classes.insert(record.name.clone(), record)
    }

    pub fn get(&self, name: &str) -> Option<&ClassRecord> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassRecord> {
        self.classes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// All records ordered by name.
    pub fn sorted(&self) -> Vec<&ClassRecord> {
        let mut records: Vec<&ClassRecord> = self.classes.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

impl Extend<ClassRecord> for ClassIndex {
    fn extend<I: IntoIterator<Item = ClassRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<ClassRecord> for ClassIndex {
    fn from_iter<I: IntoIterator<Item = ClassRecord>>(iter: I) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}
