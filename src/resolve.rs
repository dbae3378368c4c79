//! Isolated name resolution over a fixed set of roots.
//!
//! Indexing reads headers only. A [`ResolutionContext`] reads a class file in
//! full when a caller needs what the header leaves out, currently the declared
//! modifiers of nested classes. It looks in its own roots first and falls back
//! to its parent.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::classfile::parse_class;
use crate::location::{CLASS_PATH_ENV, Location, LocationKind, LocationSet};
use crate::record::{ClassRecord, FlagSet};
use crate::scan::{archive_entry_names, class_name_to_class_path, read_archive_entry};

/// A class read to the end of its class file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedClass {
    pub record: ClassRecord,
    /// Header flags for top-level classes; for nested classes the flags from
    /// the class's own `InnerClasses` entry.
    pub declared_flags: FlagSet,
    pub outer_class: Option<String>,
    pub source_file: Option<String>,
    pub major_version: u16,
    pub field_count: u16,
    pub method_count: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionContextBuilder {
    locations: LocationSet,
}

impl ResolutionContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_locations(locations: &LocationSet) -> Self {
        Self {
            locations: locations.clone(),
        }
    }

    /// Same acceptance rules as [`LocationSet::add`].
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        self.locations.add(path)
    }

    pub fn add_class_path(&mut self, value: &OsStr) -> usize {
        self.locations.add_class_path(value)
    }

    pub fn clear(&mut self) {
        self.locations.clear();
    }

    pub fn locations(&self) -> &LocationSet {
        &self.locations
    }

    /// Search roots as absolute URIs, each ending in `/`.
    pub fn uris(&self) -> Vec<String> {
        self.locations.iter().map(location_uri).collect()
    }

    /// A context over the accumulated roots. Without an explicit parent, the
    /// ambient context built from `CLASSPATH` is used as the fallback.
    pub fn build(&self, parent: Option<Arc<ResolutionContext>>) -> ResolutionContext {
        let parent = parent.or_else(|| Some(Arc::new(ResolutionContext::ambient())));
        ResolutionContext::new(self.locations.as_slice().to_vec(), parent)
    }
}

type Memo<K> = Mutex<HashMap<K, Option<Arc<ResolvedClass>>>>;

#[derive(Debug)]
pub struct ResolutionContext {
    roots: Vec<Location>,
    parent: Option<Arc<ResolutionContext>>,
    cache: Memo<String>,
    by_origin: Memo<(Location, String)>,
    archive_entries: Mutex<HashMap<PathBuf, Arc<HashSet<String>>>>,
}

impl ResolutionContext {
    pub fn new(roots: Vec<Location>, parent: Option<Arc<ResolutionContext>>) -> Self {
        Self {
            roots,
            parent,
            cache: Mutex::new(HashMap::new()),
            by_origin: Mutex::new(HashMap::new()),
            archive_entries: Mutex::new(HashMap::new()),
        }
    }

    /// The caller's ambient search path: the `CLASSPATH` roots, no parent.
    pub fn ambient() -> Self {
        let locations = LocationSet::from_env(CLASS_PATH_ENV);
        Self::new(locations.as_slice().to_vec(), None)
    }

    pub fn roots(&self) -> &[Location] {
        &self.roots
    }

    pub fn uris(&self) -> Vec<String> {
        self.roots.iter().map(location_uri).collect()
    }

    pub fn parent(&self) -> Option<&Arc<ResolutionContext>> {
        self.parent.as_ref()
    }

    pub fn resolve(&self, class_name: &str) -> Option<Arc<ResolvedClass>> {
        self.resolve_local(class_name).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.resolve(class_name))
        })
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.resolve(class_name).is_some()
    }

    /// Reads `class_name` from `origin` only, the location an index record
    /// came from, so the result describes the same class file as the record.
    /// Neither the other roots nor the parent are consulted.
    pub fn resolve_in(&self, origin: &Location, class_name: &str) -> Option<Arc<ResolvedClass>> {
        let key = (origin.clone(), class_name.to_string());
        let mut memo = self.by_origin.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = memo.get(&key) {
            return hit.clone();
        }

        let entry_path = class_name_to_class_path(class_name);
        let found = load_from(origin, class_name, &entry_path).map(Arc::new);
        memo.insert(key, found.clone());
        found
    }

    fn resolve_local(&self, class_name: &str) -> Option<Arc<ResolvedClass>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(class_name) {
            return hit.clone();
        }

        let entry_path = class_name_to_class_path(class_name);
        let found = self
            .roots
            .iter()
            .filter(|root| self.may_hold(root, &entry_path))
            .find_map(|root| load_from(root, class_name, &entry_path))
            .map(Arc::new);
        cache.insert(class_name.to_string(), found.clone());
        found
    }

    /// Archive roots are listed once and then answered from memory, so a miss
    /// does not reopen every archive. Directory roots are always tried.
    fn may_hold(&self, root: &Location, entry_path: &str) -> bool {
        if root.kind != LocationKind::Archive {
            return true;
        }
        let mut listed = self.archive_entries.lock().unwrap_or_else(|e| e.into_inner());
        let entries = listed.entry(root.path.clone()).or_insert_with(|| {
            match archive_entry_names(&root.path) {
                Ok(names) => Arc::new(names),
                Err(e) => {
                    warn!(archive = %root.path.display(), error = %format!("{e:#}"), "resolution root unreadable");
                    Arc::new(HashSet::new())
                }
            }
        });
        entries.contains(entry_path)
    }
}

fn load_from(root: &Location, class_name: &str, entry_path: &str) -> Option<ResolvedClass> {
    let bytes = match root.kind {
        LocationKind::Archive => match read_archive_entry(&root.path, entry_path) {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(archive = %root.path.display(), error = %e, "resolution root unreadable");
                return None;
            }
        },
        LocationKind::Directory => {
            let path = root.path.join(entry_path);
            if !path.is_file() {
                return None;
            }
            match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "class file unreadable");
                    return None;
                }
            }
        }
    };

    let body = match parse_class(&bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!(class = class_name, root = %root.path.display(), error = %e, "malformed class file");
            return None;
        }
    };
    if body.header.name != class_name {
        debug!(class = class_name, found = %body.header.name, "class file declares another name");
        return None;
    }

    let own_entry = body.own_inner_entry().cloned();
    let header_flags = FlagSet::from_class_access(body.header.access_flags);
    let declared_flags = own_entry
        .as_ref()
        .map(|e| FlagSet::from_member_access(e.access_flags))
        .unwrap_or(header_flags);

    Some(ResolvedClass {
        declared_flags,
        outer_class: own_entry.and_then(|e| e.outer_name),
        source_file: body.source_file,
        major_version: body.header.major_version,
        field_count: body.field_count,
        method_count: body.method_count,
        record: ClassRecord::from_header(body.header, root.clone()),
    })
}

/// `file:///abs/dir/` for directories, `jar:file:///abs/x.jar!/` for archives.
pub fn location_uri(location: &Location) -> String {
    let path = encode_path(&location.path.to_string_lossy().replace('\\', "/"));
    let path = if path.starts_with('/') { path } else { format!("/{path}") };
    match location.kind {
        LocationKind::Directory => {
            let path = path.trim_end_matches('/');
            format!("file://{path}/")
        }
        LocationKind::Archive => format!("jar:file://{path}!/"),
    }
}

fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' | b':' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
