//! Fixtures shared by the unit tests: a minimal class file writer and
//! jar/directory builders.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;

use crate::location::{Location, LocationKind};
use crate::record::{ClassRecord, FlagSet};

pub(crate) struct ClassBytes {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access: u16,
    long_constant: bool,
    inner: Vec<(String, Option<String>, Option<String>, u16)>,
    source_file: Option<String>,
}

impl ClassBytes {
    pub(crate) fn new(internal_name: &str) -> Self {
        Self {
            name: internal_name.to_string(),
            super_name: None,
            interfaces: Vec::new(),
            access: 0x0021,
            long_constant: false,
            inner: Vec::new(),
            source_file: None,
        }
    }

    pub(crate) fn extends(mut self, internal_name: &str) -> Self {
        self.super_name = Some(internal_name.to_string());
        self
    }

    pub(crate) fn implements(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub(crate) fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    pub(crate) fn with_long_constant(mut self) -> Self {
        self.long_constant = true;
        self
    }

    pub(crate) fn inner_class(
        mut self,
        inner: &str,
        outer: Option<&str>,
        simple: Option<&str>,
        flags: u16,
    ) -> Self {
        self.inner.push((
            inner.to_string(),
            outer.map(str::to_string),
            simple.map(str::to_string),
            flags,
        ));
        self
    }

    pub(crate) fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        if self.long_constant {
            pool.long(42);
        }
        let this_class = pool.class(&self.name);
        let super_class = self.super_name.as_deref().map(|n| pool.class(n)).unwrap_or(0);
        let interfaces: Vec<u16> = self.interfaces.iter().map(|n| pool.class(n)).collect();

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if !self.inner.is_empty() {
            let name = pool.utf8("InnerClasses");
            let mut body = (self.inner.len() as u16).to_be_bytes().to_vec();
            for (inner, outer, simple, flags) in &self.inner {
                let inner = pool.class(inner);
                let outer = outer.as_deref().map(|n| pool.class(n)).unwrap_or(0);
                let simple = simple.as_deref().map(|n| pool.utf8(n)).unwrap_or(0);
                for v in [inner, outer, simple, *flags] {
                    body.extend_from_slice(&v.to_be_bytes());
                }
            }
            attributes.push((name, body));
        }
        if let Some(file) = self.source_file.as_deref() {
            let name = pool.utf8("SourceFile");
            let index = pool.utf8(file);
            attributes.push((name, index.to_be_bytes().to_vec()));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&pool.count.to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&(interfaces.len() as u16).to_be_bytes());
        for i in interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // fields
        out.extend_from_slice(&0u16.to_be_bytes()); // methods
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for (name, body) in attributes {
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
        out
    }
}

struct Pool {
    bytes: Vec<u8>,
    count: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            count: 1,
            utf8: HashMap::new(),
            classes: HashMap::new(),
        }
    }
}

impl Pool {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        let encoded = cesu8::to_java_cesu8(value);
        self.bytes.push(1);
        self.bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(&encoded);
        let index = self.count;
        self.count += 1;
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(index) = self.classes.get(internal_name) {
            return *index;
        }
        let name_index = self.utf8(internal_name);
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        let index = self.count;
        self.count += 1;
        self.classes.insert(internal_name.to_string(), index);
        index
    }

    fn long(&mut self, value: i64) {
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.count += 2;
    }
}

pub(crate) fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(name.trim_end_matches('/'), options)?;
            continue;
        }
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// Writes `a/b/C.class` style entries below `root`.
pub(crate) fn write_class_dir(root: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    for (name, content) in entries {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    }
    Ok(())
}

/// A record as the header extractor would produce it, for index-only tests.
pub(crate) fn record(name: &str, superclass: Option<&str>, interfaces: &[&str]) -> ClassRecord {
    ClassRecord {
        name: name.to_string(),
        superclass_name: superclass.map(str::to_string),
        interface_names: interfaces.iter().map(|s| s.to_string()).collect(),
        flags: FlagSet::PUBLIC,
        origin: Location {
            path: "/nowhere".into(),
            kind: LocationKind::Directory,
        },
    }
}
