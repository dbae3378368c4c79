use anyhow::{Context, Result};
use ignore::WalkBuilder;
use memmap2::Mmap;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::classfile::{ACC_MODULE, parse_header};
use crate::location::{CLASS_SUFFIX, Location, LocationKind, ends_with_ignore_case, is_archive_name};
use crate::record::ClassRecord;

/// Entries processed between two cancellation checks inside one location.
pub const CANCEL_CHECK_INTERVAL: usize = 256;

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_ENTRY_PREALLOC: u64 = 1 << 20;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Records found in one location, in entry order.
#[derive(Debug)]
pub struct LocationScan {
    pub location: Location,
    pub records: Vec<ClassRecord>,
    pub candidates: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl LocationScan {
    fn new(location: &Location) -> Self {
        Self {
            location: location.clone(),
            records: Vec::new(),
            candidates: 0,
            skipped: 0,
            cancelled: false,
        }
    }

    fn push_entry(&mut self, entry_name: &str, bytes: &[u8]) {
        self.candidates += 1;
        match parse_header(bytes) {
            Ok(header) if header.access_flags & ACC_MODULE != 0 => {
                debug!(entry = entry_name, "skipping module descriptor");
            }
            Ok(header) => {
                if entry_name_to_class_name(entry_name).as_deref() != Some(header.name.as_str()) {
                    debug!(
                        entry = entry_name,
                        class = %header.name,
                        "class file name does not match its entry path"
                    );
                }
                self.records
                    .push(ClassRecord::from_header(header, self.location.clone()));
            }
            Err(e) => {
                self.skipped += 1;
                warn!(
                    location = %self.location.path.display(),
                    entry = entry_name,
                    error = %e,
                    "skipping malformed class file"
                );
            }
        }
    }
}

/// Reads every class file header in `location`. An error means the location
/// as a whole could not be read; bad entries are skipped and counted.
pub fn scan_location(location: &Location, cancel: &CancellationToken) -> Result<LocationScan> {
    match location.kind {
        LocationKind::Archive => scan_archive(location, cancel),
        LocationKind::Directory => scan_directory(location, cancel),
    }
}

pub fn scan_archive(location: &Location, cancel: &CancellationToken) -> Result<LocationScan> {
    let path = &location.path;
    let file = File::open(path).with_context(|| format!("Failed to open archive: {}", path.display()))?;
    // SAFETY: The file is opened read-only and outlives the mapping, which is
    // dropped at the end of this function.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", path.display()))?;

    let mut scan = LocationScan::new(location);
    let mut bytes = Vec::new();
    for i in 0..archive.len() {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            scan.cancelled = true;
            break;
        }

        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                scan.skipped += 1;
                warn!(archive = %path.display(), index = i, error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.is_dir() || !ends_with_ignore_case(entry.name(), CLASS_SUFFIX) {
            continue;
        }

        let name = entry.name().to_string();
        bytes.clear();
        if let Err(e) = entry.read_to_end(&mut bytes) {
            scan.candidates += 1;
            scan.skipped += 1;
            warn!(archive = %path.display(), entry = %name, error = %e, "skipping unreadable entry");
            continue;
        }
        scan.push_entry(&name, &bytes);
    }

    Ok(scan)
}

/// Walks the whole tree below the directory. Nothing is pruned; only regular
/// files ending in `.class` are read.
pub fn scan_directory(location: &Location, cancel: &CancellationToken) -> Result<LocationScan> {
    let root = &location.path;
    std::fs::read_dir(root).with_context(|| format!("Failed to read directory: {}", root.display()))?;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut scan = LocationScan::new(location);
    let mut seen = 0usize;
    for entry in walker {
        if seen % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            scan.cancelled = true;
            break;
        }
        seen += 1;

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(directory = %root.display(), error = %e, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(relative) = relative_entry_name(root, entry.path()) else {
            continue;
        };
        if !ends_with_ignore_case(&relative, CLASS_SUFFIX) {
            continue;
        }

        match std::fs::read(entry.path()) {
            Ok(bytes) => scan.push_entry(&relative, &bytes),
            Err(e) => {
                scan.candidates += 1;
                scan.skipped += 1;
                warn!(file = %entry.path().display(), error = %e, "skipping unreadable class file");
            }
        }
    }

    Ok(scan)
}

/// `a/b/C.class` (or `a\b\C.class`) to `a.b.C`; `None` for non-class entries.
pub fn entry_name_to_class_name(entry: &str) -> Option<String> {
    if !ends_with_ignore_case(entry, CLASS_SUFFIX) {
        return None;
    }
    let stem = &entry[..entry.len() - CLASS_SUFFIX.len()];
    let name = stem.trim_start_matches(['/', '\\']).replace(['/', '\\'], ".");
    if name.is_empty() { None } else { Some(name) }
}

pub fn class_name_to_class_path(class_name: &str) -> String {
    format!("{}{CLASS_SUFFIX}", class_name.replace('.', "/"))
}

fn relative_entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// Every archive anywhere below `base_path`, sorted.
pub fn find_archives(base_path: &Path) -> Result<Vec<PathBuf>> {
    std::fs::metadata(base_path)
        .with_context(|| format!("Failed to read directory: {}", base_path.display()))?;
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if entry.file_type().is_some_and(|t| t.is_file())
                    && is_archive_name(&path.to_string_lossy())
                {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut archives: Vec<PathBuf> = rx.iter().collect();
    archives.sort();
    Ok(archives)
}

/// Names of every entry in the archive, directories included.
pub fn archive_entry_names(archive_path: &Path) -> Result<HashSet<String>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    // SAFETY: see `scan_archive`.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", archive_path.display()))?;
    let archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", archive_path.display()))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// The raw bytes of one entry, `Ok(None)` if the archive has no such entry.
pub fn read_archive_entry(archive_path: &Path, entry_path: &str) -> Result<Option<Vec<u8>>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    // SAFETY: see `scan_archive`.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", archive_path.display()))?;

    let mut entry = match archive.by_name(entry_path) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read {entry_path} from {}", archive_path.display())
            });
        }
    };
    let mut bytes = Vec::with_capacity(entry.size().min(MAX_ENTRY_PREALLOC) as usize);
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {entry_path} from {}", archive_path.display()))?;
    Ok(Some(bytes))
}
