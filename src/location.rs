//! Scan roots.
//!
//! A location is either an archive (`.jar`/`.zip`, matched case-insensitively)
//! or a directory tree of `.class` files. [`LocationSet`] keeps them in
//! insertion order and refuses paths that do not exist, are neither kind, or
//! are already present.

use serde::Serialize;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::scan::find_archives;

pub const ARCHIVE_SUFFIXES: &[&str] = &[".jar", ".zip"];
pub const CLASS_SUFFIX: &str = ".class";
pub const CLASS_PATH_ENV: &str = "CLASSPATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Archive,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub path: PathBuf,
    pub kind: LocationKind,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location does not exist: {}", .path.display())]
    Missing { path: PathBuf },
    #[error("not an archive or directory: {}", .path.display())]
    Unsupported { path: PathBuf },
    #[error("location already added: {}", .path.display())]
    Duplicate { path: PathBuf },
    #[error("failed to resolve location {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

pub fn is_archive_name(name: &str) -> bool {
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| ends_with_ignore_case(name, suffix))
}

impl Location {
    /// Classifies `path`, canonicalizing it so that two spellings of the same
    /// root compare equal.
    pub fn probe(path: &Path) -> Result<Location, LocationError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LocationError::Missing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(LocationError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let kind = if metadata.is_dir() {
            LocationKind::Directory
        } else if metadata.is_file() && is_archive_name(&path.to_string_lossy()) {
            LocationKind::Archive
        } else {
            return Err(LocationError::Unsupported {
                path: path.to_path_buf(),
            });
        };

        let path = std::fs::canonicalize(path).map_err(|source| LocationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Location { path, kind })
    }

    pub fn is_archive(&self) -> bool {
        self.kind == LocationKind::Archive
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocationSet {
    locations: Vec<Location>,
}

impl LocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set seeded from a path-list environment variable such as `CLASSPATH`.
    /// A missing variable yields an empty set.
    pub fn from_env(var: &str) -> Self {
        let mut set = Self::new();
        if let Some(value) = std::env::var_os(var) {
            set.add_class_path(&value);
        }
        set
    }

    pub fn try_add(&mut self, path: &Path) -> Result<&Location, LocationError> {
        let location = Location::probe(path)?;
        if self.locations.contains(&location) {
            return Err(LocationError::Duplicate {
                path: location.path,
            });
        }
        self.locations.push(location);
        Ok(&self.locations[self.locations.len() - 1])
    }

    /// Adds `path` if it is scannable. Rejections are logged, never raised.
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        match self.try_add(path.as_ref()) {
            Ok(location) => {
                debug!(path = %location.path.display(), kind = ?location.kind, "location added");
                true
            }
            Err(e) => {
                debug!(error = %e, "location rejected");
                false
            }
        }
    }

    pub fn add_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().filter(|p| self.add(p)).count()
    }

    /// Adds every entry of a platform path list. An entry whose last component
    /// is `*` stands for every archive directly inside that directory.
    pub fn add_class_path(&mut self, value: &OsStr) -> usize {
        let mut added = 0;
        for entry in std::env::split_paths(value) {
            if entry.as_os_str().is_empty() {
                continue;
            }
            if entry.file_name() == Some(OsStr::new("*")) {
                let dir = entry.parent().unwrap_or_else(|| Path::new("."));
                added += self.add_all(archives_in(dir));
            } else if self.add(&entry) {
                added += 1;
            }
        }
        added
    }

    /// Adds every archive found anywhere below `root`, e.g. a local Maven
    /// repository.
    pub fn add_archives_under(&mut self, root: &Path) -> anyhow::Result<usize> {
        let archives = find_archives(root)?;
        Ok(self.add_all(archives))
    }

    pub fn clear(&mut self) {
        self.locations.clear();
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.locations.contains(location)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }
}

impl<'a> IntoIterator for &'a LocationSet {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.locations.iter()
    }
}

fn archives_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "class path wildcard directory unreadable");
        return Vec::new();
    };
    let mut archives: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_archive_name(&p.to_string_lossy()))
        .collect();
    archives.sort();
    archives
}
