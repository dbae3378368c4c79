//! # class-scan
//!
//! Finds Java classes in jars and class directories by reading class file
//! headers directly, and selects them with composable filters.
//!
//! ## Architecture
//!
//! - **location**: Scan roots (archives and directories) and class path parsing
//! - **scan**: Archive and directory enumeration, one location at a time
//! - **classfile**: Class file header and attribute reading
//! - **record**: Indexed class metadata and access flags
//! - **index**: Name to record map built by a scan
//! - **hierarchy**: Cycle-safe superclass and interface closures
//! - **filter**: Name-level and class-level predicates and combinators
//! - **resolve**: Full class file resolution for metadata beyond the header
//! - **finder**: The scanning façade tying the above together
//! - **cli** / **config**: Command line surface of the `class-scan` binary

pub mod classfile;
pub mod cli;
pub mod config;
pub mod filter;
pub mod finder;
pub mod hierarchy;
pub mod index;
pub mod location;
pub mod record;
pub mod resolve;
pub mod scan;

#[cfg(test)]
pub(crate) mod testutil;

pub use finder::{ClassFinder, FinderConfig};
pub use index::ClassIndex;
pub use location::{Location, LocationKind, LocationSet};
pub use record::{ClassRecord, FlagSet};
