use anyhow::{Context, Result};
use clap::Parser;
use class_scan::cli::{Cli, Commands, OutputFormat};
use class_scan::config::{FindOptions, build_finder, class_filter, init_logging, name_filter};
use class_scan::filter::{ClassFilter, NameFilter};
use class_scan::hierarchy::Hierarchy;
use class_scan::record::ClassRecord;
use class_scan::resolve::{ResolvedClass, location_uri};
use class_scan::scan::entry_name_to_class_name;
use class_scan::{ClassFinder, LocationKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut finder = build_finder(&cli)?;
    let format = cli.format;

    match cli.command {
        Commands::Scan { names } => {
            let filter = name_filter(&names)?;
            let start = Instant::now();
            let mut found: Vec<String> = Vec::new();
            let count = finder.scan(&mut found, Some(&filter as &dyn NameFilter));
            write_output(
                &ScanResult {
                    locations: finder.locations().len(),
                    indexed: finder.index().len(),
                    count,
                    duration_ms: start.elapsed().as_millis() as u64,
                    names: found,
                },
                format,
            )?;
        }
        Commands::Find {
            names,
            subclass_of,
            modifiers,
            interfaces_only,
            concrete,
            resolve_nested,
        } => {
            let resolution = resolve_nested.then(|| Arc::new(finder.resolution_context(None)));
            let filter = class_filter(FindOptions {
                names: &names,
                subclass_of: subclass_of.as_deref(),
                modifiers: modifiers.as_deref(),
                interfaces_only,
                concrete,
                resolution,
            })?;
            let start = Instant::now();
            let mut classes: Vec<ClassRecord> = Vec::new();
            let count = finder.find_classes(&mut classes, Some(&filter as &dyn ClassFilter));
            write_output(
                &FindResult {
                    count,
                    duration_ms: start.elapsed().as_millis() as u64,
                    classes,
                },
                format,
            )?;
        }
        Commands::Ancestors { class_name } => {
            let class_name = normalize_class_name(&class_name);
            finder.rebuild_index();
            let start = indexed_class(&finder, &class_name)?;
            let chain = Hierarchy::new(finder.index())
                .superclass_chain(start)
                .into_iter()
                .map(|a| TypeLink::new(a.name, a.record))
                .collect();
            write_output(&HierarchyResult { class_name, types: chain }, format)?;
        }
        Commands::Interfaces { class_name } => {
            let class_name = normalize_class_name(&class_name);
            finder.rebuild_index();
            let start = indexed_class(&finder, &class_name)?;
            let closure = Hierarchy::new(finder.index())
                .interface_closure(start)
                .into_iter()
                .map(|a| TypeLink::new(a.name, a.record))
                .collect();
            write_output(&HierarchyResult { class_name, types: closure }, format)?;
        }
        Commands::Resolve { class_name } => {
            let class_name = normalize_class_name(&class_name);
            let context = finder.resolution_context(None);
            let resolved = context
                .resolve(&class_name)
                .with_context(|| format!("Class not found: {class_name}"))?;
            write_output(&*resolved, format)?;
        }
        Commands::Locations => {
            let locations: Vec<LocationEntry> = finder
                .locations()
                .iter()
                .map(|l| LocationEntry {
                    path: l.path.to_string_lossy().to_string(),
                    kind: l.kind,
                    uri: location_uri(l),
                })
                .collect();
            write_output(&locations, format)?;
        }
    }

    Ok(())
}

fn indexed_class<'a>(finder: &'a ClassFinder, class_name: &str) -> Result<&'a ClassRecord> {
    finder.index().get(class_name).with_context(|| {
        format!(
            "Class not indexed: {class_name} (scanned {} locations)",
            finder.locations().len()
        )
    })
}

/// Qualified name from whatever the user pasted: `a.b.C`, an import line,
/// an internal name (`a/b/C`) or an entry path (`a/b/C.class`).
fn normalize_class_name(raw: &str) -> String {
    let line = raw.trim().trim_end_matches(';');
    let line = line.strip_prefix("import ").unwrap_or(line);
    let compact: String = line.split_whitespace().collect();
    entry_name_to_class_name(&compact).unwrap_or_else(|| compact.replace('/', "."))
}

#[derive(Debug, Serialize)]
struct ScanResult {
    locations: usize,
    indexed: usize,
    count: usize,
    duration_ms: u64,
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FindResult {
    count: usize,
    duration_ms: u64,
    classes: Vec<ClassRecord>,
}

#[derive(Debug, Serialize)]
struct TypeLink {
    name: String,
    indexed: bool,
    location: Option<String>,
}

impl TypeLink {
    fn new(name: String, record: Option<&ClassRecord>) -> Self {
        Self {
            name,
            indexed: record.is_some(),
            location: record.map(|r| r.origin.path.to_string_lossy().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct HierarchyResult {
    class_name: String,
    types: Vec<TypeLink>,
}

#[derive(Debug, Serialize)]
struct LocationEntry {
    path: String,
    kind: LocationKind,
    uri: String,
}

trait TextOutput {
    fn to_text(&self) -> String;
}

impl TextOutput for ScanResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for name in &self.names {
            out.push_str(name);
            out.push('\n');
        }
        out
    }
}

impl TextOutput for FindResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for class in &self.classes {
            out.push_str(&format!("{} [{}]", class.name, class.flags));
            if let Some(parent) = &class.superclass_name {
                out.push_str(&format!(" extends {parent}"));
            }
            if !class.interface_names.is_empty() {
                out.push_str(&format!(" implements {}", class.interface_names.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}

impl TextOutput for HierarchyResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for link in &self.types {
            match &link.location {
                Some(location) => out.push_str(&format!("{} ({location})\n", link.name)),
                None => out.push_str(&format!("{} (not indexed)\n", link.name)),
            }
        }
        out
    }
}

impl TextOutput for ResolvedClass {
    fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("name: {}\n", self.record.name));
        out.push_str(&format!("flags: {}\n", self.declared_flags));
        if let Some(outer) = &self.outer_class {
            out.push_str(&format!("outer_class: {outer}\n"));
        }
        if let Some(parent) = &self.record.superclass_name {
            out.push_str(&format!("superclass: {parent}\n"));
        }
        for interface in &self.record.interface_names {
            out.push_str(&format!("interface: {interface}\n"));
        }
        if let Some(source) = &self.source_file {
            out.push_str(&format!("source_file: {source}\n"));
        }
        out.push_str(&format!("major_version: {}\n", self.major_version));
        out.push_str(&format!("fields: {}, methods: {}\n", self.field_count, self.method_count));
        out.push_str(&format!("location: {}\n", self.record.origin.path.display()));
        out
    }
}

impl TextOutput for Vec<LocationEntry> {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in self {
            out.push_str(&format!("{}\t{}\n", entry.kind_label(), entry.uri));
        }
        out
    }
}

impl LocationEntry {
    fn kind_label(&self) -> &'static str {
        match self.kind {
            LocationKind::Archive => "archive",
            LocationKind::Directory => "directory",
        }
    }
}

fn write_output<T: Serialize + TextOutput + ?Sized>(result: &T, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => result.to_text(),
    };
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
