//! The scanning façade: locations in, a class index and filtered names out.

use rayon::prelude::*;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::filter::{ClassFilter, NameFilter};
use crate::hierarchy::Hierarchy;
use crate::index::ClassIndex;
use crate::location::{CLASS_PATH_ENV, Location, LocationSet};
use crate::record::ClassRecord;
use crate::resolve::{ResolutionContext, ResolutionContextBuilder};
use crate::scan::{CancellationToken, LocationScan, scan_location};

#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Scan locations on the rayon pool. Results are merged in insertion
    /// order either way.
    pub parallel: bool,
    pub cancel: CancellationToken,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ClassFinder {
    locations: LocationSet,
    index: ClassIndex,
    config: FinderConfig,
}

impl ClassFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FinderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        self.locations.add(path)
    }

    pub fn add_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.locations.add_all(paths)
    }

    pub fn add_class_path(&mut self, value: &OsStr) -> usize {
        self.locations.add_class_path(value)
    }

    /// Adds the roots listed in `CLASSPATH`, if set.
    pub fn add_class_path_from_env(&mut self) -> usize {
        std::env::var_os(CLASS_PATH_ENV)
            .map(|value| self.add_class_path(&value))
            .unwrap_or(0)
    }

    pub fn add_archives_under(&mut self, root: &Path) -> anyhow::Result<usize> {
        self.locations.add_archives_under(root)
    }

    /// Forgets all locations. The index keeps the last scan's results until
    /// the next scan.
    pub fn clear(&mut self) {
        self.locations.clear();
    }

    pub fn locations(&self) -> &LocationSet {
        &self.locations
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    /// Rebuilds the index from every location and reports the distinct class
    /// names accepted by `filter` (all of them without one), in name order.
    /// Returns how many names were reported.
    pub fn scan<C>(&mut self, names: &mut C, filter: Option<&dyn NameFilter>) -> usize
    where
        C: Extend<String>,
    {
        self.rebuild_index();

        let accepted: BTreeSet<&str> = self
            .index
            .names()
            .filter(|name| filter.is_none_or(|f| f.accept(name)))
            .collect();
        let count = accepted.len();
        names.extend(accepted.into_iter().map(str::to_string));
        count
    }

    /// Rebuilds the index, then reports the records accepted by `filter`, in
    /// name order.
    pub fn find_classes<C>(&mut self, classes: &mut C, filter: Option<&dyn ClassFilter>) -> usize
    where
        C: Extend<ClassRecord>,
    {
        self.rebuild_index();
        self.select(classes, filter)
    }

    /// Applies `filter` to the current index without scanning again.
    pub fn select<C>(&self, classes: &mut C, filter: Option<&dyn ClassFilter>) -> usize
    where
        C: Extend<ClassRecord>,
    {
        let selected: Vec<ClassRecord> = self
            .index
            .sorted()
            .into_iter()
            .filter(|class| filter.is_none_or(|f| f.accept(class, &self.index)))
            .cloned()
            .collect();
        let count = selected.len();
        classes.extend(selected);
        count
    }

    /// Indexed superclasses of `class_name`, nearest first. Empty if the class
    /// itself is not indexed.
    pub fn resolve_ancestors(&self, class_name: &str) -> Vec<&ClassRecord> {
        self.index
            .get(class_name)
            .map(|start| Hierarchy::new(&self.index).find_all_super_classes(start))
            .unwrap_or_default()
    }

    /// Indexed interfaces of `class_name`, breadth first. Empty if the class
    /// itself is not indexed.
    pub fn resolve_interfaces(&self, class_name: &str) -> Vec<&ClassRecord> {
        self.index
            .get(class_name)
            .map(|start| Hierarchy::new(&self.index).find_all_interfaces(start))
            .unwrap_or_default()
    }

    /// A resolution context over this finder's locations.
    pub fn resolution_context(&self, parent: Option<Arc<ResolutionContext>>) -> ResolutionContext {
        ResolutionContextBuilder::from_locations(&self.locations).build(parent)
    }

    /// Rebuilds the index from every location without reporting anything.
    /// Returns the number of indexed classes.
    pub fn rebuild_index(&mut self) -> usize {
        let cancel = &self.config.cancel;
        let locations = self.locations.as_slice();
        let scans: Vec<Option<LocationScan>> = if self.config.parallel {
            locations
                .par_iter()
                .map(|location| scan_one(location, cancel))
                .collect()
        } else {
            locations
                .iter()
                .map(|location| scan_one(location, cancel))
                .collect()
        };

        self.index.clear();
        for scan in scans.into_iter().flatten() {
            for record in scan.records {
                if let Some(previous) = self.index.insert(record) {
                    debug!(
                        class = %previous.name,
                        replaced = %previous.origin.path.display(),
                        "class found again in a later location"
                    );
                }
            }
        }
        info!(
            locations = locations.len(),
            classes = self.index.len(),
            "scan finished"
        );
        self.index.len()
    }
}

fn scan_one(location: &Location, cancel: &CancellationToken) -> Option<LocationScan> {
    if cancel.is_cancelled() {
        debug!(location = %location.path.display(), "scan cancelled before location");
        return None;
    }
    match scan_location(location, cancel) {
        Ok(scan) => {
            debug!(
                location = %location.path.display(),
                classes = scan.records.len(),
                candidates = scan.candidates,
                skipped = scan.skipped,
                "location scanned"
            );
            if scan.cancelled {
                info!(location = %location.path.display(), "scan cancelled inside location");
            }
            Some(scan)
        }
        Err(e) => {
            warn!(location = %location.path.display(), error = %format!("{e:#}"), "skipping unreadable location");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AcceptAll, ModifiersFilter, MultiRegexFilter, OrNameFilter, RegexFilter, SubclassFilter};
    use crate::record::FlagSet;
    use crate::testutil::{ClassBytes, write_class_dir, write_jar};
    use tempfile::tempdir;

    fn fixture(root: &Path) -> anyhow::Result<(std::path::PathBuf, std::path::PathBuf)> {
        let jar = root.join("lib.jar");
        write_jar(
            &jar,
            &[
                ("app/Base.class", &ClassBytes::new("app/Base").access(0x0421).build()),
                ("app/A.class", &ClassBytes::new("app/A").extends("app/Base").build()),
                (
                    "app/B.class",
                    &ClassBytes::new("app/B").extends("app/A").implements("app/Api").build(),
                ),
                ("app/Api.class", &ClassBytes::new("app/Api").access(0x0601).build()),
            ],
        )?;
        let classes = root.join("classes");
        write_class_dir(
            &classes,
            &[
                ("test/TestFoo.class", &ClassBytes::new("test/TestFoo").build()),
                ("test/Bar.class", &ClassBytes::new("test/Bar").extends("app/B").build()),
            ],
        )?;
        Ok((jar, classes))
    }

    fn scan_names(finder: &mut ClassFinder, filter: Option<&dyn NameFilter>) -> Vec<String> {
        let mut names = Vec::new();
        finder.scan(&mut names, filter);
        names
    }

    #[test]
    fn scan_reports_every_class_without_filter() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        assert_eq!(finder.add_all([&jar, &classes]), 2);

        let mut names = Vec::new();
        assert_eq!(finder.scan(&mut names, None), 6);
        assert_eq!(
            names,
            vec!["app.A", "app.Api", "app.B", "app.Base", "test.Bar", "test.TestFoo"]
        );
        Ok(())
    }

    #[test]
    fn filtered_scan_is_a_subset() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&jar);
        finder.add(&classes);

        let all = scan_names(&mut finder, Some(&AcceptAll));
        let filter = MultiRegexFilter::new(Vec::<&str>::new(), ["^test\\.Test"])?;
        let some = scan_names(&mut finder, Some(&filter));

        assert!(some.iter().all(|n| all.contains(n)));
        assert!(some.iter().all(|n| NameFilter::accept(&filter, n)));
        assert!(!some.contains(&"test.TestFoo".to_string()));
        assert!(some.contains(&"test.Bar".to_string()));
        // The index still holds everything for hierarchy queries.
        assert_eq!(finder.index().len(), all.len());
        Ok(())
    }

    #[test]
    fn empty_name_level_or_accepts_everything() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, _) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&jar);
        let or = OrNameFilter::new();
        assert_eq!(scan_names(&mut finder, Some(&or)).len(), 4);
        Ok(())
    }

    #[test]
    fn unreadable_locations_are_skipped() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let broken = tmp.path().join("broken.jar");
        std::fs::write(&broken, b"not a zip")?;

        let mut finder = ClassFinder::new();
        finder.add(&broken);
        finder.add(&jar);
        finder.add(&classes);
        assert_eq!(finder.locations().len(), 3);

        let names = scan_names(&mut finder, None);
        assert_eq!(names.len(), 6);
        Ok(())
    }

    #[test]
    fn directory_removed_after_add_is_skipped() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&classes);
        finder.add(&jar);
        std::fs::remove_dir_all(&classes)?;

        let names = scan_names(&mut finder, None);
        assert_eq!(names, vec!["app.A", "app.Api", "app.B", "app.Base"]);
        Ok(())
    }

    #[test]
    fn rescanning_is_idempotent() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&jar);
        finder.add(&classes);

        scan_names(&mut finder, None);
        let first = finder.index().clone();
        scan_names(&mut finder, None);
        assert_eq!(&first, finder.index());
        Ok(())
    }

    #[test]
    fn later_location_wins_on_name_collision() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let first = tmp.path().join("first.jar");
        let second = tmp.path().join("second");
        write_jar(
            &first,
            &[("pkg/Foo.class", &ClassBytes::new("pkg/Foo").extends("pkg/One").build())],
        )?;
        write_class_dir(
            &second,
            &[("pkg/Foo.class", &ClassBytes::new("pkg/Foo").extends("pkg/Two").build())],
        )?;

        for parallel in [true, false] {
            let mut finder = ClassFinder::with_config(FinderConfig {
                parallel,
                ..FinderConfig::default()
            });
            finder.add(&first);
            finder.add(&second);

            let mut classes = Vec::new();
            let filter = RegexFilter::new("^pkg\\.Foo$")?;
            assert_eq!(finder.find_classes(&mut classes, Some(&filter)), 1);
            assert_eq!(classes[0].superclass_name.as_deref(), Some("pkg.Two"));
            assert_eq!(classes[0].origin.path, std::fs::canonicalize(&second)?);
        }
        Ok(())
    }

    #[test]
    fn find_classes_by_subclass_and_modifiers() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&jar);
        finder.add(&classes);

        let mut subclasses = Vec::new();
        finder.find_classes(&mut subclasses, Some(&SubclassFilter::new("app.Base")));
        let names: Vec<&str> = subclasses.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["app.A", "app.B", "test.Bar"]);

        let mut abstracts = Vec::new();
        finder.select(&mut abstracts, Some(&ModifiersFilter::new(FlagSet::ABSTRACT)));
        let names: Vec<&str> = abstracts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["app.Api", "app.Base"]);

        let mut implementors = Vec::new();
        finder.select(&mut implementors, Some(&SubclassFilter::new("app.Api")));
        assert_eq!(implementors.len(), 2);
        Ok(())
    }

    #[test]
    fn ancestors_and_interfaces_by_name() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let mut finder = ClassFinder::new();
        finder.add(&jar);
        finder.add(&classes);
        scan_names(&mut finder, None);

        let ancestors: Vec<&str> = finder
            .resolve_ancestors("test.Bar")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(ancestors, vec!["app.B", "app.A", "app.Base"]);

        let interfaces: Vec<&str> = finder
            .resolve_interfaces("test.Bar")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(interfaces, vec!["app.Api"]);

        assert!(finder.resolve_ancestors("no.Such").is_empty());
        Ok(())
    }

    #[test]
    fn cancelled_scan_yields_empty_index() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let (jar, classes) = fixture(tmp.path())?;
        let config = FinderConfig::default();
        let mut finder = ClassFinder::with_config(config.clone());
        finder.add(&jar);
        finder.add(&classes);

        config.cancel.cancel();
        assert_eq!(scan_names(&mut finder, None).len(), 0);
        assert!(finder.index().is_empty());
        Ok(())
    }

    #[test]
    fn modifiers_filter_resolves_nested_class_flags() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let jar = tmp.path().join("nested.jar");
        write_jar(
            &jar,
            &[
                ("n/Outer.class", &ClassBytes::new("n/Outer").build()),
                (
                    "n/Outer$Static.class",
                    &ClassBytes::new("n/Outer$Static")
                        .access(0x0020)
                        .inner_class("n/Outer$Static", Some("n/Outer"), Some("Static"), 0x0008)
                        .build(),
                ),
                (
                    "n/Outer$Plain.class",
                    &ClassBytes::new("n/Outer$Plain")
                        .access(0x0020)
                        .inner_class("n/Outer$Plain", Some("n/Outer"), Some("Plain"), 0x0000)
                        .build(),
                ),
            ],
        )?;

        let mut finder = ClassFinder::new();
        finder.add(&jar);
        scan_names(&mut finder, None);

        let header_only = ModifiersFilter::new(FlagSet::STATIC);
        let mut found = Vec::new();
        assert_eq!(finder.select(&mut found, Some(&header_only)), 0);

        let context = Arc::new(finder.resolution_context(Some(Arc::new(ResolutionContext::new(
            Vec::new(),
            None,
        )))));
        let resolving = ModifiersFilter::new(FlagSet::STATIC).with_resolution(context);
        let mut found = Vec::new();
        assert_eq!(finder.select(&mut found, Some(&resolving)), 1);
        assert_eq!(found[0].name, "n.Outer$Static");
        Ok(())
    }

    #[test]
    fn nested_flags_come_from_the_indexed_copy() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let static_jar = tmp.path().join("first.jar");
        let plain_dir = tmp.path().join("second");
        write_jar(
            &static_jar,
            &[(
                "n/Outer$In.class",
                &ClassBytes::new("n/Outer$In")
                    .access(0x0020)
                    .inner_class("n/Outer$In", Some("n/Outer"), Some("In"), 0x0008)
                    .build(),
            )],
        )?;
        write_class_dir(
            &plain_dir,
            &[(
                "n/Outer$In.class",
                &ClassBytes::new("n/Outer$In")
                    .access(0x0020)
                    .inner_class("n/Outer$In", Some("n/Outer"), Some("In"), 0x0000)
                    .build(),
            )],
        )?;

        let empty_parent = || Some(Arc::new(ResolutionContext::new(Vec::new(), None)));
        for (order, expected) in [([&static_jar, &plain_dir], 0), ([&plain_dir, &static_jar], 1)] {
            let mut finder = ClassFinder::new();
            finder.add_all(order);
            scan_names(&mut finder, None);

            let context = Arc::new(finder.resolution_context(empty_parent()));
            let filter = ModifiersFilter::new(FlagSet::STATIC).with_resolution(context);
            let mut found = Vec::new();
            assert_eq!(finder.select(&mut found, Some(&filter)), expected);
        }
        Ok(())
    }
}
