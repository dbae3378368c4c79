use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, NameArgs};
use crate::filter::{
    AndClassFilter, ByName, ModifiersFilter, MultiRegexFilter, SubclassFilter, concrete_classes,
    interfaces_only,
};
use crate::finder::{ClassFinder, FinderConfig};
use crate::record::FlagSet;
use crate::resolve::ResolutionContext;

pub fn init_logging(verbose: bool) {
    let env_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("class_scan=debug")
    } else {
        EnvFilter::new("class_scan=info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn default_m2_repository() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve home directory"))?;
    Ok(home.join(".m2").join("repository"))
}

pub fn resolve_m2_repo(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.m2_repo.clone() {
        return Ok(p);
    }
    default_m2_repository()
}

/// A finder over every location the command line names. Paths that cannot be
/// scanned are reported and left out.
pub fn build_finder(cli: &Cli) -> Result<ClassFinder> {
    let mut finder = ClassFinder::with_config(FinderConfig {
        parallel: !cli.serial,
        ..FinderConfig::default()
    });

    for path in cli.jars.iter().chain(cli.dirs.iter()) {
        if !finder.add(path) {
            warn!(path = %path.display(), "ignoring location that is not a readable archive or directory");
        }
    }
    if cli.classpath {
        finder.add_class_path_from_env();
    }
    if cli.m2 {
        let repo = resolve_m2_repo(cli)?;
        finder
            .add_archives_under(&repo)
            .with_context(|| format!("Failed to scan Maven repository: {}", repo.display()))?;
    }

    if finder.locations().is_empty() {
        anyhow::bail!("No scannable locations given (use --jar, --dir, --classpath or --m2)");
    }
    Ok(finder)
}

pub fn name_filter(args: &NameArgs) -> Result<MultiRegexFilter> {
    MultiRegexFilter::new(&args.include, &args.exclude).context("Invalid --include/--exclude pattern")
}

pub struct FindOptions<'a> {
    pub names: &'a NameArgs,
    pub subclass_of: Option<&'a str>,
    pub modifiers: Option<&'a str>,
    pub interfaces_only: bool,
    pub concrete: bool,
    pub resolution: Option<Arc<ResolutionContext>>,
}

pub fn class_filter(options: FindOptions<'_>) -> Result<AndClassFilter> {
    let mut filter = AndClassFilter::new().with(ByName(name_filter(options.names)?));

    if let Some(base) = options.subclass_of {
        filter.add_filter(SubclassFilter::new(base));
    }
    if let Some(raw) = options.modifiers {
        let mask: FlagSet = raw
            .parse()
            .with_context(|| format!("Invalid --modifiers value: {raw}"))?;
        let mut modifiers = ModifiersFilter::new(mask);
        if let Some(context) = options.resolution {
            modifiers = modifiers.with_resolution(context);
        }
        filter.add_filter(modifiers);
    }
    if options.interfaces_only {
        filter.add_filter(interfaces_only());
    }
    if options.concrete {
        filter.add_filter(concrete_classes());
    }
    Ok(filter)
}
