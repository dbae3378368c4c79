use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-scan")]
#[command(about = "Find Java classes in jars and class directories by reading their headers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Archive to scan (.jar or .zip); repeatable
    #[arg(long = "jar", value_name = "FILE", global = true)]
    pub jars: Vec<PathBuf>,

    /// Directory of class files to scan; repeatable
    #[arg(long = "dir", value_name = "DIR", global = true)]
    pub dirs: Vec<PathBuf>,

    /// Also scan the entries of the CLASSPATH environment variable
    #[arg(long, global = true)]
    pub classpath: bool,

    /// Also scan every jar in the local Maven repository
    #[arg(long, global = true)]
    pub m2: bool,

    /// Maven repository used by --m2 (default: ~/.m2/repository)
    #[arg(long, value_name = "DIR", global = true)]
    pub m2_repo: Option<PathBuf>,

    /// Scan locations one after another instead of in parallel
    #[arg(long, global = true)]
    pub serial: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct NameArgs {
    /// Only report names matching this regex (substring search); repeatable
    #[arg(long, value_name = "REGEX")]
    pub include: Vec<String>,

    /// Drop names matching this regex (substring search); repeatable
    #[arg(long, value_name = "REGEX")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List class names found in the locations
    Scan {
        #[command(flatten)]
        names: NameArgs,
    },
    /// List class records selected by name, supertype and flags
    Find {
        #[command(flatten)]
        names: NameArgs,

        /// Only classes extending or implementing this class
        #[arg(long, value_name = "CLASS")]
        subclass_of: Option<String>,

        /// Only classes with any of these flags, e.g. `public,final`
        #[arg(long, value_name = "FLAGS")]
        modifiers: Option<String>,

        #[arg(long, conflicts_with = "concrete")]
        interfaces_only: bool,

        /// Only non-abstract, non-interface classes
        #[arg(long)]
        concrete: bool,

        /// Check nested class modifiers against their declaring class file
        #[arg(long)]
        resolve_nested: bool,
    },
    /// Indexed superclasses of a class, nearest first
    Ancestors { class_name: String },
    /// Indexed interfaces of a class
    Interfaces { class_name: String },
    /// Read a class file in full, including nested class modifiers
    Resolve { class_name: String },
    /// Show the accepted locations and their search URIs
    Locations,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
