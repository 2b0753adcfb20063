//! dvml cli interface

use clap::{ArgGroup, Parser, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["dir", "file"])))]
pub struct Cli {
    /// Load every .hcl file below this directory
    ///
    /// Files are loaded recursively, sorted by path.
    #[clap(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Load a single file
    ///
    /// Loaded after the files of --dir.
    #[clap(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Attribute specs for target blocks
    ///
    /// Replaces the built-in specs (`hub`). Expects `kind "<name>" { attribute "<name>" { ... } }` blocks.
    #[clap(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,

    /// Add the decoded model to the output
    #[clap(long)]
    pub tree: bool,

    /// Log at debug level, ignores DVML_LOG
    #[clap(long)]
    pub debug: bool,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
