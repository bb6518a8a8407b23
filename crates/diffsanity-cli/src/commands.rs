use clap::{Args, Parser, Subcommand};
use diffsanity_core::HashAlgorithm;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "diffsanity")]
#[command(about = "Verify that a backup holds every file of a source tree", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to Config.toml in the working directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that all content under SOURCE is present somewhere under BACKUP
    Check(CheckArgs),
    /// Hash a directory and refresh its manifest
    Hash(HashArgs),
    /// Print the version
    Version,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Hash algorithm
    #[arg(long)]
    pub algorithm: Option<HashAlgorithm>,

    /// Ignore existing filehash.sum manifests
    #[arg(long)]
    pub no_cache: bool,

    /// Do not rewrite filehash.sum after scanning
    #[arg(long)]
    pub no_rewrite_cache: bool,

    /// Glob of relative paths to leave out (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    pub source: PathBuf,
    pub backup: PathBuf,

    #[command(flatten)]
    pub cache: CacheArgs,

    /// Leave camera raw files out of both scans
    #[arg(long)]
    pub skip_raw: bool,

    /// Verify only this fraction of source files, in (0, 1]
    #[arg(long, value_name = "F")]
    pub sample_rate: Option<f64>,

    /// Write absolute paths of missing source files to FILE
    #[arg(long, value_name = "FILE")]
    pub missing_list: Option<PathBuf>,

    /// Scan source and backup one after the other
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    pub dir: PathBuf,

    #[command(flatten)]
    pub cache: CacheArgs,
}
