use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::zip::ConsumePolicy;

/// How composite locations name an archive and an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutKind {
    /// `<archive>!/<entry>`
    Nested,
    /// `https://github.com/<owner>/<repo>/blob/<ref>/<path>`
    Github,
}

#[derive(Parser, Debug)]
#[command(name = "streamzip")]
#[command(version)]
#[command(about = "Extract single files from streamed ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  streamzip 'pack.zip!/mods/a.toml' 'pack.zip!/index.toml'   extract two files, scanning pack.zip once\n  \
  streamzip -p 'https://example.com/p.zip!/pack.toml'        stream a remote archive, print one file\n  \
  streamzip --find '*.pw.toml' -d out 'pack.zip!/'            extract the first matching file\n  \
  streamzip --layout github https://github.com/o/r/blob/main/pack.toml")]
pub struct Cli {
    /// Composite locations of the files to extract
    #[arg(value_name = "LOCATION", required = true)]
    pub locations: Vec<String>,

    /// Location layout
    #[arg(long, value_enum, default_value_t = LayoutKind::Nested, env = "STREAMZIP_LAYOUT")]
    pub layout: LayoutKind,

    /// Nested archives wrap all entries in one top-level folder
    #[arg(long)]
    pub root_folder: bool,

    /// Resolve local archive paths against DIR
    #[arg(short = 'C', long, value_name = "DIR", env = "STREAMZIP_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Extract the first entry matching PATTERN (`*`, `?`) from each location's archive
    #[arg(long, value_name = "PATTERN")]
    pub find: Option<String>,

    /// Keep extracted entries cached so repeated locations succeed
    #[arg(long)]
    pub retain: bool,

    /// Number of locations fetched concurrently
    #[arg(short = 't', long, default_value_t = 4, env = "STREAMZIP_THREADS",
          value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Attempts for remote archives on connection errors
    #[arg(long, default_value_t = 10)]
    pub retries: u32,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// More log output (-vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn consume_policy(&self) -> ConsumePolicy {
        if self.retain {
            ConsumePolicy::Retain
        } else {
            ConsumePolicy::HandOff
        }
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            return "off";
        }
        match self.verbose {
            0 if self.quiet > 0 => "error",
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
