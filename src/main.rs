//! Main entry point for the streamzip CLI application.
//!
//! Extracts single files out of local or remote ZIP archives, given as
//! composite locations such as `pack.zip!/mods/a.toml`. Locations that share
//! an archive share one forward scan of it.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::Parser;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use streamzip::cli::LayoutKind;
use streamzip::{
    ArchiveLayout, ArchiveRegistry, Cli, EntryPath, GithubBlobLayout, HttpSource, LocalFileSource,
    NestedPathLayout, RoutingSource,
};

type Registry<L> = ArchiveRegistry<RoutingSource, L>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Arc::new(Cli::parse());
    init_tracing(&cli);

    let local = match &cli.base_dir {
        Some(dir) => LocalFileSource::with_base_dir(dir),
        None => LocalFileSource::new(),
    };
    let http = HttpSource::new(Handle::current())?.with_max_retry(cli.retries);
    let source = RoutingSource::new(local, Some(http));

    let failures = match cli.layout {
        LayoutKind::Nested => {
            let layout = NestedPathLayout::new(cli.root_folder);
            process_locations(source, layout, cli.clone()).await?
        }
        LayoutKind::Github => process_locations(source, GithubBlobLayout, cli.clone()).await?,
    };

    if failures > 0 {
        bail!("{failures} of {} locations failed", cli.locations.len());
    }
    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamzip={}", cli.log_filter())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Fetch every location concurrently and write it out.
///
/// Returns the number of locations that could not be extracted.
async fn process_locations<L>(source: RoutingSource, layout: L, cli: Arc<Cli>) -> Result<usize>
where
    L: ArchiveLayout + 'static,
{
    let registry = Arc::new(ArchiveRegistry::new(source, layout).with_policy(cli.consume_policy()));
    let permits = Arc::new(Semaphore::new(cli.threads as usize));

    let mut tasks = Vec::with_capacity(cli.locations.len());
    for location in cli.locations.iter().cloned() {
        let registry = registry.clone();
        let permits = permits.clone();
        let cli = cli.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let fetched = {
                let location = location.clone();
                let find = cli.find.clone();
                tokio::task::spawn_blocking(move || fetch_one(&registry, &location, find.as_deref()))
                    .await??
            };
            anyhow::Ok((location, fetched))
        }));
    }

    // Write out in argument order
    let multiple_files = cli.pipe && cli.locations.len() > 1;
    let mut failures = 0;
    for task in tasks {
        match task.await? {
            Ok((_, Some((name, data)))) => {
                if let Err(e) = write_entry(&name, data, &cli, multiple_files).await {
                    error!(entry = %name, "{e:#}");
                    failures += 1;
                }
            }
            Ok((location, None)) => {
                error!(%location, "entry not found");
                failures += 1;
            }
            Err(e) => {
                error!("{e:#}");
                failures += 1;
            }
        }
    }

    if !cli.is_quiet() {
        if let Some(http) = registry.source().http() {
            let transferred = http.transferred_bytes();
            if transferred > 0 {
                eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
            }
        }
    }

    Ok(failures)
}

/// Resolve one location to its entry name and content. Blocks.
fn fetch_one<L: ArchiveLayout>(
    registry: &Registry<L>,
    location: &str,
    find: Option<&str>,
) -> Result<Option<(EntryPath, Bytes)>> {
    let layout = registry.layout();
    let archive = layout
        .archive_of(location)
        .with_context(|| format!("{location}: not a {} location", layout.name()))?;

    let entry = match find {
        Some(pattern) => {
            let found = registry.find_in_archive(location, |path| {
                !path.is_dir() && glob_match(pattern, path.as_str())
            })?;
            match found {
                Some(entry) => entry,
                None => return Ok(None),
            }
        }
        None => layout
            .entry_within_archive_of(location)
            .with_context(|| format!("{location}: no entry path"))?,
    };

    debug!(%archive, %entry, "fetching");
    let data = registry
        .get_archive_entry(&archive, &entry)
        .with_context(|| format!("{location}: extraction failed"))?;
    Ok(data.map(|data| (entry, data)))
}

/// Write a single extracted entry.
///
/// Handles various extraction options:
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
async fn write_entry(entry: &EntryPath, data: Bytes, cli: &Cli, show_filename: bool) -> Result<()> {
    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_filename {
            stdout
                .write_all(format!("--- {entry} ---\n").as_bytes())
                .await?;
        }
        stdout.write_all(&data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    if entry.is_dir() {
        bail!("{entry} is a directory");
    }

    let name = if cli.junk_paths {
        entry.file_name()
    } else {
        entry.as_str()
    };
    let relative = safe_relative_path(name)
        .with_context(|| format!("refusing to write outside the target directory: {entry}"))?;
    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(relative),
        None => relative,
    };

    if tokio::fs::try_exists(&output_path).await? {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {entry} (file exists)");
            }
            return Ok(());
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {entry} (use -o to overwrite)");
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {entry}");
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&output_path, &data)
        .await
        .with_context(|| format!("writing {}", output_path.display()))?;

    Ok(())
}

/// Entry path as a relative filesystem path, or `None` if it would escape.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        return None;
    }
    Some(out)
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters, including `/`
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern, &text)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
