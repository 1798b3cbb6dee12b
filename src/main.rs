use altformat::config::EngineConfig;
use altformat::format::TargetFormat;
use altformat::jobs::{self, JobQueue, MemoryQueue};
use altformat::purge;
use altformat::source::SourceImage;
use altformat::storage::FsStorage;
use altformat::transformer::{TransformOutcome, Transformer};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Shared flags for commands that produce derivatives.
#[derive(clap::Args, Clone)]
struct ConvertArgs {
    /// Replace existing derivatives instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Restrict to one format (default: every enabled format)
    #[arg(long, value_enum)]
    format: Option<TargetFormat>,

    /// Also produce a thumbnail derivative at this width
    #[arg(long)]
    width: Option<u32>,
}

#[derive(Parser)]
#[command(name = "altformat")]
#[command(about = "AVIF/WebP derivative engine for image repositories")]
#[command(long_about = "\
AVIF/WebP derivative engine for image repositories

Originals stay untouched; derivatives are written into per-format sibling
trees under the repository root:

  repo/
  ├── avif/2024/photo.avif           # full-resolution derivatives
  ├── webp/2024/photo.webp
  └── thumb/
      ├── avif/2024/320px-photo.avif # thumbnail derivatives
      └── webp/2024/320px-photo.webp

Encoding falls back through three backends per format: an external encoder
binary (avifenc/cwebp), the built-in imaging pipeline, and direct codec
bindings. Whichever is available first on this host wins.

Run 'altformat gen-config' to print a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding the original images
    #[arg(long, default_value = "originals", global = true)]
    sources: PathBuf,

    /// Derivative repository root
    #[arg(long, default_value = "derivatives", global = true)]
    repo: PathBuf,

    /// Engine config file (missing file means defaults)
    #[arg(long, default_value = "altformat.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce derivatives for one source image
    Convert {
        /// Source path relative to --sources
        rel_path: String,

        #[command(flatten)]
        args: ConvertArgs,
    },
    /// Produce derivatives for every supported image under --sources
    Batch(ConvertArgs),
    /// Remove the derivatives of a deleted source
    Purge {
        /// Source path relative to --sources
        rel_path: String,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("altformat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(&cli.config)?;
    let storage = FsStorage::new(&cli.repo);

    match cli.command {
        Command::Convert { rel_path, args } => {
            let local = cli.sources.join(&rel_path);
            let Some(source) = SourceImage::from_local(&rel_path, local) else {
                return Err(format!("unsupported source type: {rel_path}").into());
            };
            let mut failures = 0usize;
            for format in enabled_formats(&config, args.format) {
                let transformer = Transformer::new(format, &config, &storage);
                if !transformer.can_transform(&source) {
                    println!("{format}: skipped ({rel_path} not convertible on this host)");
                    continue;
                }
                let outcome = transformer.transform_original(&source, args.overwrite);
                failures += report_outcome(format, &outcome);
                if let Some(w) = args.width {
                    let outcome = transformer.transform_thumbnail(&source, w, args.overwrite);
                    failures += report_outcome(format, &outcome);
                }
            }
            if failures > 0 {
                return Err(format!("{failures} transform(s) failed").into());
            }
        }
        Command::Batch(args) => {
            let sources = collect_sources(&cli.sources)?;
            let formats = enabled_formats(&config, args.format);
            // Unconvertible (source, format) pairs are dropped at planning
            // time, never queued or failed.
            let planned = jobs::plan(
                &config,
                &storage,
                &sources,
                &formats,
                args.width,
                args.overwrite,
            );
            println!(
                "==> Converting {} source(s) under {} ({} transform(s))",
                sources.len(),
                cli.sources.display(),
                planned.len()
            );
            let outcomes = if config.convert_in_jobs {
                let queue = MemoryQueue::new();
                for job in planned {
                    queue.push(job);
                }
                queue.drain(&config, &storage, &cli.sources)
            } else {
                planned
                    .par_iter()
                    .map(|job| job.run(&config, &storage, &cli.sources))
                    .collect()
            };

            let created = count(&outcomes, |o| matches!(o, TransformOutcome::Created { .. }));
            let skipped = count(&outcomes, |o| {
                matches!(o, TransformOutcome::AlreadyExists { .. })
            });
            let failed = count(&outcomes, |o| matches!(o, TransformOutcome::Failed { .. }));
            println!("==> {created} created, {skipped} already present, {failed} failed");
            if failed > 0 {
                return Err(format!("{failed} transform(s) failed").into());
            }
        }
        Command::Purge { rel_path } => {
            let report = purge::purge_source(&config, &storage, &rel_path)?;
            for path in &report.purged {
                println!("purged {path}");
            }
            for path in &report.thumb_purged {
                println!("purged thumb/{path}");
            }
        }
        Command::GenConfig => {
            print!("{}", EngineConfig::stock_toml());
        }
    }

    Ok(())
}

fn enabled_formats(config: &EngineConfig, only: Option<TargetFormat>) -> Vec<TargetFormat> {
    match only {
        Some(format) => vec![format],
        None => config.formats.clone(),
    }
}

/// Every source image under `root` the engine knows how to read, as
/// repo-relative paths with `/` separators.
fn collect_sources(root: &Path) -> Result<Vec<SourceImage>, Box<dyn std::error::Error>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if let Some(source) = SourceImage::from_local(rel, entry.path()) {
            sources.push(source);
        }
    }
    Ok(sources)
}

fn report_outcome(format: TargetFormat, outcome: &TransformOutcome) -> usize {
    match outcome {
        TransformOutcome::Created { path, .. } => {
            println!("{format}: created {path}");
            0
        }
        TransformOutcome::AlreadyExists { path, .. } => {
            println!("{format}: already present {path}");
            0
        }
        TransformOutcome::Failed { message } => {
            eprintln!("{format}: failed: {message}");
            1
        }
    }
}

fn count(outcomes: &[TransformOutcome], pred: impl Fn(&TransformOutcome) -> bool) -> usize {
    outcomes.iter().filter(|o| pred(o)).count()
}
