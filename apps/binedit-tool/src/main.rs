//! CLI for config and style file maintenance.
//!
//! Provides commands for:
//! - Inspecting a file as JSON after running it through the upgrade chain
//! - Rewriting legacy files in the current layout
//! - Emitting fresh default files
//! - Round-trip integrity checks

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use binedit_core::codec::CodecOptions;
use binedit_core::defaults::build_defaults;
use binedit_core::document::Document;
use binedit_core::json::node_to_json;
use binedit_core::version::{self, FormatKind};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Keep nonconforming bytes instead of refusing corrupt files
    #[arg(long, global = true)]
    allow_corrupt: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify a file, upgrade it in memory, and dump it as JSON
    Inspect { file: PathBuf },
    /// Rewrite a file in the current layout
    Upgrade {
        file: PathBuf,
        /// Output path; defaults to rewriting in place
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write a fresh default config or style file
    Defaults {
        kind: FileKind,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Verify that a file's bytes survive a parse/serialize round trip
    Check { file: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FileKind {
    Config,
    Style,
}

impl From<FileKind> for FormatKind {
    fn from(kind: FileKind) -> FormatKind {
        match kind {
            FileKind::Config => FormatKind::Config,
            FileKind::Style => FormatKind::Style,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let opts = CodecOptions {
        allow_corrupt: args.allow_corrupt,
        ..CodecOptions::default()
    };

    match args.command {
        Command::Inspect { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let fv = version::identify(&bytes)?;
            let (tree, _) = version::load(&bytes, &opts)?;
            eprintln!(
                "{:?} v{}{}",
                fv.kind,
                fv.version,
                if fv.byte_swapped { " (byte-swapped)" } else { "" }
            );
            println!("{}", serde_json::to_string_pretty(&node_to_json(&tree))?);
        }
        Command::Upgrade { file, out } => {
            let (mut doc, fv) = Document::open_versioned(&file, &opts)?;
            let target = out.unwrap_or(file);
            doc.save_as(&target, &opts, true, None)?;
            eprintln!(
                "upgraded {:?} v{} -> v{}: {}",
                fv.kind,
                fv.version,
                version::current_version(fv.kind),
                target.display()
            );
        }
        Command::Defaults { kind, out } => {
            let kind = FormatKind::from(kind);
            let mut doc = Document::from_tree(
                version::current_schema(kind),
                build_defaults(version::current_schema(kind)),
                None,
            );
            doc.save_as(&out, &opts, true, None)?;
            eprintln!("wrote {}", out.display());
        }
        Command::Check { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let fv = version::identify(&bytes)?;
            if fv.version != version::current_version(fv.kind) {
                bail!(
                    "{} is {:?} v{}; run `upgrade` before checking",
                    file.display(),
                    fv.kind,
                    fv.version
                );
            }
            let (tree, _) = version::load(&bytes, &opts)?;
            let mut tree = tree;
            let again = binedit_core::codec::serialize(&mut tree, &opts)?;
            if again == bytes {
                eprintln!("{}: round trip ok ({} bytes)", file.display(), bytes.len());
            } else {
                bail!(
                    "{}: round trip mismatch ({} bytes in, {} bytes out)",
                    file.display(),
                    bytes.len(),
                    again.len()
                );
            }
        }
    }
    Ok(())
}
