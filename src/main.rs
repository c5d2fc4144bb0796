//! fltools - extract and decode Fantasy Life game assets
//!
//! Usage:
//!   fltools unpack <path> [-o out] [-f filter]   - Extract archive(s)
//!   fltools dump <scr_file> [--str offsets...]   - Dump a raw SCR table
//!   fltools decode <catalog> <table> <language>  - Decode a table by schema
//!   fltools add-table <catalog> <name> <file> <language>
//!   fltools info <file>                          - Show container information

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use fltools::{
    collect_files, create_glob_matcher, format_size, matches_filter, ArcFile, Error, Scr,
    TableRegistry, UnknownEnumPolicy,
};

#[derive(Parser)]
#[command(name = "fltools")]
#[command(version = "0.1.0")]
#[command(about = "Extract and decode Fantasy Life .bin archives and SCR tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a .bin archive, or every archive under a directory
    Unpack {
        /// Archive file or directory to walk
        path: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "bin")]
        output: PathBuf,
        /// Filter pattern for entry paths (e.g. *.scr, menu/*)
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Dump an SCR file as tab-delimited text
    Dump {
        /// Path to the SCR file
        scr_file: PathBuf,
        /// In-row byte offsets of string columns to decode
        #[arg(long = "str", num_args = 0..)]
        string_offsets: Vec<u32>,
        /// Output file (default: <stem>_table.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode a cataloged table to tab-delimited text
    Decode {
        /// Path to the tables.json catalog
        catalog: PathBuf,
        /// Table name
        table: String,
        /// Language code (jp, en, ...)
        language: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Render unmatched enum values as their raw integer instead of
        /// failing
        #[arg(long)]
        raw_enums: bool,
    },
    /// Register a 9-language run of SCR files in the catalog
    AddTable {
        /// Path to the tables.json catalog
        catalog: PathBuf,
        /// New table name
        name: String,
        /// SCR file holding the first language
        file: PathBuf,
        /// Language code of that file
        language: String,
    },
    /// Show container information
    Info {
        /// Archive or SCR file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Unpack {
            path,
            output,
            filter,
        } => unpack(&path, &output, filter.as_deref()),
        Commands::Dump {
            scr_file,
            string_offsets,
            output,
        } => dump(&scr_file, &string_offsets, output.as_deref()),
        Commands::Decode {
            catalog,
            table,
            language,
            output,
            raw_enums,
        } => decode(&catalog, &table, &language, output.as_deref(), raw_enums),
        Commands::AddTable {
            catalog,
            name,
            file,
            language,
        } => add_table(&catalog, &name, &file, &language),
        Commands::Info { file } => info(&file),
    }
}

fn unpack(path: &Path, output: &Path, filter: Option<&str>) -> Result<()> {
    let matcher = filter.map(create_glob_matcher).transpose()?;

    if path.is_dir() {
        let files = collect_files(path)?;
        println!("Scanning {} files in {}...", files.len(), path.display());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
                .progress_chars("#>-"),
        );

        // Archives are independent; fan the batch out
        let results: Vec<(PathBuf, fltools::Result<usize>)> = files
            .par_iter()
            .map(|file| {
                let result = unpack_archive(file, output, matcher.as_ref());
                pb.inc(1);
                (file.clone(), result)
            })
            .collect();
        pb.finish_and_clear();

        let mut unpacked = 0usize;
        let mut skipped = 0usize;
        for (file, result) in results {
            match result {
                Ok(count) => {
                    println!("{} ({} entries)", file.display(), count);
                    unpacked += 1;
                }
                // Not an archive, or a corrupt one: skip and keep going
                Err(Error::UnsupportedContainer(_)) | Err(Error::Format(_)) => skipped += 1,
                Err(e) => eprintln!("Warning: {}: {}", file.display(), e),
            }
        }
        println!("Unpacked {} archives ({} files skipped)", unpacked, skipped);
    } else {
        let count = unpack_archive(path, output, matcher.as_ref())
            .with_context(|| format!("Failed to unpack {}", path.display()))?;
        println!("Unpacked {} entries to {}", count, output.display());
    }

    Ok(())
}

fn unpack_archive(
    path: &Path,
    output: &Path,
    matcher: Option<&globset::GlobMatcher>,
) -> fltools::Result<usize> {
    let archive = ArcFile::open(path)?;
    let mut count = 0usize;
    for entry in archive.entries() {
        if !matches_filter(&entry.path, matcher) {
            continue;
        }
        let data = archive.entry_data(entry)?;
        let out_path = output.join(&entry.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, data)?;
        count += 1;
    }
    Ok(count)
}

fn dump(scr_path: &Path, string_offsets: &[u32], output: Option<&Path>) -> Result<()> {
    let scr = Scr::open(scr_path)
        .with_context(|| format!("Failed to open {}", scr_path.display()))?;
    let lines = scr.dump_lines(string_offsets)?;

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = scr_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "out".to_string());
            PathBuf::from(format!("{}_table.txt", stem))
        }
    };
    fs::write(&out_path, lines.join("\n"))?;
    println!("Dumped {} rows to {}", lines.len(), out_path.display());
    Ok(())
}

fn decode(
    catalog: &Path,
    table: &str,
    language: &str,
    output: Option<&Path>,
    raw_enums: bool,
) -> Result<()> {
    let registry = TableRegistry::from_path(catalog)
        .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
    let policy = if raw_enums {
        UnknownEnumPolicy::RawLabel
    } else {
        UnknownEnumPolicy::Fail
    };
    let decoded = registry
        .load_table(table, language, policy)
        .with_context(|| format!("Failed to decode table '{}' ({})", table, language))?;

    let text = decoded.to_text();
    match output {
        Some(path) => {
            fs::write(path, &text)?;
            println!("Decoded {} rows to {}", decoded.len(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn add_table(catalog: &Path, name: &str, file: &Path, language: &str) -> Result<()> {
    let mut registry = if catalog.exists() {
        TableRegistry::from_path(catalog)
            .with_context(|| format!("Failed to load catalog {}", catalog.display()))?
    } else {
        TableRegistry::new()
    };
    registry.append_language_set(name, file, language)?;
    registry.save(catalog)?;
    println!("Registered table '{}' in {}", name, catalog.display());
    Ok(())
}

fn info(path: &Path) -> Result<()> {
    let raw = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{} ({})", path.display(), format_size(raw.len() as u64));

    if ArcFile::is_arc(&raw) {
        let archive = ArcFile::parse(raw)?;
        println!("Archive: {} entries", archive.len());
        for entry in archive.entries() {
            println!(
                "  {} ({})",
                entry.path,
                format_size(entry.file_length as u64)
            );
        }
    } else if Scr::is_scr(&raw) {
        let scr = Scr::parse(&raw)?;
        println!(
            "SCR table: {} rows x {} bytes at {:#x}",
            scr.row_count(),
            scr.row_length(),
            scr.table_offset()
        );
    } else {
        bail!("{} is neither an archive nor an SCR file", path.display());
    }
    Ok(())
}
