pub mod cleanup;
pub mod cli;
pub mod codes;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod legacy;
pub mod manifest;
pub mod metadata;
pub mod preview;
pub mod rename;
pub mod request;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

pub use crate::{
    cleanup::{Cleaner, CleanupOptions, cleanup, cleanup_in_place},
    data::Value,
    error::{CleanupError, Result},
    request::{Language, YearRequest},
    table::{Column, Table},
};

use crate::{
    cli::{Cli, Commands},
    manifest::Manifest,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("ksj_cleanup", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Cleanup(args) => handle_cleanup(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Manifest(args) => handle_manifest(&args),
    }
}

fn open_cleaner(data: Option<&Path>) -> anyhow::Result<Cleaner> {
    match data {
        Some(root) => {
            Cleaner::open(root).with_context(|| format!("Loading column metadata from {root:?}"))
        }
        None => Cleaner::bundled().context("Loading packaged column metadata"),
    }
}

fn handle_cleanup(args: &cli::CleanupArgs) -> anyhow::Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let output_delimiter = args.output_delimiter.unwrap_or(delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    info!(
        "Cleaning '{}' (delimiter '{}', encoding {}, year {}, language {})",
        args.input.display(),
        printable_delimiter(delimiter),
        input_encoding.name(),
        YearRequest::from(args.year),
        args.language
    );

    let cleaner = open_cleaner(args.data.as_deref())?;
    let mut table = io_utils::read_table(&args.input, delimiter, input_encoding)
        .with_context(|| format!("Reading {:?}", args.input))?;
    debug!("Read {} column(s): {:?}", table.column_count(), table.headers());

    let options = CleanupOptions::new(args.year, args.language);
    cleaner
        .cleanup_in_place(&mut table, &options)
        .with_context(|| format!("Cleaning {:?}", args.input))?;

    if let Some(rows) = args.preview {
        print!("{}", preview::render_preview(&table, rows));
        return Ok(());
    }
    io_utils::write_table(
        &table,
        args.output.as_deref(),
        output_delimiter,
        output_encoding,
    )
    .context("Writing cleaned table")?;
    info!(
        "Wrote {} row(s) to {}",
        table.row_count(),
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into())
    );
    Ok(())
}

fn handle_columns(args: &cli::ColumnsArgs) -> anyhow::Result<()> {
    let cleaner = open_cleaner(args.data.as_deref())?;
    let Some(store) = cleaner.store(args.language) else {
        info!("No columns are known for language {}", args.language);
        return Ok(());
    };
    let prefix = args.family.as_ref().map(|family| format!("{family}_"));
    let entries = store
        .iter()
        .filter(|entry| {
            prefix
                .as_deref()
                .is_none_or(|prefix| entry.column_id().starts_with(prefix))
        })
        .collect::<Vec<_>>();

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&entries).context("Serializing column listing")?;
        println!("{rendered}");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|entry| {
            vec![
                entry.column_id().to_string(),
                entry.default_name().to_string(),
                entry.year_names().keys().join(","),
                if entry.has_code_table() { "yes" } else { "" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["id", "name", "years", "codes"].map(String::from);
    print!("{}", preview::render_table(&headers, &rows));
    info!("Listed {} column(s) for language {}", rows.len(), args.language);
    Ok(())
}

fn handle_manifest(args: &cli::ManifestArgs) -> anyhow::Result<()> {
    let manifest = Manifest::scan(&args.data)
        .with_context(|| format!("Scanning data directory {:?}", args.data))?;
    manifest
        .save(&args.output)
        .with_context(|| format!("Writing manifest to {:?}", args.output))?;
    info!(
        "Manifest for {} column(s) written to {:?}",
        manifest.columns.len(),
        args.output
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
