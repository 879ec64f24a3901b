use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::request::Language;

#[derive(Debug, Parser)]
#[command(author, version, about = "Make National Land Numerical Information attribute tables readable", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace coded values and column ids with readable labels and names
    Cleanup(CleanupArgs),
    /// List the columns known for a language
    Columns(ColumnsArgs),
    /// Scan a data directory and write its manifest
    Manifest(ManifestArgs),
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Input attribute table (CSV or TSV, '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Survey year of the data (defaults to each column's latest revision)
    #[arg(short = 'y', long)]
    pub year: Option<u16>,
    /// Output language for names and labels
    #[arg(short = 'l', long, default_value = "ja", value_parser = parse_language)]
    pub language: Language,
    /// Data directory to use instead of the packaged one
    #[arg(long = "data")]
    pub data: Option<PathBuf>,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Output delimiter (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Print the first N cleaned rows as a table instead of writing delimited output
    #[arg(long, conflicts_with = "output")]
    pub preview: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Language whose names are listed
    #[arg(short = 'l', long, default_value = "ja", value_parser = parse_language)]
    pub language: Language,
    /// Data directory to use instead of the packaged one
    #[arg(long = "data")]
    pub data: Option<PathBuf>,
    /// Only list columns of this dataset family (e.g. A29)
    #[arg(long)]
    pub family: Option<String>,
    /// Emit JSON instead of a text table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Data directory containing a columns/ tree
    #[arg(long = "data")]
    pub data: PathBuf,
    /// Destination manifest file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

pub fn parse_language(value: &str) -> Result<Language, String> {
    value.parse::<Language>().map_err(|err| err.to_string())
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
