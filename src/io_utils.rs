//! Delimited-text I/O for attribute tables and packaged lookup files.
//!
//! - **Delimiter resolution**: `.tsv`/`.txt` → tab, everything else → comma,
//!   unless given explicitly.
//! - **Encoding**: KSJ attribute exports are frequently Shift_JIS. Input is
//!   decoded through `encoding_rs_io`, output is transcoded with `encoding_rs`.
//!   UTF-8 is the default both ways.
//! - **stdin/stdout**: the `-` path routes through the standard streams.

use std::{
    fs::File,
    io::{self, BufReader, Read, Write},
    path::Path,
};

use csv::StringRecord;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::{
    data::{TypeCandidate, parse_cell, render_cell},
    error::{CleanupError, Result},
    table::{Column, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| CleanupError::UnknownEncoding(value.to_string())),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => {
            DEFAULT_TSV_DELIMITER
        }
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_delimited_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

/// Opens `path` for reading, decoding from `encoding` into UTF-8.
pub fn open_decoded(path: &Path, encoding: &'static Encoding) -> Result<Box<dyn Read>> {
    let raw: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).map_err(|err| CleanupError::io(path, err))?,
        ))
    };
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(raw);
    Ok(Box::new(decoded))
}

/// Wraps `reader` so a leading UTF-8 byte order mark is dropped.
pub fn open_utf8<R: Read>(reader: R) -> impl Read {
    DecodeReaderBytesBuilder::new()
        .encoding(Some(UTF_8))
        .build(reader)
}

pub fn read_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Table> {
    let reader = open_decoded(path, encoding)?;
    read_table_from_reader(reader, delimiter).map_err(|err| match err {
        CleanupError::Csv { source, .. } => CleanupError::csv(path, source),
        other => other,
    })
}

/// Reads a whole delimited table, inferring one cell type per column.
pub fn read_table_from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut reader = open_delimited_reader(reader, delimiter);
    let headers = reader
        .headers()
        .map_err(|err| CleanupError::csv("<input>", err))?
        .clone();
    let mut records: Vec<StringRecord> = Vec::new();
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|err| CleanupError::csv("<input>", err))?;
        for (idx, field) in record.iter().enumerate() {
            candidates[idx].observe(field);
        }
        records.push(record);
    }

    let mut table = Table::new();
    for (idx, header) in headers.iter().enumerate() {
        let ty = candidates[idx].decide();
        let values = records
            .iter()
            .map(|record| parse_cell(record.get(idx).unwrap_or(""), ty))
            .collect();
        table.push_column(Column::new(header, values))?;
    }
    Ok(table)
}

pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let label = path.unwrap_or(Path::new("-"));
    let rendered = render_delimited(table, delimiter).map_err(|err| CleanupError::csv(label, err))?;
    let bytes = if encoding == UTF_8 {
        rendered.into_bytes()
    } else {
        let (encoded, _, had_errors) = encoding.encode(&rendered);
        if had_errors {
            return Err(CleanupError::Encoding {
                path: label.to_path_buf(),
                encoding: encoding.name(),
            });
        }
        encoded.into_owned()
    };

    match path {
        Some(p) if !is_dash(p) => {
            let mut file = File::create(p).map_err(|err| CleanupError::io(p, err))?;
            file.write_all(&bytes)
                .and_then(|_| file.flush())
                .map_err(|err| CleanupError::io(p, err))
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(|err| CleanupError::io(label, err))
        }
    }
}

pub fn render_delimited(table: &Table, delimiter: u8) -> std::result::Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .double_quote(true)
        .from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for idx in 0..table.row_count() {
        let row = table
            .columns()
            .iter()
            .map(|column| render_cell(column.values[idx].as_ref()));
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
