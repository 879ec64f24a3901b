//! Code lookup tables and the cache that serves them.
//!
//! A lookup file is tab-delimited with a `code` column and a `data` column
//! holding the Japanese label. English labels, when published, sit in an
//! optional `data_en` column; English requests fall back to `data` for files
//! without one.
//!
//! Lookup files come from a [`CodeSource`]:
//!
//! - **Directory**: per-year files `columns/{family}/{field}/{year}.txt`
//!   under a data tree.
//! - **Embedded**: the same per-year files compiled into the crate.
//! - **Flat**: yearless `{column_id}.txt` lists in one directory. No column
//!   metadata is consulted; a column has codes iff its file exists.
//!
//! Tables are loaded on first request and kept for the life of the cache.
//! The cache is safe to share between threads. Two threads missing on the
//! same key may both load the file; the first insert wins and both callers
//! see the same table.

use std::{
    borrow::Cow,
    collections::HashMap,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use log::debug;

use crate::{
    data::Value,
    error::{CleanupError, Result},
    io_utils::{self, DEFAULT_TSV_DELIMITER},
    metadata::{self, MetadataStore},
    request::{Language, YearRequest},
    table::{Column, Table},
};

const CODE_FIELD: &str = "code";
const LABEL_FIELD: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTable {
    column_id: String,
    year: Option<u16>,
    labels: HashMap<i64, String>,
}

impl CodeTable {
    /// `year` is `None` for flat, yearless lists.
    pub fn new(
        column_id: impl Into<String>,
        year: impl Into<Option<u16>>,
        labels: HashMap<i64, String>,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            year: year.into(),
            labels,
        }
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn year(&self) -> Option<u16> {
        self.year
    }

    pub fn label(&self, code: i64) -> Option<&str> {
        self.labels.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Replaces every code in `column` with its label.
    ///
    /// Unknown codes and fractional numbers become missing. Text that is not
    /// an integer is assumed to be a label already and is left alone.
    pub fn substitute(&self, column: &mut Column) {
        for cell in column.values.iter_mut() {
            let Some(value) = cell.as_ref() else {
                continue;
            };
            let (code, numeric) = (value.as_code(), value.is_numeric());
            match code {
                Some(code) => *cell = self.label(code).map(Value::from),
                None if numeric => *cell = None,
                None => {}
            }
        }
    }

    fn parse<R: Read>(
        reader: R,
        column_id: &str,
        year: Option<u16>,
        language: Language,
        path: &Path,
    ) -> Result<Self> {
        let mut reader = io_utils::open_delimited_reader(reader, DEFAULT_TSV_DELIMITER);
        let invalid = |line: u64, message: String| CleanupError::InvalidCodeTable {
            path: path.to_path_buf(),
            line,
            message,
        };
        let headers = reader
            .headers()
            .map_err(|err| CleanupError::csv(path, err))?
            .clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let code_idx = position(CODE_FIELD)
            .ok_or_else(|| invalid(1, format!("missing '{CODE_FIELD}' column")))?;
        let base_label_idx = position(LABEL_FIELD)
            .ok_or_else(|| invalid(1, format!("missing '{LABEL_FIELD}' column")))?;
        let label_idx = match language {
            Language::Ja => base_label_idx,
            other => position(format!("{LABEL_FIELD}_{}", other.code()).as_str())
                .unwrap_or(base_label_idx),
        };

        let mut labels = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|err| CleanupError::csv(path, err))?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let raw_code = record.get(code_idx).unwrap_or("").trim();
            let code = raw_code
                .parse::<i64>()
                .map_err(|_| invalid(line, format!("code '{raw_code}' is not an integer")))?;
            let label = record.get(label_idx).unwrap_or("");
            if !label.is_empty() {
                labels.insert(code, label.to_string());
            }
        }
        Ok(Self::new(column_id, year, labels))
    }
}

#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Arc<CodeTable>),
    /// The column is unknown or publishes no code table.
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<Arc<CodeTable>> {
        match self {
            Lookup::Found(table) => Some(table),
            Lookup::NotFound => None,
        }
    }
}

/// A per-year lookup file compiled into the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedLookup {
    pub column_id: &'static str,
    pub year: u16,
    pub contents: &'static str,
}

impl EmbeddedLookup {
    pub const fn new(column_id: &'static str, year: u16, contents: &'static str) -> Self {
        Self {
            column_id,
            year,
            contents,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CodeSource {
    Directory(PathBuf),
    Embedded(&'static [EmbeddedLookup]),
    Flat(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    column_id: String,
    year: Option<u16>,
    language: Language,
}

#[derive(Debug)]
pub struct CodeLookupCache {
    source: CodeSource,
    tables: RwLock<HashMap<CacheKey, Arc<CodeTable>>>,
}

impl CodeLookupCache {
    /// Cache over per-year lookup files under the data tree at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_source(CodeSource::Directory(root.into()))
    }

    pub fn embedded(lookups: &'static [EmbeddedLookup]) -> Self {
        Self::with_source(CodeSource::Embedded(lookups))
    }

    /// Cache over yearless `{column_id}.txt` lists in `dir`.
    pub fn flat(dir: impl Into<PathBuf>) -> Self {
        Self::with_source(CodeSource::Flat(dir.into()))
    }

    pub fn with_source(source: CodeSource) -> Self {
        Self {
            source,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &CodeSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the code table for `column_id` in the language of `store`.
    ///
    /// A column that has code tables but none for the requested year is an
    /// error rather than [`Lookup::NotFound`]. Flat sources ignore `store`
    /// and `year`.
    pub fn resolve(
        &self,
        store: &MetadataStore,
        column_id: &str,
        year: YearRequest,
    ) -> Result<Lookup> {
        let year = match &self.source {
            CodeSource::Flat(_) => None,
            CodeSource::Directory(_) | CodeSource::Embedded(_) => match store.get(column_id) {
                Some(entry) if entry.has_code_table() => Some(year.resolve(entry.latest_year())),
                _ => return Ok(Lookup::NotFound),
            },
        };
        let key = CacheKey {
            column_id: column_id.to_string(),
            year,
            language: store.language(),
        };

        if let Some(table) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Lookup::Found(Arc::clone(table)));
        }

        let Some(loaded) = self.load(&key)? else {
            return Ok(Lookup::NotFound);
        };
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(key).or_insert_with(|| Arc::new(loaded));
        Ok(Lookup::Found(Arc::clone(table)))
    }

    fn load(&self, key: &CacheKey) -> Result<Option<CodeTable>> {
        let (path, raw): (PathBuf, Cow<'static, [u8]>) = match (&self.source, key.year) {
            (CodeSource::Directory(root), Some(year)) => {
                let path = lookup_path(root, &key.column_id, year);
                let raw = fs::read(&path).map_err(|source| match source.kind() {
                    io::ErrorKind::NotFound => missing(key, year, &path, source),
                    _ => CleanupError::io(&path, source),
                })?;
                (path, Cow::Owned(raw))
            }
            (CodeSource::Embedded(lookups), Some(year)) => {
                let path = lookup_path(Path::new(""), &key.column_id, year);
                let lookup = lookups
                    .iter()
                    .find(|l| l.column_id == key.column_id && l.year == year)
                    .ok_or_else(|| {
                        let source = io::Error::new(
                            io::ErrorKind::NotFound,
                            "lookup file is not packaged",
                        );
                        missing(key, year, &path, source)
                    })?;
                (path, Cow::Borrowed(lookup.contents.as_bytes()))
            }
            (CodeSource::Flat(dir), _) => {
                let Some(path) = flat_path(dir, &key.column_id) else {
                    return Ok(None);
                };
                match fs::read(&path) {
                    Ok(raw) => (path, Cow::Owned(raw)),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                    Err(err) => return Err(CleanupError::io(&path, err)),
                }
            }
            // Per-year sources always resolve a year before loading.
            (CodeSource::Directory(_) | CodeSource::Embedded(_), None) => return Ok(None),
        };

        let decoded = io_utils::open_utf8(&raw[..]);
        let table = CodeTable::parse(decoded, &key.column_id, key.year, key.language, &path)?;
        debug!(
            "Loaded {} code(s) for {} ({:?}, {}) from {:?}",
            table.len(),
            key.column_id,
            key.year,
            key.language,
            path
        );
        Ok(Some(table))
    }
}

fn missing(key: &CacheKey, year: u16, path: &Path, source: io::Error) -> CleanupError {
    CleanupError::MissingCodeTable {
        column: key.column_id.clone(),
        year,
        path: path.to_path_buf(),
        source,
    }
}

pub fn lookup_path(root: &Path, column_id: &str, year: u16) -> PathBuf {
    metadata::column_dir(root, column_id).join(format!("{year}.txt"))
}

/// `{dir}/{column_id}.txt`, or `None` when the id could escape `dir`.
pub fn flat_path(dir: &Path, column_id: &str) -> Option<PathBuf> {
    let plain = !column_id.is_empty()
        && column_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    plain.then(|| dir.join(format!("{column_id}.txt")))
}

/// Code tables for each column of `table`, in column order.
///
/// Everything is resolved before any cell changes, so an error leaves the
/// table untouched.
pub fn plan_substitution(
    cache: &CodeLookupCache,
    store: &MetadataStore,
    table: &Table,
    year: YearRequest,
) -> Result<Vec<Option<Arc<CodeTable>>>> {
    table
        .columns()
        .iter()
        .map(|column| Ok(cache.resolve(store, &column.name, year)?.found()))
        .collect()
}

pub fn apply_substitution(table: &mut Table, plan: &[Option<Arc<CodeTable>>]) {
    for (column, lookup) in table.columns_mut().iter_mut().zip(plan) {
        if let Some(codes) = lookup {
            codes.substitute(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::metadata::DescriptorRecord;

    const SURVEY_LOOKUPS: &[EmbeddedLookup] = &[EmbeddedLookup::new(
        "Z01_001",
        2020,
        "code\tdata\tdata_en\n1\t市街地\tUrban area\n",
    )];

    fn survey_store(language: Language) -> MetadataStore {
        let record = DescriptorRecord {
            column_id: "Z01_001".to_string(),
            names: BTreeMap::from([
                ("ja".to_string(), BTreeMap::from([(2020, "区分".to_string())])),
                ("en".to_string(), BTreeMap::from([(2020, "Class".to_string())])),
            ]),
            has_code_table: true,
        };
        MetadataStore::from_records([&record], language)
    }

    fn zoning() -> CodeTable {
        let labels = HashMap::from([
            (1, "第一種低層住居専用地域".to_string()),
            (9, "商業地域".to_string()),
        ]);
        CodeTable::new("A29_004", 2019, labels)
    }

    #[test]
    fn substitute_maps_codes_and_blanks_unknowns() {
        let mut column = Column::new(
            "A29_004",
            vec![
                Some(Value::Integer(9)),
                Some(Value::Integer(99)),
                None,
                Some(Value::Float(1.0)),
                Some(Value::Float(1.5)),
                Some(Value::from("1")),
            ],
        );
        zoning().substitute(&mut column);
        assert_eq!(
            column.values,
            vec![
                Some(Value::from("商業地域")),
                None,
                None,
                Some(Value::from("第一種低層住居専用地域")),
                None,
                Some(Value::from("第一種低層住居専用地域")),
            ]
        );
    }

    #[test]
    fn substitute_leaves_existing_labels_alone() {
        let mut column = Column::from_values("A29_004", vec!["商業地域", "unknown label"]);
        let before = column.clone();
        zoning().substitute(&mut column);
        assert_eq!(column, before);
    }

    #[test]
    fn parse_selects_language_column_with_fallback() {
        let raw = "code\tdata\tdata_en\n9\t商業地域\tCommercial\n10\t準工業地域\t\n";
        let path = Path::new("2019.txt");
        let ja = CodeTable::parse(raw.as_bytes(), "A29_004", Some(2019), Language::Ja, path).unwrap();
        let en = CodeTable::parse(raw.as_bytes(), "A29_004", Some(2019), Language::En, path).unwrap();
        assert_eq!(ja.label(9), Some("商業地域"));
        assert_eq!(en.label(9), Some("Commercial"));
        assert_eq!(en.label(10), None);

        let ja_only = "code\tdata\n9\t商業地域\n";
        let en = CodeTable::parse(ja_only.as_bytes(), "A29_004", Some(2019), Language::En, path).unwrap();
        assert_eq!(en.label(9), Some("商業地域"));
    }

    #[test]
    fn parse_reports_line_of_bad_code() {
        let raw = "code\tdata\n1\tok\nx\tbad\n";
        let err = CodeTable::parse(raw.as_bytes(), "A29_004", Some(2019), Language::Ja, Path::new("t.txt"))
            .unwrap_err();
        match err {
            CleanupError::InvalidCodeTable { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parse_requires_code_and_data_headers() {
        let raw = "id\tlabel\n1\tx\n";
        let err = CodeTable::parse(raw.as_bytes(), "A29_004", Some(2019), Language::Ja, Path::new("t.txt"))
            .unwrap_err();
        assert!(matches!(err, CleanupError::InvalidCodeTable { line: 1, .. }));
    }

    #[test]
    fn embedded_source_serves_packaged_tables() {
        let cache = CodeLookupCache::embedded(SURVEY_LOOKUPS);
        let ja = cache
            .resolve(&survey_store(Language::Ja), "Z01_001", YearRequest::Latest)
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(ja.year(), Some(2020));
        assert_eq!(ja.label(1), Some("市街地"));

        let en = cache
            .resolve(&survey_store(Language::En), "Z01_001", YearRequest::Year(2020))
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(en.label(1), Some("Urban area"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn embedded_source_reports_unpackaged_year() {
        let cache = CodeLookupCache::embedded(SURVEY_LOOKUPS);
        let err = cache
            .resolve(&survey_store(Language::Ja), "Z01_001", YearRequest::Year(2015))
            .unwrap_err();
        match err {
            CleanupError::MissingCodeTable { column, year, path, .. } => {
                assert_eq!(column, "Z01_001");
                assert_eq!(year, 2015);
                assert_eq!(path, Path::new("columns/Z01/001/2015.txt"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn flat_path_rejects_ids_that_leave_the_directory() {
        let dir = Path::new("codes");
        assert_eq!(
            flat_path(dir, "A29_004"),
            Some(PathBuf::from("codes/A29_004.txt"))
        );
        assert_eq!(flat_path(dir, "../A29_004"), None);
        assert_eq!(flat_path(dir, "a/b"), None);
        assert_eq!(flat_path(dir, ""), None);
    }
}
