//! Column renaming.
//!
//! A column id resolves to a display name through the metadata store first:
//! the requested year's name, else the column's default (latest-year) name.
//! The static rename table is consulted afterwards and overrides whatever the
//! store produced, which also covers ids that have no descriptor at all.
//! Ids known to neither stay as they are.

use std::{collections::HashMap, fs::File, io::Read, path::Path};

use log::{debug, warn};

use crate::{
    error::{CleanupError, Result},
    io_utils::{self, DEFAULT_TSV_DELIMITER},
    metadata::MetadataStore,
    request::{Language, YearRequest},
    table::Table,
};

pub const COLUMN_NAMES_FILE: &str = "column_names.txt";
const COLUMN_ID_FIELD: &str = "column_id";

const BUNDLED_COLUMN_NAMES: &str = include_str!("../data/column_names.txt");

/// Static `column_id → name` map per language.
#[derive(Debug, Clone, Default)]
pub struct DefaultRenameTable {
    names: HashMap<Language, HashMap<String, String>>,
}

impl DefaultRenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_COLUMN_NAMES.as_bytes(), Path::new(COLUMN_NAMES_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| CleanupError::io(path, err))?;
        Self::from_reader(io_utils::open_utf8(file), path)
    }

    /// Reads a tab-delimited table with a `column_id` column and one column
    /// per language code. Empty cells mean the language has no entry.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let mut reader = io_utils::open_delimited_reader(reader, DEFAULT_TSV_DELIMITER);
        let headers = reader
            .headers()
            .map_err(|err| CleanupError::csv(origin, err))?
            .clone();
        let id_idx = headers
            .iter()
            .position(|h| h.trim() == COLUMN_ID_FIELD)
            .ok_or_else(|| CleanupError::InvalidDescriptor {
                path: origin.to_path_buf(),
                message: format!("missing '{COLUMN_ID_FIELD}' column"),
            })?;
        let language_columns: Vec<(Language, usize)> = Language::ALL
            .iter()
            .filter_map(|lang| {
                let idx = headers.iter().position(|h| h.trim() == lang.code())?;
                Some((*lang, idx))
            })
            .collect();

        let mut table = Self::new();
        for record in reader.records() {
            let record = record.map_err(|err| CleanupError::csv(origin, err))?;
            let Some(column_id) = record.get(id_idx).map(str::trim).filter(|id| !id.is_empty())
            else {
                continue;
            };
            for (language, idx) in &language_columns {
                if let Some(name) = record.get(*idx).filter(|name| !name.is_empty()) {
                    table.insert(*language, column_id, name);
                }
            }
        }
        debug!(
            "Loaded default column names from {origin:?} ({} ja, {} en)",
            table.len(Language::Ja),
            table.len(Language::En)
        );
        Ok(table)
    }

    pub fn insert(&mut self, language: Language, column_id: &str, name: &str) {
        self.names
            .entry(language)
            .or_default()
            .insert(column_id.to_string(), name.to_string());
    }

    pub fn get(&self, language: Language, column_id: &str) -> Option<&str> {
        self.names
            .get(&language)?
            .get(column_id)
            .map(String::as_str)
    }

    pub fn len(&self, language: Language) -> usize {
        self.names.get(&language).map(HashMap::len).unwrap_or(0)
    }
}

/// Renames headers for the language of its metadata store.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRenamer<'a> {
    store: &'a MetadataStore,
    defaults: &'a DefaultRenameTable,
}

impl<'a> ColumnRenamer<'a> {
    pub fn new(store: &'a MetadataStore, defaults: &'a DefaultRenameTable) -> Self {
        Self { store, defaults }
    }

    pub fn resolve_name(&self, column_id: &str, year: YearRequest) -> String {
        let mut name = match self.store.get(column_id) {
            None => column_id.to_string(),
            Some(entry) => match year {
                YearRequest::Latest => entry.default_name().to_string(),
                YearRequest::Year(requested) => match entry.name_for(requested) {
                    Some(name) => name.to_string(),
                    None => {
                        warn!(
                            "Column {column_id} has no name for {requested}; using its {} name",
                            entry.latest_year()
                        );
                        entry.default_name().to_string()
                    }
                },
            },
        };
        if let Some(alias) = self.defaults.get(self.store.language(), column_id) {
            name = alias.to_string();
        }
        name
    }

    pub fn rename(&self, table: &mut Table, year: YearRequest) {
        for column in table.columns_mut() {
            column.name = self.resolve_name(&column.name, year);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::metadata::DescriptorRecord;

    fn zoning_store(language: Language) -> MetadataStore {
        let records = vec![DescriptorRecord {
            column_id: "A29_004".into(),
            names: BTreeMap::from([(
                "ja".to_string(),
                BTreeMap::from([
                    (2011, "用途地域分類".to_string()),
                    (2019, "用途地域".to_string()),
                ]),
            )]),
            has_code_table: true,
        }];
        MetadataStore::from_records(&records, language)
    }

    #[test]
    fn resolve_name_walks_tiers() {
        let store = zoning_store(Language::Ja);
        let defaults = DefaultRenameTable::new();
        let renamer = ColumnRenamer::new(&store, &defaults);
        assert_eq!(renamer.resolve_name("A29_004", YearRequest::Latest), "用途地域");
        assert_eq!(renamer.resolve_name("A29_004", YearRequest::Year(2011)), "用途地域分類");
        assert_eq!(renamer.resolve_name("A29_004", YearRequest::Year(2015)), "用途地域");
        assert_eq!(renamer.resolve_name("X99_001", YearRequest::Year(2015)), "X99_001");
    }

    #[test]
    fn static_table_overrides_store_names() {
        let store = zoning_store(Language::Ja);
        let mut defaults = DefaultRenameTable::new();
        defaults.insert(Language::Ja, "A29_004", "用途地域区分");
        defaults.insert(Language::Ja, "P27_001", "行政区域コード");
        defaults.insert(Language::En, "A29_004", "Zoning");
        let renamer = ColumnRenamer::new(&store, &defaults);
        assert_eq!(renamer.resolve_name("A29_004", YearRequest::Year(2011)), "用途地域区分");
        assert_eq!(renamer.resolve_name("P27_001", YearRequest::Latest), "行政区域コード");

        let en_store = zoning_store(Language::En);
        let en = ColumnRenamer::new(&en_store, &defaults);
        assert_eq!(en.resolve_name("A29_004", YearRequest::Latest), "Zoning");
    }

    #[test]
    fn from_reader_skips_blank_cells() {
        let raw = "column_id\tja\ten\nP27_001\t行政区域コード\tAdministrative area code\nP27_002\t文化施設分類\t\n";
        let table = DefaultRenameTable::from_reader(raw.as_bytes(), Path::new("names.txt")).unwrap();
        assert_eq!(table.get(Language::Ja, "P27_002"), Some("文化施設分類"));
        assert_eq!(table.get(Language::En, "P27_002"), None);
        assert_eq!(table.len(Language::En), 1);
    }

    #[test]
    fn from_reader_requires_id_column() {
        let raw = "id\tja\nP27_001\tx\n";
        assert!(DefaultRenameTable::from_reader(raw.as_bytes(), Path::new("n.txt")).is_err());
    }

    #[test]
    fn bundled_table_loads() {
        let table = DefaultRenameTable::bundled().unwrap();
        assert!(table.len(Language::Ja) > 0);
    }
}
