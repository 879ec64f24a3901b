//! Column metadata store.
//!
//! Column identifiers follow the KSJ convention `{family}_{field}`
//! (`G02_003`, `A29_004`). On disk every known column owns a directory
//! `columns/{family}/{field}/` holding a `meta.yaml` descriptor and, when the
//! column is coded, one `{year}.txt` lookup file per published revision:
//!
//! ```text
//! columns/A29/004/meta.yaml
//! columns/A29/004/2011.txt
//! columns/A29/004/2019.txt
//! ```
//!
//! The descriptor maps language → year → display name. A [`MetadataStore`]
//! is built once per language, either by scanning such a tree or from a
//! [`Manifest`](crate::manifest::Manifest), and is read-only afterwards.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::{
    error::{CleanupError, Result},
    request::Language,
};

pub const COLUMNS_DIR: &str = "columns";
pub const DESCRIPTOR_FILE: &str = "meta.yaml";

/// Descriptor contents plus the code-table flag for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub column_id: String,
    /// language code → year → display name
    pub names: BTreeMap<String, BTreeMap<u16, String>>,
    pub has_code_table: bool,
}

/// Names and code-table flag for one column in one language.
///
/// `latest_year` is always a key of `year_names`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnEntry {
    column_id: String,
    year_names: BTreeMap<u16, String>,
    latest_year: u16,
    has_code_table: bool,
}

impl ColumnEntry {
    /// Returns `None` when `year_names` is empty, since no latest year exists.
    pub fn new(
        column_id: impl Into<String>,
        year_names: BTreeMap<u16, String>,
        has_code_table: bool,
    ) -> Option<Self> {
        let latest_year = *year_names.keys().next_back()?;
        Some(Self {
            column_id: column_id.into(),
            year_names,
            latest_year,
            has_code_table,
        })
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn year_names(&self) -> &BTreeMap<u16, String> {
        &self.year_names
    }

    pub fn latest_year(&self) -> u16 {
        self.latest_year
    }

    pub fn has_code_table(&self) -> bool {
        self.has_code_table
    }

    pub fn default_name(&self) -> &str {
        &self.year_names[&self.latest_year]
    }

    pub fn name_for(&self, year: u16) -> Option<&str> {
        self.year_names.get(&year).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    language: Language,
    entries: BTreeMap<String, ColumnEntry>,
}

impl MetadataStore {
    pub fn empty(language: Language) -> Self {
        Self {
            language,
            entries: BTreeMap::new(),
        }
    }

    /// Builds the store for `language` from descriptor records.
    ///
    /// Records without names in `language` are left out of the store.
    pub fn from_records<'a, I>(records: I, language: Language) -> Self
    where
        I: IntoIterator<Item = &'a DescriptorRecord>,
    {
        let entries = records
            .into_iter()
            .filter_map(|record| {
                let year_names = record.names.get(language.code())?.clone();
                ColumnEntry::new(record.column_id.clone(), year_names, record.has_code_table)
            })
            .map(|entry| (entry.column_id.clone(), entry))
            .collect();
        Self { language, entries }
    }

    pub fn scan(root: &Path, language: Language) -> Result<Self> {
        let records = scan_descriptors(root)?;
        let store = Self::from_records(&records, language);
        debug!(
            "Loaded {} column(s) for language '{}' from {:?}",
            store.len(),
            language,
            root
        );
        Ok(store)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn get(&self, column_id: &str) -> Option<&ColumnEntry> {
        self.entries.get(column_id)
    }

    pub fn contains(&self, column_id: &str) -> bool {
        self.entries.contains_key(column_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in column id order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnEntry> {
        self.entries.values()
    }
}

/// Directory holding the descriptor and lookup files of `column_id`.
pub fn column_dir(root: &Path, column_id: &str) -> PathBuf {
    let (family, field) = column_id.split_once('_').unwrap_or((column_id, ""));
    root.join(COLUMNS_DIR).join(family).join(field)
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid segment pattern"))
}

/// Walks `root/columns/{family}/{field}` and reads every descriptor found.
pub fn scan_descriptors(root: &Path) -> Result<Vec<DescriptorRecord>> {
    let columns_root = root.join(COLUMNS_DIR);
    let mut records = Vec::new();
    for family_dir in sorted_subdirectories(&columns_root)? {
        let Some(family) = segment_name(&family_dir) else {
            continue;
        };
        for field_dir in sorted_subdirectories(&family_dir)? {
            let Some(field) = segment_name(&field_dir) else {
                continue;
            };
            let column_id = format!("{family}_{field}");
            let descriptor_path = field_dir.join(DESCRIPTOR_FILE);
            if !descriptor_path.is_file() {
                debug!("Skipping {column_id}: no {DESCRIPTOR_FILE} in {field_dir:?}");
                continue;
            }
            let names = read_descriptor(&descriptor_path)?;
            let has_code_table = count_files(&field_dir)? > 1;
            records.push(DescriptorRecord {
                column_id,
                names,
                has_code_table,
            });
        }
    }
    debug!("Scanned {} column descriptor(s) under {:?}", records.len(), columns_root);
    Ok(records)
}

fn segment_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    segment_pattern().is_match(name).then(|| name.to_string())
}

fn sorted_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(dir).map_err(|err| CleanupError::io(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| CleanupError::io(dir, err))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn count_files(dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(|err| CleanupError::io(dir, err))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|err| CleanupError::io(dir, err))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Parses a descriptor document. Year keys may be plain or quoted integers.
pub fn read_descriptor(path: &Path) -> Result<BTreeMap<String, BTreeMap<u16, String>>> {
    let raw = fs::read_to_string(path).map_err(|err| CleanupError::io(path, err))?;
    parse_descriptor(&raw, path)
}

fn parse_descriptor(raw: &str, path: &Path) -> Result<BTreeMap<String, BTreeMap<u16, String>>> {
    let parsed: BTreeMap<String, Mapping> =
        serde_yaml::from_str(raw).map_err(|source| CleanupError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    let invalid = |message: String| CleanupError::InvalidDescriptor {
        path: path.to_path_buf(),
        message,
    };
    let mut names = BTreeMap::new();
    for (language, years) in parsed {
        let mut by_year = BTreeMap::new();
        for (key, name) in years {
            let year = year_key(&key)
                .ok_or_else(|| invalid(format!("key {key:?} under '{language}' is not a year")))?;
            let name = name
                .as_str()
                .ok_or_else(|| invalid(format!("name for {year} under '{language}' is not text")))?;
            by_year.insert(year, name.to_string());
        }
        names.insert(language, by_year);
    }
    Ok(names)
}

fn year_key(key: &YamlValue) -> Option<u16> {
    match key {
        YamlValue::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        YamlValue::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(u16, &str)]) -> BTreeMap<u16, String> {
        pairs.iter().map(|(y, n)| (*y, n.to_string())).collect()
    }

    #[test]
    fn entry_uses_latest_year_as_default() {
        let entry = ColumnEntry::new(
            "A29_004",
            names(&[(2011, "用途地域分類"), (2019, "用途地域")]),
            true,
        )
        .unwrap();
        assert_eq!(entry.latest_year, 2019);
        assert_eq!(entry.default_name(), "用途地域");
        assert_eq!(entry.name_for(2011), Some("用途地域分類"));
        assert_eq!(entry.name_for(2015), None);
    }

    #[test]
    fn entry_without_years_is_rejected() {
        assert!(ColumnEntry::new("X01_001", BTreeMap::new(), false).is_none());
    }

    #[test]
    fn store_drops_columns_missing_the_language() {
        let records = vec![
            DescriptorRecord {
                column_id: "A29_005".into(),
                names: BTreeMap::from([("ja".to_string(), names(&[(2019, "用途地域名")]))]),
                has_code_table: false,
            },
            DescriptorRecord {
                column_id: "G02_003".into(),
                names: BTreeMap::from([
                    ("ja".to_string(), names(&[(2012, "2月平均気温")])),
                    ("en".to_string(), names(&[(2012, "February mean temperature")])),
                ]),
                has_code_table: false,
            },
        ];
        let ja = MetadataStore::from_records(&records, Language::Ja);
        let en = MetadataStore::from_records(&records, Language::En);
        assert_eq!(ja.len(), 2);
        assert_eq!(en.len(), 1);
        assert!(!en.contains("A29_005"));
        assert_eq!(
            en.get("G02_003").map(ColumnEntry::default_name),
            Some("February mean temperature")
        );
    }

    #[test]
    fn descriptor_accepts_plain_and_quoted_year_keys() {
        let raw = "ja:\n  2011: 旧名称\n  \"2019\": 新名称\nen:\n  2019: New name\n";
        let parsed = parse_descriptor(raw, Path::new("meta.yaml")).unwrap();
        assert_eq!(parsed["ja"][&2011], "旧名称");
        assert_eq!(parsed["ja"][&2019], "新名称");
        assert_eq!(parsed["en"].len(), 1);
    }

    #[test]
    fn descriptor_rejects_non_year_keys() {
        let raw = "ja:\n  latest: 名称\n";
        let err = parse_descriptor(raw, Path::new("meta.yaml")).unwrap_err();
        assert!(matches!(err, CleanupError::InvalidDescriptor { .. }));
    }

    #[test]
    fn column_dir_splits_family_and_field() {
        assert_eq!(
            column_dir(Path::new("/data"), "A29_004"),
            Path::new("/data/columns/A29/004")
        );
    }
}
