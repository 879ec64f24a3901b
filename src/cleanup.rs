//! Cleanup pipeline.
//!
//! Stage order is fixed: legacy value conversion, then code substitution
//! (codes are keyed to post-conversion values), then renaming (which needs
//! the original column ids).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use log::debug;

use crate::{
    codes::{self, CodeLookupCache},
    error::Result,
    legacy::ConverterRegistry,
    manifest::{self, Manifest},
    metadata::MetadataStore,
    rename::{COLUMN_NAMES_FILE, ColumnRenamer, DefaultRenameTable},
    request::{Language, YearRequest},
    table::Table,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Survey year of the data; `None` means the latest revision.
    pub year: Option<u16>,
    pub language: Language,
}

impl CleanupOptions {
    pub fn new(year: Option<u16>, language: Language) -> Self {
        Self { year, language }
    }

    pub fn year_request(&self) -> YearRequest {
        YearRequest::from(self.year)
    }
}

/// Owns the metadata, static rename table, converters and code cache for
/// one data tree.
#[derive(Debug)]
pub struct Cleaner {
    stores: HashMap<Language, MetadataStore>,
    defaults: DefaultRenameTable,
    converters: ConverterRegistry,
    codes: CodeLookupCache,
}

impl Cleaner {
    pub fn new(
        codes: CodeLookupCache,
        stores: impl IntoIterator<Item = MetadataStore>,
        defaults: DefaultRenameTable,
        converters: ConverterRegistry,
    ) -> Self {
        let stores = stores
            .into_iter()
            .map(|store| (store.language(), store))
            .collect();
        Self {
            stores,
            defaults,
            converters,
            codes,
        }
    }

    /// Cleaner over the data compiled into the crate; touches no files.
    pub fn bundled() -> Result<Self> {
        let manifest = Manifest::bundled()?;
        let stores = Language::ALL.map(|lang| manifest.store(lang));
        Ok(Self::new(
            CodeLookupCache::embedded(manifest::BUNDLED_LOOKUPS),
            stores,
            DefaultRenameTable::bundled()?,
            ConverterRegistry::standard(),
        ))
    }

    /// Scans a data tree laid out like the packaged `data/` directory.
    ///
    /// A missing `column_names.txt` yields an empty static rename table.
    pub fn open(root: &Path) -> Result<Self> {
        let manifest = Manifest::scan(root)?;
        let stores = Language::ALL.map(|lang| manifest.store(lang));
        let names_path = root.join(COLUMN_NAMES_FILE);
        let defaults = if names_path.is_file() {
            DefaultRenameTable::load(&names_path)?
        } else {
            debug!("No {COLUMN_NAMES_FILE} under {root:?}");
            DefaultRenameTable::new()
        };
        Ok(Self::new(
            CodeLookupCache::new(root),
            stores,
            defaults,
            ConverterRegistry::standard(),
        ))
    }

    /// Cleaner without per-column metadata or converters.
    ///
    /// Codes are substituted from yearless `{column_id}.txt` lists in
    /// `codes_dir`, then only the static rename table applies. The requested
    /// year is ignored.
    pub fn static_only(codes_dir: impl Into<PathBuf>, defaults: DefaultRenameTable) -> Self {
        Self::new(
            CodeLookupCache::flat(codes_dir),
            Language::ALL.map(MetadataStore::empty),
            defaults,
            ConverterRegistry::new(),
        )
    }

    /// Process-wide bundled cleaner, built on first use.
    pub fn shared() -> Result<&'static Cleaner> {
        static SHARED: OnceLock<Cleaner> = OnceLock::new();
        if let Some(cleaner) = SHARED.get() {
            return Ok(cleaner);
        }
        let cleaner = Cleaner::bundled()?;
        Ok(SHARED.get_or_init(|| cleaner))
    }

    pub fn store(&self, language: Language) -> Option<&MetadataStore> {
        self.stores.get(&language)
    }

    pub fn defaults(&self) -> &DefaultRenameTable {
        &self.defaults
    }

    pub fn code_cache(&self) -> &CodeLookupCache {
        &self.codes
    }

    /// Returns a cleaned copy; `table` is left untouched.
    pub fn cleanup(&self, table: &Table, options: &CleanupOptions) -> Result<Table> {
        let mut cleaned = table.clone();
        self.cleanup_in_place(&mut cleaned, options)?;
        Ok(cleaned)
    }

    /// Cleans `table` in place. On error the table is unchanged.
    pub fn cleanup_in_place(&self, table: &mut Table, options: &CleanupOptions) -> Result<()> {
        let year = options.year_request();
        let empty;
        let store = match self.stores.get(&options.language) {
            Some(store) => store,
            None => {
                empty = MetadataStore::empty(options.language);
                &empty
            }
        };

        let plan = codes::plan_substitution(&self.codes, store, table, year)?;
        self.converters.apply(table, year);
        codes::apply_substitution(table, &plan);
        ColumnRenamer::new(store, &self.defaults).rename(table, year);
        debug!(
            "Cleaned {} column(s) x {} row(s) (year {year}, language {})",
            table.column_count(),
            table.row_count(),
            options.language
        );
        Ok(())
    }
}

/// Cleans `table` with the bundled data and returns the cleaned copy.
pub fn cleanup(table: &Table, options: &CleanupOptions) -> Result<Table> {
    Cleaner::shared()?.cleanup(table, options)
}

/// In-place form of [`cleanup`].
pub fn cleanup_in_place(table: &mut Table, options: &CleanupOptions) -> Result<()> {
    Cleaner::shared()?.cleanup_in_place(table, options)
}
