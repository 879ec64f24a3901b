//! Packaged column index.
//!
//! The manifest is the pre-scanned form of the `columns/` tree: every
//! descriptor record serialized into one YAML file. The copy shipped in
//! `data/manifest.yaml` is compiled into the crate, so building a
//! [`MetadataStore`] from it needs no filesystem access. The per-year lookup
//! files are compiled in alongside it as [`BUNDLED_LOOKUPS`]. Regenerate the
//! manifest with `ksj-cleanup manifest --data data -o data/manifest.yaml`
//! after editing the tree, and list any new `{year}.txt` file below.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    codes::EmbeddedLookup,
    error::{CleanupError, Result},
    metadata::{self, DescriptorRecord, MetadataStore},
    request::Language,
};

pub const MANIFEST_FILE: &str = "manifest.yaml";
const MANIFEST_VERSION: u32 = 1;

const BUNDLED_MANIFEST: &str = include_str!("../data/manifest.yaml");

pub const BUNDLED_LOOKUPS: &[EmbeddedLookup] = &[
    EmbeddedLookup::new(
        "A29_004",
        2011,
        include_str!("../data/columns/A29/004/2011.txt"),
    ),
    EmbeddedLookup::new(
        "A29_004",
        2019,
        include_str!("../data/columns/A29/004/2019.txt"),
    ),
];

/// Root of the source data tree the bundled files are compiled from.
pub fn bundled_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub columns: Vec<DescriptorRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            columns: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn scan(root: &Path) -> Result<Self> {
        let columns = metadata::scan_descriptors(root)?;
        Ok(Self {
            version: MANIFEST_VERSION,
            columns,
        })
    }

    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(BUNDLED_MANIFEST, Path::new(MANIFEST_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| CleanupError::io(path, err))?;
        Self::from_yaml_str(&raw, path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).map_err(|source| CleanupError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, serialized).map_err(|err| CleanupError::io(path, err))?;
        debug!("Wrote manifest with {} column(s) to {path:?}", self.columns.len());
        Ok(())
    }

    fn from_yaml_str(raw: &str, origin: &Path) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(raw).map_err(|source| CleanupError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(CleanupError::InvalidDescriptor {
                path: origin.to_path_buf(),
                message: format!(
                    "manifest version {} is not supported (expected {MANIFEST_VERSION})",
                    manifest.version
                ),
            });
        }
        Ok(manifest)
    }

    pub fn store(&self, language: Language) -> MetadataStore {
        MetadataStore::from_records(&self.columns, language)
    }
}
