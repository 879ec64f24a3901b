#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ksj_cleanup::{Column, Table, Value};
use tempfile::{TempDir, tempdir};

/// Scratch data directory laid out like the packaged `data/` tree.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn write_descriptor(&self, column_id: &str, yaml: &str) -> PathBuf {
        self.write(&format!("{}/meta.yaml", column_path(column_id)), yaml)
    }

    pub fn write_lookup(&self, column_id: &str, year: u16, tsv: &str) -> PathBuf {
        self.write(&format!("{}/{year}.txt", column_path(column_id)), tsv)
    }

    /// Survey-style fixture:
    ///
    /// - `L03_006` land use, named for 2014 and 2021, codes published for 2021 only
    /// - `L03_007` remarks, Japanese names only, no codes
    /// - `G02_003` mesh temperature, 2002 and 2012 names
    /// - `column_names.txt` aliasing `L03_001` and overriding `L03_007`
    pub fn survey() -> Self {
        let ws = Self::new();
        ws.write_descriptor(
            "L03_006",
            "ja:\n  2014: 土地利用種別\n  2021: 土地利用区分\nen:\n  2014: Land use type\n  2021: Land use class\n",
        );
        ws.write_lookup(
            "L03_006",
            2021,
            "code\tdata\tdata_en\n100\t田\tPaddy field\n200\tその他の農用地\tOther farmland\n500\t森林\tForest\n",
        );
        ws.write_descriptor("L03_007", "ja:\n  2021: 備考\n");
        ws.write_descriptor(
            "G02_003",
            "ja:\n  2002: 2月平均気温\n  2012: 平均気温（2月）\nen:\n  2012: Mean temperature (February)\n",
        );
        ws.write(
            "column_names.txt",
            "column_id\tja\ten\nL03_001\tメッシュコード\tMesh code\nL03_007\t備考欄\t\n",
        );
        ws
    }
}

fn column_path(column_id: &str) -> String {
    let (family, field) = column_id.split_once('_').expect("column id has a family");
    format!("columns/{family}/{field}")
}

pub fn int_column(name: &str, values: &[i64]) -> Column {
    Column::from_values(name, values.to_vec())
}

pub fn table(columns: Vec<Column>) -> Table {
    Table::from_columns(columns).expect("columns share a length")
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::from(value))
}
