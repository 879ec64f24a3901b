//! Year-gated value conversions applied before code substitution.
//!
//! Some dataset families changed their numeric encoding between survey
//! revisions. A [`LegacyConverter`] normalizes one revision's raw values so
//! that code tables and downstream consumers see a single value domain.

use std::fmt;

use log::debug;

use crate::{
    data::Value,
    request::YearRequest,
    table::{Column, Table},
};

pub type Transform = fn(&mut Column);

#[derive(Clone)]
pub struct LegacyConverter {
    pub family: &'static str,
    /// Revision whose values this converter rewrites.
    pub applicable_year: u16,
    /// Most recent revision of the family; used when no year is requested.
    pub latest_year: u16,
    pub columns: Vec<String>,
    pub transform: Transform,
}

impl fmt::Debug for LegacyConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyConverter")
            .field("family", &self.family)
            .field("applicable_year", &self.applicable_year)
            .field("latest_year", &self.latest_year)
            .field("columns", &self.columns.len())
            .finish_non_exhaustive()
    }
}

impl LegacyConverter {
    pub fn matches(&self, year: YearRequest) -> bool {
        match year {
            YearRequest::Year(requested) => requested == self.applicable_year,
            YearRequest::Latest => self.applicable_year == self.latest_year,
        }
    }

    /// Rewrites every column whose id the converter lists, duplicates
    /// included, returning how many were rewritten.
    pub fn apply(&self, table: &mut Table) -> usize {
        let mut converted = 0;
        for column in table.columns_mut() {
            if self.columns.contains(&column.name) {
                (self.transform)(column);
                converted += 1;
            }
        }
        converted
    }

    /// Mesh climate normals (G02). The 2012 revision stores temperatures,
    /// precipitation and related values as integer tenths.
    pub fn mesh_climate() -> Self {
        let columns = (2..=53)
            .chain(59..=84)
            .map(|field| format!("G02_{field:03}"))
            .collect();
        Self {
            family: "G02",
            applicable_year: 2012,
            latest_year: 2012,
            columns,
            transform: divide_by_ten,
        }
    }
}

/// Converts integer tenths into one-decimal reals.
pub fn divide_by_ten(column: &mut Column) {
    for cell in column.values.iter_mut() {
        if let Some(scaled) = cell.as_ref().and_then(Value::as_f64).map(|v| v / 10.0) {
            *cell = Some(Value::Float(scaled));
        }
    }
}

/// Converters in registration order.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<LegacyConverter>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(LegacyConverter::mesh_climate());
        registry
    }

    pub fn register(&mut self, converter: LegacyConverter) {
        self.converters.push(converter);
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Runs every converter matching `year`, in registration order.
    pub fn apply(&self, table: &mut Table, year: YearRequest) {
        for converter in self.converters.iter().filter(|c| c.matches(year)) {
            let converted = converter.apply(table);
            if converted > 0 {
                debug!(
                    "Converted {converted} {} column(s) for {} revision",
                    converter.family, converter.applicable_year
                );
            }
        }
    }
}
