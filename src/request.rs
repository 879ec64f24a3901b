use std::{fmt, str::FromStr};

use crate::error::CleanupError;

/// Output language for column names and code labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    #[default]
    Ja,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Ja, Language::En];

    /// Key used in descriptors and the default rename table.
    pub fn code(self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = CleanupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Ok(Language::Ja),
            "en" | "english" => Ok(Language::En),
            _ => Err(CleanupError::UnknownLanguage(value.to_string())),
        }
    }
}

/// Survey revision requested for one cleanup call.
///
/// `Latest` resolves per column to that column's most recent year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum YearRequest {
    #[default]
    Latest,
    Year(u16),
}

impl YearRequest {
    pub fn year(self) -> Option<u16> {
        match self {
            YearRequest::Latest => None,
            YearRequest::Year(year) => Some(year),
        }
    }

    pub fn resolve(self, latest_year: u16) -> u16 {
        self.year().unwrap_or(latest_year)
    }
}

impl From<Option<u16>> for YearRequest {
    fn from(value: Option<u16>) -> Self {
        value.map(YearRequest::Year).unwrap_or(YearRequest::Latest)
    }
}

impl fmt::Display for YearRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearRequest::Latest => f.write_str("latest"),
            YearRequest::Year(year) => write!(f, "{year}"),
        }
    }
}
