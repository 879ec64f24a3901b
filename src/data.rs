use std::fmt;

/// A single cell. Missing cells are represented as `None` by the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
        }
    }

    /// Interprets the cell as an integer survey code.
    ///
    /// Integral floats and integer-looking strings qualify; labels and
    /// fractional values do not.
    pub fn as_code(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::Float(_) => None,
            Value::String(s) => s.trim().parse::<i64>().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone)]
pub(crate) struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
}

impl TypeCandidate {
    pub(crate) fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
        }
    }

    pub(crate) fn observe(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        if has_leading_zero(trimmed) {
            // Zero-padded identifiers must keep their padding.
            self.possible_integer = false;
            self.possible_float = false;
            return;
        }
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && trimmed.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    pub(crate) fn decide(&self) -> CellType {
        if self.possible_integer {
            CellType::Integer
        } else if self.possible_float {
            CellType::Float
        } else {
            CellType::String
        }
    }
}

fn has_leading_zero(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut chars = digits.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('0'), Some(next)) if next.is_ascii_digit()
    )
}

/// Parses a raw field using the type decided for its column.
///
/// Called only after [`TypeCandidate`] has accepted every field of the
/// column, so numeric parses fall back to a string cell instead of failing.
pub fn parse_cell(raw: &str, ty: CellType) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    let trimmed = raw.trim();
    let value = match ty {
        CellType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        CellType::Float => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        CellType::String => Value::String(raw.to_string()),
    };
    Some(value)
}

pub fn render_cell(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}
