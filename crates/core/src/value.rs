// Typed cell values and the canonical missing-value predicate

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Textual spellings of "no value" produced by spreadsheet exports and
/// dataframe round-trips. Compared trimmed and case-insensitively.
pub const MISSING_MARKERS: &[&str] = &["", "nan", "none", "null", "nat", "<na>"];

/// The single "is this a missing value" predicate for text.
pub fn is_missing_marker(text: &str) -> bool {
    let trimmed = text.trim();
    MISSING_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m))
}

/// Parse numeric text the way exports produce it: surrounding whitespace,
/// a leading currency sign, thousands separators. Non-finite values are rejected.
///
/// A comma is only ever a thousands separator, so it must be followed by
/// exactly three digits: `"1,234.5"` parses, `"1,5"` does not. Decimal-comma
/// files are converted when read.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let body = body.strip_prefix('$').unwrap_or(body).trim_start();
    if body.is_empty() {
        return None;
    }
    if body.contains(',') && !well_grouped(body) {
        return None;
    }
    let cleaned: String = body.chars().filter(|c| *c != ',' && *c != '_').collect();
    // f64::from_str accepts "inf" and "NaN"; only plain digits are numbers here
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: f64 = cleaned.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(if negative { -n } else { n })
}

/// `1,234,567.89`: a 1-3 digit lead group, then comma-led groups of three,
/// and no comma after the decimal point.
fn well_grouped(body: &str) -> bool {
    let int_part = match body.split_once('.') {
        Some((_, frac)) if frac.contains(',') => return false,
        Some((int_part, _)) => int_part,
        None => body,
    };
    let mut groups = int_part.split(',');
    let lead_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()));
    lead_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Int(i64),
    Decimal(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Map every representation of "missing" to `Null`: missing-marker text
    /// and non-finite decimals. Idempotent.
    pub fn canonicalize(self) -> Value {
        match self {
            Value::Text(s) if is_missing_marker(&s) => Value::Null,
            Value::Decimal(n) if !n.is_finite() => Value::Null,
            other => other,
        }
    }

    /// True for text that still spells a missing value after trimming.
    pub fn is_residual_marker(&self) -> bool {
        match self {
            Value::Text(s) => {
                let t = s.trim();
                t.eq_ignore_ascii_case("nat") || t.eq_ignore_ascii_case("nan")
            }
            _ => false,
        }
    }

    /// Numeric view. Text is parsed with [`parse_number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Decimal(n) if n.is_finite() => Some(*n),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Trimmed text view; `None` for null or blank.
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let s = self.to_string();
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    }

    /// Canonical join-key text: `123`, `123.0` and `" 123 "` are the same key.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => {
                let t = s.trim();
                if is_missing_marker(t) {
                    return None;
                }
                match parse_integral(t) {
                    Some(n) => Some(n.to_string()),
                    None => Some(t.to_string()),
                }
            }
            Value::Decimal(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some((*n as i64).to_string())
            }
            Value::Decimal(n) if !n.is_finite() => None,
            other => Some(other.to_string()),
        }
    }

    /// The storage-relevant kind of a non-null value.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ColumnType::Text),
            Value::Int(_) => Some(ColumnType::Integer),
            Value::Decimal(_) => Some(ColumnType::Decimal),
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Date(_) => Some(ColumnType::Date),
            Value::DateTime(_) => Some(ColumnType::Timestamp),
        }
    }
}

/// Integral text like `"42"` or `"42.00"`, without leading zeros other than `"0"`.
fn parse_integral(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let int_part = match digits.split_once('.') {
        Some((int_part, frac)) if !frac.is_empty() && frac.chars().all(|c| c == '0') => int_part,
        Some(_) => return None,
        None => digits,
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // "007" is an identifier, not the number 7
    if int_part.len() > 1 && int_part.starts_with('0') {
        return None;
    }
    let n: i64 = int_part.parse().ok()?;
    Some(if text.starts_with('-') { -n } else { n })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Column types
// ---------------------------------------------------------------------------

/// Semantic type of a whole column, inferred from its non-null cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Decimal,
    Date,
    Timestamp,
    Boolean,
    Text,
}

impl ColumnType {
    /// Integers widen to decimals, dates widen to timestamps, any other mix is text.
    /// An all-null column is text.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;
        for value in values {
            let Some(kind) = value.column_type() else {
                continue;
            };
            inferred = Some(match inferred {
                None => kind,
                Some(current) => current.widen(kind),
            });
            if inferred == Some(ColumnType::Text) {
                break;
            }
        }
        inferred.unwrap_or(ColumnType::Text)
    }

    fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Decimal) | (Decimal, Integer) => Decimal,
            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            _ => Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Boolean => write!(f, "boolean"),
            Self::Text => write!(f, "text"),
        }
    }
}
