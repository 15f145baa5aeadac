//! Type normalizer: coerces heterogeneous cell encodings into canonical types.
//!
//! Upstream exports mix date formats, serialize numbers as text (`"10.00"`),
//! and spell missing values as `"nan"` / `"NaT"`. Every rule here degrades
//! to `Null` instead of failing, and every cell of the output has passed
//! through [`Value::canonicalize`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::table::Table;
use crate::value::{is_missing_marker, parse_number, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizeRule {
    /// Parse with `format` first, then the permissive fallbacks.
    Date { format: String },
    Integer,
    Decimal,
    TrimmedString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    #[serde(flatten)]
    pub rule: NormalizeRule,
}

impl ColumnRule {
    pub fn new(column: impl Into<String>, rule: NormalizeRule) -> Self {
        Self { column: column.into(), rule }
    }
}

/// Apply `rules` column by column and canonicalize every other cell.
/// Rules naming absent columns are skipped.
pub fn normalize(table: &Table, rules: &[ColumnRule]) -> Table {
    let mut out = table.clone();
    out.map_cells(Value::canonicalize);

    for rule in rules {
        let Some(idx) = out.column_index(&rule.column) else {
            log::debug!("normalize: no column '{}', rule skipped", rule.column);
            continue;
        };
        let mut nulled = 0usize;
        for row in 0..out.len() {
            let before = out.rows()[row][idx].clone();
            let was_present = !before.is_null();
            let after = apply_rule(before, &rule.rule);
            if was_present && after.is_null() {
                nulled += 1;
            }
            out.set_cell(row, idx, after);
        }
        if nulled > 0 {
            log::debug!("normalize: {nulled} value(s) in '{}' could not be coerced", rule.column);
        }
    }

    out
}

/// Inferred target of a text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Integer,
    Decimal,
    Boolean,
    Date,
}

/// Type text columns by content, for input that carries no rules.
///
/// A column is converted only when every non-null cell is text and all of
/// them parse as one kind, tried in order: integer, decimal, boolean, date.
/// Numbers with a leading zero (`"0042"`) are identifiers and keep the
/// column as text. Numbers are never read as Excel date serials here.
pub fn infer_types(table: &Table, date_format: &str) -> Table {
    let mut out = table.clone();
    out.map_cells(Value::canonicalize);

    for idx in 0..out.width() {
        let Some(kind) = text_kind(&out, idx, date_format) else {
            continue;
        };
        for row in 0..out.len() {
            let Value::Text(s) = &out.rows()[row][idx] else {
                continue;
            };
            let typed = match kind {
                TextKind::Integer => plain_integer(s).map(Value::Int),
                TextKind::Decimal => plain_decimal(s).map(Value::Decimal),
                TextKind::Boolean => plain_bool(s).map(Value::Bool),
                TextKind::Date => plain_date(s, date_format).map(date_value),
            };
            out.set_cell(row, idx, typed.unwrap_or(Value::Null));
        }
        log::debug!("infer_types: column '{}' read as {kind:?}", out.columns()[idx]);
    }
    out
}

fn text_kind(table: &Table, idx: usize, date_format: &str) -> Option<TextKind> {
    let texts: Option<Vec<&str>> = table
        .column_values(idx)
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    let texts = texts?;
    if texts.is_empty() {
        return None;
    }
    if texts.iter().all(|s| plain_integer(s).is_some()) {
        Some(TextKind::Integer)
    } else if texts.iter().all(|s| plain_decimal(s).is_some()) {
        Some(TextKind::Decimal)
    } else if texts.iter().all(|s| plain_bool(s).is_some()) {
        Some(TextKind::Boolean)
    } else if texts.iter().all(|s| plain_date(s, date_format).is_some()) {
        Some(TextKind::Date)
    } else {
        None
    }
}

fn has_leading_zero(digits: &str) -> bool {
    let digits = digits.strip_prefix('-').unwrap_or(digits);
    let int_part = digits.split('.').next().unwrap_or(digits);
    int_part.len() > 1 && int_part.starts_with('0')
}

fn plain_integer(text: &str) -> Option<i64> {
    let t = text.trim();
    if has_leading_zero(t) {
        return None;
    }
    t.parse().ok()
}

fn plain_decimal(text: &str) -> Option<f64> {
    let t = text.trim();
    let numeric = t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !numeric || !t.chars().any(|c| c.is_ascii_digit()) || has_leading_zero(t) {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn plain_bool(text: &str) -> Option<bool> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("true") {
        Some(true)
    } else if t.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn plain_date(text: &str, format: &str) -> Option<NaiveDateTime> {
    if text.trim().parse::<f64>().is_ok() {
        return None;
    }
    parse_with_format(text, format).or_else(|| parse_date_permissive(text))
}

/// Coerce one value under `rule`. Never fails; unusable input becomes `Null`.
pub fn apply_rule(value: Value, rule: &NormalizeRule) -> Value {
    let value = value.canonicalize();
    match rule {
        NormalizeRule::Date { format } => coerce_date(value, format),
        NormalizeRule::Integer => coerce_integer(value),
        NormalizeRule::Decimal => coerce_decimal(value),
        NormalizeRule::TrimmedString => coerce_trimmed(value),
    }
}

fn coerce_date(value: Value, format: &str) -> Value {
    match value {
        Value::Date(_) | Value::DateTime(_) => value,
        Value::Text(s) => match parse_with_format(&s, format).or_else(|| parse_date_permissive(&s)) {
            Some(dt) => date_value(dt),
            None => Value::Null,
        },
        Value::Int(n) => excel_serial(n as f64).map(date_value).unwrap_or(Value::Null),
        Value::Decimal(n) => excel_serial(n).map(date_value).unwrap_or(Value::Null),
        Value::Bool(_) | Value::Null => Value::Null,
    }
}

fn coerce_integer(value: Value) -> Value {
    let n = match value {
        Value::Int(n) => return Value::Int(n),
        Value::Decimal(n) => n,
        Value::Text(s) => match parse_number(&s) {
            Some(n) => n,
            None => return Value::Null,
        },
        _ => return Value::Null,
    };
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Int(n as i64)
    } else {
        Value::Null
    }
}

fn coerce_decimal(value: Value) -> Value {
    match value {
        Value::Int(n) => Value::Decimal(n as f64),
        Value::Decimal(n) if n.is_finite() => Value::Decimal(n),
        Value::Text(s) => parse_number(&s).map(Value::Decimal).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn coerce_trimmed(value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let text = value.to_string();
    let trimmed = text.trim();
    if is_missing_marker(trimmed) {
        Value::Null
    } else {
        Value::Text(trimmed.to_string())
    }
}

fn date_value(dt: NaiveDateTime) -> Value {
    if dt.time() == NaiveTime::MIN {
        Value::Date(dt.date())
    } else {
        Value::DateTime(dt)
    }
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y", "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse `text` under one declared pattern, as a date or a date-time.
pub fn parse_with_format(text: &str, format: &str) -> Option<NaiveDateTime> {
    let t = text.trim();
    NaiveDate::parse_from_str(t, format)
        .map(|d| d.and_time(NaiveTime::MIN))
        .or_else(|_| NaiveDateTime::parse_from_str(t, format))
        .ok()
}

/// Best-effort parse across the common export spellings, RFC 3339 and
/// Excel serial numbers.
pub fn parse_date_permissive(text: &str) -> Option<NaiveDateTime> {
    let t = text.trim();
    if is_missing_marker(t) {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    t.parse::<f64>().ok().and_then(excel_serial)
}

/// Excel 1900-system serial (days since 1899-12-30, fraction = time of day).
pub fn excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_declared_format_first() {
        let rule = NormalizeRule::Date { format: "%d/%m/%Y".into() };
        assert_eq!(apply_rule(Value::text("03/02/2025"), &rule), Value::Date(d(2025, 2, 3)));
    }

    #[test]
    fn date_permissive_fallbacks() {
        let rule = NormalizeRule::Date { format: "%d/%m/%Y".into() };
        assert_eq!(apply_rule(Value::text("2025-01-10"), &rule), Value::Date(d(2025, 1, 10)));
        assert_eq!(
            apply_rule(Value::text("2025-01-10 08:30:00"), &rule),
            Value::DateTime(d(2025, 1, 10).and_hms_opt(8, 30, 0).unwrap())
        );
        // 45667 = 2025-01-10 in the 1900 date system
        assert_eq!(apply_rule(Value::Int(45667), &rule), Value::Date(d(2025, 1, 10)));
    }

    #[test]
    fn date_garbage_becomes_null() {
        let rule = NormalizeRule::Date { format: "%d/%m/%Y".into() };
        assert_eq!(apply_rule(Value::text("NaT"), &rule), Value::Null);
        assert_eq!(apply_rule(Value::text("soon"), &rule), Value::Null);
        assert_eq!(apply_rule(Value::Bool(true), &rule), Value::Null);
    }

    #[test]
    fn integer_rule() {
        let rule = NormalizeRule::Integer;
        assert_eq!(apply_rule(Value::text("10.00"), &rule), Value::Int(10));
        assert_eq!(apply_rule(Value::Decimal(7.0), &rule), Value::Int(7));
        assert_eq!(apply_rule(Value::Decimal(7.5), &rule), Value::Null);
        assert_eq!(apply_rule(Value::text("inf"), &rule), Value::Null);
        assert_eq!(apply_rule(Value::Null, &rule), Value::Null);
    }

    #[test]
    fn decimal_rule() {
        let rule = NormalizeRule::Decimal;
        assert_eq!(apply_rule(Value::text("$1,200.50"), &rule), Value::Decimal(1200.5));
        assert_eq!(apply_rule(Value::Int(3), &rule), Value::Decimal(3.0));
        assert_eq!(apply_rule(Value::Decimal(f64::NAN), &rule), Value::Null);
    }

    #[test]
    fn trimmed_string_rule() {
        let rule = NormalizeRule::TrimmedString;
        assert_eq!(apply_rule(Value::text("  OC-1 "), &rule), Value::text("OC-1"));
        assert_eq!(apply_rule(Value::text("None"), &rule), Value::Null);
        assert_eq!(apply_rule(Value::Decimal(1234.0), &rule), Value::text("1234"));
    }

    #[test]
    fn infers_column_types_from_text() {
        let table = Table::from_rows(
            ["id", "qty", "price", "due", "active", "ref", "mixed"],
            vec![
                vec![
                    Value::text("1"),
                    Value::text("3"),
                    Value::text("10.5"),
                    Value::text("10/01/2025"),
                    Value::text("true"),
                    Value::text("0042"),
                    Value::text("5"),
                ],
                vec![
                    Value::text("2"),
                    Value::text("nan"),
                    Value::text("7"),
                    Value::text("2025-01-11 08:00:00"),
                    Value::text("FALSE"),
                    Value::text("0043"),
                    Value::text("2025-01-10"),
                ],
            ],
        )
        .unwrap();
        let out = infer_types(&table, "%d/%m/%Y");
        assert_eq!(
            out.rows()[0],
            vec![
                Value::Int(1),
                Value::Int(3),
                Value::Decimal(10.5),
                Value::Date(d(2025, 1, 10)),
                Value::Bool(true),
                Value::text("0042"),
                Value::text("5"),
            ]
        );
        assert_eq!(out.cell(1, "qty"), Some(&Value::Null));
        assert_eq!(out.cell(1, "price"), Some(&Value::Decimal(7.0)));
        assert_eq!(
            out.cell(1, "due"),
            Some(&Value::DateTime(d(2025, 1, 11).and_hms_opt(8, 0, 0).unwrap()))
        );
        assert_eq!(out.cell(1, "active"), Some(&Value::Bool(false)));
    }

    #[test]
    fn inference_leaves_typed_columns_alone() {
        let table = Table::from_rows(["n"], vec![vec![Value::Decimal(1.5)], vec![Value::text("2")]]).unwrap();
        assert_eq!(infer_types(&table, "%d/%m/%Y"), table);
    }

    #[test]
    fn normalize_canonicalizes_unruled_columns() {
        let table = Table::from_rows(
            ["id", "note"],
            vec![vec![Value::text("1"), Value::text("nan")]],
        )
        .unwrap();
        let out = normalize(&table, &[ColumnRule::new("id", NormalizeRule::Integer)]);
        assert_eq!(out.rows()[0], vec![Value::Int(1), Value::Null]);
    }
}
