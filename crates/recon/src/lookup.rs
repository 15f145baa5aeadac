//! Lookup enrichment: copy columns from a reference table onto another by
//! composite key, e.g. invoice UUIDs onto deliveries.

use std::collections::HashMap;

use procledger_core::{Table, Value};
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

pub const DEFAULT_FILL: &str = "not found";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSpec {
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub returns: Vec<String>,
    #[serde(default = "default_fill")]
    pub fill: String,
}

fn default_fill() -> String {
    DEFAULT_FILL.to_string()
}

impl LookupSpec {
    pub fn new<S: Into<String>>(
        left_keys: impl IntoIterator<Item = S>,
        right_keys: impl IntoIterator<Item = S>,
        returns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            left_keys: left_keys.into_iter().map(Into::into).collect(),
            right_keys: right_keys.into_iter().map(Into::into).collect(),
            returns: returns.into_iter().map(Into::into).collect(),
            fill: default_fill(),
        }
    }

    fn validate(&self) -> Result<(), ReconError> {
        if self.left_keys.is_empty() || self.left_keys.len() != self.right_keys.len() {
            return Err(ReconError::InvalidLookup(format!(
                "left keys ({}) and right keys ({}) must be non-empty and the same length",
                self.left_keys.len(),
                self.right_keys.len()
            )));
        }
        if self.returns.is_empty() {
            return Err(ReconError::InvalidLookup("no return columns".into()));
        }
        Ok(())
    }
}

/// Left-join `spec.returns` from `right` onto `left`.
///
/// Several matches are joined with `,` (distinct values, first-seen order);
/// no match yields `spec.fill`. When any named column is absent the input
/// comes back unchanged and a warning is logged. A returned column whose
/// name already exists on the left is appended as `<name>_right`.
pub fn populate(left: &Table, right: &Table, spec: &LookupSpec) -> Result<Table, ReconError> {
    spec.validate()?;

    let missing: Vec<&str> = spec
        .left_keys
        .iter()
        .filter(|c| left.column_index(c).is_none())
        .chain(
            spec.right_keys
                .iter()
                .chain(&spec.returns)
                .filter(|c| right.column_index(c).is_none()),
        )
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        log::warn!("lookup skipped, missing column(s): {}", missing.join(", "));
        return Ok(left.clone());
    }

    let left_idx = indexes(left, &spec.left_keys);
    let right_idx = indexes(right, &spec.right_keys);
    let return_idx = indexes(right, &spec.returns);

    // composite key -> per return column, distinct values
    let mut index: HashMap<Vec<String>, Vec<Vec<String>>> = HashMap::new();
    for row in right.rows() {
        let Some(key) = composite_key(row, &right_idx) else {
            continue;
        };
        let slots = index
            .entry(key)
            .or_insert_with(|| vec![Vec::new(); return_idx.len()]);
        for (slot, &i) in slots.iter_mut().zip(&return_idx) {
            if let Some(text) = row[i].as_text() {
                if !slot.contains(&text) {
                    slot.push(text);
                }
            }
        }
    }

    let mut out = left.clone();
    let mut targets = Vec::with_capacity(spec.returns.len());
    for name in &spec.returns {
        let target = if out.column_index(name).is_some() {
            format!("{name}_right")
        } else {
            name.clone()
        };
        out.add_column(target.clone(), Value::Null)?;
        targets.push(out.width() - 1);
    }

    let mut matched = 0usize;
    for row in 0..left.len() {
        let found = composite_key(&left.rows()[row], &left_idx).and_then(|k| index.get(&k));
        if found.is_some() {
            matched += 1;
        }
        for (n, &col) in targets.iter().enumerate() {
            let value = match found.map(|slots| &slots[n]) {
                Some(values) if !values.is_empty() => Value::text(values.join(",")),
                _ => Value::text(spec.fill.clone()),
            };
            out.set_cell(row, col, value);
        }
    }
    log::debug!("lookup matched {matched} of {} row(s)", left.len());

    Ok(out)
}

fn indexes(table: &Table, names: &[String]) -> Vec<usize> {
    names.iter().filter_map(|n| table.column_index(n)).collect()
}

fn composite_key(row: &[Value], idx: &[usize]) -> Option<Vec<String>> {
    idx.iter().map(|&i| row[i].key_text()).collect()
}
