//! Same-cycle bundling of exported files.
//!
//! Exports are named with a `YYYY-MM-DD-HH` prefix. Sorted by that stamp,
//! a file joins the open group while it is within `window_hours` of the
//! group's first file; otherwise it starts a new group.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::sheet::SheetFormat;

/// Widest accepted grouping window, one year.
pub const MAX_WINDOW_HOURS: i64 = 8_760;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingOptions {
    pub window_hours: i64,
    /// Category name -> directory (relative to the data root) holding its exports.
    pub categories: BTreeMap<String, PathBuf>,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            window_hours: 2,
            categories: BTreeMap::from([
                ("orders".to_string(), PathBuf::from("orders")),
                ("deliveries".to_string(), PathBuf::from("deliveries")),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampedFile {
    pub stamp: NaiveDateTime,
    pub category: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleGroup {
    /// `"{first:%Y-%m-%d-%H}_{last:%H}"`
    pub id: String,
    pub cycle_ts: NaiveDateTime,
    /// Latest file per category.
    pub files: BTreeMap<String, PathBuf>,
    /// Every file in the group carries the same date-hour stamp.
    pub same_hour: bool,
}

impl CycleGroup {
    pub fn is_complete<'a>(&self, categories: impl IntoIterator<Item = &'a String>) -> bool {
        categories.into_iter().all(|c| self.files.contains_key(c))
    }

    pub fn file(&self, category: &str) -> Option<&Path> {
        self.files.get(category).map(PathBuf::as_path)
    }
}

fn stamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}-\d{2})").expect("stamp pattern is valid"))
}

/// Date-hour stamp at the start of a file name.
pub fn parse_stamp(file_name: &str) -> Option<NaiveDateTime> {
    let caps = stamp_pattern().captures(file_name)?;
    NaiveDateTime::parse_from_str(&format!("{}:00", &caps[1]), "%Y-%m-%d-%H:%M").ok()
}

/// Stamped spreadsheet files under each category directory of `root`.
/// Missing directories are skipped.
pub fn scan(root: &Path, options: &GroupingOptions) -> Result<Vec<StampedFile>, IoError> {
    let mut files = Vec::new();
    for (category, dir) in &options.categories {
        let dir = root.join(dir);
        if !dir.is_dir() {
            log::debug!("{}: no such directory, category '{category}' skipped", dir.display());
            continue;
        }
        let entries = std::fs::read_dir(&dir).map_err(|source| IoError::Read {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| IoError::Read {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if SheetFormat::from_path(&path).is_none() {
                continue;
            }
            let Some(stamp) = path.file_name().and_then(|n| n.to_str()).and_then(parse_stamp) else {
                continue;
            };
            files.push(StampedFile {
                stamp,
                category: category.clone(),
                path,
            });
        }
    }
    Ok(files)
}

/// Bundle files into cycles. Input order does not matter. The window is
/// clamped to `0..=MAX_WINDOW_HOURS`.
pub fn group_files(mut files: Vec<StampedFile>, window_hours: i64) -> Vec<CycleGroup> {
    files.sort_by(|a, b| a.stamp.cmp(&b.stamp).then_with(|| a.path.cmp(&b.path)));
    let window = Duration::hours(window_hours.clamp(0, MAX_WINDOW_HOURS));

    let mut buckets: Vec<Vec<StampedFile>> = Vec::new();
    for file in files {
        match buckets.last_mut() {
            Some(current) if file.stamp - current[0].stamp <= window => current.push(file),
            _ => buckets.push(vec![file]),
        }
    }

    buckets
        .into_iter()
        .map(|bucket| {
            let first = bucket[0].stamp;
            let last = bucket[bucket.len() - 1].stamp;
            let same_hour = first == last;
            let files = bucket
                .into_iter()
                .map(|f| (f.category, f.path))
                .collect::<BTreeMap<_, _>>();
            CycleGroup {
                id: format!("{}_{}", first.format("%Y-%m-%d-%H"), last.format("%H")),
                cycle_ts: first,
                files,
                same_hour,
            }
        })
        .collect()
}

/// Scan, group and keep the groups holding every configured category.
pub fn complete_groups(root: &Path, options: &GroupingOptions) -> Result<Vec<CycleGroup>, IoError> {
    let groups = group_files(scan(root, options)?, options.window_hours);
    let total = groups.len();
    let complete: Vec<CycleGroup> = groups
        .into_iter()
        .filter(|g| g.is_complete(options.categories.keys()))
        .collect();
    log::info!("{} cycle group(s) found, {} complete", total, complete.len());
    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn file(day: u32, hour: u32, category: &str, name: &str) -> StampedFile {
        StampedFile {
            stamp: at(day, hour),
            category: category.into(),
            path: PathBuf::from(name),
        }
    }

    #[test]
    fn parses_prefix_stamp() {
        assert_eq!(parse_stamp("2025-01-20-08_orders.xlsx"), Some(at(20, 8)));
        assert_eq!(parse_stamp("orders-2025-01-20-08.xlsx"), None);
        assert_eq!(parse_stamp("2025-13-20-08.xlsx"), None);
    }

    #[test]
    fn groups_within_window_of_first_file() {
        let groups = group_files(
            vec![
                file(20, 10, "deliveries", "b"),
                file(20, 8, "orders", "a"),
                file(20, 11, "orders", "c"),
                file(21, 8, "orders", "d"),
            ],
            2,
        );
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].id, "2025-01-20-08_10");
        assert_eq!(groups[0].files.len(), 2);
        assert!(!groups[0].same_hour);
        // 11:00 is three hours after the first file
        assert_eq!(groups[1].id, "2025-01-20-11_11");
        assert!(groups[1].same_hour);
    }

    #[test]
    fn oversized_window_is_clamped() {
        let files = vec![file(1, 8, "orders", "a"), file(2, 8, "deliveries", "b")];
        let groups = group_files(files, i64::MAX);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "2025-01-01-08_08");
    }

    #[test]
    fn latest_file_per_category_wins() {
        let groups = group_files(
            vec![file(20, 8, "orders", "early"), file(20, 9, "orders", "late")],
            2,
        );
        assert_eq!(groups[0].file("orders"), Some(Path::new("late")));
    }

    #[test]
    fn complete_groups_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("orders")).unwrap();
        std::fs::create_dir_all(root.join("deliveries")).unwrap();
        for (sub, name) in [
            ("orders", "2025-01-20-08_orders.csv"),
            ("deliveries", "2025-01-20-09_deliveries.csv"),
            ("orders", "2025-01-21-08_orders.csv"),
            ("orders", "notes.txt"),
        ] {
            std::fs::write(root.join(sub).join(name), "x\n").unwrap();
        }
        let groups = complete_groups(root, &GroupingOptions::default()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "2025-01-20-08_09");
        assert_eq!(groups[0].cycle_ts, at(20, 8));
    }
}
