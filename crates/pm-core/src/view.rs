//! Filter/sort projection of a snapshot.
//!
//! `project` is a pure function: the same snapshot, filter and sort key
//! always produce the same view. Sorting is stable so entries that rank
//! equal keep their enumeration order across refreshes.

use crate::collect::{ProcessRecord, ProcessStatus, Snapshot};
use pm_common::ProcessId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    Status,
    Name,
    Owner,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Status => "status",
            FilterField::Name => "name",
            FilterField::Owner => "owner",
        }
    }
}

impl FromStr for FilterField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "status" | "state" => Ok(FilterField::Status),
            "name" | "comm" => Ok(FilterField::Name),
            "owner" | "user" | "username" => Ok(FilterField::Owner),
            other => Err(format!(
                "unknown filter field {other:?} (expected status, name or owner)"
            )),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which records a view keeps.
///
/// `Status` is an exact match; `Name` and `Owner` are case-insensitive
/// substring matches. The needle is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    Status(ProcessStatus),
    Name(String),
    Owner(String),
}

impl FilterSpec {
    pub fn new(field: FilterField, value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("empty value for filter field {field}"));
        }
        Ok(match field {
            FilterField::Status => FilterSpec::Status(value.parse()?),
            FilterField::Name => FilterSpec::Name(value.to_lowercase()),
            FilterField::Owner => FilterSpec::Owner(value.to_lowercase()),
        })
    }

    pub fn field(&self) -> FilterField {
        match self {
            FilterSpec::Status(_) => FilterField::Status,
            FilterSpec::Name(_) => FilterField::Name,
            FilterSpec::Owner(_) => FilterField::Owner,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            FilterSpec::Status(status) => status.as_str(),
            FilterSpec::Name(needle) | FilterSpec::Owner(needle) => needle,
        }
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        match self {
            FilterSpec::Status(status) => record.status == *status,
            FilterSpec::Name(needle) => record.name.to_lowercase().contains(needle.as_str()),
            FilterSpec::Owner(needle) => record.owner.to_lowercase().contains(needle.as_str()),
        }
    }
}

impl FromStr for FilterSpec {
    type Err = String;

    /// Parse `field=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("filter must look like field=value, got {s:?}"))?;
        FilterSpec::new(field.parse()?, value)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field(), self.value())
    }
}

/// Ordering of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Ascending pid.
    #[default]
    Pid,
    /// Ascending name, case-insensitive.
    Name,
    /// Descending resident memory.
    Memory,
    /// Descending CPU usage.
    Cpu,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Pid => "pid",
            SortKey::Name => "name",
            SortKey::Memory => "memory",
            SortKey::Cpu => "cpu",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pid" => Ok(SortKey::Pid),
            "name" => Ok(SortKey::Name),
            "memory" | "mem" | "rss" => Ok(SortKey::Memory),
            "cpu" => Ok(SortKey::Cpu),
            other => Err(format!(
                "unknown sort key {other:?} (expected pid, name, memory or cpu)"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filtered, sorted projection of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotView<'a> {
    rows: Vec<&'a ProcessRecord>,
}

impl<'a> SnapshotView<'a> {
    pub fn rows(&self) -> &[&'a ProcessRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a ProcessRecord> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn pids(&self) -> Vec<ProcessId> {
        self.rows.iter().map(|r| r.pid).collect()
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.rows.iter().any(|r| r.pid == pid)
    }
}

/// Apply `filter` and `sort` to `snapshot`.
pub fn project<'a>(
    snapshot: &'a Snapshot,
    filter: Option<&FilterSpec>,
    sort: SortKey,
) -> SnapshotView<'a> {
    let mut rows: Vec<&ProcessRecord> = snapshot
        .records
        .iter()
        .filter(|record| filter.map_or(true, |f| f.matches(record)))
        .collect();

    match sort {
        SortKey::Pid => rows.sort_by_key(|r| r.pid),
        SortKey::Name => rows.sort_by_cached_key(|r| r.name.to_lowercase()),
        SortKey::Memory => {
            rows.sort_by(|a, b| b.resident_memory_bytes.cmp(&a.resident_memory_bytes))
        }
        SortKey::Cpu => rows.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent)),
    }

    SnapshotView { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MB: u64 = 1024 * 1024;

    fn record(
        pid: u32,
        name: &str,
        owner: &str,
        status: ProcessStatus,
        mb: f64,
        cpu: f64,
    ) -> ProcessRecord {
        ProcessRecord {
            pid: ProcessId(pid),
            name: name.to_string(),
            owner: owner.to_string(),
            status,
            resident_memory_bytes: (mb * MB as f64) as u64,
            cpu_percent: cpu,
            cpu_time: None,
            created_at: None,
        }
    }

    fn scenario() -> Snapshot {
        Snapshot::new(vec![
            record(1, "init", "root", ProcessStatus::Running, 2.0, 0.1),
            record(50, "chrome", "alice", ProcessStatus::Running, 300.0, 12.5),
            record(51, "chrome", "alice", ProcessStatus::Sleeping, 50.0, 0.0),
        ])
    }

    fn pids(view: &SnapshotView<'_>) -> Vec<u32> {
        view.iter().map(|r| r.pid.0).collect()
    }

    #[test]
    fn test_scenario_sort_memory() {
        let snapshot = scenario();
        let view = project(&snapshot, None, SortKey::Memory);
        assert_eq!(pids(&view), vec![50, 51, 1]);
    }

    #[test]
    fn test_scenario_filter_name_then_pid() {
        let snapshot = scenario();
        let filter: FilterSpec = "name=chrome".parse().unwrap();
        let view = project(&snapshot, Some(&filter), SortKey::Pid);
        assert_eq!(pids(&view), vec![50, 51]);
    }

    #[test]
    fn test_filter_status_exact() {
        let snapshot = scenario();
        let filter: FilterSpec = "status=running".parse().unwrap();
        let view = project(&snapshot, Some(&filter), SortKey::Pid);
        assert_eq!(pids(&view), vec![1, 50]);
        assert!(view.iter().all(|r| r.status == ProcessStatus::Running));
    }

    #[test]
    fn test_filter_name_case_insensitive() {
        let snapshot = Snapshot::new(vec![
            record(3, "Chrome Helper", "bob", ProcessStatus::Sleeping, 1.0, 0.0),
            record(4, "firefox", "bob", ProcessStatus::Sleeping, 1.0, 0.0),
        ]);
        let filter: FilterSpec = "name=CHROME".parse().unwrap();
        let view = project(&snapshot, Some(&filter), SortKey::Pid);
        assert_eq!(pids(&view), vec![3]);
    }

    #[test]
    fn test_filter_owner_substring_and_alias() {
        let snapshot = scenario();
        let filter: FilterSpec = "username=LIC".parse().unwrap();
        assert_eq!(filter.field(), FilterField::Owner);
        let view = project(&snapshot, Some(&filter), SortKey::Pid);
        assert_eq!(pids(&view), vec![50, 51]);
    }

    #[test]
    fn test_no_filter_passes_everything() {
        let snapshot = scenario();
        assert_eq!(project(&snapshot, None, SortKey::Pid).len(), 3);
    }

    #[test]
    fn test_sort_name_case_insensitive() {
        let snapshot = Snapshot::new(vec![
            record(1, "zsh", "u", ProcessStatus::Running, 0.0, 0.0),
            record(2, "Bash", "u", ProcessStatus::Running, 0.0, 0.0),
            record(3, "awk", "u", ProcessStatus::Running, 0.0, 0.0),
        ]);
        let view = project(&snapshot, None, SortKey::Name);
        assert_eq!(pids(&view), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_cpu_descending_stable() {
        let snapshot = Snapshot::new(vec![
            record(9, "a", "u", ProcessStatus::Running, 0.0, 1.0),
            record(3, "b", "u", ProcessStatus::Running, 0.0, 5.0),
            record(7, "c", "u", ProcessStatus::Running, 0.0, 1.0),
        ]);
        let view = project(&snapshot, None, SortKey::Cpu);
        assert_eq!(pids(&view), vec![3, 9, 7]);
    }

    #[test]
    fn test_bad_filters_rejected() {
        assert!("status=flying".parse::<FilterSpec>().is_err());
        assert!("colour=red".parse::<FilterSpec>().is_err());
        assert!("name=".parse::<FilterSpec>().is_err());
        assert!("name".parse::<FilterSpec>().is_err());
    }

    #[test]
    fn test_filter_display() {
        let filter: FilterSpec = "user=Alice".parse().unwrap();
        assert_eq!(filter.to_string(), "owner=alice");
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("MEM".parse::<SortKey>(), Ok(SortKey::Memory));
        assert_eq!("cpu".parse::<SortKey>(), Ok(SortKey::Cpu));
        assert!("age".parse::<SortKey>().is_err());
        assert_eq!(SortKey::default(), SortKey::Pid);
    }

    fn arb_record() -> impl Strategy<Value = ProcessRecord> {
        (
            1u32..5000,
            "[a-zA-Z]{1,6}",
            prop_oneof![Just("root"), Just("alice"), Just("bob")],
            prop_oneof![
                Just(ProcessStatus::Running),
                Just(ProcessStatus::Sleeping),
                Just(ProcessStatus::Zombie)
            ],
            0u64..8,
            0u32..4,
        )
            .prop_map(|(pid, name, owner, status, mem, cpu)| ProcessRecord {
                pid: ProcessId(pid),
                name,
                owner: owner.to_string(),
                status,
                resident_memory_bytes: mem * MB,
                cpu_percent: cpu as f64 * 2.5,
                cpu_time: None,
                created_at: None,
            })
    }

    proptest! {
        #[test]
        fn prop_pid_sort_non_decreasing(records in prop::collection::vec(arb_record(), 0..40)) {
            let snapshot = Snapshot::new(records);
            let view = project(&snapshot, None, SortKey::Pid);
            let pids = view.pids();
            prop_assert!(pids.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn prop_memory_sort_non_increasing_and_stable(
            records in prop::collection::vec(arb_record(), 0..40)
        ) {
            let snapshot = Snapshot::new(records);
            let view = project(&snapshot, None, SortKey::Memory);
            let rows = view.rows();
            for pair in rows.windows(2) {
                prop_assert!(pair[0].resident_memory_bytes >= pair[1].resident_memory_bytes);
            }
            // equal-memory entries keep snapshot order
            let position = |r: &ProcessRecord| {
                snapshot.records.iter().position(|s| std::ptr::eq(s, r)).unwrap()
            };
            for pair in rows.windows(2) {
                if pair[0].resident_memory_bytes == pair[1].resident_memory_bytes {
                    prop_assert!(position(pair[0]) < position(pair[1]));
                }
            }
        }

        #[test]
        fn prop_status_filter_only_matching(records in prop::collection::vec(arb_record(), 0..40)) {
            let snapshot = Snapshot::new(records);
            let filter = FilterSpec::Status(ProcessStatus::Running);
            let view = project(&snapshot, Some(&filter), SortKey::Cpu);
            prop_assert!(view.iter().all(|r| r.status == ProcessStatus::Running));
            let expected = snapshot
                .records
                .iter()
                .filter(|r| r.status == ProcessStatus::Running)
                .count();
            prop_assert_eq!(view.len(), expected);
        }

        #[test]
        fn prop_projection_idempotent(records in prop::collection::vec(arb_record(), 0..40)) {
            let snapshot = Snapshot::new(records);
            let filter = FilterSpec::Owner("a".to_string());
            for key in [SortKey::Pid, SortKey::Name, SortKey::Memory, SortKey::Cpu] {
                let first = project(&snapshot, Some(&filter), key);
                let second = project(&snapshot, Some(&filter), key);
                prop_assert_eq!(first.pids(), second.pids());
            }
        }
    }
}
