//! Record Table and Path Resolution
//!
//! Records are collected concurrently into a `TableBuilder` during ingestion.
//! `finish()` is the ingestion barrier: it yields the `Table`, ordered by
//! record number, which the `PathResolver` then walks once to fill in every
//! record's display path.

use crate::logging::Diagnostics;
use crate::ntfs::{Record, ROOT_RECORD_NUMBER};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};

/// Path of a record without any $FILE_NAME attribute
pub const NO_FN_RECORD: &str = "NoFNRecord";
/// Path of a record whose parent is not in the table
pub const ORPHAN: &str = "Orphan";
/// Prefix for records that name themselves as parent
pub const SELF_PARENT_PREFIX: &str = "ORPHAN/";
/// Path of records on a parent cycle
pub const CIRCULAR_REFERENCE: &str = "Circular_Reference";

// ============================================================================
// Table Builder
// ============================================================================

/// Insert-only record collection, safe for concurrent writers
#[derive(Default)]
pub struct TableBuilder {
    records: DashMap<u64, Record>,
}

/// Outcome of inserting a record whose number was already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displaced {
    pub record_number: u64,
    /// Source index of the block that was dropped
    pub dropped_index: u64,
    /// Source index of the block that was kept
    pub kept_index: u64,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record keyed by its header record number. When two blocks
    /// claim the same number the one read first wins, whatever order the
    /// workers finish in.
    pub fn insert(&self, record: Record) -> Option<Displaced> {
        let record_number = record.record_number();
        match self.records.entry(record_number) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                None
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get().source_index;
                if record.source_index < existing {
                    let kept_index = record.source_index;
                    slot.insert(record);
                    Some(Displaced {
                        record_number,
                        dropped_index: existing,
                        kept_index,
                    })
                } else {
                    Some(Displaced {
                        record_number,
                        dropped_index: record.source_index,
                        kept_index: existing,
                    })
                }
            }
        }
    }

    /// Close ingestion and hand over the collected records
    pub fn finish(self) -> Table {
        Table {
            records: self.records.into_iter().collect(),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// All decoded records, keyed and ordered by record number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    records: BTreeMap<u64, Record>,
}

/// Statistics about the table
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TableStats {
    pub total_records: u64,
    pub in_use: u64,
    pub directories: u64,
    /// $STANDARD_INFORMATION carries the hidden attribute
    pub hidden: u64,
    /// $STANDARD_INFORMATION carries the system attribute
    pub system: u64,
    pub with_file_name: u64,
    pub no_file_name: u64,
    pub orphaned: u64,
    pub circular: u64,
    pub usec_zero: u64,
    pub si_fn_shift: u64,
    pub with_notes: u64,
}

impl Table {
    /// Build a table directly from records. Of records sharing a number, the
    /// one with the lowest `source_index` is kept.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let builder = TableBuilder::new();
        for record in records {
            builder.insert(record);
        }
        builder.finish()
    }

    /// Get a record by record number
    pub fn get(&self, record_number: u64) -> Option<&Record> {
        self.records.get(&record_number)
    }

    pub fn contains(&self, record_number: u64) -> bool {
        self.records.contains_key(&record_number)
    }

    /// Get total number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records in record-number order
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.values()
    }

    /// Resolve every unresolved path
    pub fn resolve_paths(&mut self, log: &dyn Diagnostics) -> ResolveStats {
        PathResolver::new(self).resolve_all(log)
    }

    /// Compute statistics over the current state of the table
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats::default();

        for record in self.records.values() {
            stats.total_records += 1;
            if record.header.is_in_use() {
                stats.in_use += 1;
            }
            if record.header.is_directory() {
                stats.directories += 1;
            }
            if let Some(si) = &record.standard_information {
                if si.is_hidden() {
                    stats.hidden += 1;
                }
                if si.is_system() {
                    stats.system += 1;
                }
            }
            if record.fncnt() > 0 {
                stats.with_file_name += 1;
            } else {
                stats.no_file_name += 1;
            }
            if record.path() == ORPHAN || record.path().starts_with(SELF_PARENT_PREFIX) {
                stats.orphaned += 1;
            }
            if record.path().starts_with(CIRCULAR_REFERENCE) {
                stats.circular += 1;
            }
            if record.usec_zero {
                stats.usec_zero += 1;
            }
            if record.si_fn_shift {
                stats.si_fn_shift += 1;
            }
            if !record.notes.is_empty() {
                stats.with_notes += 1;
            }
        }

        stats
    }
}

// ============================================================================
// Path Resolver
// ============================================================================

/// Counts from one resolver pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResolveStats {
    /// Paths written during this pass
    pub resolved: u64,
    pub no_file_name: u64,
    pub orphans: u64,
    pub self_parent: u64,
    pub circular: u64,
}

/// Fills in `Record::path` for every record of a finished table.
///
/// Parent chains are followed with an explicit stack, so chain depth is
/// bounded by memory, not by the call stack. Every path is stored as soon as
/// it is known, so each record is resolved once per table.
pub struct PathResolver<'a> {
    records: &'a mut BTreeMap<u64, Record>,
    stats: ResolveStats,
}

impl<'a> PathResolver<'a> {
    pub fn new(table: &'a mut Table) -> Self {
        Self {
            records: &mut table.records,
            stats: ResolveStats::default(),
        }
    }

    /// Resolve every record whose path is still empty
    pub fn resolve_all(mut self, log: &dyn Diagnostics) -> ResolveStats {
        let pending: Vec<u64> = self
            .records
            .iter()
            .filter(|(_, r)| !r.is_resolved())
            .map(|(&n, _)| n)
            .collect();

        log.info("PATHS", &format!("Resolving {} of {} records", pending.len(), self.records.len()));

        for record_number in pending {
            self.resolve(record_number);
        }

        log.info(
            "PATHS",
            &format!(
                "Resolved {} paths: {} without name, {} orphaned, {} self-parented, {} circular",
                self.stats.resolved,
                self.stats.no_file_name,
                self.stats.orphans,
                self.stats.self_parent,
                self.stats.circular
            ),
        );

        self.stats
    }

    /// Resolve one record (and any unresolved ancestors) and return its path.
    /// `None` if the record is not in the table.
    pub fn resolve(&mut self, record_number: u64) -> Option<String> {
        let record = self.records.get(&record_number)?;
        if record.is_resolved() {
            return Some(record.path().to_string());
        }
        if record.fncnt() == 0 {
            self.store(record_number, NO_FN_RECORD.to_string());
            self.stats.no_file_name += 1;
            return Some(NO_FN_RECORD.to_string());
        }

        // Records waiting for their parent's path, child first
        let mut chain: Vec<u64> = Vec::new();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut current = record_number;

        // Walk up until a path is known, then unwind `chain` on top of it
        let base = loop {
            if !visited.insert(current) {
                // Everything from the first visit of `current` onwards is the cycle
                let start = chain.iter().position(|&n| n == current).unwrap_or(0);
                for member in chain.drain(start..) {
                    self.store(member, CIRCULAR_REFERENCE.to_string());
                    self.stats.circular += 1;
                }
                break CIRCULAR_REFERENCE.to_string();
            }

            // Parents are only followed once confirmed present
            let Some(record) = self.records.get(&current) else {
                break ORPHAN.to_string();
            };

            if record.is_resolved() {
                break record.path().to_string();
            }

            let (Some(parent), Some(name)) = (record.parent_record_number(), record.display_name()) else {
                self.store(current, NO_FN_RECORD.to_string());
                self.stats.no_file_name += 1;
                break NO_FN_RECORD.to_string();
            };

            if parent == ROOT_RECORD_NUMBER {
                let path = format!("/{}", name);
                self.store(current, path.clone());
                break path;
            }

            if parent == current {
                let path = format!("{}{}", SELF_PARENT_PREFIX, name);
                self.store(current, path.clone());
                self.stats.self_parent += 1;
                break path;
            }

            if !self.records.contains_key(&parent) {
                self.store(current, ORPHAN.to_string());
                self.stats.orphans += 1;
                break ORPHAN.to_string();
            }

            chain.push(current);
            current = parent;
        };

        let mut parent_path = base;
        while let Some(child) = chain.pop() {
            let name = self
                .records
                .get(&child)
                .and_then(|r| r.display_name())
                .unwrap_or_default();
            let path = format!("{}/{}", parent_path, name);
            self.store(child, path.clone());
            parent_path = path;
        }

        self.records.get(&record_number).map(|r| r.path().to_string())
    }

    fn store(&mut self, record_number: u64, path: String) {
        if let Some(record) = self.records.get_mut(&record_number) {
            if !record.is_resolved() {
                record.set_path(path);
                self.stats.resolved += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{self, MemoryLogger};
    use crate::ntfs::time::WindowsTimestamp;
    use crate::ntfs::{FileNameAttribute, FilenameNamespace, RecordHeader, StandardInformation};

    fn fn_attr(parent: u64, name: &str) -> FileNameAttribute {
        let ts = WindowsTimestamp::from_ticks(0, false);
        FileNameAttribute {
            parent_reference: parent,
            creation_time: ts,
            modification_time: ts,
            mft_modification_time: ts,
            access_time: ts,
            allocated_size: 0,
            real_size: 0,
            flags: 0,
            name_length: name.encode_utf16().count() as u8,
            namespace: FilenameNamespace::Win32,
            name: name.to_string(),
        }
    }

    fn record(number: u32, names: &[(u64, &str)]) -> Record {
        let header = RecordHeader {
            record_number: number,
            flags: 1,
            ..Default::default()
        };
        let mut record = Record::new(header, number as u64);
        for &(parent, name) in names {
            record.file_names.push(fn_attr(parent, name));
        }
        record
    }

    fn resolved(records: Vec<Record>) -> Table {
        let mut table = Table::from_records(records);
        table.resolve_paths(&*logging::null());
        table
    }

    fn path(table: &Table, n: u64) -> &str {
        table.get(n).unwrap().path()
    }

    #[test]
    fn root_children() {
        let table = resolved(vec![record(5, &[(5, ".")]), record(30, &[(5, "Windows")])]);
        assert_eq!(path(&table, 5), "/.");
        assert_eq!(path(&table, 30), "/Windows");
    }

    #[test]
    fn nested_forward_and_backward_references() {
        let table = resolved(vec![
            record(10, &[(200, "deep.txt")]),
            record(200, &[(31, "System32")]),
            record(31, &[(5, "Windows")]),
        ]);
        assert_eq!(path(&table, 31), "/Windows");
        assert_eq!(path(&table, 200), "/Windows/System32");
        assert_eq!(path(&table, 10), "/Windows/System32/deep.txt");
    }

    #[test]
    fn first_parent_last_name() {
        let table = resolved(vec![
            record(40, &[(41, "PROGRA~1"), (99, "Program Files")]),
            record(41, &[(5, "data")]),
        ]);
        assert_eq!(path(&table, 40), "/data/Program Files");
        assert_eq!(table.get(40).unwrap().fncnt(), 2);
    }

    #[test]
    fn sentinels() {
        let table = resolved(vec![
            record(50, &[]),
            record(51, &[(51, "self")]),
            record(52, &[(777, "lost")]),
            record(53, &[(52, "under_lost")]),
            record(54, &[(50, "under_nameless")]),
        ]);
        assert_eq!(path(&table, 50), NO_FN_RECORD);
        assert_eq!(path(&table, 51), "ORPHAN/self");
        assert_eq!(path(&table, 52), ORPHAN);
        assert_eq!(path(&table, 53), "Orphan/under_lost");
        assert_eq!(path(&table, 54), "NoFNRecord/under_nameless");
    }

    #[test]
    fn three_node_cycle() {
        let table = resolved(vec![
            record(60, &[(61, "a")]),
            record(61, &[(62, "b")]),
            record(62, &[(60, "c")]),
        ]);
        for n in 60..=62 {
            assert_eq!(path(&table, n), CIRCULAR_REFERENCE);
        }
    }

    #[test]
    fn chain_into_cycle_keeps_its_names() {
        // Resolving 70 first walks 70 -> 80 -> 81 -> 80
        let table = resolved(vec![
            record(70, &[(80, "entry")]),
            record(80, &[(81, "x")]),
            record(81, &[(80, "y")]),
            record(90, &[(81, "late")]),
        ]);
        assert_eq!(path(&table, 80), CIRCULAR_REFERENCE);
        assert_eq!(path(&table, 81), CIRCULAR_REFERENCE);
        assert_eq!(path(&table, 70), "Circular_Reference/entry");
        assert_eq!(path(&table, 90), "Circular_Reference/late");
    }

    #[test]
    fn idempotent() {
        let mut table = Table::from_records(vec![
            record(5, &[(5, ".")]),
            record(20, &[(5, "Users")]),
            record(21, &[(20, "alice")]),
            record(22, &[(23, "p")]),
            record(23, &[(22, "q")]),
        ]);
        let log = MemoryLogger::new();
        let first = table.resolve_paths(&log);
        let snapshot = table.clone();
        let second = table.resolve_paths(&log);

        assert_eq!(first.resolved, 5);
        assert_eq!(second.resolved, 0);
        assert_eq!(table, snapshot);
        assert!(log.entries().iter().any(|e| e.module == "PATHS"));
    }

    #[test]
    fn long_chain_resolves_iteratively() {
        const DEPTH: u32 = 10_000;
        let mut records = vec![record(6, &[(5, "d6")])];
        for n in 7..DEPTH {
            records.push(record(n, &[(n as u64 - 1, "d")]));
        }
        let table = resolved(records);
        let leaf = path(&table, DEPTH as u64 - 1);
        assert!(leaf.starts_with("/d6/d/d/"));
        assert_eq!(leaf.matches('/').count(), (DEPTH - 6) as usize);
    }

    #[test]
    fn sequence_bits_are_ignored() {
        let parent_ref = (4u64 << 48) | 5;
        let table = resolved(vec![record(33, &[(parent_ref, "seq")])]);
        assert_eq!(path(&table, 33), "/seq");
    }

    #[test]
    fn duplicate_record_numbers_keep_first_block() {
        let builder = TableBuilder::new();
        let mut late = record(7, &[(5, "late")]);
        late.source_index = 10;
        let mut early = record(7, &[(5, "early")]);
        early.source_index = 2;

        assert!(builder.insert(late).is_none());
        let displaced = builder.insert(early).unwrap();
        assert_eq!(displaced.dropped_index, 10);
        assert_eq!(displaced.kept_index, 2);

        let table = builder.finish();
        assert_eq!(table.get(7).unwrap().display_name(), Some("early"));
        assert_eq!(table.get(7).unwrap().source_index, 2);
    }

    #[test]
    fn from_records_keeps_lowest_source_index() {
        let mut late = record(8, &[(5, "late")]);
        late.source_index = 9;
        let mut early = record(8, &[(5, "early")]);
        early.source_index = 1;

        let table = resolved(vec![late, early]);
        assert_eq!(path(&table, 8), "/early");
    }

    #[test]
    fn stats_follow_paths() {
        let table = resolved(vec![
            record(5, &[(5, ".")]),
            record(50, &[]),
            record(52, &[(777, "lost")]),
            record(60, &[(61, "a")]),
            record(61, &[(60, "b")]),
        ]);
        let stats = table.stats();
        assert_eq!(stats.total_records, 5);
        assert_eq!(stats.no_file_name, 1);
        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.circular, 2);
        assert_eq!(stats.hidden, 0);
    }

    fn standard_information(dos_flags: u32) -> StandardInformation {
        let mut content = vec![0u8; 72];
        content[32..36].copy_from_slice(&dos_flags.to_le_bytes());
        StandardInformation::parse(&content, 0, false).unwrap()
    }

    #[test]
    fn stats_count_hidden_and_system() {
        let mut hidden = record(20, &[(5, "pagefile.sys")]);
        hidden.standard_information = Some(standard_information(0x02 | 0x04));
        let mut plain = record(21, &[(5, "readme.txt")]);
        plain.standard_information = Some(standard_information(0x20));
        let mut system = record(22, &[(5, "bootmgr")]);
        system.standard_information = Some(standard_information(0x04));
        let bare = record(23, &[(5, "no_si")]);

        let stats = resolved(vec![hidden, plain, system, bare]).stats();
        assert_eq!(stats.hidden, 1);
        assert_eq!(stats.system, 2);
    }
}
