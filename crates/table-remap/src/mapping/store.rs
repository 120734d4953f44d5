//! Durable mapping store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::entry::{MappingEntry, MergeMapping, SingleMapping, SplitMapping, SplitTarget};
use super::legacy::{decode_entry, Decoded, LegacyShape};
use crate::error::{RemapError, Result};
use crate::schema::TargetSchema;

/// All mapping entries, persisted as one JSON object.
///
/// Every mutation validates, then saves atomically (temp file + rename). If
/// either step fails the in-memory store is left as it was.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    entries: BTreeMap<String, MappingEntry>,
}

/// What happened while opening a store.
#[derive(Debug, Default)]
pub struct StoreLoadReport {
    /// Keys upgraded from an older shape.
    pub upgraded: Vec<(String, LegacyShape)>,
    /// Keys that could not be decoded, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Set when the whole file was unreadable; the store starts empty.
    pub corruption: Option<RemapError>,
}

impl StoreLoadReport {
    pub fn is_clean(&self) -> bool {
        self.upgraded.is_empty() && self.skipped.is_empty() && self.corruption.is_none()
    }
}

impl MappingStore {
    /// An empty store that will save to `path`.
    pub fn empty<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    /// Open the store at `path`. Never fails: a missing file gives an empty
    /// store, a corrupt one gives an empty store plus a report.
    pub fn open<P: AsRef<Path>>(path: P) -> (Self, StoreLoadReport) {
        let mut store = Self::empty(path);
        let mut report = StoreLoadReport::default();

        if !store.path.exists() {
            debug!("Mapping store {:?} does not exist, starting empty", store.path);
            return (store, report);
        }

        let root = match std::fs::read_to_string(&store.path) {
            Ok(content) if content.trim().is_empty() => return (store, report),
            Ok(content) => serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let object = match root {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                report.corruption = Some(store.corruption("top level is not a JSON object"));
                return (store, report);
            }
            Err(message) => {
                report.corruption = Some(store.corruption(message));
                return (store, report);
            }
        };
        // Entries are admitted in file order; a later entry that conflicts
        // with an admitted one is skipped.
        for (key, value) in object {
            let entry = match decode_entry(&key, value) {
                Decoded::Current(entry) => entry,
                Decoded::Upgraded(entry, shape) => {
                    info!("Upgraded mapping '{}' from legacy {:?} format", key, shape);
                    report.upgraded.push((key.clone(), shape));
                    entry
                }
                Decoded::Unrecognized(reason) => {
                    warn!("Skipping unrecognized mapping '{}': {}", key, reason);
                    report.skipped.push((key, reason));
                    continue;
                }
            };
            if let Err(e) = entry
                .validate()
                .and_then(|_| store.check_exclusive(&key, &entry))
            {
                warn!("Skipping invalid mapping '{}': {}", key, e);
                report.skipped.push((key, e.to_string()));
                continue;
            }
            store.entries.insert(key, entry);
        }

        (store, report)
    }

    fn corruption(&self, message: impl Into<String>) -> RemapError {
        let err = RemapError::StoreCorruption {
            path: self.path.clone(),
            message: message.into(),
        };
        warn!("{}; starting with an empty store", err);
        err
    }

    /// Write the store to disk (atomic write).
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!("Saved {} mappings to {:?}", self.entries.len(), self.path);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    /// The single or split entry reading `table`, if any.
    pub fn entry_for_source(&self, table: &str) -> Option<&MappingEntry> {
        if let Some(entry) = self.entries.get(table) {
            if !matches!(entry, MappingEntry::Merge(_)) {
                return Some(entry);
            }
        }
        self.entries.values().find(|entry| match entry {
            MappingEntry::Single(m) => m.source_table == table,
            MappingEntry::Split(m) => m.source_table == table,
            MappingEntry::Merge(_) => false,
        })
    }

    /// Merge entries naming `table` as a source, with their keys.
    pub fn merges_containing(&self, table: &str) -> Vec<(&str, &MergeMapping)> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| match entry {
                MappingEntry::Merge(m) if m.contains_source(table) => Some((key.as_str(), m)),
                _ => None,
            })
            .collect()
    }

    /// Stored single/split entry for `source`, or a provisional single
    /// mapping when `schema` has a table of the same name. Sources of a merge
    /// are migrated through the merge.
    pub fn mapping_for(&self, source: &str, schema: &TargetSchema) -> Result<MappingEntry> {
        if let Some(entry) = self.entry_for_source(source) {
            return Ok(entry.clone());
        }
        if let Some((key, _)) = self.merges_containing(source).first() {
            return Err(RemapError::configuration(
                source,
                format!("table is a source of merge '{}'; migrate the merge instead", key),
            ));
        }
        if schema.contains_table(source) {
            debug!("No stored mapping for '{}', auto-matching by name", source);
            return Ok(MappingEntry::Single(SingleMapping::new(source, source)));
        }
        Err(RemapError::configuration(
            source,
            "no mapping stored and no target schema of the same name",
        ))
    }

    pub fn put_single(&mut self, mapping: SingleMapping) -> Result<()> {
        self.put(MappingEntry::Single(mapping)).map(|_| ())
    }

    pub fn put_split(&mut self, source_table: impl Into<String>, targets: Vec<SplitTarget>) -> Result<()> {
        let entry = MappingEntry::Split(SplitMapping {
            source_table: source_table.into(),
            targets,
        });
        self.put(entry).map(|_| ())
    }

    /// Store a merge and return its key.
    pub fn put_merge(&mut self, mapping: MergeMapping) -> Result<String> {
        self.put(MappingEntry::Merge(mapping))
    }

    /// Insert or replace an entry under its key.
    pub fn put(&mut self, entry: MappingEntry) -> Result<String> {
        entry.validate()?;
        let key = entry.key();
        self.check_exclusive(&key, &entry)?;

        let previous = self.entries.insert(key.clone(), entry);
        if let Err(e) = self.save() {
            match previous {
                Some(prev) => self.entries.insert(key, prev),
                None => self.entries.remove(&key),
            };
            return Err(e);
        }
        info!("Saved mapping '{}'", key);
        Ok(key)
    }

    /// Remove an entry. Returns the removed entry, or `None` if absent.
    pub fn remove(&mut self, key: &str) -> Result<Option<MappingEntry>> {
        let Some(removed) = self.entries.remove(key) else {
            return Ok(None);
        };
        if let Err(e) = self.save() {
            self.entries.insert(key.to_string(), removed);
            return Err(e);
        }
        info!("Removed mapping '{}'", key);
        Ok(Some(removed))
    }

    /// A source table is either in one single/split entry or in merges, never both.
    fn check_exclusive(&self, key: &str, entry: &MappingEntry) -> Result<()> {
        match entry {
            MappingEntry::Single(SingleMapping { source_table: source, .. })
            | MappingEntry::Split(SplitMapping { source_table: source, .. }) => {
                if let Some(existing) = self.entry_for_source(source) {
                    if existing.key() != key {
                        return Err(RemapError::configuration(
                            key,
                            format!("'{}' is already mapped by '{}'", source, existing.key()),
                        ));
                    }
                }
                if let Some((merge_key, _)) = self.merges_containing(source).first() {
                    return Err(RemapError::configuration(
                        key,
                        format!("'{}' is a source of merge '{}'", source, merge_key),
                    ));
                }
            }
            MappingEntry::Merge(m) => {
                for table in &m.source_tables {
                    if let Some(existing) = self.entry_for_source(table) {
                        return Err(RemapError::configuration(
                            key,
                            format!("'{}' already has a {} mapping", table, existing.kind()),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
