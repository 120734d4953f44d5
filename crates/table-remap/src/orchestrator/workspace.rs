//! Session state that needs no database: configuration, the definition file
//! and the mapping store.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{RemapError, Result};
use crate::mapping::{
    ColumnMap, MappingEntry, MappingStore, MergeDraft, MergeMapping, SingleMapping, SplitTarget,
    StoreLoadReport,
};
use crate::schema::TargetSchema;

/// Configuration plus mapping store. Every mapping edit goes through here.
pub struct Workspace {
    config: Config,
    store: MappingStore,
}

impl Workspace {
    /// Open the mapping store named by the configuration.
    pub fn open(config: Config) -> (Self, StoreLoadReport) {
        let (store, report) = MappingStore::open(&config.files.mapping_file);
        info!(
            "Loaded {} mappings from {:?}",
            store.len(),
            config.files.mapping_file
        );
        (Self { config, store }, report)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Override the copy batch size for this session.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.config.migration.batch_size = batch_size.max(1);
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Re-parse the definition file. A partial parse is used with a warning;
    /// a file that yields nothing is an error.
    pub fn target_schema(&self) -> Result<TargetSchema> {
        let loaded = TargetSchema::load(&self.config.files.schema_file);
        match loaded.error {
            Some(err) if loaded.schema.is_empty() => Err(err),
            Some(err) => {
                warn!(
                    "{}; continuing with {} tables parsed before the error",
                    err,
                    loaded.schema.len()
                );
                Ok(loaded.schema)
            }
            None => Ok(loaded.schema),
        }
    }

    /// Definition file for name matching; unreadable means nothing matches.
    pub(crate) fn schema_for_matching(&self) -> TargetSchema {
        self.target_schema().unwrap_or_else(|e| {
            warn!("Auto-matching disabled: {}", e);
            TargetSchema::default()
        })
    }

    /// Stored single/split entry for `source`, or a provisional single mapping
    /// when the definition file has a table of the same name.
    pub fn mapping_for(&self, source: &str) -> Result<MappingEntry> {
        self.store.mapping_for(source, &self.schema_for_matching())
    }

    fn warn_unknown_targets(&self, targets: &[&str]) {
        let Ok(schema) = self.target_schema() else {
            return;
        };
        for target in targets {
            if !schema.contains_table(target) {
                warn!("Target schema '{}' is not in the definition file", target);
            }
        }
    }

    pub fn map_single(&mut self, source: &str, target_schema: &str, column_map: ColumnMap) -> Result<()> {
        self.warn_unknown_targets(&[target_schema]);
        self.store.put_single(SingleMapping {
            source_table: source.to_string(),
            target_schema: target_schema.to_string(),
            column_map,
        })
    }

    pub fn map_split(&mut self, source: &str, targets: Vec<SplitTarget>) -> Result<()> {
        let names: Vec<&str> = targets.iter().map(|t| t.target_schema.as_str()).collect();
        self.warn_unknown_targets(&names);
        self.store.put_split(source, targets)
    }

    /// Store a merge and return its key.
    pub fn map_merge(&mut self, merge: MergeMapping) -> Result<String> {
        self.warn_unknown_targets(&[merge.target_schema.as_str()]);
        self.store.put_merge(merge)
    }

    /// Store a draft as a merge mapping. Drafts with unresolved joins are refused.
    pub fn save_merge_draft(&mut self, draft: MergeDraft) -> Result<String> {
        if !draft.unresolved_joins.is_empty() {
            return Err(RemapError::configuration(
                &draft.target_schema,
                format!(
                    "join condition missing for {}; edit the join clause and save with map-merge",
                    draft.unresolved_joins.join(", ")
                ),
            ));
        }
        if !draft.unmapped.is_empty() {
            warn!(
                "Saving merge with unmapped target columns: {}",
                draft.unmapped.join(", ")
            );
        }
        self.store.put_merge(draft.into_mapping())
    }

    pub fn unmap(&mut self, key: &str) -> Result<Option<MappingEntry>> {
        self.store.remove(key)
    }
}
