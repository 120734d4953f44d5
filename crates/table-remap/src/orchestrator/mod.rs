//! Session context: configuration, the live database and the mapping store.
//!
//! Every engine operation goes through an [`Orchestrator`], or through its
//! [`Workspace`] when no database is involved. Planning (`prepare_*`)
//! resolves every target before any DDL is issued; only
//! [`Orchestrator::execute`] changes the database.

mod result;
mod workspace;

use chrono::Utc;
use tracing::{error, info};

use crate::config::Config;
use crate::ddl::{create_table_sql, drop_table_sql};
use crate::db::LiveDatabase;
use crate::error::{RemapError, Result};
use crate::mapping::{suggest_merge, MappingEntry, MergeDraft, StoreLoadReport};
use crate::plan::{resolve_merge, resolve_single, CopyPlan, PlanSource};
use crate::schema::{definition_from_live, LiveColumn, TargetSchema};
use crate::transfer::BatchCopyExecutor;

pub use result::{
    MappingStatus, MigrationResult, PreparedMigration, PreparedTarget, RunStatus, TableStatus,
    TargetOutcome, TargetResult,
};
pub use workspace::Workspace;

/// Migration session.
pub struct Orchestrator<D: LiveDatabase> {
    workspace: Workspace,
    db: D,
}

impl<D: LiveDatabase> Orchestrator<D> {
    /// Open a session, loading the mapping store named by the configuration.
    pub fn new(config: Config, db: D) -> (Self, StoreLoadReport) {
        let (workspace, report) = Workspace::open(config);
        (Self::from_workspace(workspace, db), report)
    }

    /// Attach a database to an already opened workspace.
    pub fn from_workspace(workspace: Workspace, db: D) -> Self {
        Self { workspace, db }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn into_database(self) -> D {
        self.db
    }

    /// Mapping status of every live table.
    pub async fn table_statuses(&mut self) -> Result<Vec<TableStatus>> {
        let tables = self.db.list_tables().await?;
        let schema = self.workspace.schema_for_matching();
        let store = self.workspace.store();

        Ok(tables
            .into_iter()
            .map(|table| {
                let (status, targets) = if let Some(entry) = store.entry_for_source(&table) {
                    let targets = entry.target_schemas().into_iter().map(str::to_string).collect();
                    (MappingStatus::Mapped, targets)
                } else {
                    let merges = store.merges_containing(&table);
                    if !merges.is_empty() {
                        let keys = merges.into_iter().map(|(key, _)| key.to_string()).collect();
                        (MappingStatus::Merged, keys)
                    } else if schema.contains_table(&table) {
                        (MappingStatus::AutoMatch, vec![table.clone()])
                    } else {
                        (MappingStatus::Unmapped, Vec::new())
                    }
                };
                TableStatus {
                    table,
                    status,
                    targets,
                }
            })
            .collect())
    }

    async fn require_tables(&mut self, subject: &str, tables: &[&str]) -> Result<()> {
        let live = self.db.list_tables().await?;
        for table in tables {
            if !live.iter().any(|t| t.as_str() == *table) {
                return Err(RemapError::configuration(
                    subject,
                    format!("source table '{}' does not exist", table),
                ));
            }
        }
        Ok(())
    }

    async fn introspect(&mut self, tables: &[String]) -> Result<Vec<(String, Vec<LiveColumn>)>> {
        let mut described = Vec::with_capacity(tables.len());
        for table in tables {
            let columns = self.db.describe_columns(table).await?;
            described.push((table.clone(), columns));
        }
        Ok(described)
    }

    fn prepared_target(&self, schema: &TargetSchema, plan: CopyPlan) -> Result<PreparedTarget> {
        let migration = &self.workspace.config().migration;
        let destination = migration.destination_table(&plan.target_schema);
        let definition = schema.table(&plan.target_schema).ok_or_else(|| {
            RemapError::configuration(&plan.target_schema, "target schema disappeared")
        })?;
        let drop_sql = if migration.drop_existing {
            Some(drop_table_sql(&destination)?)
        } else {
            None
        };
        Ok(PreparedTarget {
            create_sql: create_table_sql(&destination, definition, &migration.engine)?,
            drop_sql,
            destination,
            plan,
        })
    }

    /// Plan the migration of one source table (single or split mapping).
    pub async fn prepare_table(&mut self, source: &str) -> Result<PreparedMigration> {
        let entry = self.workspace.mapping_for(source)?;
        let schema = self.workspace.target_schema()?;
        self.require_tables(source, &[source]).await?;
        let columns = self.db.describe_columns(source).await?;

        let plans = match &entry {
            MappingEntry::Single(m) => vec![resolve_single(
                source,
                &columns,
                &m.target_schema,
                &m.column_map,
                &schema,
            )?],
            MappingEntry::Split(m) => m
                .targets
                .iter()
                .map(|t| resolve_single(source, &columns, &t.target_schema, &t.column_map, &schema))
                .collect::<Result<Vec<_>>>()?,
            MappingEntry::Merge(_) => {
                return Err(RemapError::configuration(source, "merge entries are prepared by key"));
            }
        };

        let targets = plans
            .into_iter()
            .map(|plan| self.prepared_target(&schema, plan))
            .collect::<Result<Vec<_>>>()?;
        Ok(PreparedMigration {
            source: PlanSource::Table(source.to_string()),
            targets,
        })
    }

    /// Plan a stored merge.
    pub async fn prepare_merge(&mut self, key: &str) -> Result<PreparedMigration> {
        let merge = match self.workspace.store().get(key) {
            Some(MappingEntry::Merge(m)) => m.clone(),
            Some(other) => {
                return Err(RemapError::configuration(
                    key,
                    format!("stored mapping is a {} mapping, not a merge", other.kind()),
                ));
            }
            None => return Err(RemapError::configuration(key, "no such merge")),
        };
        let schema = self.workspace.target_schema()?;
        let tables: Vec<&str> = merge.source_tables.iter().map(String::as_str).collect();
        self.require_tables(key, &tables).await?;
        let sources = self.introspect(&merge.source_tables).await?;

        let plan = resolve_merge(key, &merge, &sources, &schema)?;
        Ok(PreparedMigration {
            source: PlanSource::Merge(key.to_string()),
            targets: vec![self.prepared_target(&schema, plan)?],
        })
    }

    /// Drop, create and copy every target in order. A failing target stops
    /// the remaining ones; completed targets are kept.
    pub async fn execute(&mut self, prepared: &PreparedMigration) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run {} for {}", run_id, prepared.source);

        let executor = BatchCopyExecutor::new(self.workspace.config().migration.batch_size);
        let mut targets = Vec::with_capacity(prepared.targets.len());
        let mut failed = false;
        let mut rows_copied = 0;

        for target in &prepared.targets {
            let outcome = if failed {
                TargetOutcome::Skipped
            } else {
                match self.run_target(&executor, target).await {
                    Ok(report) => {
                        rows_copied += report.rows_copied;
                        TargetOutcome::Copied { report }
                    }
                    Err(e) => {
                        error!("{}: {}", target.destination, e);
                        failed = true;
                        TargetOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };
            targets.push(TargetResult {
                target_schema: target.plan.target_schema.clone(),
                destination: target.destination.clone(),
                outcome,
            });
        }

        let completed_at = Utc::now();
        let result = MigrationResult {
            run_id,
            source: prepared.source.to_string(),
            status: if failed {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            },
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            rows_copied,
            targets,
        };

        info!(
            "Migration of {} {:?}: {} rows into {} tables in {:.1}s",
            result.source,
            result.status,
            result.rows_copied,
            result.targets.len(),
            result.duration_seconds
        );
        Ok(result)
    }

    async fn run_target(
        &mut self,
        executor: &BatchCopyExecutor,
        target: &PreparedTarget,
    ) -> Result<crate::transfer::CopyReport> {
        if let Some(drop_sql) = &target.drop_sql {
            self.db.execute(drop_sql).await?;
        }
        self.db.execute(&target.create_sql).await?;
        info!("Created {}", target.destination);
        executor
            .execute(&mut self.db, &target.plan, &target.destination)
            .await
    }

    /// Draft a merge of `tables` into `target_schema`. Nothing is stored.
    pub async fn suggest_merge(&mut self, tables: &[String], target_schema: &str) -> Result<MergeDraft> {
        let schema = self.workspace.target_schema()?;
        let definition = schema.table(target_schema).ok_or_else(|| {
            RemapError::configuration(
                target_schema,
                "target schema is not in the definition file",
            )
        })?;
        let names: Vec<&str> = tables.iter().map(String::as_str).collect();
        self.require_tables(target_schema, &names).await?;
        let sources = self.introspect(tables).await?;
        suggest_merge(&sources, target_schema, definition)
    }

    /// Draft target schema tables from the live layout. All tables when
    /// `tables` is empty.
    pub async fn export_schema(&mut self, tables: &[String]) -> Result<TargetSchema> {
        let tables = if tables.is_empty() {
            self.db.list_tables().await?
        } else {
            tables.to_vec()
        };
        let mut schema = TargetSchema::default();
        for (table, columns) in self.introspect(&tables).await? {
            schema = schema.with_table(table, definition_from_live(&columns));
        }
        Ok(schema)
    }
}
