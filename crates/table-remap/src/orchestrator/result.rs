//! Prepared migrations and run results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plan::{CopyPlan, PlanRow, PlanSource};
use crate::transfer::CopyReport;

/// Mapping state of a live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    /// Has a stored single or split mapping.
    Mapped,
    /// Is a source of one or more merges.
    Merged,
    /// No stored mapping, but the definition file has a table of the same name.
    AutoMatch,
    Unmapped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub status: MappingStatus,
    /// Target schemas or merge keys involved.
    pub targets: Vec<String>,
}

/// One destination table, ready to run.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedTarget {
    pub destination: String,
    pub drop_sql: Option<String>,
    pub create_sql: String,
    pub plan: CopyPlan,
}

/// Everything needed to migrate one source table or merge. Building it
/// touches nothing in the database beyond introspection.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedMigration {
    pub source: PlanSource,
    pub targets: Vec<PreparedTarget>,
}

impl PreparedMigration {
    /// Lossy conversions across all targets, with their target schema.
    pub fn lossy_conversions(&self) -> Vec<(&str, &PlanRow)> {
        self.targets
            .iter()
            .flat_map(|t| {
                t.plan
                    .lossy_conversions()
                    .into_iter()
                    .map(move |row| (t.plan.target_schema.as_str(), row))
            })
            .collect()
    }

    pub fn has_lossy(&self) -> bool {
        self.targets.iter().any(|t| t.plan.has_lossy())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Copied { report: CopyReport },
    Failed { error: String },
    /// Not attempted because an earlier target of the same source failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub target_schema: String,
    pub destination: String,
    pub outcome: TargetOutcome,
}

/// Result of executing a prepared migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,
    pub source: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub rows_copied: u64,
    pub targets: Vec<TargetResult>,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Error text of the failed target, if any.
    pub fn failure(&self) -> Option<&str> {
        self.targets.iter().find_map(|t| match &t.outcome {
            TargetOutcome::Failed { error } => Some(error.as_str()),
            _ => None,
        })
    }
}
