//! Batched `INSERT ... SELECT` copy.
//!
//! Each batch is its own transaction. A failing batch is rolled back and the
//! copy stops; batches committed before it stay committed and the error says
//! how many rows they hold.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::LiveDatabase;
use crate::error::{RemapError, Result};
use crate::identifier::quote;
use crate::plan::CopyPlan;

/// Server warnings logged per batch; the rest are only counted.
const MAX_LOGGED_WARNINGS: usize = 5;

/// Outcome of copying one plan.
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub destination: String,
    pub rows_copied: u64,
    /// Rows per non-empty batch, in order.
    pub batch_sizes: Vec<u64>,
    /// Advisory `COUNT(*)` of the representative table, if it succeeded.
    pub estimated_rows: Option<i64>,
    /// False when the copied total differs from the estimate.
    pub reconciled: bool,
    pub warning_count: usize,
    pub elapsed: Duration,
}

impl CopyReport {
    pub fn batches(&self) -> usize {
        self.batch_sizes.len()
    }
}

/// Runs a copy plan in bounded batches.
#[derive(Debug, Clone)]
pub struct BatchCopyExecutor {
    batch_size: usize,
}

impl BatchCopyExecutor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// `INSERT ... SELECT` for the batch starting at `offset`.
    pub fn batch_sql(&self, plan: &CopyPlan, destination: &str, offset: u64) -> Result<String> {
        Ok(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
            quote(destination)?,
            plan.insert_columns()?,
            plan.select_clause(),
            plan.from_clause,
            plan.order_by()?,
            self.batch_size,
            offset
        ))
    }

    /// Copy all rows described by `plan` into `destination`, which must exist.
    pub async fn execute<D>(&self, db: &mut D, plan: &CopyPlan, destination: &str) -> Result<CopyReport>
    where
        D: LiveDatabase + ?Sized,
    {
        let start = Instant::now();
        let count_sql = format!("SELECT COUNT(*) FROM {}", quote(&plan.representative_table)?);
        let estimated_rows = match db.count(&count_sql).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(
                    "{}: row estimate for {} failed, continuing without it: {}",
                    destination, plan.representative_table, e
                );
                None
            }
        };

        info!(
            "Copying {} into {} ({} columns, ~{} rows, batch size {})",
            plan.source,
            destination,
            plan.rows.len(),
            estimated_rows.map_or_else(|| "?".to_string(), |n| n.to_string()),
            self.batch_size
        );

        let mut rows_copied: u64 = 0;
        let mut batch_sizes = Vec::new();
        let mut warning_count = 0;
        let mut offset: u64 = 0;

        for batch in 1.. {
            let sql = self.batch_sql(plan, destination, offset)?;
            let affected = match self.run_batch(db, &sql, destination, &mut warning_count).await {
                Ok(affected) => affected,
                Err(e) => {
                    return Err(RemapError::BatchFailed {
                        table: destination.to_string(),
                        batch,
                        committed_rows: rows_copied,
                        message: e.to_string(),
                    });
                }
            };

            if affected > 0 {
                rows_copied += affected;
                batch_sizes.push(affected);
                match estimated_rows {
                    Some(total) if total > 0 => info!(
                        "{}: batch {} copied {} rows ({}/{})",
                        destination, batch, affected, rows_copied, total
                    ),
                    _ => info!("{}: batch {} copied {} rows", destination, batch, affected),
                }
            }

            if affected < self.batch_size as u64 {
                break;
            }
            offset += self.batch_size as u64;
        }

        let reconciled = match estimated_rows {
            Some(total) if total != rows_copied as i64 => {
                warn!(
                    "{}: copied {} rows but the source count was {}",
                    destination, rows_copied, total
                );
                false
            }
            _ => true,
        };

        let elapsed = start.elapsed();
        info!(
            "{}: copied {} rows in {} batches in {:?}",
            destination,
            rows_copied,
            batch_sizes.len(),
            elapsed
        );

        Ok(CopyReport {
            destination: destination.to_string(),
            rows_copied,
            batch_sizes,
            estimated_rows,
            reconciled,
            warning_count,
            elapsed,
        })
    }

    /// One transaction: begin, insert, collect warnings, commit. Rolls back on error.
    async fn run_batch<D>(&self, db: &mut D, sql: &str, destination: &str, warning_count: &mut usize) -> Result<u64>
    where
        D: LiveDatabase + ?Sized,
    {
        db.begin().await?;

        let affected = match db.execute(sql).await {
            Ok(affected) => affected,
            Err(e) => {
                rollback(db, destination).await;
                return Err(e);
            }
        };

        match db.warnings().await {
            Ok(warnings) if !warnings.is_empty() => {
                for w in warnings.iter().take(MAX_LOGGED_WARNINGS) {
                    warn!("{}: {}", destination, w);
                }
                if warnings.len() > MAX_LOGGED_WARNINGS {
                    warn!(
                        "{}: {} more warnings not shown",
                        destination,
                        warnings.len() - MAX_LOGGED_WARNINGS
                    );
                }
                *warning_count += warnings.len();
            }
            Ok(_) => {}
            Err(e) => debug!("{}: could not fetch warnings: {}", destination, e),
        }

        if let Err(e) = db.commit().await {
            rollback(db, destination).await;
            return Err(e);
        }
        Ok(affected)
    }
}

async fn rollback<D>(db: &mut D, destination: &str)
where
    D: LiveDatabase + ?Sized,
{
    if let Err(e) = db.rollback().await {
        warn!("{}: rollback failed: {}", destination, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbWarning, MemoryDatabase};
    use crate::plan::{PlanRow, PlanSource};
    use crate::schema::LiveColumn;
    use crate::typemap::ConversionVerdict;

    fn plan(order_key: &[&str]) -> CopyPlan {
        CopyPlan {
            source: PlanSource::Table("src".to_string()),
            target_schema: "dst".to_string(),
            rows: vec![PlanRow {
                select_expression: "`id`".to_string(),
                target_column: "id".to_string(),
                cast_required: false,
                cast_type: None,
                source_type: "int".to_string(),
                dest_type: "INT".to_string(),
                verdict: ConversionVerdict::Safe,
            }],
            from_clause: "`src`".to_string(),
            representative_table: "src".to_string(),
            order_key: order_key.iter().map(|k| k.to_string()).collect(),
            added_columns: vec![],
            skipped_columns: vec![],
        }
    }

    fn db(rows: u64) -> MemoryDatabase {
        MemoryDatabase::new()
            .with_table("src", vec![LiveColumn::new("id", "int").primary()], rows)
            .with_table("dst_new", vec![], 0)
    }

    #[test]
    fn test_batch_sql() {
        let executor = BatchCopyExecutor::new(5000);
        assert_eq!(
            executor.batch_sql(&plan(&["id"]), "dst_new", 10_000).unwrap(),
            "INSERT INTO `dst_new` (`id`) SELECT `id` FROM `src` ORDER BY `src`.`id` LIMIT 5000 OFFSET 10000"
        );
        assert!(executor
            .batch_sql(&plan(&[]), "dst_new", 0)
            .unwrap()
            .contains("ORDER BY NULL LIMIT"));
    }

    #[tokio::test]
    async fn test_rows_split_into_batches() {
        for (rows, batch_size, expected) in [
            (12u64, 5usize, vec![5u64, 5, 2]),
            (10, 5, vec![5, 5]),
            (3, 5, vec![3]),
            (0, 5, vec![]),
        ] {
            let mut db = db(rows);
            let report = BatchCopyExecutor::new(batch_size)
                .execute(&mut db, &plan(&["id"]), "dst_new")
                .await
                .unwrap();

            assert_eq!(report.rows_copied, rows);
            assert_eq!(report.batch_sizes, expected);
            assert_eq!(report.batches() as u64, rows.div_ceil(batch_size as u64));
            assert!(report.reconciled);
            assert_eq!(db.row_count("dst_new"), Some(rows));
        }
    }

    #[tokio::test]
    async fn test_each_batch_is_committed() {
        let mut db = db(7);
        BatchCopyExecutor::new(5)
            .execute(&mut db, &plan(&["id"]), "dst_new")
            .await
            .unwrap();
        assert_eq!(db.statements_starting_with("START TRANSACTION").len(), 2);
        assert_eq!(db.statements_starting_with("COMMIT").len(), 2);
        assert!(db.statements_starting_with("ROLLBACK").is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_batches() {
        let mut db = db(12).fail_insert_at(2);
        let err = BatchCopyExecutor::new(5)
            .execute(&mut db, &plan(&["id"]), "dst_new")
            .await
            .unwrap_err();

        match err {
            RemapError::BatchFailed {
                batch,
                committed_rows,
                ..
            } => {
                assert_eq!(batch, 2);
                assert_eq!(committed_rows, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(db.row_count("dst_new"), Some(5));
        assert_eq!(db.statements_starting_with("ROLLBACK").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let mut db = db(12).fail_commit_at(1);
        let err = BatchCopyExecutor::new(5)
            .execute(&mut db, &plan(&["id"]), "dst_new")
            .await
            .unwrap_err();
        assert!(matches!(err, RemapError::BatchFailed { committed_rows: 0, .. }));
        assert_eq!(db.row_count("dst_new"), Some(0));
    }

    #[tokio::test]
    async fn test_count_failure_is_advisory() {
        let mut db = db(4).fail_count();
        let report = BatchCopyExecutor::new(5)
            .execute(&mut db, &plan(&[]), "dst_new")
            .await
            .unwrap();
        assert_eq!(report.rows_copied, 4);
        assert_eq!(report.estimated_rows, None);
        assert!(report.reconciled);
    }

    #[tokio::test]
    async fn test_warnings_are_counted() {
        let warning = DbWarning {
            level: "Warning".to_string(),
            code: 1265,
            message: "Data truncated for column 'amount'".to_string(),
        };
        let mut db = db(8).with_insert_warnings(vec![warning; 7]);
        let report = BatchCopyExecutor::new(5)
            .execute(&mut db, &plan(&["id"]), "dst_new")
            .await
            .unwrap();
        assert_eq!(report.warning_count, 14);
    }
}
