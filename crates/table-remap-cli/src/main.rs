//! table-remap CLI - Remap live MySQL/MariaDB tables into a target layout.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use table_remap::mapping::ColumnMap;
use table_remap::orchestrator::TargetOutcome;
use table_remap::{
    Config, MergeMapping, MigrationResult, MysqlDatabase, Orchestrator, PreparedMigration,
    RemapError, SplitTarget, TargetSchema, Workspace,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "table-remap")]
#[command(about = "Remap MySQL/MariaDB tables into a new schema layout")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List live tables with their mapping status
    Tables,

    /// Show the mapping a source table would use
    ShowMapping {
        /// Source table name
        source: String,
    },

    /// Show the copy plan and DDL for a source table without running it
    Plan {
        /// Source table name
        source: String,
    },

    /// Migrate a source table through its single or split mapping
    Migrate {
        /// Source table name
        source: String,

        /// Proceed without confirming lossy conversions
        #[arg(long, short)]
        yes: bool,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show the copy plan and DDL for a stored merge
    PlanMerge {
        /// Merge key, e.g. "MERGE: a,b -> c"
        key: String,
    },

    /// Migrate a stored merge
    MigrateMerge {
        /// Merge key, e.g. "MERGE: a,b -> c"
        key: String,

        /// Proceed without confirming lossy conversions
        #[arg(long, short)]
        yes: bool,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Store a one-to-one mapping
    MapSingle {
        /// Source table name
        source: String,

        /// Target schema table
        target: String,

        /// Column rename as old=new (repeatable)
        #[arg(long = "column", value_name = "OLD=NEW")]
        columns: Vec<String>,
    },

    /// Store a split mapping (one source, several targets)
    MapSplit {
        /// Source table name
        source: String,

        /// Target schema tables, in copy order
        #[arg(required = true)]
        targets: Vec<String>,

        /// Column rename for one target as target:old=new (repeatable)
        #[arg(long = "column", value_name = "TARGET:OLD=NEW")]
        columns: Vec<String>,
    },

    /// Store a merge mapping (several sources joined into one target)
    MapMerge {
        /// Source tables, driving table first
        #[arg(long, value_delimiter = ',', required = true)]
        tables: Vec<String>,

        /// Target schema table
        #[arg(long)]
        target: String,

        /// Join clause appended after the driving table
        #[arg(long)]
        join: String,

        /// Column mapping as table.column=target (repeatable)
        #[arg(long = "column", value_name = "TABLE.COLUMN=TARGET")]
        columns: Vec<String>,
    },

    /// Remove a stored mapping by source table or merge key
    Unmap {
        /// Source table name or merge key
        key: String,
    },

    /// Draft a merge mapping from column names and keys
    SuggestMerge {
        /// Source tables, driving table first
        #[arg(required = true, num_args = 2..)]
        tables: Vec<String>,

        /// Target schema table
        #[arg(long)]
        target: String,

        /// Store the draft when every join was resolved
        #[arg(long)]
        save: bool,
    },

    /// Write a definition file from the live layout
    ExportSchema {
        /// Output path [default: stdout]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tables to export [default: all]
        tables: Vec<String>,
    },

    /// Parse the definition file and list its tables
    CheckSchema,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), RemapError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Commands::CheckSchema = cli.command {
        return check_schema(&config, cli.output_json);
    }

    let (mut workspace, report) = Workspace::open(config);
    if let Some(corruption) = &report.corruption {
        eprintln!("Warning: {}; starting with an empty mapping store", corruption);
    }
    for (key, reason) in &report.skipped {
        eprintln!("Warning: skipped mapping '{}': {}", key, reason);
    }

    match cli.command {
        Commands::ShowMapping { source } => {
            let entry = match workspace.store().get(&source) {
                Some(entry) => entry.clone(),
                None => {
                    let entry = workspace.mapping_for(&source)?;
                    eprintln!("No stored mapping for '{}'; using name auto-match", source);
                    entry
                }
            };
            println!("{}", serde_json::to_string_pretty(&entry)?);
            Ok(())
        }

        Commands::MapSingle {
            source,
            target,
            columns,
        } => {
            workspace.map_single(&source, &target, parse_column_map(&columns)?)?;
            println!("Mapped {} -> {}", source, target);
            Ok(())
        }

        Commands::MapSplit {
            source,
            targets,
            columns,
        } => {
            workspace.map_split(&source, split_targets(&targets, &columns)?)?;
            println!("Mapped {} -> {}", source, targets.join(", "));
            Ok(())
        }

        Commands::MapMerge {
            tables,
            target,
            join,
            columns,
        } => {
            let key = workspace.map_merge(MergeMapping {
                source_tables: tables,
                target_schema: target,
                join_clause: join,
                column_map: parse_column_map(&columns)?,
            })?;
            println!("Stored {}", key);
            Ok(())
        }

        Commands::Unmap { key } => {
            match workspace.unmap(&key)? {
                Some(entry) => println!("Removed {} mapping '{}'", entry.kind(), key),
                None => println!("No mapping stored under '{}'", key),
            }
            Ok(())
        }

        command => run_online(command, workspace, cli.output_json).await,
    }
}

/// Commands that need the live database.
async fn run_online(command: Commands, workspace: Workspace, output_json: bool) -> Result<(), RemapError> {
    let db = MysqlDatabase::connect(&workspace.config().database).await?;
    let mut session = Orchestrator::from_workspace(workspace, db);

    match command {
        Commands::Tables => {
            let statuses = session.table_statuses().await?;
            if output_json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    let status_name = serde_json::to_value(status.status)?;
                    println!(
                        "  {:<32} {:<12} {}",
                        status.table,
                        status_name.as_str().unwrap_or_default(),
                        status.targets.join(", ")
                    );
                }
                println!("\n{} tables", statuses.len());
            }
        }

        Commands::Plan { source } => {
            let prepared = session.prepare_table(&source).await?;
            print_plan(&prepared, output_json)?;
        }

        Commands::PlanMerge { key } => {
            let prepared = session.prepare_merge(&key).await?;
            print_plan(&prepared, output_json)?;
        }

        Commands::Migrate {
            source,
            yes,
            batch_size,
        } => {
            if let Some(size) = batch_size {
                session.workspace_mut().set_batch_size(size);
            }
            let prepared = session.prepare_table(&source).await?;
            if confirm_lossy(&prepared, yes)? {
                let result = session.execute(&prepared).await?;
                finish(&result, output_json)?;
            }
        }

        Commands::MigrateMerge {
            key,
            yes,
            batch_size,
        } => {
            if let Some(size) = batch_size {
                session.workspace_mut().set_batch_size(size);
            }
            let prepared = session.prepare_merge(&key).await?;
            if confirm_lossy(&prepared, yes)? {
                let result = session.execute(&prepared).await?;
                finish(&result, output_json)?;
            }
        }

        Commands::SuggestMerge {
            tables,
            target,
            save,
        } => {
            let draft = session.suggest_merge(&tables, &target).await?;
            if output_json {
                println!("{}", serde_json::to_string_pretty(&draft)?);
            } else {
                println!("Merge {} -> {}", draft.source_tables.join(", "), draft.target_schema);
                println!("\nJoin:\n{}", draft.join_clause);
                println!("\nColumns:");
                for (source, target) in &draft.column_map {
                    println!("  {:<40} -> {}", source, target);
                }
                if !draft.unmapped.is_empty() {
                    println!("\nUnmapped target columns: {}", draft.unmapped.join(", "));
                }
            }
            if save {
                let key = session.workspace_mut().save_merge_draft(draft)?;
                println!("Stored {}", key);
            }
        }

        Commands::ExportSchema { output, tables } => {
            let schema = session.export_schema(&tables).await?;
            let text = schema.render();
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Wrote {} tables to {:?}", schema.len(), path);
                }
                None => print!("{}", text),
            }
        }

        Commands::CheckSchema
        | Commands::ShowMapping { .. }
        | Commands::MapSingle { .. }
        | Commands::MapSplit { .. }
        | Commands::MapMerge { .. }
        | Commands::Unmap { .. } => unreachable!(), // Handled offline
    }

    session.into_database().disconnect().await
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn check_schema(config: &Config, output_json: bool) -> Result<(), RemapError> {
    let loaded = TargetSchema::load(&config.files.schema_file);
    if output_json {
        let tables: serde_json::Map<String, serde_json::Value> = loaded
            .schema
            .tables()
            .map(|(name, columns)| (name.to_string(), serde_json::json!(columns)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&tables)?);
    } else {
        for (name, columns) in loaded.schema.tables() {
            println!("  {:<32} {} columns", name, columns.len());
        }
        println!("\n{} tables in {:?}", loaded.schema.len(), config.files.schema_file);
    }
    match loaded.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn print_plan(prepared: &PreparedMigration, output_json: bool) -> Result<(), RemapError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(prepared)?);
        return Ok(());
    }

    println!("Plan for {}", prepared.source);
    for target in &prepared.targets {
        let plan = &target.plan;
        println!("\n{} -> {}", plan.target_schema, target.destination);
        for row in &plan.rows {
            println!(
                "  {:<24} <- {:<48} [{}]",
                row.target_column, row.select_expression, row.verdict
            );
        }
        if !plan.added_columns.is_empty() {
            println!("  database defaults: {}", plan.added_columns.join(", "));
        }
        if !plan.skipped_columns.is_empty() {
            println!("  not mapped: {}", plan.skipped_columns.join(", "));
        }
        println!("\n{};", target.create_sql);
    }
    Ok(())
}

/// Ask before running a plan with lossy conversions. Non-interactive runs
/// must pass `--yes`.
fn confirm_lossy(prepared: &PreparedMigration, yes: bool) -> Result<bool, RemapError> {
    if !prepared.has_lossy() || yes {
        return Ok(true);
    }

    eprintln!("Lossy conversions:");
    for (target, row) in prepared.lossy_conversions() {
        eprintln!(
            "  {}.{}: {} -> {}",
            target, row.target_column, row.source_type, row.dest_type
        );
    }

    if !std::io::stdin().is_terminal() {
        return Err(RemapError::Config(
            "lossy conversions need confirmation; rerun with --yes".to_string(),
        ));
    }

    let confirmed = Confirm::new()
        .with_prompt("Continue with these conversions?")
        .default(false)
        .interact()
        .map_err(|e| RemapError::Config(e.to_string()))?;
    if !confirmed {
        println!("Migration cancelled");
    }
    Ok(confirmed)
}

fn finish(result: &MigrationResult, output_json: bool) -> Result<(), RemapError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("\nMigration of {} {:?}", result.source, result.status);
        println!("  Run ID: {}", result.run_id);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!("  Rows: {}", result.rows_copied);
        for target in &result.targets {
            match &target.outcome {
                TargetOutcome::Copied { report } => println!(
                    "  {}: {} rows in {} batches{}",
                    target.destination,
                    report.rows_copied,
                    report.batches(),
                    if report.reconciled { "" } else { " (count mismatch)" }
                ),
                TargetOutcome::Failed { error } => println!("  {}: FAILED: {}", target.destination, error),
                TargetOutcome::Skipped => println!("  {}: skipped", target.destination),
            }
        }
    }

    match result.failure() {
        Some(error) => Err(RemapError::database(format!("migrating {}", result.source), error)),
        None => Ok(()),
    }
}

fn parse_pair(pair: &str) -> Result<(String, String), RemapError> {
    pair.split_once('=')
        .map(|(old, new)| (old.trim(), new.trim()))
        .filter(|(old, new)| !old.is_empty() && !new.is_empty())
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .ok_or_else(|| RemapError::Config(format!("invalid column mapping '{}', expected old=new", pair)))
}

/// Parse repeated `old=new` pairs.
fn parse_column_map(pairs: &[String]) -> Result<ColumnMap, RemapError> {
    pairs.iter().map(|pair| parse_pair(pair)).collect()
}

/// Build split targets, attaching `target:old=new` renames to their target.
fn split_targets(targets: &[String], columns: &[String]) -> Result<Vec<SplitTarget>, RemapError> {
    let mut split: Vec<SplitTarget> = targets.iter().map(SplitTarget::new).collect();
    for column in columns {
        let (target, pair) = column.split_once(':').ok_or_else(|| {
            RemapError::Config(format!(
                "invalid split column mapping '{}', expected target:old=new",
                column
            ))
        })?;
        let entry = split
            .iter_mut()
            .find(|t| t.target_schema == target)
            .ok_or_else(|| RemapError::Config(format!("'{}' is not one of the split targets", target)))?;
        let (old, new) = parse_pair(pair)?;
        entry.column_map.insert(old, new);
    }
    Ok(split)
}
