//! CLI entry point for tablegen

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tablegen::config::GeneratorConfig;
use tablegen::Outcome;

#[derive(Parser)]
#[command(name = "tablegen")]
#[command(about = "Generate entity, DAO, service and controller sources from a MySQL schema")]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML format); defaults to ./tablegen.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory of the target project (overrides config)
    #[arg(short, long)]
    project_root: Option<PathBuf>,

    /// Datasource to generate for, repeatable (overrides config)
    #[arg(short, long = "datasource")]
    datasources: Vec<String>,

    /// Table to generate, repeatable (overrides config)
    #[arg(short, long = "table")]
    tables: Vec<String>,

    /// Merge regenerated entities into existing files
    #[arg(long)]
    overwrite: bool,

    /// Also generate API controllers
    #[arg(long)]
    generate_api: bool,

    /// Dry run - show what would be generated without writing files
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate sources (default)
    Generate,
    /// Inspect schema (show introspected tables for debugging)
    Inspect,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (before logging, so we can use config.log_level)
    let mut config = GeneratorConfig::load(cli.config.as_deref())?;

    // Initialize logging
    // Priority: RUST_LOG env var > config.log_level > default (debug for dev, info for release)
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let log_level = config.log_level.as_deref().unwrap_or(default_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    // Apply CLI overrides
    if let Some(root) = cli.project_root {
        config.project_root = root;
    }
    if !cli.datasources.is_empty() {
        config.datasources = cli.datasources;
    }
    if !cli.tables.is_empty() {
        config.tables = cli.tables;
    }
    if cli.overwrite {
        config.overwrite = true;
    }
    if cli.generate_api {
        config.generate_api = true;
    }
    if cli.dry_run {
        config.dry_run = true;
    }

    if let Some(Commands::Inspect) = &cli.command {
        return inspect_schema(&config);
    }

    info!("Generating code for project {:?}", config.project_root);
    let summary = tablegen::generate(&config)?;

    if config.dry_run {
        println!("Dry run mode - would write:");
        for artifact in summary.artifacts() {
            if let (Some(path), Outcome::Generated | Outcome::Merged(_)) =
                (&artifact.path, &artifact.outcome)
            {
                println!("  {:<15} {}", artifact.kind.to_string(), path.display());
            }
        }
    }

    if summary.failed() > 0 {
        anyhow::bail!("{} artifact(s) failed, see log for details", summary.failed());
    }

    info!("Code generation completed successfully");
    Ok(())
}

fn inspect_schema(config: &GeneratorConfig) -> Result<()> {
    let models = tablegen::inspect(config)?;

    for model in &models {
        let name = if model.datasource.is_empty() {
            "<default>"
        } else {
            model.datasource.as_str()
        };
        println!("Datasource {}: {} tables\n", name, model.tables.len());

        for table in &model.tables {
            println!(
                "Table: {} -> {}",
                table.name,
                table.class_name().unwrap_or("?")
            );
            if table.is_sharded() {
                println!(
                    "  Shards: {} ({})",
                    table.shard_count,
                    table.physical_names.join(", ")
                );
            }
            println!("  Columns:");
            for col in &table.columns {
                let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                let auto_inc = if col.is_auto_increment {
                    " AUTO_INCREMENT"
                } else {
                    ""
                };
                println!(
                    "    - {} {} {}{} -> {} {}",
                    col.name, col.data_type, nullable, auto_inc, col.java_type, col.field
                );
            }
            let pk = table.primary_key_columns();
            if !pk.is_empty() {
                println!("  Primary Key: {:?}", pk);
            }
            println!();
        }

        for skipped in &model.skipped {
            println!("Skipped: {} ({})", skipped.name, skipped.reason);
        }
    }

    Ok(())
}
