//! tablegen: generate entity, DAO, service and controller sources from a MySQL schema
//!
//! This crate provides both a CLI tool and a library. It reads the tables of
//! one or more datasources (a live MySQL server, or a DDL file parsed with
//! `sqlparser-rs`) and renders, per table:
//!
//! - an entity class, kept in sync with the schema on later runs when
//!   `overwrite` is set, without losing hand-written members
//! - a DAO and a service, with `_shard` variants for sharded tables
//! - optionally an API controller
//!
//! DAOs, services and controllers are scaffolds: once written they belong to
//! the developer and are never touched again.
//!
//! # Configuration
//!
//! Connection settings come from the target project's
//! `src/main/resources/application.properties`:
//!
//! ```text
//! environment=dev
//! dev.jdbc.order_db.url=jdbc:mysql://localhost:3306/order_db
//! dev.jdbc.order_db.username=shop
//! dev.jdbc.order_db.password=secret
//! ```
//!
//! Generation settings come from `tablegen.toml`:
//!
//! ```toml
//! base_package = "com.acme.shop"
//! datasources = ["order_db"]
//! overwrite = true
//! ```
//!
//! # Programmatic Configuration
//!
//! ```rust,ignore
//! let summary = tablegen::GeneratorBuilder::new("path/to/project")
//!     .base_package("com.acme.shop")
//!     .datasources(&["order_db"])
//!     .overwrite(true)
//!     .generate()?;
//! println!("{} files written", summary.written_paths().len());
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! tablegen --config tablegen.toml --datasource order_db generate
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod schema;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub use crate::codegen::{CodeGenerator, Outcome, RunSummary};
pub use crate::config::{GeneratorConfig, RunConfig};
pub use crate::error::{GenerateError, Result};
pub use crate::schema::SchemaModel;

/// Main entry point for code generation
///
/// Runs are not meant to overlap on the same source tree.
pub fn generate(config: &GeneratorConfig) -> Result<RunSummary> {
    if config.skip {
        info!("Code generation skipped");
        return Ok(RunSummary::default());
    }

    let run = config.resolve()?;
    CodeGenerator::new(&run).run()
}

/// Introspect every configured datasource without rendering anything
pub fn inspect(config: &GeneratorConfig) -> Result<Vec<SchemaModel>> {
    let run = config.resolve()?;
    let mut models = Vec::with_capacity(run.datasources.len());
    for params in &run.datasources {
        let mut source = schema::open_source(params)?;
        let model = schema::introspect(
            source.as_mut(),
            &params.datasource,
            &run.selector,
            &run.normalizer,
        );
        if let Err(e) = source.close() {
            warn!("Failed to close datasource {:?}: {}", params.datasource, e);
        }
        models.push(model?);
    }
    Ok(models)
}

/// Builder pattern for configuring a run from code
pub struct GeneratorBuilder {
    config: GeneratorConfig,
}

impl GeneratorBuilder {
    /// Create a new builder for the project at `project_root`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            config: GeneratorConfig::default_with_root(project_root.as_ref().to_path_buf()),
        }
    }

    /// Start from an already loaded configuration
    pub fn from_config(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Set the source root, relative to the project root
    pub fn source_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.source_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the package prefix of generated sources
    pub fn base_package(mut self, package: &str) -> Self {
        self.config.base_package = package.to_string();
        self
    }

    /// Set the datasources to generate for, in order
    pub fn datasources(mut self, names: &[&str]) -> Self {
        self.config.datasources = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Generate only these tables (exact names)
    pub fn include_tables(mut self, tables: &[&str]) -> Self {
        self.config.tables = tables.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Leave out tables whose name matches `pattern`
    pub fn ignore_tables(mut self, pattern: &str) -> Self {
        self.config.ignore_tables = pattern.to_string();
        self
    }

    /// Set the pattern stripped from table names before naming
    pub fn table_strip_regex(mut self, pattern: &str) -> Self {
        self.config.table_strip_regex = pattern.to_string();
        self
    }

    /// Set the pattern removed from table names for class naming only
    pub fn class_ignore_regex(mut self, pattern: &str) -> Self {
        self.config.class_ignore_regex = Some(pattern.to_string());
        self
    }

    /// Set the override template directory
    pub fn template_path(mut self, path: &str) -> Self {
        self.config.template_path = Some(path.to_string());
        self
    }

    /// Set the properties file holding connection settings
    pub fn properties_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.properties_file = Some(path.into());
        self
    }

    /// Select the environment used in property lookups
    pub fn environment(mut self, env: &str) -> Self {
        self.config.environment = Some(env.to_string());
        self
    }

    /// Merge regenerated entities into existing files
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.overwrite = overwrite;
        self
    }

    /// Also generate API controllers
    pub fn generate_api(mut self, generate_api: bool) -> Self {
        self.config.generate_api = generate_api;
        self
    }

    /// Enable dry run mode (preview without writing files)
    pub fn dry_run(mut self) -> Self {
        self.config.dry_run = true;
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the code
    pub fn generate(self) -> Result<RunSummary> {
        generate(&self.config)
    }

    /// Introspect the configured datasources
    pub fn inspect(self) -> Result<Vec<SchemaModel>> {
        inspect(&self.config)
    }
}
