//! Configuration settings for tablegen

use config::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::defaults;
use super::properties::Properties;
use crate::codegen::{resolve_template_dir, Normalizer};
use crate::error::{GenerateError, Result};
use crate::schema::{ConnectionParams, TableSelector};

/// Main configuration struct for code generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Root directory of the target project
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Source root generated files are written under, relative to the project root
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Package prefix shared by all generated sources
    #[serde(default)]
    pub base_package: String,

    /// Merge regenerated entities into existing ones
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,

    /// Skip generation entirely
    #[serde(default = "default_skip")]
    pub skip: bool,

    /// Logical datasource names; none means the default database
    #[serde(default)]
    pub datasources: Vec<String>,

    /// Exact table names to generate; when non-empty `ignore_tables` is not used
    #[serde(default)]
    pub tables: Vec<String>,

    /// Tables whose whole name matches this pattern (ignoring case) are left out
    #[serde(default = "default_ignore_tables")]
    pub ignore_tables: String,

    /// Removed from table names before they become class names
    #[serde(default = "default_table_strip_regex")]
    pub table_strip_regex: String,

    /// Removed from table names before normalization, for class naming only
    #[serde(default)]
    pub class_ignore_regex: Option<String>,

    /// Directory of override templates: absolute, `classpath:` or project-relative
    #[serde(default)]
    pub template_path: Option<String>,

    /// Generate API controllers
    #[serde(default = "default_generate_api")]
    pub generate_api: bool,

    /// Properties file with connection settings; looked up in the
    /// project's resources when not set
    #[serde(default)]
    pub properties_file: Option<PathBuf>,

    /// Overrides the `environment` property
    #[serde(default)]
    pub environment: Option<String>,

    /// Fully qualified annotation put on entities of sharded tables
    #[serde(default = "default_shard_annotation")]
    pub shard_annotation: String,

    /// Dry run mode - preview without writing files
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    /// Can be overridden by RUST_LOG env var
    #[serde(default)]
    pub log_level: Option<String>,
}

// Default value functions for serde
fn default_project_root() -> PathBuf {
    PathBuf::from(defaults::PROJECT_ROOT)
}
fn default_source_dir() -> PathBuf {
    PathBuf::from(defaults::SOURCE_DIR)
}
fn default_overwrite() -> bool {
    defaults::OVERWRITE
}
fn default_skip() -> bool {
    defaults::SKIP
}
fn default_ignore_tables() -> String {
    defaults::IGNORE_TABLES.to_string()
}
fn default_table_strip_regex() -> String {
    defaults::TABLE_STRIP_REGEX.to_string()
}
fn default_generate_api() -> bool {
    defaults::GENERATE_API
}
fn default_shard_annotation() -> String {
    defaults::SHARD_ANNOTATION.to_string()
}
fn default_dry_run() -> bool {
    defaults::DRY_RUN
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            source_dir: default_source_dir(),
            base_package: String::new(),
            overwrite: default_overwrite(),
            skip: default_skip(),
            datasources: Vec::new(),
            tables: Vec::new(),
            ignore_tables: default_ignore_tables(),
            table_strip_regex: default_table_strip_regex(),
            class_ignore_regex: None,
            template_path: None,
            generate_api: default_generate_api(),
            properties_file: None,
            environment: None,
            shard_annotation: default_shard_annotation(),
            dry_run: default_dry_run(),
            log_level: None,
        }
    }
}

/// Immutable settings of one generation run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub project_root: PathBuf,
    /// Absolute or project-relative directory generated files go under
    pub source_root: PathBuf,
    pub base_package: String,
    pub overwrite: bool,
    pub dry_run: bool,
    pub generate_api: bool,
    /// Datasources in processing order
    pub datasources: Vec<ConnectionParams>,
    pub selector: TableSelector,
    pub normalizer: Normalizer,
    pub template_dir: Option<PathBuf>,
    pub shard_annotation: String,
    /// Render timestamp, the same for every file of the run
    pub timestamp: String,
}

impl RunConfig {
    /// Simple name of the shard annotation
    pub fn shard_annotation_name(&self) -> &str {
        self.shard_annotation
            .rsplit('.')
            .next()
            .unwrap_or(&self.shard_annotation)
    }
}

impl GeneratorConfig {
    /// Create a default config for the project at `project_root`
    pub fn default_with_root(project_root: PathBuf) -> Self {
        Self {
            project_root,
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = toml::from_str(&content).map_err(|e| {
            GenerateError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(config)
    }

    /// Load configuration using config-rs (file + environment variables)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from config file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        } else {
            // Try default locations
            builder = builder.add_source(File::with_name(defaults::CONFIG_FILE).required(false));
        }

        // Override with environment variables (TABLEGEN_BASE_PACKAGE, TABLEGEN_TABLES=a,b)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("datasources")
                .with_list_parse_key("tables"),
        );

        let config: GeneratorConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            return Err(GenerateError::ValidationError(
                "source_dir is required".into(),
            ));
        }

        if !self.base_package.is_empty() && !is_package_name(&self.base_package) {
            return Err(GenerateError::ValidationError(format!(
                "base_package {:?} is not a valid package name",
                self.base_package
            )));
        }

        if !is_package_name(&self.shard_annotation) || !self.shard_annotation.contains('.') {
            return Err(GenerateError::ValidationError(format!(
                "shard_annotation {:?} must be a fully qualified type name",
                self.shard_annotation
            )));
        }

        for (name, pattern) in [
            ("ignore_tables", Some(&self.ignore_tables)),
            ("table_strip_regex", Some(&self.table_strip_regex)),
            ("class_ignore_regex", self.class_ignore_regex.as_ref()),
        ] {
            if let Some(pattern) = pattern {
                Regex::new(pattern).map_err(|e| {
                    GenerateError::ValidationError(format!("{} is not a valid pattern: {}", name, e))
                })?;
            }
        }

        if let Some(dir) = self.template_dir() {
            if !dir.is_dir() {
                return Err(GenerateError::ValidationError(format!(
                    "Template directory not found: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    fn template_dir(&self) -> Option<PathBuf> {
        self.template_path
            .as_deref()
            .and_then(|p| resolve_template_dir(&self.project_root, p))
    }

    /// Validate and turn the configuration into the settings of one run,
    /// reading connection parameters from the properties file
    pub fn resolve(&self) -> Result<RunConfig> {
        self.validate()?;

        let properties_path =
            Properties::locate(&self.project_root, self.properties_file.as_deref())?;
        let properties = Properties::load(&properties_path)?;
        let env = self
            .environment
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| properties.environment())
            .to_string();
        debug!("Using environment {:?}", env);

        let names: Vec<String> = if self.datasources.is_empty() {
            vec![String::new()]
        } else {
            self.datasources.clone()
        };
        let mut datasources = Vec::with_capacity(names.len());
        for name in &names {
            let mut params = properties.connection(&env, name)?;
            params.url = self.absolute_file_url(&params.url);
            datasources.push(params);
        }

        let mut normalizer = Normalizer::new(Regex::new(&self.table_strip_regex)?);
        if let Some(pattern) = &self.class_ignore_regex {
            normalizer = normalizer.with_class_ignore(Regex::new(pattern)?);
        }

        Ok(RunConfig {
            project_root: self.project_root.clone(),
            source_root: self.project_root.join(&self.source_dir),
            base_package: self.base_package.trim().trim_end_matches('.').to_string(),
            overwrite: self.overwrite,
            dry_run: self.dry_run,
            generate_api: self.generate_api,
            datasources,
            selector: TableSelector::new(self.tables.iter().cloned(), &self.ignore_tables)?,
            normalizer,
            template_dir: self.template_dir(),
            shard_annotation: self.shard_annotation.clone(),
            timestamp: chrono::Local::now()
                .format(defaults::TIMESTAMP_FORMAT)
                .to_string(),
        })
    }

    /// `file:` urls with relative paths are taken relative to the project root
    fn absolute_file_url(&self, url: &str) -> String {
        match url.trim().strip_prefix("file:") {
            Some(path) if !path.starts_with('/') => {
                format!("file:{}", self.project_root.join(path).display())
            }
            _ => url.to_string(),
        }
    }
}

fn is_package_name(name: &str) -> bool {
    name.trim_end_matches('.').split('.').all(|segment| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
            && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    })
}
