//! Default configuration values - single source of truth

/// Default project root
pub const PROJECT_ROOT: &str = ".";

/// Default source root, relative to the project root
pub const SOURCE_DIR: &str = "src/main/java";

/// Default exclusion pattern for table selection
pub const IGNORE_TABLES: &str = "[-_][0-9]+";

/// Default pattern stripped from table names to form class names
pub const TABLE_STRIP_REGEX: &str = "[-_][0-9]+";

/// Default environment used in property lookups
pub const ENVIRONMENT: &str = "dev";

/// Property selecting the environment
pub const ENVIRONMENT_KEY: &str = "environment";

/// Annotation attached to entities of sharded tables
pub const SHARD_ANNOTATION: &str = "ibeam.annotation.entity.ShardByMod";

/// Whether existing entities are merged by default
pub const OVERWRITE: bool = false;

/// Whether API controllers are generated by default
pub const GENERATE_API: bool = false;

/// Whether to run in dry-run mode by default
pub const DRY_RUN: bool = false;

/// Whether generation is skipped by default
pub const SKIP: bool = false;

/// Config file looked up when none is given, without extension
pub const CONFIG_FILE: &str = "tablegen";

/// Prefix of environment variables overriding the config file
pub const ENV_PREFIX: &str = "TABLEGEN";

/// Properties file locations, relative to the project root, in lookup order
pub const PROPERTIES_LOCATIONS: &[&str] = &[
    "src/main/resources/application.properties",
    "src/test/resources/application.properties",
];

/// Format of the `timestamp` render value
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
