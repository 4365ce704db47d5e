//! Schema model produced by introspection and consumed by rendering

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::codegen::{JavaType, Normalizer};
use crate::error::{GenerateError, Result};

/// Key flag of a column (`COLUMN_KEY` in `information_schema.COLUMNS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKey {
    Primary,
    Unique,
    Multiple,
    #[default]
    None,
}

impl ColumnKey {
    /// Parse the MySQL `COLUMN_KEY` value (`PRI`, `UNI`, `MUL` or empty)
    pub fn from_mysql(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PRI" => ColumnKey::Primary,
            "UNI" => ColumnKey::Unique,
            "MUL" => ColumnKey::Multiple,
            _ => ColumnKey::None,
        }
    }
}

/// Metadata for a column
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Data type as string (e.g., "BIGINT", "varchar(255)")
    pub data_type: String,

    /// Whether the column is nullable
    pub nullable: bool,

    /// Whether this column is unsigned (for numeric types)
    pub is_unsigned: bool,

    /// Whether this column is auto-increment
    pub is_auto_increment: bool,

    pub key: ColumnKey,

    /// Default value expression (if any)
    pub default_value: Option<String>,

    /// Column comment (if any)
    pub comment: Option<String>,

    /// Field name in generated code, empty until the table is bound
    pub field: String,

    /// Accessor stem, `UserId` for `getUserId`/`setUserId`
    pub accessor: String,

    /// Java type of the field, empty until the table is bound
    pub java_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        let data_type = data_type.into();
        let is_unsigned = data_type.to_ascii_uppercase().contains("UNSIGNED");
        Self {
            name: name.into(),
            data_type,
            nullable,
            is_unsigned,
            is_auto_increment: false,
            key: ColumnKey::None,
            default_value: None,
            comment: None,
            field: String::new(),
            accessor: String::new(),
            java_type: String::new(),
        }
    }

    pub fn with_key(mut self, key: ColumnKey) -> Self {
        self.key = key;
        if key == ColumnKey::Primary {
            self.nullable = false;
        }
        self
    }

    pub fn is_primary(&self) -> bool {
        self.key == ColumnKey::Primary
    }
}

/// Single-column primary key, as seen by templates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfo {
    pub column: String,
    pub field: String,
    pub accessor: String,
    pub java_type: String,
}

/// A logical table: one physical table, or a group of shards sharing a schema
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    /// Logical name, the physical name with its shard suffix stripped
    pub name: String,

    /// Physical tables backing this table, in discovery order
    pub physical_names: Vec<String>,

    /// Owning database/schema
    pub database: String,

    /// Table comment (if any)
    pub comment: Option<String>,

    /// Number of physical shards; greater than 1 for sharded tables
    pub shard_count: usize,

    /// Columns in ordinal order
    pub columns: Vec<Column>,

    class_name: Option<String>,

    /// Extra imports attached before rendering
    pub imports: BTreeSet<String>,

    /// Extra class annotations attached before rendering
    pub annotations: Vec<String>,

    /// Primary key, when the table has exactly one key column
    pub key: Option<KeyInfo>,
}

impl Table {
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            physical_names: vec![name.clone()],
            name,
            database: database.into(),
            comment: None,
            shard_count: 1,
            columns: Vec::new(),
            class_name: None,
            imports: BTreeSet::new(),
            annotations: Vec::new(),
            key: None,
        }
    }

    pub fn is_sharded(&self) -> bool {
        self.shard_count > 1
    }

    /// Class name, once [`Table::bind`] has run
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, in ordinal order
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Assign the class name and derive field names, Java types and the
    /// imports they need. A table is bound exactly once.
    ///
    /// Columns normalizing to a field name already taken get a numeric
    /// suffix (`userId`, `userId2`) and a warning.
    pub fn bind(&mut self, class_name: String, normalizer: &Normalizer) -> Result<()> {
        if let Some(existing) = &self.class_name {
            return Err(GenerateError::ValidationError(format!(
                "table {} is already bound to class {}",
                self.name, existing
            )));
        }
        if !is_type_name(&class_name) {
            return Err(GenerateError::ValidationError(format!(
                "{:?} is not a valid class name for table {}",
                class_name, self.name
            )));
        }

        let mut taken = HashSet::new();
        for column in &mut self.columns {
            let mut field = normalizer.field_name(&column.name)?;
            if taken.contains(&field) {
                let mut n = 2;
                while taken.contains(&format!("{}{}", field, n)) {
                    n += 1;
                }
                let unique = format!("{}{}", field, n);
                warn!(
                    "Table {}: column {} maps to field {} which is already taken; using {}",
                    self.name, column.name, field, unique
                );
                field = unique;
            }
            taken.insert(field.clone());
            column.field = field;
            column.accessor = Normalizer::accessor_stem(&column.field);
            let java_type = JavaType::resolve(column);
            if let Some(import) = java_type.import() {
                self.imports.insert(import.to_string());
            }
            column.java_type = java_type.to_type_string();
        }

        let keys: Vec<&Column> = self.columns.iter().filter(|c| c.is_primary()).collect();
        self.key = match keys.as_slice() {
            [only] => Some(KeyInfo {
                column: only.name.clone(),
                field: only.field.clone(),
                accessor: only.accessor.clone(),
                java_type: only.java_type.clone(),
            }),
            _ => None,
        };

        self.class_name = Some(class_name);
        Ok(())
    }

    /// Attach the sharding annotation for sharded tables. At most one is
    /// ever attached; unsharded tables are left untouched.
    pub fn attach_shard_annotation(&mut self, import: &str) {
        if !self.is_sharded() {
            return;
        }
        let simple = import.rsplit('.').next().unwrap_or(import);
        let prefix = format!("@{}(", simple);
        if self.annotations.iter().any(|a| a.starts_with(&prefix)) {
            return;
        }
        self.imports.insert(import.to_string());
        self.annotations
            .push(format!("@{}(value = {})", simple, self.shard_count));
    }
}

/// Whether `name` can be used as a Java type name
fn is_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// A table left out of the model, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTable {
    pub name: String,
    pub reason: String,
}

/// Tables discovered for one datasource
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaModel {
    pub datasource: String,
    pub tables: Vec<Table>,
    /// Tables that matched the selection but could not be read or named
    pub skipped: Vec<SkippedTable>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn normalizer() -> Normalizer {
        Normalizer::new(Regex::new("[-_][0-9]+").unwrap())
    }

    fn make_table(shards: usize) -> Table {
        let mut table = Table::new("user_info", "shop");
        table.shard_count = shards;
        table.columns = vec![
            Column::new("id", "bigint(20)", false).with_key(ColumnKey::Primary),
            Column::new("user_name", "varchar(64)", true),
            Column::new("balance", "decimal(10,2)", false),
        ];
        table
    }

    #[test]
    fn test_bind_sets_fields_and_key() {
        let mut table = make_table(1);
        table.bind("UserInfo".to_string(), &normalizer()).unwrap();

        assert_eq!(table.class_name(), Some("UserInfo"));
        assert_eq!(table.columns[1].field, "userName");
        assert_eq!(table.columns[1].accessor, "UserName");
        assert_eq!(table.columns[2].java_type, "BigDecimal");
        assert!(table.imports.contains("java.math.BigDecimal"));

        let key = table.key.as_ref().unwrap();
        assert_eq!(key.field, "id");
        assert_eq!(key.java_type, "Long");
    }

    #[test]
    fn test_bind_only_once() {
        let mut table = make_table(1);
        table.bind("UserInfo".to_string(), &normalizer()).unwrap();
        assert!(table.bind("Other".to_string(), &normalizer()).is_err());
        assert_eq!(table.class_name(), Some("UserInfo"));
    }

    #[test]
    fn test_bind_rejects_invalid_class_name() {
        let mut table = make_table(1);
        assert!(table.bind(String::new(), &normalizer()).is_err());
        assert!(table.bind("9Lives".to_string(), &normalizer()).is_err());
        assert!(table.class_name().is_none());
    }

    #[test]
    fn test_composite_key_has_no_key_info() {
        let mut table = make_table(1);
        table.columns[1].key = ColumnKey::Primary;
        table.bind("UserInfo".to_string(), &normalizer()).unwrap();
        assert!(table.key.is_none());
        assert_eq!(table.primary_key_columns(), vec!["id", "user_name"]);
    }

    #[test]
    fn test_colliding_field_names_are_suffixed() {
        let mut table = Table::new("account", "shop");
        table.columns = vec![
            Column::new("user_id", "bigint", false),
            Column::new("userId", "bigint", false),
            Column::new("class", "varchar(8)", true),
            Column::new("class_", "varchar(8)", true),
            Column::new("user_id2", "int", true),
        ];
        table.bind("Account".to_string(), &normalizer()).unwrap();

        let fields: Vec<&str> = table.columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["userId", "userId2", "class_", "class_2", "userId22"]);
        assert_eq!(table.columns[1].accessor, "UserId2");
    }

    #[test]
    fn test_unsharded_table_gets_no_annotation() {
        let mut table = make_table(1);
        table.attach_shard_annotation("ibeam.annotation.entity.ShardByMod");
        assert!(table.annotations.is_empty());
        assert!(table.imports.is_empty());
    }

    #[test]
    fn test_sharded_table_gets_exactly_one_annotation() {
        let mut table = make_table(4);
        table.attach_shard_annotation("ibeam.annotation.entity.ShardByMod");
        table.attach_shard_annotation("ibeam.annotation.entity.ShardByMod");
        assert_eq!(table.annotations, vec!["@ShardByMod(value = 4)"]);
        assert!(table.imports.contains("ibeam.annotation.entity.ShardByMod"));
    }

    #[test]
    fn test_column_key_from_mysql() {
        assert_eq!(ColumnKey::from_mysql("PRI"), ColumnKey::Primary);
        assert_eq!(ColumnKey::from_mysql("uni"), ColumnKey::Unique);
        assert_eq!(ColumnKey::from_mysql("MUL"), ColumnKey::Multiple);
        assert_eq!(ColumnKey::from_mysql(""), ColumnKey::None);
    }
}
