//! MySQL to Java type mapping

use crate::schema::Column;

/// A Java field type for code generation
///
/// Entity fields always use reference types so that SQL `NULL` round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaType {
    Boolean,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    String,
    Bytes,
    LocalDate,
    LocalDateTime,
    LocalTime,
}

impl JavaType {
    /// Get the type string for code generation
    pub fn to_type_string(self) -> String {
        match self {
            JavaType::Boolean => "Boolean",
            JavaType::Integer => "Integer",
            JavaType::Long => "Long",
            JavaType::BigInteger => "BigInteger",
            JavaType::Float => "Float",
            JavaType::Double => "Double",
            JavaType::BigDecimal => "BigDecimal",
            JavaType::String => "String",
            JavaType::Bytes => "byte[]",
            JavaType::LocalDate => "LocalDate",
            JavaType::LocalDateTime => "LocalDateTime",
            JavaType::LocalTime => "LocalTime",
        }
        .to_string()
    }

    /// Import the type needs outside `java.lang`, if any
    pub fn import(self) -> Option<&'static str> {
        match self {
            JavaType::BigInteger => Some("java.math.BigInteger"),
            JavaType::BigDecimal => Some("java.math.BigDecimal"),
            JavaType::LocalDate => Some("java.time.LocalDate"),
            JavaType::LocalDateTime => Some("java.time.LocalDateTime"),
            JavaType::LocalTime => Some("java.time.LocalTime"),
            _ => None,
        }
    }

    /// Resolve the Java type of a column
    pub fn resolve(column: &Column) -> JavaType {
        let data_type = column.data_type.to_lowercase();
        let data_type = data_type.trim();

        if is_boolean_type(data_type) {
            return JavaType::Boolean;
        }

        // Integer types
        if data_type.starts_with("tinyint")
            || data_type.starts_with("smallint")
            || data_type.starts_with("mediumint")
            || data_type.starts_with("year")
        {
            return JavaType::Integer;
        }
        if data_type.starts_with("bigint") {
            return if column.is_unsigned {
                JavaType::BigInteger
            } else {
                JavaType::Long
            };
        }
        if data_type.starts_with("int") {
            return if column.is_unsigned {
                JavaType::Long
            } else {
                JavaType::Integer
            };
        }

        // Float types
        if data_type.starts_with("float") {
            return JavaType::Float;
        }
        if data_type.starts_with("double") || data_type.starts_with("real") {
            return JavaType::Double;
        }

        // Decimal types
        if data_type.starts_with("decimal") || data_type.starts_with("numeric") {
            return JavaType::BigDecimal;
        }

        // Date/time types
        if data_type.starts_with("datetime") || data_type.starts_with("timestamp") {
            return JavaType::LocalDateTime;
        }
        if data_type.starts_with("date") {
            return JavaType::LocalDate;
        }
        if data_type.starts_with("time") {
            return JavaType::LocalTime;
        }

        // Binary and spatial types
        if data_type.starts_with("binary")
            || data_type.starts_with("varbinary")
            || data_type.contains("blob")
            || data_type.starts_with("bit")
            || data_type.starts_with("geometry")
            || data_type.starts_with("point")
            || data_type.starts_with("linestring")
            || data_type.starts_with("polygon")
            || data_type.starts_with("multi")
        {
            return JavaType::Bytes;
        }

        // char, varchar, text, enum, set, json and anything unknown
        JavaType::String
    }
}

/// BOOL, BOOLEAN, TINYINT(1) and BIT(1) are booleans in MySQL
fn is_boolean_type(data_type: &str) -> bool {
    if data_type == "bool" || data_type == "boolean" {
        return true;
    }
    (data_type.starts_with("tinyint") || data_type.starts_with("bit"))
        && data_type.contains("(1)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_column(data_type: &str) -> Column {
        Column::new("c", data_type, true)
    }

    #[test]
    fn test_integer_types() {
        assert_eq!(JavaType::resolve(&make_column("BIGINT")), JavaType::Long);
        assert_eq!(
            JavaType::resolve(&make_column("bigint(20) unsigned")),
            JavaType::BigInteger
        );
        assert_eq!(JavaType::resolve(&make_column("INT")), JavaType::Integer);
        assert_eq!(
            JavaType::resolve(&make_column("int(10) unsigned")),
            JavaType::Long
        );
        assert_eq!(JavaType::resolve(&make_column("smallint(6)")), JavaType::Integer);
    }

    #[test]
    fn test_boolean_type() {
        assert_eq!(JavaType::resolve(&make_column("TINYINT(1)")), JavaType::Boolean);
        assert_eq!(JavaType::resolve(&make_column("BOOL")), JavaType::Boolean);
        assert_eq!(JavaType::resolve(&make_column("bit(1)")), JavaType::Boolean);
        assert_eq!(JavaType::resolve(&make_column("tinyint(4)")), JavaType::Integer);
    }

    #[test]
    fn test_string_types() {
        assert_eq!(JavaType::resolve(&make_column("VARCHAR(255)")), JavaType::String);
        assert_eq!(JavaType::resolve(&make_column("mediumtext")), JavaType::String);
        assert_eq!(
            JavaType::resolve(&make_column("enum('A','B')")),
            JavaType::String
        );
        assert_eq!(JavaType::resolve(&make_column("json")), JavaType::String);
    }

    #[test]
    fn test_datetime_types() {
        assert_eq!(JavaType::resolve(&make_column("DATETIME")), JavaType::LocalDateTime);
        assert_eq!(JavaType::resolve(&make_column("timestamp(3)")), JavaType::LocalDateTime);
        assert_eq!(JavaType::resolve(&make_column("DATE")), JavaType::LocalDate);
        assert_eq!(JavaType::resolve(&make_column("time")), JavaType::LocalTime);
    }

    #[test]
    fn test_binary_types() {
        assert_eq!(JavaType::resolve(&make_column("blob")), JavaType::Bytes);
        assert_eq!(JavaType::resolve(&make_column("varbinary(16)")), JavaType::Bytes);
        assert_eq!(JavaType::Bytes.to_type_string(), "byte[]");
    }

    #[test]
    fn test_imports() {
        assert_eq!(JavaType::BigDecimal.import(), Some("java.math.BigDecimal"));
        assert_eq!(JavaType::LocalDateTime.import(), Some("java.time.LocalDateTime"));
        assert_eq!(JavaType::String.import(), None);
        assert_eq!(JavaType::Long.import(), None);
    }
}
