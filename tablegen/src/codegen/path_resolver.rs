use std::path::{Path, PathBuf};

use crate::codegen::java_source::JavaSource;
use crate::error::{GenerateError, Result};

/// Destination of generated source inside the source root
///
/// The path is `<source_root>/<package as directories>/<Type>.java`, taken
/// from the package declaration and the first type declared in `code`.
pub fn resolve_path(source_root: &Path, code: &str) -> Result<PathBuf> {
    let source = JavaSource::parse(code).map_err(|e| GenerateError::ParseError(e.to_string()))?;

    let package = source
        .package_name()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| GenerateError::MissingNamespaceError(first_line(code)))?;
    let type_name = source
        .primary_type_name()
        .ok_or_else(|| GenerateError::MissingTypeError(package.to_string()))?;

    let mut path = source_root.to_path_buf();
    for segment in package.split('.') {
        path.push(segment);
    }
    path.push(format!("{}.java", type_name));
    Ok(path)
}

fn first_line(code: &str) -> String {
    code.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let code = "package com.acme.order.db.entity;\n\npublic class OrderLine {\n}\n";
        let path = resolve_path(Path::new("/p/src/main/java"), code).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/p/src/main/java/com/acme/order/db/entity/OrderLine.java")
        );
    }

    #[test]
    fn test_first_type_wins() {
        let code = "package a;\n\ninterface First {}\nclass Second {}\n";
        let path = resolve_path(Path::new("root"), code).unwrap();
        assert_eq!(path, PathBuf::from("root/a/First.java"));
    }

    #[test]
    fn test_missing_namespace() {
        let err = resolve_path(Path::new("root"), "public class Foo {}").unwrap_err();
        assert!(matches!(err, GenerateError::MissingNamespaceError(_)));
    }

    #[test]
    fn test_missing_type() {
        let err = resolve_path(Path::new("root"), "package a.b;\n").unwrap_err();
        assert!(matches!(err, GenerateError::MissingTypeError(ref p) if p == "a.b"));
    }

    #[test]
    fn test_unparsable_code() {
        let err = resolve_path(Path::new("root"), "package a;\nclass X {").unwrap_err();
        assert!(matches!(err, GenerateError::ParseError(_)));
    }
}
