//! Identifier normalization for generated code
//!
//! Raw table and column names are turned into Java identifiers here. The case
//! conversion only ever capitalizes or lowercases the first letter of a word,
//! so normalizing an already normalized name gives the same name back.

use regex::Regex;

use crate::error::{GenerateError, Result};

/// Default strip pattern: trailing shard/version suffixes such as `_01` or `-3`
pub const DEFAULT_STRIP_PATTERN: &str = crate::config::defaults::TABLE_STRIP_REGEX;

/// Prefix for type names that would otherwise start with a digit
const TYPE_DIGIT_PREFIX: char = 'T';

/// Prefix for field names that would otherwise start with a digit
const FIELD_DIGIT_PREFIX: char = 'f';

/// Turns raw schema names into type and field names
#[derive(Debug, Clone)]
pub struct Normalizer {
    strip: Regex,
    class_ignore: Option<Regex>,
}

impl Normalizer {
    pub fn new(strip: Regex) -> Self {
        Self {
            strip,
            class_ignore: None,
        }
    }

    /// Also remove matches of `pattern` from raw names before deriving class names
    pub fn with_class_ignore(mut self, pattern: Regex) -> Self {
        self.class_ignore = Some(pattern);
        self
    }

    /// Class name for a physical table name
    pub fn class_name(&self, raw: &str) -> Result<String> {
        match &self.class_ignore {
            Some(ignore) => {
                let candidate = ignore.replace_all(raw, "");
                if candidate.trim().is_empty() {
                    return Err(GenerateError::EmptyIdentifierError(raw.to_string()));
                }
                self.type_name(&candidate)
            }
            None => self.type_name(raw),
        }
    }

    /// Remove every match of the strip pattern
    pub fn strip(&self, raw: &str) -> String {
        self.strip.replace_all(raw, "").into_owned()
    }

    /// Type name for a raw table name: strip, then UpperCamelCase
    pub fn type_name(&self, raw: &str) -> Result<String> {
        normalize(raw, &self.strip)
    }

    /// Field name for a raw column name: lowerCamelCase, keywords escaped
    pub fn field_name(&self, raw: &str) -> Result<String> {
        let camel = to_lower_camel(raw);
        if camel.is_empty() {
            return Err(GenerateError::EmptyIdentifierError(raw.to_string()));
        }
        let field = if starts_with_digit(&camel) {
            format!("{}{}", FIELD_DIGIT_PREFIX, camel)
        } else {
            camel
        };
        Ok(escape_field_name(&field))
    }

    /// Accessor stem for a field: `userId` -> `UserId`
    pub fn accessor_stem(field: &str) -> String {
        capitalize(field)
    }
}

/// Normalize a raw table name into a type name using `strip`
///
/// `user_info_01` with the default pattern becomes `UserInfo`.
pub fn normalize(raw: &str, strip: &Regex) -> Result<String> {
    let stripped = strip.replace_all(raw, "");
    let camel = to_upper_camel(&stripped);
    if camel.is_empty() {
        return Err(GenerateError::EmptyIdentifierError(raw.to_string()));
    }
    if starts_with_digit(&camel) {
        Ok(format!("{}{}", TYPE_DIGIT_PREFIX, camel))
    } else {
        Ok(camel)
    }
}

/// Convert snake/kebab case to UpperCamelCase
pub fn to_upper_camel(raw: &str) -> String {
    words(raw).iter().map(|w| capitalize(w)).collect()
}

/// Convert snake/kebab case to lowerCamelCase
pub fn to_lower_camel(raw: &str) -> String {
    let words = words(raw);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            if word.chars().any(char::is_lowercase) {
                out.push_str(&decapitalize(word));
            } else {
                out.push_str(&word.to_lowercase());
            }
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

/// Namespace token for a datasource: `order_db` -> `order.db`
pub fn domain_of(datasource: &str) -> String {
    datasource.trim().replace(['_', '-'], ".")
}

/// Split on anything that cannot appear in an identifier. Names written
/// entirely in upper case with separators (`USER_INFO`) are lowered first.
fn words(raw: &str) -> Vec<String> {
    let is_separator = |c: char| !c.is_alphanumeric();
    let shouting = raw.contains(is_separator) && !raw.chars().any(char::is_lowercase);
    raw.split(is_separator)
        .filter(|w| !w.is_empty())
        .map(|w| {
            if shouting {
                w.to_lowercase()
            } else {
                w.to_string()
            }
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Pluralize a word using English grammar rules
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return word.to_string();
    }

    // Irregular plurals (common in database contexts)
    let irregulars: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("index", "indices"),
    ];

    for (singular, plural) in irregulars {
        if word == *singular {
            return plural.to_string();
        }
    }

    // Words ending in -is → -es (analysis → analyses)
    if word.ends_with("is") && word.len() > 2 {
        return format!("{}es", &word[..word.len() - 2]);
    }

    // Already plural or uncountable
    if word.ends_with("ss") {
        return format!("{}es", word);
    }
    if word.ends_with('s') {
        return word.to_string();
    }

    // -x, -z, -ch, -sh → add -es
    if word.ends_with('x') || word.ends_with('z') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{}es", word);
    }

    // Words ending in consonant + y → -ies
    if let Some(stem) = word.strip_suffix('y') {
        let before_y = stem.chars().last().unwrap_or('a');
        if !"aeiou".contains(before_y) {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", word)
}

/// Check if a name is a Java reserved word or literal
pub fn is_java_keyword(name: &str) -> bool {
    matches!(
        name,
        "abstract"
            | "assert"
            | "boolean"
            | "break"
            | "byte"
            | "case"
            | "catch"
            | "char"
            | "class"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extends"
            | "final"
            | "finally"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "implements"
            | "import"
            | "instanceof"
            | "int"
            | "interface"
            | "long"
            | "native"
            | "new"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "short"
            | "static"
            | "strictfp"
            | "super"
            | "switch"
            | "synchronized"
            | "this"
            | "throw"
            | "throws"
            | "transient"
            | "try"
            | "void"
            | "volatile"
            | "while"
            | "true"
            | "false"
            | "null"
    )
}

/// Escape a field name if it's a Java keyword
pub fn escape_field_name(name: &str) -> String {
    if is_java_keyword(name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}
