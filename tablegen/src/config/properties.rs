//! `application.properties` reader and connection parameter lookup

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::defaults;
use crate::error::{GenerateError, Result};
use crate::schema::ConnectionParams;

/// Key/value pairs of a Java properties file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    /// Find the properties file of a project: `explicit` when given,
    /// otherwise the first of the default locations that exists
    pub fn locate(project_root: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                project_root.join(path)
            };
            if path.is_file() {
                return Ok(path);
            }
            return Err(GenerateError::ConfigError(format!(
                "properties file not found: {}",
                path.display()
            )));
        }

        let candidates: Vec<PathBuf> = defaults::PROPERTIES_LOCATIONS
            .iter()
            .map(|p| project_root.join(p))
            .collect();
        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| {
                GenerateError::ConfigError(format!(
                    "no properties file found, looked for {}",
                    candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(" and ")
                ))
            })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        debug!("Loaded properties from {}", path.display());
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            let first = line.trim_start();
            if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
                continue;
            }

            let mut logical = String::from(first);
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            entries.insert(unescape(key), unescape(value));
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Environment selected by the `environment` property
    pub fn environment(&self) -> &str {
        self.get(defaults::ENVIRONMENT_KEY)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(defaults::ENVIRONMENT)
    }

    /// JDBC setting `name` of `datasource` in `env`
    ///
    /// Looks up `{env}.jdbc.{db}.{name}`, then `{env}.{db}.jdbc.{name}`; a
    /// blank datasource reads `{env}.jdbc.{name}`.
    pub fn jdbc(&self, env: &str, datasource: &str, name: &str) -> Option<&str> {
        let datasource = datasource.trim();
        if datasource.is_empty() {
            return self.get(&format!("{}.jdbc.{}", env, name));
        }
        self.get(&format!("{}.jdbc.{}.{}", env, datasource, name))
            .or_else(|| self.get(&format!("{}.{}.jdbc.{}", env, datasource, name)))
    }

    /// Connection parameters of `datasource`; the url is required
    pub fn connection(&self, env: &str, datasource: &str) -> Result<ConnectionParams> {
        let non_blank = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let url = non_blank(self.jdbc(env, datasource, "url")).ok_or_else(|| {
            let shown = if datasource.trim().is_empty() {
                "<default>"
            } else {
                datasource
            };
            GenerateError::ConfigError(format!(
                "missing jdbc url for datasource {} in environment {}",
                shown, env
            ))
        })?;

        Ok(ConnectionParams {
            datasource: datasource.trim().to_string(),
            url,
            username: non_blank(self.jdbc(env, datasource, "username")),
            password: non_blank(self.jdbc(env, datasource, "password")),
        })
    }
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            key_end = i;
            break;
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start();
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start())
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# comment
! also a comment
environment = test

test.jdbc.order_db.url=jdbc:mysql://db:3306/order_db?useSSL=false
test.jdbc.order_db.username : shop
test.order_db.jdbc.password   secret
test.pay_db.jdbc.url = jdbc:mysql://db:3306/pay_db
test.jdbc.url = jdbc:mysql://db:3306/main
long.value = first,\
             second
escaped\ key = a\tbA
"#;

    #[test]
    fn test_parse() {
        let props = Properties::parse(SAMPLE);
        assert_eq!(props.get("environment"), Some("test"));
        assert_eq!(props.get("test.jdbc.order_db.username"), Some("shop"));
        assert_eq!(props.get("test.order_db.jdbc.password"), Some("secret"));
        assert_eq!(props.get("long.value"), Some("first,second"));
        assert_eq!(props.get("escaped key"), Some("a\tbA"));
        assert!(props.get("# comment").is_none());
        assert_eq!(props.len(), 8);
    }

    #[test]
    fn test_environment_default() {
        assert_eq!(Properties::parse(SAMPLE).environment(), "test");
        assert_eq!(Properties::parse("a=b").environment(), "dev");
    }

    #[test]
    fn test_jdbc_lookup_order() {
        let props = Properties::parse(SAMPLE);
        assert_eq!(
            props.jdbc("test", "order_db", "url"),
            Some("jdbc:mysql://db:3306/order_db?useSSL=false")
        );
        assert_eq!(props.jdbc("test", "order_db", "password"), Some("secret"));
        assert_eq!(
            props.jdbc("test", "pay_db", "url"),
            Some("jdbc:mysql://db:3306/pay_db")
        );
        assert_eq!(props.jdbc("test", "", "url"), Some("jdbc:mysql://db:3306/main"));
        assert_eq!(props.jdbc("dev", "order_db", "url"), None);
    }

    #[test]
    fn test_connection() {
        let props = Properties::parse(SAMPLE);
        let params = props.connection("test", "order_db").unwrap();
        assert_eq!(params.datasource, "order_db");
        assert_eq!(params.username.as_deref(), Some("shop"));
        assert_eq!(params.password.as_deref(), Some("secret"));

        let params = props.connection("test", "pay_db").unwrap();
        assert!(params.username.is_none());
    }

    #[test]
    fn test_missing_url() {
        let props = Properties::parse(SAMPLE);
        let err = props.connection("test", "user_db").unwrap_err();
        assert!(matches!(err, GenerateError::ConfigError(ref m) if m.contains("user_db")));
    }

    #[test]
    fn test_locate() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path();
        let err = Properties::locate(root, None).unwrap_err();
        assert!(err.to_string().contains("src/test/resources/application.properties"));

        let test_res = root.join("src/test/resources");
        std::fs::create_dir_all(&test_res).unwrap();
        std::fs::write(test_res.join("application.properties"), "a=1").unwrap();
        assert_eq!(
            Properties::locate(root, None).unwrap(),
            test_res.join("application.properties")
        );

        let main_res = root.join("src/main/resources");
        std::fs::create_dir_all(&main_res).unwrap();
        std::fs::write(main_res.join("application.properties"), "a=2").unwrap();
        assert_eq!(
            Properties::locate(root, None).unwrap(),
            main_res.join("application.properties")
        );

        assert!(Properties::locate(root, Some(Path::new("other.properties"))).is_err());
    }
}
