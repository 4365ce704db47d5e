//! Template rendering with minijinja

use std::path::{Path, PathBuf};

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use minijinja::value::Rest;
use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::debug;

use super::naming::pluralize;
use crate::error::{GenerateError, Result};
use crate::schema::Table;

/// File extension of template files in an override directory
pub const TEMPLATE_EXTENSION: &str = "j2";

const BUNDLED: &[(&str, &str)] = &[
    ("entity", include_str!("../../templates/entity.j2")),
    ("dao", include_str!("../../templates/dao.j2")),
    ("dao_shard", include_str!("../../templates/dao_shard.j2")),
    ("service", include_str!("../../templates/service.j2")),
    ("service_shard", include_str!("../../templates/service_shard.j2")),
    ("api_controller", include_str!("../../templates/api_controller.j2")),
];

/// Template shipped with the crate under `name`
pub fn bundled_template(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
}

/// Directory holding override templates for a `template_path` setting
///
/// - absolute paths are used as is
/// - `classpath:<p>` is looked up under `src/main/resources`, then `src/main/java`
/// - anything else is relative to the project root
pub fn resolve_template_dir(project_root: &Path, template_path: &str) -> Option<PathBuf> {
    let template_path = template_path.trim();
    if template_path.is_empty() {
        return None;
    }
    if let Some(logical) = template_path.strip_prefix("classpath:") {
        let logical = logical.trim_start_matches('/');
        let resources = project_root.join("src/main/resources").join(logical);
        if resources.exists() {
            return Some(resources);
        }
        return Some(project_root.join("src/main/java").join(logical));
    }
    let path = Path::new(template_path);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        Some(project_root.join(path))
    }
}

/// Join the base package and `parts`, skipping empty segments
pub fn join_package(base: &str, parts: &[String]) -> String {
    std::iter::once(base)
        .chain(parts.iter().map(String::as_str))
        .map(|p| p.trim().trim_matches('.'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Values visible to templates, built fresh for every table and artifact
#[derive(Debug, Serialize)]
pub struct RenderModel<'a> {
    pub table: &'a Table,
    pub domain: &'a str,
    pub datasource: &'a str,
    pub timestamp: &'a str,
}

/// Growable output buffer reused across renders
#[derive(Debug, Default)]
pub struct RenderBuffer {
    bytes: Vec<u8>,
}

impl RenderBuffer {
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }
}

/// Renders named templates for the artifacts of one run
pub struct TemplateRenderer {
    env: Environment<'static>,
    buffer: RenderBuffer,
}

impl TemplateRenderer {
    /// Create a renderer; `template_dir` templates shadow bundled ones by name
    pub fn new(base_package: &str, template_dir: Option<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        let base = join_package(base_package, &[]);
        let global = if base.is_empty() {
            String::new()
        } else {
            format!("{}.", base)
        };
        env.add_global("base_package", Value::from(global));
        env.add_function("package", move |parts: Rest<String>| join_package(&base, &parts));

        env.add_filter("upper_camel", |s: String| s.to_upper_camel_case());
        env.add_filter("lower_camel", |s: String| s.to_lower_camel_case());
        env.add_filter("snake", |s: String| s.to_snake_case());
        env.add_filter("kebab", |s: String| s.to_kebab_case());
        env.add_filter("shouty", |s: String| s.to_shouty_snake_case());
        env.add_filter("plural", |s: String| pluralize(&s));
        env.add_filter("doc", |s: String| doc_text(&s));
        env.add_filter("java_str", |s: String| java_string(&s));

        if let Some(dir) = &template_dir {
            debug!("Template override directory: {}", dir.display());
        }
        env.set_loader(move |name| load_template(template_dir.as_deref(), name));

        Self {
            env,
            buffer: RenderBuffer::default(),
        }
    }

    /// Render `name` with `model`. The returned text lives in the shared
    /// buffer and is replaced by the next call.
    pub fn render(&mut self, name: &str, model: &RenderModel<'_>) -> Result<&str> {
        self.buffer.clear();
        let template = self
            .env
            .get_template(name)
            .map_err(|e| template_error(name, e))?;
        template
            .render_captured_to(model, &mut self.buffer.bytes)
            .map_err(|e| template_error(name, e))?;
        std::str::from_utf8(&self.buffer.bytes).map_err(|e| GenerateError::TemplateRenderError {
            template: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn buffer(&self) -> &RenderBuffer {
        &self.buffer
    }
}

/// Text safe inside a `/** ... */` comment
pub fn doc_text(text: &str) -> String {
    text.replace("*/", "*&#47;")
}

/// Contents of a Java string literal, without the quotes
pub fn java_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn load_template(dir: Option<&Path>, name: &str) -> std::result::Result<Option<String>, minijinja::Error> {
    if let Some(dir) = dir {
        let path = dir.join(format!("{}.{}", name, TEMPLATE_EXTENSION));
        if path.is_file() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read template {}", path.display()),
                )
                .with_source(e)
            });
        }
    }
    Ok(bundled_template(name).map(str::to_string))
}

fn template_error(name: &str, err: minijinja::Error) -> GenerateError {
    if err.kind() == ErrorKind::TemplateNotFound {
        GenerateError::TemplateNotFoundError(name.to_string())
    } else {
        GenerateError::TemplateRenderError {
            template: name.to_string(),
            message: format!("{:#}", err),
        }
    }
}
