//! Entity merge
//!
//! Regenerating an entity must not lose what developers added to it. The
//! generator marks every member it owns with `@Generated("tablegen")`; on
//! regeneration those members are replaced by freshly rendered ones, all
//! other members stay exactly as written. Rendered members without the
//! marker are scaffolding: they are added once, when the file lacks them,
//! and belong to the developer from then on.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;

use thiserror::Error;
use tracing::warn;

use crate::codegen::java_source::{JavaSource, Member, MemberKey, TypeDecl};

/// Simple name of the annotation marking generator-owned members
pub const GENERATED_ANNOTATION: &str = "Generated";

/// Indent for members that do not start on a line of their own
const INDENT: &str = "    ";

#[derive(Debug, Error)]
pub enum MergeError {
    /// The file on disk cannot be scanned; it is left alone
    #[error("existing source: {0}")]
    Existing(String),

    /// Freshly rendered output cannot be scanned
    #[error("rendered source: {0}")]
    Rendered(String),
}

/// What changed between the previously generated and the new members
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
    /// Generated members shadowed by a developer member with the same key
    pub conflicts: Vec<String>,
}

impl MergeReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub source: String,
    pub report: MergeReport,
}

/// Merges freshly rendered entities into existing ones
#[derive(Debug, Clone, Default)]
pub struct EntityMerger {
    /// Class annotations owned by the generator besides those it renders
    managed_annotations: BTreeSet<String>,
}

impl EntityMerger {
    pub fn new<I, S>(managed_annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            managed_annotations: managed_annotations.into_iter().map(Into::into).collect(),
        }
    }

    /// Merge `rendered` into `existing`, returning the new file content
    pub fn merge(&self, rendered: &str, existing: &str) -> Result<MergeOutcome, MergeError> {
        let now = JavaSource::parse(rendered).map_err(|e| MergeError::Rendered(e.to_string()))?;
        let now_type = now
            .primary
            .as_ref()
            .ok_or_else(|| MergeError::Rendered("no type declaration".into()))?;
        let old = JavaSource::parse(existing).map_err(|e| MergeError::Existing(e.to_string()))?;
        let old_type = old
            .primary
            .as_ref()
            .ok_or_else(|| MergeError::Existing("no type declaration".into()))?;

        if now_type.name != old_type.name {
            warn!(
                "Merging {} into existing type {}; keeping the existing declaration",
                now_type.name, old_type.name
            );
        }

        let (members, report) = merge_members(&now, now_type, &old, old_type);

        let mut sections: Vec<String> = Vec::new();

        let prologue_end = old
            .package
            .as_ref()
            .map(|p| p.span.start)
            .unwrap_or(0);
        let prologue = existing[..prologue_end].trim();
        if !prologue.is_empty() {
            sections.push(prologue.to_string());
        }

        let package = old.package_name().or(now.package_name());
        if let Some(package) = package {
            sections.push(format!("package {};", package));
        }

        let imports = merge_imports(&now, &old);
        if !imports.is_empty() {
            sections.push(imports.join("\n"));
        }

        let mut block = String::new();
        let comments = leading_comments(&old, old_type);
        if !comments.is_empty() {
            block.push_str(&comments);
            block.push('\n');
        }
        for annotation in self.merge_annotations(&now, now_type, &old, old_type) {
            block.push_str(&annotation);
            block.push('\n');
        }
        block.push_str(old.text(&old_type.header).trim());
        block.push_str(" {\n");
        if !members.is_empty() {
            block.push_str(&members.join("\n\n"));
            block.push('\n');
        }
        block.push('}');
        sections.push(block);

        let epilogue = existing[old_type.end..].trim();
        if !epilogue.is_empty() {
            sections.push(epilogue.to_string());
        }

        let mut source = sections.join("\n\n");
        source.push('\n');
        Ok(MergeOutcome { source, report })
    }

    /// Rendered annotations first, then the developer's own
    ///
    /// Comments written after an existing annotation follow it, or the
    /// rendered annotation replacing it. Comments after a managed annotation
    /// that is no longer rendered go last, right before the type header.
    fn merge_annotations(
        &self,
        now: &JavaSource<'_>,
        now_type: &TypeDecl,
        old: &JavaSource<'_>,
        old_type: &TypeDecl,
    ) -> Vec<String> {
        let managed: HashSet<&str> = self
            .managed_annotations
            .iter()
            .map(String::as_str)
            .chain(now_type.annotations.iter().map(|a| a.name.as_str()))
            .collect();

        let existing = &old_type.annotations;
        let notes: Vec<Note<'_>> = existing
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let next = existing
                    .get(i + 1)
                    .map_or(old_type.header.start, |n| n.span.start);
                Note::new(&old.source()[a.span.end..next])
            })
            .collect();

        let mut lines = Vec::new();
        let mut placed = HashSet::new();
        for annotation in &now_type.annotations {
            lines.push(now.text(&annotation.span).to_string());
            if placed.insert(annotation.name.as_str()) {
                for (_, note) in existing
                    .iter()
                    .zip(&notes)
                    .filter(|(a, _)| a.name == annotation.name)
                {
                    note.attach(&mut lines);
                }
            }
        }

        let mut orphans = Vec::new();
        for (annotation, note) in existing.iter().zip(&notes) {
            if !managed.contains(annotation.name.as_str()) {
                lines.push(old.text(&annotation.span).to_string());
                note.attach(&mut lines);
            } else if !placed.contains(annotation.name.as_str()) && !note.text.is_empty() {
                orphans.push(note.text.to_string());
            }
        }
        lines.extend(orphans);
        lines
    }
}

/// Comments written after a class annotation
struct Note<'a> {
    text: &'a str,
    /// Starts on the annotation's own line
    inline: bool,
}

impl<'a> Note<'a> {
    fn new(gap: &'a str) -> Self {
        let text = gap.trim();
        let lead = &gap[..gap.len() - gap.trim_start().len()];
        Self {
            text,
            inline: !lead.contains('\n'),
        }
    }

    /// Append after the last of `lines`
    fn attach(&self, lines: &mut Vec<String>) {
        if self.text.is_empty() {
            return;
        }
        match lines.last_mut() {
            Some(last) if self.inline => {
                last.push(' ');
                last.push_str(self.text);
            }
            _ => lines.push(self.text.to_string()),
        }
    }
}

fn is_generated(member: &Member) -> bool {
    member.has_annotation(GENERATED_ANNOTATION)
}

/// Existing imports in their order, then new ones; never removes any
fn merge_imports(now: &JavaSource<'_>, old: &JavaSource<'_>) -> Vec<String> {
    let mut seen = HashSet::new();
    old.imports
        .iter()
        .chain(now.imports.iter())
        .map(|i| i.statement())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// `span` trimmed, behind the whitespace that opens its first line
///
/// Keeps a member's own indentation, tabs included. Text that does not start
/// a line gets [`INDENT`].
fn indented(src: &str, span: Range<usize>) -> String {
    let text = &src[span.clone()];
    let start = span.start + (text.len() - text.trim_start().len());
    let body = src[start..span.end].trim_end();
    let line_start = src[..start].rfind('\n').map_or(0, |p| p + 1);
    let indent = &src[line_start..start];
    if indent.chars().all(|c| c == ' ' || c == '\t') {
        format!("{}{}", indent, body)
    } else {
        format!("{}{}", INDENT, body)
    }
}

/// Comments between the package, the imports and the type declaration
fn leading_comments(old: &JavaSource<'_>, old_type: &TypeDecl) -> String {
    let mut cursor = old.package.as_ref().map(|p| p.span.end).unwrap_or(0);
    let mut pieces = Vec::new();
    for import in &old.imports {
        pieces.push(old.source()[cursor..import.span.start].trim());
        cursor = import.span.end;
    }
    pieces.push(old.source()[cursor..old_type.start].trim());
    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn merge_members(
    now: &JavaSource<'_>,
    now_type: &TypeDecl,
    old: &JavaSource<'_>,
    old_type: &TypeDecl,
) -> (Vec<String>, MergeReport) {
    let mut report = MergeReport::default();

    let developer_keys: HashSet<MemberKey> = old_type
        .members
        .iter()
        .filter(|m| !is_generated(m))
        .filter_map(Member::key)
        .collect();
    let previous: HashMap<MemberKey, &str> = old_type
        .members
        .iter()
        .filter(|m| is_generated(m))
        .filter_map(|m| m.key().map(|k| (k, old.member_text(m))))
        .collect();

    let mut generated_fields = Vec::new();
    let mut generated_others = Vec::new();
    let mut current_keys = HashSet::new();
    for member in now_type.members.iter().filter(|m| is_generated(m)) {
        let text = now.member_text(member);
        let lines = indented(now.source(), member.span.clone());
        if let Some(key) = member.key() {
            if developer_keys.contains(&key) {
                warn!(
                    "Generated member {} is shadowed by a hand-written one; keeping the hand-written member",
                    key
                );
                report.conflicts.push(key.to_string());
                continue;
            }
            match previous.get(&key) {
                None => report.added.push(key.to_string()),
                Some(before) if *before != text => report.updated.push(key.to_string()),
                Some(_) => {}
            }
            current_keys.insert(key);
        }
        if member.is_field() {
            generated_fields.push(lines);
        } else {
            generated_others.push(lines);
        }
    }

    let mut removed: Vec<String> = previous
        .keys()
        .filter(|k| !current_keys.contains(*k) && !developer_keys.contains(*k))
        .map(ToString::to_string)
        .collect();
    removed.sort();
    report.removed = removed;

    let mut scaffold_fields = Vec::new();
    let mut scaffold_others = Vec::new();
    for member in now_type.members.iter().filter(|m| !is_generated(m)) {
        let Some(key) = member.key() else {
            continue;
        };
        if developer_keys.contains(&key) || previous.contains_key(&key) {
            continue;
        }
        let lines = indented(now.source(), member.span.clone());
        if member.is_field() {
            scaffold_fields.push(lines);
        } else {
            scaffold_others.push(lines);
        }
    }

    let old_members = &old_type.members;
    let field_anchor = old_members
        .iter()
        .position(|m| is_generated(m) && m.is_field())
        .or_else(|| old_members.iter().position(|m| !m.is_field()))
        .unwrap_or(old_members.len());
    let other_anchor = old_members
        .iter()
        .position(|m| is_generated(m) && !m.is_field())
        .unwrap_or(old_members.len());

    let mut merged: Vec<String> = Vec::new();
    for index in 0..=old_members.len() {
        if index == field_anchor {
            merged.append(&mut generated_fields);
            merged.append(&mut scaffold_fields);
        }
        if index == other_anchor {
            merged.append(&mut generated_others);
            merged.append(&mut scaffold_others);
        }
        if let Some(member) = old_members.get(index) {
            if !is_generated(member) {
                merged.push(indented(old.source(), member.span.clone()));
            }
        }
    }

    if !old.text(&old_type.trailing).trim().is_empty() {
        merged.push(indented(old.source(), old_type.trailing.clone()));
    }

    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED_V1: &str = r#"package com.acme.shop.entity;

import javax.annotation.Generated;
import javax.persistence.Column;
import javax.persistence.Table;

@Table(name = "user_info")
public class UserInfo {

    @Generated("tablegen")
    @Column(name = "id")
    private Long id;

    @Generated("tablegen")
    @Column(name = "name")
    private String name;

    public UserInfo() {
    }

    @Generated("tablegen")
    public Long getId() {
        return id;
    }

    @Generated("tablegen")
    public String getName() {
        return name;
    }
}
"#;

    const RENDERED_V2: &str = r#"package com.acme.shop.entity;

import java.time.LocalDateTime;
import javax.annotation.Generated;
import javax.persistence.Column;
import javax.persistence.Table;

@Table(name = "user_info")
public class UserInfo {

    @Generated("tablegen")
    @Column(name = "id")
    private Long id;

    @Generated("tablegen")
    @Column(name = "user_name")
    private String name;

    @Generated("tablegen")
    @Column(name = "created_at")
    private LocalDateTime createdAt;

    public UserInfo() {
    }

    @Generated("tablegen")
    public Long getId() {
        return id;
    }

    @Generated("tablegen")
    public String getName() {
        return name;
    }

    @Generated("tablegen")
    public LocalDateTime getCreatedAt() {
        return createdAt;
    }
}
"#;

    fn merger() -> EntityMerger {
        EntityMerger::new(["ShardByMod"])
    }

    /// The file a developer ends up with after editing generated V1
    fn edited_v1() -> String {
        let first = merger().merge(RENDERED_V1, RENDERED_V1).unwrap().source;
        let mut edited = first
            .replace(
                "    public UserInfo() {\n    }",
                "    public UserInfo() {\n        this.name = \"anonymous\";\n    }\n\n    // cached display label\n    private transient String label;",
            )
            .replace(
                "@Table(name = \"user_info\")",
                "@Table(name = \"user_info\")\n@Cacheable",
            );
        let close = edited.rfind('}').unwrap();
        edited.insert_str(
            close,
            "\n    public String describe() {\n        return name + label;\n    }\n",
        );
        edited
    }

    #[test]
    fn test_merge_with_itself_is_stable() {
        let outcome = merger().merge(RENDERED_V1, RENDERED_V1).unwrap();
        assert!(outcome.report.is_unchanged());
        assert!(outcome.report.conflicts.is_empty());
        let again = merger().merge(RENDERED_V1, &outcome.source).unwrap();
        assert_eq!(again.source, outcome.source);
    }

    #[test]
    fn test_developer_members_survive() {
        let existing = edited_v1();
        let outcome = merger().merge(RENDERED_V2, &existing).unwrap();
        let source = &outcome.source;

        assert!(source.contains("this.name = \"anonymous\";"));
        assert!(source.contains("// cached display label\n    private transient String label;"));
        assert!(source.contains("public String describe()"));
        assert!(source.contains("@Cacheable"));
        assert!(source.contains("private LocalDateTime createdAt;"));
        assert!(source.contains("@Column(name = \"user_name\")"));
        assert!(!source.contains("@Column(name = \"name\")"));
        assert!(source.contains("import java.time.LocalDateTime;"));
        assert_eq!(source.matches("public UserInfo()").count(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = edited_v1();
        let once = merger().merge(RENDERED_V2, &existing).unwrap();
        let twice = merger().merge(RENDERED_V2, &once.source).unwrap();
        assert_eq!(twice.source, once.source);
        assert!(twice.report.is_unchanged());
    }

    #[test]
    fn test_report() {
        let existing = edited_v1();
        let outcome = merger().merge(RENDERED_V2, &existing).unwrap();
        assert_eq!(outcome.report.added, vec!["createdAt", "getCreatedAt()"]);
        assert_eq!(outcome.report.updated, vec!["name"]);
        assert!(outcome.report.removed.is_empty());
    }

    #[test]
    fn test_removed_column() {
        let outcome = merger().merge(RENDERED_V1, RENDERED_V2).unwrap();
        assert_eq!(outcome.report.removed, vec!["createdAt", "getCreatedAt()"]);
        assert!(!outcome.source.contains("createdAt"));
        // imports are never dropped
        assert!(outcome.source.contains("import java.time.LocalDateTime;"));
    }

    #[test]
    fn test_generated_members_not_duplicated() {
        let outcome = merger().merge(RENDERED_V2, RENDERED_V2).unwrap();
        assert_eq!(outcome.source.matches("private Long id;").count(), 1);
        assert_eq!(outcome.source.matches("public Long getId()").count(), 1);
    }

    #[test]
    fn test_conflict_keeps_developer_member() {
        let existing = RENDERED_V1.replace(
            "    @Generated(\"tablegen\")\n    public String getName() {\n        return name;\n    }",
            "    public String getName() {\n        return name.trim();\n    }",
        );
        let outcome = merger().merge(RENDERED_V2, &existing).unwrap();
        assert_eq!(outcome.report.conflicts, vec!["getName()"]);
        assert!(outcome.source.contains("return name.trim();"));
        assert_eq!(outcome.source.matches("public String getName()").count(), 1);
    }

    #[test]
    fn test_managed_class_annotations_replaced() {
        let rendered = RENDERED_V1.replace(
            "@Table(name = \"user_info\")",
            "@ShardByMod(value = 8)\n@Table(name = \"user_info\")",
        );
        let existing = RENDERED_V1.replace(
            "@Table(name = \"user_info\")",
            "@ShardByMod(value = 4)\n@Table(name = \"user_info_old\")\n@Cacheable",
        );
        let outcome = merger().merge(&rendered, &existing).unwrap();
        assert!(outcome
            .source
            .contains("@ShardByMod(value = 8)\n@Table(name = \"user_info\")\n@Cacheable\npublic class UserInfo {"));
        assert!(!outcome.source.contains("value = 4"));
        assert!(!outcome.source.contains("user_info_old"));
    }

    #[test]
    fn test_unsharded_drops_stale_shard_annotation() {
        let existing = RENDERED_V1.replace(
            "@Table(name = \"user_info\")",
            "@ShardByMod(value = 4)\n@Table(name = \"user_info\")",
        );
        let outcome = merger().merge(RENDERED_V1, &existing).unwrap();
        assert!(!outcome.source.contains("ShardByMod"));
    }

    #[test]
    fn test_prologue_and_javadoc_kept() {
        let existing = format!(
            "// Copyright Acme\n{}",
            RENDERED_V1.replace(
                "@Table(name = \"user_info\")",
                "/**\n * A user.\n */\n@Table(name = \"user_info\")"
            )
        );
        let outcome = merger().merge(RENDERED_V1, &existing).unwrap();
        assert!(outcome.source.starts_with("// Copyright Acme\n\npackage com.acme.shop.entity;"));
        assert!(outcome.source.contains("/**\n * A user.\n */\n@Table"));
    }

    #[test]
    fn test_comments_between_class_annotations_kept() {
        let rendered = RENDERED_V1.replace(
            "@Table(name = \"user_info\")",
            "@Entity\n@Table(name = \"user_info\")",
        );
        let existing = rendered.replace(
            "@Entity\n@Table(name = \"user_info\")\n",
            "@Entity\n// keep me\n@Table(name = \"user_info\")\n@Cacheable // second level\n/* 缓存区域 */\n",
        );
        let outcome = merger().merge(&rendered, &existing).unwrap();
        assert!(outcome.source.contains(
            "@Entity\n// keep me\n@Table(name = \"user_info\")\n@Cacheable // second level\n/* 缓存区域 */\npublic class UserInfo {"
        ));

        let again = merger().merge(&rendered, &outcome.source).unwrap();
        assert_eq!(again.source, outcome.source);
    }

    #[test]
    fn test_comment_of_dropped_annotation_kept() {
        let existing = RENDERED_V1.replace(
            "@Table(name = \"user_info\")",
            "@ShardByMod(value = 4) // four shards\n@Table(name = \"user_info\")",
        );
        let outcome = merger().merge(RENDERED_V1, &existing).unwrap();
        assert!(!outcome.source.contains("@ShardByMod"));
        assert!(outcome
            .source
            .contains("@Table(name = \"user_info\")\n// four shards\npublic class UserInfo {"));

        let again = merger().merge(RENDERED_V1, &outcome.source).unwrap();
        assert_eq!(again.source, outcome.source);
    }

    #[test]
    fn test_tab_indented_members_kept_verbatim() {
        let existing = RENDERED_V1.replace(
            "    public UserInfo() {\n    }",
            "\tpublic UserInfo() {\n\t\tthis.name = \"anonymous\";\n\t}",
        );
        let outcome = merger().merge(RENDERED_V1, &existing).unwrap();
        assert!(outcome
            .source
            .contains("\n\tpublic UserInfo() {\n\t\tthis.name = \"anonymous\";\n\t}\n"));
        assert!(outcome.source.contains("\n    @Generated(\"tablegen\")\n    private Long id;"));

        let again = merger().merge(RENDERED_V1, &outcome.source).unwrap();
        assert_eq!(again.source, outcome.source);
    }

    #[test]
    fn test_multibyte_members_survive() {
        let existing = RENDERED_V1
            .replace(
                "    public UserInfo() {\n    }",
                "    public UserInfo() {\n    }\n\n    /** 显示名称 */\n    private static final String SQL = \"\"\"\n        select * from 用户\n        \"\"\";",
            )
            .replace(
                "@Table(name = \"user_info\")",
                "/**\n * 用户信息\n */\n@Table(name = \"user_info\")",
            );
        let outcome = merger().merge(RENDERED_V2, &existing).unwrap();
        assert!(outcome.source.contains(
            "    /** 显示名称 */\n    private static final String SQL = \"\"\"\n        select * from 用户\n        \"\"\";"
        ));
        assert!(outcome.source.contains("/**\n * 用户信息\n */\n@Table"));
        assert_eq!(outcome.report.added, vec!["createdAt", "getCreatedAt()"]);

        let again = merger().merge(RENDERED_V2, &outcome.source).unwrap();
        assert_eq!(again.source, outcome.source);
    }

    #[test]
    fn test_unparsable_existing() {
        let err = merger()
            .merge(RENDERED_V1, "package a;\npublic class UserInfo {")
            .unwrap_err();
        assert!(matches!(err, MergeError::Existing(_)));
    }
}
