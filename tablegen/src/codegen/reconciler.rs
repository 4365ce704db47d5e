//! Per-file write / skip / merge decisions

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::merge::{EntityMerger, MergeError, MergeReport};
use crate::error::{GenerateError, Result};
use crate::schema::Table;

/// Category of generated source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Entity,
    Dao,
    Service,
    ApiController,
}

impl ArtifactKind {
    /// All kinds in generation order
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Entity,
        ArtifactKind::Dao,
        ArtifactKind::Service,
        ArtifactKind::ApiController,
    ];

    pub fn template_name(self) -> &'static str {
        match self {
            ArtifactKind::Entity => "entity",
            ArtifactKind::Dao => "dao",
            ArtifactKind::Service => "service",
            ArtifactKind::ApiController => "api_controller",
        }
    }

    /// Kinds with a `_shard` template variant
    pub fn is_shard_aware(self) -> bool {
        matches!(self, ArtifactKind::Dao | ArtifactKind::Service)
    }

    /// Kinds kept in sync with the schema once the file exists
    pub fn is_regenerable(self) -> bool {
        self == ArtifactKind::Entity
    }

    /// Template to render for `table`
    pub fn template_for(self, table: &Table) -> String {
        if self.is_shard_aware() && table.is_sharded() {
            format!("{}_shard", self.template_name())
        } else {
            self.template_name().to_string()
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// What happened to one target file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// File was absent and has been written
    Generated,
    /// Existing entity merged with the fresh render
    Merged(MergeReport),
    /// File exists and was left untouched
    Skipped,
    /// Artifact could not be produced; the message says why
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Generated => "generated",
            Outcome::Merged(_) => "merged",
            Outcome::Skipped => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Applies the overwrite policy to rendered artifacts
#[derive(Debug, Clone)]
pub struct Reconciler {
    overwrite: bool,
    dry_run: bool,
    merger: EntityMerger,
}

impl Reconciler {
    pub fn new(overwrite: bool, dry_run: bool, merger: EntityMerger) -> Self {
        Self {
            overwrite,
            dry_run,
            merger,
        }
    }

    /// Write, merge or skip `path` for freshly rendered `code`
    pub fn reconcile(&self, kind: ArtifactKind, path: &Path, code: &str) -> Result<Outcome> {
        if !path.exists() {
            self.write(path, code)?;
            debug!("Generated {} {}", kind, path.display());
            return Ok(Outcome::Generated);
        }

        if !kind.is_regenerable() {
            debug!("{} {} exists, skipped", kind, path.display());
            return Ok(Outcome::Skipped);
        }

        if !self.overwrite {
            info!("{} exists and overwrite is off, skipped", path.display());
            return Ok(Outcome::Skipped);
        }

        let existing = fs::read_to_string(path)?;
        let merged = self.merger.merge(code, &existing).map_err(|e| match e {
            MergeError::Existing(message) => GenerateError::UnparsableExistingSourceError {
                path: path.to_path_buf(),
                message,
            },
            MergeError::Rendered(message) => GenerateError::TemplateRenderError {
                template: kind.template_name().to_string(),
                message,
            },
        })?;

        for conflict in &merged.report.conflicts {
            warn!(
                "{}: hand-written member {} shadows a generated one and was kept",
                path.display(),
                conflict
            );
        }
        if merged.source != existing {
            self.write(path, &merged.source)?;
        }
        debug!(
            "Merged {} (added {:?}, removed {:?}, updated {:?})",
            path.display(),
            merged.report.added,
            merged.report.removed,
            merged.report.updated
        );
        Ok(Outcome::Merged(merged.report))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if self.dry_run {
            info!("Would write {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTITY: &str = "package a.entity;\n\npublic class Foo {\n\n    @Generated(\"tablegen\")\n    private Long id;\n}\n";
    const ENTITY_V2: &str = "package a.entity;\n\npublic class Foo {\n\n    @Generated(\"tablegen\")\n    private Long id;\n\n    @Generated(\"tablegen\")\n    private String name;\n}\n";

    fn reconciler(overwrite: bool, dry_run: bool) -> Reconciler {
        Reconciler::new(overwrite, dry_run, EntityMerger::default())
    }

    #[test]
    fn test_template_for() {
        let mut table = Table::new("orders", "shop");
        assert_eq!(ArtifactKind::Dao.template_for(&table), "dao");
        table.shard_count = 4;
        assert_eq!(ArtifactKind::Dao.template_for(&table), "dao_shard");
        assert_eq!(ArtifactKind::Service.template_for(&table), "service_shard");
        assert_eq!(ArtifactKind::Entity.template_for(&table), "entity");
        assert_eq!(ArtifactKind::ApiController.template_for(&table), "api_controller");
    }

    #[test]
    fn test_absent_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/dao/FooDao.java");
        let outcome = reconciler(false, false)
            .reconcile(ArtifactKind::Dao, &path, "package a.dao;\ninterface FooDao {}\n")
            .unwrap();
        assert_eq!(outcome, Outcome::Generated);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "package a.dao;\ninterface FooDao {}\n"
        );
    }

    #[test]
    fn test_scaffold_kinds_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FooService.java");
        fs::write(&path, "hand written").unwrap();
        for kind in [ArtifactKind::Dao, ArtifactKind::Service, ArtifactKind::ApiController] {
            let outcome = reconciler(true, false)
                .reconcile(kind, &path, "package a;\nclass FooService {}\n")
                .unwrap();
            assert_eq!(outcome, Outcome::Skipped);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "hand written");
    }

    #[test]
    fn test_entity_without_overwrite_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.java");
        fs::write(&path, ENTITY).unwrap();
        let outcome = reconciler(false, false)
            .reconcile(ArtifactKind::Entity, &path, ENTITY_V2)
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(fs::read_to_string(&path).unwrap(), ENTITY);
    }

    #[test]
    fn test_entity_with_overwrite_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.java");
        fs::write(&path, ENTITY).unwrap();
        let outcome = reconciler(true, false)
            .reconcile(ArtifactKind::Entity, &path, ENTITY_V2)
            .unwrap();
        match outcome {
            Outcome::Merged(report) => assert_eq!(report.added, vec!["name"]),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(fs::read_to_string(&path).unwrap().contains("private String name;"));
    }

    #[test]
    fn test_unparsable_entity_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.java");
        fs::write(&path, "package a;\nclass Foo {").unwrap();
        let err = reconciler(true, false)
            .reconcile(ArtifactKind::Entity, &path, ENTITY)
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnparsableExistingSourceError { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "package a;\nclass Foo {");
    }

    #[test]
    fn test_multibyte_text_block_survives_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.java");
        let existing = ENTITY.replace(
            "    private Long id;\n",
            "    private Long id;\n\n    // 用户查询\n    private static final String SQL = \"\"\"\n        select * from 用户\n        \"\"\";\n",
        );
        fs::write(&path, &existing).unwrap();
        let outcome = reconciler(true, false)
            .reconcile(ArtifactKind::Entity, &path, ENTITY_V2)
            .unwrap();
        assert_eq!(outcome.label(), "merged");
        let merged = fs::read_to_string(&path).unwrap();
        assert!(merged.contains("    // 用户查询\n    private static final String SQL = \"\"\"\n        select * from 用户\n        \"\"\";"));
        assert!(merged.contains("private String name;"));
    }

    #[test]
    fn test_broken_multibyte_text_block_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Foo.java");
        let existing = ENTITY.replace(
            "    private Long id;\n}",
            "    private Long id;\n\n    private String sql = \"\"\"\n        select * from 用户\n}",
        );
        fs::write(&path, &existing).unwrap();
        let err = reconciler(true, false)
            .reconcile(ArtifactKind::Entity, &path, ENTITY_V2)
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnparsableExistingSourceError { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), existing);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/Foo.java");
        let outcome = reconciler(true, true)
            .reconcile(ArtifactKind::Entity, &path, ENTITY)
            .unwrap();
        assert_eq!(outcome, Outcome::Generated);
        assert!(!path.exists());
        assert!(!dir.path().join("a").exists());
    }
}
