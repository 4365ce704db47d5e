//! Generation pipeline: introspect, render, resolve, reconcile

use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use super::merge::EntityMerger;
use super::naming::domain_of;
use super::path_resolver::resolve_path;
use super::reconciler::{ArtifactKind, Outcome, Reconciler};
use super::renderer::{RenderModel, TemplateRenderer};
use crate::config::RunConfig;
use crate::error::{GenerateError, Result};
use crate::schema::{
    introspect, open_source, ConnectionParams, SchemaModel, SchemaSource, SkippedTable, Table,
};

/// Result of one artifact of one table
#[derive(Debug, Clone)]
pub struct ArtifactReport {
    pub kind: ArtifactKind,
    /// Target file, when rendering got far enough to know it
    pub path: Option<PathBuf>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct TableSummary {
    pub table: String,
    pub class_name: String,
    pub artifacts: Vec<ArtifactReport>,
}

#[derive(Debug, Clone, Default)]
pub struct DatasourceSummary {
    pub datasource: String,
    pub tables: Vec<TableSummary>,
    /// Tables left out during introspection
    pub skipped: Vec<SkippedTable>,
}

/// Everything a run did, per datasource, table and artifact
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub datasources: Vec<DatasourceSummary>,
}

impl RunSummary {
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.datasources
            .iter()
            .flat_map(|d| d.tables.iter())
            .flat_map(|t| t.artifacts.iter())
    }

    fn count(&self, label: &str) -> usize {
        self.artifacts().filter(|a| a.outcome.label() == label).count()
    }

    pub fn generated(&self) -> usize {
        self.count("generated")
    }

    pub fn merged(&self) -> usize {
        self.count("merged")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    /// Number of tables processed over all datasources
    pub fn tables(&self) -> usize {
        self.datasources.iter().map(|d| d.tables.len()).sum()
    }

    /// Files written or merged
    pub fn written_paths(&self) -> Vec<&PathBuf> {
        self.artifacts()
            .filter(|a| matches!(a.outcome, Outcome::Generated | Outcome::Merged(_)))
            .filter_map(|a| a.path.as_ref())
            .collect()
    }
}

/// Runs generation for one [`RunConfig`]
///
/// Not meant to be shared between threads: tables and artifacts are handled
/// one at a time against one source tree.
pub struct CodeGenerator<'a> {
    run: &'a RunConfig,
    renderer: TemplateRenderer,
    reconciler: Reconciler,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(run: &'a RunConfig) -> Self {
        let renderer = TemplateRenderer::new(&run.base_package, run.template_dir.clone());
        let merger = EntityMerger::new([run.shard_annotation_name()]);
        let reconciler = Reconciler::new(run.overwrite, run.dry_run, merger);
        Self {
            run,
            renderer,
            reconciler,
        }
    }

    /// Generate for every configured datasource, opening sources by URL
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_with(open_source)
    }

    /// Generate for every configured datasource with sources from `open`
    ///
    /// Datasources are handled in order, each with its own source, closed
    /// before the next one is opened. Failing to open a source or to list
    /// its tables ends the run with an error.
    pub fn run_with<F>(&mut self, mut open: F) -> Result<RunSummary>
    where
        F: FnMut(&ConnectionParams) -> Result<Box<dyn SchemaSource>>,
    {
        let run = self.run;
        info!(
            "BEGIN code generation into {} ({} datasource(s))",
            run.source_root.display(),
            run.datasources.len()
        );

        let mut summary = RunSummary::default();
        for params in &run.datasources {
            let datasource = match self.generate_datasource(params, &mut open) {
                Ok(datasource) => datasource,
                Err(e) => {
                    error!(
                        "Code generation aborted at datasource {:?}: {}",
                        params.datasource, e
                    );
                    info!("END code generation (aborted)");
                    return Err(e);
                }
            };
            summary.datasources.push(datasource);
        }

        info!(
            "END code generation: {} tables, {} generated, {} merged, {} skipped, {} failed",
            summary.tables(),
            summary.generated(),
            summary.merged(),
            summary.skipped(),
            summary.failed()
        );
        Ok(summary)
    }

    fn generate_datasource<F>(
        &mut self,
        params: &ConnectionParams,
        open: &mut F,
    ) -> Result<DatasourceSummary>
    where
        F: FnMut(&ConnectionParams) -> Result<Box<dyn SchemaSource>>,
    {
        info!("Reading schema of datasource {:?}", params.datasource);
        let mut source = open(params)?;
        let model = introspect(
            source.as_mut(),
            &params.datasource,
            &self.run.selector,
            &self.run.normalizer,
        );
        if let Err(e) = source.close() {
            warn!("Failed to close datasource {:?}: {}", params.datasource, e);
        }
        drop(source);

        Ok(self.generate_model(model?))
    }

    /// Render and reconcile every table of an introspected model
    pub fn generate_model(&mut self, model: SchemaModel) -> DatasourceSummary {
        let SchemaModel {
            datasource,
            tables,
            skipped,
        } = model;

        let mut summary = DatasourceSummary {
            datasource,
            tables: Vec::with_capacity(tables.len()),
            skipped,
        };
        for mut table in tables {
            let table_summary = self.generate_table(&mut table, &summary.datasource);
            summary.tables.push(table_summary);
        }
        summary
    }

    fn generate_table(&mut self, table: &mut Table, datasource: &str) -> TableSummary {
        let run = self.run;
        table.attach_shard_annotation(&run.shard_annotation);

        let domain = if datasource.trim().is_empty() {
            domain_of(&table.database)
        } else {
            domain_of(datasource)
        };
        let model = RenderModel {
            table,
            domain: &domain,
            datasource,
            timestamp: &run.timestamp,
        };

        let mut artifacts = Vec::new();
        for kind in ArtifactKind::ALL {
            if kind == ArtifactKind::ApiController && !run.generate_api {
                continue;
            }
            let report = self.generate_artifact(kind, &model);
            artifacts.push(report);
        }

        let mut line = String::new();
        for a in &artifacts {
            let _ = write!(line, " {}={}", a.kind, a.outcome.label());
        }
        info!("Table {} ({}):{}", table.name, table.class_name().unwrap_or("?"), line);

        TableSummary {
            table: table.name.clone(),
            class_name: table.class_name().unwrap_or_default().to_string(),
            artifacts,
        }
    }

    fn generate_artifact(&mut self, kind: ArtifactKind, model: &RenderModel<'_>) -> ArtifactReport {
        let template = kind.template_for(model.table);
        let mut path = None;

        let result = (|| -> Result<Outcome> {
            let code = self.renderer.render(&template, model)?;
            let target = resolve_path(&self.run.source_root, code)?;
            debug!("{} {} -> {}", template, model.table.name, target.display());
            path = Some(target.clone());
            self.reconciler.reconcile(kind, &target, code)
        })();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e @ GenerateError::UnparsableExistingSourceError { .. }) => {
                warn!("{}; file left untouched", e);
                Outcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(
                    "Failed to generate {} for table {}: {}",
                    kind, model.table.name, e
                );
                Outcome::Failed(e.to_string())
            }
        };

        ArtifactReport {
            kind,
            path,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Normalizer;
    use crate::config::defaults;
    use crate::schema::{Column, ColumnKey, TableInfo, TableSelector};
    use regex::Regex;
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;

    struct MemorySource {
        tables: Vec<&'static str>,
        closed: Rc<Cell<bool>>,
    }

    impl SchemaSource for MemorySource {
        fn list_tables(&mut self) -> Result<Vec<TableInfo>> {
            Ok(self
                .tables
                .iter()
                .map(|name| TableInfo {
                    name: name.to_string(),
                    database: "shop".into(),
                    comment: None,
                })
                .collect())
        }

        fn list_columns(&mut self, _table: &TableInfo) -> Result<Vec<Column>> {
            Ok(vec![
                Column::new("id", "bigint", false).with_key(ColumnKey::Primary),
                Column::new("created_at", "datetime", true),
            ])
        }

        fn close(&mut self) -> Result<()> {
            self.closed.set(true);
            Ok(())
        }
    }

    fn run_config(root: &Path, datasources: &[&str]) -> RunConfig {
        RunConfig {
            project_root: root.to_path_buf(),
            source_root: root.join("src/main/java"),
            base_package: "com.acme".into(),
            overwrite: false,
            dry_run: false,
            generate_api: false,
            datasources: datasources
                .iter()
                .map(|name| ConnectionParams {
                    datasource: name.to_string(),
                    url: format!("file:{}.sql", name),
                    username: None,
                    password: None,
                })
                .collect(),
            selector: TableSelector::new(Vec::<String>::new(), "").unwrap(),
            normalizer: Normalizer::new(Regex::new(defaults::TABLE_STRIP_REGEX).unwrap()),
            template_dir: None,
            shard_annotation: defaults::SHARD_ANNOTATION.into(),
            timestamp: "2024-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn test_run_with_memory_source() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_config(dir.path(), &["order_db"]);
        let closed = Rc::new(Cell::new(false));

        let summary = CodeGenerator::new(&run)
            .run_with(|_| {
                Ok(Box::new(MemorySource {
                    tables: vec!["orders_0", "orders_1", "coupon"],
                    closed: closed.clone(),
                }) as Box<dyn SchemaSource>)
            })
            .unwrap();

        assert!(closed.get());
        assert_eq!(summary.tables(), 2);
        assert_eq!(summary.generated(), 6);
        let root = dir.path().join("src/main/java/com/acme/order/db");
        assert!(root.join("entity/Coupon.java").is_file());
        assert!(root.join("service/OrdersService.java").is_file());

        let entity = std::fs::read_to_string(root.join("entity/Orders.java")).unwrap();
        assert!(entity.contains("@ShardByMod(value = 2)"));
        assert!(entity.contains("Generated by tablegen at 2024-01-01 00:00:00"));
    }

    #[test]
    fn test_blank_datasource_uses_database_as_domain() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_config(dir.path(), &[""]);

        let summary = CodeGenerator::new(&run)
            .run_with(|_| {
                Ok(Box::new(MemorySource {
                    tables: vec!["coupon"],
                    closed: Rc::new(Cell::new(false)),
                }) as Box<dyn SchemaSource>)
            })
            .unwrap();

        let path = summary.artifacts().next().and_then(|a| a.path.clone());
        assert_eq!(
            path,
            Some(dir.path().join("src/main/java/com/acme/shop/entity/Coupon.java"))
        );
    }

    #[test]
    fn test_open_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_config(dir.path(), &["order_db", "user_db"]);
        let mut opened = Vec::new();

        let result = CodeGenerator::new(&run).run_with(|params| {
            opened.push(params.datasource.clone());
            Err(GenerateError::ConnectionError("refused".into()))
        });

        assert!(matches!(result, Err(GenerateError::ConnectionError(_))));
        assert_eq!(opened, vec!["order_db"]);
        assert!(!dir.path().join("src").exists());
    }

    #[test]
    fn test_generate_model_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("dao.j2"), "public interface {{ table.missing }} {}\n").unwrap();

        let mut run = run_config(dir.path(), &["shop"]);
        run.template_dir = Some(templates);
        let normalizer = run.normalizer.clone();

        let mut table = Table::new("coupon", "shop");
        table.columns = vec![Column::new("id", "int", false).with_key(ColumnKey::Primary)];
        table.bind("Coupon".into(), &normalizer).unwrap();
        let model = SchemaModel {
            datasource: "shop".into(),
            tables: vec![table],
            skipped: Vec::new(),
        };

        let summary = CodeGenerator::new(&run).generate_model(model);
        let outcomes: Vec<&str> = summary.tables[0]
            .artifacts
            .iter()
            .map(|a| a.outcome.label())
            .collect();
        assert_eq!(outcomes, vec!["generated", "failed", "generated"]);
        assert!(summary.tables[0].artifacts[1].path.is_none());
    }
}
