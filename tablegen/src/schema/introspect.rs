use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use tracing::{debug, info, warn};

use super::model::{SchemaModel, SkippedTable, Table};
use super::{SchemaSource, TableInfo};
use crate::codegen::Normalizer;
use crate::error::Result;

/// Decides which physical tables take part in a run
///
/// A non-empty include set wins: only tables named in it are kept. Otherwise
/// tables whose whole name matches the exclusion pattern (ignoring case)
/// are dropped.
#[derive(Debug, Clone)]
pub struct TableSelector {
    include: BTreeSet<String>,
    exclude: Option<Regex>,
}

impl TableSelector {
    pub fn new<I, S>(include: I, exclude_pattern: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let include = include
            .into_iter()
            .map(Into::into)
            .map(|s: String| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let exclude = if exclude_pattern.trim().is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i)^(?:{})$", exclude_pattern))?)
        };
        Ok(Self { include, exclude })
    }

    pub fn is_selected(&self, raw_name: &str) -> bool {
        if !self.include.is_empty() {
            return self.include.contains(raw_name);
        }
        match &self.exclude {
            Some(pattern) => !pattern.is_match(raw_name),
            None => true,
        }
    }
}

/// Build the schema model of one datasource
///
/// Physical tables reducing to the same name under the normalizer's strip
/// pattern are grouped into one logical table whose shard count is the group
/// size; columns come from the first table of the group. Tables whose
/// columns cannot be read, or whose name normalizes to nothing, are logged
/// and recorded as skipped. Only a failure to list tables is returned as an
/// error.
pub fn introspect(
    source: &mut dyn SchemaSource,
    datasource: &str,
    selector: &TableSelector,
    normalizer: &Normalizer,
) -> Result<SchemaModel> {
    let listed = source.list_tables()?;
    let total = listed.len();

    let mut groups: Vec<(String, Vec<TableInfo>)> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for info in listed {
        if !selector.is_selected(&info.name) {
            debug!("Table {} not selected", info.name);
            continue;
        }
        let logical = normalizer.strip(&info.name);
        let key = (info.database.clone(), logical.clone());
        match index.get(&key) {
            Some(&i) => groups[i].1.push(info),
            None => {
                index.insert(key, groups.len());
                groups.push((logical, vec![info]));
            }
        }
    }

    let mut model = SchemaModel {
        datasource: datasource.to_string(),
        ..SchemaModel::default()
    };

    for (logical, members) in groups {
        let first = &members[0];
        let mut skip = |name: &str, reason: String| {
            warn!("Skipping table {}: {}", name, reason);
            model.skipped.push(SkippedTable {
                name: name.to_string(),
                reason,
            });
        };

        let columns = match source.list_columns(first) {
            Ok(columns) if columns.is_empty() => {
                skip(&first.name, "no columns".to_string());
                continue;
            }
            Ok(columns) => columns,
            Err(e) => {
                skip(&first.name, e.to_string());
                continue;
            }
        };

        let class_name = match normalizer.class_name(&first.name) {
            Ok(name) => name,
            Err(e) => {
                skip(&first.name, e.to_string());
                continue;
            }
        };

        let name = if members.len() > 1 {
            logical
        } else {
            first.name.clone()
        };
        let mut table = Table::new(name, first.database.clone());
        table.comment = first.comment.clone();
        table.columns = columns;
        table.shard_count = members.len();
        table.physical_names = members.iter().map(|m| m.name.clone()).collect();

        if let Err(e) = table.bind(class_name, normalizer) {
            skip(&first.name, e.to_string());
            continue;
        }
        model.tables.push(table);
    }

    info!(
        "Datasource {:?}: {} tables listed, {} selected, {} skipped",
        datasource,
        total,
        model.tables.len(),
        model.skipped.len()
    );
    Ok(model)
}
