//! # Table Enumeration

use crate::errors::SyncError;
use crate::pipeline::plan::TableSelection;
use crate::providers::db::RowSource;
use regex::Regex;
use tracing::info;

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, SyncError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("^(?:{p})$"))
                .map_err(|e| SyncError::Config(format!("Invalid table pattern '{p}': {e}")))
        })
        .collect()
}

/// Produces the ordered list of tables to export.
///
/// Static lists keep their order with duplicates removed. Catalog listings
/// keep catalog order; a non-empty `include` acts as an allow list and
/// `exclude` always wins. A failing catalog query aborts the run.
pub async fn enumerate_tables(
    source: &dyn RowSource,
    selection: &TableSelection,
) -> Result<Vec<String>, SyncError> {
    let tables = match selection {
        TableSelection::Static { tables } => tables.clone(),
        TableSelection::Catalog {
            schema,
            include,
            exclude,
        } => {
            let include = compile_patterns(include)?;
            let exclude = compile_patterns(exclude)?;
            let listed = source.list_tables(schema).await.map_err(|e| match e {
                SyncError::CatalogUnavailable(_) => e,
                other => SyncError::CatalogUnavailable(other.to_string()),
            })?;
            info!(
                "{} listed {} tables in schema '{schema}'.",
                source.name(),
                listed.len()
            );
            listed
                .into_iter()
                .filter(|t| include.is_empty() || include.iter().any(|re| re.is_match(t)))
                .filter(|t| !exclude.iter().any(|re| re.is_match(t)))
                .collect()
        }
    };

    let mut unique: Vec<String> = Vec::with_capacity(tables.len());
    for t in tables {
        if !unique.contains(&t) {
            unique.push(t);
        }
    }
    Ok(unique)
}
