//! A named expression over table variables.

use std::collections::BTreeSet;

use geo_profile_metadata_models::{
    ComparisonEditions, EditionMetadata, PoolEntry, TableMetadata, TimeFrame, VariableMetadata,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluator::ExpressionEvaluator;
use crate::saturate::saturate_datapoint;
use crate::{DesignError, PopulateContext};

/// Length of the column suffix of a variable code.
const COLUMN_SUFFIX_LEN: usize = 3;

/// One figure on a profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Internal identifier.
    pub identifier: String,
    /// Label shown on the page.
    pub display_name: String,
    /// Expression over variable codes.
    pub expression: String,
}

impl DataPoint {
    /// Codes of every table the expression reads.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::Eval`] if the expression cannot be parsed.
    pub fn shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<String>, DesignError> {
        let variables = evaluator
            .extract_variables(&self.expression)
            .map_err(|source| DesignError::Eval {
                data_point: self.identifier.clone(),
                source,
            })?;

        Ok(variables
            .iter()
            .filter_map(|variable| {
                variable
                    .len()
                    .checked_sub(COLUMN_SUFFIX_LEN)
                    .and_then(|end| variable.get(..end))
            })
            .filter(|table| !table.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Evaluates the expression for every geography of the lineage.
    ///
    /// # Errors
    ///
    /// Propagates [`saturate_datapoint`] failures.
    pub fn evaluate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        saturate_datapoint(
            &self.display_name,
            ctx.data,
            &ctx.geography.show_detailed_lineage(),
            &self.expression,
            ctx.evaluator,
        )
    }

    /// Metadata of the first table this data point reads.
    ///
    /// Fetched metadata is used as is. Tables that only have a placeholder
    /// get metadata assembled from the `tables` and `release` sections of
    /// the data response, with the configured release years as editions.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::MissingMetadata`] if the table is not in the
    /// pool, or [`DesignError::MissingData`] if the response lacks its
    /// description.
    pub fn table_metadata(&self, ctx: &PopulateContext<'_>) -> Result<TableMetadata, DesignError> {
        let shopping_list = self.shopping_list(ctx.evaluator)?;
        let Some(table_id) = shopping_list.first() else {
            return Err(DesignError::MissingMetadata {
                table: self.identifier.clone(),
            });
        };

        match ctx.pool.get(table_id) {
            Some(PoolEntry::Full(metadata)) => Ok((**metadata).clone()),
            Some(PoolEntry::Placeholder(_)) => metadata_from_response(table_id, ctx),
            None => Err(DesignError::MissingMetadata {
                table: table_id.clone(),
            }),
        }
    }
}

fn metadata_from_response(
    table_id: &str,
    ctx: &PopulateContext<'_>,
) -> Result<TableMetadata, DesignError> {
    let tables = &ctx.data["tables"];
    let table = tables
        .get(table_id)
        .or_else(|| tables.get(table_id.to_uppercase()))
        .ok_or_else(|| DesignError::MissingData {
            message: format!("no table description for {table_id}"),
        })?;

    let title = table["title"].as_str().map(ToString::to_string);
    let variables = table["columns"]
        .as_object()
        .map(|columns| {
            columns
                .iter()
                .map(|(variable, column)| {
                    (
                        variable.clone(),
                        VariableMetadata {
                            variable_name: variable.clone(),
                            indentation: column["indent"].as_i64().unwrap_or_default(),
                            description: column["name"].as_str().unwrap_or_default().to_string(),
                            documentation: Some(String::new()),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(TableMetadata {
        table_name: table_id.to_string(),
        category: Some(String::new()),
        description: title.clone(),
        description_simple: title,
        table_topics: Some(String::new()),
        universe: table["universe"].as_str().map(ToString::to_string),
        subject_area: Some(String::new()),
        source: ctx.data["release"]["name"].as_str().map(ToString::to_string),
        documentation: Some(String::new()),
        variables,
        all_editions: Vec::new(),
        comparison_editions: ComparisonEditions {
            present: Some(EditionMetadata {
                edition: ctx.years.present.to_string(),
            }),
            past: Some(EditionMetadata {
                edition: ctx.years.past.to_string(),
            }),
        },
    })
}

/// The edition of `table` for `timeframe`.
///
/// # Errors
///
/// Returns [`DesignError::NoEdition`] if the table has none.
pub fn populate_year(table: &TableMetadata, timeframe: TimeFrame) -> Result<String, DesignError> {
    table
        .report_year_for_timeframe(timeframe)
        .map(ToString::to_string)
        .ok_or_else(|| DesignError::NoEdition {
            table: table.table_name.clone(),
            timeframe,
        })
}
