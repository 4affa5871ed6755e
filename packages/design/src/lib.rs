#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Profile design tree.
//!
//! A profile template describes what a profile page shows: sections of rows
//! of charts, each chart built from [`DataPoint`]s whose expressions combine
//! table variables. The tree answers two questions:
//!
//! * which tables must be fetched ([`DesignTree::collect_shopping_list`]),
//! * and, once the data is in, what every chart shows for the queried
//!   geography and its comparison geographies ([`DesignTree::populate`]).
//!
//! Expressions are evaluated through the [`ExpressionEvaluator`] seam;
//! [`SexprEvaluator`] is a small prefix-notation implementation.

pub mod cache;
pub mod data_point;
pub mod design;
pub mod evaluator;
pub mod namespace;
pub mod saturate;
pub mod template;
pub mod util;

use std::collections::BTreeSet;

use geo_profile_estimate::ArithmeticError;
use geo_profile_geography_models::Geography;
use geo_profile_metadata_models::{MetadataPool, ReleaseYears, TableRequest, TimeFrame};
use serde_json::Value;
use thiserror::Error;

pub use cache::TemplateCache;
pub use data_point::DataPoint;
pub use design::{
    ColumnChart, ColumnWidth, Design, DesignCommon, DoughnutChart, GroupedColumnChart, SingleStat,
    StatType,
};
pub use evaluator::{ExpressionEvaluator, SexprEvaluator};
pub use namespace::Namespace;
pub use saturate::saturate_datapoint;
pub use template::{ProfileTemplate, Row, Section};

/// Errors raised while evaluating an expression.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The expression text is malformed.
    #[error("Parse error in `{expression}`: {message}")]
    Parse {
        /// The expression.
        expression: String,
        /// What went wrong.
        message: String,
    },

    /// A variable is not present in the namespace.
    #[error("Unknown variable {name}")]
    UnknownVariable {
        /// Variable code.
        name: String,
    },

    /// The operator is not supported.
    #[error("Unknown operator {operator}")]
    UnknownOperator {
        /// Operator symbol.
        operator: String,
    },

    /// An operator got the wrong number of arguments.
    #[error("Operator {operator} takes {expected}, got {count}")]
    Arity {
        /// Operator symbol.
        operator: String,
        /// What it accepts.
        expected: &'static str,
        /// What it got.
        count: usize,
    },

    /// Estimate arithmetic failed.
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// Errors raised while loading or populating a design tree.
#[derive(Debug, Error)]
pub enum DesignError {
    /// Template file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Template TOML is invalid.
    #[error("Template parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Evaluating a data point failed.
    #[error("Data point {data_point}: {source}")]
    Eval {
        /// Identifier of the data point.
        data_point: String,
        /// The evaluation failure.
        source: EvalError,
    },

    /// A chart has no data points to take metadata from.
    #[error("Design {design} has no data points")]
    EmptyDesign {
        /// Title of the design.
        design: String,
    },

    /// A table was never added to the metadata pool.
    #[error("No metadata for table {table}")]
    MissingMetadata {
        /// Table code.
        table: String,
    },

    /// The merged response lacks something a design needs.
    #[error("Missing from API response: {message}")]
    MissingData {
        /// What is missing.
        message: String,
    },

    /// A table has no edition for the requested timeframe.
    #[error("For the table {table}, no edition is defined for {timeframe}")]
    NoEdition {
        /// Table code.
        table: String,
        /// Requested timeframe.
        timeframe: TimeFrame,
    },
}

/// Everything a design needs to populate itself.
pub struct PopulateContext<'a> {
    /// The queried geography with its resolved parents.
    pub geography: &'a Geography,
    /// Merged data responses.
    pub data: &'a Value,
    /// Metadata for every table in the shopping list.
    pub pool: &'a MetadataPool,
    /// Which comparison year is being built.
    pub timeframe: TimeFrame,
    /// Years assigned to placeholder tables.
    pub years: ReleaseYears,
    /// Evaluates data point expressions.
    pub evaluator: &'a dyn ExpressionEvaluator,
}

/// The two operations every node of a design tree supports.
pub trait DesignTree {
    /// Tables this node needs fetched.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::Eval`] if an expression cannot be parsed.
    fn collect_shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError>;

    /// The JSON this node contributes to a profile.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError`] if evaluation fails or the data or metadata
    /// it needs is missing.
    fn populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError>;
}
