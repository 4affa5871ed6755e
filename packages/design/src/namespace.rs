//! Variable lookup over one geography's slice of the data response.
//!
//! The data endpoint nests values as
//! `data.{geoid}.{table}.estimate.{variable}` and
//! `data.{geoid}.{table}.error.{variable}`, where the table code is the
//! variable code without its last three characters (`B01001002` belongs to
//! `B01001`). [`Namespace`] hides that layout behind a variable-to-estimate
//! lookup.

use geo_profile_estimate::Estimate;
use serde_json::{Map, Value};

use crate::{DesignError, EvalError};

/// Length of the column suffix of a variable code.
const COLUMN_SUFFIX_LEN: usize = 3;

/// One geography's tables.
#[derive(Debug, Clone, Copy)]
pub struct Namespace<'a> {
    tables: &'a Map<String, Value>,
}

impl<'a> Namespace<'a> {
    /// Wraps a `{table: {estimate, error}}` object.
    #[must_use]
    pub const fn new(tables: &'a Map<String, Value>) -> Self {
        Self { tables }
    }

    /// The namespace of `geoid` within a merged data response.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::MissingData`] if the response has no data for
    /// `geoid`.
    pub fn for_geoid(response: &'a Value, geoid: &str) -> Result<Self, DesignError> {
        response["data"][geoid]
            .as_object()
            .map(Self::new)
            .ok_or_else(|| DesignError::MissingData {
                message: format!("no data for geography {geoid}"),
            })
    }

    /// Looks up a variable. A JSON `null` value or error becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownVariable`] if the table or the variable
    /// is missing.
    pub fn get(&self, variable: &str) -> Result<Estimate, EvalError> {
        let table = self.table(variable)?;
        let estimates = table["estimate"].as_object();
        let errors = table["error"].as_object();

        let Some(value) = estimates.and_then(|e| e.get(variable)) else {
            return Err(unknown(variable));
        };
        let error = errors.and_then(|e| e.get(variable)).and_then(Value::as_f64);

        Ok(Estimate::from_parts(value.as_f64(), error))
    }

    /// Whether `variable` has an estimate.
    #[must_use]
    pub fn contains(&self, variable: &str) -> bool {
        self.table(variable)
            .is_ok_and(|table| table["estimate"].get(variable).is_some())
    }

    fn table(&self, variable: &str) -> Result<&'a Value, EvalError> {
        variable
            .len()
            .checked_sub(COLUMN_SUFFIX_LEN)
            .and_then(|end| variable.get(..end))
            .and_then(|table| self.tables.get(table))
            .ok_or_else(|| unknown(variable))
    }
}

fn unknown(variable: &str) -> EvalError {
    EvalError::UnknownVariable {
        name: variable.to_string(),
    }
}
