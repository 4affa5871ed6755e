#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Table metadata and data request planning.
//!
//! Tables come from one of two [`DataParadigm`]s. Census Reporter (`CR`)
//! tables share one release year per [`TimeFrame`] and need no metadata
//! fetch, so they enter the [`MetadataPool`] as placeholders. Data Driven
//! Detroit (`D3`) tables each carry their own editions, described by a
//! fetched [`TableMetadata`]. [`MetadataPool::prepare_data_request`] turns
//! the pool into a [`DataPlan`]: the tables to request, grouped by the
//! schema they live in.

pub mod plan;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use plan::{DataPlan, ReleaseYears, YearTag, schema_name};

/// Errors that can occur while handling table metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A metadata response did not match the expected schema.
    #[error("Invalid metadata for table {table}: {source}")]
    Validation {
        /// Table the metadata describes.
        table: String,
        /// The underlying deserialization failure.
        source: serde_json::Error,
    },

    /// A metadata response had no `tables` object.
    #[error("Malformed metadata response: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Which comparison year a profile is built for.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeFrame {
    /// The earlier comparison release.
    Past,
    /// The current release.
    #[default]
    Present,
}

/// Upstream source of a table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DataParadigm {
    /// Census Reporter ACS tables, resolved by the configured release year.
    Cr,
    /// Data Driven Detroit tables, resolved by their own editions.
    D3,
}

/// How a design compares a table across geographies.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonType {
    /// One figure per geography.
    #[default]
    Single,
    /// Two categories per geography.
    Binary,
    /// A distribution across many categories.
    Continuous,
}

/// One entry of a design tree's shopping list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRequest {
    /// Table code, e.g. `"B01001"`.
    pub name: String,
    /// How the table is compared.
    pub comparison_type: ComparisonType,
    /// Where the table comes from.
    pub paradigm: DataParadigm,
}

impl TableRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        comparison_type: ComparisonType,
        paradigm: DataParadigm,
    ) -> Self {
        Self {
            name: name.into(),
            comparison_type,
            paradigm,
        }
    }

    /// The pool key of this table.
    #[must_use]
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Reads a value that may be `null` but whose key must be present.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer)
}

/// Description of one variable (column) of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    /// Variable code.
    pub variable_name: String,
    /// Nesting depth for display.
    pub indentation: i64,
    /// Human-readable label.
    pub description: String,
    /// Optional notes.
    #[serde(deserialize_with = "nullable")]
    pub documentation: Option<String>,
}

/// A release of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionMetadata {
    /// Edition tag, e.g. `"2020"`.
    pub edition: String,
}

/// The editions a table compares across.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEditions {
    /// Edition used for [`TimeFrame::Present`].
    #[serde(deserialize_with = "nullable")]
    pub present: Option<EditionMetadata>,
    /// Edition used for [`TimeFrame::Past`].
    #[serde(deserialize_with = "nullable")]
    pub past: Option<EditionMetadata>,
}

impl ComparisonEditions {
    /// The edition for `timeframe`, if the table has one.
    #[must_use]
    pub const fn for_timeframe(&self, timeframe: TimeFrame) -> Option<&EditionMetadata> {
        match timeframe {
            TimeFrame::Past => self.past.as_ref(),
            TimeFrame::Present => self.present.as_ref(),
        }
    }
}

/// Fetched metadata for a table with its own editions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    #[serde(deserialize_with = "nullable")]
    pub category: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description_simple: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub table_topics: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub universe: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub subject_area: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub source: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub documentation: Option<String>,
    pub variables: IndexMap<String, VariableMetadata>,
    pub all_editions: Vec<EditionMetadata>,
    pub comparison_editions: ComparisonEditions,
}

impl TableMetadata {
    /// Validates one raw entry of a metadata response.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Validation`] if `raw` does not match the
    /// metadata schema.
    pub fn from_value(table: &str, raw: Value) -> Result<Self, MetadataError> {
        serde_json::from_value(raw).map_err(|source| MetadataError::Validation {
            table: table.to_string(),
            source,
        })
    }

    /// The edition tag for `timeframe`, if the table has one.
    #[must_use]
    pub fn report_year_for_timeframe(&self, timeframe: TimeFrame) -> Option<&str> {
        self.comparison_editions
            .for_timeframe(timeframe)
            .map(|edition| edition.edition.as_str())
    }

    /// The shape profile pages read, with the edition for `timeframe` as
    /// `year`.
    #[must_use]
    pub fn to_json(&self, timeframe: TimeFrame) -> Value {
        json!({
            "table_name": self.table_name,
            "category": self.category,
            "description": self.description,
            "description_simple": self.description_simple,
            "table_topics": self.table_topics,
            "universe": self.universe,
            "subject_area": self.subject_area,
            "source": self.source,
            "documentation": self.documentation,
            "variables": self.variables,
            "year": self.report_year_for_timeframe(timeframe),
        })
    }
}

/// Stands in for a table that needs no metadata fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadataPlaceholder {
    /// Lower-case table code.
    pub table_name: String,
}

impl TableMetadataPlaceholder {
    /// Creates a placeholder, lower-casing the table code.
    #[must_use]
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_lowercase(),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "name": self.table_name })
    }
}

/// One table known to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEntry {
    Full(Box<TableMetadata>),
    Placeholder(TableMetadataPlaceholder),
}

impl PoolEntry {
    /// Table code as stored.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Full(metadata) => &metadata.table_name,
            Self::Placeholder(placeholder) => &placeholder.table_name,
        }
    }

    /// JSON form for profile pages.
    #[must_use]
    pub fn to_json(&self, timeframe: TimeFrame) -> Value {
        match self {
            Self::Full(metadata) => metadata.to_json(timeframe),
            Self::Placeholder(placeholder) => placeholder.to_json(),
        }
    }
}

/// Every table a profile needs, keyed by lower-case table code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPool {
    pub tables: BTreeMap<String, PoolEntry>,
}

impl MetadataPool {
    /// Adds a placeholder for `table_name`.
    pub fn insert_placeholder(&mut self, table_name: &str) {
        let placeholder = TableMetadataPlaceholder::new(table_name);
        self.tables.insert(
            placeholder.table_name.clone(),
            PoolEntry::Placeholder(placeholder),
        );
    }

    /// Adds fetched metadata under `table_name`, replacing any previous
    /// entry.
    pub fn insert_metadata(&mut self, table_name: &str, metadata: TableMetadata) {
        self.tables.insert(
            table_name.to_lowercase(),
            PoolEntry::Full(Box::new(metadata)),
        );
    }

    /// Adds every table of a metadata response (`{"tables": {name: raw}}`).
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Malformed`] without a `tables` object, or
    /// [`MetadataError::Validation`] for the first invalid table.
    pub fn extend_from_response(&mut self, response: Value) -> Result<(), MetadataError> {
        let Value::Object(mut response) = response else {
            return Err(MetadataError::Malformed {
                message: "metadata response is not an object".to_string(),
            });
        };
        let Some(Value::Object(tables)) = response.remove("tables") else {
            return Err(MetadataError::Malformed {
                message: "metadata response has no `tables` object".to_string(),
            });
        };

        for (table_name, raw) in tables {
            let metadata = TableMetadata::from_value(&table_name, raw)?;
            self.insert_metadata(&table_name, metadata);
        }
        Ok(())
    }

    /// Looks up a table by code, case-insensitively.
    #[must_use]
    pub fn get(&self, table_name: &str) -> Option<&PoolEntry> {
        self.tables.get(&table_name.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    pub(crate) fn d3_metadata(table: &str, present: Option<&str>, past: Option<&str>) -> Value {
        json!({
            "table_name": table,
            "category": "Housing",
            "description": "Foreclosures",
            "description_simple": null,
            "table_topics": null,
            "universe": "Parcels",
            "subject_area": null,
            "source": "Wayne County Treasurer",
            "documentation": null,
            "variables": {
                "foreclosures001": {
                    "variable_name": "foreclosures001",
                    "indentation": 0,
                    "description": "Total",
                    "documentation": null,
                }
            },
            "all_editions": [{"edition": "2019"}, {"edition": "2022"}],
            "comparison_editions": {
                "present": present.map(|edition| json!({"edition": edition})),
                "past": past.map(|edition| json!({"edition": edition})),
            },
        })
    }

    #[test]
    fn timeframe_parses_lowercase() {
        assert_eq!(TimeFrame::from_str("past").unwrap(), TimeFrame::Past);
        assert_eq!(TimeFrame::Present.to_string(), "present");
        assert_eq!(DataParadigm::D3.as_ref(), "D3");
        assert_eq!(DataParadigm::from_str("CR").unwrap(), DataParadigm::Cr);
    }

    #[test]
    fn validates_metadata() {
        let metadata =
            TableMetadata::from_value("foreclosures", d3_metadata("foreclosures", Some("2022"), None))
                .unwrap();
        assert_eq!(metadata.report_year_for_timeframe(TimeFrame::Present), Some("2022"));
        assert_eq!(metadata.report_year_for_timeframe(TimeFrame::Past), None);
        assert_eq!(metadata.to_json(TimeFrame::Present)["year"], "2022");
        assert_eq!(
            metadata.to_json(TimeFrame::Present)["variables"]["foreclosures001"]["description"],
            "Total"
        );
    }

    #[test]
    fn invalid_metadata_names_the_table() {
        let error = TableMetadata::from_value("broken", json!({"table_name": "broken"})).unwrap_err();
        assert!(matches!(&error, MetadataError::Validation { table, .. } if table == "broken"));
        assert!(error.to_string().contains("broken"));
    }

    #[test]
    fn nullable_fields_must_be_present() {
        let mut raw = d3_metadata("foreclosures", Some("2022"), None);
        raw.as_object_mut().unwrap().remove("universe");
        assert!(matches!(
            TableMetadata::from_value("foreclosures", raw),
            Err(MetadataError::Validation { .. })
        ));

        let mut raw = d3_metadata("foreclosures", Some("2022"), None);
        raw["comparison_editions"].as_object_mut().unwrap().remove("past");
        assert!(TableMetadata::from_value("foreclosures", raw).is_err());

        let mut raw = d3_metadata("foreclosures", Some("2022"), None);
        raw["variables"]["foreclosures001"]
            .as_object_mut()
            .unwrap()
            .remove("documentation");
        assert!(TableMetadata::from_value("foreclosures", raw).is_err());
    }

    #[test]
    fn pool_keys_are_lowercase() {
        let mut pool = MetadataPool::default();
        pool.insert_placeholder("B01001");
        pool.extend_from_response(json!({
            "tables": {"FORECLOSURES": d3_metadata("foreclosures", Some("2022"), Some("2019"))}
        }))
        .unwrap();

        assert_eq!(pool.len(), 2);
        assert!(matches!(pool.get("b01001"), Some(PoolEntry::Placeholder(_))));
        assert!(matches!(pool.get("Foreclosures"), Some(PoolEntry::Full(_))));
        assert_eq!(pool.get("B01001").unwrap().to_json(TimeFrame::Past), json!({"name": "b01001"}));
    }

    #[test]
    fn response_without_tables_is_malformed() {
        let mut pool = MetadataPool::default();
        assert!(matches!(
            pool.extend_from_response(json!({"error": "nope"})),
            Err(MetadataError::Malformed { .. })
        ));
    }
}
