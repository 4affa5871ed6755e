#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography hierarchy resolution.
//!
//! The statistics API returns a geography and, separately, a flat list of
//! every area containing it, each annotated with how much of the queried
//! area it covers. [`resolve`] rebuilds that flat list into the linked
//! parent chain of [`Geography`], and [`normalize`] turns the raw responses
//! into canonical [`Geography`] values.

pub mod normalize;
pub mod resolver;

pub use geo_profile_geography_models::{Geography, LineageEntry, SummaryLevel};
pub use resolver::resolve;

use thiserror::Error;

/// Errors that can occur while building a geography.
#[derive(Debug, Error)]
pub enum GeoError {
    /// The queried geography's summary level is not in the rank table.
    #[error("Unknown summary level {sumlevel} for {geoid}")]
    UnknownSummaryLevel {
        /// Full GEOID of the geography.
        geoid: String,
        /// Its three-character prefix.
        sumlevel: String,
    },

    /// A geography response had neither known shape.
    #[error("Unexpected geography response: {message}")]
    UnexpectedResponse {
        /// What the response looked like.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field was missing or had the wrong type.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
