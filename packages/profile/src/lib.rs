#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic profile builder.
//!
//! [`GeoProfileBuilder`] answers a [`ProfileRequest`] from the cache when a
//! current profile is stored, and otherwise runs a [`ProfileBuilder`],
//! enhances the result and stores it. [`CensusProfileBuilder`] is the full
//! pipeline:
//!
//! 1. load the template and collect its shopping list,
//! 2. fetch table metadata and plan the data requests,
//! 3. resolve the geography and its lineage,
//! 4. fetch and merge the data for every geography of the lineage,
//! 5. populate the template.

pub mod config;
pub mod enhance;
pub mod orchestrator;
pub mod pipeline;

use geo_profile_api_client::ApiError;
use geo_profile_cache::CacheError;
use geo_profile_design::DesignError;

pub use config::ProfileConfig;
pub use enhance::enhance_profile;
pub use geo_profile_cache::ProfileRequest;
pub use orchestrator::{GeoProfileBuilder, ProfileBuilder};
pub use pipeline::{CensusProfileBuilder, RequestPlan};

/// Errors that can occur while building a profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// A required environment variable is unset.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the variable.
        name: String,
    },

    /// An environment variable has an unusable value.
    #[error("Invalid value for {name}: {message}")]
    Config {
        /// Name of the variable.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Fetching from the statistics API failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Loading or populating the template failed.
    #[error(transparent)]
    Design(#[from] DesignError),

    /// Talking to the cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Serializing the profile failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The builder returned something other than a JSON object.
    #[error("Profile for {geoid} is not a JSON object")]
    NotAnObject {
        /// GEOID of the request.
        geoid: String,
    },
}
