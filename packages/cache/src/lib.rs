#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Profile cache.
//!
//! Built profiles are stored as gzip-compressed JSON blobs addressed by
//! `(namespace, timeframe, geoid)`. Every blob carries a `profile_version`
//! tag; a blob whose tag differs from the configured version is treated as
//! absent so profiles are rebuilt after a template change.
//!
//! A lookup never fails: a missing blob, a stale blob, a disabled cache and
//! an unreachable store are all [`CacheLookup::Miss`], with the reason kept
//! for logging.

pub mod codec;
pub mod key;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use geo_profile_metadata_models::TimeFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use key::CacheKey;
pub use memory::MemoryCache;
pub use s3::{S3Cache, S3CacheConfig};

/// Field holding the version tag inside a stored blob.
pub const VERSION_FIELD: &str = "profile_version";

/// Field holding the serialized profile text attached to returned profiles.
pub const PROFILE_JSON_FIELD: &str = "profile_data_json";

/// Errors raised by cache stores.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing variable.
        name: String,
    },

    /// Reading an object failed.
    #[error("Failed to read {key}: {source}")]
    Read {
        /// Object key.
        key: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Writing an object failed.
    #[error("Failed to write {key}: {source}")]
    Write {
        /// Object key.
        key: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Compression or decompression failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blob is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The profile to store is not a JSON object.
    #[error("Profile must be a JSON object")]
    NotAnObject,
}

/// Identity of a profile in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileRequest {
    /// Full GEOID of the queried geography.
    pub geoid: String,
    /// Which comparison year the profile is built for.
    pub timeframe: TimeFrame,
}

impl ProfileRequest {
    #[must_use]
    pub fn new(geoid: impl Into<String>, timeframe: TimeFrame) -> Self {
        Self {
            geoid: geoid.into(),
            timeframe,
        }
    }
}

/// Why a lookup did not produce a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Nothing is stored under the key.
    NotCached,
    /// The stored blob has a different version tag.
    StaleVersion {
        /// Tag found in the blob, if any.
        found: Option<String>,
    },
    /// The cache is configured not to be checked.
    Disabled,
    /// The store could not be read.
    ReadFailure(String),
}

impl std::fmt::Display for MissReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCached => f.write_str("this geoid hasn't been cached for this timeframe yet"),
            Self::StaleVersion { found } => write!(
                f,
                "cached profile has version {}, it must be rebuilt",
                found.as_deref().unwrap_or("<none>")
            ),
            Self::Disabled => f.write_str("cache checks are disabled"),
            Self::ReadFailure(message) => write!(f, "cache read failed: {message}"),
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A current profile, with [`PROFILE_JSON_FIELD`] attached.
    Hit(Value),
    /// No usable profile.
    Miss(MissReason),
}

/// A store of built profiles.
#[async_trait]
pub trait CacheHandler: Send + Sync {
    /// Looks up the profile for `request`.
    async fn check_cache(&self, request: &ProfileRequest) -> CacheLookup;

    /// Stores `profile` for `request`, overwriting any previous blob.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the profile cannot be encoded or written.
    async fn cache_profile(&self, request: &ProfileRequest, profile: &Value)
    -> Result<(), CacheError>;
}

/// Decodes a stored blob into a lookup result.
///
/// Shared by every store so that version checks and the attached profile
/// text behave identically.
fn lookup_from_blob(bytes: &[u8], expected_version: &str) -> CacheLookup {
    let (mut profile, text) = match codec::decode(bytes) {
        Ok(decoded) => decoded,
        Err(e) => return CacheLookup::Miss(MissReason::ReadFailure(e.to_string())),
    };

    let found = profile
        .get(VERSION_FIELD)
        .and_then(Value::as_str)
        .map(ToString::to_string);
    if found.as_deref() != Some(expected_version) {
        return CacheLookup::Miss(MissReason::StaleVersion { found });
    }

    if let Value::Object(fields) = &mut profile {
        fields.insert(
            PROFILE_JSON_FIELD.to_string(),
            Value::String(codec::escape_for_script(&text)),
        );
    }
    CacheLookup::Hit(profile)
}
