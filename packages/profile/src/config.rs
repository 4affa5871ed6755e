//! Environment configuration.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `GEO_PROFILE_API_URL` | Yes | |
//! | `ACS_YEAR` | No | `2021` |
//! | `ACS_PAST_YEAR` | No | `2016` |
//! | `PROFILE_VERSION` | No | `0.1.0` |
//! | `DISPATCH_WORKERS` | No | `5` |
//! | `DATA_CHUNK_SIZE` | No | `8` |
//! | `TEMPLATE_TTL_SECS` | No | `10` |
//!
//! Cache settings are read by
//! [`S3CacheConfig::from_env`](geo_profile_cache::S3CacheConfig::from_env).

use std::str::FromStr;
use std::time::Duration;

use geo_profile_api_client::batch::DEFAULT_CHUNK_SIZE;
use geo_profile_api_client::{ApiClientConfig, DEFAULT_WORKERS};
use geo_profile_metadata_models::ReleaseYears;

use crate::ProfileError;

/// Cache version tag used when `PROFILE_VERSION` is unset.
pub const DEFAULT_PROFILE_VERSION: &str = "0.1.0";

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Statistics API root.
    pub api_url: String,
    /// Years assigned to placeholder tables.
    pub years: ReleaseYears,
    /// Version tag stored with, and expected of, cached profiles.
    pub profile_version: String,
    /// Concurrent fetch workers.
    pub workers: usize,
    /// Tables per data request.
    pub chunk_size: usize,
    /// How long a loaded template is reused.
    pub template_ttl: Duration,
}

impl ProfileConfig {
    /// Default settings for the API at `api_url`.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            years: ReleaseYears::default(),
            profile_version: DEFAULT_PROFILE_VERSION.to_string(),
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            template_ttl: geo_profile_design::cache::DEFAULT_TTL,
        }
    }

    /// Reads the settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::MissingEnv`] if `GEO_PROFILE_API_URL` is
    /// unset, or [`ProfileError::Config`] if a numeric variable doesn't
    /// parse.
    pub fn from_env() -> Result<Self, ProfileError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ProfileError> {
        let lookup = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let api_url = lookup("GEO_PROFILE_API_URL").ok_or_else(|| ProfileError::MissingEnv {
            name: "GEO_PROFILE_API_URL".to_string(),
        })?;
        let defaults = Self::new(api_url);

        Ok(Self {
            years: ReleaseYears {
                present: parse_or(lookup("ACS_YEAR"), "ACS_YEAR", defaults.years.present)?,
                past: parse_or(lookup("ACS_PAST_YEAR"), "ACS_PAST_YEAR", defaults.years.past)?,
            },
            profile_version: lookup("PROFILE_VERSION")
                .unwrap_or_else(|| defaults.profile_version.clone()),
            workers: parse_or(lookup("DISPATCH_WORKERS"), "DISPATCH_WORKERS", defaults.workers)?,
            chunk_size: parse_or(lookup("DATA_CHUNK_SIZE"), "DATA_CHUNK_SIZE", defaults.chunk_size)?,
            template_ttl: Duration::from_secs(parse_or(
                lookup("TEMPLATE_TTL_SECS"),
                "TEMPLATE_TTL_SECS",
                defaults.template_ttl.as_secs(),
            )?),
            ..defaults
        })
    }

    /// Client settings derived from this configuration.
    #[must_use]
    pub fn api_client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            acs_year: self.years.present,
            workers: self.workers,
            chunk_size: self.chunk_size,
            ..ApiClientConfig::new(&self.api_url)
        }
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T, ProfileError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |value| {
        value.trim().parse().map_err(|e: T::Err| ProfileError::Config {
            name: name.to_string(),
            message: format!("{value:?}: {e}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ProfileConfig, ProfileError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ProfileConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = from_pairs(&[("GEO_PROFILE_API_URL", "https://api.example.org/")]).unwrap();
        assert_eq!(config.years, ReleaseYears::default());
        assert_eq!(config.profile_version, DEFAULT_PROFILE_VERSION);
        assert_eq!(config.workers, 5);
        assert_eq!(config.chunk_size, 8);
        assert_eq!(config.template_ttl, Duration::from_secs(10));

        let client = config.api_client_config();
        assert_eq!(client.base_url, "https://api.example.org");
        assert_eq!(client.acs_year, 2021);
    }

    #[test]
    fn overrides_apply() {
        let config = from_pairs(&[
            ("GEO_PROFILE_API_URL", "http://localhost:8000"),
            ("ACS_YEAR", "2022"),
            ("ACS_PAST_YEAR", " 2017 "),
            ("DISPATCH_WORKERS", "2"),
            ("TEMPLATE_TTL_SECS", "0"),
            ("PROFILE_VERSION", "0.2.0"),
        ])
        .unwrap();
        assert_eq!(config.years.present, 2022);
        assert_eq!(config.years.past, 2017);
        assert_eq!(config.workers, 2);
        assert_eq!(config.template_ttl, Duration::ZERO);
        assert_eq!(config.profile_version, "0.2.0");
        assert_eq!(config.api_client_config().acs_year, 2022);
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(matches!(
            from_pairs(&[("ACS_YEAR", "2021")]),
            Err(ProfileError::MissingEnv { name }) if name == "GEO_PROFILE_API_URL"
        ));
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(matches!(
            from_pairs(&[("GEO_PROFILE_API_URL", "http://x"), ("DATA_CHUNK_SIZE", "many")]),
            Err(ProfileError::Config { name, .. }) if name == "DATA_CHUNK_SIZE"
        ));
    }
}
