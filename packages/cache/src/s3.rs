//! S3-backed profile store.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::Value;

use crate::codec;
use crate::memory::versioned;
use crate::{
    CacheError, CacheHandler, CacheKey, CacheLookup, MissReason, ProfileRequest, lookup_from_blob,
};

/// Region used when `AWS_REGION` is unset.
pub const DEFAULT_REGION: &str = "us-east-2";

/// Namespace used when `PROFILE_CACHE_ROOT` is unset.
pub const DEFAULT_NAMESPACE: &str = "profiles";

/// Connection and behaviour settings for [`S3Cache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3CacheConfig {
    pub bucket: String,
    pub namespace: String,
    pub profile_version: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Every lookup misses without touching the store.
    pub dont_check: bool,
    /// Writes are skipped.
    pub dont_update: bool,
}

impl S3CacheConfig {
    /// Reads the store settings from the environment.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Required | Description |
    /// |---|---|---|
    /// | `PROFILE_CACHE_BUCKET` | Yes | Bucket holding the profiles |
    /// | `AWS_KEY` | Yes | Access key |
    /// | `AWS_SECRET` | Yes | Secret key |
    /// | `PROFILE_CACHE_ROOT` | No | Key namespace, default `profiles` |
    /// | `AWS_REGION` | No | Region, default `us-east-2` |
    /// | `DONT_CHECK_CACHE` | No | `true` to skip lookups |
    /// | `DONT_CACHE` | No | `true` to skip writes |
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingEnv`] if a required variable is unset.
    pub fn from_env(profile_version: &str) -> Result<Self, CacheError> {
        Ok(Self {
            bucket: require_env("PROFILE_CACHE_BUCKET")?,
            namespace: optional_env("PROFILE_CACHE_ROOT")
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            profile_version: profile_version.to_string(),
            access_key: require_env("AWS_KEY")?,
            secret_key: require_env("AWS_SECRET")?,
            region: optional_env("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            dont_check: env_flag("DONT_CHECK_CACHE"),
            dont_update: env_flag("DONT_CACHE"),
        })
    }
}

/// Profile store in an S3 bucket.
pub struct S3Cache {
    client: aws_sdk_s3::Client,
    config: S3CacheConfig,
}

impl S3Cache {
    #[must_use]
    pub fn new(config: S3CacheConfig) -> Self {
        let creds = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "geo-profile-env",
        );

        let sdk_config = aws_sdk_s3::Config::builder()
            .region(Region::new(config.region.clone()))
            .credentials_provider(creds)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            config,
        }
    }

    /// Creates a store from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingEnv`] if a required variable is unset.
    pub fn from_env(profile_version: &str) -> Result<Self, CacheError> {
        S3CacheConfig::from_env(profile_version).map(Self::new)
    }

    #[must_use]
    pub const fn config(&self) -> &S3CacheConfig {
        &self.config
    }

    /// Fetches a blob. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    return Ok(None);
                }
                return Err(CacheError::Read {
                    key: key.to_string(),
                    source: Box::new(err),
                });
            }
        };

        let bytes = output.body.collect().await.map_err(|e| CacheError::Read {
            key: key.to_string(),
            source: Box::new(e),
        })?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }
}

#[async_trait]
impl CacheHandler for S3Cache {
    async fn check_cache(&self, request: &ProfileRequest) -> CacheLookup {
        if self.config.dont_check {
            return CacheLookup::Miss(MissReason::Disabled);
        }

        let key = CacheKey::new(&self.config.namespace, request).to_string();
        match self.get(&key).await {
            Ok(Some(blob)) => lookup_from_blob(&blob, &self.config.profile_version),
            Ok(None) => CacheLookup::Miss(MissReason::NotCached),
            Err(e) => {
                log::error!(
                    "Failed to read cached profile\n  bucket: {}\n  key: {key}\n  error: {e}",
                    self.config.bucket
                );
                CacheLookup::Miss(MissReason::ReadFailure(e.to_string()))
            }
        }
    }

    async fn cache_profile(
        &self,
        request: &ProfileRequest,
        profile: &Value,
    ) -> Result<(), CacheError> {
        if self.config.dont_update {
            log::debug!("Cache writes disabled, not storing {}", request.geoid);
            return Ok(());
        }

        let key = CacheKey::new(&self.config.namespace, request).to_string();
        let blob = codec::encode(&versioned(profile, &self.config.profile_version)?)?;
        #[allow(clippy::cast_precision_loss)] // display-only KB value
        let kb = blob.len() as f64 / 1024.0;
        log::info!("Pushing s3://{}/{key} ({kb:.1} KB)", self.config.bucket);

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(blob))
            .content_type("application/json")
            .content_encoding("gzip")
            .send()
            .await
            .map_err(|e| CacheError::Write {
                key,
                source: Box::new(e),
            })?;

        Ok(())
    }
}

fn require_env(name: &str) -> Result<String, CacheError> {
    std::env::var(name).map_err(|_| CacheError::MissingEnv {
        name: name.to_string(),
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// `true` for `1`, `true` or `yes` in any case.
fn env_flag(name: &str) -> bool {
    optional_env(name).is_some_and(|value| parse_flag(&value))
}

pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use geo_profile_metadata_models::TimeFrame;
    use serde_json::json;

    use super::*;

    fn config() -> S3CacheConfig {
        S3CacheConfig {
            bucket: "profiles-bucket".to_string(),
            namespace: "profiles".to_string(),
            profile_version: "0.1.0".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            region: DEFAULT_REGION.to_string(),
            dont_check: true,
            dont_update: true,
        }
    }

    #[test]
    fn flags() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[tokio::test]
    async fn disabled_store_never_touches_s3() {
        let cache = S3Cache::new(config());
        let request = ProfileRequest::new("04000US26", TimeFrame::Present);

        assert_eq!(
            cache.check_cache(&request).await,
            CacheLookup::Miss(MissReason::Disabled)
        );
        cache
            .cache_profile(&request, &json!({"a": 1}))
            .await
            .unwrap();
    }
}
