//! Cache-guarded profile builds.

use std::sync::Arc;

use async_trait::async_trait;
use geo_profile_cache::codec::escape_for_script;
use geo_profile_cache::{CacheHandler, CacheLookup, MissReason, PROFILE_JSON_FIELD, ProfileRequest};
use serde_json::Value;

use crate::ProfileError;
use crate::enhance::enhance_profile;

/// Produces a fresh profile for a request.
#[async_trait]
pub trait ProfileBuilder: Send + Sync {
    /// Builds the profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if any stage of the build fails.
    async fn build(&self, request: &ProfileRequest) -> Result<Value, ProfileError>;
}

/// Answers requests from the cache, building and storing on a miss.
///
/// Concurrent misses on the same request each build and store
/// independently; the last write wins.
pub struct GeoProfileBuilder {
    cache: Arc<dyn CacheHandler>,
    builder: Arc<dyn ProfileBuilder>,
    enhancer: fn(&mut Value),
}

impl GeoProfileBuilder {
    /// Orchestrates `builder` behind `cache`, enhancing with
    /// [`enhance_profile`].
    #[must_use]
    pub fn new(cache: Arc<dyn CacheHandler>, builder: Arc<dyn ProfileBuilder>) -> Self {
        Self {
            cache,
            builder,
            enhancer: enhance_profile,
        }
    }

    /// Replaces the post-build enhancement.
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: fn(&mut Value)) -> Self {
        self.enhancer = enhancer;
        self
    }

    /// Returns the profile for `request`.
    ///
    /// The returned profile always carries [`PROFILE_JSON_FIELD`], the
    /// script-safe JSON text of the profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if the cache misses and the build fails.
    /// Failing to store a built profile is logged, not returned.
    pub async fn build_geoid(&self, request: &ProfileRequest) -> Result<Value, ProfileError> {
        let reason = match self.cache.check_cache(request).await {
            CacheLookup::Hit(profile) => {
                log::info!(
                    "Cache hit for {} ({})",
                    request.geoid,
                    request.timeframe
                );
                return Ok(profile);
            }
            CacheLookup::Miss(reason) => reason,
        };

        match &reason {
            MissReason::ReadFailure(_) => log::error!(
                "Cache unavailable for {} ({}): {reason}",
                request.geoid,
                request.timeframe
            ),
            _ => log::warn!(
                "Cache miss for {} ({}): {reason}",
                request.geoid,
                request.timeframe
            ),
        }

        let mut profile = self.run_builder(request).await?;
        let text = serde_json::to_string(&profile)?;

        if let Err(e) = self.cache.cache_profile(request, &profile).await {
            log::error!(
                "Failed to cache profile\n  geoid: {}\n  timeframe: {}\n  error: {e}",
                request.geoid,
                request.timeframe
            );
        }

        if let Value::Object(fields) = &mut profile {
            fields.insert(
                PROFILE_JSON_FIELD.to_string(),
                Value::String(escape_for_script(&text)),
            );
        }
        Ok(profile)
    }

    async fn run_builder(&self, request: &ProfileRequest) -> Result<Value, ProfileError> {
        let mut profile = self.builder.build(request).await?;
        if !profile.is_object() {
            return Err(ProfileError::NotAnObject {
                geoid: request.geoid.clone(),
            });
        }
        (self.enhancer)(&mut profile);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use geo_profile_cache::{CacheError, MemoryCache, VERSION_FIELD};
    use geo_profile_metadata_models::TimeFrame;
    use serde_json::json;

    use super::*;

    struct CountingBuilder {
        calls: AtomicUsize,
        profile: Value,
    }

    impl CountingBuilder {
        fn new(profile: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                profile,
            })
        }
    }

    #[async_trait]
    impl ProfileBuilder for CountingBuilder {
        async fn build(&self, _request: &ProfileRequest) -> Result<Value, ProfileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.profile.clone())
        }
    }

    struct FailingBuilder;

    #[async_trait]
    impl ProfileBuilder for FailingBuilder {
        async fn build(&self, request: &ProfileRequest) -> Result<Value, ProfileError> {
            Err(ProfileError::MissingEnv {
                name: format!("nothing for {}", request.geoid),
            })
        }
    }

    struct ReadOnlyCache;

    #[async_trait]
    impl CacheHandler for ReadOnlyCache {
        async fn check_cache(&self, _request: &ProfileRequest) -> CacheLookup {
            CacheLookup::Miss(MissReason::ReadFailure("connection refused".to_string()))
        }

        async fn cache_profile(
            &self,
            request: &ProfileRequest,
            _profile: &Value,
        ) -> Result<(), CacheError> {
            Err(CacheError::Write {
                key: request.geoid.clone(),
                source: "read-only".into(),
            })
        }
    }

    fn request() -> ProfileRequest {
        ProfileRequest::new("16000US2622000", TimeFrame::Present)
    }

    fn mark_enhanced(profile: &mut Value) {
        if let Value::Object(fields) = profile {
            fields.insert("enhanced".to_string(), json!(true));
        }
    }

    #[tokio::test]
    async fn builds_once_then_hits() {
        let cache = Arc::new(MemoryCache::new("profiles", "0.1.0"));
        let builder = CountingBuilder::new(json!({"geography": {"name": "Detroit <city>"}}));
        let orchestrator = GeoProfileBuilder::new(cache.clone(), builder.clone())
            .with_enhancer(mark_enhanced);

        let built = orchestrator.build_geoid(&request()).await.unwrap();
        let hit = orchestrator.build_geoid(&request()).await.unwrap();

        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(built["enhanced"], true);
        assert_eq!(hit["enhanced"], true);
        assert_eq!(hit[VERSION_FIELD], "0.1.0");
        assert!(built.get(VERSION_FIELD).is_none());

        let text = built[PROFILE_JSON_FIELD].as_str().unwrap();
        assert!(text.contains("\\u003ccity\\u003e"));
        let decoded: Value = serde_json::from_str(text).unwrap();
        assert_eq!(decoded["geography"], built["geography"]);
        assert!(decoded.get(PROFILE_JSON_FIELD).is_none());
    }

    #[tokio::test]
    async fn timeframes_are_cached_separately() {
        let cache = Arc::new(MemoryCache::new("profiles", "0.1.0"));
        let builder = CountingBuilder::new(json!({}));
        let orchestrator = GeoProfileBuilder::new(cache.clone(), builder.clone());

        orchestrator.build_geoid(&request()).await.unwrap();
        orchestrator
            .build_geoid(&ProfileRequest::new("16000US2622000", TimeFrame::Past))
            .await
            .unwrap();

        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn write_failures_still_return_the_profile() {
        let builder = CountingBuilder::new(json!({"a": 1}));
        let orchestrator = GeoProfileBuilder::new(Arc::new(ReadOnlyCache), builder.clone())
            .with_enhancer(mark_enhanced);

        let profile = orchestrator.build_geoid(&request()).await.unwrap();
        assert_eq!(profile["a"], 1);
        assert_eq!(profile["enhanced"], true);
        assert!(profile[PROFILE_JSON_FIELD].is_string());
    }

    #[tokio::test]
    async fn build_failures_store_nothing() {
        let cache = Arc::new(MemoryCache::new("profiles", "0.1.0"));
        let orchestrator = GeoProfileBuilder::new(cache.clone(), Arc::new(FailingBuilder));

        assert!(orchestrator.build_geoid(&request()).await.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn non_object_profiles_are_rejected() {
        let cache = Arc::new(MemoryCache::new("profiles", "0.1.0"));
        let orchestrator =
            GeoProfileBuilder::new(cache.clone(), CountingBuilder::new(json!([1, 2, 3])));

        assert!(matches!(
            orchestrator.build_geoid(&request()).await,
            Err(ProfileError::NotAnObject { .. })
        ));
        assert!(cache.is_empty().await);
    }
}
