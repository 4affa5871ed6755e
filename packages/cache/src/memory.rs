//! In-process profile store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::codec;
use crate::{
    CacheError, CacheHandler, CacheKey, CacheLookup, MissReason, ProfileRequest, VERSION_FIELD,
    lookup_from_blob,
};

/// Keeps encoded blobs in a map, for tests and local runs.
pub struct MemoryCache {
    namespace: String,
    profile_version: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(namespace: impl Into<String>, profile_version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            profile_version: profile_version.into(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a raw blob, bypassing encoding.
    pub async fn insert_raw(&self, request: &ProfileRequest, blob: Vec<u8>) {
        let key = CacheKey::new(&self.namespace, request).to_string();
        self.blobs.write().await.insert(key, blob);
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl CacheHandler for MemoryCache {
    async fn check_cache(&self, request: &ProfileRequest) -> CacheLookup {
        let key = CacheKey::new(&self.namespace, request).to_string();
        let blobs = self.blobs.read().await;
        match blobs.get(&key) {
            Some(blob) => lookup_from_blob(blob, &self.profile_version),
            None => CacheLookup::Miss(MissReason::NotCached),
        }
    }

    async fn cache_profile(
        &self,
        request: &ProfileRequest,
        profile: &Value,
    ) -> Result<(), CacheError> {
        let blob = codec::encode(&versioned(profile, &self.profile_version)?)?;
        let key = CacheKey::new(&self.namespace, request).to_string();
        log::debug!("Caching {key} in memory ({} bytes)", blob.len());
        self.blobs.write().await.insert(key, blob);
        Ok(())
    }
}

/// Copy of `profile` carrying the version tag.
pub(crate) fn versioned(profile: &Value, version: &str) -> Result<Value, CacheError> {
    let mut profile = profile.clone();
    profile
        .as_object_mut()
        .ok_or(CacheError::NotAnObject)?
        .insert(VERSION_FIELD.to_string(), Value::String(version.to_string()));
    Ok(profile)
}
