//! Object key layout.

use std::fmt;

use crate::ProfileRequest;

/// Version prefix of every key.
pub const KEY_PREFIX: &str = "1.0/data";

/// Key of one stored profile:
/// `1.0/data/{namespace}/{timeframe}/{GEOID}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    timeframe: String,
    geoid: String,
}

impl CacheKey {
    /// Key for `request` under `namespace`. The timeframe is lower-cased and
    /// the GEOID upper-cased.
    #[must_use]
    pub fn new(namespace: &str, request: &ProfileRequest) -> Self {
        Self {
            namespace: namespace.to_string(),
            timeframe: request.timeframe.as_ref().to_lowercase(),
            geoid: request.geoid.to_uppercase(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{KEY_PREFIX}/{}/{}/{}",
            self.namespace, self.timeframe, self.geoid
        )
    }
}

#[cfg(test)]
mod tests {
    use geo_profile_metadata_models::TimeFrame;

    use super::*;

    #[test]
    fn normalizes_case() {
        let request = ProfileRequest::new("14000us26163500100", TimeFrame::Past);
        assert_eq!(
            CacheKey::new("profiles", &request).to_string(),
            "1.0/data/profiles/past/14000US26163500100"
        );
    }

    #[test]
    fn keys_differ_by_timeframe() {
        let present = CacheKey::new("p", &ProfileRequest::new("04000US26", TimeFrame::Present));
        let past = CacheKey::new("p", &ProfileRequest::new("04000US26", TimeFrame::Past));
        assert_ne!(present, past);
        assert_eq!(present.to_string(), "1.0/data/p/present/04000US26");
    }
}
