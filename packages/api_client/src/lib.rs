#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the statistics API.
//!
//! Every bulk call goes through a [`Dispatcher`]: the requests are built up
//! front, fetched on a bounded worker pool with per-request retry, and the
//! responses are deep-merged with [`reducer::merge`].

pub mod batch;
pub mod dispatch;
pub mod progress;
pub mod reducer;
pub mod repair;
pub mod retry;

use std::collections::BTreeSet;
use std::sync::Arc;

use geo_profile_geography::normalize::{self, ResponseShape};
use geo_profile_geography::{GeoError, Geography, resolve};
use geo_profile_metadata_models::{
    DataParadigm, DataPlan, MetadataError, MetadataPool, TableRequest,
};
use serde_json::Value;
use thiserror::Error;

pub use dispatch::{DEFAULT_WORKERS, Dispatcher, FetchTask};
pub use progress::{NullProgress, ProgressCallback, null_progress};

use repair::Repair;
use retry::SoftResponse;

/// Errors that can occur while talking to the statistics API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A dispatched request failed on every attempt.
    #[error("Request to {url} failed after {attempts} attempts: {message}")]
    FetchExhausted {
        /// Requested URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        message: String,
    },

    /// The API reported an error that can't be repaired.
    #[error("API error: {message}")]
    Api {
        /// The API's message.
        message: String,
    },

    /// Removing tables never produced a successful data request.
    #[error("Tried to remove {}, still failing: {message}", .tables.join(","))]
    RepairExhausted {
        /// Tables removed along the way.
        tables: Vec<String>,
        /// The last API message.
        message: String,
    },

    /// Geography response handling failed.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Metadata response handling failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Connection and batching settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClientConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// TIGER vintage used for geography lookups.
    pub acs_year: u16,
    /// Concurrent workers per dispatch call.
    pub workers: usize,
    /// Tables per data request.
    pub chunk_size: usize,
    /// Bound on table repairs in [`ApiClient::get_data`].
    pub max_repairs: usize,
}

impl ApiClientConfig {
    /// Default settings for the API at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            acs_year: 2021,
            workers: DEFAULT_WORKERS,
            chunk_size: batch::DEFAULT_CHUNK_SIZE,
            max_repairs: repair::DEFAULT_MAX_REPAIRS,
        }
    }
}

/// Client for the geography, metadata and data endpoints.
pub struct ApiClient {
    client: reqwest::Client,
    config: ApiClientConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl ApiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("geo_profile/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            progress: None,
        })
    }

    /// Reports dispatch progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    fn dispatcher(&self) -> Dispatcher {
        let dispatcher = Dispatcher::new(self.client.clone(), self.config.workers);
        match &self.progress {
            Some(progress) => dispatcher.with_progress(Arc::clone(progress)),
            None => dispatcher,
        }
    }

    fn geo_url(&self, geoid: &str) -> String {
        format!(
            "{}/1.0/geo/tiger{}/{geoid}",
            self.config.base_url, self.config.acs_year
        )
    }

    /// Fetches a geography and its ancestors and links them into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::FetchExhausted`] if either request fails, or
    /// [`ApiError::Geo`] if the responses can't be told apart or resolved.
    pub async fn get_full_geography_object(&self, geoid: &str) -> Result<Geography, ApiError> {
        let geo_url = self.geo_url(geoid);
        let tasks = vec![
            FetchTask::new(geo_url.clone()),
            FetchTask::new(format!("{geo_url}/parents")),
        ];

        let mut geography = None;
        let mut ancestors = None;
        for response in self.dispatcher().dispatch(tasks).await? {
            match normalize::classify(&response)? {
                ResponseShape::Feature => {
                    geography = Some(normalize::geography_from_response(geoid, &response)?);
                }
                ResponseShape::Parents => {
                    ancestors = Some(normalize::parents_from_response(&response)?);
                }
            }
        }

        let (Some(geography), Some(ancestors)) = (geography, ancestors) else {
            return Err(GeoError::UnexpectedResponse {
                message: format!("missing geography or parents response for {geoid}"),
            }
            .into());
        };

        Ok(resolve(geography, ancestors)?)
    }

    /// Builds the metadata pool for a shopping list.
    ///
    /// `CR` tables become placeholders. `D3` tables are fetched from the
    /// metadata endpoint, one request each.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::FetchExhausted`] if a metadata request fails, or
    /// [`ApiError::Metadata`] if a response fails validation.
    pub async fn fill_metadata_pool(
        &self,
        requests: &BTreeSet<TableRequest>,
    ) -> Result<MetadataPool, ApiError> {
        let mut pool = MetadataPool::default();
        let mut tasks = Vec::new();

        for request in requests {
            match request.paradigm {
                DataParadigm::Cr => pool.insert_placeholder(&request.name),
                DataParadigm::D3 => tasks.push(FetchTask::new(format!(
                    "{}/metadata/tables/{}",
                    self.config.base_url,
                    request.key()
                ))),
            }
        }

        log::debug!(
            "Metadata pool: {} placeholder(s), {} metadata request(s)",
            pool.len(),
            tasks.len()
        );

        for response in self.dispatcher().dispatch(tasks).await? {
            pool.extend_from_response(response)?;
        }

        Ok(pool)
    }

    /// Fetches every table of `plan` for every geography in `geoids` and
    /// merges the responses.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::FetchExhausted`] if any chunk request fails.
    pub async fn get_data_dispatched(
        &self,
        plan: &DataPlan,
        geoids: &[String],
    ) -> Result<Value, ApiError> {
        let tasks = batch::data_tasks(&self.config.base_url, plan, geoids, self.config.chunk_size);
        log::debug!("Requesting data in {} chunk(s)", tasks.len());

        let responses = self.dispatcher().dispatch(tasks).await?;
        Ok(reducer::merge(responses))
    }

    /// Requests `table_ids` for `geo_ids` from one schema, dropping tables
    /// the API reports as unavailable and retrying.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] for an unrepairable API error or one naming
    /// only tables that were not requested, or
    /// [`ApiError::RepairExhausted`] when the repair bound is reached or no
    /// tables remain.
    pub async fn get_data(
        &self,
        table_ids: &[String],
        geo_ids: &[String],
        schema: &str,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/1.0/data/show/{schema}", self.config.base_url);
        let geo_ids = geo_ids.join(",");
        let mut tables = table_ids.to_vec();
        let mut removed: Vec<String> = Vec::new();
        let mut last_message = String::from("no tables left to request");

        for _ in 0..self.config.max_repairs {
            if tables.is_empty() {
                break;
            }

            let params = [
                ("table_ids".to_string(), tables.join(",")),
                ("geo_ids".to_string(), geo_ids.clone()),
            ];

            let message = match retry::soft_get(&self.client, &url, &params).await? {
                SoftResponse::Success(value) => return Ok(value),
                SoftResponse::Failure(message) => message,
            };

            match repair::classify(&message) {
                Repair::Remove(culprits) => {
                    let before = tables.len();
                    repair::strip_tables(&mut tables, &culprits);
                    if tables.len() == before {
                        log::error!(
                            "Schema {schema} rejected {} which were not requested",
                            culprits.join(","),
                        );
                        return Err(ApiError::Api { message });
                    }
                    removed.extend(culprits);
                    log::warn!(
                        "Unable to pull {} from schema {schema}, trying the call without them",
                        removed.join(","),
                    );
                }
                Repair::Fatal => return Err(ApiError::Api { message }),
            }
            last_message = message;
        }

        Err(ApiError::RepairExhausted {
            tables: removed,
            message: last_message,
        })
    }
}
