//! The end-to-end build pipeline.
//!
//! Stages run strictly one after another; each waits for the complete
//! result of the previous one. The only concurrency is inside the fetch
//! dispatcher.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use geo_profile_api_client::ApiClient;
use geo_profile_cache::ProfileRequest;
use geo_profile_design::{
    DesignError, DesignTree, ExpressionEvaluator, PopulateContext, ProfileTemplate, SexprEvaluator,
    TemplateCache,
};
use geo_profile_metadata_models::{DataPlan, MetadataPool, ReleaseYears, TableRequest, TimeFrame};
use serde_json::Value;

use crate::ProfileError;
use crate::orchestrator::ProfileBuilder;

type TemplateLoader = Box<dyn Fn() -> Result<ProfileTemplate, DesignError> + Send + Sync>;

/// What a template needs fetched for one timeframe.
#[derive(Debug)]
pub struct RequestPlan {
    /// Tables the template reads.
    pub shopping_list: BTreeSet<TableRequest>,
    /// Metadata for every table of the shopping list.
    pub pool: MetadataPool,
    /// Tables to request, grouped by paradigm and year.
    pub data: DataPlan,
}

/// Builds profiles from a template and the statistics API.
pub struct CensusProfileBuilder {
    client: ApiClient,
    loader: TemplateLoader,
    templates: TemplateCache<ProfileTemplate>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    years: ReleaseYears,
}

impl CensusProfileBuilder {
    /// Reads the template from `path`, reloading it once the template cache
    /// expires.
    #[must_use]
    pub fn from_path(client: ApiClient, path: impl Into<PathBuf>, years: ReleaseYears) -> Self {
        let path = path.into();
        Self::with_loader(
            client,
            Box::new(move || ProfileTemplate::load(&path)),
            years,
        )
    }

    /// Uses a fixed template.
    #[must_use]
    pub fn from_template(client: ApiClient, template: ProfileTemplate, years: ReleaseYears) -> Self {
        Self::with_loader(client, Box::new(move || Ok(template.clone())), years)
    }

    fn with_loader(client: ApiClient, loader: TemplateLoader, years: ReleaseYears) -> Self {
        Self {
            client,
            loader,
            templates: TemplateCache::default(),
            evaluator: Arc::new(SexprEvaluator),
            years,
        }
    }

    /// Sets how long a loaded template is reused.
    #[must_use]
    pub fn with_template_ttl(mut self, ttl: Duration) -> Self {
        self.templates = TemplateCache::new(ttl);
        self
    }

    /// Replaces the expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// The current template.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Design`] if the template cannot be loaded.
    pub fn template(&self) -> Result<Arc<ProfileTemplate>, ProfileError> {
        Ok(self.templates.get_or_load(|| (self.loader)())?)
    }

    /// Collects the template's tables, fetches their metadata and plans the
    /// data requests for `timeframe`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if the template cannot be loaded or a
    /// metadata request fails.
    pub async fn plan(&self, timeframe: TimeFrame) -> Result<RequestPlan, ProfileError> {
        let template = self.template()?;
        self.plan_for(&template, timeframe).await
    }

    async fn plan_for(
        &self,
        template: &ProfileTemplate,
        timeframe: TimeFrame,
    ) -> Result<RequestPlan, ProfileError> {
        let shopping_list = template.collect_shopping_list(self.evaluator.as_ref())?;
        let pool = self.client.fill_metadata_pool(&shopping_list).await?;
        let data = pool.prepare_data_request(timeframe, self.years);

        Ok(RequestPlan {
            shopping_list,
            pool,
            data,
        })
    }

    /// Builds the profile for `request`, without enhancement or caching.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if any stage fails.
    pub async fn build_profile(&self, request: &ProfileRequest) -> Result<Value, ProfileError> {
        let start = Instant::now();
        log::info!(
            "Building profile for {} ({})",
            request.geoid,
            request.timeframe
        );

        let template = self.template()?;
        log::info!("Template loaded at {:.4}s", start.elapsed().as_secs_f64());

        let plan = self.plan_for(&template, request.timeframe).await?;
        log::info!(
            "Data request for {} table(s) prepared at {:.4}s",
            plan.shopping_list.len(),
            start.elapsed().as_secs_f64()
        );

        let geography = self.client.get_full_geography_object(&request.geoid).await?;
        let data = self
            .client
            .get_data_dispatched(&plan.data, &geography.show_lineage())
            .await?;
        log::info!("API calls returned at {:.4}s", start.elapsed().as_secs_f64());

        let profile = template.populate(&PopulateContext {
            geography: &geography,
            data: &data,
            pool: &plan.pool,
            timeframe: request.timeframe,
            years: self.years,
            evaluator: self.evaluator.as_ref(),
        })?;
        log::info!("Profile filled at {:.4}s", start.elapsed().as_secs_f64());

        Ok(profile)
    }
}

#[async_trait]
impl ProfileBuilder for CensusProfileBuilder {
    async fn build(&self, request: &ProfileRequest) -> Result<Value, ProfileError> {
        self.build_profile(request).await
    }
}

#[cfg(test)]
mod tests {
    use geo_profile_api_client::ApiClientConfig;
    use geo_profile_cache::{MemoryCache, PROFILE_JSON_FIELD};
    use geo_profile_metadata_models::{DataParadigm, YearTag};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::GeoProfileBuilder;

    const TEMPLATE: &str = r#"
title = "Community Profile"

[[sections]]
title = "Demographics"

[[sections.rows]]
title = "Population"

[[sections.rows.designs]]
type = "single_stat"
title = "Total population"
stat_type = "number"
stat = { identifier = "total_population", display_name = "Total population", expression = "B01001001" }

[[sections.rows.designs]]
type = "column_chart"
title = "Sex"
columns = [
  { identifier = "male", display_name = "Male", expression = "(/ B01001002 B01001001)" },
]
"#;

    async fn mock_api() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.0/geo/tiger2021/05000US26163"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "Feature",
                "geometry": null,
                "properties": {
                    "display_name": "Wayne County, MI",
                    "simple_name": "Wayne County",
                    "aland": 1_585_000_000_i64,
                    "awater": 100_000_000_i64,
                    "population": 1_774_816,
                },
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1.0/geo/tiger2021/05000US26163/parents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parents": [
                    {"geoid": "04000US26", "display_name": "Michigan", "coverage": 100.0},
                ],
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1.0/data/show/acs2021_5yr"))
            .and(query_param("table_ids", "B01001"))
            .and(query_param("geo_ids", "05000US26163,04000US26"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "release": {"name": "ACS 2021 5-year"},
                "tables": {"B01001": {
                    "title": "Sex by Age",
                    "universe": "Total population",
                    "columns": {"B01001001": {"name": "Total:", "indent": 0}},
                }},
                "data": {
                    "05000US26163": {"B01001": {
                        "estimate": {"B01001001": 1000.0, "B01001002": 480.0},
                        "error": {"B01001001": 10.0, "B01001002": 8.0},
                    }},
                    "04000US26": {"B01001": {
                        "estimate": {"B01001001": 10000.0, "B01001002": 4900.0},
                        "error": {"B01001001": 0.0, "B01001002": 30.0},
                    }},
                },
            })))
            .mount(&server)
            .await;

        server
    }

    fn builder(server: &MockServer) -> CensusProfileBuilder {
        let client = ApiClient::new(ApiClientConfig::new(&server.uri())).unwrap();
        CensusProfileBuilder::from_template(
            client,
            ProfileTemplate::from_toml(TEMPLATE).unwrap(),
            ReleaseYears::default(),
        )
    }

    fn request() -> ProfileRequest {
        ProfileRequest::new("05000US26163", TimeFrame::Present)
    }

    #[tokio::test]
    async fn plans_placeholder_tables() {
        let server = mock_api().await;
        let plan = builder(&server).plan(TimeFrame::Past).await.unwrap();

        assert_eq!(plan.shopping_list.len(), 1);
        assert_eq!(
            plan.data[&(DataParadigm::Cr, YearTag::Numeric(2016))],
            ["b01001"]
        );
    }

    #[tokio::test]
    async fn builds_a_populated_profile() {
        let server = mock_api().await;
        let profile = builder(&server).build_profile(&request()).await.unwrap();

        assert_eq!(profile["geography"]["full_geoid"], "05000US26163");
        assert_eq!(profile["geography"]["comparatives"], json!(["state"]));

        let designs = &profile["sections"]["demographics"]["rows"]["population"]["designs"];
        let stat = &designs["total_population"]["stat"];
        assert_eq!(stat["values"], json!({"this": 1000.0, "state": 10000.0}));
        assert_eq!(stat["index"]["state"], 10);
        assert_eq!(designs["sex"]["male"]["values"]["this"], 0.48);
        assert_eq!(designs["sex"]["metadata"]["name"], "Sex (2021)");
    }

    #[tokio::test]
    async fn orchestrated_builds_are_enhanced_and_cached() {
        let server = mock_api().await;
        let cache = Arc::new(MemoryCache::new("profiles", "0.1.0"));
        let orchestrator =
            GeoProfileBuilder::new(cache.clone(), Arc::new(builder(&server)));

        let profile = orchestrator.build_geoid(&request()).await.unwrap();

        let stat = &profile["sections"]["demographics"]["rows"]["population"]["designs"]
            ["total_population"]["stat"];
        assert_eq!(stat["index"], json!({"this": 100.0, "state": 10.0}));
        assert_eq!(stat["error_ratio"]["this"], 1.0);
        assert_eq!(profile["geography"]["census_release_year"], "21");
        assert!(profile[PROFILE_JSON_FIELD].is_string());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let server = mock_api().await;
        let client = ApiClient::new(ApiClientConfig::new(&server.uri())).unwrap();
        let builder = CensusProfileBuilder::from_path(
            client,
            "/nonexistent/template.toml",
            ReleaseYears::default(),
        );

        assert!(matches!(
            builder.build_profile(&request()).await,
            Err(ProfileError::Design(DesignError::Io(_)))
        ));
    }
}
