#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for building geographic profiles.
//!
//! Configuration comes from the environment (see
//! [`geo_profile::ProfileConfig`]); `build` additionally reads the S3 cache
//! settings unless `--memory-cache` or `--no-cache` is given.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use geo_profile::{
    CensusProfileBuilder, GeoProfileBuilder, ProfileConfig, ProfileRequest, enhance_profile,
};
use geo_profile_api_client::ApiClient;
use geo_profile_cache::s3::DEFAULT_NAMESPACE;
use geo_profile_cache::{CacheHandler, MemoryCache, S3Cache};
use geo_profile_cli_utils::{IndicatifProgress, MultiProgress};
use geo_profile_metadata_models::{TimeFrame, schema_name};

#[derive(Parser)]
#[command(name = "geo_profile", about = "Geographic statistical profile builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or fetch from the cache) the profile of one geography
    Build {
        /// Full GEOID (e.g., "`05000US26163`")
        geoid: String,
        /// Profile template (TOML)
        #[arg(long)]
        template: PathBuf,
        /// Which release to build against
        #[arg(long, default_value = "present")]
        timeframe: TimeFrame,
        /// Skip the cache entirely: always build, never store
        #[arg(long)]
        no_cache: bool,
        /// Use an in-process cache instead of S3
        #[arg(long, conflicts_with = "no_cache")]
        memory_cache: bool,
        /// Write the profile here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the comparison lineage of a geography
    Lineage {
        /// Full GEOID
        geoid: String,
    },
    /// Show which tables a template needs and how they will be requested
    Plan {
        /// Profile template (TOML)
        #[arg(long)]
        template: PathBuf,
        /// Which release to plan for
        #[arg(long, default_value = "present")]
        timeframe: TimeFrame,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = geo_profile_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = ProfileConfig::from_env()?;

    match cli.command {
        Commands::Build {
            geoid,
            template,
            timeframe,
            no_cache,
            memory_cache,
            output,
        } => {
            let start = Instant::now();
            let request = ProfileRequest::new(geoid, timeframe);
            let builder = profile_builder(&config, &multi, &template)?;

            let profile = if no_cache {
                let mut profile = builder.build_profile(&request).await?;
                enhance_profile(&mut profile);
                profile
            } else {
                let cache: Arc<dyn CacheHandler> = if memory_cache {
                    Arc::new(MemoryCache::new(DEFAULT_NAMESPACE, &config.profile_version))
                } else {
                    Arc::new(S3Cache::from_env(&config.profile_version)?)
                };
                GeoProfileBuilder::new(cache, Arc::new(builder))
                    .build_geoid(&request)
                    .await?
            };

            let text = serde_json::to_string_pretty(&profile)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    log::info!("Wrote {}", path.display());
                }
                None => println!("{text}"),
            }

            log::info!(
                "Profile for {} ready in {:.1}s",
                request.geoid,
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Lineage { geoid } => {
            let client = ApiClient::new(config.api_client_config())?;
            let geography = client.get_full_geography_object(&geoid).await?;

            println!("{} ({})", geography.full_name, geography.full_geoid);
            for entry in geography.show_detailed_lineage() {
                println!("  {:<28} {}", entry.relation, entry.geoid);
            }
        }
        Commands::Plan {
            template,
            timeframe,
        } => {
            let plan = profile_builder(&config, &multi, &template)?
                .plan(timeframe)
                .await?;

            println!("Shopping list ({} tables):", plan.shopping_list.len());
            for request in &plan.shopping_list {
                println!(
                    "  {:<16} {} {}",
                    request.name, request.paradigm, request.comparison_type
                );
            }

            println!("Data requests for {timeframe}:");
            for ((paradigm, year), tables) in &plan.data {
                println!(
                    "  {:<20} {}",
                    schema_name(*paradigm, year),
                    tables.join(",")
                );
            }
        }
    }

    Ok(())
}

fn profile_builder(
    config: &ProfileConfig,
    multi: &MultiProgress,
    template: &Path,
) -> Result<CensusProfileBuilder, Box<dyn std::error::Error>> {
    let client = ApiClient::new(config.api_client_config())?
        .with_progress(IndicatifProgress::requests_bar(multi, "Fetching"));

    Ok(
        CensusProfileBuilder::from_path(client, template, config.years)
            .with_template_ttl(config.template_ttl),
    )
}
