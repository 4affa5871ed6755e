#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal helpers for the `geo_profile` binary.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above any live progress
//! bar instead of tearing it. [`IndicatifProgress`] renders fetch dispatch
//! progress.

use std::sync::Arc;
use std::time::Duration;

use geo_profile_api_client::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Dispatch progress drawn with `indicatif`.
///
/// Starts as a spinner and becomes a bar once the dispatcher reports how
/// many requests it has queued. Each dispatch call reuses the same bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
    prefix: String,
}

impl IndicatifProgress {
    /// Adds a request progress indicator to `multi`.
    #[must_use]
    pub fn requests_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} requests [{elapsed}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self {
            bar,
            bar_style,
            prefix: message.to_string(),
        })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(format!("{} {msg}", self.prefix));
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs the global logger and returns the [`MultiProgress`] every
/// progress bar must be added to.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filter) if !filter.is_empty() => builder.parse_filters(&filter),
        _ => builder.parse_filters(DEFAULT_FILTER),
    };
    let logger = builder.build();
    let level = logger.filter();

    // A second call (tests, embedding) keeps the first logger.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
