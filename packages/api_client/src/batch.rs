//! Splitting a data plan into bounded-size requests.

use geo_profile_metadata_models::{DataPlan, schema_name};

use crate::dispatch::FetchTask;

/// Default number of tables per data request.
pub const DEFAULT_CHUNK_SIZE: usize = 8;

/// Builds one data request per `chunk_size` tables of each plan group.
///
/// Every request asks for all of `geoids`. Table codes are upper-cased.
#[must_use]
pub fn data_tasks(
    base_url: &str,
    plan: &DataPlan,
    geoids: &[String],
    chunk_size: usize,
) -> Vec<FetchTask> {
    let geo_ids = geoids.join(",");

    plan.iter()
        .flat_map(|((paradigm, year), tables)| {
            let url = format!("{base_url}/1.0/data/show/{}", schema_name(*paradigm, year));
            let geo_ids = geo_ids.clone();
            tables.chunks(chunk_size.max(1)).map(move |chunk| {
                let table_ids = chunk
                    .iter()
                    .map(|table| table.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(",");
                FetchTask::new(url.clone())
                    .param("geo_ids", geo_ids.clone())
                    .param("table_ids", table_ids)
            })
        })
        .collect()
}
