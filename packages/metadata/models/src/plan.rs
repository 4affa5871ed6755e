//! Grouping pooled tables into per-schema data requests.

use std::collections::BTreeMap;
use std::fmt;

use crate::{DataParadigm, MetadataPool, PoolEntry, TimeFrame};

/// Numeric release years used for placeholder tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseYears {
    /// Year of the [`TimeFrame::Present`] release.
    pub present: u16,
    /// Year of the [`TimeFrame::Past`] release.
    pub past: u16,
}

impl Default for ReleaseYears {
    fn default() -> Self {
        Self {
            present: 2021,
            past: 2016,
        }
    }
}

impl ReleaseYears {
    #[must_use]
    pub const fn for_timeframe(self, timeframe: TimeFrame) -> u16 {
        match timeframe {
            TimeFrame::Past => self.past,
            TimeFrame::Present => self.present,
        }
    }
}

/// The release a group of tables is requested from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum YearTag {
    /// A configured release year.
    Numeric(u16),
    /// A table's own edition tag.
    Tag(String),
}

impl fmt::Display for YearTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(year) => write!(f, "{year}"),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Table codes to request, grouped by paradigm and release.
pub type DataPlan = BTreeMap<(DataParadigm, YearTag), Vec<String>>;

/// Schema name a group of tables lives in.
#[must_use]
pub fn schema_name(paradigm: DataParadigm, year: &YearTag) -> String {
    match paradigm {
        DataParadigm::Cr => format!("acs{year}_5yr"),
        DataParadigm::D3 => format!("d3_{year}"),
    }
}

impl MetadataPool {
    /// Resolves every pooled table to a release for `timeframe` and groups
    /// the tables by `(paradigm, release)`.
    ///
    /// Placeholders use the configured year. Fetched tables use their own
    /// edition for `timeframe`; tables without one are left out.
    #[must_use]
    pub fn prepare_data_request(&self, timeframe: TimeFrame, years: ReleaseYears) -> DataPlan {
        let mut plan = DataPlan::new();

        for entry in self.tables.values() {
            let key = match entry {
                PoolEntry::Placeholder(_) => (
                    DataParadigm::Cr,
                    YearTag::Numeric(years.for_timeframe(timeframe)),
                ),
                PoolEntry::Full(metadata) => {
                    let Some(edition) = metadata.report_year_for_timeframe(timeframe) else {
                        log::debug!(
                            "Skipping {}: no {timeframe} edition",
                            metadata.table_name
                        );
                        continue;
                    };
                    (DataParadigm::D3, YearTag::Tag(edition.to_string()))
                }
            };

            plan.entry(key)
                .or_default()
                .push(entry.table_name().to_string());
        }

        plan
    }
}
