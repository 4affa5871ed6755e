#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography types and lineage traversal.
//!
//! A [`Geography`] is one area (tract, place, county, ...) together with the
//! broader areas that contain it. Parents are grouped one summary level at a
//! time: `parents` always holds siblings of a single level, and the one with
//! the greatest coverage (the *primary parent*) carries the next level up.
//!
//! Geographies are rebuilt from API responses for every profile request and
//! never persisted.

pub mod summary_level;

use serde::Serialize;
use serde_json::{Map, Value, json};

pub use summary_level::{METRO_AREA_CODE, SummaryLevel};

/// Square meters per square mile.
pub const SQUARE_METERS_PER_SQUARE_MILE: f64 = 2_589_988.0;

/// Release label embedded in wrapped-up geographies.
pub const CENSUS_RELEASE: &str = "ACS 2021 5-year";

/// Release level (1, 3 or 5 year) embedded in wrapped-up geographies.
pub const CENSUS_RELEASE_LEVEL: u8 = 5;

/// Relation label of the queried geography.
pub const ROOT_RELATION: &str = "this";

/// One entry of a detailed lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageEntry {
    /// `"this"` for the queried geography, otherwise the summary level name.
    pub relation: String,
    /// Full GEOID.
    pub geoid: String,
}

/// A geographic area and the areas containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Geography {
    /// Full GEOID, e.g. `"05000US26163"`.
    pub full_geoid: String,
    /// Display name, e.g. `"Wayne County, MI"`.
    pub full_name: String,
    /// Short name, e.g. `"Wayne County"`.
    pub short_name: Option<String>,
    /// Land area in square meters.
    pub land_area: Option<i64>,
    /// Water area in square meters.
    pub awater: Option<i64>,
    /// Total population.
    pub total_population: Option<i64>,
    /// Percentage (0–100) of the child this geography covers.
    pub coverage: f64,
    /// Whether this is the queried geography.
    pub root: bool,
    /// Containing geographies, all of one summary level.
    pub parents: Vec<Geography>,
}

impl Geography {
    /// Creates a geography with full coverage and no parents.
    #[must_use]
    pub fn new(full_geoid: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            full_geoid: full_geoid.into(),
            full_name: full_name.into(),
            short_name: None,
            land_area: None,
            awater: None,
            total_population: None,
            coverage: 100.0,
            root: false,
            parents: Vec::new(),
        }
    }

    /// Three-digit summary level code (the GEOID prefix).
    #[must_use]
    pub fn sumlevel(&self) -> &str {
        self.full_geoid.get(..3).unwrap_or(&self.full_geoid)
    }

    /// The summary level, if the code is in the rank table.
    #[must_use]
    pub fn summary_level(&self) -> Option<SummaryLevel> {
        SummaryLevel::from_code(self.sumlevel())
    }

    /// Summary level name, if the code is in the rank table.
    #[must_use]
    pub fn sumlevel_name(&self) -> Option<&'static str> {
        self.summary_level().map(SummaryLevel::name)
    }

    /// The part of the GEOID after `"US"` (e.g. `"26163"`).
    #[must_use]
    pub fn short_geoid(&self) -> Option<&str> {
        self.full_geoid.split_once("US").map(|(_, short)| short)
    }

    /// Land area converted to square miles.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn square_miles(&self) -> Option<f64> {
        self.land_area
            .map(|area| area as f64 / SQUARE_METERS_PER_SQUARE_MILE)
    }

    /// Residents per square mile.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn population_density(&self) -> Option<f64> {
        let square_miles = self.square_miles().filter(|sq| *sq != 0.0)?;
        self.total_population
            .map(|population| population as f64 / square_miles)
    }

    /// The parent with the greatest coverage. Ties go to the first parent.
    #[must_use]
    pub fn primary_parent(&self) -> Option<&Self> {
        self.parents.iter().fold(None, |best: Option<&Self>, parent| match best {
            Some(current) if current.coverage >= parent.coverage => Some(current),
            _ => Some(parent),
        })
    }

    /// Index of [`Self::primary_parent`] in `parents`.
    #[must_use]
    pub fn primary_parent_index(&self) -> Option<usize> {
        primary_index(&self.parents)
    }

    /// Iterates the primary-parent chain, starting at the primary parent.
    pub fn ancestors(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(self.primary_parent(), |node| node.primary_parent())
    }

    /// The broadest ancestor reachable through primary parents.
    #[must_use]
    pub fn find_matriarch(&self) -> &Self {
        self.ancestors().last().unwrap_or(self)
    }

    /// GEOIDs from this geography up to its matriarch. Metro areas are
    /// skipped unless they are the matriarch.
    #[must_use]
    pub fn show_lineage(&self) -> Vec<String> {
        self.lineage_nodes()
            .map(|node| node.full_geoid.clone())
            .collect()
    }

    /// Like [`Self::show_lineage`], labelling each GEOID with its relation
    /// to the queried geography.
    #[must_use]
    pub fn show_detailed_lineage(&self) -> Vec<LineageEntry> {
        self.lineage_nodes()
            .map(|node| LineageEntry {
                relation: node.relation().to_string(),
                geoid: node.full_geoid.clone(),
            })
            .collect()
    }

    /// `"this"` for the queried geography, else its summary level name.
    #[must_use]
    pub fn relation(&self) -> &str {
        if self.root {
            ROOT_RELATION
        } else {
            self.sumlevel_name().unwrap_or_else(|| self.sumlevel())
        }
    }

    fn lineage_nodes(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |node| node.primary_parent())
            .filter(|node| node.parents.is_empty() || node.sumlevel() != METRO_AREA_CODE)
    }

    /// Flattens this geography into the structure profile pages expect.
    ///
    /// Every ancestor on the primary-parent chain is embedded once under
    /// `parents`, keyed by its summary level name, without its own
    /// ancestors.
    #[must_use]
    pub fn wrap_up(&self) -> Value {
        let mut parents = Map::new();
        let mut comparatives = Vec::new();
        for ancestor in self.ancestors() {
            let name = ancestor.relation_key();
            comparatives.push(Value::String(name.clone()));
            parents.insert(name, ancestor.snapshot());
        }

        let mut wrapped = self.fields(true);
        wrapped.insert("parents".to_string(), Value::Object(parents));
        wrapped.insert("comparatives".to_string(), Value::Array(comparatives));
        finish_wrap_up(wrapped, self.fields(true))
    }

    fn snapshot(&self) -> Value {
        let mut wrapped = self.fields(false);
        wrapped.insert("parents".to_string(), Value::Null);
        wrapped.insert("comparatives".to_string(), Value::Null);
        finish_wrap_up(wrapped, self.fields(false))
    }

    fn relation_key(&self) -> String {
        self.sumlevel_name()
            .map_or_else(|| self.sumlevel().to_string(), ToString::to_string)
    }

    fn fields(&self, bottom: bool) -> Map<String, Value> {
        let (square_miles, population_density) = if bottom {
            (self.square_miles(), self.population_density())
        } else {
            (None, None)
        };

        let value = json!({
            "full_name": self.full_name,
            "full_geoid": self.full_geoid,
            "short_name": self.short_name,
            "land_area": self.land_area,
            "awater": self.awater,
            "total_population": self.total_population,
            "coverage": self.coverage,
            "root": self.root,
            "population": self.total_population,
            "population_density": population_density,
            "display_name": self.full_name,
            "short_geoid": self.short_geoid(),
            "square_miles": square_miles,
            "sumlevel": self.sumlevel(),
            "simple_name": self.short_name,
            "sumlevel_name": self.sumlevel_name(),
        });

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

fn finish_wrap_up(mut wrapped: Map<String, Value>, this: Map<String, Value>) -> Value {
    wrapped.insert("this".to_string(), Value::Object(this));
    wrapped.insert("census_release".to_string(), json!(CENSUS_RELEASE));
    wrapped.insert(
        "census_release_level".to_string(),
        json!(CENSUS_RELEASE_LEVEL),
    );
    Value::Object(wrapped)
}

/// Index of the max-coverage geography, first occurrence winning ties.
#[must_use]
pub fn primary_index(geographies: &[Geography]) -> Option<usize> {
    geographies
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, geo)| match best {
            Some((_, coverage)) if coverage >= geo.coverage => best,
            _ => Some((i, geo.coverage)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(geoid: &str, coverage: f64) -> Geography {
        Geography {
            coverage,
            ..Geography::new(geoid, geoid)
        }
    }

    fn tract_chain() -> Geography {
        let state = geo("04000US26", 100.0);
        let county = Geography {
            parents: vec![state],
            ..geo("05000US26163", 100.0)
        };
        let msa = Geography {
            parents: vec![county],
            ..geo("31000US19820", 100.0)
        };
        Geography {
            root: true,
            land_area: Some(2_589_988),
            total_population: Some(4_000),
            parents: vec![msa],
            ..geo("14000US26163500100", 100.0)
        }
    }

    #[test]
    fn root_without_parents_has_single_lineage() {
        let root = Geography {
            root: true,
            ..geo("04000US26", 100.0)
        };
        assert_eq!(root.show_lineage(), vec!["04000US26".to_string()]);
        assert_eq!(root.find_matriarch(), &root);
        assert!(root.primary_parent().is_none());
    }

    #[test]
    fn primary_parent_prefers_coverage_then_order() {
        let child = Geography {
            parents: vec![geo("16000US1", 30.0), geo("16000US2", 70.0), geo("16000US3", 70.0)],
            ..geo("14000US1", 100.0)
        };
        assert_eq!(child.primary_parent().unwrap().full_geoid, "16000US2");
        assert_eq!(child.primary_parent_index(), Some(1));
    }

    #[test]
    fn lineage_skips_metro_areas() {
        let tract = tract_chain();
        assert_eq!(
            tract.show_lineage(),
            vec!["14000US26163500100", "05000US26163", "04000US26"]
        );
        let detailed = tract.show_detailed_lineage();
        let relations: Vec<&str> = detailed.iter().map(|e| e.relation.as_str()).collect();
        assert_eq!(relations, ["this", "county", "state"]);
        assert_eq!(tract.find_matriarch().full_geoid, "04000US26");
    }

    #[test]
    fn metro_matriarch_is_kept() {
        let msa = geo("31000US19820", 100.0);
        let county = Geography {
            root: true,
            parents: vec![msa],
            ..geo("05000US26163", 100.0)
        };
        assert_eq!(county.show_lineage(), vec!["05000US26163", "31000US19820"]);
    }

    #[test]
    fn derived_fields() {
        let tract = tract_chain();
        assert_eq!(tract.short_geoid(), Some("26163500100"));
        assert_eq!(tract.square_miles(), Some(1.0));
        assert_eq!(tract.population_density(), Some(4_000.0));
        assert_eq!(tract.sumlevel_name(), Some("tract"));
        assert_eq!(geo("nope", 1.0).short_geoid(), None);
    }

    #[test]
    fn wrap_up_embeds_flat_ancestors() {
        let wrapped = tract_chain().wrap_up();

        assert_eq!(wrapped["full_geoid"], "14000US26163500100");
        assert_eq!(wrapped["this"]["sumlevel_name"], "tract");
        assert_eq!(wrapped["square_miles"], 1.0);
        assert_eq!(wrapped["population"], 4_000);
        assert_eq!(wrapped["comparatives"], json!(["msa", "county", "state"]));
        assert_eq!(wrapped["census_release"], CENSUS_RELEASE);

        let county = &wrapped["parents"]["county"];
        assert_eq!(county["full_geoid"], "05000US26163");
        assert_eq!(county["parents"], Value::Null);
        assert_eq!(county["square_miles"], Value::Null);
        assert_eq!(county["this"]["short_geoid"], "26163");
    }
}
