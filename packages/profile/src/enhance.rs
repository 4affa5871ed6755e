//! Post-build profile enhancement.
//!
//! Every figure in a freshly populated profile carries one entry per
//! lineage relation. Profile pages only compare against two other
//! geographies, so each figure is cut down to the queried geography plus
//! the first two available comparison relations, with indexes and MOE
//! ratios recomputed as percentages. The geography block gains the fields
//! the page header reads.

use geo_profile_estimate::terraced::ROOT_RELATION;
use geo_profile_estimate::rounding::percentage;
use geo_profile_geography_models::SummaryLevel;
use serde_json::{Map, Value, json};

/// Relations considered for comparison, in order of preference.
const COMPARISON_ORDER: [&str; 6] = [ROOT_RELATION, "place", "CBSA", "county", "state", "nation"];

/// Comparison relations kept next to the queried geography.
const COMPARATIVES: usize = 2;

/// Summary levels (school districts) that get extra links.
const EXTRA_LINK_LEVELS: [&str; 3] = ["950", "960", "970"];

/// Release levels (1-year and 3-year) that get extra links.
const EXTRA_LINK_RELEASE_LEVELS: [&str; 2] = ["1", "3"];

/// Enhances a populated profile in place.
pub fn enhance_profile(profile: &mut Value) {
    let mut comparatives = None;
    enhance_figures(profile, &mut comparatives);

    let Some(geography) = profile.get_mut("geography").and_then(Value::as_object_mut) else {
        log::warn!("Profile has no geography block, skipping header enhancement");
        return;
    };

    if let Some(comparatives) = comparatives {
        geography.insert("comparatives".to_string(), json!(comparatives));
    }

    let release_level = enhance_release(geography);

    let Some(this) = geography.get_mut("this").and_then(Value::as_object_mut) else {
        return;
    };
    let sumlevel = this
        .get("sumlevel")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    if let Some(sumlevel) = &sumlevel {
        match SummaryLevel::from_code(sumlevel) {
            Some(level) => {
                this.insert("sumlevel_name".to_string(), json!(level.name()));
            }
            None => log::warn!("Unknown summary level {sumlevel} in profile geography"),
        }
    }

    if let Some(short_geoid) = this
        .get("full_geoid")
        .and_then(Value::as_str)
        .and_then(|geoid| geoid.split("US").nth(1))
        .map(ToString::to_string)
    {
        this.insert("short_geoid".to_string(), json!(short_geoid));
    }

    if release_level.is_some_and(|level| EXTRA_LINK_RELEASE_LEVELS.contains(&level.as_str()))
        && sumlevel.is_some_and(|level| EXTRA_LINK_LEVELS.contains(&level.as_str()))
    {
        this.insert("show_extra_links".to_string(), json!(true));
    }
}

/// Splits `"ACS 2021 5-year"` into a two-digit year (`"21"`) and a level
/// (`"5"`), stores both and returns the level.
fn enhance_release(geography: &mut Map<String, Value>) -> Option<String> {
    let release = geography.get("census_release").and_then(Value::as_str)?;
    let mut bits = release.split(' ').skip(1);
    let year = bits.next().and_then(|year| year.get(2..))?.to_string();
    let level = bits.next().and_then(|level| level.get(..1))?.to_string();

    geography.insert("census_release_year".to_string(), json!(year));
    geography.insert("census_release_level".to_string(), json!(level));
    Some(level)
}

/// Enhances every object with a `values` key. Keeps the comparatives of the
/// last one visited.
fn enhance_figures(value: &mut Value, comparatives: &mut Option<Vec<String>>) {
    let Value::Object(fields) = value else {
        return;
    };

    if fields.contains_key("values")
        && let Some(found) = enhance_figure(fields)
    {
        *comparatives = Some(found);
    }

    for child in fields.values_mut() {
        enhance_figures(child, comparatives);
    }
}

fn enhance_figure(figure: &mut Map<String, Value>) -> Option<Vec<String>> {
    let values = figure.get("values")?.as_object()?.clone();
    let field = |name: &str| {
        figure
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };
    let errors = field("error");
    let numerators = field("numerators");
    let numerator_errors = field("numerator_errors");

    let root = values
        .get(ROOT_RELATION)
        .and_then(Value::as_f64)
        .filter(|value| *value != 0.0);

    let mut kept = Map::new();
    let mut index = Map::new();
    let mut kept_errors = Map::new();
    let mut error_ratio = Map::new();
    let mut kept_numerators = Map::new();
    let mut kept_numerator_errors = Map::new();
    let mut comparatives = Vec::new();

    for relation in COMPARISON_ORDER {
        if relation == "county" && kept.contains_key("CBSA") {
            continue;
        }

        if let Some(value) = values.get(relation) {
            kept.insert(relation.to_string(), value.clone());
            let relation_index = if root.is_some() {
                json!(percentage(root, value.as_f64(), 1))
            } else {
                json!(0)
            };
            index.insert(relation.to_string(), relation_index);

            if relation != ROOT_RELATION {
                comparatives.push(relation.to_string());
            }

            if let Some(error) = errors.get(relation) {
                kept_errors.insert(relation.to_string(), error.clone());
                error_ratio.insert(
                    relation.to_string(),
                    json!(percentage(error.as_f64(), value.as_f64(), 3)),
                );
            }
        }

        if let Some(numerator) = numerators.get(relation) {
            kept_numerators.insert(relation.to_string(), numerator.clone());
            if let Some(error) = numerator_errors.get(relation) {
                kept_numerator_errors.insert(relation.to_string(), error.clone());
            }
        }

        if kept.len() > COMPARATIVES {
            break;
        }
    }

    figure.insert("values".to_string(), Value::Object(kept));
    figure.insert("index".to_string(), Value::Object(index));
    figure.insert("error".to_string(), Value::Object(kept_errors));
    figure.insert("error_ratio".to_string(), Value::Object(error_ratio));
    figure.insert("numerators".to_string(), Value::Object(kept_numerators));
    figure.insert(
        "numerator_errors".to_string(),
        Value::Object(kept_numerator_errors),
    );

    Some(comparatives)
}
