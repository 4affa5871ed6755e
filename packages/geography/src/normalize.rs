//! Conversion of raw geography responses into [`Geography`] values.
//!
//! The API names the same concepts differently across endpoints
//! (`display_name` vs. `full_name`, `aland` vs. `land_area`, ...). These
//! functions are the only place those names are read; everything past this
//! boundary uses the canonical [`Geography`] fields.

use geo_profile_geography_models::Geography;
use serde_json::Value;

use crate::GeoError;

/// Which of the two geography endpoints a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"parents": [...]}`
    Parents,
    /// A feature with `type`, `properties` and a null `geometry`.
    Feature,
}

/// Tells the two geography responses apart by their keys.
///
/// # Errors
///
/// Returns [`GeoError::UnexpectedResponse`] for any other shape.
pub fn classify(response: &Value) -> Result<ResponseShape, GeoError> {
    let Some(object) = response.as_object() else {
        return Err(unexpected(response));
    };

    if object.contains_key("parents") {
        return Ok(ResponseShape::Parents);
    }

    if object.contains_key("type")
        && object.contains_key("properties")
        && object.get("geometry").is_some_and(Value::is_null)
    {
        return Ok(ResponseShape::Feature);
    }

    Err(unexpected(response))
}

/// Builds the queried geography from a geography-by-id response.
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if `properties.display_name` is missing.
pub fn geography_from_response(geoid: &str, response: &Value) -> Result<Geography, GeoError> {
    let properties = &response["properties"];
    let full_name = required_str(properties, "display_name")?;

    Ok(Geography {
        short_name: properties["simple_name"].as_str().map(ToString::to_string),
        land_area: properties["aland"].as_i64(),
        awater: properties["awater"].as_i64(),
        total_population: properties["population"].as_i64(),
        root: true,
        ..Geography::new(geoid, full_name)
    })
}

/// Builds the flat ancestor list from a parents-by-id response.
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if `parents` is not an array or an entry
/// lacks `geoid` or `display_name`.
pub fn parents_from_response(response: &Value) -> Result<Vec<Geography>, GeoError> {
    let parents = response["parents"]
        .as_array()
        .ok_or_else(|| GeoError::Conversion {
            message: "parents response has no `parents` array".to_string(),
        })?;

    parents
        .iter()
        .map(|entry| {
            let full_name = required_str(entry, "display_name")?;
            let geoid = required_str(entry, "geoid")?;
            let short_name = full_name.split(',').next().unwrap_or(full_name).trim();

            Ok(Geography {
                short_name: Some(short_name.to_string()),
                coverage: entry["coverage"].as_f64().unwrap_or(100.0),
                ..Geography::new(geoid, full_name)
            })
        })
        .collect()
}

fn required_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, GeoError> {
    value[field].as_str().ok_or_else(|| GeoError::Conversion {
        message: format!("missing string field `{field}`"),
    })
}

fn unexpected(response: &Value) -> GeoError {
    let mut preview = response.to_string();
    if preview.len() > 200 {
        let end = (0..=200)
            .rev()
            .find(|i| preview.is_char_boundary(*i))
            .unwrap_or(0);
        preview.truncate(end);
        preview.push_str("...");
    }
    GeoError::UnexpectedResponse { message: preview }
}
