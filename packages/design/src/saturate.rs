//! Evaluating one expression across a geography's lineage.

use geo_profile_estimate::TerracedEstimate;
use geo_profile_geography_models::LineageEntry;
use serde_json::{Map, Value};

use crate::evaluator::ExpressionEvaluator;
use crate::namespace::Namespace;
use crate::{DesignError, EvalError};

/// Evaluates `expression` for every geography of `lineage` and lays the
/// results out per relation, under `name`.
///
/// # Errors
///
/// Returns [`DesignError::MissingData`] if `response` has no data for one of
/// the geographies, or [`DesignError::Eval`] (labelled with `name`) if
/// evaluation fails.
pub fn saturate_datapoint(
    name: &str,
    response: &Value,
    lineage: &[LineageEntry],
    expression: &str,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<Value, DesignError> {
    let estimates = lineage
        .iter()
        .map(|entry| {
            let namespace = Namespace::for_geoid(response, &entry.geoid)?;
            let estimate = evaluator
                .evaluate(expression, &namespace)
                .map_err(|source| eval_error(name, source))?;
            Ok((entry.relation.clone(), estimate))
        })
        .collect::<Result<Vec<_>, DesignError>>()?;

    let terraced = TerracedEstimate::from_relations(estimates);

    let mut saturated = Map::new();
    saturated.insert("name".to_string(), Value::String(name.to_string()));
    if let Value::Object(fields) = serde_json::to_value(terraced)? {
        saturated.extend(fields);
    }
    Ok(Value::Object(saturated))
}

fn eval_error(name: &str, source: EvalError) -> DesignError {
    DesignError::Eval {
        data_point: name.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::SexprEvaluator;

    fn lineage() -> Vec<LineageEntry> {
        vec![
            LineageEntry {
                relation: "this".to_string(),
                geoid: "05000US26163".to_string(),
            },
            LineageEntry {
                relation: "state".to_string(),
                geoid: "04000US26".to_string(),
            },
        ]
    }

    fn response() -> Value {
        json!({
            "data": {
                "05000US26163": {"B01001": {"estimate": {"B01001001": 50.0}, "error": {"B01001001": 5.0}}},
                "04000US26": {"B01001": {"estimate": {"B01001001": 200.0}, "error": {"B01001001": 20.0}}},
            }
        })
    }

    #[test]
    fn terraces_across_lineage() {
        let saturated =
            saturate_datapoint("Total", &response(), &lineage(), "B01001001", &SexprEvaluator).unwrap();

        assert_eq!(saturated["name"], "Total");
        assert_eq!(saturated["values"], json!({"this": 50.0, "state": 200.0}));
        assert_eq!(saturated["index"], json!({"this": 100, "state": 25}));
        assert_eq!(saturated["error_ratio"]["state"], 10.0);
        assert_eq!(saturated["numerators"]["this"], Value::Null);
        let keys: Vec<&String> = saturated.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "name");
    }

    #[test]
    fn eval_errors_name_the_data_point() {
        let error =
            saturate_datapoint("Broken", &response(), &lineage(), "B01001999", &SexprEvaluator)
                .unwrap_err();
        assert!(matches!(error, DesignError::Eval { ref data_point, .. } if data_point == "Broken"));
    }
}
