//! Estimates spread across a geography's lineage.
//!
//! A profile shows every figure for the queried geography (`"this"`) next to
//! its comparison geographies (county, state, ...). [`TerracedEstimate`]
//! transposes one estimate per relation into parallel per-field mappings,
//! which is the shape profile pages consume.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Estimate;
use crate::rounding::rounded_ratio;

/// Relation label of the queried geography.
pub const ROOT_RELATION: &str = "this";

/// Parallel per-relation mappings of one evaluated figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerracedEstimate {
    /// Estimate value per relation.
    pub values: IndexMap<String, Option<f64>>,
    /// Margin of error per relation.
    pub error: IndexMap<String, Option<f64>>,
    /// Ratio numerator per relation.
    pub numerators: IndexMap<String, Option<f64>>,
    /// Ratio numerator MOE per relation.
    pub numerator_errors: IndexMap<String, Option<f64>>,
    /// MOE as a percentage of the value per relation.
    pub error_ratio: IndexMap<String, Option<f64>>,
    /// Value of [`ROOT_RELATION`] as a percentage of each relation's value.
    pub index: IndexMap<String, Option<i64>>,
}

impl TerracedEstimate {
    /// Transposes `relation -> estimate` pairs, keeping their order.
    #[must_use]
    pub fn from_relations<I, K>(relations: I) -> Self
    where
        I: IntoIterator<Item = (K, Estimate)>,
        K: Into<String>,
    {
        let mut result = Self::default();

        for (relation, estimate) in relations {
            let relation = relation.into();
            result.values.insert(relation.clone(), estimate.value);
            result.error.insert(relation.clone(), estimate.error);
            result
                .numerators
                .insert(relation.clone(), estimate.numerator);
            result
                .numerator_errors
                .insert(relation.clone(), estimate.numerator_moe);
            result
                .error_ratio
                .insert(relation, estimate.error_ratio());
        }

        let root = result.values.get(ROOT_RELATION).copied().flatten();
        result.index = result
            .values
            .iter()
            .map(|(relation, value)| (relation.clone(), rounded_ratio(root, *value)))
            .collect();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_against_this() {
        let terraced = TerracedEstimate::from_relations([
            ("this", Estimate::new(50.0, 5.0)),
            ("state", Estimate::new(200.0, 20.0)),
        ]);

        assert_eq!(terraced.index["this"], Some(100));
        assert_eq!(terraced.index["state"], Some(25));
        assert_eq!(terraced.values["state"], Some(200.0));
        assert_eq!(terraced.error["this"], Some(5.0));
        assert_eq!(terraced.error_ratio["state"], Some(10.0));
    }

    #[test]
    fn keeps_relation_order() {
        let terraced = TerracedEstimate::from_relations([
            ("this", Estimate::new(1.0, 0.0)),
            ("county", Estimate::new(2.0, 0.0)),
            ("state", Estimate::new(4.0, 0.0)),
        ]);
        let keys: Vec<&str> = terraced.values.keys().map(String::as_str).collect();
        assert_eq!(keys, ["this", "county", "state"]);
    }

    #[test]
    fn index_is_null_without_root_relation() {
        let terraced = TerracedEstimate::from_relations([("state", Estimate::new(4.0, 1.0))]);
        assert_eq!(terraced.index["state"], None);
    }

    #[test]
    fn carries_numerators() {
        let ratio = Estimate::new(30.0, 4.0)
            .divide(&Estimate::new(60.0, 2.0))
            .unwrap();
        let terraced = TerracedEstimate::from_relations([("this", ratio)]);
        assert_eq!(terraced.numerators["this"], Some(30.0));
        assert_eq!(terraced.numerator_errors["this"], Some(4.0));
    }
}
