//! Rebuilds a parent chain from a flat, coverage-annotated ancestor list.

use std::cmp::Reverse;

use geo_profile_geography_models::{Geography, SummaryLevel, primary_index};

use crate::GeoError;

/// Attaches `ancestors` to `queried` as a chain of parent groups.
///
/// Geographies are ordered most granular first by their summary level rank.
/// Ancestors sharing a summary level form one group of siblings; each group
/// becomes the `parents` of the previous group's primary parent (the one with
/// the greatest coverage, first wins on ties), starting at `queried`.
///
/// Ancestors with the queried geography's own GEOID are ignored, and
/// ancestors with unknown summary levels are dropped.
///
/// # Errors
///
/// Returns [`GeoError::UnknownSummaryLevel`] if `queried` itself has a
/// summary level outside the rank table.
pub fn resolve(mut queried: Geography, ancestors: Vec<Geography>) -> Result<Geography, GeoError> {
    if queried.summary_level().is_none() {
        return Err(GeoError::UnknownSummaryLevel {
            geoid: queried.full_geoid.clone(),
            sumlevel: queried.sumlevel().to_string(),
        });
    }

    let mut ranked: Vec<(SummaryLevel, Geography)> = ancestors
        .into_iter()
        .filter(|ancestor| ancestor.full_geoid != queried.full_geoid)
        .filter_map(|ancestor| match ancestor.summary_level() {
            Some(level) => Some((level, ancestor)),
            None => {
                log::warn!(
                    "Dropping ancestor {} of {}: unknown summary level {}",
                    ancestor.full_geoid,
                    queried.full_geoid,
                    ancestor.sumlevel(),
                );
                None
            }
        })
        .collect();

    // Stable sort keeps API order within a level, which decides ties.
    ranked.sort_by_key(|(level, _)| Reverse(level.rank()));

    let mut groups: Vec<Vec<Geography>> = Vec::new();
    let mut current: Option<SummaryLevel> = None;
    for (level, geography) in ranked {
        match groups.last_mut() {
            Some(group) if current == Some(level) => group.push(geography),
            _ => {
                groups.push(vec![geography]);
                current = Some(level);
            }
        }
    }

    log::debug!(
        "Resolved {} ancestor level(s) for {}",
        groups.len(),
        queried.full_geoid,
    );

    // Attach from the broadest level down so every group is moved into place
    // exactly once.
    let mut carried: Option<Vec<Geography>> = None;
    while let Some(mut group) = groups.pop() {
        if let Some(parents) = carried.take() {
            if let Some(index) = primary_index(&group) {
                group[index].parents = parents;
            }
        }
        carried = Some(group);
    }

    queried.parents = carried.unwrap_or_default();
    Ok(queried)
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

    fn tract() -> Geography {
        Geography {
            root: true,
            ..Geography::new("14000US26163500100", "Census Tract 5001, Wayne, MI")
        }
    }

    #[test]
    fn builds_chain_most_granular_first() {
        let resolved = resolve(
            tract(),
            vec![
                geo("04000US26", 100.0),
                geo("05000US26163", 100.0),
                geo("16000US2622000", 100.0),
                geo("31000US19820", 100.0),
            ],
        )
        .unwrap();

        assert_eq!(
            resolved.show_lineage(),
            vec![
                "14000US26163500100",
                "16000US2622000",
                "05000US26163",
                "04000US26",
            ]
        );
        assert_eq!(resolved.find_matriarch().full_geoid, "04000US26");
    }

    #[test]
    fn groups_siblings_and_follows_max_coverage() {
        let resolved = resolve(
            tract(),
            vec![
                geo("16000US2622000", 30.0),
                geo("16000US2621000", 70.0),
                geo("05000US26163", 100.0),
            ],
        )
        .unwrap();

        assert_eq!(resolved.parents.len(), 2);
        assert_eq!(resolved.parents[0].full_geoid, "16000US2622000");
        assert!(resolved.parents[0].parents.is_empty());
        let primary = resolved.primary_parent().unwrap();
        assert_eq!(primary.full_geoid, "16000US2621000");
        assert_eq!(primary.parents[0].full_geoid, "05000US26163");
    }

    #[test]
    fn coverage_ties_go_to_first_sibling() {
        let resolved = resolve(
            tract(),
            vec![
                geo("16000US2621000", 50.0),
                geo("16000US2622000", 50.0),
                geo("04000US26", 100.0),
            ],
        )
        .unwrap();

        let primary = resolved.primary_parent().unwrap();
        assert_eq!(primary.full_geoid, "16000US2621000");
        assert_eq!(primary.parents.len(), 1);
    }

    #[test]
    fn matriarch_never_has_parents() {
        let ancestor_lists = vec![
            vec![],
            vec![geo("04000US26", 100.0)],
            vec![
                geo("31000US19820", 60.0),
                geo("31000US11460", 40.0),
                geo("05000US26163", 100.0),
                geo("04000US26", 100.0),
                geo("06000US2616322000", 100.0),
            ],
            vec![geo("97000US2601103", 100.0), geo("04000US26", 100.0)],
        ];

        for ancestors in ancestor_lists {
            let resolved = resolve(tract(), ancestors).unwrap();
            assert!(resolved.find_matriarch().parents.is_empty());
        }
    }

    #[test]
    fn root_without_ancestors_is_its_own_lineage() {
        let resolved = resolve(tract(), vec![]).unwrap();
        assert_eq!(resolved.show_lineage(), vec!["14000US26163500100"]);
        assert_eq!(resolved.find_matriarch().full_geoid, "14000US26163500100");
    }

    #[test]
    fn ignores_self_and_unknown_levels() {
        let resolved = resolve(
            tract(),
            vec![
                geo("14000US26163500100", 100.0),
                geo("01000US", 100.0),
                geo("04000US26", 100.0),
            ],
        )
        .unwrap();

        assert_eq!(
            resolved.show_lineage(),
            vec!["14000US26163500100", "04000US26"]
        );
    }

    #[test]
    fn rejects_unknown_queried_level() {
        let result = resolve(geo("01000US", 100.0), vec![]);
        assert!(matches!(
            result,
            Err(GeoError::UnknownSummaryLevel { sumlevel, .. }) if sumlevel == "010"
        ));
    }

    #[test]
    fn metro_areas_are_traversed_but_elided() {
        let resolved = resolve(
            Geography {
                root: true,
                ..Geography::new("05000US26163", "Wayne County, MI")
            },
            vec![geo("31000US19820", 100.0), geo("04000US26", 100.0)],
        )
        .unwrap();

        let lineage = resolved.show_detailed_lineage();
        let relations: Vec<&str> = lineage.iter().map(|e| e.relation.as_str()).collect();
        assert_eq!(relations, ["this", "state"]);
    }
}
