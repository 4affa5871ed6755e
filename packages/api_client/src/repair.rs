//! Table repair for direct data requests.
//!
//! The data endpoint rejects a whole request when any one table is missing
//! from the schema. Its error message names the culprits in one of two
//! formats; [`classify`] extracts them so the request can be reissued
//! without them.

const UNDEFINED_TABLE_PREFIX: &str = "(psycopg2.errors.UndefinedTable)";
const D3_RELEASE_PREFIX: &str = "The Data Driven Detroit release";

/// Default bound on repair attempts for one data request.
pub const DEFAULT_MAX_REPAIRS: usize = 20;

/// What to do about a failed data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// Drop these (upper-case) tables and retry.
    Remove(Vec<String>),
    /// The failure can't be repaired.
    Fatal,
}

/// Reads the offending tables out of an API error message.
#[must_use]
pub fn classify(message: &str) -> Repair {
    if message.starts_with(UNDEFINED_TABLE_PREFIX) {
        // ... relation "b01001_moe" does not exist ...
        return message
            .split('"')
            .nth(1)
            .and_then(|relation| relation.split('_').next())
            .filter(|table| !table.is_empty())
            .map_or(Repair::Fatal, |table| {
                Repair::Remove(vec![table.to_uppercase()])
            });
    }

    if message.starts_with(D3_RELEASE_PREFIX) {
        // ... does not include the following tables: A,B.
        let tables: Vec<String> = message
            .trim_matches('.')
            .split_whitespace()
            .last()
            .into_iter()
            .flat_map(|list| list.split(','))
            .map(str::trim)
            .filter(|table| !table.is_empty())
            .map(str::to_uppercase)
            .collect();

        return if tables.is_empty() {
            Repair::Fatal
        } else {
            Repair::Remove(tables)
        };
    }

    Repair::Fatal
}

/// Removes `removed` from `tables` (case-insensitively), keeping order.
pub fn strip_tables(tables: &mut Vec<String>, removed: &[String]) {
    tables.retain(|table| !removed.iter().any(|r| r.eq_ignore_ascii_case(table)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_undefined_relation() {
        let message = "(psycopg2.errors.UndefinedTable) relation \"b01001_moe\" does not exist";
        assert_eq!(classify(message), Repair::Remove(vec!["B01001".to_string()]));
    }

    #[test]
    fn reads_d3_release_list() {
        let message = "The Data Driven Detroit release d3_2022 does not include the following tables: foreclosures,vacancy.";
        assert_eq!(
            classify(message),
            Repair::Remove(vec!["FORECLOSURES".to_string(), "VACANCY".to_string()])
        );
    }

    #[test]
    fn other_messages_are_fatal() {
        assert_eq!(classify("Internal Server Error"), Repair::Fatal);
        assert_eq!(classify("(psycopg2.errors.UndefinedTable) no quotes"), Repair::Fatal);
    }

    #[test]
    fn strip_keeps_order() {
        let mut tables = vec![
            "B01001".to_string(),
            "b19013".to_string(),
            "B25001".to_string(),
        ];
        strip_tables(&mut tables, &["B19013".to_string()]);
        assert_eq!(tables, vec!["B01001", "B25001"]);
    }
}
