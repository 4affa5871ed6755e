//! Census summary levels.
//!
//! The first three characters of a full GEOID (e.g. `"14000US26163500100"`)
//! are its summary level code. Levels are ranked in the fixed order below;
//! the hierarchy resolver sorts geographies by this rank (highest rank
//! first) to work from the queried geography upward.

/// Summary level code of metropolitan statistical areas. Metro areas are
/// traversed but not emitted in lineages.
pub const METRO_AREA_CODE: &str = "310";

/// A summary level from the rank table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SummaryLevel {
    /// `040`
    State,
    /// `310`
    Msa,
    /// `050`
    County,
    /// `060`
    CountySubdivision,
    /// `160`
    Place,
    /// `140`
    Tract,
    /// `150`
    BlockGroup,
    /// `500`
    CongressionalDistrict,
    /// `610`
    StateSenateDistrict,
    /// `620`
    StateHouseDistrict,
    /// `860`
    Zcta,
    /// `950`
    ElementarySchoolDistrict,
    /// `960`
    HighSchoolDistrict,
    /// `970`
    UnifiedSchoolDistrict,
}

impl SummaryLevel {
    /// All levels in rank order.
    pub const ALL: [Self; 14] = [
        Self::State,
        Self::Msa,
        Self::County,
        Self::CountySubdivision,
        Self::Place,
        Self::Tract,
        Self::BlockGroup,
        Self::CongressionalDistrict,
        Self::StateSenateDistrict,
        Self::StateHouseDistrict,
        Self::Zcta,
        Self::ElementarySchoolDistrict,
        Self::HighSchoolDistrict,
        Self::UnifiedSchoolDistrict,
    ];

    /// Three-digit summary level code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::State => "040",
            Self::Msa => METRO_AREA_CODE,
            Self::County => "050",
            Self::CountySubdivision => "060",
            Self::Place => "160",
            Self::Tract => "140",
            Self::BlockGroup => "150",
            Self::CongressionalDistrict => "500",
            Self::StateSenateDistrict => "610",
            Self::StateHouseDistrict => "620",
            Self::Zcta => "860",
            Self::ElementarySchoolDistrict => "950",
            Self::HighSchoolDistrict => "960",
            Self::UnifiedSchoolDistrict => "970",
        }
    }

    /// Snake-case name, used as the relation label in profiles.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Msa => "msa",
            Self::County => "county",
            Self::CountySubdivision => "county_subdivision",
            Self::Place => "place",
            Self::Tract => "tract",
            Self::BlockGroup => "block_group",
            Self::CongressionalDistrict => "congressional_district",
            Self::StateSenateDistrict => "state_senate_district",
            Self::StateHouseDistrict => "state_house_district",
            Self::Zcta => "zcta",
            Self::ElementarySchoolDistrict => "elementary_school_district",
            Self::HighSchoolDistrict => "high_school_district",
            Self::UnifiedSchoolDistrict => "unified_school_district",
        }
    }

    /// Position in the rank table.
    #[must_use]
    pub const fn rank(self) -> usize {
        self as usize
    }

    /// Looks up a level by its three-digit code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.code() == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_follows_table_order() {
        for (i, level) in SummaryLevel::ALL.iter().enumerate() {
            assert_eq!(level.rank(), i);
        }
        assert!(SummaryLevel::State.rank() < SummaryLevel::Tract.rank());
    }

    #[test]
    fn codes_round_trip() {
        for level in SummaryLevel::ALL {
            assert_eq!(SummaryLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(SummaryLevel::from_code("010"), None);
    }
}
