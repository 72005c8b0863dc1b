//! The fixed 10×6 taxonomy grid: policy areas × analytical dimensions.
//!
//! Every chunk in a Canonical Policy Package belongs to exactly one grid
//! cell, identified as `PAxx-DIMyy`. The grid itself never changes at
//! runtime: all iteration happens in canonical order (areas PA01→PA10,
//! dimensions DIM01→DIM06) so downstream output is reproducible.

use serde::{Deserialize, Serialize};

/// The ten policy areas of a municipal development plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyArea {
    SocialProtection,
    Health,
    Education,
    EconomicDevelopment,
    Infrastructure,
    Environment,
    CitizenSecurity,
    Governance,
    GenderEquality,
    Culture,
}

impl PolicyArea {
    pub const ALL: [PolicyArea; 10] = [
        PolicyArea::SocialProtection,
        PolicyArea::Health,
        PolicyArea::Education,
        PolicyArea::EconomicDevelopment,
        PolicyArea::Infrastructure,
        PolicyArea::Environment,
        PolicyArea::CitizenSecurity,
        PolicyArea::Governance,
        PolicyArea::GenderEquality,
        PolicyArea::Culture,
    ];

    /// Stable wire code, `PA01`..`PA10`.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyArea::SocialProtection => "PA01",
            PolicyArea::Health => "PA02",
            PolicyArea::Education => "PA03",
            PolicyArea::EconomicDevelopment => "PA04",
            PolicyArea::Infrastructure => "PA05",
            PolicyArea::Environment => "PA06",
            PolicyArea::CitizenSecurity => "PA07",
            PolicyArea::Governance => "PA08",
            PolicyArea::GenderEquality => "PA09",
            PolicyArea::Culture => "PA10",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PolicyArea::SocialProtection => "Social protection & poverty reduction",
            PolicyArea::Health => "Health",
            PolicyArea::Education => "Education",
            PolicyArea::EconomicDevelopment => "Economic development & employment",
            PolicyArea::Infrastructure => "Infrastructure & mobility",
            PolicyArea::Environment => "Environment & climate",
            PolicyArea::CitizenSecurity => "Citizen security",
            PolicyArea::Governance => "Governance & institutional capacity",
            PolicyArea::GenderEquality => "Gender equality & inclusion",
            PolicyArea::Culture => "Culture, sport & recreation",
        }
    }

    pub fn from_code(code: &str) -> Option<PolicyArea> {
        PolicyArea::ALL.iter().copied().find(|a| a.code() == code)
    }
}

/// The six analytical dimensions applied to every policy area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    /// Where the municipality stands today: baselines, rates, gaps.
    Diagnostic,
    /// What the plan commits to doing.
    Activities,
    /// Direct deliverables of the activities.
    Outputs,
    /// Changes expected in the population served.
    Outcomes,
    /// Long-term transformation the plan aims at.
    Impact,
    /// The intervention logic connecting all of the above.
    CausalTheory,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Diagnostic,
        Dimension::Activities,
        Dimension::Outputs,
        Dimension::Outcomes,
        Dimension::Impact,
        Dimension::CausalTheory,
    ];

    /// Stable wire code, `DIM01`..`DIM06`.
    pub fn code(&self) -> &'static str {
        match self {
            Dimension::Diagnostic => "DIM01",
            Dimension::Activities => "DIM02",
            Dimension::Outputs => "DIM03",
            Dimension::Outcomes => "DIM04",
            Dimension::Impact => "DIM05",
            Dimension::CausalTheory => "DIM06",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Diagnostic => "Diagnostic baseline",
            Dimension::Activities => "Planned activities",
            Dimension::Outputs => "Outputs",
            Dimension::Outcomes => "Outcomes",
            Dimension::Impact => "Long-term impact",
            Dimension::CausalTheory => "Causal theory",
        }
    }

    pub fn from_code(code: &str) -> Option<Dimension> {
        Dimension::ALL.iter().copied().find(|d| d.code() == code)
    }
}

/// One (policy area, dimension) pair. There are exactly 60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub area: PolicyArea,
    pub dimension: Dimension,
}

impl GridCell {
    pub fn new(area: PolicyArea, dimension: Dimension) -> Self {
        Self { area, dimension }
    }

    /// Chunk identifier for this cell, e.g. `PA03-DIM05`.
    pub fn chunk_id(&self) -> String {
        format!("{}-{}", self.area.code(), self.dimension.code())
    }

    /// Parse a chunk id back into its cell. Returns `None` for anything
    /// outside the 60-cell grid.
    pub fn parse(chunk_id: &str) -> Option<GridCell> {
        let (area_code, dim_code) = chunk_id.split_once('-')?;
        Some(GridCell {
            area: PolicyArea::from_code(area_code)?,
            dimension: Dimension::from_code(dim_code)?,
        })
    }

    /// All 60 cells in canonical order: PA01-DIM01, PA01-DIM02, … PA10-DIM06.
    pub fn all() -> impl Iterator<Item = GridCell> {
        PolicyArea::ALL.iter().flat_map(|&area| {
            Dimension::ALL
                .iter()
                .map(move |&dimension| GridCell { area, dimension })
        })
    }

    /// Total number of grid cells.
    pub const COUNT: usize = 60;
}
