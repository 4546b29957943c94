use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-year land-cover category assigned by the upstream classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum LandCover {
    NonVegetated = 0,
    Senesced = 1,
    Evergreen = 2,
}

impl LandCover {
    pub const ALL: [LandCover; 3] = [LandCover::NonVegetated, LandCover::Senesced, LandCover::Evergreen];

    /// `None` for codes outside the classifier's enumeration.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LandCover::NonVegetated),
            1 => Some(LandCover::Senesced),
            2 => Some(LandCover::Evergreen),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Composite multi-year label. Codes 0..=6 are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StabilityClass {
    /// No rule matched, or an input code was out of domain.
    Unclassified = 0,
    StableNonVegetated = 1,
    StableSenesced = 2,
    StableEvergreen = 3,
    /// Evergreen in at least one year, senesced in at least one other.
    EvergreenSenesced = 4,
    /// Non-vegetated in at least one year, never evergreen.
    NonVegetatedMixed = 5,
    /// Non-vegetated in at least one year, evergreen in another.
    NonVegetatedEvergreen = 6,
}

impl StabilityClass {
    pub const ALL: [StabilityClass; 7] = [
        StabilityClass::Unclassified,
        StabilityClass::StableNonVegetated,
        StabilityClass::StableSenesced,
        StabilityClass::StableEvergreen,
        StabilityClass::EvergreenSenesced,
        StabilityClass::NonVegetatedMixed,
        StabilityClass::NonVegetatedEvergreen,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            StabilityClass::Unclassified => "unclassified",
            StabilityClass::StableNonVegetated => "stable non-vegetated",
            StabilityClass::StableSenesced => "stable senesced",
            StabilityClass::StableEvergreen => "stable evergreen",
            StabilityClass::EvergreenSenesced => "evergreen/senesced",
            StabilityClass::NonVegetatedMixed => "non-vegetated/senesced",
            StabilityClass::NonVegetatedEvergreen => "non-vegetated/evergreen",
        }
    }

    pub fn is_stable(self) -> bool {
        matches!(
            self,
            StabilityClass::StableNonVegetated | StabilityClass::StableSenesced | StabilityClass::StableEvergreen
        )
    }
}

impl fmt::Display for StabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}
