//! Transition codes and analysis periods
//!
//! A transition pixel value packs the period and the direction of change
//! into one integer:
//!
//! ```text
//! code = (start_year * 10000 + end_year) * 10 + type
//! ```
//!
//! so `(1985, 1990, ForestToAgropastoral)` becomes `198519901`. Years are
//! limited to four digits; the largest legal code, `999999992`, fits `i32`.

use covergis_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest year the packing can hold
pub const MAX_YEAR: u16 = 9999;

/// Direction of a land-cover transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    /// Forest in the start year, agropastoral in the end year (loss)
    ForestToAgropastoral = 1,
    /// Agropastoral in the start year, forest in the end year (gain)
    AgropastoralToForest = 2,
}

impl TransitionType {
    pub const ALL: [TransitionType; 2] = [
        TransitionType::ForestToAgropastoral,
        TransitionType::AgropastoralToForest,
    ];

    /// Digit stored in the last place of the code
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            TransitionType::ForestToAgropastoral => "forest_to_agropastoral",
            TransitionType::AgropastoralToForest => "agropastoral_to_forest",
        }
    }
}

impl TryFrom<i32> for TransitionType {
    type Error = Error;

    fn try_from(kind: i32) -> Result<Self> {
        match kind {
            1 => Ok(TransitionType::ForestToAgropastoral),
            2 => Ok(TransitionType::AgropastoralToForest),
            other => Err(Error::UnknownTransitionType {
                code: other as i64,
                kind: other as i64,
            }),
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A packed transition pixel value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionCode(i32);

impl TransitionCode {
    /// Pack a period and a transition type.
    ///
    /// Fails with [`Error::YearOutOfRange`] when either year has more than
    /// four digits.
    pub fn encode(start_year: u16, end_year: u16, kind: TransitionType) -> Result<Self> {
        for year in [start_year, end_year] {
            if year > MAX_YEAR {
                return Err(Error::YearOutOfRange { year: year as u32 });
            }
        }
        let packed = (start_year as i32 * 10_000 + end_year as i32) * 10 + kind.code();
        Ok(TransitionCode(packed))
    }

    /// Unpack a raw code into `(start_year, end_year, type)`.
    ///
    /// The type digit must be 1 or 2; anything else, including codes
    /// `<= 0`, is [`Error::UnknownTransitionType`].
    pub fn decode(raw: i32) -> Result<(u16, u16, TransitionType)> {
        let kind = raw % 10;
        if raw <= 0 || !(1..=2).contains(&kind) {
            return Err(Error::UnknownTransitionType {
                code: raw as i64,
                kind: kind as i64,
            });
        }
        let years = raw / 10;
        let start = years / 10_000;
        let end = years % 10_000;
        if start > MAX_YEAR as i32 {
            return Err(Error::YearOutOfRange { year: start as u32 });
        }
        Ok((start as u16, end as u16, TransitionType::try_from(kind)?))
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for TransitionCode {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self> {
        TransitionCode::decode(raw).map(|_| TransitionCode(raw))
    }
}

impl From<TransitionCode> for i32 {
    fn from(code: TransitionCode) -> i32 {
        code.0
    }
}

impl fmt::Display for TransitionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An analysis interval `[start, end]` between two classified years.
///
/// Written in TOML as a two-element array, `[1985, 1990]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u16, u16)", into = "(u16, u16)")]
pub struct Period {
    pub start: u16,
    pub end: u16,
}

impl Period {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// `"1985-1990"`
    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    pub fn len_years(&self) -> u16 {
        self.end.saturating_sub(self.start)
    }

    pub fn code(&self, kind: TransitionType) -> Result<TransitionCode> {
        TransitionCode::encode(self.start, self.end, kind)
    }
}

impl From<(u16, u16)> for Period {
    fn from((start, end): (u16, u16)) -> Self {
        Period::new(start, end)
    }
}

impl From<Period> for (u16, u16) {
    fn from(p: Period) -> Self {
        (p.start, p.end)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The eight fixed intervals of the 1985-2023 Chiquitano analysis
pub fn default_periods() -> Vec<Period> {
    [
        (1985, 1990),
        (1990, 1995),
        (1995, 2000),
        (2000, 2005),
        (2005, 2010),
        (2010, 2015),
        (2015, 2018),
        (2018, 2023),
    ]
    .into_iter()
    .map(Period::from)
    .collect()
}

/// Check that `periods` are ordered, contiguous and exactly cover
/// `[first, last]`.
pub fn validate_periods(periods: &[Period], first: u16, last: u16) -> Result<()> {
    let (Some(head), Some(tail)) = (periods.first(), periods.last()) else {
        return Err(Error::InvalidConfig("no periods configured".into()));
    };

    for p in periods {
        if p.start >= p.end {
            return Err(Error::InvalidConfig(format!(
                "period {} does not advance in time",
                p
            )));
        }
    }
    for pair in periods.windows(2) {
        if pair[0].end != pair[1].start {
            return Err(Error::InvalidConfig(format!(
                "periods {} and {} are not contiguous",
                pair[0], pair[1]
            )));
        }
    }
    if head.start != first || tail.end != last {
        return Err(Error::InvalidConfig(format!(
            "periods span {}-{} but the analysis covers {}-{}",
            head.start, tail.end, first, last
        )));
    }
    Ok(())
}
