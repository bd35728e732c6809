//! Annual classification stack and band selection

use super::aoi::AoiMask;
use super::transition::MAX_YEAR;
use covergis_core::raster::Raster;
use covergis_core::{Error, Result, CRS};
use std::ops::RangeInclusive;

/// Band name of a selected year, `"Y1985"`
pub fn band_name(year: u16) -> String {
    format!("Y{}", year)
}

/// Band name used by the classification collection, `"classification_1985"`
pub fn ingest_band_name(year: u16) -> String {
    format!("classification_{}", year)
}

/// One classified raster per consecutive year, all on the same grid.
///
/// Band `i` holds year `first_year + i`.
#[derive(Debug, Clone)]
pub struct AnnualStack {
    first_year: u16,
    bands: Vec<Raster<i32>>,
}

impl AnnualStack {
    pub fn new(first_year: u16, bands: Vec<Raster<i32>>) -> Result<Self> {
        let Some(reference) = bands.first() else {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: "0".into(),
                reason: "an annual stack needs at least one band".into(),
            });
        };

        for band in &bands[1..] {
            reference.ensure_same_grid(band)?;
        }

        let last = first_year as u32 + bands.len() as u32 - 1;
        if last > MAX_YEAR as u32 {
            return Err(Error::YearOutOfRange { year: last });
        }

        Ok(Self { first_year, bands })
    }

    pub fn first_year(&self) -> u16 {
        self.first_year
    }

    pub fn last_year(&self) -> u16 {
        self.first_year + (self.bands.len() - 1) as u16
    }

    pub fn years(&self) -> RangeInclusive<u16> {
        self.first_year..=self.last_year()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn contains_year(&self, year: u16) -> bool {
        self.years().contains(&year)
    }

    /// Band for `year`, or [`Error::MissingBand`]
    pub fn band(&self, year: u16) -> Result<&Raster<i32>> {
        if !self.contains_year(year) {
            return Err(self.missing(year));
        }
        Ok(&self.bands[(year - self.first_year) as usize])
    }

    /// The first band, as the reference grid for masks and areas
    pub fn grid(&self) -> &Raster<i32> {
        &self.bands[0]
    }

    pub fn bands(&self) -> &[Raster<i32>] {
        &self.bands
    }

    /// Require every year of `[first, last]` to be present
    pub fn require_years(&self, first: u16, last: u16) -> Result<()> {
        match (first..=last).find(|y| !self.contains_year(*y)) {
            Some(year) => Err(self.missing(year)),
            None => Ok(()),
        }
    }

    /// Assign `crs` to bands read without one
    pub fn with_default_crs(mut self, crs: CRS) -> Self {
        for band in &mut self.bands {
            if band.crs().is_none() {
                band.set_crs(Some(crs));
            }
        }
        self
    }

    fn missing(&self, year: u16) -> Error {
        Error::MissingBand {
            year,
            first: self.first_year,
            last: self.last_year(),
        }
    }
}

/// A band selected for one year and clipped to the AOI
#[derive(Debug, Clone)]
pub struct YearBand {
    pub name: String,
    pub year: u16,
    pub raster: Raster<i32>,
}

/// Select the classification for `year`, clipped to the AOI and renamed
/// to `Y<year>`.
pub fn select_year(stack: &AnnualStack, year: u16, aoi: &AoiMask) -> Result<YearBand> {
    let band = stack.band(year)?;
    Ok(YearBand {
        name: band_name(year),
        year,
        raster: aoi.clip(band)?,
    })
}
