//! Functional group masks
//!
//! A functional group is a named set of land-cover class codes. Matching
//! is exact integer equality; there are no ranges.

use crate::maybe_rayon::*;
use covergis_core::raster::Raster;
use covergis_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Named set of class codes with a display colour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalGroup {
    pub name: String,
    pub codes: Vec<i32>,
    /// `#rrggbb`
    pub color: String,
}

impl FunctionalGroup {
    pub fn new(name: impl Into<String>, codes: Vec<i32>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes,
            color: color.into(),
        }
    }

    pub fn contains(&self, code: i32) -> bool {
        self.codes.contains(&code)
    }
}

/// Binary mask: 1 where the class code is in `codes`, 0 elsewhere.
///
/// No-data pixels are 0 unless the no-data value itself is listed.
pub fn group_mask(band: &Raster<i32>, codes: &[i32]) -> Result<Raster<u8>> {
    let (rows, cols) = band.shape();
    let view = band.view();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            view.row(row)
                .iter()
                .map(|v| u8::from(codes.contains(v)))
                .collect::<Vec<u8>>()
        })
        .collect();

    let mut output = band.with_same_meta::<u8>();
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
