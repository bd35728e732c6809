//! Transition layers and their composition
//!
//! One layer per period and direction marks the pixels that moved from the
//! source group to the target group with that period's code. Layers are
//! composed with blend semantics: a later layer overwrites only the pixels
//! it covers (code != 0), so a pixel that changed in several periods keeps
//! the latest one.

use super::transition::{Period, TransitionCode, TransitionType};
use crate::maybe_rayon::*;
use covergis_core::io::TableRow;
use covergis_core::raster::Raster;
use covergis_core::{Error, Result};
use ndarray::Array2;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Code where `from_mask` is set at the start and `to_mask` at the end,
/// 0 elsewhere.
pub fn coded_layer(from_mask: &Raster<u8>, to_mask: &Raster<u8>, code: TransitionCode) -> Result<Raster<i32>> {
    from_mask.ensure_same_grid(to_mask)?;
    let (rows, cols) = from_mask.shape();
    let (from, to) = (from_mask.view(), to_mask.view());
    let value = code.value();

    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            from.row(row)
                .iter()
                .zip(to.row(row).iter())
                .map(|(&f, &t)| if f == 1 && t == 1 { value } else { 0 })
                .collect::<Vec<i32>>()
        })
        .collect();

    let mut output = from_mask.with_same_meta::<i32>();
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Overlay `top` on `base`: non-zero cells of `top` win.
pub fn blend(base: &Raster<i32>, top: &Raster<i32>) -> Result<Raster<i32>> {
    base.ensure_same_grid(top)?;
    let mut out = base.clone();
    ndarray::Zip::from(out.data_mut())
        .and(top.data())
        .for_each(|b, &t| {
            if t != 0 {
                *b = t;
            }
        });
    Ok(out)
}

/// Blend layers in order onto an all-zero raster on the grid of the first.
///
/// Returns `None` for an empty sequence.
pub fn fold_layers<I>(layers: I) -> Result<Option<Raster<i32>>>
where
    I: IntoIterator<Item = Raster<i32>>,
{
    let mut acc: Option<Raster<i32>> = None;
    for layer in layers {
        acc = Some(match acc {
            None => blend(&layer.like(0), &layer)?,
            Some(current) => blend(&current, &layer)?,
        });
    }
    Ok(acc)
}

/// Area of one transition type in one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub period: String,
    pub start_year: u16,
    pub end_year: u16,
    pub transition_type: TransitionType,
    #[serde(serialize_with = "two_decimals")]
    pub area_ha: f64,
}

impl TableRow for TransitionRecord {
    const COLUMNS: &'static [&'static str] =
        &["period", "start_year", "end_year", "transition_type", "area_ha"];
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}", value))
}

/// Turn per-code areas of a transition raster into table rows.
///
/// Every code must decode. Rows are sorted by start year, then type. With
/// `emit_empty`, each period × type pair absent from `areas` becomes a
/// zero-area row.
pub fn transition_records(
    areas: &BTreeMap<i32, f64>,
    periods: &[Period],
    emit_empty: bool,
) -> Result<Vec<TransitionRecord>> {
    let mut rows: BTreeMap<(u16, u16, TransitionType), f64> = BTreeMap::new();

    for (&code, &area_ha) in areas {
        let key = TransitionCode::decode(code)?;
        *rows.entry(key).or_insert(0.0) += area_ha;
    }

    if emit_empty {
        for period in periods {
            for kind in TransitionType::ALL {
                rows.entry((period.start, period.end, kind)).or_insert(0.0);
            }
        }
    }

    Ok(rows
        .into_iter()
        .map(|((start_year, end_year, transition_type), area_ha)| TransitionRecord {
            period: Period::new(start_year, end_year).label(),
            start_year,
            end_year,
            transition_type,
            area_ha,
        })
        .collect())
}
