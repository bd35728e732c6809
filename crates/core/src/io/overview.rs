//! Overview (pyramid) generation for categorical rasters

use crate::error::Result;
use crate::raster::{GeoTransform, Raster};
use std::collections::HashMap;

/// Downsample a categorical raster by `factor` using the block mode.
///
/// Each output cell takes the most frequent valid value of its
/// `factor` x `factor` input block. Ties go to the smaller value so the
/// result does not depend on iteration order. A block with no valid cell
/// becomes the raster's no-data value (0 when none is declared).
pub fn mode_downsample(raster: &Raster<i32>, factor: usize) -> Result<Raster<i32>> {
    let factor = factor.max(1);
    let (rows, cols) = raster.shape();
    let out_rows = rows.div_ceil(factor);
    let out_cols = cols.div_ceil(factor);
    let fill = raster.nodata().unwrap_or(0);

    let mut data = Vec::with_capacity(out_rows * out_cols);
    let mut counts: HashMap<i32, usize> = HashMap::new();

    for orow in 0..out_rows {
        for ocol in 0..out_cols {
            counts.clear();
            let row_end = ((orow + 1) * factor).min(rows);
            let col_end = ((ocol + 1) * factor).min(cols);
            for row in orow * factor..row_end {
                for col in ocol * factor..col_end {
                    let v = raster.data()[(row, col)];
                    if v != fill && !raster.is_nodata(v) {
                        *counts.entry(v).or_insert(0) += 1;
                    }
                }
            }
            let majority = counts
                .iter()
                .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then(vb.cmp(va)))
                .map(|(v, _)| *v)
                .unwrap_or(fill);
            data.push(majority);
        }
    }

    let gt = raster.transform();
    let mut out = Raster::from_vec(data, out_rows, out_cols)?;
    out.set_transform(GeoTransform::new(
        gt.origin_x,
        gt.origin_y,
        gt.pixel_width * factor as f64,
        gt.pixel_height * factor as f64,
    ));
    out.set_crs(raster.crs().copied());
    out.set_nodata(raster.nodata());
    Ok(out)
}

/// Overview levels 2, 4, 8, ... up to `levels` entries.
///
/// Stops once the previous level has shrunk to a single cell.
pub fn build_overviews(raster: &Raster<i32>, levels: u32) -> Result<Vec<Raster<i32>>> {
    let mut overviews = Vec::new();
    let (rows, cols) = raster.shape();
    for level in 1..=levels.min(30) {
        let factor = 1usize << level;
        if factor / 2 >= rows.max(cols) {
            break;
        }
        overviews.push(mode_downsample(raster, factor)?);
    }
    Ok(overviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use approx::assert_relative_eq;

    #[test]
    fn test_mode_picks_majority() {
        #[rustfmt::skip]
        let values = vec![
            5, 5, 7, 7,
            5, 9, 7, 0,
        ];
        let mut r = Raster::from_vec(values, 2, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 2.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32720)));

        let down = mode_downsample(&r, 2).unwrap();
        assert_eq!(down.shape(), (1, 2));
        assert_eq!(down.get(0, 0).unwrap(), 5);
        // the empty cell does not vote
        assert_eq!(down.get(0, 1).unwrap(), 7);
        assert_relative_eq!(down.transform().pixel_width, 60.0);
        assert_eq!(down.crs(), Some(&CRS::from_epsg(32720)));
    }

    #[test]
    fn test_mode_tie_goes_to_smaller_code() {
        let r = Raster::from_vec(vec![20, 10, 10, 20], 2, 2).unwrap();
        assert_eq!(mode_downsample(&r, 2).unwrap().get(0, 0).unwrap(), 10);
    }

    #[test]
    fn test_mode_empty_block_stays_empty() {
        let r = Raster::from_vec(vec![0, 0, 3, 0, 0, 3], 2, 3).unwrap();
        let down = mode_downsample(&r, 2).unwrap();
        assert_eq!(down.shape(), (1, 2));
        assert_eq!(down.get(0, 0).unwrap(), 0);
        assert_eq!(down.get(0, 1).unwrap(), 3);
    }

    #[test]
    fn test_build_overviews_levels() {
        let r: Raster<i32> = Raster::filled(16, 16, 1);
        let ovs = build_overviews(&r, 3).unwrap();
        let shapes: Vec<_> = ovs.iter().map(|o| o.shape()).collect();
        assert_eq!(shapes, vec![(8, 8), (4, 4), (2, 2)]);
    }
}
