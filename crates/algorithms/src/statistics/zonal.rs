//! Zonal area
//!
//! Sums true pixel area for each zone of an integer zone raster, such as
//! a coded transition raster. Zone 0 is "no zone" and is skipped.

use crate::landcover::{AoiMask, PixelAreaModel, M2_PER_HECTARE};
use crate::maybe_rayon::*;
use covergis_core::raster::Raster;
use covergis_core::{Error, Result};
use std::collections::BTreeMap;

/// Area of one zone
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneArea {
    pub pixel_count: usize,
    pub area_ha: f64,
}

/// Area per zone inside the AOI, keyed by zone value in ascending order.
///
/// Pixels that are 0, no-data or outside the AOI do not count.
pub fn zonal_area(
    zones: &Raster<i32>,
    aoi: &AoiMask,
    model: &PixelAreaModel,
) -> Result<BTreeMap<i32, ZoneArea>> {
    let (rows, cols) = zones.shape();
    zones.ensure_same_grid(aoi.mask())?;
    if model.rows() != rows {
        return Err(Error::SizeMismatch {
            er: model.rows(),
            ec: cols,
            ar: rows,
            ac: cols,
        });
    }

    let nodata = zones.nodata();
    let values = zones.view();
    let inside = aoi.mask().view();

    // one small map per row, merged in row order
    let per_row: Vec<BTreeMap<i32, usize>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut counts = BTreeMap::new();
            for (&zone, &a) in values.row(row).iter().zip(inside.row(row).iter()) {
                if zone == 0 || a == 0 || Some(zone) == nodata {
                    continue;
                }
                *counts.entry(zone).or_insert(0usize) += 1;
            }
            counts
        })
        .collect();

    let mut result: BTreeMap<i32, ZoneArea> = BTreeMap::new();
    for (row, counts) in per_row.into_iter().enumerate() {
        let cell_ha = model.row_area_m2(row) / M2_PER_HECTARE;
        for (zone, count) in counts {
            let entry = result.entry(zone).or_default();
            entry.pixel_count += count;
            entry.area_ha += count as f64 * cell_ha;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use covergis_core::GeoTransform;

    fn zones() -> Raster<i32> {
        let values = vec![
            198519901, 198519901, 0,
            199019952, 0, 198519901,
            -1, 199019952, 199019952,
        ];
        let mut r = Raster::from_vec(values, 3, 3).unwrap();
        r.set_transform(GeoTransform::new(0.0, 300.0, 100.0, -100.0));
        r.set_nodata(Some(-1));
        r
    }

    #[test]
    fn test_zonal_area_by_code() {
        let z = zones();
        let model = PixelAreaModel::from_grid(&z);
        let areas = zonal_area(&z, &AoiMask::full(&z), &model).unwrap();

        assert_eq!(areas.len(), 2);
        let loss = areas[&198519901];
        assert_eq!(loss.pixel_count, 3);
        assert_relative_eq!(loss.area_ha, 3.0);
        assert_relative_eq!(areas[&199019952].area_ha, 3.0);
        assert!(!areas.contains_key(&0));
        assert!(!areas.contains_key(&-1));
    }

    #[test]
    fn test_zonal_area_outside_aoi() {
        let z = zones();
        let model = PixelAreaModel::from_grid(&z);
        let mut inside = z.with_same_meta::<u8>();
        inside.set(0, 0, 1).unwrap();
        let areas = zonal_area(&z, &AoiMask::from_mask(inside), &model).unwrap();

        assert_eq!(areas.len(), 1);
        assert_eq!(areas[&198519901].pixel_count, 1);
    }

    #[test]
    fn test_zonal_area_grid_mismatch() {
        let z = zones();
        let other = Raster::filled(2, 2, 1u8);
        let model = PixelAreaModel::from_grid(&z);
        assert!(zonal_area(&z, &AoiMask::from_mask(other), &model).is_err());
    }
}
