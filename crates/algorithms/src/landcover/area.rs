//! Pixel area and masked area sums
//!
//! Areas are true surface areas in hectares. On a geographic grid the
//! area of a pixel depends on its latitude, so the model keeps one value
//! per row.

use super::aoi::AoiMask;
use crate::maybe_rayon::*;
use covergis_core::io::TableRow;
use covergis_core::raster::Raster;
use covergis_core::{Error, RasterElement, Result};
use serde::Serialize;

/// Authalic earth radius (m)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree at the equator, for nominal resolution checks
pub const METERS_PER_DEGREE: f64 = 111_319.49;

pub const M2_PER_HECTARE: f64 = 10_000.0;

/// Relative tolerance between configured and grid resolution
const RESOLUTION_TOLERANCE: f64 = 0.01;

/// Per-row pixel area of a raster grid
#[derive(Debug, Clone, PartialEq)]
pub struct PixelAreaModel {
    row_area_m2: Vec<f64>,
    nominal_cell_m: f64,
}

impl PixelAreaModel {
    /// Derive pixel areas from the grid's transform and CRS.
    ///
    /// Geographic grids use the spherical cell area
    /// `R² · Δλ · |sin φ_north − sin φ_south|`; every other grid (including
    /// one without a CRS) is taken as metric.
    pub fn from_grid<T: RasterElement>(grid: &Raster<T>) -> Self {
        let transform = grid.transform();
        let geographic = grid.crs().map(|c| c.is_geographic()).unwrap_or(false);

        if geographic {
            let dlon = transform.pixel_width.abs().to_radians();
            let row_area_m2 = (0..grid.rows())
                .map(|row| {
                    let (top, bottom) = transform.row_edges(row);
                    let band = (top.to_radians().sin() - bottom.to_radians().sin()).abs();
                    EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * band
                })
                .collect();
            Self {
                row_area_m2,
                nominal_cell_m: transform.pixel_width.abs() * METERS_PER_DEGREE,
            }
        } else {
            let cell = (transform.pixel_width * transform.pixel_height).abs();
            Self {
                row_area_m2: vec![cell; grid.rows()],
                nominal_cell_m: transform.pixel_width.abs(),
            }
        }
    }

    /// Area of one pixel in `row`, in m²
    pub fn row_area_m2(&self, row: usize) -> f64 {
        self.row_area_m2.get(row).copied().unwrap_or(0.0)
    }

    pub fn rows(&self) -> usize {
        self.row_area_m2.len()
    }

    /// Cell width in nominal metres
    pub fn nominal_cell_m(&self) -> f64 {
        self.nominal_cell_m
    }

    /// Fail with [`Error::ResolutionMismatch`] unless the grid's nominal
    /// cell size is within 1% of `expected_m`.
    pub fn check_resolution(&self, expected_m: f64) -> Result<()> {
        let rel = (self.nominal_cell_m - expected_m).abs() / expected_m;
        if !rel.is_finite() || rel > RESOLUTION_TOLERANCE {
            return Err(Error::ResolutionMismatch {
                expected: expected_m,
                actual: self.nominal_cell_m,
            });
        }
        Ok(())
    }
}

/// Hectares of pixels where `mask == 1` inside the AOI
pub fn masked_area_ha(mask: &Raster<u8>, aoi: &AoiMask, model: &PixelAreaModel) -> Result<f64> {
    mask.ensure_same_grid(aoi.mask())?;
    if model.rows() != mask.rows() {
        return Err(Error::SizeMismatch {
            er: model.rows(),
            ec: mask.cols(),
            ar: mask.rows(),
            ac: mask.cols(),
        });
    }

    let values = mask.view();
    let inside = aoi.mask().view();

    let m2: f64 = (0..mask.rows())
        .into_par_iter()
        .map(|row| {
            let count = values
                .row(row)
                .iter()
                .zip(inside.row(row).iter())
                .filter(|&(&v, &a)| v == 1 && a == 1)
                .count();
            count as f64 * model.row_area_m2(row)
        })
        .sum();

    Ok(m2 / M2_PER_HECTARE)
}

/// Area of one functional group in one year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaRecord {
    pub year: u16,
    pub group: String,
    pub area_ha: f64,
}

impl TableRow for AreaRecord {
    const COLUMNS: &'static [&'static str] = &["year", "group", "area_ha"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use covergis_core::{GeoTransform, CRS};

    fn projected(rows: usize, cols: usize) -> Raster<u8> {
        let mut r = Raster::filled(rows, cols, 1u8);
        r.set_transform(GeoTransform::new(500_000.0, 8_000_000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32720)));
        r
    }

    #[test]
    fn test_projected_pixel_area() {
        let model = PixelAreaModel::from_grid(&projected(2, 2));
        assert_relative_eq!(model.row_area_m2(0), 900.0);
        assert_relative_eq!(model.row_area_m2(1), 900.0);
        model.check_resolution(30.0).unwrap();
    }

    #[test]
    fn test_geographic_equator_cell() {
        // one degree cell straddling the equator
        let mut r = Raster::filled(1, 1, 1u8);
        r.set_transform(GeoTransform::new(0.0, 0.5, 1.0, -1.0));
        r.set_crs(Some(CRS::wgs84()));
        let model = PixelAreaModel::from_grid(&r);

        let expected = EARTH_RADIUS_M.powi(2)
            * 1f64.to_radians()
            * (2.0 * 0.5f64.to_radians().sin());
        assert_relative_eq!(model.row_area_m2(0), expected, max_relative = 1e-12);
        // close to a (111.2 km)² square
        assert_relative_eq!(model.row_area_m2(0), 1.2364e10, max_relative = 1e-3);
    }

    #[test]
    fn test_geographic_area_shrinks_poleward() {
        let deg = 30.0 / METERS_PER_DEGREE;
        let mut r = Raster::filled(3, 1, 1u8);
        r.set_transform(GeoTransform::new(-60.0, -16.0, deg, -deg));
        r.set_crs(Some(CRS::wgs84()));
        let model = PixelAreaModel::from_grid(&r);

        // rows run south, away from the equator
        assert!(model.row_area_m2(1) < model.row_area_m2(0));
        assert!(model.row_area_m2(2) < model.row_area_m2(1));
        assert_relative_eq!(
            model.row_area_m2(0),
            900.0 * 16f64.to_radians().cos(),
            max_relative = 5e-3
        );
        model.check_resolution(30.0).unwrap();
    }

    #[test]
    fn test_resolution_mismatch() {
        let model = PixelAreaModel::from_grid(&projected(2, 2));
        let err = model.check_resolution(10.0).unwrap_err();
        assert!(matches!(err, Error::ResolutionMismatch { .. }));
        assert!(model.check_resolution(30.2).is_ok());
    }

    #[test]
    fn test_masked_area_respects_aoi() {
        let mut mask = projected(2, 2);
        mask.set(0, 1, 0).unwrap();
        let model = PixelAreaModel::from_grid(&mask);

        let full = AoiMask::full(&mask);
        assert_relative_eq!(masked_area_ha(&mask, &full, &model).unwrap(), 0.27);

        let mut aoi_raster = mask.like(1);
        aoi_raster.set(1, 1, 0).unwrap();
        let partial = AoiMask::from_mask(aoi_raster);
        assert_relative_eq!(masked_area_ha(&mask, &partial, &model).unwrap(), 0.18);
    }

    #[test]
    fn test_area_monotonic_in_mask() {
        let model = PixelAreaModel::from_grid(&projected(3, 3));
        let aoi = AoiMask::full(&projected(3, 3));
        let mut mask = projected(3, 3).like(0);
        let mut last = 0.0;
        for i in 0..9 {
            mask.set(i / 3, i % 3, 1).unwrap();
            let area = masked_area_ha(&mask, &aoi, &model).unwrap();
            assert!(area >= last);
            last = area;
        }
        assert_relative_eq!(last, 0.81);
    }
}
