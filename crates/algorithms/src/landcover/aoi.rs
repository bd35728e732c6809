//! AOI rasterisation and clipping
//!
//! A pixel belongs to the AOI when its centre lies inside the polygon
//! (holes excluded). The mask is computed once per grid and reused for
//! every year and every area reduction.

use crate::maybe_rayon::*;
use covergis_core::raster::Raster;
use covergis_core::vector::Aoi;
use covergis_core::{Error, RasterElement, Result};
use geo::{BoundingRect, Contains, Point};
use ndarray::Array2;

/// Binary AOI mask on a raster grid (1 = inside)
#[derive(Debug, Clone)]
pub struct AoiMask {
    mask: Raster<u8>,
    inside: usize,
}

impl AoiMask {
    /// Rasterise `aoi` onto the grid of `grid`.
    ///
    /// Fails with [`Error::AoiOutsideRaster`] when no pixel centre falls
    /// inside the polygon.
    pub fn rasterize<T: RasterElement>(aoi: &Aoi, grid: &Raster<T>) -> Result<Self> {
        let (rows, cols) = grid.shape();
        let geometry = aoi.geometry();
        let Some(bbox) = geometry.bounding_rect() else {
            return Err(Error::AoiOutsideRaster {
                name: aoi.name.clone(),
            });
        };
        let (min, max) = (bbox.min(), bbox.max());
        let transform = *grid.transform();

        let data: Vec<u8> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![0u8; cols];
                let (_, y) = transform.pixel_to_geo(0, row);
                if y < min.y || y > max.y {
                    return row_data;
                }
                for (col, cell) in row_data.iter_mut().enumerate() {
                    let (x, _) = transform.pixel_to_geo(col, row);
                    if x >= min.x && x <= max.x && geometry.contains(&Point::new(x, y)) {
                        *cell = 1;
                    }
                }
                row_data
            })
            .collect();

        let inside = data.iter().filter(|&&v| v == 1).count();
        if inside == 0 {
            return Err(Error::AoiOutsideRaster {
                name: aoi.name.clone(),
            });
        }

        let mut mask = grid.with_same_meta::<u8>();
        *mask.data_mut() =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self { mask, inside })
    }

    /// Wrap a precomputed mask; any non-zero cell is inside
    pub fn from_mask(mask: Raster<u8>) -> Self {
        let mask = mask.map(|v| u8::from(v != 0));
        let inside = mask.data().iter().filter(|&&v| v == 1).count();
        Self { mask, inside }
    }

    /// Mask covering the whole grid
    pub fn full<T: RasterElement>(grid: &Raster<T>) -> Self {
        let mut mask = grid.with_same_meta::<u8>();
        mask.data_mut().fill(1);
        let inside = mask.len();
        Self { mask, inside }
    }

    /// Whether pixel (row, col) is inside; out-of-grid indices are outside
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get(row, col).map(|v| v == 1).unwrap_or(false)
    }

    pub fn mask(&self) -> &Raster<u8> {
        &self.mask
    }

    /// Number of pixels inside the AOI
    pub fn pixel_count(&self) -> usize {
        self.inside
    }

    /// Set every pixel outside the AOI to the band's nodata (0 if none).
    pub fn clip(&self, band: &Raster<i32>) -> Result<Raster<i32>> {
        self.mask.ensure_same_grid(band)?;
        let fill = band.nodata().unwrap_or(0);
        let mut out = band.clone();
        ndarray::Zip::from(out.data_mut())
            .and(self.mask.data())
            .for_each(|v, &m| {
                if m == 0 {
                    *v = fill;
                }
            });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covergis_core::vector::Feature;
    use covergis_core::GeoTransform;
    use geo::polygon;

    /// 4x4 grid of unit cells covering x 0..4, y 0..4
    fn grid() -> Raster<i32> {
        let mut r = Raster::from_vec((1..=16).collect(), 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r
    }

    fn aoi(feature: Feature) -> Aoi {
        Aoi {
            name: "Chiquitano".into(),
            feature,
        }
    }

    #[test]
    fn test_rasterize_left_half() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 4.0), (x: 0.0, y: 4.0)];
        let mask = AoiMask::rasterize(&aoi(Feature::from_polygon(poly)), &grid()).unwrap();

        assert_eq!(mask.pixel_count(), 8);
        assert!(mask.contains(0, 0));
        assert!(mask.contains(3, 1));
        assert!(!mask.contains(0, 2));
        assert!(!mask.contains(9, 9));
    }

    #[test]
    fn test_rasterize_excludes_hole() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]],
        );
        let mask = AoiMask::rasterize(&aoi(Feature::from_polygon(poly)), &grid()).unwrap();

        assert_eq!(mask.pixel_count(), 12);
        assert!(!mask.contains(1, 1));
        assert!(!mask.contains(2, 2));
        assert!(mask.contains(0, 0));
    }

    #[test]
    fn test_rasterize_outside_grid() {
        let poly = polygon![(x: 10.0, y: 10.0), (x: 12.0, y: 10.0), (x: 12.0, y: 12.0)];
        let err = AoiMask::rasterize(&aoi(Feature::from_polygon(poly)), &grid()).unwrap_err();
        assert!(matches!(err, Error::AoiOutsideRaster { .. }));
    }

    #[test]
    fn test_clip_uses_nodata() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 4.0), (x: 0.0, y: 4.0)];
        let mut band = grid();
        let mask = AoiMask::rasterize(&aoi(Feature::from_polygon(poly)), &band).unwrap();

        let clipped = mask.clip(&band).unwrap();
        assert_eq!(clipped.get(0, 0).unwrap(), 1);
        assert_eq!(clipped.get(0, 3).unwrap(), 0);
        assert_eq!(clipped.transform(), band.transform());

        band.set_nodata(Some(-1));
        let clipped = mask.clip(&band).unwrap();
        assert_eq!(clipped.get(0, 3).unwrap(), -1);
    }

    #[test]
    fn test_clip_is_idempotent() {
        let poly = polygon![(x: 0.5, y: 0.5), (x: 3.5, y: 0.5), (x: 2.0, y: 3.5)];
        let band = grid();
        let mask = AoiMask::rasterize(&aoi(Feature::from_polygon(poly)), &band).unwrap();

        let once = mask.clip(&band).unwrap();
        let twice = mask.clip(&once).unwrap();
        assert_eq!(once.data(), twice.data());
    }

    #[test]
    fn test_from_mask_normalises() {
        let raster = Raster::from_vec(vec![0u8, 3, 1, 0], 2, 2).unwrap();
        let mask = AoiMask::from_mask(raster);
        assert_eq!(mask.pixel_count(), 2);
        assert_eq!(mask.mask().get(0, 1).unwrap(), 1);
    }

    #[test]
    fn test_full_mask() {
        let mask = AoiMask::full(&grid());
        assert_eq!(mask.pixel_count(), 16);
        assert!(mask.contains(3, 3));
    }
}
