//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};
use std::collections::BTreeMap;

/// Largest transform difference accepted between grids, as a fraction of a pixel
pub const GRID_TOLERANCE: f64 = 1e-3;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// its geotransform, CRS and no-data value. Derived rasters (masks, coded
/// transition layers) are new values built with [`Raster::map`] or
/// [`Raster::with_same_meta`]; nothing mutates a raster after it has been
/// handed to an analysis step.
///
/// # Example
///
/// ```ignore
/// use covergis_core::Raster;
///
/// let classes: Raster<i32> = Raster::filled(2, 2, 3);
/// let forest = classes.map(|v| u8::from(v == 3));
/// assert_eq!(forest.get(0, 0)?, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values, indexed (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Zero-filled raster of another element type on the same grid
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    /// Same grid and metadata, every cell set to `fill_value`
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
        }
    }

    /// Cell-wise transform into a new raster on the same grid.
    ///
    /// The output carries no no-data value; callers encode "absent" in the
    /// mapped value itself (0 for masks and transition codes).
    pub fn map<U, F>(&self, f: F) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U,
    {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail unless `other` has the same shape (`SizeMismatch`) and the same
    /// georeferencing within a thousandth of a pixel (`GridMismatch`)
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        let t = &self.transform;
        let tol = GRID_TOLERANCE * t.pixel_width.abs().min(t.pixel_height.abs());
        if !t.approx_eq(other.transform(), tol) {
            return Err(Error::GridMismatch {
                expected: *t,
                actual: *other.transform(),
            });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Center coordinates of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Check if a value is no-data for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }
}

impl<T: RasterElement + Ord> Raster<T> {
    /// Pixel count per distinct value, no-data excluded
    pub fn class_counts(&self) -> BTreeMap<T, usize> {
        let mut counts = BTreeMap::new();
        for &value in self.data.iter() {
            if !self.is_nodata(value) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<i32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<i32> = Raster::new(10, 10);
        raster.set(5, 5, 42).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42);
        assert!(raster.get(10, 0).is_err());
        assert!(raster.set(0, 10, 1).is_err());
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(Raster::<i32>::from_vec(vec![1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_map_keeps_grid() {
        let mut classes = Raster::from_vec(vec![3, 15, 3, 0], 2, 2).unwrap();
        classes.set_transform(GeoTransform::new(-60.0, -16.0, 0.25, -0.25));
        classes.set_crs(Some(CRS::wgs84()));

        let forest = classes.map(|v| u8::from(v == 3));
        assert_eq!(forest.transform(), classes.transform());
        assert_eq!(forest.crs(), Some(&CRS::wgs84()));
        assert_eq!(forest.data().iter().copied().collect::<Vec<_>>(), vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_class_counts_skip_nodata() {
        let mut classes = Raster::from_vec(vec![3, 15, 3, 0], 2, 2).unwrap();
        classes.set_nodata(Some(0));
        let counts = classes.class_counts();
        assert_eq!(counts.get(&3), Some(&2));
        assert_eq!(counts.get(&15), Some(&1));
        assert!(!counts.contains_key(&0));
    }

    #[test]
    fn test_ensure_same_grid() {
        let a: Raster<i32> = Raster::new(3, 3);
        let b: Raster<u8> = Raster::new(3, 4);
        assert!(a.ensure_same_grid(&a.with_same_meta::<u8>()).is_ok());
        assert!(matches!(
            a.ensure_same_grid(&b),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_ensure_same_grid_checks_transform() {
        let mut a: Raster<i32> = Raster::new(2, 2);
        a.set_transform(GeoTransform::new(500_000.0, 8_000_060.0, 30.0, -30.0));

        let mut shifted = a.with_same_meta::<i32>();
        shifted.set_transform(GeoTransform::new(510_000.0, 8_000_060.0, 30.0, -30.0));
        assert!(matches!(
            a.ensure_same_grid(&shifted),
            Err(Error::GridMismatch { .. })
        ));

        let mut coarser = a.with_same_meta::<i32>();
        coarser.set_transform(GeoTransform::new(500_000.0, 8_000_060.0, 60.0, -60.0));
        assert!(a.ensure_same_grid(&coarser).is_err());

        // rounding noise from a file round trip is tolerated
        let mut noisy = a.with_same_meta::<i32>();
        noisy.set_transform(GeoTransform::new(500_000.000_001, 8_000_060.0, 30.0, -30.0));
        assert!(a.ensure_same_grid(&noisy).is_ok());
    }
}
