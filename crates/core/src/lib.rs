//! # CoverGis Core
//!
//! Core types and I/O for land-cover change analysis.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform` and `CRS` for georeferencing
//! - Polygonal features and area-of-interest selection
//! - GeoTIFF (multi-page, mode overviews), GeoJSON and CSV I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result, ResultExt};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{Aoi, AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{Aoi, Feature, FeatureCollection};
}
