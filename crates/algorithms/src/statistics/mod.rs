//! Statistical reductions over raster data
//!
//! - **zonal**: area per zone of an integer zone raster

pub mod zonal;

pub use zonal::{zonal_area, ZoneArea};
