//! Land-cover change analysis
//!
//! Building blocks of the forest / agropastoral change workflow:
//! - Annual stack and per-year band selection clipped to the AOI
//! - Functional group masks from exact class codes
//! - Pixel area model and masked area sums
//! - Transition code packing and analysis periods
//! - Transition layers composed with blend semantics

mod aoi;
mod area;
mod groups;
mod stack;
mod trajectory;
mod transition;

pub use aoi::AoiMask;
pub use area::{
    masked_area_ha, AreaRecord, PixelAreaModel, EARTH_RADIUS_M, M2_PER_HECTARE, METERS_PER_DEGREE,
};
pub use groups::{group_mask, FunctionalGroup};
pub use stack::{band_name, ingest_band_name, select_year, AnnualStack, YearBand};
pub use trajectory::{blend, coded_layer, fold_layers, transition_records, TransitionRecord};
pub use transition::{
    default_periods, validate_periods, Period, TransitionCode, TransitionType, MAX_YEAR,
};
