//! # CoverGis Algorithms
//!
//! Forest / agropastoral land-cover change analysis over an annual
//! classification stack.
//!
//! ## Modules
//!
//! - **landcover**: band selection, group masks, pixel area, transition codes and layers
//! - **statistics**: zonal area per code
//! - **config**: TOML analysis configuration
//! - **backend**: the raster backend trait and the in-memory backend
//! - **pipeline**: orchestration of area and transition products
//! - **export**: writing products to an output directory

pub mod backend;
pub mod config;
pub mod export;
pub mod landcover;
pub mod pipeline;
pub mod statistics;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{LocalBackend, RasterBackend};
    pub use crate::config::AnalysisConfig;
    pub use crate::export::OutputDir;
    pub use crate::landcover::{
        default_periods, AnnualStack, AoiMask, AreaRecord, FunctionalGroup, Period,
        PixelAreaModel, TransitionCode, TransitionRecord, TransitionType,
    };
    pub use crate::pipeline::{AnalysisProducts, ChangeAnalysis};
    pub use covergis_core::prelude::*;
}
