//! Raster processing backends
//!
//! The analysis only needs four capabilities from whatever holds the data:
//! pick a year, mask a group, and reduce area (total or per code) inside
//! the AOI. [`LocalBackend`] provides them in memory.

use crate::config::AnalysisConfig;
use crate::landcover::{
    group_mask, masked_area_ha, select_year, AnnualStack, AoiMask, PixelAreaModel, YearBand,
};
use crate::statistics::zonal_area;
use covergis_core::raster::Raster;
use covergis_core::vector::Aoi;
use covergis_core::Result;
use std::collections::BTreeMap;

/// Capabilities the change analysis needs from a raster store.
///
/// Every call is independent and free of side effects, so callers may
/// retry a failed call as is.
pub trait RasterBackend: Send + Sync {
    /// Classification of `year`, clipped to the AOI
    fn select_band(&self, year: u16) -> Result<YearBand>;

    /// 0/1 mask of pixels whose class is in `codes`
    fn group_mask(&self, band: &Raster<i32>, codes: &[i32]) -> Result<Raster<u8>>;

    /// Hectares of mask pixels inside the AOI
    fn reduce_area(&self, mask: &Raster<u8>) -> Result<f64>;

    /// Hectares per non-zero code inside the AOI
    fn reduce_area_by_code(&self, coded: &Raster<i32>) -> Result<BTreeMap<i32, f64>>;
}

/// In-memory backend over an annual stack
#[derive(Debug, Clone)]
pub struct LocalBackend {
    stack: AnnualStack,
    aoi: AoiMask,
    area: PixelAreaModel,
}

impl LocalBackend {
    pub fn new(stack: AnnualStack, aoi: AoiMask, area: PixelAreaModel) -> Result<Self> {
        stack.grid().ensure_same_grid(aoi.mask())?;
        Ok(Self { stack, aoi, area })
    }

    /// Prepare a backend for `config`: tag the stack with the configured
    /// CRS when it has none, check years and resolution, and rasterise the
    /// AOI onto the stack grid.
    pub fn from_inputs(stack: AnnualStack, aoi: &Aoi, config: &AnalysisConfig) -> Result<Self> {
        let stack = stack.with_default_crs(config.crs);
        stack.require_years(config.years.first, config.years.last)?;

        let area = PixelAreaModel::from_grid(stack.grid());
        area.check_resolution(config.resolution)?;

        let mask = AoiMask::rasterize(aoi, stack.grid())?;
        Self::new(stack, mask, area)
    }

    pub fn stack(&self) -> &AnnualStack {
        &self.stack
    }

    pub fn aoi_mask(&self) -> &AoiMask {
        &self.aoi
    }

    pub fn area_model(&self) -> &PixelAreaModel {
        &self.area
    }
}

impl RasterBackend for LocalBackend {
    fn select_band(&self, year: u16) -> Result<YearBand> {
        select_year(&self.stack, year, &self.aoi)
    }

    fn group_mask(&self, band: &Raster<i32>, codes: &[i32]) -> Result<Raster<u8>> {
        group_mask(band, codes)
    }

    fn reduce_area(&self, mask: &Raster<u8>) -> Result<f64> {
        masked_area_ha(mask, &self.aoi, &self.area)
    }

    fn reduce_area_by_code(&self, coded: &Raster<i32>) -> Result<BTreeMap<i32, f64>> {
        Ok(zonal_area(coded, &self.aoi, &self.area)?
            .into_iter()
            .map(|(code, zone)| (code, zone.area_ha))
            .collect())
    }
}
