//! Export of analysis products to a directory

use crate::config::AnalysisConfig;
use crate::landcover::{AreaRecord, TransitionRecord};
use crate::pipeline::AnalysisProducts;
use covergis_core::io::{
    write_band_stack, write_csv_table, write_feature_collection, write_geotiff, GeoTiffOptions,
};
use covergis_core::raster::Raster;
use covergis_core::vector::Aoi;
use covergis_core::Result;
use std::path::{Path, PathBuf};
use tracing::info;

pub const AREA_TABLE: &str = "area_by_group.csv";
pub const TRANSITION_TABLE: &str = "transitions.csv";
pub const TRANSITION_RASTER: &str = "transitions.tif";
pub const AOI_VECTOR: &str = "aoi.geojson";
pub const CLIPPED_STACK: &str = "classification_clipped.tif";

/// Writes products under one output directory, created on demand
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    tiff: GeoTiffOptions,
}

impl OutputDir {
    pub fn create<P: AsRef<Path>>(root: P, config: &AnalysisConfig) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            tiff: GeoTiffOptions {
                overview_levels: config.overview_levels,
            },
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write_area_table(&self, rows: &[AreaRecord]) -> Result<PathBuf> {
        let path = self.path(AREA_TABLE);
        write_csv_table(rows, &path)?;
        info!(path = %path.display(), rows = rows.len(), "wrote area table");
        Ok(path)
    }

    pub fn write_transition_table(&self, rows: &[TransitionRecord]) -> Result<PathBuf> {
        let path = self.path(TRANSITION_TABLE);
        write_csv_table(rows, &path)?;
        info!(path = %path.display(), rows = rows.len(), "wrote transition table");
        Ok(path)
    }

    /// Coded raster with mode overviews
    pub fn write_transition_raster(&self, raster: &Raster<i32>) -> Result<PathBuf> {
        let path = self.path(TRANSITION_RASTER);
        write_geotiff(raster, &path, &self.tiff)?;
        info!(path = %path.display(), overviews = self.tiff.overview_levels, "wrote transition raster");
        Ok(path)
    }

    pub fn write_aoi(&self, aoi: &Aoi) -> Result<PathBuf> {
        let path = self.path(AOI_VECTOR);
        write_feature_collection(&aoi.to_collection(), &path)?;
        info!(path = %path.display(), aoi = %aoi.name, "wrote AOI");
        Ok(path)
    }

    /// One page per year, already clipped to the AOI
    pub fn write_clipped_stack(&self, bands: &[Raster<i32>]) -> Result<PathBuf> {
        let path = self.path(CLIPPED_STACK);
        write_band_stack(bands, &path)?;
        info!(path = %path.display(), bands = bands.len(), "wrote clipped stack");
        Ok(path)
    }

    /// Write every product of a run plus the AOI
    pub fn write_all(&self, products: &AnalysisProducts, aoi: &Aoi) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.write_area_table(&products.areas)?,
            self.write_transition_table(&products.transitions)?,
            self.write_transition_raster(&products.transition_raster)?,
            self.write_aoi(aoi)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landcover::TransitionType;
    use covergis_core::io::{read_feature_collection, read_geotiff};
    use covergis_core::vector::Feature;
    use covergis_core::{GeoTransform, CRS};
    use geo::polygon;

    #[test]
    fn test_write_all() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::create(dir.path().join("out"), &AnalysisConfig::default()).unwrap();

        let mut raster = Raster::from_vec(vec![198519901, 0, 0, 201820232], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(-60.0, -16.0, 0.00027, -0.00027));
        raster.set_crs(Some(CRS::wgs84()));

        let products = AnalysisProducts {
            areas: vec![AreaRecord {
                year: 1985,
                group: "forest_formation".into(),
                area_ha: 0.25,
            }],
            transition_raster: raster,
            transitions: vec![TransitionRecord {
                period: "1985-1990".into(),
                start_year: 1985,
                end_year: 1990,
                transition_type: TransitionType::ForestToAgropastoral,
                area_ha: 0.08,
            }],
        };
        let aoi = Aoi {
            name: "Chiquitano".into(),
            feature: Feature::from_polygon(polygon![(x: -60.0, y: -16.0), (x: -59.0, y: -16.0), (x: -59.0, y: -17.0)])
                .with_property("nombre", "Chiquitano"),
        };

        let paths = out.write_all(&products, &aoi).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));

        let table = std::fs::read_to_string(out.path(TRANSITION_TABLE)).unwrap();
        assert!(table.contains("1985-1990,1985,1990,forest_to_agropastoral,0.08"));

        let back: Raster<i32> = read_geotiff(out.path(TRANSITION_RASTER)).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 201820232);
        assert_eq!(back.crs().unwrap().epsg(), 4326);

        let fc = read_feature_collection(out.path(AOI_VECTOR)).unwrap();
        assert_eq!(fc.select_one("nombre", "Chiquitano").unwrap().name, "Chiquitano");
    }
}
