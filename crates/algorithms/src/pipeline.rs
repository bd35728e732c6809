//! Change analysis orchestration
//!
//! [`ChangeAnalysis`] drives a [`RasterBackend`] through the two products
//! of the workflow: per-year area of every functional group, and the coded
//! forest / agropastoral transition raster with its area table.

use crate::backend::RasterBackend;
use crate::config::AnalysisConfig;
use crate::landcover::{
    blend, coded_layer, fold_layers, transition_records, AreaRecord, Period, TransitionRecord,
    TransitionType,
};
use crate::maybe_rayon::*;
use covergis_core::raster::Raster;
use covergis_core::{Error, Result, ResultExt};
use tracing::{debug, info, warn};

/// Everything one analysis run produces
#[derive(Debug, Clone)]
pub struct AnalysisProducts {
    pub areas: Vec<AreaRecord>,
    pub transition_raster: Raster<i32>,
    pub transitions: Vec<TransitionRecord>,
}

/// Change analysis over a backend and a validated configuration
pub struct ChangeAnalysis<'a, B: RasterBackend> {
    backend: &'a B,
    config: &'a AnalysisConfig,
}

impl<'a, B: RasterBackend> ChangeAnalysis<'a, B> {
    pub fn new(backend: &'a B, config: &'a AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.config
    }

    /// Area in hectares of every group for every year.
    ///
    /// Records come grouped by configuration order, years ascending.
    pub fn area_by_group(&self) -> Result<Vec<AreaRecord>> {
        let years: Vec<u16> = self.config.years.years().collect();
        let mut records = Vec::with_capacity(years.len() * self.config.groups.len());

        for group in &self.config.groups {
            let rows: Vec<AreaRecord> = years
                .clone()
                .into_par_iter()
                .map(|year| {
                    let area_ha = self
                        .retry(|| {
                            let band = self.backend.select_band(year)?;
                            let mask = self.backend.group_mask(&band.raster, &group.codes)?;
                            self.backend.reduce_area(&mask)
                        })
                        .with_context(|| format!("area of group '{}' in {}", group.name, year))?;
                    debug!(group = %group.name, year, area_ha, "group area");
                    Ok(AreaRecord {
                        year,
                        group: group.name.clone(),
                        area_ha,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            records.extend(rows);
        }

        info!(records = records.len(), "area by group complete");
        Ok(records)
    }

    /// Layer of one period and direction: pixels in the source group at
    /// the start year and the target group at the end year, set to the
    /// packed code.
    pub fn transition_layer(&self, period: Period, kind: TransitionType) -> Result<Raster<i32>> {
        let (from, to) = match kind {
            TransitionType::ForestToAgropastoral => {
                (self.config.forest_group()?, self.config.agropastoral_group()?)
            }
            TransitionType::AgropastoralToForest => {
                (self.config.agropastoral_group()?, self.config.forest_group()?)
            }
        };
        let code = period.code(kind)?;

        let layer = self
            .retry(|| {
                let start = self.backend.select_band(period.start)?;
                let end = self.backend.select_band(period.end)?;
                let from_mask = self.backend.group_mask(&start.raster, &from.codes)?;
                let to_mask = self.backend.group_mask(&end.raster, &to.codes)?;
                coded_layer(&from_mask, &to_mask, code)
            })
            .with_context(|| format!("{} layer for period {}", kind, period))?;

        debug!(period = %period, kind = %kind, code = code.value(), "transition layer");
        Ok(layer)
    }

    /// The coded transition raster.
    ///
    /// All period × type layers are computed in parallel, then loss layers
    /// are blended in period order, gain layers likewise, and gain is
    /// blended over loss.
    pub fn transition_raster(&self) -> Result<Raster<i32>> {
        let periods = &self.config.periods;
        let jobs: Vec<(Period, TransitionType)> = TransitionType::ALL
            .iter()
            .flat_map(|&kind| periods.iter().map(move |&p| (p, kind)))
            .collect();

        let mut layers = jobs
            .into_par_iter()
            .map(|(period, kind)| self.transition_layer(period, kind))
            .collect::<Result<Vec<_>>>()?;

        let gain_layers = layers.split_off(periods.len());
        let no_layers = || Error::InvalidConfig("no periods configured".into());
        let loss = fold_layers(layers)?.ok_or_else(no_layers)?;
        let gain = fold_layers(gain_layers)?.ok_or_else(no_layers)?;

        let raster = blend(&loss, &gain)?;
        info!(
            layers = periods.len() * TransitionType::ALL.len(),
            "transition raster complete"
        );
        Ok(raster)
    }

    /// Area table of a coded transition raster
    pub fn transition_table(&self, raster: &Raster<i32>) -> Result<Vec<TransitionRecord>> {
        let areas = self
            .retry(|| self.backend.reduce_area_by_code(raster))
            .with_context(|| "transition area reduction".to_string())?;
        let records = transition_records(
            &areas,
            &self.config.periods,
            self.config.emit_empty_transitions,
        )?;
        for r in &records {
            debug!(period = %r.period, kind = %r.transition_type, area_ha = r.area_ha, "transition area");
        }
        Ok(records)
    }

    /// Run both products. Nothing is returned if any step fails.
    pub fn run(&self) -> Result<AnalysisProducts> {
        let areas = self.area_by_group()?;
        let transition_raster = self.transition_raster()?;
        let transitions = self.transition_table(&transition_raster)?;
        Ok(AnalysisProducts {
            areas,
            transition_raster,
            transitions,
        })
    }

    /// Call `op` up to `retry_attempts` times while it fails transiently
    fn retry<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Result<T>,
    {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!(attempt, attempts, error = %e, "backend call failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landcover::{group_mask, YearBand};
    use covergis_core::GeoTransform;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend whose first `failures` band selections fail with an I/O error
    struct FlakyBackend {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyBackend {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RasterBackend for FlakyBackend {
        fn select_band(&self, year: u16) -> Result<YearBand> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(Error::Io(std::io::Error::other("connection reset")));
            }
            let mut raster = Raster::filled(1, 1, 3);
            raster.set_transform(GeoTransform::new(0.0, 30.0, 30.0, -30.0));
            Ok(YearBand {
                name: format!("Y{}", year),
                year,
                raster,
            })
        }

        fn group_mask(&self, band: &Raster<i32>, codes: &[i32]) -> Result<Raster<u8>> {
            group_mask(band, codes)
        }

        fn reduce_area(&self, mask: &Raster<u8>) -> Result<f64> {
            Ok(mask.data().iter().map(|&v| v as f64 * 0.09).sum())
        }

        fn reduce_area_by_code(&self, _coded: &Raster<i32>) -> Result<BTreeMap<i32, f64>> {
            Ok(BTreeMap::new())
        }
    }

    fn short_config(retry_attempts: u32) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.years.first = 1985;
        config.years.last = 1986;
        config.periods = vec![Period::new(1985, 1986)];
        config.groups.truncate(2);
        config.retry_attempts = retry_attempts;
        config
    }

    #[test]
    fn test_retry_recovers_transient_failure() {
        let backend = FlakyBackend::new(1);
        let config = short_config(2);
        let analysis = ChangeAnalysis::new(&backend, &config).unwrap();

        let layer = analysis
            .transition_layer(Period::new(1985, 1986), TransitionType::ForestToAgropastoral)
            .unwrap();
        assert_eq!(layer.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_no_retry_by_default() {
        let backend = FlakyBackend::new(1);
        let config = short_config(1);
        let analysis = ChangeAnalysis::new(&backend, &config).unwrap();

        let err = analysis
            .transition_layer(Period::new(1985, 1986), TransitionType::AgropastoralToForest)
            .unwrap_err();
        assert!(matches!(err.root(), Error::Io(_)));
        assert!(err.to_string().starts_with("agropastoral_to_forest layer for period 1985-1986"));
    }

    #[test]
    fn test_area_by_group_order() {
        let backend = FlakyBackend::new(0);
        let config = short_config(1);
        let analysis = ChangeAnalysis::new(&backend, &config).unwrap();

        let records = analysis.area_by_group().unwrap();
        let keys: Vec<(&str, u16)> = records.iter().map(|r| (r.group.as_str(), r.year)).collect();
        assert_eq!(
            keys,
            vec![
                ("forest_formation", 1985),
                ("forest_formation", 1986),
                ("agropastoral", 1985),
                ("agropastoral", 1986),
            ]
        );
        assert!((records[0].area_ha - 0.09).abs() < 1e-12);
        assert_eq!(records[2].area_ha, 0.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let backend = FlakyBackend::new(0);
        let mut config = short_config(1);
        config.retry_attempts = 0;
        assert!(ChangeAnalysis::new(&backend, &config).is_err());
    }
}
