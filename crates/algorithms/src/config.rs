//! Analysis configuration
//!
//! Every tunable of the change analysis lives in [`AnalysisConfig`], read
//! from a TOML file. Missing keys take the defaults of the Chiquitano
//! 1985-2023 analysis.

use crate::landcover::{default_periods, validate_periods, FunctionalGroup, Period, MAX_YEAR};
use covergis_core::{Error, Result, CRS};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Which feature of the region collection is the AOI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoiSelector {
    /// Attribute holding the region name
    pub field: String,
    /// Exact, case-sensitive name to match
    pub name: String,
}

impl Default for AoiSelector {
    fn default() -> Self {
        Self {
            field: "nombre".into(),
            name: "Chiquitano".into(),
        }
    }
}

/// Inclusive analysis year range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: u16,
    pub last: u16,
}

impl YearRange {
    pub fn years(&self) -> std::ops::RangeInclusive<u16> {
        self.first..=self.last
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: 1985,
            last: 2023,
        }
    }
}

/// Group names used as transition source and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionGroups {
    pub forest: String,
    pub agropastoral: String,
}

impl Default for TransitionGroups {
    fn default() -> Self {
        Self {
            forest: "forest_formation".into(),
            agropastoral: "agropastoral".into(),
        }
    }
}

/// Full analysis configuration.
///
/// Plain values come first so the struct serialises to valid TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Nominal pixel size in metres for masking and area
    pub resolution: f64,
    pub crs: CRS,
    /// Emit zero-area rows for period × type pairs with no pixels
    pub emit_empty_transitions: bool,
    /// Mode-downsampled overview levels written with the transition raster
    pub overview_levels: u32,
    /// Attempts per backend call, at least 1
    pub retry_attempts: u32,
    pub periods: Vec<Period>,
    pub aoi: AoiSelector,
    pub years: YearRange,
    pub transitions: TransitionGroups,
    pub groups: Vec<FunctionalGroup>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resolution: 30.0,
            crs: CRS::wgs84(),
            emit_empty_transitions: false,
            overview_levels: 4,
            retry_attempts: 1,
            periods: default_periods(),
            aoi: AoiSelector::default(),
            years: YearRange::default(),
            transitions: TransitionGroups::default(),
            groups: vec![
                FunctionalGroup::new("forest_formation", vec![1, 3, 4, 6], "#1f8d49"),
                FunctionalGroup::new("agropastoral", vec![14, 15, 18, 21], "#ffefc3"),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Group by name, or `InvalidConfig`
    pub fn group(&self, name: &str) -> Result<&FunctionalGroup> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown group '{}'", name)))
    }

    pub fn forest_group(&self) -> Result<&FunctionalGroup> {
        self.group(&self.transitions.forest)
    }

    pub fn agropastoral_group(&self) -> Result<&FunctionalGroup> {
        self.group(&self.transitions.agropastoral)
    }

    /// Check every invariant the analysis relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.aoi.field.is_empty() || self.aoi.name.is_empty() {
            return invalid("aoi.field and aoi.name must not be empty".into());
        }
        if self.years.first > self.years.last {
            return invalid(format!(
                "year range {}-{} is empty",
                self.years.first, self.years.last
            ));
        }
        if self.years.last > MAX_YEAR {
            return invalid(format!("year {} exceeds {}", self.years.last, MAX_YEAR));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return invalid(format!("resolution must be positive, got {}", self.resolution));
        }
        if self.retry_attempts == 0 {
            return invalid("retry_attempts must be at least 1".into());
        }

        let mut names = HashSet::new();
        let mut owner: HashMap<i32, &str> = HashMap::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return invalid(format!("duplicate group '{}'", group.name));
            }
            if group.codes.is_empty() {
                return invalid(format!("group '{}' has no class codes", group.name));
            }
            if !is_hex_color(&group.color) {
                return invalid(format!(
                    "group '{}' colour '{}' is not #rrggbb",
                    group.name, group.color
                ));
            }
            for &code in &group.codes {
                if let Some(other) = owner.insert(code, &group.name) {
                    if other != group.name {
                        return invalid(format!(
                            "class code {} is in both '{}' and '{}'",
                            code, other, group.name
                        ));
                    }
                }
            }
        }

        self.forest_group()?;
        self.agropastoral_group()?;
        if self.transitions.forest == self.transitions.agropastoral {
            return invalid("transition source and target groups are the same".into());
        }

        validate_periods(&self.periods, self.years.first, self.years.last)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.forest_group().unwrap().codes, vec![1, 3, 4, 6]);
        assert_eq!(config.agropastoral_group().unwrap().color, "#ffefc3");
        assert_eq!(config.years.years().count(), 39);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AnalysisConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("crs = \"EPSG:4326\""));
        let back = AnalysisConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            emit_empty_transitions = true

            [aoi]
            field = "nombre"
            name = "Chaco"
        "#;
        let config = AnalysisConfig::from_toml_str(text).unwrap();
        assert!(config.emit_empty_transitions);
        assert_eq!(config.aoi.name, "Chaco");
        assert_eq!(config.periods.len(), 8);
        assert_eq!(config.resolution, 30.0);
    }

    #[test]
    fn test_custom_periods() {
        let text = r#"
            periods = [[2000, 2010], [2010, 2020]]

            [years]
            first = 2000
            last = 2020
        "#;
        let config = AnalysisConfig::from_toml_str(text).unwrap();
        assert_eq!(config.periods[1], Period::new(2010, 2020));
    }

    #[test]
    fn test_rejects_overlapping_codes() {
        let mut config = AnalysisConfig::default();
        config.groups[1].codes.push(3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("class code 3"));
    }

    #[test]
    fn test_rejects_bad_colour_and_unknown_group() {
        let mut config = AnalysisConfig::default();
        config.groups[0].color = "green".into();
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.transitions.forest = "forest".into();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_uncovered_years() {
        let mut config = AnalysisConfig::default();
        config.years.last = 2024;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.periods.remove(3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_key() {
        assert!(AnalysisConfig::from_toml_str("resolutoin = 10.0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(&path, "resolution = 30.0\nretry_attempts = 3\n").unwrap();
        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.retry_attempts, 3);

        std::fs::write(&path, "retry_attempts = 0\n").unwrap();
        assert!(AnalysisConfig::load(&path).is_err());
    }
}
