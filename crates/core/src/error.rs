//! Error types for CoverGis

use crate::raster::GeoTransform;
use thiserror::Error;

/// Main error type for CoverGis operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// Same shape but different georeferencing
    #[error("Raster grid mismatch: expected {expected:?}, got {actual:?}")]
    GridMismatch {
        expected: GeoTransform,
        actual: GeoTransform,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Requested year has no band in the annual stack.
    #[error("Missing band for year {year}: stack covers {first}..={last}")]
    MissingBand { year: u16, first: u16, last: u16 },

    /// The AOI name filter matched no feature.
    #[error("Empty AOI: no feature with {field} = '{name}'")]
    EmptyAoi { field: String, name: String },

    /// The AOI name filter matched more than one feature.
    #[error("Ambiguous AOI: {count} features with {field} = '{name}'")]
    AmbiguousAoi {
        field: String,
        name: String,
        count: usize,
    },

    /// The AOI polygon covers no pixel center of the raster grid.
    #[error("AOI '{name}' does not overlap the raster grid")]
    AoiOutsideRaster { name: String },

    /// A year does not fit the 4-digit transition code packing.
    #[error("Year {year} out of range for transition code (0..=9999)")]
    YearOutOfRange { year: u32 },

    #[error("Unknown transition type {kind} in code {code}")]
    UnknownTransitionType { code: i64, kind: i64 },

    #[error("Resolution mismatch: configured {expected} m, grid cell is {actual:.3} m")]
    ResolutionMismatch { expected: f64, actual: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),

    /// An error annotated with the analysis step that raised it
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error, with every `Context` layer removed
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only I/O-level failures qualify; domain errors (missing band,
    /// bad codes, bad configuration) fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self.root(), Error::Io(_) | Error::Tiff(_) | Error::Other(_))
    }
}

/// Attach a step description to an error
pub trait ResultExt<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| Error::Context {
            context: f(),
            source: Box::new(source),
        })
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for CoverGis operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_root() {
        let err: Result<()> = Err(Error::MissingBand {
            year: 2024,
            first: 1985,
            last: 2023,
        });
        let err = err
            .with_context(|| "group 'agropastoral'".to_string())
            .unwrap_err();

        assert!(matches!(err.root(), Error::MissingBand { year: 2024, .. }));
        assert_eq!(
            err.to_string(),
            "group 'agropastoral': Missing band for year 2024: stack covers 1985..=2023"
        );
        assert!(!err.is_transient());
    }
}
