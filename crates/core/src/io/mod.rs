//! Reading and writing rasters, vector features and result tables

mod geojson;
mod geotiff;
mod overview;
mod table;

pub use self::geojson::{
    read_feature_collection, read_feature_collection_from_str, write_feature_collection,
    write_feature_collection_to_string,
};
pub use geotiff::{
    read_band_stack, read_geotiff, read_geotiff_from_buffer, write_band_stack, write_geotiff,
    write_geotiff_to_buffer, GeoTiffOptions,
};
pub use overview::{build_overviews, mode_downsample};
pub use table::{write_csv_table, write_csv_to, TableRow};
