//! Reading and writing of geospatial inputs and outputs

mod geojson;
mod geotiff;

pub use geojson::{parse_geojson, read_geojson};
pub use geotiff::{read_geotiff, write_geotiff, NODATA_SENTINEL};
