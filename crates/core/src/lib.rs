//! # calura-core
//!
//! Core types and I/O for the calura Surface Urban Heat Island pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced raster grid with an explicit nodata model
//! - `GridGeometry`: the CRS + extent + resolution triple every joint
//!   pipeline stage checks before computing
//! - `GeoTransform`: affine georeferencing
//! - `CRS`: coordinate reference system handling
//! - GeoTIFF reading/writing (float32 output, `GDAL_NODATA` sentinel)
//! - Minimal GeoJSON vector reading for land-cover and boundary layers

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::Crs;
pub use error::{Error, Result};
pub use raster::{GeoTransform, GridGeometry, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridGeometry, Raster, RasterElement};
    pub use crate::vector::{Feature, FeatureCollection};
}
