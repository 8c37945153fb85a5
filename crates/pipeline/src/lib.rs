//! # calura-pipeline
//!
//! Surface Urban Heat Island (SUHI) computation stages:
//!
//! - **scene**: Landsat Collection-2 scene catalog (thermal + QA pairs)
//! - **quality**: per-scene quality filtering and LST conversion
//! - **composite**: seasonal mean compositing of accepted scenes
//! - **landcover**: urban / rural-reference mask construction
//! - **elevation**: altitude band partitioning of the urban area
//! - **anomaly**: per-band thermal anomaly and normalized SUHI index
//! - **resample**: nearest-neighbour regridding between input grids
//! - **run**: end-to-end orchestration and output writing

pub mod algebra;
pub mod anomaly;
pub mod composite;
pub mod elevation;
pub mod error;
pub mod landcover;
mod maybe_rayon;
pub mod quality;
pub mod resample;
pub mod run;
pub mod scene;

pub use error::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::anomaly::{BandResult, SuhiOutputs};
    pub use crate::composite::seasonal_mean;
    pub use crate::elevation::{partition, BandLayout, ElevationBand};
    pub use crate::error::{Error, Result};
    pub use crate::landcover::{build_masks, LandCoverMasks};
    pub use crate::quality::{filter_scene, SceneOutcome, SkipReason};
    pub use crate::run::{RunParams, RunSummary, Season};
    pub use crate::scene::{DateRange, SceneCatalog, SensorFamily};
    pub use calura_core::prelude::*;
}
