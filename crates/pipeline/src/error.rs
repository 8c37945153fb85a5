//! Pipeline error types.
//!
//! Only fatal conditions are errors. Scene skips travel as
//! [`SceneOutcome::Skipped`](crate::quality::SceneOutcome) values and a
//! degenerate SUHI normalization range produces an all-nodata band;
//! both are reported, neither aborts the run.

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal pipeline error
#[derive(Error, Debug)]
pub enum Error {
    #[error("no scene passed the quality filter between {start} and {end}")]
    NoValidScenes { start: NaiveDate, end: NaiveDate },

    #[error("cannot composite an empty scene list")]
    EmptyComposite,

    #[error("empty reference area: {0}")]
    EmptyReferenceArea(String),

    #[error("cannot reproject between {src} and {dst}")]
    UnsupportedReprojection { src: String, dst: String },

    #[error(transparent)]
    Core(#[from] calura_core::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
