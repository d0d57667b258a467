//! Image corrections, reconstruction and TIFF I/O for radiograph stacks.
//!
//! Stacks are `Array3<f64>` indexed `[image, row, column]`.

pub mod corrections;
pub mod dataio;
pub mod recon;
pub mod transform;

use thiserror::Error;

pub use corrections::{crop, gamma_filter, minus_log, normalization};
pub use dataio::{LoadRequest, LoadedData, load_data, read_tiff, save_data, write_tiff};
pub use recon::reconstruct;
pub use transform::{fliplr, min_max_normalize, rotate};

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Image shape {actual:?} does not match {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("No input files: {0}")]
    NoFiles(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unreadable path while globbing: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
