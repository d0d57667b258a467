use thiserror::Error;

/// Failures of the rotation-center and tilt diagnostics.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("Expected a {expected}-D array, found {actual}-D")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Images must share a shape, found {first:?} and {second:?}")]
    ShapeMismatch { first: (usize, usize), second: (usize, usize) },

    #[error("{images} images but {angles} rotation angles")]
    LengthMismatch { images: usize, angles: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No pair of rotation angles is 180 degrees apart within {atol} degrees")]
    NoPairsFound { atol: f64 },

    #[error("Could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
