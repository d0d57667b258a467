//! Built-in task functions, registered under their dotted names.
//!
//! Each task is a unit struct implementing [`TaskFunction`]: it declares its
//! parameter schema and converts registry values into calls of the imaging
//! and diagnostics kernels.

pub mod corrections;
pub mod dataio;
pub mod diagnostics;
pub mod reconstruction;

use std::sync::Arc;

use ndarray::Array3;

use crate::core::error::TaskError;
use crate::core::library::FunctionLibrary;
use crate::core::task::TaskArgs;
use crate::core::value::Value;
use crate::diagnostics::DiagnosticError;
use crate::parallel::ParallelConfig;

pub use corrections::{Crop, GammaFilter, MinusLog, Normalization};
pub use dataio::{LoadData, SaveData};
pub use diagnostics::{ApplyTiltCorrection, FindRotationCenter, TiltCorrection};
pub use reconstruction::Recon;

/// Registers every built-in task.
pub fn register_defaults(library: &mut FunctionLibrary) {
    library
        .register("imars3d.dataio.load_data", LoadData)
        .register("imars3d.dataio.save_data", SaveData)
        .register("imars3d.corrections.normalization", Normalization)
        .register("imars3d.corrections.gamma_filter", GammaFilter)
        .register("imars3d.corrections.crop", Crop)
        .register("imars3d.corrections.minus_log", MinusLog)
        .register("imars3d.diagnostics.find_rotation_center", FindRotationCenter)
        .register("imars3d.diagnostics.tilt_correction", TiltCorrection)
        .register("imars3d.diagnostics.apply_tilt_correction", ApplyTiltCorrection)
        .register("imars3d.reconstruction.recon", Recon);
}

/// A 3-D stack argument. Lower-rank arrays are a dimension error.
pub(crate) fn require_stack(args: &TaskArgs, name: &str) -> Result<Arc<Array3<f64>>, TaskError> {
    let actual = match args.require(name)? {
        Value::Stack(stack) => return Ok(Arc::clone(stack)),
        Value::Image(_) => 2,
        Value::Angles(_) => 1,
        _ => return args.stack(name),
    };
    Err(DiagnosticError::DimensionMismatch { expected: 3, actual }.into())
}

pub(crate) fn parallel(args: &TaskArgs) -> Result<ParallelConfig, TaskError> {
    Ok(ParallelConfig::new(args.max_workers()?))
}

pub(crate) fn require_vec_f64(args: &TaskArgs, name: &str) -> Result<Vec<f64>, TaskError> {
    args.require(name)?
        .to_vec_f64()
        .map_err(|e| TaskError::InvalidArgument(format!("'{name}': {e}")))
}
