use std::borrow::Cow;
use std::sync::Arc;

use crate::core::error::TaskError;
use crate::core::schema::ParameterSchema;
use crate::core::task::{TaskArgs, TaskFunction};
use crate::core::value::Value;
use crate::diagnostics::{
    RotationCenterOptions, TiltOptions, apply_tilt_correction, find_rotation_center, tilt_correction,
};
use crate::tasks::{parallel, require_stack, require_vec_f64};

/// `imars3d.diagnostics.find_rotation_center`
///
/// Angles in the registry are radians, so `in_degrees` defaults to `false` here.
#[derive(Debug, Clone, Copy)]
pub struct FindRotationCenter;

impl TaskFunction for FindRotationCenter {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .required("angles")
            .optional("in_degrees", false)
            .optional("atol_deg", 0.1)
            .optional("num_pairs", -1i64)
            .optional("max_workers", 0i64)
            .optional_literal("tqdm_class", Value::None)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let angles = require_vec_f64(&args, "angles")?;
        let options = RotationCenterOptions {
            in_degrees: args.bool_or("in_degrees", false)?,
            atol_deg: args.f64_or("atol_deg", 0.1)?,
            num_pairs: args.i64_or("num_pairs", -1)?,
            parallel: parallel(&args)?,
        };
        let center = find_rotation_center(arrays.view(), &angles, &options)?;
        Ok(Value::Float(center))
    }
}

/// `imars3d.diagnostics.tilt_correction`
#[derive(Debug, Clone, Copy)]
pub struct TiltCorrection;

impl TaskFunction for TiltCorrection {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .required("rot_angles")
            .optional("low_bound", -5.0)
            .optional("high_bound", 5.0)
            .optional("cut_off_angle_deg", 1e-3)
            .optional("atol_deg", 0.1)
            .optional("max_workers", 0i64)
            .optional_literal("tqdm_class", Value::None)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let rot_angles = require_vec_f64(&args, "rot_angles")?;
        let defaults = TiltOptions::default();
        let options = TiltOptions {
            low_bound: args.f64_or("low_bound", defaults.low_bound)?,
            high_bound: args.f64_or("high_bound", defaults.high_bound)?,
            cut_off_angle_deg: args.f64_or("cut_off_angle_deg", defaults.cut_off_angle_deg)?,
            atol_deg: args.f64_or("atol_deg", defaults.atol_deg)?,
            parallel: parallel(&args)?,
        };
        let corrected = match tilt_correction(&arrays, &rot_angles, &options)? {
            // untouched input keeps sharing the same buffer
            Cow::Borrowed(_) => Arc::clone(&arrays),
            Cow::Owned(corrected) => Arc::new(corrected),
        };
        Ok(Value::Stack(corrected))
    }
}

/// `imars3d.diagnostics.apply_tilt_correction`: rotates every image by `-tilt` degrees.
#[derive(Debug, Clone, Copy)]
pub struct ApplyTiltCorrection;

impl TaskFunction for ApplyTiltCorrection {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .required("tilt")
            .optional("max_workers", 0i64)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let tilt = args
            .optional_f64("tilt")?
            .ok_or_else(|| TaskError::MissingArgument("tilt".into()))?;
        Ok(Value::from(apply_tilt_correction(arrays.view(), tilt, parallel(&args)?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticError;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_rotation_center_rejects_2d_input() {
        let args = TaskArgs::new()
            .with("arrays", Array2::<f64>::zeros((4, 4)))
            .with("angles", Value::List(vec![Value::Float(0.0)]));
        assert!(matches!(
            FindRotationCenter.call(args),
            Err(TaskError::Diagnostic(DiagnosticError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_tilt_correction_without_pairs() {
        let args = TaskArgs::new()
            .with("arrays", Array3::<f64>::zeros((2, 8, 8)))
            .with("rot_angles", Value::List(vec![Value::Float(0.0), Value::Float(0.5)]));
        assert!(matches!(
            TiltCorrection.call(args),
            Err(TaskError::Diagnostic(DiagnosticError::NoPairsFound { .. }))
        ));
    }

    #[test]
    fn test_tilt_correction_keeps_buffer_below_cut_off() {
        let stack = Arc::new(Array3::from_shape_fn((2, 16, 16), |(k, r, c)| {
            let c = if k == 0 { c } else { 15 - c };
            (-(((r as f64 - 7.0).powi(2) + (c as f64 - 5.0).powi(2)) / 6.0)).exp()
        }));
        let mut args = TaskArgs::new();
        args.insert("arrays", Value::Stack(Arc::clone(&stack)));
        args.insert("rot_angles", Value::List(vec![Value::Float(0.0), Value::Float(std::f64::consts::PI)]));
        match TiltCorrection.call(args).unwrap() {
            Value::Stack(out) => assert!(Arc::ptr_eq(&out, &stack)),
            other => panic!("expected a stack, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_tilt_correction_requires_tilt() {
        let args = TaskArgs::new().with("arrays", Array3::<f64>::zeros((1, 4, 4)));
        assert!(matches!(ApplyTiltCorrection.call(args), Err(TaskError::MissingArgument(_))));
    }
}
