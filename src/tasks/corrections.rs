use crate::core::error::TaskError;
use crate::core::schema::ParameterSchema;
use crate::core::task::{TaskArgs, TaskFunction};
use crate::core::value::Value;
use crate::imaging::corrections::{crop, gamma_filter, minus_log, normalization};
use crate::tasks::{parallel, require_stack, require_vec_f64};

/// `imars3d.corrections.normalization`
#[derive(Debug, Clone, Copy)]
pub struct Normalization;

impl TaskFunction for Normalization {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .required("flats")
            .optional("darks", Value::None)
            .optional("cut_off", Value::None)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let flats = require_stack(&args, "flats")?;
        let darks = match args.get("darks") {
            Some(_) => Some(require_stack(&args, "darks")?),
            None => None,
        };
        let normalized = normalization(
            arrays.view(),
            flats.view(),
            darks.as_ref().map(|d| d.view()),
            args.optional_f64("cut_off")?,
        )?;
        Ok(Value::from(normalized))
    }
}

/// `imars3d.corrections.gamma_filter`
#[derive(Debug, Clone, Copy)]
pub struct GammaFilter;

impl TaskFunction for GammaFilter {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .optional("diff", 20.0)
            .optional("max_workers", 0i64)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let filtered = gamma_filter(arrays.view(), args.f64_or("diff", 20.0)?, parallel(&args)?)?;
        Ok(Value::from(filtered))
    }
}

/// `imars3d.corrections.crop`: `crop_limit` is `[left, right, top, bottom]`.
#[derive(Debug, Clone, Copy)]
pub struct Crop;

impl TaskFunction for Crop {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("arrays").required("crop_limit").returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let limits = require_vec_f64(&args, "crop_limit")?;
        let limits: [usize; 4] = limits
            .iter()
            .map(|&v| {
                if v >= 0.0 && v.fract() == 0.0 {
                    Ok(v as usize)
                } else {
                    Err(TaskError::InvalidArgument(format!("crop limit {v} is not a pixel index")))
                }
            })
            .collect::<Result<Vec<_>, _>>()?
            .try_into()
            .map_err(|v: Vec<usize>| {
                TaskError::InvalidArgument(format!("'crop_limit' needs 4 values, got {}", v.len()))
            })?;
        Ok(Value::from(crop(arrays.view(), limits)?))
    }
}

/// `imars3d.corrections.minus_log`
#[derive(Debug, Clone, Copy)]
pub struct MinusLog;

impl TaskFunction for MinusLog {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("arrays").returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        Ok(Value::from(minus_log(arrays.view())))
    }
}
