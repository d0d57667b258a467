use crate::core::error::TaskError;
use crate::core::schema::ParameterSchema;
use crate::core::task::{TaskArgs, TaskFunction};
use crate::core::value::Value;
use crate::imaging::recon::reconstruct;
use crate::tasks::{parallel, require_stack, require_vec_f64};

/// `imars3d.reconstruction.recon`: filtered back-projection of every detector row.
///
/// `theta` is in radians; `center` defaults to the middle of the detector.
#[derive(Debug, Clone, Copy)]
pub struct Recon;

impl TaskFunction for Recon {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("arrays")
            .required("theta")
            .optional("center", Value::None)
            .optional("max_workers", 0i64)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let arrays = require_stack(&args, "arrays")?;
        let theta = require_vec_f64(&args, "theta")?;
        let center = args.optional_f64("center")?;
        let volume = reconstruct(arrays.view(), &theta, center, parallel(&args)?)?;
        Ok(Value::from(volume))
    }
}
