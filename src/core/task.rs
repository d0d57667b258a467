use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array3;

use crate::core::error::TaskError;
use crate::core::schema::ParameterSchema;
use crate::core::value::Value;

/// A callable step of a workflow with a declared parameter schema.
pub trait TaskFunction: Send + Sync + 'static {
    /// The parameters this function accepts, used by the dry-run and the executor.
    fn schema(&self) -> ParameterSchema;

    /// Runs the function with arguments resolved by the engine.
    fn call(&self, args: TaskArgs) -> Result<Value, TaskError>;
}

/// Keyword arguments handed to a task function.
#[derive(Debug, Clone, Default)]
pub struct TaskArgs {
    values: HashMap<String, Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// An argument that is present and not `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_none())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn require(&self, name: &str) -> Result<&Value, TaskError> {
        self.get(name)
            .ok_or_else(|| TaskError::MissingArgument(name.to_string()))
    }

    pub fn stack(&self, name: &str) -> Result<Arc<Array3<f64>>, TaskError> {
        match self.require(name)? {
            Value::Stack(stack) => Ok(Arc::clone(stack)),
            other => Err(TaskError::InvalidArgument(format!(
                "'{name}' must be a 3-D array, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn optional_stack(&self, name: &str) -> Result<Option<Arc<Array3<f64>>>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.stack(name).map(Some),
        }
    }

    pub fn f64_or(&self, name: &str, fallback: f64) -> Result<f64, TaskError> {
        match self.get(name) {
            None => Ok(fallback),
            Some(v) => v.as_f64().ok_or_else(|| {
                TaskError::InvalidArgument(format!("'{name}' must be a number, found {}", v.type_name()))
            }),
        }
    }

    pub fn optional_f64(&self, name: &str) -> Result<Option<f64>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.f64_or(name, 0.0).map(Some),
        }
    }

    pub fn i64_or(&self, name: &str, fallback: i64) -> Result<i64, TaskError> {
        match self.get(name) {
            None => Ok(fallback),
            Some(v) => v.as_i64().ok_or_else(|| {
                TaskError::InvalidArgument(format!("'{name}' must be an integer, found {}", v.type_name()))
            }),
        }
    }

    pub fn bool_or(&self, name: &str, fallback: bool) -> Result<bool, TaskError> {
        match self.get(name) {
            None => Ok(fallback),
            Some(v) => v.as_bool().ok_or_else(|| {
                TaskError::InvalidArgument(format!("'{name}' must be a boolean, found {}", v.type_name()))
            }),
        }
    }

    pub fn optional_str(&self, name: &str) -> Result<Option<&str>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| {
                TaskError::InvalidArgument(format!("'{name}' must be a string, found {}", v.type_name()))
            }),
        }
    }

    pub fn path(&self, name: &str) -> Result<PathBuf, TaskError> {
        let value = self.require(name)?;
        value.as_path().ok_or_else(|| {
            TaskError::InvalidArgument(format!("'{name}' must be a path, found {}", value.type_name()))
        })
    }

    pub fn optional_path(&self, name: &str) -> Result<Option<PathBuf>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.path(name).map(Some),
        }
    }

    /// A list of paths (or a single path).
    pub fn optional_paths(&self, name: &str) -> Result<Option<Vec<PathBuf>>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .iter()
                .map(|v| {
                    v.as_path().ok_or_else(|| {
                        TaskError::InvalidArgument(format!("'{name}' must contain paths, found {}", v.type_name()))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => self.path(name).map(|p| Some(vec![p])),
        }
    }

    pub fn optional_vec_f64(&self, name: &str) -> Result<Option<Vec<f64>>, TaskError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v.to_vec_f64().map(Some),
        }
    }

    /// Thread count for parallel kernels; 0 selects the global pool.
    pub fn max_workers(&self) -> Result<usize, TaskError> {
        let workers = self.i64_or("max_workers", 0)?;
        usize::try_from(workers)
            .map_err(|_| TaskError::InvalidArgument(format!("'max_workers' must be non-negative, found {workers}")))
    }
}

/// Adapts a closure and an explicit schema into a [`TaskFunction`].
#[derive(Clone)]
pub struct FnTask<F> {
    schema: ParameterSchema,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(TaskArgs) -> Result<Value, TaskError> + Send + Sync + 'static,
{
    pub fn new(schema: ParameterSchema, func: F) -> Self {
        Self { schema, func }
    }
}

impl<F> TaskFunction for FnTask<F>
where
    F: Fn(TaskArgs) -> Result<Value, TaskError> + Send + Sync + 'static,
{
    fn schema(&self) -> ParameterSchema {
        self.schema.clone()
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        (self.func)(args)
    }
}
