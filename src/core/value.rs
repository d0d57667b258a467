//! Tagged values stored in the registry and passed to task functions.

use ndarray::{Array1, Array2, Array3};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::error::TaskError;

/// A runtime value: configuration literals, scalars, paths and image arrays.
///
/// Arrays are reference counted, so handing a stack from the registry to a task
/// never copies pixel data.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
    /// Multiple return values of a task function.
    Tuple(Vec<Value>),
    Angles(Arc<Array1<f64>>),
    Image(Arc<Array2<f64>>),
    Stack(Arc<Array3<f64>>),
}

impl Value {
    /// Converts a configuration literal. Objects have no registry representation.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, String> {
        Ok(match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| format!("number {n} is out of range"))?),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect::<Result<_, _>>()?)
            }
            serde_json::Value::Object(_) => return Err("objects are not supported as task inputs".into()),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Path(_) => "path",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Angles(_) => "1-D array",
            Value::Image(_) => "2-D array",
            Value::Stack(_) => "3-D array",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Paths accept both `Path` and plain strings.
    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            Value::Path(p) => Some(p.clone()),
            Value::Str(s) => Some(PathBuf::from(s)),
            _ => None,
        }
    }

    pub fn as_stack(&self) -> Option<&Arc<Array3<f64>>> {
        match self {
            Value::Stack(s) => Some(s),
            _ => None,
        }
    }

    /// A 1-D sequence of numbers: an `Angles` array or a list of numbers.
    pub fn to_vec_f64(&self) -> Result<Vec<f64>, TaskError> {
        match self {
            Value::Angles(a) => Ok(a.to_vec()),
            Value::List(items) | Value::Tuple(items) => items
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        TaskError::InvalidArgument(format!("expected a number, found {}", v.type_name()))
                    })
                })
                .collect(),
            Value::Image(_) | Value::Stack(_) => Err(TaskError::InvalidArgument(format!(
                "expected a 1-D sequence, found a {}",
                self.type_name()
            ))),
            other => Err(TaskError::InvalidArgument(format!(
                "expected a 1-D sequence, found {}",
                other.type_name()
            ))),
        }
    }

    /// Spreads a return value into positional outputs.
    pub fn into_outputs(self) -> Vec<Value> {
        match self {
            Value::Tuple(items) | Value::List(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::List(items) | Value::Tuple(items) => write!(f, "[{} items]", items.len()),
            Value::Angles(a) => write!(f, "array{:?}", a.dim()),
            Value::Image(a) => write!(f, "array{:?}", a.dim()),
            Value::Stack(a) => write!(f, "array{:?}", a.dim()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<PathBuf> for Value {
    fn from(v: PathBuf) -> Self {
        Value::Path(v)
    }
}

impl From<Array1<f64>> for Value {
    fn from(v: Array1<f64>) -> Self {
        Value::Angles(Arc::new(v))
    }
}

impl From<Array2<f64>> for Value {
    fn from(v: Array2<f64>) -> Self {
        Value::Image(Arc::new(v))
    }
}

impl From<Array3<f64>> for Value {
    fn from(v: Array3<f64>) -> Self {
        Value::Stack(Arc::new(v))
    }
}
