use std::path::PathBuf;

use crate::core::error::TaskError;
use crate::core::schema::ParameterSchema;
use crate::core::task::{TaskArgs, TaskFunction};
use crate::core::value::Value;
use crate::imaging::dataio::{DEFAULT_FNMATCH, FileSource, LoadRequest, load_data, save_data};
use crate::tasks::{parallel, require_stack};

/// `imars3d.dataio.load_data`: returns `(ct, ob, dc, rot_angles)`.
///
/// Each image kind comes either from an explicit file list (`ct_files`) or
/// from a directory and glob pattern (`ct_dir` + `ct_fnmatch`), never both,
/// which is why the schema is context dependent.
#[derive(Debug, Clone, Copy)]
pub struct LoadData;

impl LoadData {
    fn source(args: &TaskArgs, kind: &str) -> Result<FileSource, TaskError> {
        let files = args.optional_paths(&format!("{kind}_files"))?;
        let dir = args.optional_path(&format!("{kind}_dir"))?;
        match (files, dir) {
            (Some(_), Some(_)) => Err(TaskError::InvalidArgument(format!(
                "'{kind}_files' and '{kind}_dir' are mutually exclusive"
            ))),
            (Some(files), None) => Ok(FileSource::Files(files)),
            (None, Some(dir)) => {
                let pattern = args.optional_str(&format!("{kind}_fnmatch"))?.unwrap_or(DEFAULT_FNMATCH);
                Ok(FileSource::Pattern(dir, pattern.to_string()))
            }
            (None, None) => Ok(FileSource::None),
        }
    }
}

impl TaskFunction for LoadData {
    fn schema(&self) -> ParameterSchema {
        let mut schema = ParameterSchema::new();
        for kind in ["ct", "ob", "dc"] {
            schema = schema
                .optional(format!("{kind}_files"), Value::None)
                .optional_literal(format!("{kind}_dir"), Value::None)
                .optional_literal(format!("{kind}_fnmatch"), DEFAULT_FNMATCH);
        }
        schema
            .optional("rot_angles", Value::None)
            .optional("max_workers", 0i64)
            .returns(4)
            .context_dependent()
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let request = LoadRequest {
            ct: Self::source(&args, "ct")?,
            ob: Self::source(&args, "ob")?,
            dc: Self::source(&args, "dc")?,
            rot_angles: args.optional_vec_f64("rot_angles")?,
            parallel: parallel(&args)?,
        };
        let loaded = load_data(&request)?;
        Ok(Value::Tuple(vec![
            Value::from(loaded.ct),
            Value::from(loaded.ob),
            loaded.dc.map(Value::from).unwrap_or_default(),
            Value::from(loaded.rot_angles),
        ]))
    }
}

/// `imars3d.dataio.save_data`: writes the stack and returns the output directory.
#[derive(Debug, Clone, Copy)]
pub struct SaveData;

impl TaskFunction for SaveData {
    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("data")
            .required("outputbase")
            .optional_literal("name", Value::None)
            .optional("rot_angles", Value::None)
            .returns(1)
    }

    fn call(&self, args: TaskArgs) -> Result<Value, TaskError> {
        let data = require_stack(&args, "data")?;
        let outputbase: PathBuf = args.path("outputbase")?;
        let name = args.optional_str("name")?.unwrap_or("data");
        let angles = args.optional_vec_f64("rot_angles")?;
        let dir = save_data(data.view(), &outputbase, name, angles.as_deref())?;
        Ok(Value::Path(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::dataio::write_tiff;
    use ndarray::{Array2, Array3};
    use tempfile::tempdir;

    #[test]
    fn test_load_from_explicit_files_with_angles() {
        let dir = tempdir().unwrap();
        let mut ct = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("ct_{i}.tiff"));
            write_tiff(&path, Array2::from_elem((2, 3), i as f64).view()).unwrap();
            ct.push(Value::Str(path.to_string_lossy().into_owned()));
        }
        let ob = dir.path().join("ob.tiff");
        write_tiff(&ob, Array2::from_elem((2, 3), 9.0).view()).unwrap();

        let args = TaskArgs::new()
            .with("ct_files", Value::List(ct))
            .with("ob_files", Value::Path(ob))
            .with("rot_angles", Value::List(vec![Value::Int(0), Value::Int(90), Value::Int(180)]));
        let outputs = LoadData.call(args).unwrap().into_outputs();
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs[0].as_stack().unwrap().dim(), (3, 2, 3));
        assert!(outputs[2].is_none());
        let angles = outputs[3].to_vec_f64().unwrap();
        assert!((angles[2] - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_directory_default_pattern_matches_tif_and_tiff() {
        let dir = tempdir().unwrap();
        write_tiff(&dir.path().join("ct_000_000_0000.tif"), Array2::from_elem((2, 2), 1.0).view()).unwrap();
        write_tiff(&dir.path().join("ct_180_000_0001.tiff"), Array2::from_elem((2, 2), 2.0).view()).unwrap();
        let ob_dir = tempdir().unwrap();
        write_tiff(&ob_dir.path().join("ob_0000.tif"), Array2::from_elem((2, 2), 4.0).view()).unwrap();

        let args = TaskArgs::new()
            .with("ct_dir", Value::Path(dir.path().to_path_buf()))
            .with("ob_dir", Value::Path(ob_dir.path().to_path_buf()));
        let outputs = LoadData.call(args).unwrap().into_outputs();
        assert_eq!(outputs[0].as_stack().unwrap().dim(), (2, 2, 2));
        assert_eq!(outputs[1].as_stack().unwrap().dim(), (1, 2, 2));

        let schema = LoadData.schema();
        let default = schema.get("ct_fnmatch").unwrap().default.as_ref().unwrap();
        assert_eq!(default.as_str(), Some(DEFAULT_FNMATCH));
    }

    #[test]
    fn test_files_and_dir_are_exclusive() {
        let args = TaskArgs::new()
            .with("ct_files", Value::List(vec![Value::Str("a.tiff".into())]))
            .with("ct_dir", "raw/ct");
        assert!(matches!(LoadData.call(args), Err(TaskError::InvalidArgument(_))));
    }

    #[test]
    fn test_save_returns_directory() {
        let dir = tempdir().unwrap();
        let args = TaskArgs::new()
            .with("data", Array3::<f64>::ones((3, 2, 2)))
            .with("outputbase", dir.path().to_path_buf())
            .with("name", "scan");
        let out = SaveData.call(args).unwrap().as_path().unwrap();
        assert!(out.starts_with(dir.path()));
        assert_eq!(std::fs::read_dir(out).unwrap().count(), 3);
    }

    #[test]
    fn test_load_schema_is_context_dependent() {
        let schema = LoadData.schema();
        assert!(schema.context_dependent);
        assert_eq!(schema.returns, Some(4));
        assert!(schema.get("ct_dir").unwrap().literal);
        assert!(!schema.get("ct_files").unwrap().literal);
    }
}
