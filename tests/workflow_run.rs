//! Integration tests running complete workflows on small synthetic scans.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use imars3d::imaging::{read_tiff, write_tiff};
use imars3d::prelude::*;
use ndarray::Array2;
use serde_json::{Value as Json, json};
use tempfile::TempDir;

const SIZE: usize = 8;
const OPEN_BEAM: f64 = 10.0;
const DARK: f64 = 1.0;

/// Transmission through a small blob orbiting column 3.5 (pixel edge 4.0).
fn transmission(degrees: f64) -> Array2<f64> {
    let position = 3.5 + 1.5 * degrees.to_radians().cos();
    Array2::from_shape_fn((SIZE, SIZE), |(r, c)| {
        let depth = 0.5 + 0.05 * r as f64;
        (-depth * (-((c as f64 - position).powi(2)) / 1.5).exp()).exp()
    })
}

/// Three projections at 0°, 90° and 180°, two open beams and one dark image.
fn write_scan(dir: &Path) {
    for (i, degrees) in [0u32, 90, 180].into_iter().enumerate() {
        let counts = transmission(degrees as f64).mapv(|t| DARK + (OPEN_BEAM - DARK) * t);
        write_tiff(&dir.join(format!("ct_{degrees:03}_000_{i:04}.tiff")), counts.view()).unwrap();
    }
    for i in 0..2 {
        write_tiff(&dir.join(format!("ob_{i:04}.tiff")), Array2::from_elem((SIZE, SIZE), OPEN_BEAM).view()).unwrap();
    }
    write_tiff(&dir.join("dc_0000.tiff"), Array2::from_elem((SIZE, SIZE), DARK).view()).unwrap();
}

fn document(data_dir: &Path, output_dir: &Path, middle: Vec<Json>, save_input: &str) -> Json {
    let data_dir = data_dir.to_string_lossy();
    let mut tasks = vec![json!({
        "name": "load",
        "function": "imars3d.dataio.load_data",
        "inputs": {
            "ct_dir": data_dir, "ct_fnmatch": "ct_*.tiff",
            "ob_dir": data_dir, "ob_fnmatch": "ob_*.tiff",
            "dc_dir": data_dir, "dc_fnmatch": "dc_*.tiff"
        },
        "outputs": ["ct", "ob", "dc", "rot_angles"]
    })];
    tasks.extend(middle);
    tasks.push(json!({
        "name": "save",
        "function": "imars3d.dataio.save_data",
        "inputs": {"data": save_input, "outputbase": "outputdir", "name": "scan"},
        "outputs": ["saved_to"]
    }));
    json!({
        "facility": "HFIR",
        "instrument": "CG1D",
        "ipts": "IPTS-0000",
        "name": "synthetic",
        "workingdir": data_dir,
        "outputdir": output_dir.to_string_lossy(),
        "tasks": tasks
    })
}

fn normalization_task() -> Json {
    json!({
        "name": "normalization",
        "function": "imars3d.corrections.normalization",
        "inputs": {"arrays": "ct", "flats": "ob", "darks": "dc"},
        "outputs": ["ct"]
    })
}

struct Scan {
    data: TempDir,
    output: TempDir,
}

impl Scan {
    fn new() -> Self {
        let scan = Self {
            data: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        };
        write_scan(scan.data.path());
        scan
    }

    fn engine(&self, middle: Vec<Json>, save_input: &str) -> WorkflowEngine {
        let document = document(self.data.path(), self.output.path(), middle, save_input);
        WorkflowEngine::from_config(Config::from_value(document).unwrap(), FunctionLibrary::with_defaults())
    }
}

fn saved_tiffs(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "tiff"))
        .collect();
    files.sort();
    files
}

#[test]
fn test_normalize_and_save() {
    let scan = Scan::new();
    let mut engine = scan.engine(vec![normalization_task()], "ct");
    engine.run().unwrap();

    let registry = engine.registry();
    let angles = registry.get("rot_angles").unwrap().to_vec_f64().unwrap();
    assert_eq!(angles.len(), 3);
    assert_abs_diff_eq!(angles[1], PI / 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(angles[2], PI, epsilon = 1e-12);

    let normalized = registry.get("ct").unwrap().as_stack().unwrap();
    assert_eq!(normalized.dim(), (3, SIZE, SIZE));
    let expected = transmission(0.0);
    for (got, want) in normalized.index_axis(ndarray::Axis(0), 0).iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-5);
    }

    let saved_to = registry.get("saved_to").unwrap().as_path().unwrap();
    assert!(saved_to.starts_with(scan.output.path()));
    assert_eq!(saved_tiffs(&saved_to).len(), 3);
}

#[test]
fn test_rerun_reproduces_saved_results() {
    let scan = Scan::new();
    let mut engine = scan.engine(vec![normalization_task()], "ct");

    let mut runs = Vec::new();
    for _ in 0..2 {
        engine.run().unwrap();
        let saved_to = engine.registry().get("saved_to").unwrap().as_path().unwrap();
        let images: Vec<Array2<f64>> = saved_tiffs(&saved_to).iter().map(|p| read_tiff(p).unwrap()).collect();
        runs.push(images);
    }
    assert_eq!(runs[0].len(), 3);
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn test_full_reconstruction_pipeline() {
    let scan = Scan::new();
    let middle = vec![
        normalization_task(),
        json!({
            "name": "rotation_center",
            "function": "imars3d.diagnostics.find_rotation_center",
            "inputs": {"arrays": "ct", "angles": "rot_angles"},
            "outputs": ["rot_center"]
        }),
        json!({
            "name": "recon",
            "function": "imars3d.reconstruction.recon",
            "inputs": {"arrays": "ct", "theta": "rot_angles", "center": "rot_center"},
            "outputs": ["ct"]
        }),
    ];
    let mut engine = scan.engine(middle, "ct");
    engine.run().unwrap();

    let registry = engine.registry();
    let center = registry.get("rot_center").unwrap().as_f64().unwrap();
    assert_abs_diff_eq!(center, SIZE as f64 / 2.0, epsilon = 0.25);

    // one reconstructed slice per detector row
    let volume = registry.get("ct").unwrap().as_stack().unwrap();
    assert_eq!(volume.dim(), (SIZE, SIZE, SIZE));
    let saved_to = registry.get("saved_to").unwrap().as_path().unwrap();
    assert_eq!(saved_tiffs(&saved_to).len(), SIZE);
}

#[test]
fn test_missing_open_beam_fails_at_runtime() {
    let scan = Scan::new();
    std::fs::remove_file(scan.data.path().join("ob_0000.tiff")).unwrap();
    std::fs::remove_file(scan.data.path().join("ob_0001.tiff")).unwrap();
    let mut engine = scan.engine(vec![normalization_task()], "ct");

    let err = engine.run().unwrap_err();
    assert!(!err.is_configuration_error());
    assert!(matches!(err, WorkflowError::Task(TaskError::Imaging(_))));
    // nothing after the failing load ran
    assert!(engine.registry().try_get("ct").is_none());
}

#[tokio::test]
async fn test_async_engine_runs_workflow() {
    let scan = Scan::new();
    let mut engine = AsyncWorkflowEngine::new(scan.engine(vec![normalization_task()], "ct"));
    engine.dryrun().await.unwrap();
    engine.run().await.unwrap();
    assert!(engine.registry().get("saved_to").is_ok());
}
