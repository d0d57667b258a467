//! # imars3d-reduce
//!
//! Auto-reduction entry point: given one radiograph of a CT scan, derive the
//! scan, open-beam and dark-current directories from its path, fill the
//! reconstruction template and run it.
//!
//! Exit codes: 0 success, 1 configuration or validation error, 2 runtime
//! failure, 3 incomplete scan (no 180° pair among the CT angles).

use clap::Parser;
use log::{LevelFilter, error, info, warn};
use serde_json::{Value as Json, json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

use imars3d::diagnostics::{RotationCenterOptions, find_180_deg_pairs};
use imars3d::imaging::dataio::{DEFAULT_FNMATCH, FileSource, angle_from_filename};
use imars3d::{
    Config, ConfigSchemaError, DiagnosticError, FunctionLibrary, ImagingError, TaskError, WorkflowEngine,
    WorkflowError,
};

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/reconstruction.json");
const DEFAULT_FACILITY: &str = "HFIR";
const DEFAULT_INSTRUMENT: &str = "CG1D";
const CONFIG_FILE_NAME: &str = "reconstruction_config.json";

#[derive(Parser)]
#[command(name = "imars3d-reduce")]
#[command(about = "Reconstruct a CT scan from one of its radiographs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Any radiograph of the scan, e.g. /HFIR/CG1D/IPTS-1234/raw/ct_scans/sample/img_0001.tiff
    input_radiograph: PathBuf,

    /// Directory receiving the configuration and the reconstructed slices
    output_dir: PathBuf,

    /// Workflow template to fill instead of the built-in one
    #[arg(long)]
    template: Option<PathBuf>,

    /// Validate the generated configuration without running it
    #[arg(long)]
    dry_run: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Error)]
enum ReduceError {
    #[error("Cannot derive scan layout from {path}: {reason}")]
    Layout { path: PathBuf, reason: String },

    #[error("Invalid template: {0}")]
    Template(String),

    #[error(transparent)]
    Config(#[from] ConfigSchemaError),

    #[error("Could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot list CT images: {0}")]
    Listing(#[from] ImagingError),

    #[error("Incomplete scan: {0}")]
    Incomplete(#[from] DiagnosticError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ReduceError {
    fn exit_code(&self) -> u8 {
        match self {
            ReduceError::Layout { .. } | ReduceError::Template(_) | ReduceError::Config(_) => 1,
            ReduceError::Workflow(e) if e.is_configuration_error() => 1,
            ReduceError::Workflow(WorkflowError::Task(TaskError::Diagnostic(DiagnosticError::NoPairsFound {
                ..
            }))) => 3,
            ReduceError::Incomplete(DiagnosticError::NoPairsFound { .. }) => 3,
            ReduceError::Incomplete(_) => 1,
            ReduceError::Write { .. } | ReduceError::Listing(_) | ReduceError::Workflow(_) => 2,
        }
    }
}

/// Where a scan lives, derived from the path of one of its radiographs.
#[derive(Debug, Clone, PartialEq)]
struct ScanLayout {
    facility: String,
    instrument: String,
    ipts: String,
    scan_name: String,
    ct_dir: PathBuf,
    ob_dir: PathBuf,
    dc_dir: PathBuf,
}

impl ScanLayout {
    /// Expects `.../<facility>/<instrument>/IPTS-<n>/raw/<kind>/<scan>/<file>`.
    /// Open beams live under `raw/ob` and dark currents under `raw/df`, in a
    /// subdirectory named after the scan when one exists.
    fn from_radiograph(path: &Path) -> Result<Self, ReduceError> {
        let layout_error = |reason: &str| ReduceError::Layout {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let ct_dir = path.parent().ok_or_else(|| layout_error("no parent directory"))?;
        let scan_name = ct_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| layout_error("scan directory has no name"))?
            .to_string();

        let components: Vec<&str> = path.iter().filter_map(|c| c.to_str()).collect();
        let ipts_index = components
            .iter()
            .position(|c| c.starts_with("IPTS-"))
            .ok_or_else(|| layout_error("no IPTS-<number> component"))?;
        let ipts = components[ipts_index].to_string();
        let (facility, instrument) = match ipts_index {
            // components[0] is the root on absolute paths
            i if i >= 3 => (components[i - 2].to_string(), components[i - 1].to_string()),
            _ => (DEFAULT_FACILITY.to_string(), DEFAULT_INSTRUMENT.to_string()),
        };

        let ipts_root: PathBuf = path.iter().take(ipts_index + 1).collect();
        let raw = ipts_root.join("raw");
        let pick = |kind: &str| {
            let per_scan = raw.join(kind).join(&scan_name);
            if per_scan.is_dir() { per_scan } else { raw.join(kind) }
        };

        Ok(Self {
            facility,
            instrument,
            ipts,
            ct_dir: ct_dir.to_path_buf(),
            ob_dir: pick("ob"),
            dc_dir: pick("df"),
            scan_name,
        })
    }
}

/// Fills the template's metadata and the load task's directories.
fn fill_template(mut template: Json, layout: &ScanLayout, output_dir: &Path) -> Result<Json, ReduceError> {
    let root = template
        .as_object_mut()
        .ok_or_else(|| ReduceError::Template("top level is not an object".into()))?;
    root.insert("facility".into(), json!(layout.facility));
    root.insert("instrument".into(), json!(layout.instrument));
    root.insert("ipts".into(), json!(layout.ipts));
    root.insert("name".into(), json!(layout.scan_name));
    root.insert("workingdir".into(), json!(output_dir.to_string_lossy()));
    root.insert("outputdir".into(), json!(output_dir.to_string_lossy()));

    let load = root
        .get_mut("tasks")
        .and_then(Json::as_array_mut)
        .and_then(|tasks| tasks.first_mut())
        .and_then(Json::as_object_mut)
        .ok_or_else(|| ReduceError::Template("no load task".into()))?;
    let inputs = load
        .entry("inputs")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| ReduceError::Template("load task inputs are not an object".into()))?;
    inputs.insert("ct_dir".into(), json!(layout.ct_dir.to_string_lossy()));
    inputs.insert("ob_dir".into(), json!(layout.ob_dir.to_string_lossy()));
    if layout.dc_dir.is_dir() {
        inputs.insert("dc_dir".into(), json!(layout.dc_dir.to_string_lossy()));
    } else {
        warn!("No dark-current directory at {}, skipping dark correction", layout.dc_dir.display());
        inputs.remove("dc_dir");
        inputs.remove("dc_fnmatch");
    }
    Ok(template)
}

/// Fails with `NoPairsFound` when no two CT angles are 180° apart, before any
/// image is read. Scans whose file names carry no angles are left to the run.
fn check_scan_complete(config: &Config, layout: &ScanLayout) -> Result<(), ReduceError> {
    let pattern = config
        .tasks
        .first()
        .and_then(|load| load.inputs.get("ct_fnmatch"))
        .and_then(Json::as_str)
        .unwrap_or(DEFAULT_FNMATCH);
    let files = FileSource::Pattern(layout.ct_dir.clone(), pattern.to_string()).resolve()?;
    let Some(angles) = files.iter().map(|f| angle_from_filename(f)).collect::<Option<Vec<f64>>>() else {
        warn!("CT file names in {} carry no rotation angles, skipping the scan check", layout.ct_dir.display());
        return Ok(());
    };
    if angles.is_empty() {
        return Ok(());
    }

    let atol = RotationCenterOptions::default().atol_deg;
    let (low, _) = find_180_deg_pairs(&angles, atol, true)?;
    if low.is_empty() {
        return Err(DiagnosticError::NoPairsFound { atol }.into());
    }
    info!("{} CT images with {} 180-degree pair(s)", angles.len(), low.len());
    Ok(())
}

fn reduce(cli: &Cli) -> Result<(), ReduceError> {
    let layout = ScanLayout::from_radiograph(&cli.input_radiograph)?;
    info!(
        "Scan '{}' of {} ({} / {})",
        layout.scan_name, layout.ipts, layout.facility, layout.instrument
    );

    let template_text = match &cli.template {
        Some(path) => std::fs::read_to_string(path).map_err(ConfigSchemaError::from)?,
        None => DEFAULT_TEMPLATE.to_string(),
    };
    let template: Json = serde_json::from_str(&template_text).map_err(ConfigSchemaError::from)?;
    let config = Config::from_value(fill_template(template, &layout, &cli.output_dir)?)?;

    std::fs::create_dir_all(&cli.output_dir).map_err(|source| ReduceError::Write {
        path: cli.output_dir.clone(),
        source,
    })?;
    let config_path = cli.output_dir.join(CONFIG_FILE_NAME);
    std::fs::write(&config_path, config.to_json_string()?).map_err(|source| ReduceError::Write {
        path: config_path.clone(),
        source,
    })?;
    info!("Configuration written to {}", config_path.display());

    let mut engine = WorkflowEngine::from_config(config, FunctionLibrary::with_defaults());
    let report = engine.dryrun()?;
    if let Some(config) = engine.config() {
        check_scan_complete(config, &layout)?;
    }
    if report.has_warnings() {
        warn!("Dry-run reported warnings");
    }
    if cli.dry_run {
        info!("Dry-run only, not executing");
        return Ok(());
    }
    engine.run()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match reduce(&cli) {
        Ok(()) => {
            info!("Reduction completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Reduction failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
