//! Radiograph stack loading and saving as TIFF files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Local;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};

use crate::imaging::ImagingError;
use crate::parallel::ParallelConfig;

/// Reads a single-channel TIFF image as `f64`.
pub fn read_tiff(path: &Path) -> Result<Array2<f64>, ImagingError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
        return Err(ImagingError::UnsupportedImage(format!(
            "{} is not a grayscale image",
            path.display()
        )));
    }
    let (width, height) = decoder.dimensions()?;
    let pixels: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(ImagingError::UnsupportedImage(format!(
                "{} has an unsupported sample format",
                path.display()
            )));
        }
    };
    Array2::from_shape_vec((height as usize, width as usize), pixels)
        .map_err(|e| ImagingError::UnsupportedImage(format!("{}: {e}", path.display())))
}

/// Writes `image` as a 32-bit float grayscale TIFF.
pub fn write_tiff(path: &Path, image: ArrayView2<f64>) -> Result<(), ImagingError> {
    let (height, width) = image.dim();
    let pixels: Vec<f32> = image.iter().map(|&v| v as f32).collect();
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    encoder.write_image::<colortype::Gray32Float>(width as u32, height as u32, &pixels)?;
    Ok(())
}

/// Loads images in parallel and stacks them along the first axis.
pub fn load_stack(paths: &[PathBuf], parallel: ParallelConfig) -> Result<Array3<f64>, ImagingError> {
    let images = parallel.install(|| {
        paths
            .par_iter()
            .map(|path| read_tiff(path))
            .collect::<Result<Vec<_>, ImagingError>>()
    })??;

    let Some(first) = images.first() else {
        return Ok(Array3::zeros((0, 0, 0)));
    };
    let shape = first.dim();
    let mut stack = Array3::zeros((images.len(), shape.0, shape.1));
    for (mut slot, image) in stack.outer_iter_mut().zip(images.iter()) {
        if image.dim() != shape {
            return Err(ImagingError::ShapeMismatch {
                expected: shape,
                actual: image.dim(),
            });
        }
        slot.assign(image);
    }
    Ok(stack)
}

/// Glob pattern used when a directory is given without one. Matches both
/// `.tif` and `.tiff`.
pub const DEFAULT_FNMATCH: &str = "*.tif*";

/// Rotation angle in degrees encoded in a file name ending in `_DDD_FFF_NNNN`,
/// e.g. `sample_0070_300_440_0520.tiff` is at 300.440°.
pub fn angle_from_filename(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let fields: Vec<&str> = stem.split('_').collect();
    if fields.len() < 3 {
        return None;
    }
    let degrees = fields[fields.len() - 3];
    let fraction = fields[fields.len() - 2];
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(degrees) || !all_digits(fraction) {
        return None;
    }
    format!("{degrees}.{fraction}").parse().ok()
}

/// Where the files of one image kind come from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FileSource {
    #[default]
    None,
    Files(Vec<PathBuf>),
    /// Directory and glob pattern, e.g. `("raw/ct", "*.tiff")`.
    Pattern(PathBuf, String),
}

impl FileSource {
    /// Resolves the source into a sorted file list.
    pub fn resolve(&self) -> Result<Vec<PathBuf>, ImagingError> {
        match self {
            FileSource::None => Ok(Vec::new()),
            FileSource::Files(files) => Ok(files.clone()),
            FileSource::Pattern(dir, pattern) => {
                let full = dir.join(pattern);
                let full = full.to_string_lossy();
                let mut files = glob::glob(&full)?.collect::<Result<Vec<_>, _>>()?;
                files.sort();
                Ok(files)
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FileSource::None)
    }
}

/// Inputs of [`load_data`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadRequest {
    pub ct: FileSource,
    pub ob: FileSource,
    pub dc: FileSource,
    /// Explicit rotation angles in degrees; parsed from CT file names otherwise.
    pub rot_angles: Option<Vec<f64>>,
    pub parallel: ParallelConfig,
}

/// Result of [`load_data`]. Angles are in radians.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub ct: Array3<f64>,
    pub ob: Array3<f64>,
    pub dc: Option<Array3<f64>>,
    pub rot_angles: Array1<f64>,
}

/// Loads the CT, open-beam and (optional) dark-current stacks.
pub fn load_data(request: &LoadRequest) -> Result<LoadedData, ImagingError> {
    let ct_files = request.ct.resolve()?;
    if ct_files.is_empty() {
        return Err(ImagingError::NoFiles("no CT images were given or matched".into()));
    }
    let ob_files = request.ob.resolve()?;
    if ob_files.is_empty() {
        return Err(ImagingError::NoFiles("no open beam images were given or matched".into()));
    }
    let dc_files = request.dc.resolve()?;

    let degrees = match &request.rot_angles {
        Some(angles) => angles.clone(),
        None => ct_files
            .iter()
            .map(|path| {
                angle_from_filename(path).ok_or_else(|| {
                    ImagingError::InvalidArgument(format!(
                        "cannot read a rotation angle from {}",
                        path.display()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    if degrees.len() != ct_files.len() {
        return Err(ImagingError::InvalidArgument(format!(
            "{} CT images but {} rotation angles",
            ct_files.len(),
            degrees.len()
        )));
    }

    log::info!(
        "Loading {} CT, {} open beam and {} dark current image(s)",
        ct_files.len(),
        ob_files.len(),
        dc_files.len()
    );
    let ct = load_stack(&ct_files, request.parallel)?;
    let ob = load_stack(&ob_files, request.parallel)?;
    let dc = if dc_files.is_empty() {
        None
    } else {
        Some(load_stack(&dc_files, request.parallel)?)
    };

    Ok(LoadedData {
        ct,
        ob,
        dc,
        rot_angles: degrees.iter().map(|d| d.to_radians()).collect(),
    })
}

/// Writes every image of `data` into `outputbase/<name>_<YYYYMMDDHHMM>/`
/// as `<name>_00000.tiff`, `<name>_00001.tiff`, …, plus `rot_angles.json`
/// when angles are given. Returns the created directory.
pub fn save_data(
    data: ArrayView3<f64>,
    outputbase: &Path,
    name: &str,
    rot_angles: Option<&[f64]>,
) -> Result<PathBuf, ImagingError> {
    let stamp = Local::now().format("%Y%m%d%H%M");
    let dir = outputbase.join(format!("{name}_{stamp}"));
    std::fs::create_dir_all(&dir)?;

    for (i, image) in data.axis_iter(Axis(0)).enumerate() {
        write_tiff(&dir.join(format!("{name}_{i:05}.tiff")), image)?;
    }
    if let Some(angles) = rot_angles {
        let file = File::create(dir.join("rot_angles.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), angles)?;
    }
    log::info!("Saved {} image(s) to {}", data.len_of(Axis(0)), dir.display());
    Ok(dir)
}
