//! Output file names and per-level result files

use std::path::{Path, PathBuf};

use mseg_core::io::{write_image, write_labels};
use mseg_core::Result;
use mseg_segmentation::segmenter::result::{cartoon_image, compact_labels};
use mseg_segmentation::{
    ImageModel, ImageType, LabelGrid, Outputter, Pyramid, RegionTable, SegmentationParams,
};
use tracing::{debug, info};

/// Significant digits for floating point parameters in file names
const NAME_PRECISION: usize = 3;

/// Format like C's `%g`: `precision` significant digits, trailing zeros
/// dropped, scientific notation for very small or large magnitudes.
pub fn format_g(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".into();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let precision = precision.max(1);

    // exponent after rounding to `precision` digits
    let sci = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return value.to_string();
    };

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Base of every result file name, built from the input name and parameters:
///
/// `<input>_<radar|optical>_<cartoon|texture>[_<format>]_<levels>_<similarity>`
/// followed by `_<enl>_<confidence>` for radar cartoon, `_<cv>` for radar
/// texture, `_<cv>_<confidence>` for optical, and finally `_<min_area>`.
pub fn base_name(input: &Path, params: &SegmentationParams) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    let g = |v: Option<f64>| format_g(v.unwrap_or(0.0), NAME_PRECISION);

    let mut parts = vec![
        stem,
        params.image_type.to_string(),
        params.image_model.to_string(),
    ];
    if params.image_type == ImageType::Radar {
        parts.push(params.radar_format.to_string());
    }
    parts.push(params.levels.to_string());
    parts.push(format_g(params.similarity, NAME_PRECISION));

    match (params.image_type, params.image_model) {
        (ImageType::Radar, ImageModel::Cartoon) => {
            parts.push(g(params.enl));
            parts.push(g(params.confidence_level));
        }
        (ImageType::Radar, ImageModel::Texture) => parts.push(g(params.cv)),
        (ImageType::Optical, _) => {
            parts.push(g(params.cv));
            parts.push(g(params.confidence_level));
        }
    }
    parts.push(params.min_area.to_string());
    parts.join("_")
}

/// Writes the labelled image (and optionally the cartoon image) of every
/// reported level into one directory.
#[derive(Debug)]
pub struct FileOutputter {
    dir: PathBuf,
    input_name: String,
    base: String,
    write_pyramid: bool,
    write_cartoon: bool,
    level_suffix: bool,
    written: Vec<PathBuf>,
}

impl FileOutputter {
    pub fn new(dir: &Path, input: &Path, params: &SegmentationParams) -> Self {
        let input_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        Self {
            dir: dir.to_path_buf(),
            input_name,
            base: base_name(input, params),
            write_pyramid: params.output_pyramid,
            write_cartoon: false,
            level_suffix: params.notify_intermediate_results,
            written: Vec::new(),
        }
    }

    /// Also write the per-region mean, variance and CV planes
    pub fn with_cartoon(mut self, enabled: bool) -> Self {
        self.write_cartoon = enabled;
        self
    }

    /// Append `_level_<n>_nreg_<count>` to every result name
    pub fn with_level_suffix(mut self, enabled: bool) -> Self {
        self.level_suffix = enabled;
        self
    }

    /// Files written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn result_path(&self, kind: &str, level: usize, n_regions: usize) -> PathBuf {
        let name = if self.level_suffix {
            format!("{}_{}_level_{}_nreg_{}.tif", self.base, kind, level, n_regions)
        } else {
            format!("{}_{}.tif", self.base, kind)
        };
        self.dir.join(name)
    }
}

impl Outputter for FileOutputter {
    fn on_pyramid_built(&mut self, pyramid: &Pyramid) -> Result<()> {
        if !self.write_pyramid {
            return Ok(());
        }
        for i in 0..pyramid.n_levels() {
            let path = self
                .dir
                .join(format!("{}_pyramid_level_{}.tif", self.input_name, i));
            write_image(pyramid.level(i)?, &path)?;
            debug!("Pyramid level {} written to {}", i, path.display());
            self.written.push(path);
        }
        Ok(())
    }

    fn on_level_result(&mut self, labels: &LabelGrid, regions: &RegionTable, level: usize) -> Result<()> {
        let labelled = self.result_path("labelled", level, regions.len());
        write_labels(&compact_labels(labels, regions), &labelled)?;
        info!("Level {} labels written to {}", level, labelled.display());
        self.written.push(labelled);

        if self.write_cartoon {
            let cartoon = self.result_path("cartoon", level, regions.len());
            write_image(&cartoon_image(labels, regions)?, &cartoon)?;
            self.written.push(cartoon);
        }
        Ok(())
    }
}
