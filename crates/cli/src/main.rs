//! mseg CLI - multi-resolution region-growing segmentation

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mseg_core::io::{read_image, write_image};
use mseg_core::{GlobalStatistics, Image, StatisticsProvider};
use mseg_parallel::{ProcessingMode, TiledSegmenter};
use mseg_segmentation::pyramid::compute_max_levels;
use mseg_segmentation::{
    CvTable, ImageModel, ImageType, MultiSeg, Outputter, Progress, Pyramid, RadarFormat,
    SegmentationParams,
};

use output::FileOutputter;

/// Smallest side, in pixels, of the coarsest pyramid level
const MIN_LEVEL_SIZE: usize = 2;

#[derive(Parser)]
#[command(name = "mseg")]
#[command(author, version, about = "Multi-resolution region-growing segmentation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show image information and band statistics
    Info {
        /// Input TIFF file
        input: PathBuf,
    },
    /// Build the 2×2 mean pyramid and write every level
    Pyramid {
        /// Input TIFF file
        input: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Levels above full resolution
        #[arg(short, long, default_value = "3")]
        levels: usize,
        /// Bands to keep (comma separated)
        #[arg(short, long, value_delimiter = ',', default_value = "0")]
        bands: Vec<usize>,
    },
    /// Segment an image into homogeneous regions
    Segment(SegmentArgs),
    /// Look up a critical coefficient of variation
    CvTable {
        /// Confidence level (0.999, 0.995, 0.99, 0.95, 0.90, 0.85, 0.80)
        #[arg(short, long, default_value = "0.95")]
        confidence: f64,
        /// Equivalent number of looks
        #[arg(short, long)]
        looks: usize,
        /// Region size in pixels
        #[arg(short, long)]
        samples: usize,
        /// Directory holding the tab_*.csv files
        #[arg(long, default_value = "./tables")]
        tables_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct SegmentArgs {
    /// Input TIFF file
    input: PathBuf,
    /// Output directory
    output_dir: PathBuf,
    /// Image type: radar or optical
    #[arg(short = 't', long, default_value = "optical")]
    image_type: String,
    /// Image model: cartoon or texture
    #[arg(short = 'm', long, default_value = "cartoon")]
    model: String,
    /// Radar format: amplitude, intensity or db
    #[arg(long, default_value = "intensity")]
    radar_format: String,
    /// Bands to segment on (comma separated)
    #[arg(short, long, value_delimiter = ',', default_value = "0")]
    bands: Vec<usize>,
    /// Pyramid levels above full resolution
    #[arg(short, long, default_value = "0")]
    levels: usize,
    /// Similarity threshold (dB for radar)
    #[arg(short, long)]
    similarity: f64,
    /// Minimum region area in pixels
    #[arg(short = 'a', long, default_value = "1")]
    min_area: usize,
    /// Equivalent number of looks (radar cartoon)
    #[arg(long)]
    enl: Option<f64>,
    /// Confidence level of the homogeneity tests
    #[arg(short, long, default_value = "0.95")]
    confidence: f64,
    /// Coefficient of variation threshold (optical, radar texture)
    #[arg(long)]
    cv: Option<f64>,
    /// Threshold annealing steps
    #[arg(long, default_value = "0")]
    annealing_steps: usize,
    /// Growth scans per call
    #[arg(long, default_value = "100")]
    max_iterations: usize,
    /// Merge without requiring mutual best fit
    #[arg(long)]
    no_mutual_best_fit: bool,
    /// Move to the next region after one merge
    #[arg(long)]
    no_grow_until_stop: bool,
    /// Visit regions in id order instead of shuffled
    #[arg(long)]
    no_random_seeds: bool,
    /// Seed for the shuffled visiting order
    #[arg(long, default_value = "0")]
    seed: u64,
    /// Accept a merge when any band agrees
    #[arg(long)]
    lenient: bool,
    /// Split heterogeneous regions at full resolution too
    #[arg(long)]
    split_last_level: bool,
    /// Pixels per region sampled for variance at the coarsest level
    #[arg(long)]
    variance_sample_cap: Option<usize>,
    /// Directory holding the CV tables
    #[arg(long, default_value = "./tables")]
    tables_dir: PathBuf,
    /// Write every pyramid level
    #[arg(long)]
    output_pyramid: bool,
    /// Write the result of every level
    #[arg(long)]
    intermediate: bool,
    /// Also write the cartoon image (mean, variance, CV per band)
    #[arg(long)]
    cartoon: bool,
    /// Segment in tiles of this size and join them at the seams
    #[arg(long)]
    tile_size: Option<usize>,
    /// Worker threads for tiled mode (1 = sequential)
    #[arg(long)]
    threads: Option<usize>,
    /// Seam join distance for tiled mode (default: similarity)
    #[arg(long)]
    reconcile_threshold: Option<f64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging was already initialised");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Progress bar fed by the engine, one step per level or tile
struct BarProgress(ProgressBar);

impl BarProgress {
    fn new(msg: &str) -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self(pb)
    }
}

impl Progress for BarProgress {
    fn set_steps(&self, steps: u64) {
        self.0.set_length(steps);
    }

    fn advance(&self, steps: u64) {
        self.0.inc(steps);
    }
}

fn read_input(path: &Path) -> Result<Image> {
    let pb = spinner("Reading image...");
    let image = read_image(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} x {}, {} band(s)",
        image.cols(),
        image.rows(),
        image.n_bands()
    );
    Ok(image)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_image_type(s: &str) -> Result<ImageType> {
    match s.to_lowercase().as_str() {
        "radar" | "sar" => Ok(ImageType::Radar),
        "optical" | "opt" => Ok(ImageType::Optical),
        _ => anyhow::bail!("Unknown image type: {}. Use radar or optical.", s),
    }
}

fn parse_image_model(s: &str) -> Result<ImageModel> {
    match s.to_lowercase().as_str() {
        "cartoon" => Ok(ImageModel::Cartoon),
        "texture" => Ok(ImageModel::Texture),
        _ => anyhow::bail!("Unknown image model: {}. Use cartoon or texture.", s),
    }
}

fn parse_radar_format(s: &str) -> Result<RadarFormat> {
    match s.to_lowercase().as_str() {
        "amplitude" | "amp" => Ok(RadarFormat::Amplitude),
        "intensity" | "int" => Ok(RadarFormat::Intensity),
        "db" => Ok(RadarFormat::Db),
        _ => anyhow::bail!("Unknown radar format: {}. Use amplitude, intensity or db.", s),
    }
}

fn processing_mode(threads: Option<usize>) -> ProcessingMode {
    match threads {
        None => ProcessingMode::Parallel,
        Some(0) | Some(1) => ProcessingMode::Sequential,
        Some(n) => ProcessingMode::ParallelWith(n),
    }
}

impl SegmentArgs {
    fn to_params(&self) -> Result<SegmentationParams> {
        let image_type = parse_image_type(&self.image_type)?;
        let image_model = parse_image_model(&self.model)?;
        let radar_format = parse_radar_format(&self.radar_format)?;

        let radar_cartoon = image_type == ImageType::Radar && image_model == ImageModel::Cartoon;
        if radar_cartoon && self.enl.is_none() {
            anyhow::bail!("--enl is required for radar cartoon segmentation");
        }
        let cv = match (radar_cartoon, self.cv) {
            (true, cv) => cv,
            (false, Some(cv)) => Some(cv),
            (false, None) if image_type == ImageType::Optical => Some(f64::MAX),
            (false, None) => anyhow::bail!("--cv is required for radar texture segmentation"),
        };

        Ok(SegmentationParams {
            bands: self.bands.clone(),
            image_type,
            image_model,
            radar_format,
            levels: self.levels,
            similarity: self.similarity,
            min_area: self.min_area,
            enl: self.enl,
            confidence_level: Some(self.confidence),
            cv,
            annealing_steps: self.annealing_steps,
            max_iterations: self.max_iterations,
            mutual_best_fit: !self.no_mutual_best_fit,
            grow_until_stop: !self.no_grow_until_stop,
            use_random_seeds: !self.no_random_seeds,
            seed: self.seed,
            strict_mode: !self.lenient,
            split_last_level: self.split_last_level,
            variance_sample_cap: self.variance_sample_cap,
            tables_dir: self.tables_dir.clone(),
            output_pyramid: self.output_pyramid,
            notify_intermediate_results: self.intermediate,
        })
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_info(input: &Path) -> Result<()> {
    let image = read_input(input)?;
    let (rows, cols) = image.shape();
    let bands: Vec<usize> = (0..image.n_bands()).collect();
    let stats = GlobalStatistics.mean_and_variance(&image, &bands);

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
    println!("Bands: {}", image.n_bands());
    println!(
        "Max pyramid levels: {}",
        compute_max_levels(rows, cols, MIN_LEVEL_SIZE)
    );
    println!("\nStatistics:");
    for (b, ((mean, variance), count)) in stats
        .mean
        .iter()
        .zip(&stats.variance)
        .zip(&stats.count)
        .enumerate()
    {
        let range = image.band(b)?.statistics();
        println!(
            "  Band {}: min {:.4}, max {:.4}, mean {:.4}, variance {:.4}",
            b,
            range.min.unwrap_or(f64::NAN),
            range.max.unwrap_or(f64::NAN),
            mean,
            variance
        );
        println!(
            "    Valid cells: {} ({:.1}%)",
            count,
            100.0 * *count as f64 / (rows * cols).max(1) as f64
        );
    }
    Ok(())
}

fn run_pyramid(input: &Path, output_dir: &Path, levels: usize, bands: &[usize]) -> Result<()> {
    let image = read_input(input)?;
    ensure_dir(output_dir)?;

    let max_levels = compute_max_levels(image.rows(), image.cols(), MIN_LEVEL_SIZE);
    if levels > max_levels {
        anyhow::bail!(
            "{} levels requested, the image allows at most {}",
            levels,
            max_levels
        );
    }

    let start = Instant::now();
    let pb = spinner("Building pyramid...");
    let pyramid = Pyramid::new(&image, levels, bands).context("Failed to build pyramid")?;
    pb.finish_and_clear();

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    for i in 0..pyramid.n_levels() {
        let level = pyramid.level(i)?;
        let path = output_dir.join(format!("{}_pyramid_level_{}.tif", stem, i));
        write_image(level, &path).context("Failed to write pyramid level")?;
        println!("Level {}: {} x {} -> {}", i, level.cols(), level.rows(), path.display());
    }
    println!("  Processing time: {:.2?}", start.elapsed());
    Ok(())
}

fn run_segment(args: &SegmentArgs) -> Result<()> {
    let params = args.to_params()?;
    let image = read_input(&args.input)?;
    ensure_dir(&args.output_dir)?;

    let mut outputter =
        FileOutputter::new(&args.output_dir, &args.input, &params).with_cartoon(args.cartoon);
    let start = Instant::now();

    let n_regions = match args.tile_size {
        Some(tile_size) => {
            let progress = Arc::new(BarProgress::new("Segmenting tiles"));
            let mut tiled = TiledSegmenter::new(params, tile_size)
                .context("Invalid segmentation parameters")?
                .with_mode(processing_mode(args.threads))
                .with_progress(progress.clone());
            if let Some(threshold) = args.reconcile_threshold {
                tiled = tiled.with_reconcile_threshold(threshold);
            }
            let result = tiled.run(&image).context("Tiled segmentation failed")?;
            progress.0.finish_and_clear();
            outputter
                .on_level_result(result.labels(), result.regions(), 0)
                .context("Failed to write results")?;
            result.n_regions()
        }
        None => {
            let progress = Arc::new(BarProgress::new("Segmenting levels"));
            let engine = MultiSeg::new(params)
                .context("Invalid segmentation parameters")?
                .with_progress(progress.clone());
            let result = engine
                .run_with_outputter(&image, &mut outputter)
                .context("Segmentation failed")?;
            progress.0.finish_and_clear();
            result.n_regions()
        }
    };

    let elapsed = start.elapsed();
    println!("Regions: {}", n_regions);
    for path in outputter.written() {
        println!("  {}", path.display());
    }
    done("Segmentation", &args.output_dir, elapsed);
    Ok(())
}

fn run_cv_table(confidence: f64, looks: usize, samples: usize, tables_dir: &Path) -> Result<()> {
    let table = CvTable::load(confidence, tables_dir)
        .with_context(|| format!("Failed to load CV table from {}", tables_dir.display()))?;
    let cv = table.get_cv(looks, samples).context("CV lookup failed")?;
    println!(
        "Critical CV (confidence {}, {} looks, {} samples): {}",
        confidence, looks, samples, cv
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => run_info(&input),
        Commands::Pyramid {
            input,
            output_dir,
            levels,
            bands,
        } => run_pyramid(&input, &output_dir, levels, &bands),
        Commands::Segment(args) => run_segment(&args),
        Commands::CvTable {
            confidence,
            looks,
            samples,
            tables_dir,
        } => run_cv_table(confidence, looks, samples, &tables_dir),
    }
}
