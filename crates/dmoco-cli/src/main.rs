use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::backend::Autodiff;
use burn::config::Config;
use burn_ndarray::NdArray;
use clap::{Parser, ValueEnum};
use dmoco_core::filter::slice_centroids;
use dmoco_core::interpolation::InterpolationKind;
use dmoco_io::{read_bvals, read_bvecs, read_series, write_series, write_volume};
use dmoco_moco::{GradientTable, MocoConfig, MotionCorrection, SmoothingB0Policy};
use dmoco_registration::{GradientEngine, GradientEngineConfig, RegistrationMode};
use tracing::{info, warn};

type Inner = NdArray<f32>;
type Backend = Autodiff<Inner>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    /// In-plane translation per slice
    Slicereg,
    Rigid,
    Affine,
    Deformable,
}

impl From<Method> for RegistrationMode {
    fn from(method: Method) -> Self {
        match method {
            Method::Slicereg => RegistrationMode::SliceRigid,
            Method::Rigid => RegistrationMode::Rigid,
            Method::Affine => RegistrationMode::Affine,
            Method::Deformable => RegistrationMode::Deformable,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Interp {
    Nn,
    Linear,
    /// Tricubic
    Spline,
}

impl From<Interp> for InterpolationKind {
    fn from(interp: Interp) -> Self {
        match interp {
            Interp::Nn => InterpolationKind::Nearest,
            Interp::Linear => InterpolationKind::Linear,
            Interp::Spline => InterpolationKind::Spline,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SmoothB0 {
    Joint,
    Separate,
    Exclude,
}

impl From<SmoothB0> for SmoothingB0Policy {
    fn from(policy: SmoothB0) -> Self {
        match policy {
            SmoothB0::Joint => SmoothingB0Policy::Joint,
            SmoothB0::Separate => SmoothingB0Policy::Separate,
            SmoothB0::Exclude => SmoothingB0Policy::ExcludeB0,
        }
    }
}

#[derive(Parser)]
#[command(name = "dmoco")]
#[command(about = "Motion correction of diffusion MRI series")]
struct Cli {
    /// 4D diffusion series (.nii or .nii.gz)
    #[arg(short, long)]
    input: PathBuf,

    /// Gradient directions, 3xT or Tx3
    #[arg(short = 'b', long)]
    bvecs: PathBuf,

    /// b-values; without them b=0 volumes are found by direction norm
    #[arg(short = 'a', long)]
    bvals: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// JSON run configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// DWI volumes averaged per group
    #[arg(short, long)]
    group_size: Option<usize>,

    /// b-values below this are b=0
    #[arg(long)]
    bval_min: Option<f64>,

    #[arg(short, long, value_enum)]
    method: Option<Method>,

    /// Smooth translations over time
    #[arg(long)]
    smooth: bool,

    /// Spline knot spacing, in volumes
    #[arg(long)]
    knot_spacing: Option<f64>,

    /// How b=0 volumes enter the smoothing fit
    #[arg(long, value_enum)]
    smooth_b0: Option<SmoothB0>,

    /// Write raw and smoothed translations to this JSON file
    #[arg(long)]
    plot_params: Option<PathBuf>,

    /// Optimiser steps per registration
    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Interpolation of the final resampling
    #[arg(short = 'p', long, value_enum)]
    interp: Option<Interp>,

    /// Sigma (mm) of the Gaussian weighting mask; 0 disables it
    #[arg(short = 's', long)]
    mask_sigma: Option<f64>,

    /// Centerline or cord mask (NIfTI) the weighting mask is centred on
    #[arg(short = 'l', long)]
    centerline: Option<PathBuf>,
}

impl Cli {
    fn moco_config(&self) -> Result<MocoConfig> {
        let mut config = match &self.config {
            Some(path) => MocoConfig::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?,
            None => MocoConfig::new(),
        };
        if let Some(g) = self.group_size {
            config.group_size = g;
        }
        if let Some(b) = self.bval_min {
            config.bval_threshold = b;
        }
        if let Some(method) = self.method {
            config.registration_mode = method.into();
        }
        if self.smooth {
            config.smoothing = true;
        }
        if let Some(spacing) = self.knot_spacing {
            config.smoothing_knot_spacing = spacing;
        }
        if let Some(policy) = self.smooth_b0 {
            config.smoothing_b0_policy = policy.into();
        }
        Ok(config)
    }

    fn engine_config(&self) -> GradientEngineConfig {
        let mut config = GradientEngineConfig::new();
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(interp) = self.interp {
            config.interpolation = interp.into();
        }
        if let Some(sigma) = self.mask_sigma {
            config.mask_sigma = sigma;
        }
        config
    }
}

/// The binary has no source for a secondary transform table.
fn check_secondary(config: &MocoConfig) -> Result<()> {
    if config.secondary_correction {
        anyhow::bail!(
            "secondary_correction is enabled in the config, but dmoco cannot load a secondary \
             transform table; disable it, or call MotionCorrection::run with a table from a program"
        );
    }
    Ok(())
}

/// `dwi.nii.gz` -> (`dwi`, `.nii.gz`)
fn split_nifti_name(path: &Path) -> (String, &'static str) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dmri".to_string());
    if let Some(stem) = name.strip_suffix(".nii.gz") {
        (stem.to_string(), ".nii.gz")
    } else if let Some(stem) = name.strip_suffix(".nii") {
        (stem.to_string(), ".nii")
    } else {
        (name, ".nii")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.moco_config()?;
    check_secondary(&config)?;
    let engine_config = cli.engine_config();
    if cli.plot_params.is_some() && !config.smoothing {
        warn!("--plot-params has no effect without smoothing");
    }
    if cli.centerline.is_some() && engine_config.mask_sigma == 0.0 {
        warn!("--centerline has no effect without --mask-sigma");
    }

    let device = Default::default();
    let series = read_series::<Inner, _>(&cli.input, &device)?;
    let rows = read_bvecs(&cli.bvecs)?;
    let bvals = cli.bvals.as_ref().map(read_bvals).transpose()?;
    let gradients = GradientTable::from_rows(&rows, bvals).context("Invalid gradient files")?;

    let mut engine = GradientEngine::<Backend>::new(engine_config);
    if let Some(path) = &cli.centerline {
        let centerline = read_series::<Inner, _>(path, &device)?.volume(0)?;
        if centerline.shape() != series.volume_shape() {
            anyhow::bail!(
                "centerline {} has shape {:?}, series volumes are {:?}",
                path.display(),
                centerline.shape(),
                series.volume_shape()
            );
        }
        engine = engine.with_centerline(slice_centroids(&centerline)?);
    }
    let output = MotionCorrection::new(&config, engine).run(&series, &gradients, None)?;

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let (name, ext) = split_nifti_name(&cli.input);
    let corrected_path = cli.output.join(format!("{}_moco{}", name, ext));
    write_series(&corrected_path, &output.corrected)?;
    write_volume(cli.output.join("b0_moco_mean.nii"), &output.b0_mean)?;
    if let Some(dwi_mean) = &output.dwi_mean {
        write_volume(cli.output.join("dwi_moco_mean.nii"), dwi_mean)?;
    }
    if let (Some(path), Some(report)) = (&cli.plot_params, &output.smoothing) {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize smoothing report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Smoothing report written to {}", path.display());
    }

    info!("Corrected series written to {}", corrected_path.display());
    Ok(())
}
