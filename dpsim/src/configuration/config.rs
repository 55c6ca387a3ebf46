//! Configuration types for loading a sweep from YAML.
//!
//! A run configuration consists of:
//!
//! - [`SweepConfig`]      – pericentres, planet distances and orientation count
//! - [`HeaderConfig`]     – integration header parameters (fixed or tuned defaults)
//! - [`IntegratorConfig`] – the external integrator program
//! - [`AnalysisConfig`]   – worker pool and result-set options
//! - [`RunConfig`]        – top-level wrapper used to load a run from YAML
//!
//! # YAML format
//! An example two-planet run matching these types:
//!
//! ```yaml
//! directory: "runs/two_planets"
//! angle_convention: as_run   # or "degrees"
//!
//! sweep:
//!   pericentres: "100, 200"
//!   planet_distances_a: "10, 20"
//!   planet_distances_b: "30, 40"   # omit for single-planet runs
//!   orientations: 50
//!   seed: 42                       # omit for a fresh seed every run
//!
//! header:
//!   use_defaults: true     # bucketed defaults; false -> the fixed values below
//!   time_step: 0.08
//!   steps: 1200
//!   true_anomaly: 164.0    # degrees
//!
//! integrator:
//!   program: "./NewARC.out"
//!   batch_size: 10
//!   keep_init_files: false
//!
//! analysis:
//!   workers: 5
//!   combine_planet_results: true
//! ```
//!
//! Everything except `sweep` has defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::aggregator::DEFAULT_WORKERS;
use crate::catalog::sweep::Sweep;
use crate::error::{DpsError, Result};
use crate::simulation::integrator::{ExternalIntegrator, DEFAULT_BATCH_SIZE};
use crate::simulation::params::{HeaderParams, HeaderSource};
use crate::simulation::scenario::AngleConvention;

/// Sweep definition. Lists are comma separated strings, as typed by a user.
#[derive(Deserialize, Debug, Clone)]
pub struct SweepConfig {
    pub pericentres: String,
    pub planet_distances_a: String,
    pub planet_distances_b: Option<String>,
    pub orientations: usize,
    pub seed: Option<u64>,
}

impl SweepConfig {
    pub fn to_sweep(&self) -> Sweep {
        Sweep {
            pericentres: Sweep::split_list(&self.pericentres),
            planet_distances_a: Sweep::split_list(&self.planet_distances_a),
            planet_distances_b: self.planet_distances_b.as_deref().map(Sweep::split_list),
            orientations: self.orientations,
            seed: self.seed,
        }
    }
}

/// Integration header parameters
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HeaderConfig {
    pub use_defaults: bool, // `true` - bucketed defaults, `false` - fixed values below
    pub time_step: f64,
    pub steps: usize,
    pub true_anomaly: f64, // degrees
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            time_step: 0.08,
            steps: 1200,
            true_anomaly: 164.0,
        }
    }
}

impl HeaderConfig {
    pub fn source(&self) -> HeaderSource {
        if self.use_defaults {
            HeaderSource::Defaults
        } else {
            HeaderSource::Fixed(HeaderParams::from_degrees(self.time_step, self.steps, self.true_anomaly))
        }
    }
}

/// External integrator settings
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IntegratorConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub batch_size: usize,
    pub keep_init_files: bool,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("./NewARC.out"),
            args: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            keep_init_files: false,
        }
    }
}

impl IntegratorConfig {
    pub fn integrator(&self) -> ExternalIntegrator {
        ExternalIntegrator {
            program: self.program.clone(),
            args: self.args.clone(),
            batch_size: self.batch_size,
            keep_init_files: self.keep_init_files,
        }
    }
}

/// Analysis settings
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub workers: usize,               // worker pool size
    pub combine_planet_results: bool, // also write the merged planet A + B results
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            combine_planet_results: true,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Top-level run configuration loaded from YAML
#[derive(Deserialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub angle_convention: AngleConvention,
    pub sweep: SweepConfig,
    #[serde(default)]
    pub header: HeaderConfig,
    #[serde(default)]
    pub integrator: IntegratorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| DpsError::io(path, e))?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }
}
