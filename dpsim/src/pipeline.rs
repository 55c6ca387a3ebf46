//! Staged pipeline driver
//!
//! generate (0-10%) -> simulate (10-20%) -> analyze (20-100%)
//!
//! Each public entry point starts the shared `RunContext`, runs its stage(s),
//! logs a failure with the stage name and returns to `Idle`. Stages other than
//! `generate` read their configurations back from the manifest, so any of them
//! can be run on its own against an existing run directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::analysis::aggregator::{Aggregator, AnalysisReport};
use crate::catalog::manifest::read_manifest;
use crate::catalog::record::ConfigurationRecord;
use crate::catalog::sweep::Catalog;
use crate::configuration::config::RunConfig;
use crate::error::{DpsError, Result};
use crate::simulation::engine::RunContext;

const GENERATE: &str = "Generating init files";
const SIMULATE: &str = "Simulating init files";
const ANALYZE: &str = "Processing out files";

pub struct Pipeline {
    config: RunConfig,
    context: Arc<RunContext>,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self::with_context(config, Arc::new(RunContext::new()))
    }

    pub fn with_context(config: RunConfig, context: Arc<RunContext>) -> Self {
        Self { config, context }
    }

    /// Handle for cancelling or watching progress from another thread
    pub fn context(&self) -> Arc<RunContext> {
        Arc::clone(&self.context)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    pub fn generate(&self) -> bool {
        self.run_process(|this| this.generate_records().map(|_| ()))
    }

    pub fn simulate(&self) -> bool {
        self.run_process(|this| {
            let records = this.manifest_records(SIMULATE)?;
            this.simulate_records(&records)
        })
    }

    pub fn analyze(&self) -> bool {
        self.run_process(|this| {
            let records = this.manifest_records(ANALYZE)?;
            this.analyze_records(&records).map(|_| ())
        })
    }

    /// All three stages on one run
    pub fn run_all(&self) -> bool {
        self.run_process(|this| {
            let records = this.generate_records()?;
            this.simulate_records(&records)?;
            this.analyze_records(&records)?;
            Ok(())
        })
    }

    fn run_process<F>(&self, process: F) -> bool
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        self.context.start();
        let outcome = process(self);
        self.context.finish();
        outcome.is_ok()
    }

    fn generate_records(&self) -> Result<Vec<ConfigurationRecord>> {
        let catalog = Catalog::new(
            self.config.directory.clone(),
            self.config.header.source(),
            self.config.angle_convention,
        );
        let sweep = self.config.sweep.to_sweep();
        logged(GENERATE, catalog.generate(&sweep, &self.context))
    }

    fn simulate_records(&self, records: &[ConfigurationRecord]) -> Result<()> {
        let integrator = self.config.integrator.integrator();
        logged(SIMULATE, integrator.run(&self.config.directory, records, &self.context))
    }

    fn analyze_records(&self, records: &[ConfigurationRecord]) -> Result<AnalysisReport> {
        let aggregator = Aggregator::new(self.config.directory.clone(), self.context())
            .workers(self.config.analysis.workers)
            .combine_planet_results(self.config.analysis.combine_planet_results);
        logged(ANALYZE, aggregator.analyze(records))
    }

    fn manifest_records(&self, phase: &str) -> Result<Vec<ConfigurationRecord>> {
        logged(phase, read_manifest(&self.config.directory))
    }
}

fn logged<T>(phase: &str, result: Result<T>) -> Result<T> {
    match &result {
        Err(DpsError::Cancelled) => info!("{phase} cancelled"),
        Err(e) => error!("{phase} failed: {e}"),
        Ok(_) => {}
    }
    result
}

/// Resolve a scenario file: as given if it exists, else under `scenarios/`
pub fn scenario_path(file_name: &str, scenarios_dir: &Path) -> PathBuf {
    let given = PathBuf::from(file_name);
    if given.exists() {
        given
    } else {
        scenarios_dir.join(file_name)
    }
}
