//! Concurrent aggregation of trajectory outcomes
//!
//! One task per configuration is queued onto a fixed-size worker pool. A task
//! loads the trajectory, classifies every planet and then contributes all of
//! its outcomes under a single engine-wide lock, so a trajectory is either
//! counted completely or not at all.
//!
//! The pool size is a small constant independent of the core count; the work
//! is dominated by reading `.out` files, not by arithmetic.
//!
//! Each task checks the run state when it starts. After a cancellation queued
//! tasks become no-ops while tasks already running finish normally. The pool is
//! drained before any result is read.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::accumulator::ResultSet;
use crate::analysis::classifier::{classify, Outcome};
use crate::analysis::results::{
    write_results, PLANET_A_RESULTS_FILENAME, PLANET_B_RESULTS_FILENAME, RESULTS_FILENAME,
};
use crate::analysis::trajectory::load_trajectory;
use crate::catalog::record::{AggregationKey, ConfigurationRecord, PlanetDistances};
use crate::error::{DpsError, Result};
use crate::simulation::engine::RunContext;
use crate::simulation::states::Body;

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 5;

/// Where trajectories come from
pub trait TrajectorySource: Send + Sync {
    fn load(&self, record: &ConfigurationRecord) -> Result<Vec<Body>>;
}

/// `.out` files in a run directory
#[derive(Debug, Clone)]
pub struct OutFiles {
    directory: PathBuf,
}

impl OutFiles {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl TrajectorySource for OutFiles {
    fn load(&self, record: &ConfigurationRecord) -> Result<Vec<Body>> {
        let path = self.directory.join(record.out_filename());
        load_trajectory(&path, record.planet_distances.body_count())
    }
}

/// Which planet of a run an outcome belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanetRole {
    A,
    B,
}

#[derive(Debug, Clone, Default)]
struct PlanetResults {
    planet_a: ResultSet,
    planet_b: ResultSet,
}

/// The only state shared between workers
#[derive(Debug, Default)]
struct SharedResults {
    inner: Mutex<PlanetResults>,
}

impl SharedResults {
    /// All outcomes of one trajectory under one lock
    fn contribute(&self, pericentre: f64, outcomes: &[(PlanetRole, Outcome)]) {
        let mut results = self.inner.lock();
        for (role, outcome) in outcomes {
            let key = AggregationKey::new(pericentre, outcome.planet_distance);
            match role {
                PlanetRole::A => results.planet_a.contribute(key, outcome),
                PlanetRole::B => results.planet_b.contribute(key, outcome),
            }
        }
    }

    fn snapshot(&self) -> PlanetResults {
        self.inner.lock().clone()
    }
}

/// Final statistics of an analysis run
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub planet_a: ResultSet,
    pub planet_b: Option<ResultSet>, // two-planet runs only
    pub processed: usize,
    pub skipped: usize,
}

impl AnalysisReport {
    /// Planet A and planet B merged into one view
    pub fn combined(&self) -> ResultSet {
        match &self.planet_b {
            Some(planet_b) => self.planet_a.merged(planet_b),
            None => self.planet_a.clone(),
        }
    }
}

pub struct Aggregator<S = OutFiles> {
    source: S,
    directory: PathBuf,
    context: Arc<RunContext>,
    workers: usize,
    combine_planet_results: bool,
}

impl Aggregator<OutFiles> {
    /// Aggregator reading `.out` files from `directory`
    pub fn new(directory: impl Into<PathBuf>, context: Arc<RunContext>) -> Self {
        let directory = directory.into();
        Self::with_source(OutFiles::new(directory.clone()), directory, context)
    }
}

impl<S: TrajectorySource> Aggregator<S> {
    pub fn with_source(source: S, directory: impl Into<PathBuf>, context: Arc<RunContext>) -> Self {
        Self {
            source,
            directory: directory.into(),
            context,
            workers: DEFAULT_WORKERS,
            combine_planet_results: true,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn combine_planet_results(mut self, combine: bool) -> Self {
        self.combine_planet_results = combine;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Load and classify one configuration, outside the lock
    fn process(&self, record: &ConfigurationRecord) -> Result<Vec<(PlanetRole, Outcome)>> {
        let bodies = self.source.load(record)?;
        let expected = record.planet_distances.body_count();
        if bodies.len() != expected {
            return Err(DpsError::TrajectoryMalformed {
                path: self.directory.join(record.out_filename()),
                reason: format!("expected {expected} bodies, found {}", bodies.len()),
            });
        }

        let (central, star) = (&bodies[0], &bodies[1]);
        let outcomes = match record.planet_distances {
            PlanetDistances::Single(d) => vec![(PlanetRole::A, classify(central, star, &bodies[2], d))],
            PlanetDistances::Pair(a, b) => vec![
                (PlanetRole::A, classify(central, star, &bodies[2], a)),
                (PlanetRole::B, classify(central, star, &bodies[3], b)),
            ],
        };
        Ok(outcomes)
    }

    /// Classify every configuration and aggregate the outcomes.
    /// Blocks until every queued task has finished or been skipped.
    pub fn run(&self, records: &[ConfigurationRecord]) -> Result<AnalysisReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("dpsim-analysis-{i}"))
            .build()
            .map_err(|e| DpsError::Configuration(format!("failed to build worker pool: {e}")))?;

        self.context.set_task("Processing out files...", 20.0, 100.0, records.len());

        let shared = SharedResults::default();
        let processed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        pool.scope_fifo(|scope| {
            for record in records {
                let (shared, processed, skipped) = (&shared, &processed, &skipped);
                scope.spawn_fifo(move |_| {
                    if !self.context.is_running() {
                        return;
                    }
                    match self.process(record) {
                        Ok(outcomes) => {
                            shared.contribute(record.pericentre, &outcomes);
                            processed.fetch_add(1, Ordering::SeqCst);
                            debug!("processed {}", record.filename);
                        }
                        Err(e) => {
                            skipped.fetch_add(1, Ordering::SeqCst);
                            warn!("Processing out file {} failed: {e}", record.filename);
                        }
                    }
                    self.context.report_step();
                });
            }
        });

        let results = shared.snapshot();
        let two_planets = records.iter().any(|r| !r.has_single_planet());
        let report = AnalysisReport {
            planet_a: results.planet_a,
            planet_b: two_planets.then_some(results.planet_b),
            processed: processed.into_inner(),
            skipped: skipped.into_inner(),
        };

        info!(
            "analysed {} of {} trajectories ({} skipped)",
            report.processed,
            records.len(),
            report.skipped
        );
        Ok(report)
    }

    /// Run the analysis and save the results files.
    /// A cancelled run saves nothing and returns `Cancelled`.
    pub fn analyze(&self, records: &[ConfigurationRecord]) -> Result<AnalysisReport> {
        let report = self.run(records)?;
        if !self.context.is_running() {
            return Err(DpsError::Cancelled);
        }

        match &report.planet_b {
            None => write_results(&self.directory, RESULTS_FILENAME, &report.planet_a)?,
            Some(planet_b) => {
                write_results(&self.directory, PLANET_A_RESULTS_FILENAME, &report.planet_a)?;
                write_results(&self.directory, PLANET_B_RESULTS_FILENAME, planet_b)?;
                if self.combine_planet_results {
                    write_results(&self.directory, RESULTS_FILENAME, &report.combined())?;
                }
            }
        }
        Ok(report)
    }
}
