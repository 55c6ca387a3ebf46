//! Generate `.init` files for a whole sweep
//!
//! The sweep is the Cartesian product pericentres x planet distances x
//! orientations. For two-planet sweeps the A and B distance lists are paired
//! index by index, not crossed.
//!
//! Generation runs in two passes:
//! 1. plan: parse every token, validate the lists, resolve header parameters and
//!    draw orientations. Any failure here aborts before a file is written.
//! 2. write: one `.init` file per configuration, checking the run state before
//!    each pericentre, then the manifest.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::catalog::init_file::init_file_text;
use crate::catalog::manifest::write_manifest;
use crate::catalog::record::{ConfigurationRecord, PlanetDistances};
use crate::error::{DpsError, Result};
use crate::simulation::engine::RunContext;
use crate::simulation::params::{HeaderParams, HeaderSource};
use crate::simulation::scenario::{AngleConvention, Orientation, Scenario};

/// Raw sweep input, numbers still as the user typed them
#[derive(Debug, Clone, Default)]
pub struct Sweep {
    pub pericentres: Vec<String>,
    pub planet_distances_a: Vec<String>,
    pub planet_distances_b: Option<Vec<String>>, // Some(..) for two-planet sweeps
    pub orientations: usize,
    pub seed: Option<u64>,
}

impl Sweep {
    /// Split a comma separated list. A blank list gives no tokens; an empty
    /// entry inside a list is kept and later rejected as a bad number.
    pub fn split_list(list: &str) -> Vec<String> {
        if list.trim().is_empty() {
            return Vec::new();
        }
        list.split(',').map(|token| token.trim().to_string()).collect()
    }
}

/// One configuration ready to be written
struct Planned {
    record: ConfigurationRecord,
    header: HeaderParams,
}

pub struct Catalog {
    directory: PathBuf,
    header_source: HeaderSource,
    convention: AngleConvention,
}

impl Catalog {
    pub fn new(directory: impl Into<PathBuf>, header_source: HeaderSource, convention: AngleConvention) -> Self {
        Self {
            directory: directory.into(),
            header_source,
            convention,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Generate every `.init` file of the sweep plus the manifest.
    /// Returns the records in sweep order.
    pub fn generate(&self, sweep: &Sweep, context: &RunContext) -> Result<Vec<ConfigurationRecord>> {
        let pericentres = parse_list("pericentre", &sweep.pericentres)?;
        let distances = pair_distances(sweep)?;
        if sweep.orientations == 0 {
            return Err(DpsError::Configuration("number of orientations must be at least 1".into()));
        }

        let seed = sweep.seed.unwrap_or_else(|| rand::rng().random());
        info!("orientation seed {seed}");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let plan = self.plan(&pericentres, &distances, sweep.orientations, &mut rng)?;

        fs::create_dir_all(&self.directory).map_err(|e| DpsError::io(&self.directory, e))?;
        context.set_task("Generating init files...", 0.0, 10.0, pericentres.len());

        let per_pericentre = distances.len() * sweep.orientations;
        let mut written: Vec<PathBuf> = Vec::with_capacity(plan.len());

        for chunk in plan.chunks(per_pericentre) {
            if !context.is_running() {
                self.discard(&written);
                return Err(DpsError::Cancelled);
            }
            for planned in chunk {
                match self.write_init_file(planned) {
                    Ok(path) => written.push(path),
                    Err(e) => {
                        self.discard(&written);
                        return Err(e);
                    }
                }
            }
            context.report_step();
        }

        let records: Vec<ConfigurationRecord> = plan.into_iter().map(|p| p.record).collect();
        if let Err(e) = write_manifest(&self.directory, &records) {
            self.discard(&written);
            return Err(e);
        }

        info!("generated {} init files in {}", records.len(), self.directory.display());
        Ok(records)
    }

    fn plan(
        &self,
        pericentres: &[f64],
        distances: &[PlanetDistances],
        orientations: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Planned>> {
        let mut plan = Vec::with_capacity(pericentres.len() * distances.len() * orientations);
        let mut stems = HashSet::with_capacity(plan.capacity());
        for &pericentre in pericentres {
            for distance in distances {
                let header = self.header_source.resolve(pericentre, distance.widest())?;
                for orientation_index in 1..=orientations {
                    let orientation = Orientation::draw(rng);
                    let record = ConfigurationRecord::new(pericentre, *distance, orientation_index, orientation);
                    // equal values map to one file, e.g. `100` and `100.0`
                    if !stems.insert(record.filename.clone()) {
                        return Err(DpsError::Configuration(format!(
                            "configuration {} appears more than once in the sweep",
                            record.filename
                        )));
                    }
                    plan.push(Planned { record, header });
                }
            }
        }
        Ok(plan)
    }

    fn write_init_file(&self, planned: &Planned) -> Result<PathBuf> {
        let record = &planned.record;
        let scenario = Scenario::build(record, &planned.header, self.convention);
        let path = self.directory.join(record.init_filename());
        fs::write(&path, init_file_text(&record.filename, &scenario, &planned.header))
            .map_err(|e| DpsError::io(&path, e))?;
        debug!("wrote {}", path.display());
        Ok(path)
    }

    /// Remove files written by an aborted sweep
    fn discard(&self, written: &[PathBuf]) {
        for path in written {
            if let Err(e) = fs::remove_file(path) {
                warn!("failed to delete {}: {e}", path.display());
            }
        }
    }
}

fn parse_list(name: &str, tokens: &[String]) -> Result<Vec<f64>> {
    if tokens.is_empty() {
        return Err(DpsError::Configuration(format!("{name} list is empty")));
    }
    tokens
        .iter()
        .map(|token| match token.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
            _ => Err(DpsError::Configuration(format!("invalid {name} `{token}`"))),
        })
        .collect()
}

fn pair_distances(sweep: &Sweep) -> Result<Vec<PlanetDistances>> {
    let a = parse_list("planet distance", &sweep.planet_distances_a)?;
    match &sweep.planet_distances_b {
        None => Ok(a.into_iter().map(PlanetDistances::Single).collect()),
        Some(b_tokens) => {
            let b = parse_list("second planet distance", b_tokens)?;
            if a.len() != b.len() {
                return Err(DpsError::Configuration(format!(
                    "planet distance lists differ in length ({} vs {})",
                    a.len(),
                    b.len()
                )));
            }
            Ok(a.into_iter().zip(b).map(|(a, b)| PlanetDistances::Pair(a, b)).collect())
        }
    }
}
