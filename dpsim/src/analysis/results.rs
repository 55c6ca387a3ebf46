//! Results file text
//!
//! One line per bucket, six decimals per column, under a header naming the
//! columns.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::analysis::accumulator::ResultSet;
use crate::error::{DpsError, Result};

pub const RESULTS_FILENAME: &str = "simulation_results.txt";
pub const PLANET_A_RESULTS_FILENAME: &str = "simulation_results_planet_a.txt";
pub const PLANET_B_RESULTS_FILENAME: &str = "simulation_results_planet_b.txt";

const HEADER: &str = "Pericentre  PlanetDistance  HillsRadius  BhBoundFraction  \
StarBoundFraction  UnboundFraction  BhBoundFractionError  StarBoundFractionError  \
UnboundFractionError  SemiMajorBh  SemiMajorStar  EccentricityBh  EccentricityStar";

pub fn results_text(results: &ResultSet) -> String {
    let mut text = String::from(HEADER);
    for (key, acc) in results.iter() {
        let columns = [
            key.pericentre(),
            key.planet_distance(),
            acc.hills_radius,
            acc.central_fraction(),
            acc.star_fraction(),
            acc.unbound_fraction(),
            acc.central_fraction_error(),
            acc.star_fraction_error(),
            acc.unbound_fraction_error(),
            acc.mean_central_semi_major_axis(),
            acc.mean_star_semi_major_axis(),
            acc.mean_central_eccentricity(),
            acc.mean_star_eccentricity(),
        ];
        let line = columns.iter().map(|c| format!("{c:.6}")).collect::<Vec<_>>().join(" ");
        text.push('\n');
        text.push_str(&line);
    }
    text
}

pub fn write_results(directory: &Path, filename: &str, results: &ResultSet) -> Result<()> {
    let path = directory.join(filename);
    fs::write(&path, results_text(results)).map_err(|e| DpsError::io(&path, e))?;
    info!("saved {} result rows to {}", results.len(), path.display());
    Ok(())
}
