//! Human-readable manifest of every generated configuration
//!
//! `simulation_parameters.txt` holds one line per configuration so the analysis
//! stage can recover the ground-truth parameters behind each `.out` file:
//!
//! ```text
//! OrientationIndex Pericentre PlanetDistance Phi Inclination
//! 1 100.0 10.0 217 45
//! ```
//!
//! Reals are written in round-trip form, so reading the manifest back gives
//! exactly the values that were written.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::catalog::record::{ConfigurationRecord, PlanetDistances};
use crate::error::{DpsError, Result};
use crate::simulation::scenario::Orientation;

pub const MANIFEST_FILENAME: &str = "simulation_parameters.txt";

const SINGLE_HEADER: &str = "OrientationIndex Pericentre PlanetDistance Phi Inclination";
const PAIR_HEADER: &str = "OrientationIndex Pericentre PlanetDistanceA PlanetDistanceB Phi Inclination";

pub fn manifest_line(record: &ConfigurationRecord) -> String {
    let distances = record
        .planet_distances
        .iter()
        .map(|d| format!("{d:?}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} {:?} {} {} {}",
        record.orientation_index, record.pericentre, distances, record.phi, record.inclination
    )
}

pub fn manifest_text(records: &[ConfigurationRecord]) -> String {
    let two_planets = records.first().is_some_and(|r| !r.has_single_planet());
    let mut text = String::from(if two_planets { PAIR_HEADER } else { SINGLE_HEADER });
    for record in records {
        text.push('\n');
        text.push_str(&manifest_line(record));
    }
    text
}

pub fn write_manifest(directory: &Path, records: &[ConfigurationRecord]) -> Result<()> {
    let path = directory.join(MANIFEST_FILENAME);
    fs::write(&path, manifest_text(records)).map_err(|e| DpsError::io(&path, e))?;
    debug!("wrote manifest with {} entries to {}", records.len(), path.display());
    Ok(())
}

pub fn read_manifest(directory: &Path) -> Result<Vec<ConfigurationRecord>> {
    let path = directory.join(MANIFEST_FILENAME);
    let text = fs::read_to_string(&path).map_err(|e| DpsError::io(&path, e))?;
    parse_manifest(&text)
}

/// Parse manifest text; the header line is skipped, blank lines are ignored
pub fn parse_manifest(text: &str) -> Result<Vec<ConfigurationRecord>> {
    text.lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| parse_line(line).map_err(|reason| {
            DpsError::Configuration(format!("manifest line {}: {reason}", number + 1))
        }))
        .collect()
}

fn parse_line(line: &str) -> std::result::Result<ConfigurationRecord, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let (index, pericentre, distances, phi, inclination) = match tokens.as_slice() {
        [index, pericentre, distance, phi, inclination] => {
            (index, pericentre, PlanetDistances::Single(real(distance)?), phi, inclination)
        }
        [index, pericentre, a, b, phi, inclination] => {
            (index, pericentre, PlanetDistances::Pair(real(a)?, real(b)?), phi, inclination)
        }
        _ => return Err(format!("expected 5 or 6 columns, found {}", tokens.len())),
    };

    let orientation_index = index
        .parse::<usize>()
        .map_err(|_| format!("bad orientation index `{index}`"))?;
    let orientation = Orientation {
        phi: angle(phi)?,
        inclination: angle(inclination)?,
    };

    Ok(ConfigurationRecord::new(real(pericentre)?, distances, orientation_index, orientation))
}

fn real(token: &str) -> std::result::Result<f64, String> {
    token.parse::<f64>().map_err(|_| format!("bad number `{token}`"))
}

fn angle(token: &str) -> std::result::Result<u32, String> {
    match token.parse::<u32>() {
        Ok(value) if value < 360 => Ok(value),
        _ => Err(format!("bad angle `{token}`")),
    }
}
