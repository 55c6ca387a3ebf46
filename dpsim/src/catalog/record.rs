//! Configuration records and aggregation keys
//!
//! A `ConfigurationRecord` describes one simulated configuration: pericentre,
//! planet distance(s) and orientation. Records are identified by their filename
//! stem only. Two records feed the same statistics bucket when their
//! `AggregationKey`s match.

use crate::simulation::scenario::Orientation;

/// One planet (3-body run) or two planets (4-body run)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanetDistances {
    Single(f64),
    Pair(f64, f64),
}

impl PlanetDistances {
    pub fn first(&self) -> f64 {
        match *self {
            PlanetDistances::Single(d) | PlanetDistances::Pair(d, _) => d,
        }
    }

    pub fn second(&self) -> Option<f64> {
        match *self {
            PlanetDistances::Single(_) => None,
            PlanetDistances::Pair(_, d) => Some(d),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> {
        std::iter::once(self.first()).chain(self.second())
    }

    pub fn planet_count(&self) -> usize {
        match self {
            PlanetDistances::Single(_) => 1,
            PlanetDistances::Pair(..) => 2,
        }
    }

    /// Total bodies including central body and star
    pub fn body_count(&self) -> usize {
        2 + self.planet_count()
    }

    /// Largest distance, used to pick default header parameters
    pub fn widest(&self) -> f64 {
        self.iter().fold(f64::MIN, f64::max)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationRecord {
    pub filename: String, // stem, without `.init` / `.out`
    pub pericentre: f64,
    pub planet_distances: PlanetDistances,
    pub orientation_index: usize, // 1-based
    pub phi: u32,
    pub inclination: u32,
}

impl PartialEq for ConfigurationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
    }
}

impl ConfigurationRecord {
    /// Build a record; the filename is derived from the values
    pub fn new(
        pericentre: f64,
        planet_distances: PlanetDistances,
        orientation_index: usize,
        orientation: Orientation,
    ) -> Self {
        Self {
            filename: filename_stem(pericentre, &planet_distances, orientation_index),
            pericentre,
            planet_distances,
            orientation_index,
            phi: orientation.phi,
            inclination: orientation.inclination,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation {
            phi: self.phi,
            inclination: self.inclination,
        }
    }

    pub fn has_single_planet(&self) -> bool {
        self.planet_distances.planet_count() == 1
    }

    pub fn init_filename(&self) -> String {
        format!("{}.init", self.filename)
    }

    pub fn out_filename(&self) -> String {
        format!("{}.out", self.filename)
    }
}

/// `p<p>_r<d>_o<i>` or `p<p>_r<a>_<b>_o<i>`
pub fn filename_stem(pericentre: f64, planet_distances: &PlanetDistances, orientation_index: usize) -> String {
    let distances = planet_distances
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("_");
    format!("p{pericentre}_r{distances}_o{orientation_index}")
}

/// Fixed precision for bucket keys (1e-6)
const KEY_SCALE: f64 = 1.0e6;

fn to_key_units(value: f64) -> i64 {
    (value * KEY_SCALE).round() as i64
}

/// (pericentre, planet distance) bucket, compared at a fixed precision so that
/// tiny parse/format differences do not split one bucket into two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey {
    pericentre: i64,
    planet_distance: i64,
}

impl AggregationKey {
    pub fn new(pericentre: f64, planet_distance: f64) -> Self {
        Self {
            pericentre: to_key_units(pericentre),
            planet_distance: to_key_units(planet_distance),
        }
    }

    pub fn pericentre(&self) -> f64 {
        self.pericentre as f64 / KEY_SCALE
    }

    pub fn planet_distance(&self) -> f64 {
        self.planet_distance as f64 / KEY_SCALE
    }
}
