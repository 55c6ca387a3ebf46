//! Per-configuration statistics
//!
//! An `Accumulator` collects the outcomes of every orientation run for one
//! (pericentre, planet distance) bucket. Orbital elements are kept as value
//! lists rather than running sums so two partial accumulators (for example the
//! planet A and planet B result sets of a four-body run) merge exactly.
//!
//! Statistics:
//! - fractions  central / total, star / total, 1 - both
//! - errors     sqrt(count) / total
//! - elements   arithmetic mean over the bound subset, 0 for an empty subset

use std::collections::BTreeMap;

use crate::analysis::classifier::{BoundTo, Outcome};
use crate::catalog::record::AggregationKey;
use crate::simulation::constants::{CENTRAL_MASS, STAR_MASS};

/// Hill's radius of the star at pericentre
pub fn hills_radius(pericentre: f64) -> f64 {
    pericentre * (STAR_MASS / (3.0 * CENTRAL_MASS)).cbrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

fn counting_error(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64).sqrt() / total as f64
}

/// Value lists compared as multisets
fn same_values(a: &[f64], b: &[f64]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    a == b
}

/// Equality ignores the order outcomes arrived in, so merging in any order
/// gives equal accumulators.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub hills_radius: f64,
    pub central_count: usize,
    pub star_count: usize,
    pub total_count: usize,
    pub central_semi_major_axes: Vec<f64>,
    pub central_eccentricities: Vec<f64>,
    pub star_semi_major_axes: Vec<f64>,
    pub star_eccentricities: Vec<f64>,
}

impl PartialEq for Accumulator {
    fn eq(&self, other: &Self) -> bool {
        self.hills_radius == other.hills_radius
            && self.central_count == other.central_count
            && self.star_count == other.star_count
            && self.total_count == other.total_count
            && same_values(&self.central_semi_major_axes, &other.central_semi_major_axes)
            && same_values(&self.central_eccentricities, &other.central_eccentricities)
            && same_values(&self.star_semi_major_axes, &other.star_semi_major_axes)
            && same_values(&self.star_eccentricities, &other.star_eccentricities)
    }
}

impl Accumulator {
    pub fn new(hills_radius: f64) -> Self {
        Self {
            hills_radius,
            ..Default::default()
        }
    }

    /// Add one classified trajectory
    pub fn contribute(&mut self, outcome: &Outcome) {
        match outcome.bound_to {
            BoundTo::Central => {
                self.central_count += 1;
                self.central_semi_major_axes.push(outcome.semi_major_axis);
                self.central_eccentricities.push(outcome.eccentricity);
            }
            BoundTo::Star => {
                self.star_count += 1;
                self.star_semi_major_axes.push(outcome.semi_major_axis);
                self.star_eccentricities.push(outcome.eccentricity);
            }
            BoundTo::None => {}
        }
        self.total_count += 1;
    }

    /// Sum counts and concatenate value lists
    pub fn merge(&mut self, other: &Accumulator) {
        self.central_count += other.central_count;
        self.star_count += other.star_count;
        self.total_count += other.total_count;
        self.central_semi_major_axes.extend_from_slice(&other.central_semi_major_axes);
        self.central_eccentricities.extend_from_slice(&other.central_eccentricities);
        self.star_semi_major_axes.extend_from_slice(&other.star_semi_major_axes);
        self.star_eccentricities.extend_from_slice(&other.star_eccentricities);
    }

    pub fn unbound_count(&self) -> usize {
        self.total_count - self.central_count - self.star_count
    }

    pub fn central_fraction(&self) -> f64 {
        ratio(self.central_count, self.total_count)
    }

    pub fn star_fraction(&self) -> f64 {
        ratio(self.star_count, self.total_count)
    }

    pub fn unbound_fraction(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        1.0 - self.central_fraction() - self.star_fraction()
    }

    pub fn central_fraction_error(&self) -> f64 {
        counting_error(self.central_count, self.total_count)
    }

    pub fn star_fraction_error(&self) -> f64 {
        counting_error(self.star_count, self.total_count)
    }

    pub fn unbound_fraction_error(&self) -> f64 {
        counting_error(self.unbound_count(), self.total_count)
    }

    pub fn mean_central_semi_major_axis(&self) -> f64 {
        mean(&self.central_semi_major_axes)
    }

    pub fn mean_star_semi_major_axis(&self) -> f64 {
        mean(&self.star_semi_major_axes)
    }

    pub fn mean_central_eccentricity(&self) -> f64 {
        mean(&self.central_eccentricities)
    }

    pub fn mean_star_eccentricity(&self) -> f64 {
        mean(&self.star_eccentricities)
    }
}

/// Accumulators for every bucket touched so far, ordered by key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    entries: BTreeMap<AggregationKey, Accumulator>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an outcome, creating the bucket on first use
    pub fn contribute(&mut self, key: AggregationKey, outcome: &Outcome) {
        self.entries
            .entry(key)
            .or_insert_with(|| Accumulator::new(hills_radius(key.pericentre())))
            .contribute(outcome);
    }

    /// Per-key union; shared keys are merged
    pub fn merge(&mut self, other: &ResultSet) {
        for (key, accumulator) in &other.entries {
            self.entries
                .entry(*key)
                .or_insert_with(|| Accumulator::new(accumulator.hills_radius))
                .merge(accumulator);
        }
    }

    pub fn merged(&self, other: &ResultSet) -> ResultSet {
        let mut combined = self.clone();
        combined.merge(other);
        combined
    }

    pub fn get(&self, key: &AggregationKey) -> Option<&Accumulator> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregationKey, &Accumulator)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trajectories counted over every bucket
    pub fn total_count(&self) -> usize {
        self.entries.values().map(|a| a.total_count).sum()
    }
}
