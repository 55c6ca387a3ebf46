//! Integration header parameters for `.init` files
//!
//! `HeaderParams` holds the values the external integrator reads from the
//! first line of an `.init` file:
//! - integration time step and number of steps,
//! - true anomaly at which the star starts its parabolic approach.
//!
//! A run either uses one fixed set for every configuration, or looks each
//! configuration up in a table bucketed by (pericentre, planet distance).

use std::f64::consts::PI;

use crate::error::{DpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderParams {
    pub time_step: f64,    // integration step size
    pub step_count: usize, // number of integration steps
    pub true_anomaly: f64, // radians
}

impl HeaderParams {
    /// Build from a true anomaly given in degrees
    pub fn from_degrees(time_step: f64, step_count: usize, true_anomaly_deg: f64) -> Self {
        Self {
            time_step,
            step_count,
            true_anomaly: true_anomaly_deg * (PI / 180.0),
        }
    }
}

/// Upper bounds (pericentre, planet distance) -> (time step, steps, true anomaly in degrees).
/// Ordered ascending by pericentre then planet distance; the first bucket whose
/// bounds dominate the query wins.
const DEFAULT_TABLE: &[((f64, f64), (f64, usize, f64))] = &[
    ((100.0, 5.0), (0.1, 3000, 170.0)),
    ((100.0, 10.0), (0.1, 3500, 172.0)),
    ((100.0, 20.0), (0.1, 12000, 174.5)),
    ((100.0, 30.0), (0.1, 24000, 175.5)),
    ((100.0, 40.0), (0.1, 30000, 176.5)),
    ((100.0, 50.0), (0.1, 32000, 176.8)),
    ((100.0, 60.0), (0.1, 35000, 177.0)),
    ((200.0, 5.0), (0.1, 2000, 168.0)),
    ((200.0, 10.0), (0.1, 3000, 171.0)),
    ((200.0, 20.0), (0.1, 8000, 173.5)),
    ((200.0, 30.0), (0.1, 13000, 174.5)),
    ((200.0, 40.0), (0.1, 20000, 175.2)),
    ((200.0, 50.0), (0.1, 28000, 176.0)),
    ((200.0, 60.0), (0.1, 36000, 176.2)),
    ((300.0, 5.0), (0.1, 800, 160.0)),
    ((300.0, 10.0), (0.1, 2000, 167.0)),
    ((300.0, 20.0), (0.1, 6000, 169.5)),
    ((300.0, 30.0), (0.1, 8000, 171.5)),
    ((300.0, 40.0), (0.1, 11000, 172.0)),
    ((300.0, 50.0), (0.1, 14000, 173.5)),
    ((300.0, 60.0), (0.1, 18000, 174.0)),
    ((400.0, 5.0), (0.1, 800, 160.0)),
    ((400.0, 10.0), (0.1, 2000, 166.0)),
    ((400.0, 20.0), (0.1, 6000, 169.5)),
    ((400.0, 30.0), (0.1, 8000, 171.5)),
    ((400.0, 40.0), (0.1, 11000, 172.0)),
    ((400.0, 50.0), (0.1, 15000, 173.5)),
    ((400.0, 60.0), (0.1, 24000, 174.0)),
    ((500.0, 5.0), (0.1, 800, 160.0)),
    ((500.0, 10.0), (0.1, 2800, 165.0)),
    ((500.0, 20.0), (0.1, 6000, 169.5)),
    ((500.0, 30.0), (0.1, 12000, 171.5)),
    ((500.0, 40.0), (0.1, 20000, 172.0)),
    ((500.0, 50.0), (0.1, 30000, 173.5)),
    ((500.0, 60.0), (0.1, 37000, 174.0)),
    ((600.0, 5.0), (0.1, 1000, 158.0)),
    ((600.0, 10.0), (0.1, 2800, 166.0)),
    ((600.0, 20.0), (0.1, 6000, 168.0)),
    ((600.0, 30.0), (0.1, 12000, 170.0)),
    ((600.0, 40.0), (0.1, 20000, 172.0)),
    ((600.0, 50.0), (0.1, 30000, 173.5)),
    ((600.0, 60.0), (0.1, 37000, 174.0)),
];

/// Where header parameters come from
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderSource {
    /// Same parameters for every configuration
    Fixed(HeaderParams),
    /// Bucketed table of tuned defaults
    Defaults,
}

impl HeaderSource {
    /// Resolve the header for one configuration.
    /// For two-planet runs pass the larger of the two distances.
    pub fn resolve(&self, pericentre: f64, planet_distance: f64) -> Result<HeaderParams> {
        match self {
            HeaderSource::Fixed(params) => Ok(*params),
            HeaderSource::Defaults => default_header(pericentre, planet_distance),
        }
    }
}

/// Look up the first default bucket with `pericentre <= p_max && distance <= d_max`
pub fn default_header(pericentre: f64, planet_distance: f64) -> Result<HeaderParams> {
    DEFAULT_TABLE
        .iter()
        .find(|((p_max, d_max), _)| pericentre <= *p_max && planet_distance <= *d_max)
        .map(|(_, (time_step, steps, anomaly))| HeaderParams::from_degrees(*time_step, *steps, *anomaly))
        .ok_or(DpsError::HeaderLookupMiss {
            pericentre,
            planet_distance,
        })
}
