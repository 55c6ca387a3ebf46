//! Core state types for the three/four body encounter.
//!
//! - `NVec3` is the 3-component value type used for every position and velocity
//! - `BodyRole` fixes a body's mass (central body, star, planet)
//! - `Body` holds a mass and one (position, velocity) sample per saved time step,
//!   index 0 being the initial condition
//!
//! Bodies are built once (at generation time or when a trajectory is loaded)
//! and never mutated afterwards.

use nalgebra::Vector3;

use crate::error::{DpsError, Result};
use crate::simulation::constants::{CENTRAL_MASS, PLANET_MASS, STAR_MASS};

pub type NVec3 = Vector3<f64>;

/// Distance between two points
pub fn relative_distance(a: &NVec3, b: &NVec3) -> f64 {
    (a - b).norm()
}

/// The physical role of a body in the encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRole {
    Central,
    Star,
    Planet,
}

impl BodyRole {
    pub fn mass(self) -> f64 {
        match self {
            BodyRole::Central => CENTRAL_MASS,
            BodyRole::Star => STAR_MASS,
            BodyRole::Planet => PLANET_MASS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    mass: f64,                 // mass
    positions: Vec<NVec3>,     // one position per time step
    velocities: Vec<NVec3>,    // one velocity per time step
}

impl Body {
    /// A body with a single (initial) sample
    pub fn new(mass: f64, position: NVec3, velocity: NVec3) -> Self {
        Self {
            mass,
            positions: vec![position],
            velocities: vec![velocity],
        }
    }

    /// A body with a full trajectory. Positions and velocities must line up.
    pub fn from_samples(mass: f64, positions: Vec<NVec3>, velocities: Vec<NVec3>) -> Result<Self> {
        if positions.len() != velocities.len() {
            return Err(DpsError::Configuration(format!(
                "body has {} positions but {} velocities",
                positions.len(),
                velocities.len()
            )));
        }
        Ok(Self {
            mass,
            positions,
            velocities,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Number of saved time steps
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Panics if `index` is out of range, like slice indexing
    pub fn position(&self, index: usize) -> NVec3 {
        self.positions[index]
    }

    /// Panics if `index` is out of range, like slice indexing
    pub fn velocity(&self, index: usize) -> NVec3 {
        self.velocities[index]
    }

    pub fn positions(&self) -> &[NVec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[NVec3] {
        &self.velocities
    }

    /// |x_self - x_other| at sample `index`
    pub fn relative_distance(&self, other: &Body, index: usize) -> f64 {
        relative_distance(&self.positions[index], &other.positions[index])
    }

    /// |v_self - v_other| at sample `index`
    pub fn relative_speed(&self, other: &Body, index: usize) -> f64 {
        relative_distance(&self.velocities[index], &other.velocities[index])
    }
}
