//! Build initial conditions for one configuration
//!
//! The central body sits at rest at the origin. The star starts on a parabolic
//! orbit about it at a given true anomaly, and each planet starts on a circular
//! orbit about the star:
//! - star position  x = 2p cos(nu) / (1 + cos(nu)),  y = 2p sin(nu) / (1 + cos(nu))
//! - star velocity  v_p = sqrt(2 G M / r),  (v_p sin(nu/2), -v_p cos(nu/2), 0)
//! - planet offset  d (cos(i) cos(phi), cos(i) sin(phi), sin(i)) from the star
//! - planet velocity star velocity + v_c (sin(phi), -cos(phi), 0), v_c = sqrt(G M_star / d)
//!
//! Orientation angles are drawn by the caller and passed in explicitly.

use rand::Rng;
use serde::Deserialize;

use crate::catalog::record::ConfigurationRecord;
use crate::simulation::constants::G;
use crate::simulation::params::HeaderParams;
use crate::simulation::states::{relative_distance, Body, BodyRole, NVec3};

/// How the integer orientation angles are fed into the trigonometry.
///
/// `AsRun` passes the integer value straight to sin/cos (which take radians),
/// reproducing the orientation distribution of the existing runs. `Degrees`
/// converts to radians first, giving a uniform distribution in degrees.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleConvention {
    #[serde(rename = "as_run")]
    #[default]
    AsRun,

    #[serde(rename = "degrees")]
    Degrees,
}

impl AngleConvention {
    pub fn to_radians(self, angle: u32) -> f64 {
        match self {
            AngleConvention::AsRun => f64::from(angle),
            AngleConvention::Degrees => f64::from(angle).to_radians(),
        }
    }
}

/// Orientation of the planet orbit(s) about the star, integers in [0, 360)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub phi: u32,
    pub inclination: u32,
}

impl Orientation {
    /// Uniform draw of both angles
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            phi: rng.random_range(0..360),
            inclination: rng.random_range(0..360),
        }
    }
}

/// The central body, at rest at the origin
pub fn central_body() -> Body {
    Body::new(BodyRole::Central.mass(), NVec3::zeros(), NVec3::zeros())
}

/// Star on a parabolic approach to the central body at true anomaly `true_anomaly` (radians)
pub fn create_star(pericentre: f64, true_anomaly: f64) -> Body {
    let (sin_nu, cos_nu) = true_anomaly.sin_cos();

    let x = 2.0 * pericentre * cos_nu / (1.0 + cos_nu);
    let y = 2.0 * pericentre * sin_nu / (1.0 + cos_nu);
    let position = NVec3::new(x, y, 0.0);

    let central = central_body();
    let r = relative_distance(&position, &central.position(0));
    let parabolic_speed = (2.0 * G * central.mass() / r).sqrt();

    let half = true_anomaly / 2.0;
    let velocity = NVec3::new(parabolic_speed * half.sin(), -parabolic_speed * half.cos(), 0.0);

    Body::new(BodyRole::Star.mass(), position, velocity)
}

/// Planet on a circular orbit of radius `planet_distance` about `star`
pub fn create_planet(
    star: &Body,
    planet_distance: f64,
    orientation: Orientation,
    convention: AngleConvention,
) -> Body {
    let phi = convention.to_radians(orientation.phi);
    let inclination = convention.to_radians(orientation.inclination);

    let offset = NVec3::new(
        inclination.cos() * phi.cos(),
        inclination.cos() * phi.sin(),
        inclination.sin(),
    ) * planet_distance;
    let position = star.position(0) + offset;

    let circular_speed = (G * star.mass() / planet_distance).sqrt();
    let velocity = star.velocity(0) + NVec3::new(circular_speed * phi.sin(), -circular_speed * phi.cos(), 0.0);

    Body::new(BodyRole::Planet.mass(), position, velocity)
}

/// Initial state for one configuration, in integrator order
#[derive(Debug, Clone)]
pub struct Scenario {
    pub central: Body,
    pub star: Body,
    pub planets: Vec<Body>, // one or two
}

impl Scenario {
    pub fn build(record: &ConfigurationRecord, header: &HeaderParams, convention: AngleConvention) -> Self {
        let star = create_star(record.pericentre, header.true_anomaly);
        let orientation = record.orientation();

        // both planets share the orientation, distances are independent
        let planets = record
            .planet_distances
            .iter()
            .map(|distance| create_planet(&star, distance, orientation, convention))
            .collect();

        Self {
            central: central_body(),
            star,
            planets,
        }
    }

    /// Bodies in the order the integrator expects: central, star, planet(s)
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        std::iter::once(&self.central)
            .chain(std::iter::once(&self.star))
            .chain(self.planets.iter())
    }

    pub fn body_count(&self) -> usize {
        2 + self.planets.len()
    }
}
