//! Classify the final state of a planet and solve for its orbital elements
//!
//! A planet is tested for being bound to the star first, and only if it is not
//! bound to the star is it tested against the central body. Whichever relation
//! is bound gets a semi-major axis and eccentricity from the final sample:
//! - a = (2/r - v^2 / (G M))^-1           (vis-viva)
//! - e = sqrt(1 - h^2 / (G M a)),  h = |r x v|
//!
//! where r, v are relative and M is the sum of both masses.

use crate::simulation::constants::G;
use crate::simulation::states::Body;

/// What the planet ended up bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundTo {
    Central,
    Star,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub bound_to: BoundTo,
    pub planet_distance: f64, // initial distance from the star
    pub semi_major_axis: f64, // 0 when unbound
    pub eccentricity: f64,    // 0 when unbound
}

/// Two-body energy of `target` relative to `other` at sample `index`
pub fn total_energy(target: &Body, other: &Body, index: usize) -> f64 {
    let m = target.mass();
    let r = target.relative_distance(other, index);
    let v = target.relative_speed(other, index);
    0.5 * m * v * v - G * other.mass() * m / r
}

/// Energy at every sample both bodies have
pub fn total_energies(target: &Body, other: &Body) -> Vec<f64> {
    let samples = target.len().min(other.len());
    (0..samples).map(|i| total_energy(target, other, i)).collect()
}

/// Bound test on an energy history.
///
/// Find the (first) peak, then the minimum of the history from the peak on.
/// The tail that has to be strictly negative starts right after the peak; if the
/// peak is the last sample, or nothing after it drops below it, the tail starts
/// at the peak. A transient positive spike before the peak is tolerated.
pub fn is_bound_energies(energies: &[f64]) -> bool {
    let Some(peak) = first_max_index(energies) else {
        return false;
    };
    let trough = peak + first_min_index(&energies[peak..]).unwrap_or(0);

    let tail_start = if trough > peak { peak + 1 } else { trough };
    energies[tail_start..].iter().all(|&e| e < 0.0)
}

fn first_max_index(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn first_min_index(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

pub fn is_bound(target: &Body, other: &Body) -> bool {
    is_bound_energies(&total_energies(target, other))
}

pub fn semi_major_axis(body1: &Body, body2: &Body, index: usize) -> f64 {
    let total_mass = body1.mass() + body2.mass();
    let r = body1.relative_distance(body2, index);
    let v = body1.relative_speed(body2, index);
    (2.0 / r - v * v / (G * total_mass)).recip()
}

/// Round-off can push 1 - h^2/(GMa) slightly below zero for circular orbits; clamp it
pub fn eccentricity(body1: &Body, body2: &Body, semi_major_axis: f64, index: usize) -> f64 {
    let total_mass = body1.mass() + body2.mass();
    let relative_position = body1.position(index) - body2.position(index);
    let relative_velocity = body1.velocity(index) - body2.velocity(index);
    let h = relative_position.cross(&relative_velocity).norm();
    (1.0 - h * h / (G * total_mass * semi_major_axis)).max(0.0).sqrt()
}

/// (semi-major axis, eccentricity) at the final common sample
pub fn orbital_elements(body1: &Body, body2: &Body) -> (f64, f64) {
    let samples = body1.len().min(body2.len());
    if samples == 0 {
        return (0.0, 0.0);
    }
    let index = samples - 1;
    let a = semi_major_axis(body1, body2, index);
    (a, eccentricity(body1, body2, a, index))
}

/// Classify `planet` against `star` (first) and `central`
pub fn classify(central: &Body, star: &Body, planet: &Body, planet_distance: f64) -> Outcome {
    let bound_to = if is_bound(planet, star) {
        BoundTo::Star
    } else if is_bound(planet, central) {
        BoundTo::Central
    } else {
        BoundTo::None
    };

    let (semi_major_axis, eccentricity) = match bound_to {
        BoundTo::Star => orbital_elements(star, planet),
        BoundTo::Central => orbital_elements(central, planet),
        BoundTo::None => (0.0, 0.0),
    };

    Outcome {
        bound_to,
        planet_distance,
        semi_major_axis,
        eccentricity,
    }
}
