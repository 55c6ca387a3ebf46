//! Physical constants in normalised units (G = 1, masses in solar masses)

/// Gravitational constant
pub const G: f64 = 1.0;

/// Central body (black hole) mass
pub const CENTRAL_MASS: f64 = 4_000_000.0;

/// Star mass
pub const STAR_MASS: f64 = 1.0;

/// Planet mass (one Jupiter mass)
pub const PLANET_MASS: f64 = 0.0009543;
