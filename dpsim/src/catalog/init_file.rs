//! `.init` file text for the external integrator
//!
//! ```text
//! -1 3 0.1 3500 0.000000 0.000000 1.d0 1.d-3 0.d0 0 p100_r10_o1.out 1 1
//!   4000000   -190.2...   31.0...   0   ...
//! ```
//! The first line is the integration header, then one line per body
//! (mass, position, velocity) in central, star, planet(s) order.

use crate::simulation::params::HeaderParams;
use crate::simulation::scenario::Scenario;
use crate::simulation::states::Body;

pub fn header_line(filename: &str, body_count: usize, header: &HeaderParams) -> String {
    format!(
        "-1 {body_count} {} {} 0.000000 0.000000 1.d0 1.d-3 0.d0 0 {filename}.out 1 1",
        header.time_step, header.step_count
    )
}

pub fn body_line(body: &Body) -> String {
    let x = body.position(0);
    let v = body.velocity(0);
    format!(
        "  {}   {}   {}   {}   {}   {}   {}",
        body.mass(),
        x.x,
        x.y,
        x.z,
        v.x,
        v.y,
        v.z
    )
}

/// Full file text, no trailing newline
pub fn init_file_text(filename: &str, scenario: &Scenario, header: &HeaderParams) -> String {
    let mut text = header_line(filename, scenario.body_count(), header);
    for body in scenario.bodies() {
        text.push('\n');
        text.push_str(&body_line(body));
    }
    text
}
