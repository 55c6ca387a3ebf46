//! Load integrator output (`.out`) files
//!
//! Each row is `time` followed by `mass x y z vx vy vz` for every body, in
//! central, star, planet(s) order. Rows are read until the first one that does
//! not match that shape, such as a truncated or corrupt tail; everything before
//! it is kept. Masses come from the body roles, not from the file.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use crate::error::{DpsError, Result};
use crate::simulation::states::{Body, BodyRole, NVec3};

const FIELDS_PER_BODY: usize = 7;

/// Parse one numeric token; Fortran `D` exponents are accepted
fn parse_number(token: &str) -> Option<f64> {
    let value = if token.contains(['d', 'D']) {
        token.replace(['d', 'D'], "e").parse::<f64>().ok()?
    } else {
        token.parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

/// Parse a full row, or `None` if it does not have exactly the expected shape
fn parse_row(line: &str, body_count: usize) -> Option<Vec<f64>> {
    let values = line
        .split_whitespace()
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;
    (values.len() == 1 + FIELDS_PER_BODY * body_count).then_some(values)
}

fn roles(body_count: usize) -> Option<Vec<BodyRole>> {
    match body_count {
        3 => Some(vec![BodyRole::Central, BodyRole::Star, BodyRole::Planet]),
        4 => Some(vec![BodyRole::Central, BodyRole::Star, BodyRole::Planet, BodyRole::Planet]),
        _ => None,
    }
}

/// Read a trajectory for `body_count` bodies (3 or 4)
pub fn load_trajectory(path: &Path, body_count: usize) -> Result<Vec<Body>> {
    let roles = roles(body_count).ok_or_else(|| DpsError::TrajectoryMalformed {
        path: path.to_path_buf(),
        reason: format!("unsupported body count {body_count}"),
    })?;

    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DpsError::TrajectoryNotFound(path.to_path_buf()),
        _ => DpsError::io(path, e),
    })?;

    let mut positions: Vec<Vec<NVec3>> = vec![Vec::new(); body_count];
    let mut velocities: Vec<Vec<NVec3>> = vec![Vec::new(); body_count];
    let mut first_line: Option<String> = None;

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        let read = reader.read_until(b'\n', &mut buffer).map_err(|e| DpsError::io(path, e))?;
        if read == 0 {
            break;
        }
        // a line that is not text is a corrupt tail like any other bad row
        let line = String::from_utf8_lossy(&buffer);
        if first_line.is_none() {
            first_line = Some(line.to_string());
        }
        let Some(row) = parse_row(&line, body_count) else {
            break;
        };
        // skip the time column, then one 7-tuple per body
        for (body, fields) in row[1..].chunks_exact(FIELDS_PER_BODY).enumerate() {
            positions[body].push(NVec3::new(fields[1], fields[2], fields[3]));
            velocities[body].push(NVec3::new(fields[4], fields[5], fields[6]));
        }
    }

    if positions[0].is_empty() {
        return match first_line {
            Some(line) if !line.trim().is_empty() => Err(DpsError::TrajectoryMalformed {
                path: path.to_path_buf(),
                reason: format!(
                    "first row has {} fields, expected {}",
                    line.split_whitespace().count(),
                    1 + FIELDS_PER_BODY * body_count
                ),
            }),
            _ => Err(DpsError::TrajectoryEmpty(path.to_path_buf())),
        };
    }

    roles
        .into_iter()
        .zip(positions.into_iter().zip(velocities))
        .map(|(role, (x, v))| Body::from_samples(role.mass(), x, v))
        .collect()
}
