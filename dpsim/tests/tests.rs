use dpsim::analysis::accumulator::{hills_radius, Accumulator, ResultSet};
use dpsim::analysis::aggregator::{Aggregator, TrajectorySource};
use dpsim::analysis::classifier::{classify, is_bound_energies, orbital_elements, BoundTo, Outcome};
use dpsim::analysis::results::{results_text, PLANET_A_RESULTS_FILENAME, PLANET_B_RESULTS_FILENAME, RESULTS_FILENAME};
use dpsim::analysis::trajectory::load_trajectory;
use dpsim::catalog::manifest::{manifest_text, parse_manifest, read_manifest, MANIFEST_FILENAME};
use dpsim::catalog::record::{AggregationKey, ConfigurationRecord, PlanetDistances};
use dpsim::catalog::sweep::{Catalog, Sweep};
use dpsim::simulation::constants::{CENTRAL_MASS, G, PLANET_MASS, STAR_MASS};
use dpsim::simulation::engine::{RunContext, RunState};
use dpsim::simulation::params::{default_header, HeaderParams, HeaderSource};
use dpsim::simulation::scenario::{create_planet, create_star, AngleConvention, Orientation};
use dpsim::simulation::states::{Body, NVec3};
use dpsim::DpsError;

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Star parked at rest far from the central body
const STAR_X: f64 = 1.0e6;

/// Planet states relative to the origin, for a central body at rest at the
/// origin and a star at rest at (STAR_X, 0, 0)
#[derive(Clone, Copy, Debug)]
enum Fate {
    StarBound,
    CentralBound,
    Unbound,
}

impl Fate {
    fn planet(self) -> (NVec3, NVec3) {
        match self {
            // circular about the star at d = 10
            Fate::StarBound => (NVec3::new(STAR_X + 10.0, 0.0, 0.0), NVec3::new(0.0, (G * STAR_MASS / 10.0).sqrt(), 0.0)),
            // circular about the central body at r = 100
            Fate::CentralBound => (NVec3::new(100.0, 0.0, 0.0), NVec3::new(0.0, (G * CENTRAL_MASS / 100.0).sqrt(), 0.0)),
            Fate::Unbound => (NVec3::new(-STAR_X, 0.0, 0.0), NVec3::new(1.0e3, 0.0, 0.0)),
        }
    }
}

/// Body holding the same state for `samples` samples
fn constant_body(mass: f64, x: NVec3, v: NVec3, samples: usize) -> Body {
    Body::from_samples(mass, vec![x; samples], vec![v; samples]).unwrap()
}

/// Central body, star and one planet per fate, all held for `samples` samples
fn bodies_for(fates: &[Fate], samples: usize) -> Vec<Body> {
    let mut bodies = vec![
        constant_body(CENTRAL_MASS, NVec3::zeros(), NVec3::zeros(), samples),
        constant_body(STAR_MASS, NVec3::new(STAR_X, 0.0, 0.0), NVec3::zeros(), samples),
    ];
    for fate in fates {
        let (x, v) = fate.planet();
        bodies.push(constant_body(PLANET_MASS, x, v, samples));
    }
    bodies
}

fn state_columns(mass: f64, x: NVec3, v: NVec3) -> String {
    format!("{} {} {} {} {} {} {}", mass, x.x, x.y, x.z, v.x, v.y, v.z)
}

/// `.out` text with `samples` identical rows for the given planet fates
fn out_text(fates: &[Fate], samples: usize) -> String {
    let mut row = vec![
        state_columns(CENTRAL_MASS, NVec3::zeros(), NVec3::zeros()),
        state_columns(STAR_MASS, NVec3::new(STAR_X, 0.0, 0.0), NVec3::zeros()),
    ];
    for fate in fates {
        let (x, v) = fate.planet();
        row.push(state_columns(PLANET_MASS, x, v));
    }
    let row = row.join(" ");
    (0..samples).map(|t| format!("{t}.0 {row}\n")).collect()
}

fn single(pericentre: f64, distance: f64, index: usize) -> ConfigurationRecord {
    ConfigurationRecord::new(pericentre, PlanetDistances::Single(distance), index, Orientation { phi: 10, inclination: 20 })
}

fn pair(pericentre: f64, a: f64, b: f64, index: usize) -> ConfigurationRecord {
    ConfigurationRecord::new(pericentre, PlanetDistances::Pair(a, b), index, Orientation { phi: 10, inclination: 20 })
}

fn outcome(bound_to: BoundTo, semi_major_axis: f64, eccentricity: f64) -> Outcome {
    Outcome {
        bound_to,
        planet_distance: 10.0,
        semi_major_axis,
        eccentricity,
    }
}

fn sweep(pericentres: &[&str], distances: &[&str], orientations: usize) -> Sweep {
    Sweep {
        pericentres: pericentres.iter().map(|s| s.to_string()).collect(),
        planet_distances_a: distances.iter().map(|s| s.to_string()).collect(),
        planet_distances_b: None,
        orientations,
        seed: Some(7),
    }
}

fn started() -> Arc<RunContext> {
    let context = Arc::new(RunContext::new());
    context.start();
    context
}

fn file_names(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ==================================================================================
// Initial conditions
// ==================================================================================

#[test]
fn star_starts_on_parabola() {
    let pericentre = 100.0;
    let nu = 164f64.to_radians();
    let star = create_star(pericentre, nu);

    let r = star.position(0).norm();
    assert_relative_eq!(r, 2.0 * pericentre / (1.0 + nu.cos()), max_relative = 1e-12);
    assert_relative_eq!(star.velocity(0).norm(), (2.0 * G * CENTRAL_MASS / r).sqrt(), max_relative = 1e-12);
    assert_eq!(star.position(0).z, 0.0);
    assert_eq!(star.mass(), STAR_MASS);
}

#[test]
fn star_at_pericentre_for_zero_anomaly() {
    let star = create_star(250.0, 0.0);
    assert_relative_eq!(star.position(0).x, 250.0, max_relative = 1e-12);
    assert_relative_eq!(star.position(0).y, 0.0);
}

#[test]
fn planet_on_circular_orbit_about_star() {
    let star = create_star(100.0, 2.9);
    let orientation = Orientation { phi: 217, inclination: 45 };

    for convention in [AngleConvention::AsRun, AngleConvention::Degrees] {
        let planet = create_planet(&star, 10.0, orientation, convention);
        assert_relative_eq!(planet.relative_distance(&star, 0), 10.0, max_relative = 1e-9);
        assert_relative_eq!(planet.relative_speed(&star, 0), (G * STAR_MASS / 10.0).sqrt(), max_relative = 1e-9);
    }
}

#[test]
fn angle_conventions_differ() {
    let star = create_star(100.0, 0.0);
    let orientation = Orientation { phi: 90, inclination: 0 };

    let degrees = create_planet(&star, 10.0, orientation, AngleConvention::Degrees);
    let offset = degrees.position(0) - star.position(0);
    assert_relative_eq!(offset.x, 0.0, epsilon = 1e-9);
    assert_relative_eq!(offset.y, 10.0, epsilon = 1e-9);

    let as_run = create_planet(&star, 10.0, orientation, AngleConvention::AsRun);
    let offset = as_run.position(0) - star.position(0);
    assert_relative_eq!(offset.x, 10.0 * 90f64.cos(), epsilon = 1e-9);
    assert_relative_eq!(offset.y, 10.0 * 90f64.sin(), epsilon = 1e-9);
}

#[test]
fn orientation_draws_stay_below_360() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for _ in 0..1000 {
        let o = Orientation::draw(&mut rng);
        assert!(o.phi < 360 && o.inclination < 360);
    }
}

// ==================================================================================
// Header parameters
// ==================================================================================

#[test]
fn header_lookup_picks_first_dominating_bucket() {
    let exact = default_header(100.0, 10.0).unwrap();
    assert_eq!(exact, HeaderParams::from_degrees(0.1, 3500, 172.0));

    let between = default_header(150.0, 7.0).unwrap();
    assert_eq!(between, HeaderParams::from_degrees(0.1, 3000, 171.0));

    let smallest = default_header(1.0, 1.0).unwrap();
    assert_eq!(smallest.step_count, 3000);
}

#[test]
fn header_lookup_misses_outside_table() {
    assert!(matches!(default_header(601.0, 10.0), Err(DpsError::HeaderLookupMiss { .. })));
    assert!(matches!(default_header(100.0, 61.0), Err(DpsError::HeaderLookupMiss { .. })));
}

#[test]
fn fixed_header_ignores_configuration() {
    let fixed = HeaderParams::from_degrees(0.08, 1200, 164.0);
    let source = HeaderSource::Fixed(fixed);
    assert_eq!(source.resolve(10_000.0, 500.0).unwrap(), fixed);
    assert_relative_eq!(fixed.true_anomaly, 164f64.to_radians(), max_relative = 1e-12);
}

// ==================================================================================
// Records, keys and manifest
// ==================================================================================

#[test]
fn filenames_follow_values() {
    assert_eq!(single(100.0, 10.0, 1).filename, "p100_r10_o1");
    assert_eq!(single(150.5, 2.5, 12).filename, "p150.5_r2.5_o12");
    assert_eq!(pair(100.0, 10.0, 20.0, 3).filename, "p100_r10_20_o3");
    assert_eq!(single(100.0, 10.0, 1).out_filename(), "p100_r10_o1.out");
}

#[test]
fn aggregation_keys_compare_at_fixed_precision() {
    assert_eq!(AggregationKey::new(100.0, 10.0), AggregationKey::new(100.000_000_01, 10.0));
    assert_ne!(AggregationKey::new(100.0, 10.0), AggregationKey::new(100.0, 10.001));
    assert_relative_eq!(AggregationKey::new(123.25, 7.5).pericentre(), 123.25);
}

#[test]
fn manifest_round_trip_single_planet() {
    let records = vec![single(100.0, 10.0, 1), single(100.0, 10.0, 2), single(200.5, 0.3, 1)];
    let text = manifest_text(&records);
    assert!(text.starts_with("OrientationIndex Pericentre PlanetDistance Phi Inclination"));

    let parsed = parse_manifest(&text).unwrap();
    assert_eq!(parsed, records);
    assert_eq!(parsed[2].pericentre, 200.5);
    assert_eq!(parsed[2].planet_distances, PlanetDistances::Single(0.3));
    assert_eq!(parsed[1].orientation(), records[1].orientation());
}

#[test]
fn manifest_round_trip_two_planets() {
    let records = vec![pair(100.0, 10.0, 20.0, 1)];
    let text = manifest_text(&records);
    assert!(text.contains("PlanetDistanceA PlanetDistanceB"));
    assert!(text.ends_with("1 100.0 10.0 20.0 10 20"));

    let parsed = parse_manifest(&text).unwrap();
    assert_eq!(parsed[0].planet_distances, PlanetDistances::Pair(10.0, 20.0));
}

#[test]
fn manifest_rejects_bad_lines() {
    let text = "OrientationIndex Pericentre PlanetDistance Phi Inclination\n1 100.0 10.0 400 5";
    assert!(matches!(parse_manifest(text), Err(DpsError::Configuration(_))));

    let text = "header\n1 100.0 ten 4 5";
    assert!(matches!(parse_manifest(text), Err(DpsError::Configuration(_))));
}

// ==================================================================================
// Catalog generation
// ==================================================================================

#[test]
fn generate_single_configuration() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    let context = started();

    let records = catalog.generate(&sweep(&["100"], &["10"], 1), &context).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "p100_r10_o1");

    let init = fs::read_to_string(dir.path().join("p100_r10_o1.init")).unwrap();
    let lines: Vec<&str> = init.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("-1 3 0.1 3500 0.000000 0.000000 1.d0 1.d-3 0.d0 0 p100_r10_o1.out 1 1"));
    assert!(lines[1].starts_with("  4000000   0   0   0"));

    let manifest = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
    let expected = format!("1 100.0 10.0 {} {}", records[0].phi, records[0].inclination);
    assert_eq!(manifest.lines().nth(1), Some(expected.as_str()));
    assert_eq!(context.steps(), 1);
}

#[test]
fn generate_full_product_in_sweep_order() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);

    let records = catalog.generate(&sweep(&["100", "200"], &["10", "20"], 3), &started()).unwrap();
    assert_eq!(records.len(), 12);
    assert_eq!(records[0].filename, "p100_r10_o1");
    assert_eq!(records[3].filename, "p100_r20_o1");
    assert_eq!(records[11].filename, "p200_r20_o3");

    // 12 init files plus the manifest
    assert_eq!(file_names(dir.path()).len(), 13);
    assert_eq!(read_manifest(dir.path()).unwrap(), records);
}

#[test]
fn generate_two_planets_pairs_distances() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    let mut input = sweep(&["100"], &["10", "20"], 1);
    input.planet_distances_b = Some(vec!["30".into(), "40".into()]);

    let records = catalog.generate(&input, &started()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].planet_distances, PlanetDistances::Pair(20.0, 40.0));

    // header comes from the wider distance
    let init = fs::read_to_string(dir.path().join("p100_r20_40_o1.init")).unwrap();
    assert!(init.starts_with("-1 4 0.1 30000 "));
    assert_eq!(init.lines().count(), 5);
}

#[test]
fn generate_is_reproducible_for_a_seed() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let input = sweep(&["100"], &["10"], 20);

    let first = Catalog::new(a.path(), HeaderSource::Defaults, AngleConvention::AsRun)
        .generate(&input, &started())
        .unwrap();
    let second = Catalog::new(b.path(), HeaderSource::Defaults, AngleConvention::AsRun)
        .generate(&input, &started())
        .unwrap();

    let angles = |records: &[ConfigurationRecord]| records.iter().map(|r| (r.phi, r.inclination)).collect::<Vec<_>>();
    assert_eq!(angles(&first), angles(&second));
}

#[test]
fn bad_sweep_writes_nothing() {
    let dir = tempdir().unwrap();
    let run = dir.path().join("run");
    let catalog = Catalog::new(&run, HeaderSource::Defaults, AngleConvention::AsRun);
    let context = started();

    let cases = vec![
        sweep(&[], &["10"], 1),
        sweep(&["100", "abc"], &["10"], 1),
        sweep(&["100"], &["-10"], 1),
        sweep(&["100"], &["10"], 0),
        {
            let mut s = sweep(&["100"], &["10", "20"], 1);
            s.planet_distances_b = Some(vec!["30".into()]);
            s
        },
    ];
    for case in cases {
        assert!(matches!(catalog.generate(&case, &context), Err(DpsError::Configuration(_))));
    }

    assert!(matches!(
        catalog.generate(&sweep(&["100", "700"], &["10"], 1), &context),
        Err(DpsError::HeaderLookupMiss { .. })
    ));
    assert!(file_names(&run).is_empty());
}

#[test]
fn cancelled_generation_leaves_no_files() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    let context = started();
    context.cancel();

    let result = catalog.generate(&sweep(&["100", "200"], &["10"], 5), &context);
    assert!(matches!(result, Err(DpsError::Cancelled)));
    assert!(file_names(dir.path()).is_empty());
}

#[test]
fn cancelling_mid_sweep_removes_written_files() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    // cancel as soon as the first pericentre has been written
    let context = RunContext::with_listener(Box::new(|context: &RunContext| context.cancel()));
    context.start();

    let result = catalog.generate(&sweep(&["100", "200", "300"], &["10", "20"], 4), &context);
    assert!(matches!(result, Err(DpsError::Cancelled)));
    assert_eq!(context.steps(), 1);
    assert!(file_names(dir.path()).is_empty());
}

#[test]
fn equal_values_are_one_configuration() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    let context = started();

    let cases = vec![
        sweep(&["100", "100.0"], &["10"], 1),
        sweep(&["100", "100"], &["10"], 1),
        sweep(&["100"], &["10", "1e1"], 2),
        {
            let mut s = sweep(&["100"], &["10", "10"], 1);
            s.planet_distances_b = Some(vec!["20".into(), "20.0".into()]);
            s
        },
    ];
    for case in cases {
        assert!(matches!(catalog.generate(&case, &context), Err(DpsError::Configuration(_))));
    }
    assert!(file_names(dir.path()).is_empty());

    // same values in different planet slots are distinct configurations
    let mut distinct = sweep(&["100"], &["10", "20"], 1);
    distinct.planet_distances_b = Some(vec!["20".into(), "10".into()]);
    assert_eq!(catalog.generate(&distinct, &context).unwrap().len(), 2);
}

#[test]
fn empty_list_entries_are_rejected() {
    assert_eq!(Sweep::split_list(" 100 , 200 "), vec!["100", "200"]);
    assert!(Sweep::split_list("  ").is_empty());
    assert_eq!(Sweep::split_list("100,,200"), vec!["100", "", "200"]);

    let dir = tempdir().unwrap();
    let run = dir.path().join("run");
    let catalog = Catalog::new(&run, HeaderSource::Defaults, AngleConvention::AsRun);
    let mut input = sweep(&["100"], &["10"], 1);
    input.pericentres = Sweep::split_list("100,,200");

    assert!(matches!(catalog.generate(&input, &started()), Err(DpsError::Configuration(_))));
    assert!(!run.exists());
}

#[test]
fn idle_context_does_not_generate() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::new(dir.path(), HeaderSource::Defaults, AngleConvention::AsRun);
    let result = catalog.generate(&sweep(&["100"], &["10"], 1), &RunContext::new());
    assert!(matches!(result, Err(DpsError::Cancelled)));
    assert!(!dir.path().join(MANIFEST_FILENAME).exists());
}

// ==================================================================================
// Trajectory loading
// ==================================================================================

#[test]
fn loader_reads_every_complete_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.out");
    fs::write(&path, out_text(&[Fate::StarBound], 4)).unwrap();

    let bodies = load_trajectory(&path, 3).unwrap();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|b| b.len() == 4));
    assert_eq!(bodies[0].mass(), CENTRAL_MASS);
    assert_eq!(bodies[2].mass(), PLANET_MASS);
    assert_relative_eq!(bodies[1].position(3).x, STAR_X);
}

#[test]
fn loader_stops_at_truncated_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.out");
    let mut text = out_text(&[Fate::Unbound], 3);
    text.push_str("3.0 4000000 0 0 0 0");
    fs::write(&path, text).unwrap();

    let bodies = load_trajectory(&path, 3).unwrap();
    assert!(bodies.iter().all(|b| b.len() == 3));
}

#[test]
fn loader_keeps_rows_before_binary_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.out");
    let mut bytes = out_text(&[Fate::CentralBound], 2).into_bytes();
    bytes.extend_from_slice(&[0xff, 0xfe, b'1', b'\n']);
    fs::write(&path, bytes).unwrap();

    let bodies = load_trajectory(&path, 3).unwrap();
    assert!(bodies.iter().all(|b| b.len() == 2));
}

#[test]
fn loader_accepts_fortran_exponents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.out");
    let row = "0.0D+00 4.0D+06 0 0 0 0 0 0 1.0 1.0D+03 0 0 0 0 0 9.543D-04 1.01D+03 0 0 0 0.1D0 0";
    fs::write(&path, row).unwrap();

    let bodies = load_trajectory(&path, 3).unwrap();
    assert_relative_eq!(bodies[1].position(0).x, 1000.0);
    assert_relative_eq!(bodies[2].position(0).x, 1010.0);
    assert_relative_eq!(bodies[2].velocity(0).y, 0.1);
}

#[test]
fn loader_errors() {
    let dir = tempdir().unwrap();

    let missing = dir.path().join("missing.out");
    assert!(matches!(load_trajectory(&missing, 3), Err(DpsError::TrajectoryNotFound(_))));

    let empty = dir.path().join("empty.out");
    fs::write(&empty, "").unwrap();
    assert!(matches!(load_trajectory(&empty, 3), Err(DpsError::TrajectoryEmpty(_))));

    let garbage = dir.path().join("garbage.out");
    fs::write(&garbage, "integration failed\n").unwrap();
    assert!(matches!(load_trajectory(&garbage, 3), Err(DpsError::TrajectoryMalformed { .. })));

    // four-body rows read as three bodies do not match
    let wrong = dir.path().join("wrong.out");
    fs::write(&wrong, out_text(&[Fate::StarBound, Fate::Unbound], 2)).unwrap();
    assert!(matches!(load_trajectory(&wrong, 3), Err(DpsError::TrajectoryMalformed { .. })));
}

// ==================================================================================
// Classification
// ==================================================================================

#[test]
fn bound_test_on_energy_histories() {
    assert!(is_bound_energies(&[-1.0, 2.0, -1.0, -1.0]));
    assert!(!is_bound_energies(&[-1.0, 2.0, 1.0, -1.0]));
    assert!(is_bound_energies(&[-3.0, -2.0, -1.0]));
    assert!(is_bound_energies(&[-1.0, -2.0, -3.0]));
    assert!(!is_bound_energies(&[-1.0, -0.5, 0.5]));
    assert!(!is_bound_energies(&[1.0]));
    // a positive sample anywhere after the peak means unbound
    assert!(!is_bound_energies(&[-1.0, 2.0, -3.0, 1.0, -5.0]));
    assert!(!is_bound_energies(&[]));
}

#[test]
fn classify_each_fate() {
    let bodies = bodies_for(&[Fate::StarBound, Fate::CentralBound, Fate::Unbound], 3);
    let (central, star) = (&bodies[0], &bodies[1]);

    assert_eq!(classify(central, star, &bodies[2], 10.0).bound_to, BoundTo::Star);
    assert_eq!(classify(central, star, &bodies[3], 10.0).bound_to, BoundTo::Central);

    let unbound = classify(central, star, &bodies[4], 10.0);
    assert_eq!(unbound.bound_to, BoundTo::None);
    assert_eq!(unbound.semi_major_axis, 0.0);
    assert_eq!(unbound.eccentricity, 0.0);
}

#[test]
fn star_takes_priority_over_central() {
    // a planet circling the star is also bound to the central body
    let bodies = bodies_for(&[Fate::StarBound], 3);
    let planet = &bodies[2];
    assert!(dpsim::analysis::classifier::is_bound(planet, &bodies[0]));

    let outcome = classify(&bodies[0], &bodies[1], planet, 10.0);
    assert_eq!(outcome.bound_to, BoundTo::Star);
    assert_eq!(outcome.planet_distance, 10.0);

    let expected_a = 1.0 / (2.0 / 10.0 - (G * STAR_MASS / 10.0) / (G * (STAR_MASS + PLANET_MASS)));
    assert_relative_eq!(outcome.semi_major_axis, expected_a, max_relative = 1e-9);
}

#[test]
fn elements_come_from_final_sample() {
    let r_final = 100.0;
    let speed = |r: f64| (G * CENTRAL_MASS / r).sqrt();
    let radii = [400.0, 200.0, r_final];

    let central = constant_body(CENTRAL_MASS, NVec3::zeros(), NVec3::zeros(), 3);
    let planet = Body::from_samples(
        PLANET_MASS,
        radii.iter().map(|&r| NVec3::new(r, 0.0, 0.0)).collect(),
        radii.iter().map(|&r| NVec3::new(0.0, speed(r), 0.0)).collect(),
    )
    .unwrap();

    let (a, e) = orbital_elements(&central, &planet);
    assert_relative_eq!(a, r_final, max_relative = 1e-6);
    assert!(e < 1e-3, "circular orbit eccentricity {e}");
}

#[test]
fn body_samples_must_match() {
    let result = Body::from_samples(1.0, vec![NVec3::zeros(); 2], vec![NVec3::zeros(); 3]);
    assert!(result.is_err());
}

// ==================================================================================
// Accumulators
// ==================================================================================

#[test]
fn hills_radius_scales_with_pericentre() {
    assert_relative_eq!(hills_radius(100.0), 100.0 * (1.0 / 1.2e7f64).cbrt(), max_relative = 1e-12);
    assert_relative_eq!(hills_radius(300.0), 3.0 * hills_radius(100.0), max_relative = 1e-12);
}

#[test]
fn empty_accumulator_is_all_zero() {
    let acc = Accumulator::new(hills_radius(100.0));
    assert_eq!(acc.central_fraction(), 0.0);
    assert_eq!(acc.unbound_fraction(), 0.0);
    assert_eq!(acc.star_fraction_error(), 0.0);
    assert_eq!(acc.mean_star_semi_major_axis(), 0.0);
    assert_eq!(acc.mean_central_eccentricity(), 0.0);
}

#[test]
fn accumulator_statistics() {
    let mut acc = Accumulator::new(1.0);
    acc.contribute(&outcome(BoundTo::Star, 2.0, 0.1));
    acc.contribute(&outcome(BoundTo::Star, 4.0, 0.3));
    acc.contribute(&outcome(BoundTo::Central, 50.0, 0.9));
    acc.contribute(&outcome(BoundTo::None, 0.0, 0.0));

    assert_eq!(acc.total_count, 4);
    assert_eq!(acc.unbound_count(), 1);
    assert_relative_eq!(acc.star_fraction(), 0.5);
    assert_relative_eq!(acc.central_fraction(), 0.25);
    assert_relative_eq!(acc.unbound_fraction(), 0.25);
    assert_relative_eq!(acc.star_fraction_error(), 2f64.sqrt() / 4.0);
    assert_relative_eq!(acc.mean_star_semi_major_axis(), 3.0);
    assert_relative_eq!(acc.mean_star_eccentricity(), 0.2);
    assert_relative_eq!(acc.mean_central_semi_major_axis(), 50.0);
    // no bound-to-star values leak into central means
    assert_relative_eq!(acc.mean_central_eccentricity(), 0.9);
}

fn result_set(outcomes: &[(f64, Outcome)]) -> ResultSet {
    let mut set = ResultSet::new();
    for (pericentre, o) in outcomes {
        set.contribute(AggregationKey::new(*pericentre, o.planet_distance), o);
    }
    set
}

fn assert_same_statistics(a: &ResultSet, b: &ResultSet) {
    assert_eq!(a.len(), b.len());
    for ((ka, x), (kb, y)) in a.iter().zip(b.iter()) {
        assert_eq!(ka, kb);
        assert_eq!((x.central_count, x.star_count, x.total_count), (y.central_count, y.star_count, y.total_count));
        assert_relative_eq!(x.mean_star_semi_major_axis(), y.mean_star_semi_major_axis(), max_relative = 1e-12);
        assert_relative_eq!(x.mean_central_eccentricity(), y.mean_central_eccentricity(), max_relative = 1e-12);
    }
}

#[test]
fn result_set_merge_is_order_independent() {
    let a = result_set(&[(100.0, outcome(BoundTo::Star, 1.0, 0.1)), (200.0, outcome(BoundTo::None, 0.0, 0.0))]);
    let b = result_set(&[(100.0, outcome(BoundTo::Star, 3.0, 0.5)), (100.0, outcome(BoundTo::Central, 9.0, 0.7))]);
    let c = result_set(&[(300.0, outcome(BoundTo::Central, 5.0, 0.2))]);

    assert_eq!(a.merged(&b), b.merged(&a));
    assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    assert_same_statistics(&a.merged(&b), &b.merged(&a));
    assert_same_statistics(&a.merged(&b).merged(&c), &a.merged(&b.merged(&c)));

    let merged = a.merged(&b);
    assert_eq!(merged.total_count(), 4);
    let bucket = merged.get(&AggregationKey::new(100.0, 10.0)).unwrap();
    assert_eq!(bucket.star_count, 2);
    assert_relative_eq!(bucket.mean_star_semi_major_axis(), 2.0);
}

#[test]
fn results_text_layout() {
    let set = result_set(&[(100.0, outcome(BoundTo::Star, 2.0, 0.5))]);
    let text = results_text(&set);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Pericentre"));
    let columns: Vec<&str> = lines[1].split_whitespace().collect();
    assert_eq!(columns.len(), 13);
    assert_eq!(columns[0], "100.000000");
    assert_eq!(columns[1], "10.000000");
    assert_eq!(columns[4], "1.000000");
    assert_eq!(columns[10], "2.000000");
}

// ==================================================================================
// Run context
// ==================================================================================

#[test]
fn run_context_progress_maps_into_task_range() {
    let context = RunContext::new();
    context.start();
    context.set_task("Processing out files...", 20.0, 100.0, 4);
    assert_relative_eq!(context.progress(), 20.0);

    context.report_step();
    context.report_step();
    assert_relative_eq!(context.progress(), 60.0);
    assert_eq!(context.task().description, "Processing out files...");
}

#[test]
fn run_context_state_transitions() {
    let context = RunContext::new();
    context.cancel();
    assert_eq!(context.state(), RunState::Idle);

    context.report_step();
    assert_eq!(context.steps(), 0);

    context.start();
    context.cancel();
    assert_eq!(context.state(), RunState::Cancelling);
    context.report_step();
    assert_eq!(context.steps(), 0);

    context.finish();
    assert_eq!(context.state(), RunState::Idle);
}

// ==================================================================================
// Aggregation
// ==================================================================================

/// In-memory trajectories; cancels the run on the `cancel_at`-th load
struct CancellingSource {
    context: Arc<RunContext>,
    loads: AtomicUsize,
    cancel_at: usize,
}

impl TrajectorySource for CancellingSource {
    fn load(&self, _record: &ConfigurationRecord) -> dpsim::Result<Vec<Body>> {
        let load = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if load == self.cancel_at {
            self.context.cancel();
        }
        Ok(bodies_for(&[Fate::StarBound], 3))
    }
}

fn cancelling_aggregator(dir: &Path, cancel_at: usize) -> (Aggregator<CancellingSource>, Arc<RunContext>) {
    let context = started();
    let source = CancellingSource {
        context: Arc::clone(&context),
        loads: AtomicUsize::new(0),
        cancel_at,
    };
    (Aggregator::with_source(source, dir, Arc::clone(&context)).workers(1), context)
}

#[test]
fn cancellation_mid_run_stops_queued_tasks() {
    let dir = tempdir().unwrap();
    let records: Vec<_> = (1..=6).map(|i| single(100.0 * i as f64, 10.0, 1)).collect();
    let (aggregator, context) = cancelling_aggregator(dir.path(), 3);

    let report = aggregator.run(&records).unwrap();

    // the task that cancelled still contributes but is not counted as progress
    assert_eq!(report.processed, 3);
    assert_eq!(report.planet_a.len(), 3);
    assert_eq!(context.steps(), 2);
    assert!(context.steps() < records.len());
}

#[test]
fn cancelled_analysis_writes_no_results() {
    let dir = tempdir().unwrap();
    let records: Vec<_> = (1..=4).map(|i| single(100.0, 10.0, i)).collect();
    let (aggregator, _context) = cancelling_aggregator(dir.path(), 1);

    assert!(matches!(aggregator.analyze(&records), Err(DpsError::Cancelled)));
    assert!(!dir.path().join(RESULTS_FILENAME).exists());
}

#[test]
fn analysis_of_out_files() {
    let dir = tempdir().unwrap();
    let fates = [Fate::StarBound, Fate::CentralBound, Fate::Unbound];
    let mut records: Vec<_> = (1..=3).map(|i| single(100.0, 10.0, i)).collect();
    for (record, fate) in records.iter().zip(fates) {
        fs::write(dir.path().join(record.out_filename()), out_text(&[fate], 5)).unwrap();
    }
    // configuration whose integration never produced output
    records.push(single(100.0, 10.0, 4));

    let context = started();
    let report = Aggregator::new(dir.path(), Arc::clone(&context)).analyze(&records).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 1);
    assert!(report.planet_b.is_none());
    assert_eq!(context.steps(), 4);

    let bucket = report.planet_a.get(&AggregationKey::new(100.0, 10.0)).unwrap();
    assert_eq!((bucket.star_count, bucket.central_count, bucket.total_count), (1, 1, 3));
    assert_relative_eq!(bucket.hills_radius, hills_radius(100.0));

    let text = fs::read_to_string(dir.path().join(RESULTS_FILENAME)).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn analysis_of_two_planet_runs() {
    let dir = tempdir().unwrap();
    let records = vec![pair(100.0, 10.0, 20.0, 1), pair(100.0, 10.0, 20.0, 2)];
    for record in &records {
        fs::write(
            dir.path().join(record.out_filename()),
            out_text(&[Fate::StarBound, Fate::Unbound], 3),
        )
        .unwrap();
    }

    let report = Aggregator::new(dir.path(), started()).workers(2).analyze(&records).unwrap();
    let planet_b = report.planet_b.as_ref().unwrap();

    let a = report.planet_a.get(&AggregationKey::new(100.0, 10.0)).unwrap();
    let b = planet_b.get(&AggregationKey::new(100.0, 20.0)).unwrap();
    assert_eq!((a.star_count, a.total_count), (2, 2));
    assert_eq!((b.unbound_count(), b.total_count), (2, 2));
    assert_eq!(report.combined().len(), 2);

    for name in [PLANET_A_RESULTS_FILENAME, PLANET_B_RESULTS_FILENAME, RESULTS_FILENAME] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
}
