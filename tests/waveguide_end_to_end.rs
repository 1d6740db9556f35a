use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use waveguide3d::Point;
use waveguide3d::Vector;
use waveguide3d::sim::acoustics::attenuator::{Attenuator, Microphone, NullAttenuator};
use waveguide3d::sim::engine::FlatScene;
use waveguide3d::sim::engine::voxel_grid::VoxelGrid;
use waveguide3d::sim::materials::AcousticMaterial;
use waveguide3d::sim::waveguide::compensation::mesh_impulse_response;
use waveguide3d::sim::waveguide::diagnostics::{
    check_results, first_nonzero, lattice_dump, write_lattice_json,
};
use waveguide3d::sim::waveguide::{
    MeshProgram, RectangularWaveguide, RunState, RunStepResult, TetrahedralWaveguide,
    WaveguideConfig,
};

fn cube_room(size: f64, absorption: f64) -> anyhow::Result<FlatScene> {
    FlatScene::from_box(
        size,
        size,
        size,
        None,
        vec![AcousticMaterial::uniform("walls", absorption, 0.1)],
    )
}

fn config(spacing: f64) -> WaveguideConfig {
    let mut config = WaveguideConfig::new().with_anchor(Point::new(
        spacing / 2.,
        spacing / 2.,
        spacing / 2.,
    ));
    config.spacing = spacing;
    config.voxel_subdivisions = 8;
    config.num_threads = Some(4);
    config
}

fn run_impulse(
    waveguide: &mut RectangularWaveguide,
    source: Point,
    output: Point,
    steps: usize,
) -> anyhow::Result<Vec<RunStepResult>> {
    let results =
        waveguide.init_and_run(source, vec![1.0], output, steps, |_| ControlFlow::Continue(()))?;
    Ok(results)
}

/// Energy of the second difference of `p` over `range`. Removes the slow
/// drift a closed lattice builds up from a hard source.
fn high_passed_energy(p: &[f64], range: std::ops::Range<usize>) -> f64 {
    range
        .map(|n| p[n] - 2. * p[n - 1] + p[n - 2])
        .map(|d| d * d)
        .sum()
}

#[test]
fn test_impulse_arrives_after_lattice_distance() -> anyhow::Result<()> {
    let scene = cube_room(5., 0.)?;
    let mut wg = RectangularWaveguide::from_scene(&scene, &config(1.0))?;
    let source = Point::new(1.5, 2.5, 2.5);

    // Along an axis, two nodes away
    let results = run_impulse(&mut wg, source, Point::new(3.5, 2.5, 2.5), 20)?;
    let pressures: Vec<f64> = results.iter().map(|r| r.pressure).collect();
    let (step, value) = first_nonzero(&pressures).expect("the impulse must arrive");
    assert_eq!(step, 2);
    assert!((value - 1. / 9.).abs() < 1e-12);

    // Diagonal, four lattice steps away
    let results = run_impulse(&mut wg, source, Point::new(3.5, 3.5, 3.5), 20)?;
    let pressures: Vec<f64> = results.iter().map(|r| r.pressure).collect();
    let (step, value) = first_nonzero(&pressures).expect("the impulse must arrive");
    assert_eq!(step, 4);
    assert!(value > 0.);
    Ok(())
}

#[test]
fn test_runs_are_deterministic() -> anyhow::Result<()> {
    let scene = cube_room(2., 0.3)?;
    let source = Point::new(0.55, 0.65, 0.75);
    let output = Point::new(1.45, 1.25, 1.05);

    let mut first = RectangularWaveguide::from_scene(&scene, &config(0.1))?;
    let a = run_impulse(&mut first, source, output, 200)?;
    let mut second = RectangularWaveguide::from_scene(&scene, &config(0.1))?;
    let b = run_impulse(&mut second, source, output, 200)?;
    // Re-running on the same waveguide starts from a clean state
    let c = run_impulse(&mut first, source, output, 200)?;

    assert_eq!(a.len(), 200);
    for ((ra, rb), rc) in a.iter().zip(&b).zip(&c) {
        assert_eq!(ra.pressure.to_bits(), rb.pressure.to_bits());
        assert_eq!(ra.pressure.to_bits(), rc.pressure.to_bits());
        assert_eq!(ra.intensity, rb.intensity);
        assert_eq!(ra.intensity, rc.intensity);
    }
    Ok(())
}

#[test]
fn test_absorbing_walls_decay_faster_than_rigid() -> anyhow::Result<()> {
    let steps = 600;
    let source = Point::new(0.35, 0.45, 0.55);
    let output = Point::new(0.65, 0.55, 0.35);

    let mut rigid = RectangularWaveguide::from_scene(&cube_room(1., 0.)?, &config(0.1))?;
    let rigid = run_impulse(&mut rigid, source, output, steps)?;
    let mut absorbing = RectangularWaveguide::from_scene(&cube_room(1., 0.9)?, &config(0.1))?;
    let absorbing = run_impulse(&mut absorbing, source, output, steps)?;

    check_results(&rigid, "rigid")?;
    check_results(&absorbing, "absorbing")?;

    let p_rigid: Vec<f64> = rigid.iter().map(|r| r.pressure).collect();
    let p_absorbing: Vec<f64> = absorbing.iter().map(|r| r.pressure).collect();

    // The direct sound is the same in both rooms
    assert_eq!(first_nonzero(&p_rigid), first_nonzero(&p_absorbing));

    let late = steps / 2..steps;
    let e_rigid = high_passed_energy(&p_rigid, late.clone());
    let e_absorbing = high_passed_energy(&p_absorbing, late);
    assert!(e_rigid > 0.);
    assert!(
        e_absorbing < 0.5 * e_rigid,
        "absorbing {} vs rigid {}",
        e_absorbing,
        e_rigid
    );
    Ok(())
}

#[test]
fn test_voxel_search_matches_brute_force() -> anyhow::Result<()> {
    let surfaces = (0..6)
        .map(|i| AcousticMaterial::uniform(&format!("s{}", i), 0.1 * i as f64, 0.))
        .collect();
    let scene = FlatScene::from_box(3., 2., 1.5, Some((-1., 0.5, 0.)), surfaces)?;
    let grid = VoxelGrid::new(&scene, 8);
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..500 {
        let pt = Point::new(
            rng.gen_range(-2.0..3.0),
            rng.gen_range(-0.5..3.5),
            rng.gen_range(-1.0..2.5),
        );
        let found = grid.closest_triangle(pt).expect("scene has triangles");
        let brute = (0..scene.triangles.len())
            .map(|i| scene.distance_squared_to_triangle(i, pt))
            .fold(f64::INFINITY, f64::min);
        let d = scene.distance_squared_to_triangle(found, pt);
        assert!((d - brute).abs() < 1e-12, "{}: {} vs {}", pt, d, brute);
    }
    Ok(())
}

#[test]
fn test_tetrahedral_run() -> anyhow::Result<()> {
    let scene = cube_room(2., 0.)?;
    let mut config = config(0.25);
    config.anchor = Point::new(1., 1., 1.);
    let mut wg = TetrahedralWaveguide::from_scene(&scene, &config)?;
    assert!(wg.program().num_nodes() > 0);

    let pt = Point::new(1., 1., 1.);
    let results = wg.init_and_run(pt, vec![1.0, 0.5], pt, 100, |_| ControlFlow::Continue(()))?;
    assert_eq!(results.len(), 100);
    assert_eq!(results[0].pressure, 1.0);
    assert_eq!(results[1].pressure, 0.5);
    check_results(&results, "tetrahedral")?;
    assert!(matches!(wg.state(), RunState::Finished(_)));
    Ok(())
}

#[test]
fn test_microphone_prefers_sound_from_pointing_direction() -> anyhow::Result<()> {
    let scene = cube_room(5., 0.)?;
    let mut wg = RectangularWaveguide::from_scene(&scene, &config(1.0))?;
    // Sound travels along +x from the source to the output
    let results = run_impulse(
        &mut wg,
        Point::new(1.5, 2.5, 2.5),
        Point::new(3.5, 2.5, 2.5),
        10,
    )?;
    let arrival = 2;
    let pressure = results[arrival].pressure;
    assert!(results[arrival].intensity.dx > 0.);

    let towards = Microphone::new(Vector::new(-1., 0., 0.), 0.5).process(&results);
    let away = Microphone::new(Vector::new(1., 0., 0.), 0.5).process(&results);
    let omni = NullAttenuator.process(&results);

    assert!((towards[arrival] - pressure).abs() < 1e-9);
    assert!(away[arrival].abs() < 1e-9);
    assert_eq!(omni[arrival], pressure);
    Ok(())
}

#[test]
fn test_lattice_dump_to_json() -> anyhow::Result<()> {
    let scene = cube_room(1., 0.2)?;
    let wg = RectangularWaveguide::from_scene(&scene, &config(0.25))?;
    let dump = lattice_dump(wg.program());
    assert_eq!(dump.len(), wg.program().num_nodes());
    assert_eq!(dump.iter().filter(|e| e.inside).count(), 64);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("lattice.json");
    write_lattice_json(wg.program(), &path)?;
    let text = std::fs::read_to_string(&path)?;
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&text)?;
    assert_eq!(parsed.len(), dump.len());
    assert_eq!(parsed[0]["inside"], serde_json::Value::Bool(dump[0].inside));
    Ok(())
}

#[test]
fn test_mesh_impulse_response_has_no_reflections() -> anyhow::Result<()> {
    let short = mesh_impulse_response(20)?;
    let long = mesh_impulse_response(30)?;
    assert_eq!(short.len(), 20);
    for (a, b) in short.iter().zip(&long) {
        assert!((a - b).abs() < 1e-12);
    }
    Ok(())
}
