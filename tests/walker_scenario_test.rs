//! Scenario tests: a scripted walker on rapier foot bodies driving the
//! engine through the fixed-step loop, the way the CLI runs it.
//!
//! Run with: cargo test --test walker_scenario_test -- --nocapture

use std::path::Path;

use softground::config::{EngineConfig, MaterialPreset};
use softground::deform::gait::FootPhase;
use softground::deform::observation::{JsonLinesSink, MemorySink, NullSink};
use softground::deform::FootSide;
use softground::rig::Scenario;

fn small_config(preset: &str, walk_seconds: f32) -> EngineConfig {
    EngineConfig::from_toml_str(&format!(
        r#"
        [terrain]
        resolution = 65
        size = [8.0, 8.0]

        [material]
        preset = "{preset}"

        [brush]
        half_width = 4
        offset_bump_grid = 1
        neighbour_search_area = 1
        margin = 1

        [simulation]
        walk_seconds = {walk_seconds:.1}
        start = [2.0, 4.0]
        "#
    ))
    .unwrap()
}

#[test]
fn test_shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/walk.toml");
    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.material.preset, MaterialPreset::DrySand);
    assert!(config.material_params().bumps);
}

#[test]
fn test_walk_leaves_a_trail_of_footprints() {
    let mut scenario = Scenario::from_config(&small_config("snow", 3.0)).unwrap();
    let mut sink = MemorySink::default();
    let report = scenario.run(180, &mut sink);

    assert!(report.deformed_cells > 0);
    assert!(report.min_height < 0.5);
    assert!(report.max_height <= 0.5 + 1e-6, "no bumps with snow");

    // Both feet landed and carved a footprint at some point
    for side in FootSide::BOTH {
        assert!(
            sink.frames.iter().any(|f| f.foot(side).edit.compressed > 0),
            "{side:?} never compressed the ground"
        );
    }

    // Footprints spread along the walking direction
    let field = scenario.engine.heightfield();
    let (width, height) = field.dimensions();
    let columns: Vec<usize> = (0..width)
        .filter(|&x| {
            let x = x as i32;
            (0..height as i32).any(|z| field.get(x, z) < field.get_constant(x, z))
        })
        .collect();
    let span = columns.last().unwrap() - columns.first().unwrap();
    assert!(span >= 16, "footprints span only {span} columns");
}

#[test]
fn test_standing_still_stops_deforming() {
    let mut scenario = Scenario::from_config(&small_config("default", 1.0)).unwrap();
    let mut sink = MemorySink::default();
    scenario.run(180, &mut sink);

    // Idle after 1 s; contact windows close 0.6 s later
    let tail = &sink.frames[150..];
    assert!(tail.iter().all(|f| !f.committed));
    assert!(tail
        .iter()
        .all(|f| f.feet.iter().all(|foot| foot.phase == FootPhase::Suppressed)));
}

#[test]
fn test_trace_sink_records_every_frame() {
    let mut scenario = Scenario::from_config(&small_config("mud", 2.0)).unwrap();
    let mut sink = JsonLinesSink::new(Vec::new());
    let report = scenario.run(30, &mut sink);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(text.lines().count(), 30);
    let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["frame"], 30);
    assert_eq!(report.frames, 30);
}

#[test]
fn test_scenarios_are_deterministic() {
    let config = small_config("dry_sand", 2.0);
    let mut a = Scenario::from_config(&config).unwrap();
    let mut b = Scenario::from_config(&config).unwrap();
    a.run(90, &mut NullSink);
    b.run(90, &mut NullSink);
    assert_eq!(
        a.engine.heightfield().world_heights(),
        b.engine.heightfield().world_heights()
    );
}
