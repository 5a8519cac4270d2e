use nalgebra::Vector3;
use tracing::{debug, warn};

use super::FootprintEngine;
use crate::deform::brush::Brush;
use crate::deform::contact::{classify_window, ContactProbe, ContactWindow};
use crate::deform::filter::{smooth_window, FilterLatch};
use crate::deform::observation::{FootObservation, FrameObservation};
use crate::deform::solver::{apply_window, bump_weights};
use crate::deform::{BodyProvider, FootSample, FootSide};
use crate::terrain::TerrainProvider;

/// Executes the phases of one rendered frame.
/// Ordered: sample body -> advance timers -> lift-off reset -> active brush
/// -> restart timers -> single commit -> report.
pub(super) fn run_frame_phases<B, P, T>(
    engine: &mut FootprintEngine,
    dt: f32,
    body: &B,
    probe: &P,
    terrain: &mut T,
) -> FrameObservation
where
    B: BodyProvider + ?Sized,
    P: ContactProbe + Sync + ?Sized,
    T: TerrainProvider + ?Sized,
{
    engine.frame += 1;
    engine.time += dt;

    // Sample the body once for the whole frame.
    let samples = FootSide::BOTH.map(|side| body.foot(side));
    let grounded = [samples[0].grounded, samples[1].grounded];
    let moving = body.is_moving();

    // Advance contact timers; a closed window still allows bookkeeping.
    let limits = engine.gait_limits();
    let open = engine.gait.begin_frame(dt, grounded, &limits);

    // Locate feet on the grid. A foot off the terrain has no contact this frame.
    let centers = samples.map(|sample| {
        let cell = engine.heightfield.world_to_cell(sample.position);
        if engine.heightfield.contains(cell.0, cell.1) {
            Some(cell)
        } else {
            debug!(x = sample.position.x, z = sample.position.z, "foot outside terrain");
            None
        }
    });

    let mut observation = FrameObservation {
        frame: engine.frame,
        time: engine.time,
        dt,
        brush: None,
        committed: false,
        feet: FootSide::BOTH.map(FootObservation::new),
    };

    // Lift-off ends the grounded phase whichever brush is active.
    for side in FootSide::BOTH {
        let foot = &mut engine.feet[side.index()];
        if grounded[side.index()] {
            continue;
        }
        if foot.deformation.target_displacement > 0.0 {
            debug!(?side, "lift-off, resetting footprint state");
        }
        foot.deformation.reset();
        foot.latch = FilterLatch::default();
    }

    // Run the active brush.
    let active = engine.brushes.active().map(|(_, brush)| brush.clone());
    let dirty = match active {
        Some(Brush::Footprint) => {
            observation.brush = Some("footprint");
            footprint_phases(engine, dt, &samples, open, centers, probe, &mut observation)
        }
        Some(Brush::Reset { height, half_width }) => {
            observation.brush = Some("reset");
            let mut dirty = false;
            for center in centers.into_iter().flatten() {
                engine.heightfield.flatten_window(center, half_width, height);
                dirty = true;
            }
            dirty
        }
        None => false,
    };

    // Restart timers for lifted feet and motion toggles.
    engine.gait.end_frame(grounded, moving, &limits);

    // Commit the frame's edits in a single upload.
    if dirty {
        match engine.heightfield.save(terrain) {
            Ok(()) => observation.committed = true,
            Err(e) => warn!(error = %e, frame = engine.frame, "terrain commit failed"),
        }
    }

    for side in FootSide::BOTH {
        let i = side.index();
        let foot = &engine.feet[i];
        let timer = engine.gait.foot(side);
        let obs = &mut observation.feet[i];
        obs.phase = timer.phase;
        obs.grounded = grounded[i];
        obs.center = centers[i].map(|(x, z)| [x, z]);
        obs.time_passed = timer.time_passed;
        obs.weight_share = foot.forces.weight_share;
        obs.velocity = foot.forces.velocity.into();
        obs.weight_force_y = foot.forces.weight.y;
        obs.momentum_force_y = foot.forces.momentum.y;
        obs.ground_reaction_y = foot.forces.ground_reaction.y;
        obs.reaction_y = foot.forces.reaction_on_foot.y;
        obs.reaction_min = foot.extremes.min.into();
        obs.reaction_max = foot.extremes.max.into();
        obs.deformation = foot.deformation;
        obs.filter = foot.latch;
    }
    observation
}

/// Footprint brush: classify, update targets, step the terrain, smooth.
/// Returns whether the heightfield changed.
fn footprint_phases<P>(
    engine: &mut FootprintEngine,
    dt: f32,
    samples: &[FootSample; 2],
    open: [bool; 2],
    centers: [Option<(i32, i32)>; 2],
    probe: &P,
    observation: &mut FrameObservation,
) -> bool
where
    P: ContactProbe + Sync + ?Sized,
{
    let grounded = [samples[0].grounded, samples[1].grounded];
    let material = engine.material;
    let params = engine.classifier;
    let brush = engine.brush_config.clone();
    let cell_area = engine.heightfield.cell_area();

    // Classify both feet concurrently; classification only reads.
    let (left, right) = {
        let field = &engine.heightfield;
        let classify = |side: FootSide| -> Option<ContactWindow> {
            let i = side.index();
            match (grounded[i], centers[i]) {
                (true, Some(center)) => Some(classify_window(
                    field,
                    probe,
                    side,
                    center,
                    &params,
                    material.bumps,
                )),
                _ => None,
            }
        };
        rayon::join(|| classify(FootSide::Left), || classify(FootSide::Right))
    };

    // Update targets and step the terrain, left then right.
    let mut dirty = false;
    for (side, window) in [(FootSide::Left, left), (FootSide::Right, right)] {
        let i = side.index();
        let foot = &mut engine.feet[i];

        let Some(window) = window else {
            continue;
        };

        foot.deformation.update_targets(&window, foot.forces.load(), cell_area, &material);
        foot.deformation.advance_frame(dt, material.contact_time);
        observation.feet[i].hits = window.hits();

        if !(open[i] && brush.apply_footprints) {
            continue;
        }
        let force_point = samples[i].position + horizontal_direction(foot.forces.reaction_on_foot);
        let weights = bump_weights(
            &engine.heightfield,
            &window,
            brush.bump_distribution,
            force_point,
            params.offset_bump_grid,
        );
        let edit = apply_window(
            &mut engine.heightfield,
            &window,
            &foot.deformation,
            &weights,
            material.bumps,
            probe,
            side,
            &params,
        );
        observation.feet[i].edit = edit;
        dirty |= edit.changed();
    }

    // Smooth under a foot in single support until its latch closes.
    for side in FootSide::BOTH {
        let i = side.index();
        let other = side.opposite().index();
        let eligible = grounded[i] && !grounded[other] && open[i] && brush.apply_footprints;
        let Some(center) = centers[i] else {
            engine.feet[i].latch.advance(false, material.filter_iterations, brush.passes_per_frame);
            continue;
        };
        let passes = engine.feet[i]
            .latch
            .advance(eligible, material.filter_iterations, brush.passes_per_frame);
        if passes > 0 {
            smooth_window(
                &mut engine.heightfield,
                center,
                brush.half_width,
                brush.margin,
                brush.kernel,
                passes,
            );
            observation.feet[i].smoothing_passes = passes;
            dirty = true;
        }
    }

    dirty
}

/// Horizontal part of a force's direction, zero for a vanishing force.
fn horizontal_direction(force: Vector3<f32>) -> Vector3<f32> {
    force
        .try_normalize(f32::EPSILON)
        .map(|n| Vector3::new(n.x, 0.0, n.z))
        .unwrap_or_else(Vector3::zeros)
}
