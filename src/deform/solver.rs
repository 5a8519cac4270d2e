//! Compaction solver: turns a foot's load into a per-cell target
//! displacement and bump height, then steps the live terrain toward them
//! a little every frame.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::contact::{CellTag, ClassifierParams, ContactArea, ContactProbe, ContactWindow};
use super::FootSide;
use crate::config::MaterialParams;
use crate::terrain::Heightfield;

/// How displaced volume is spread over contour cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpDistribution {
    /// Every contour cell rises by the same amount
    #[default]
    Uniform,
    /// Cells nearer the force application point rise more
    Modulated,
}

/// Volume bookkeeping for the current target displacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VolumeBudget {
    pub original: f32,
    pub deformed: f32,
    /// Volume lost to compression according to the Poisson ratio (non-positive)
    pub poisson_loss: f32,
    /// Volume pushed out of the footprint and redistributed as bumps
    pub net_displaced: f32,
    pub per_contour_cell: f32,
}

/// Target vertical compaction for a given pressure: `p * thickness / E`.
pub fn compaction_displacement(pressure: f32, material: &MaterialParams) -> f32 {
    pressure * material.thickness / material.young_modulus
}

/// Volume bookkeeping for a footprint of `area` compressed by `displacement`.
pub fn displaced_volume(area: f32, displacement: f32, material: &MaterialParams) -> VolumeBudget {
    let original = area * material.thickness;
    let deformed = area * (material.thickness - displacement);
    let poisson_loss =
        (1.0 - 2.0 * material.poisson_ratio) * (-displacement / material.thickness) * original;
    VolumeBudget {
        original,
        deformed,
        poisson_loss,
        net_displaced: -(deformed - original) + poisson_loss,
        per_contour_cell: 0.0,
    }
}

/// Deformation state of one foot over its grounded phase.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FootDeformation {
    pub area: ContactArea,
    pub pressure: f32,
    /// Running maximum of the compaction target this phase
    pub target_displacement: f32,
    pub bump_height: f32,
    pub contour_cells: usize,
    pub volume: VolumeBudget,
    pub frame_displacement: f32,
    pub frame_bump: f32,
}

impl FootDeformation {
    /// Forget everything accumulated this phase (the foot lifted off).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold this frame's classification and load into the phase targets.
    ///
    /// `load` is the downward force on the ground; the target only ever
    /// grows during a phase.
    pub fn update_targets(
        &mut self,
        window: &ContactWindow,
        load: f32,
        cell_area: f32,
        material: &MaterialParams,
    ) {
        self.area.update(window.hits(), cell_area);

        let pressure = if window.hits() == 0 || self.area.running_max <= 0.0 {
            0.0
        } else {
            load / self.area.running_max
        };
        if !pressure.is_finite() {
            warn!(load, area = self.area.running_max, "non-finite pressure, holding targets");
            self.pressure = 0.0;
            return;
        }
        self.pressure = pressure.max(0.0);

        let candidate = compaction_displacement(self.pressure, material);
        if candidate >= self.target_displacement {
            self.target_displacement = candidate;
            self.contour_cells = window.contour_cells();

            let mut volume = displaced_volume(self.area.running_max, candidate, material);
            if self.contour_cells > 0 {
                volume.per_contour_cell = volume.net_displaced / self.contour_cells as f32;
                self.bump_height = volume.per_contour_cell / cell_area;
            } else {
                self.bump_height = 0.0;
            }
            self.volume = volume;
        }
    }

    /// Per-frame increments so the targets are reached after `contact_time`.
    pub fn advance_frame(&mut self, dt: f32, contact_time: f32) {
        self.frame_displacement = dt * self.target_displacement / contact_time;
        self.frame_bump = dt * self.bump_height / contact_time;
    }
}

/// Per-cell bump weights over a window, aligned with `ContactWindow::cells`.
/// Non-contour cells weigh zero and the weights sum to one.
pub fn bump_weights(
    field: &Heightfield,
    window: &ContactWindow,
    distribution: BumpDistribution,
    force_point: Vector3<f32>,
    offset_bump_grid: i32,
) -> Vec<f32> {
    let contour = window.contour_cells();
    if contour == 0 {
        return window.cells().map(|_| 0.0).collect();
    }
    let uniform: Vec<f32> = window
        .cells()
        .map(|(_, _, tag)| if tag == CellTag::Contour { 1.0 / contour as f32 } else { 0.0 })
        .collect();
    if distribution == BumpDistribution::Uniform {
        return uniform;
    }

    let (cx, cz) = window.center();
    let world_xz = |dx: i32, dz: i32| {
        let w = field.grid_to_world(Vector3::new((cx + dx) as f32, 0.0, (cz + dz) as f32));
        (w.x - force_point.x).powi(2) + (w.z - force_point.z).powi(2)
    };
    let inner = (window.half_width() - offset_bump_grid).max(0);
    let max_sq = [(-inner, -inner), (inner, -inner), (-inner, inner), (inner, inner)]
        .into_iter()
        .map(|(dx, dz)| world_xz(dx, dz))
        .fold(0.0f32, f32::max);
    if max_sq <= 0.0 {
        return uniform;
    }

    let raw: Vec<f32> = window
        .cells()
        .map(|(dx, dz, tag)| {
            if tag == CellTag::Contour {
                (1.0 - world_xz(dx, dz) / max_sq).max(0.0)
            } else {
                0.0
            }
        })
        .collect();
    let total: f32 = raw.iter().sum();
    if total <= 0.0 {
        return uniform;
    }
    raw.into_iter().map(|w| w / total).collect()
}

/// Cells changed by one application step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowEdit {
    pub compressed: usize,
    pub raised: usize,
}

impl WindowEdit {
    pub fn changed(&self) -> bool {
        self.compressed + self.raised > 0
    }
}

/// Step every cell of the window toward its target and write it back.
///
/// Direct-contact cells still under the foot sink by one frame increment
/// without passing `baseline - target`. Contour cells no longer under the
/// foot rise by one frame increment without passing their weighted bump
/// ceiling. Everything else is left as is.
#[allow(clippy::too_many_arguments)]
pub fn apply_window<P: ContactProbe + ?Sized>(
    field: &mut Heightfield,
    window: &ContactWindow,
    state: &FootDeformation,
    weights: &[f32],
    bumps: bool,
    probe: &P,
    side: FootSide,
    params: &ClassifierParams,
) -> WindowEdit {
    let (cx, cz) = window.center();
    let contour = window.contour_cells().max(1) as f32;
    let mut edit = WindowEdit::default();

    let updates: Vec<(i32, i32, f32)> = window
        .cells()
        .zip(weights)
        .filter_map(|((dx, dz, tag), &weight)| {
            let (x, z) = (cx + dx, cz + dz);
            if tag == CellTag::Unaffected || !field.contains(x, z) {
                return None;
            }
            let current = field.get(x, z);
            let baseline = field.get_constant(x, z);
            let origin = field.grid_to_world(Vector3::new(x as f32, current, z as f32));
            let touching = probe.probe_up(side, origin, params.ray_distance);

            match tag {
                CellTag::DirectContact if touching => {
                    let floor = baseline - state.target_displacement;
                    let next = (current - state.frame_displacement).max(floor);
                    if current >= floor && next < current {
                        edit.compressed += 1;
                        Some((x, z, next))
                    } else {
                        None
                    }
                }
                CellTag::Contour if bumps && !touching => {
                    let ceiling = baseline + state.bump_height * weight * contour;
                    let next = (current + state.frame_bump).min(ceiling);
                    if current <= ceiling && next > current {
                        edit.raised += 1;
                        Some((x, z, next))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        })
        .collect();

    for (x, z, h) in updates {
        field.set(x, z, h);
    }
    edit
}
