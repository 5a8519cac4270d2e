use nalgebra::Vector3;
use serde::Serialize;
use tracing::warn;

use super::FootSide;
use crate::config::BrushConfig;
use crate::terrain::Heightfield;

/// Classification of one cell in a contact window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellTag {
    #[default]
    Unaffected,
    /// Not touched, but within reach of a touched cell; receives bumps
    Contour,
    /// Directly under the foot; gets compressed
    DirectContact,
}

/// Upward ray test against one foot's colliders.
pub trait ContactProbe {
    /// True when a ray cast straight up from `origin` hits a collider of
    /// `side` within `max_distance`.
    fn probe_up(&self, side: FootSide, origin: Vector3<f32>, max_distance: f32) -> bool;
}

impl<F> ContactProbe for F
where
    F: Fn(FootSide, Vector3<f32>, f32) -> bool,
{
    fn probe_up(&self, side: FootSide, origin: Vector3<f32>, max_distance: f32) -> bool {
        self(side, origin, max_distance)
    }
}

/// Window geometry and probe settings for classification.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierParams {
    pub half_width: i32,
    pub ray_distance: f32,
    pub ray_offset: f32,
    pub offset_bump_grid: i32,
    pub neighbour_search_area: i32,
}

impl From<&BrushConfig> for ClassifierParams {
    fn from(config: &BrushConfig) -> Self {
        Self {
            half_width: config.half_width,
            ray_distance: config.ray_distance,
            ray_offset: config.ray_offset,
            offset_bump_grid: config.offset_bump_grid,
            neighbour_search_area: config.neighbour_search_area,
        }
    }
}

/// Square `(2h+1)^2` window of cell tags centred on a foot.
#[derive(Debug, Clone)]
pub struct ContactWindow {
    center: (i32, i32),
    half: i32,
    tags: Vec<CellTag>,
    hits: usize,
    contour_cells: usize,
}

impl ContactWindow {
    pub fn empty(center: (i32, i32), half: i32) -> Self {
        let side = (2 * half + 1) as usize;
        Self {
            center,
            half,
            tags: vec![CellTag::Unaffected; side * side],
            hits: 0,
            contour_cells: 0,
        }
    }

    #[inline]
    fn slot(&self, dx: i32, dz: i32) -> usize {
        let side = 2 * self.half + 1;
        ((dz + self.half) * side + (dx + self.half)) as usize
    }

    /// Tag at an offset from the centre. Offsets outside the window read as unaffected.
    pub fn tag(&self, dx: i32, dz: i32) -> CellTag {
        if dx.abs() > self.half || dz.abs() > self.half {
            return CellTag::Unaffected;
        }
        self.tags[self.slot(dx, dz)]
    }

    fn set_tag(&mut self, dx: i32, dz: i32, tag: CellTag) {
        let slot = self.slot(dx, dz);
        self.tags[slot] = tag;
    }

    pub fn center(&self) -> (i32, i32) {
        self.center
    }

    pub fn half_width(&self) -> i32 {
        self.half
    }

    /// Cells tagged direct contact.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Cells tagged contour.
    pub fn contour_cells(&self) -> usize {
        self.contour_cells
    }

    /// Every cell as `(offset_x, offset_z, tag)`.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, CellTag)> + '_ {
        let half = self.half;
        (-half..=half).flat_map(move |dz| (-half..=half).map(move |dx| (dx, dz, self.tag(dx, dz))))
    }
}

/// Tag every cell of the window around `center` by probing upward from
/// just below the live surface. When `detect_contour` is set, untouched
/// cells in the inset sub-window that neighbour a touched cell become
/// contour cells. Cells past the terrain edge stay unaffected.
pub fn classify_window<P: ContactProbe + ?Sized>(
    field: &Heightfield,
    probe: &P,
    side: FootSide,
    center: (i32, i32),
    params: &ClassifierParams,
    detect_contour: bool,
) -> ContactWindow {
    let half = params.half_width;
    let mut window = ContactWindow::empty(center, half);

    for dz in -half..=half {
        for dx in -half..=half {
            let (x, z) = (center.0 + dx, center.1 + dz);
            if !field.contains(x, z) {
                continue;
            }
            let grid = Vector3::new(x as f32, field.get(x, z) - params.ray_offset, z as f32);
            let origin = field.grid_to_world(grid);
            if probe.probe_up(side, origin, params.ray_distance) {
                window.set_tag(dx, dz, CellTag::DirectContact);
                window.hits += 1;
            }
        }
    }

    if detect_contour && window.hits > 0 {
        let inner = (half - params.offset_bump_grid).max(0);
        let reach = params.neighbour_search_area;
        for dz in -inner..=inner {
            for dx in -inner..=inner {
                if window.tag(dx, dz) != CellTag::Unaffected
                    || !field.contains(center.0 + dx, center.1 + dz)
                {
                    continue;
                }
                let z_range = (dz - reach).max(-half)..=(dz + reach).min(half);
                let touches = z_range.into_iter().any(|nz| {
                    ((dx - reach).max(-half)..=(dx + reach).min(half))
                        .any(|nx| window.tag(nx, nz) == CellTag::DirectContact)
                });
                if touches {
                    window.set_tag(dx, dz, CellTag::Contour);
                    window.contour_cells += 1;
                }
            }
        }
    }

    window
}

/// Contact area of the current frame and its running maximum over the
/// current grounded phase.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContactArea {
    pub current: f32,
    pub running_max: f32,
}

impl ContactArea {
    /// Fold this frame's hit count into the running maximum. An invalid
    /// area is logged and leaves the maximum untouched.
    pub fn update(&mut self, hits: usize, cell_area: f32) {
        let area = hits as f32 * cell_area;
        if !area.is_finite() || area < 0.0 {
            warn!(hits, cell_area, "invalid contact area, ignoring frame");
            self.current = 0.0;
            return;
        }
        self.current = area;
        if area >= self.running_max {
            self.running_max = area;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
