use serde::Serialize;
use tracing::{info, warn};

/// Handle to a registered brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BrushId(usize);

/// What the engine does to the terrain around each foot every frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Brush {
    /// Physically based footprints
    Footprint,
    /// Flatten a square window around each foot to a fixed world height
    Reset { height: f32, half_width: i32 },
}

impl Brush {
    pub fn name(&self) -> &'static str {
        match self {
            Brush::Footprint => "footprint",
            Brush::Reset { .. } => "reset",
        }
    }
}

/// Registered brushes and the single slot one of them may occupy.
#[derive(Debug, Default)]
pub struct BrushSlot {
    brushes: Vec<Brush>,
    active: Option<BrushId>,
}

impl BrushSlot {
    pub fn register(&mut self, brush: Brush) -> BrushId {
        self.brushes.push(brush);
        BrushId(self.brushes.len() - 1)
    }

    pub fn get(&self, id: BrushId) -> Option<&Brush> {
        self.brushes.get(id.0)
    }

    /// Give the slot to `id`, evicting the current owner. Returns the evicted brush.
    pub fn activate(&mut self, id: BrushId) -> Option<BrushId> {
        let Some(brush) = self.brushes.get(id.0) else {
            warn!(?id, "activate on unknown brush ignored");
            return None;
        };
        let previous = self.active.replace(id).filter(|&prev| prev != id);
        info!(brush = brush.name(), ?previous, "brush activated");
        previous
    }

    /// Empty the slot if `id` owns it.
    pub fn deactivate(&mut self, id: BrushId) -> bool {
        if self.active == Some(id) {
            self.active = None;
            info!(?id, "brush deactivated");
            true
        } else {
            false
        }
    }

    /// Flip `id` in or out of the slot. Returns whether it is now active.
    pub fn toggle(&mut self, id: BrushId) -> bool {
        if self.active == Some(id) {
            self.deactivate(id);
            false
        } else {
            self.activate(id);
            self.active == Some(id)
        }
    }

    pub fn active(&self) -> Option<(BrushId, &Brush)> {
        self.active
            .and_then(|id| self.brushes.get(id.0).map(|brush| (id, brush)))
    }
}
