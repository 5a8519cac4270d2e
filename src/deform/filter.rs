use serde::{Deserialize, Serialize};

use super::constants::kernel as kernel_taps;
use crate::terrain::Heightfield;

/// Separable binomial smoothing kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    #[default]
    Gauss3,
    Gauss5,
}

impl Kernel {
    /// Cells read on each side of the sample.
    pub fn radius(self) -> i32 {
        match self {
            Kernel::Gauss3 => 1,
            Kernel::Gauss5 => 2,
        }
    }

    fn taps(self) -> &'static [f32] {
        match self {
            Kernel::Gauss3 => &kernel_taps::GAUSS3_TAPS,
            Kernel::Gauss5 => &kernel_taps::GAUSS5_TAPS,
        }
    }
}

/// Smooth the window around `center` in place.
///
/// Only cells at least `margin` cells inside the window edge are rewritten;
/// each pass reads the previous pass's output. The smoothed window is also
/// left in the heightfield's filtered buffer. Near the terrain edge, reads
/// repeat the edge cell and writes are clipped to the terrain. Returns the
/// number of cells written to the live surface.
pub fn smooth_window(
    field: &mut Heightfield,
    center: (i32, i32),
    half: i32,
    margin: i32,
    kernel: Kernel,
    passes: u32,
) -> usize {
    let inner = half - margin;
    let r = kernel.radius();
    if passes == 0 || inner < 0 || margin < r {
        return 0;
    }

    let side = 2 * half + 1;
    let slot = |dx: i32, dz: i32| ((dz + half) * side + (dx + half)) as usize;
    let taps = kernel.taps();
    let norm: f32 = taps.iter().sum::<f32>().powi(2);

    let mut src: Vec<f32> = (-half..=half)
        .flat_map(|dz| (-half..=half).map(move |dx| (dx, dz)))
        .map(|(dx, dz)| {
            let (x, z) = field.clamp_cell(center.0 + dx, center.1 + dz);
            field.get(x, z)
        })
        .collect();
    let mut dst = src.clone();

    for _ in 0..passes {
        for dz in -inner..=inner {
            for dx in -inner..=inner {
                let mut acc = 0.0;
                for (kz, wz) in (-r..=r).zip(taps) {
                    for (kx, wx) in (-r..=r).zip(taps) {
                        acc += wz * wx * src[slot(dx + kx, dz + kz)];
                    }
                }
                dst[slot(dx, dz)] = acc / norm;
            }
        }
        std::mem::swap(&mut src, &mut dst);
    }

    let mut written = 0;
    for dz in -half..=half {
        for dx in -half..=half {
            let (x, z) = (center.0 + dx, center.1 + dz);
            if !field.contains(x, z) {
                continue;
            }
            let h = src[slot(dx, dz)];
            field.set_filtered(x, z, h);
            if dx.abs() <= inner && dz.abs() <= inner {
                field.set(x, z, h);
                written += 1;
            }
        }
    }
    written
}

/// Per-foot smoothing latch. Smoothing runs while the foot is the only one
/// on the ground until `required` passes are done, then stays off until the
/// foot leaves single support.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FilterLatch {
    pub passes: u32,
    pub filtered: bool,
}

impl FilterLatch {
    /// Passes to run this frame.
    pub fn advance(&mut self, eligible: bool, required: u32, per_frame: u32) -> u32 {
        if !eligible || required == 0 {
            *self = Self::default();
            return 0;
        }
        if self.filtered {
            return 0;
        }
        let run = per_frame.max(1).min(required - self.passes);
        self.passes += run;
        if self.passes >= required {
            self.filtered = true;
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spike_field() -> Heightfield {
        let mut field = Heightfield::new(21, 21, (20.0, 20.0), 1.0, vec![0.0; 21 * 21]).unwrap();
        field.set(10, 10, 16.0);
        field
    }

    #[test]
    fn test_gauss3_single_pass_weights() {
        let mut field = spike_field();
        let written = smooth_window(&mut field, (10, 10), 4, 1, Kernel::Gauss3, 1);
        assert_eq!(written, 49);
        assert_relative_eq!(field.get(10, 10), 4.0);
        assert_relative_eq!(field.get(11, 10), 2.0);
        assert_relative_eq!(field.get(11, 11), 1.0);
        assert_relative_eq!(field.get(12, 10), 0.0);
        assert_relative_eq!(field.get_filtered(11, 11), 1.0);
    }

    #[test]
    fn test_smoothing_preserves_interior_mass() {
        let mut field = spike_field();
        smooth_window(&mut field, (10, 10), 6, 2, Kernel::Gauss5, 2);
        let total: f32 = (4..=16)
            .flat_map(|z| (4..=16).map(move |x| (x, z)))
            .map(|(x, z)| field.get(x, z))
            .sum();
        assert_relative_eq!(total, 16.0, epsilon = 1e-4);
        assert!(field.get(10, 10) < 16.0);
    }

    #[test]
    fn test_margin_cells_untouched() {
        let mut field = Heightfield::new(21, 21, (20.0, 20.0), 1.0, vec![0.0; 21 * 21]).unwrap();
        // Ridge just outside the inset
        for z in 0..21 {
            field.set(13, z, 1.0);
        }
        smooth_window(&mut field, (10, 10), 4, 2, Kernel::Gauss3, 3);
        assert_eq!(field.get(13, 10), 1.0);
        assert_eq!(field.get(14, 10), 0.0);
        assert!(field.get(12, 10) > 0.0);
        assert_eq!(field.get(12, 15), 0.0);
    }

    #[test]
    fn test_flat_window_is_fixed_point() {
        let mut field = Heightfield::new(21, 21, (20.0, 20.0), 1.0, vec![0.3; 21 * 21]).unwrap();
        smooth_window(&mut field, (10, 10), 5, 3, Kernel::Gauss5, 4);
        assert!(field.world_heights().iter().all(|&h| (h - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_rejects_margin_below_radius() {
        let mut field = spike_field();
        assert_eq!(smooth_window(&mut field, (10, 10), 4, 1, Kernel::Gauss5, 1), 0);
        assert_eq!(field.get(10, 10), 16.0);
    }

    #[test]
    fn test_window_at_corner_stays_on_terrain() {
        let mut field = Heightfield::new(21, 21, (20.0, 20.0), 1.0, vec![0.0; 21 * 21]).unwrap();
        field.set(0, 0, 9.0);
        let written = smooth_window(&mut field, (0, 0), 4, 1, Kernel::Gauss3, 2);
        assert_eq!(written, 16);
        assert!(field.get(0, 0) < 9.0);
        for i in 0..21 {
            assert_eq!(field.get(20, i), 0.0);
            assert_eq!(field.get(i, 20), 0.0);
        }
    }

    #[test]
    fn test_latch_runs_required_passes_then_holds() {
        let mut latch = FilterLatch::default();
        assert_eq!(latch.advance(true, 3, 1), 1);
        assert_eq!(latch.advance(true, 3, 1), 1);
        assert!(!latch.filtered);
        assert_eq!(latch.advance(true, 3, 1), 1);
        assert!(latch.filtered);
        assert_eq!(latch.advance(true, 3, 1), 0);
        assert_eq!(latch.passes, 3);

        assert_eq!(latch.advance(false, 3, 1), 0);
        assert!(!latch.filtered);
        assert_eq!(latch.passes, 0);
    }

    #[test]
    fn test_latch_caps_passes_per_frame() {
        let mut latch = FilterLatch::default();
        assert_eq!(latch.advance(true, 5, 3), 3);
        assert_eq!(latch.advance(true, 5, 3), 2);
        assert!(latch.filtered);
        assert_eq!(latch.advance(true, 0, 3), 0);
        assert_eq!(latch.passes, 0);
    }
}
