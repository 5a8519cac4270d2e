//! Deformation constants shared across the solver stages.

/// Numeric guards
pub mod numeric {
    /// Time steps at or below this are treated as zero
    pub const EPSILON: f32 = 1e-6;
}

/// Smoothing kernel taps
pub mod kernel {
    /// Binomial taps of the 3x3 kernel (outer product sums to 16)
    pub const GAUSS3_TAPS: [f32; 3] = [1.0, 2.0, 1.0];

    /// Binomial taps of the 5x5 kernel (outer product sums to 256)
    pub const GAUSS5_TAPS: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
}
