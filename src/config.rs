//! Engine configuration parsing from TOML files

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::deform::filter::Kernel;
use crate::deform::solver::BumpDistribution;

/// Terrain section: the heightfield the engine starts from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Samples per side (the terrain is square in samples)
    pub resolution: usize,
    /// World extent along X and Z in metres
    pub size: [f32; 2],
    /// World height of a normalized sample value of 1.0
    pub height_scale: f32,
    /// Initial surface height in world units
    pub base_height: f32,
    /// Amplitude of the seeded roughness added to the base height
    pub roughness: f32,
    pub seed: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            resolution: 129,
            size: [16.0, 16.0],
            height_scale: 1.0,
            base_height: 0.5,
            roughness: 0.0,
            seed: 7,
        }
    }
}

/// Named material presets shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialPreset {
    #[default]
    Default,
    Snow,
    DrySand,
    Mud,
}

impl MaterialPreset {
    pub const ALL: [MaterialPreset; 4] = [
        MaterialPreset::Default,
        MaterialPreset::Snow,
        MaterialPreset::DrySand,
        MaterialPreset::Mud,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MaterialPreset::Default => "default",
            MaterialPreset::Snow => "snow",
            MaterialPreset::DrySand => "dry_sand",
            MaterialPreset::Mud => "mud",
        }
    }

    /// Resolved parameters for this preset.
    pub fn params(self) -> MaterialParams {
        let (young_modulus, contact_time, poisson_ratio, filter_iterations) = match self {
            MaterialPreset::Default => (750_000.0, 0.1, 0.0, 0),
            MaterialPreset::Snow => (200_000.0, 0.2, 0.1, 0),
            MaterialPreset::DrySand => (600_000.0, 0.3, 0.2, 5),
            MaterialPreset::Mud => (350_000.0, 0.8, 0.4, 2),
        };
        MaterialParams {
            young_modulus,
            contact_time,
            poisson_ratio,
            bumps: false,
            filter_iterations,
            thickness: 1.0,
        }
    }
}

impl std::str::FromStr for MaterialPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MaterialPreset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

/// Resolved ground material consumed by the deformation core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaterialParams {
    /// Young's modulus in pascals
    pub young_modulus: f32,
    /// Seconds over which a footprint is carved in
    pub contact_time: f32,
    pub poisson_ratio: f32,
    /// Whether displaced volume is pushed up around the footprint
    pub bumps: bool,
    /// Smoothing passes per single-support phase (0 disables smoothing)
    pub filter_iterations: u32,
    /// Undeformed depth of the compressible layer in metres
    pub thickness: f32,
}

/// Material section: a preset plus optional per-field overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub preset: MaterialPreset,
    pub young_modulus: Option<f32>,
    pub contact_time: Option<f32>,
    pub poisson_ratio: Option<f32>,
    pub bumps: Option<bool>,
    pub filter_iterations: Option<u32>,
    pub thickness: Option<f32>,
}

impl MaterialConfig {
    pub fn resolve(&self) -> MaterialParams {
        let base = self.preset.params();
        MaterialParams {
            young_modulus: self.young_modulus.unwrap_or(base.young_modulus),
            contact_time: self.contact_time.unwrap_or(base.contact_time),
            poisson_ratio: self.poisson_ratio.unwrap_or(base.poisson_ratio),
            bumps: self.bumps.unwrap_or(base.bumps),
            filter_iterations: self.filter_iterations.unwrap_or(base.filter_iterations),
            thickness: self.thickness.unwrap_or(base.thickness),
        }
    }
}

/// Brush section: window geometry, probing and smoothing knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    /// Half-width of the square window edited around each foot, in cells
    pub half_width: i32,
    /// Length of the upward contact probe
    pub ray_distance: f32,
    /// How far below the surface each probe starts
    pub ray_offset: f32,
    /// Inset of the contour scan from the window edge, in cells
    pub offset_bump_grid: i32,
    /// Chebyshev radius searched for direct-contact neighbours
    pub neighbour_search_area: i32,
    /// Cells at the window edge left untouched by smoothing
    pub margin: i32,
    pub kernel: Kernel,
    /// Smoothing passes run on each eligible frame
    pub passes_per_frame: u32,
    pub bump_distribution: BumpDistribution,
    /// When false the brush computes everything but never writes the terrain
    pub apply_footprints: bool,
    /// Extra seconds after contact time during which writes are still allowed
    pub deformation_offset: f32,
    /// Idle frames during which an ungrounded reading still restarts the timer
    pub debounce_frames: u32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            half_width: 10,
            ray_distance: 0.1,
            ray_offset: 0.04,
            offset_bump_grid: 2,
            neighbour_search_area: 2,
            margin: 3,
            kernel: Kernel::Gauss3,
            passes_per_frame: 1,
            bump_distribution: BumpDistribution::Uniform,
            apply_footprints: true,
            deformation_offset: 0.5,
            debounce_frames: 3,
        }
    }
}

/// Character section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Total body mass in kilograms
    pub mass: f32,
    /// Vertical gravity component (negative is down)
    pub gravity: f32,
    /// Use the rigid body's own velocity instead of differencing positions
    pub prefer_native_velocity: bool,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            mass: 75.0,
            gravity: -9.81,
            prefer_native_velocity: true,
        }
    }
}

/// Simulation section, used by the scripted walker and the CLI driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Physics tick length in seconds
    pub fixed_dt: f32,
    /// Rendered frame length in seconds
    pub frame_dt: f32,
    pub frames: u32,
    pub walk_seconds: f32,
    pub idle_seconds: f32,
    /// Forward speed while walking, metres per second
    pub walk_speed: f32,
    /// Duration of a full gait cycle in seconds
    pub step_period: f32,
    /// Peak swing height of the foot sole
    pub step_height: f32,
    /// Fraction of the gait cycle each foot spends on the ground
    pub duty_factor: f32,
    /// Lateral distance between the two feet
    pub stance_width: f32,
    /// Foot box size (length along X, height, width along Z)
    pub foot_size: [f32; 3],
    /// Starting position of the pelvis projected on the ground (X, Z)
    pub start: [f32; 2],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 0.02,
            frame_dt: 1.0 / 60.0,
            frames: 600,
            walk_seconds: 6.0,
            idle_seconds: 2.0,
            walk_speed: 1.0,
            step_period: 1.0,
            step_height: 0.12,
            duty_factor: 0.6,
            stance_width: 0.25,
            foot_size: [0.26, 0.08, 0.1],
            start: [3.0, 8.0],
        }
    }
}

/// Full engine configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub terrain: TerrainConfig,
    pub material: MaterialConfig,
    pub brush: BrushConfig,
    pub character: CharacterConfig,
    pub simulation: SimulationConfig,
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn material_params(&self) -> MaterialParams {
        self.material.resolve()
    }

    /// Reject configurations the deformation core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.terrain;
        if t.resolution < 3 {
            return Err(invalid(format!(
                "terrain.resolution must be at least 3, got {}",
                t.resolution
            )));
        }
        if !(positive(t.size[0]) && positive(t.size[1])) {
            return Err(invalid(format!("terrain.size must be positive, got {:?}", t.size)));
        }
        if !positive(t.height_scale) {
            return Err(invalid(format!(
                "terrain.height_scale must be positive, got {}",
                t.height_scale
            )));
        }

        let m = self.material.resolve();
        if !positive(m.contact_time) {
            return Err(invalid(format!(
                "material.contact_time must be positive, got {}",
                m.contact_time
            )));
        }
        if !positive(m.young_modulus) {
            return Err(invalid(format!(
                "material.young_modulus must be positive, got {}",
                m.young_modulus
            )));
        }
        if !positive(m.thickness) {
            return Err(invalid(format!(
                "material.thickness must be positive, got {}",
                m.thickness
            )));
        }
        if !(0.0..=0.5).contains(&m.poisson_ratio) {
            return Err(invalid(format!(
                "material.poisson_ratio must lie in [0, 0.5], got {}",
                m.poisson_ratio
            )));
        }

        let b = &self.brush;
        let max_half = ((t.resolution - 1) / 2) as i32;
        if b.half_width < 1 || b.half_width > max_half {
            return Err(invalid(format!(
                "brush.half_width must lie in [1, {}] for a {} sample terrain, got {}",
                max_half, t.resolution, b.half_width
            )));
        }
        if !positive(b.ray_distance) || !non_negative(b.ray_offset) {
            return Err(invalid(
                "brush.ray_distance must be positive and brush.ray_offset non-negative",
            ));
        }
        if b.offset_bump_grid < 0 || b.offset_bump_grid > b.half_width {
            return Err(invalid(format!(
                "brush.offset_bump_grid must lie in [0, half_width], got {}",
                b.offset_bump_grid
            )));
        }
        if b.neighbour_search_area < 1 || b.neighbour_search_area > b.offset_bump_grid {
            return Err(invalid(format!(
                "brush.neighbour_search_area must lie in [1, offset_bump_grid], got {}",
                b.neighbour_search_area
            )));
        }
        let radius = b.kernel.radius();
        if b.margin < radius || b.margin > b.half_width {
            return Err(invalid(format!(
                "brush.margin must lie in [{}, half_width] for kernel {:?}, got {}",
                radius, b.kernel, b.margin
            )));
        }
        if !non_negative(b.deformation_offset) {
            return Err(invalid("brush.deformation_offset must be non-negative"));
        }

        let c = &self.character;
        if !positive(c.mass) {
            return Err(invalid(format!("character.mass must be positive, got {}", c.mass)));
        }
        if !c.gravity.is_finite() {
            return Err(invalid(format!("character.gravity must be finite, got {}", c.gravity)));
        }

        let s = &self.simulation;
        if !(positive(s.fixed_dt) && positive(s.frame_dt)) {
            return Err(invalid("simulation.fixed_dt and simulation.frame_dt must be positive"));
        }
        if !positive(s.step_period) || !(0.5..1.0).contains(&s.duty_factor) {
            return Err(invalid(
                "simulation.step_period must be positive and simulation.duty_factor in [0.5, 1)",
            ));
        }
        Ok(())
    }
}

/// Finite and strictly positive; NaN fails.
fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Errors that can occur when loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse config: {0}")]
    Syntax(#[from] toml::de::Error),
    #[error("unknown material preset `{0}`")]
    UnknownPreset(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.terrain.resolution, 129);
        assert_eq!(config.brush.half_width, 10);
        assert_eq!(config.material.preset, MaterialPreset::Default);
        assert_eq!(config.material_params().young_modulus, 750_000.0);
        assert!(config.character.prefer_native_velocity);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [terrain]
            resolution = 65
            size = [8.0, 8.0]

            [material]
            preset = "dry_sand"
            bumps = true

            [brush]
            half_width = 8
            kernel = "gauss5"
            bump_distribution = "modulated"

            [character]
            mass = 60.0
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        let material = config.material_params();
        assert_eq!(material.young_modulus, 600_000.0);
        assert_eq!(material.filter_iterations, 5);
        assert!(material.bumps);
        assert_eq!(config.brush.kernel, Kernel::Gauss5);
        assert_eq!(config.brush.bump_distribution, BumpDistribution::Modulated);
        assert_eq!(config.character.mass, 60.0);
    }

    #[test]
    fn test_preset_table() {
        let snow = MaterialPreset::Snow.params();
        assert_eq!(snow.young_modulus, 200_000.0);
        assert_eq!(snow.contact_time, 0.2);
        assert_eq!(snow.filter_iterations, 0);

        let mud: MaterialPreset = "mud".parse().unwrap();
        assert_eq!(mud.params().poisson_ratio, 0.4);
        assert_eq!(mud.params().contact_time, 0.8);

        assert!(matches!(
            "gravel".parse::<MaterialPreset>(),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_contact_time() {
        let err = EngineConfig::from_toml_str("[material]\ncontact_time = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("contact_time"), "unexpected error: {}", err);
    }

    #[test]
    fn test_rejects_nan_material_values() {
        for field in ["contact_time", "young_modulus", "thickness", "poisson_ratio"] {
            let toml = format!("[material]\n{} = nan\n", field);
            let err = EngineConfig::from_toml_str(&toml).unwrap_err();
            assert!(err.to_string().contains(field), "unexpected error: {}", err);
        }
        assert!(EngineConfig::from_toml_str("[character]\nmass = nan\n").is_err());
        assert!(EngineConfig::from_toml_str("[simulation]\nfixed_dt = inf\n").is_err());
    }

    #[test]
    fn test_rejects_window_larger_than_terrain() {
        let toml = "[terrain]\nresolution = 17\n[brush]\nhalf_width = 10\n";
        let err = EngineConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("half_width"), "unexpected error: {}", err);
    }

    #[test]
    fn test_rejects_neighbour_search_outside_window() {
        let toml = "[brush]\noffset_bump_grid = 1\nneighbour_search_area = 2\n";
        assert!(EngineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_margin_below_kernel_radius() {
        let toml = "[brush]\nkernel = \"gauss5\"\nmargin = 1\n";
        assert!(EngineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_poisson_ratio_out_of_range() {
        assert!(EngineConfig::from_toml_str("[material]\npoisson_ratio = 0.7\n").is_err());
    }
}
