//! Explicit run configuration (§9 "Global configuration" design note).
//!
//! The original exposes its options as process-wide globals; this core
//! threads a single [`Config`] value into the [`crate::driver::Compositor`]
//! instead, built with the pack's own builder crate so construction reads
//! the way `RenderOptionsBuilder` does.

use derive_builder::Builder;

use crate::error::{BlendError, Result};
use crate::mask::DistanceNorm;
use crate::pyramid_ops::Boundary;

/// Whether overlays are pre-unioned before any blending happens, or
/// processed one at a time as the CLI's `-s` flag requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyMode {
  #[default]
  PreUnion,
  OneAtATime,
}

/// Run-wide configuration for a blend. No field here is a process-wide
/// global; every [`crate::driver::Compositor`] gets its own.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Config {
  /// Cap on pyramid depth; the driver still derives the ROI-limited depth
  /// and takes the smaller of the two.
  #[builder(default = "32")]
  pub max_levels: u32,

  /// Horizontal boundary handling for every `reduce`/`expand` call.
  #[builder(default = "Boundary::Clamp")]
  pub boundary: Boundary,

  /// Tie-breaking distance metric for the mask's overlap/void region.
  #[builder(default)]
  pub distance_norm: DistanceNorm,

  /// Pre-union vs. one-at-a-time overlay assembly (CLI `-s`).
  #[builder(default)]
  pub assembly_mode: AssemblyMode,

  /// The reserved "stitch mismatch threshold" (CLI `-t`). Accepted and
  /// range-checked to `[0.0, 1.0]`; otherwise inert, per the open question
  /// in the design notes.
  #[builder(default = "0.0")]
  pub stitch_mismatch_threshold: f64,

  /// Levels whose total in-memory footprint exceeds this many bytes spill
  /// to a [`crate::tile_store::TileStore`] between blend phases.
  #[builder(default = "256 * 1024 * 1024")]
  pub memory_budget_bytes: usize,
}

impl ConfigBuilder {
  fn validate(&self) -> std::result::Result<(), String> {
    if let Some(threshold) = self.stitch_mismatch_threshold {
      if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("stitch mismatch threshold {threshold} outside [0.0, 1.0]"));
      }
    }
    if let Some(0) = self.max_levels {
      return Err("max_levels must be at least 1".to_string());
    }
    Ok(())
  }
}

impl Config {
  /// Build with defaults, surfacing validation failures as [`BlendError::Args`].
  pub fn build(builder: ConfigBuilder) -> Result<Config> {
    builder.build().map_err(|e| BlendError::Args(e.to_string()))
  }
}
