//! Per-overlay blend state machine and the multi-overlay driver (component C6).
//!
//! [`blend_overlay`] walks the `UBB -> MASK -> ROI/LEVELS -> COPY_OUTSIDE ->
//! BUILD_PYRAMIDS -> BLEND -> COLLAPSE -> WRITEBACK` pipeline from §4.4 for a
//! single (composite, overlay) pair; [`Compositor`] drives it across however
//! many overlays a run has, in input order (§5 "Ordering").

use tracing::{debug, info, instrument, warn};

use crate::config::{AssemblyMode, Config};
use crate::error::{BlendError, Result};
use crate::filter_width::filter_half_width;
use crate::geometry::{self, Rect};
use crate::mask;
use crate::parallel::parallel_rows_mut;
use crate::pixel::{LPPixel, Pixel, MASK_MAX};
use crate::pyramid::{self, Pyramid};
use crate::pyramid_ops::{Boundary, LPImage, MaskImage};

/// A plain RGBA image, the only shape the core's public surface accepts or
/// returns (§0: "Pixel decode/encode is exposed only through plain
/// `(width, height, Vec<u8>)` RGBA buffers").
#[derive(Debug, Clone)]
pub struct Image {
  pub width: usize,
  pub height: usize,
  pub pixels: Vec<Pixel>,
}

impl Image {
  /// Build an image from a decoded RGBA8 buffer. `bytes.len()` must equal
  /// `width * height * 4`.
  pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
    if bytes.len() != width * height * 4 {
      return Err(BlendError::Format(format!(
        "expected {} bytes for a {width}x{height} RGBA image, got {}",
        width * height * 4,
        bytes.len()
      )));
    }
    let pixels = bytes.chunks_exact(4).map(|c| Pixel::new(c[0], c[1], c[2], c[3])).collect();
    Ok(Image { width, height, pixels })
  }

  /// Flatten back to an interleaved RGBA8 buffer.
  pub fn to_rgba8(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(self.pixels.len() * 4);
    for p in &self.pixels {
      out.extend_from_slice(&[p.r, p.g, p.b, p.a]);
    }
    out
  }

  fn alpha_plane(&self) -> Vec<u8> {
    self.pixels.iter().map(|p| p.a).collect()
  }

  fn get(&self, x: usize, y: usize) -> Pixel {
    self.pixels[y * self.width + x]
  }

  fn set(&mut self, x: usize, y: usize, p: Pixel) {
    self.pixels[y * self.width + x] = p;
  }

  fn check_same_shape(&self, other: &Image) -> Result<()> {
    if self.width != other.width || self.height != other.height {
      return Err(BlendError::Format(format!(
        "input is {}x{}, expected {}x{} to match the composite",
        other.width, other.height, self.width, self.height
      )));
    }
    Ok(())
  }
}

/// Outcome of a single [`blend_overlay`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// The overlay was blended in; `levels` bands were combined over `roi`.
  Blended { ubb: Rect, roi: Rect, levels: u32 },
  /// The overlay contributed nothing and was skipped; `composite` is
  /// unchanged. Per §7, this is a diagnostic, not a fatal error.
  Skipped { reason: SkipReason },
}

/// Why a step ended in `SKIP` rather than blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// The overlay's alpha (and, in `OneAtATime` mode, the composite's) is
  /// empty everywhere, so the union bounding box is empty.
  EmptyOverlay,
  /// The ROI's depth-limited level count collapsed to zero: no band needs
  /// blending, only a direct copy.
  ZeroLevels,
}

/// Estimated bytes the mask-construction step allocates: one [`MaskPixel`]
/// per UBB pixel plus two `u32`-sized chamfer-distance accumulators
/// (original_source's `enblend.cc` verbose memory estimate, §3 "Supplemented
/// features").
///
/// [`MaskPixel`]: crate::pixel::MaskPixel
pub fn estimate_mask_memory_bytes(ubb: &Rect) -> usize {
  let pixels = (ubb.width().max(0) as usize) * (ubb.height().max(0) as usize);
  pixels * std::mem::size_of::<u8>() + 2 * pixels * std::mem::size_of::<u32>()
}

/// Estimated temp-disk bytes a `levels`-deep pyramid pair (Laplacian of
/// composite, Laplacian of overlay) plus one mask Gaussian pyramid would
/// occupy if fully spilled, using the geometric series `sum(1/4^k) -> 4/3`
/// original_source's estimate relies on.
pub fn estimate_pyramid_disk_bytes(roi: &Rect, _levels: u32) -> usize {
  let pixels = (roi.width().max(0) as usize) * (roi.height().max(0) as usize);
  let per_level_bytes = 2 * std::mem::size_of::<LPPixel>() + std::mem::size_of::<u8>();
  ((pixels * per_level_bytes) as f64 * (4.0 / 3.0)) as usize
}

fn to_lp_subimage(image: &Image, roi: &Rect) -> (LPImage, MaskImage) {
  let w = roi.width() as usize;
  let h = roi.height() as usize;
  let mut lp = LPImage::new(w, h);
  let mut alpha = MaskImage::new(w, h);
  for y in 0..h {
    for x in 0..w {
      let src_x = (roi.x0 as usize) + x;
      let src_y = (roi.y0 as usize) + y;
      let pixel = image.get(src_x, src_y);
      lp.set(x, y, pixel.to_lp());
      alpha.set(x, y, if pixel.a != 0 { MASK_MAX } else { 0 });
    }
  }
  (lp, alpha)
}

/// Lift the UBB-local binary mask into an ROI-local mask image, filling
/// `0` outside the UBB (§4.4 BUILD_PYRAMIDS: "mask outside UBB is 0").
fn mask_extended_to_roi(mask_data: &MaskImage, ubb: &Rect, roi: &Rect) -> MaskImage {
  let w = roi.width() as usize;
  let h = roi.height() as usize;
  let mut out = MaskImage::new(w, h);
  for y in 0..h {
    let canvas_y = roi.y0 + y as i64;
    if canvas_y < ubb.y0 || canvas_y >= ubb.y1 {
      continue;
    }
    for x in 0..w {
      let canvas_x = roi.x0 + x as i64;
      if canvas_x < ubb.x0 || canvas_x >= ubb.x1 {
        continue;
      }
      let value = mask_data.get((canvas_x - ubb.x0) as usize, (canvas_y - ubb.y0) as usize);
      out.set(x, y, value);
    }
  }
  out
}

/// §4.4 BLEND: per-pixel convex combination of the composite and overlay
/// Laplacian bands, weighted by the mask's Gaussian pyramid. Each row is
/// independent of every other (§5), so a [`crate::parallel::parallel_rows`]
/// caller that owns disjoint row buffers may run this band-by-band.
fn blend_levels(lw: &mut Pyramid<LPImage>, lb: &Pyramid<LPImage>, gm: &Pyramid<MaskImage>) -> Result<()> {
  for k in 0..lw.levels.len() {
    let black = lb.level(k)?;
    let mask = gm.level(k)?;
    let width = lw.level(k)?.width;
    parallel_rows_mut(&mut lw.levels[k].data, width, |y, row| {
      for (x, w_px) in row.iter_mut().enumerate() {
        let gm_value = mask.get(x, y) as i64;
        let b_px = black.get(x, y);
        *w_px = w_px.scale(gm_value, MASK_MAX as i64) + b_px.scale(MASK_MAX as i64 - gm_value, MASK_MAX as i64);
      }
    });
  }
  Ok(())
}

/// Round-trips a Laplacian pyramid through [`pyramid::PyramidStorage`],
/// spilling it to a temp-file-backed tile store when its footprint crosses
/// `config.memory_budget_bytes` (§4.5 out-of-core contract) and loading it
/// straight back for the phases that still need it in memory.
fn spill_round_trip(built: Pyramid<LPImage>, config: &Config, temp_prefix: &str) -> Result<Pyramid<LPImage>> {
  let footprint = pyramid::PyramidStorage::footprint_bytes(&built);
  let mut storage = pyramid::PyramidStorage::from_pyramid(built, config.memory_budget_bytes, temp_prefix)?;
  if matches!(storage, pyramid::PyramidStorage::OnDisk { .. }) {
    debug!(footprint, budget = config.memory_budget_bytes, "pyramid spilled to disk between blend phases");
  }
  storage.materialize()
}

/// Run the per-overlay state machine (§4.4) for one `(composite, overlay)`
/// pair, mutating `composite` in place.
#[instrument(skip(composite, overlay, config), fields(levels))]
pub fn blend_overlay(composite: &mut Image, overlay: &Image, config: &Config) -> Result<StepOutcome> {
  composite.check_same_shape(overlay)?;
  let width = composite.width;
  let height = composite.height;
  let canvas = Rect::new(0, 0, width as i64, height as i64);

  // UBB
  let composite_alpha = composite.alpha_plane();
  let overlay_alpha = overlay.alpha_plane();
  let ubb = match geometry::union_bounding_box(&composite_alpha, &overlay_alpha, width, height) {
    Ok(ubb) => ubb,
    Err(BlendError::EmptyOverlay) => {
      warn!("some images are redundant and will not be blended into the composite");
      return Ok(StepOutcome::Skipped { reason: SkipReason::EmptyOverlay });
    }
    Err(e) => return Err(e),
  };
  debug!(?ubb, "computed union bounding box");

  // MASK
  let ubb_mask = mask::build_mask(&composite_alpha, &overlay_alpha, width, &ubb, config.distance_norm);
  info!(bytes = estimate_mask_memory_bytes(&ubb), "estimated mask construction memory");

  // ROI/LEVELS
  let local_canvas = Rect::new(0, 0, ubb.width(), ubb.height());
  let local_roi = geometry::region_of_interest(&ubb_mask.data, ubb_mask.width, ubb_mask.height, config.max_levels, &local_canvas);
  let roi = local_roi.translate(ubb.x0, ubb.y0).clip(&canvas);
  let levels = config.max_levels.min(geometry::max_levels(&roi));
  tracing::Span::current().record("levels", levels);
  debug!(?roi, levels, "computed region of interest and pyramid depth");

  if levels == 0 {
    copy_outside(composite, overlay, &ubb, &Rect::new(canvas.x0, canvas.y0, canvas.x0, canvas.y0));
    warn!("overlay has no transition band requiring blending; copied verbatim");
    return Ok(StepOutcome::Skipped { reason: SkipReason::ZeroLevels });
  }

  // COPY_OUTSIDE
  copy_outside(composite, overlay, &ubb, &roi);

  if roi.is_empty() {
    return Ok(StepOutcome::Blended { ubb, roi, levels: 0 });
  }

  // BUILD_PYRAMIDS
  info!(bytes = estimate_pyramid_disk_bytes(&roi, levels), "estimated pyramid temp-disk footprint");
  let (composite_lp, composite_alpha_roi) = to_lp_subimage(composite, &roi);
  let (overlay_lp, overlay_alpha_roi) = to_lp_subimage(overlay, &roi);
  let mask_roi = mask_extended_to_roi(&ubb_mask, &ubb, &roi);

  let lw = pyramid::laplacian_pyramid(&composite_lp, Some(&composite_alpha_roi), levels, config.boundary);
  let lb = pyramid::laplacian_pyramid(&overlay_lp, Some(&overlay_alpha_roi), levels, config.boundary);
  let gm = pyramid::gaussian_pyramid_mask(&mask_roi, levels, config.boundary);

  let mut lw = spill_round_trip(lw, config, "multiblend_composite_pyramid_")?;
  let lb = spill_round_trip(lb, config, "multiblend_overlay_pyramid_")?;

  // BLEND
  blend_levels(&mut lw, &lb, &gm)?;

  // COLLAPSE
  pyramid::collapse_pyramid(&mut lw, config.boundary);

  // WRITEBACK
  let collapsed = lw.level(0)?;
  let roi_w = roi.width() as usize;
  for y in 0..roi.height() as usize {
    for x in 0..roi_w {
      let m = mask_roi.get(x, y);
      if m == MASK_MAX {
        continue;
      }
      let canvas_x = roi.x0 as usize + x;
      let canvas_y = roi.y0 as usize + y;
      let out_pixel = if m == 0 {
        overlay.get(canvas_x, canvas_y)
      } else {
        let mut blended = collapsed.get(x, y).to_pixel();
        let a = composite.get(canvas_x, canvas_y).a.max(overlay.get(canvas_x, canvas_y).a);
        blended.a = a;
        blended
      };
      composite.set(canvas_x, canvas_y, out_pixel);
    }
  }

  Ok(StepOutcome::Blended { ubb, roi, levels })
}

/// For every UBB pixel where the overlay contributes but the composite does
/// not, and which lies outside `roi`, copy the overlay pixel straight into
/// the composite (§4.4 COPY_OUTSIDE).
fn copy_outside(composite: &mut Image, overlay: &Image, ubb: &Rect, roi: &Rect) {
  for y in ubb.y0..ubb.y1 {
    for x in ubb.x0..ubb.x1 {
      if roi.contains(x, y) {
        continue;
      }
      let (ux, uy) = (x as usize, y as usize);
      let overlay_px = overlay.get(ux, uy);
      if overlay_px.a == 0 {
        continue;
      }
      if composite.get(ux, uy).a != 0 {
        continue;
      }
      composite.set(ux, uy, overlay_px);
    }
  }
}

/// Drives [`blend_overlay`] across every overlay in a run, in input order.
pub struct Compositor {
  config: Config,
}

/// Per-overlay outcome, annotated with the overlay's position in the input
/// list, for callers that want a full report rather than just the final
/// composite.
#[derive(Debug, Clone, Copy)]
pub struct OverlayReport {
  pub index: usize,
  pub outcome: StepOutcome,
}

impl Compositor {
  pub fn new(config: Config) -> Self {
    Compositor { config }
  }

  /// Blend `images[0]` (the initial composite) against every subsequent
  /// image in order, returning the final composite and a per-overlay
  /// report. Fails fast on the first fatal error; a redundant/zero-level
  /// overlay is recorded in the report and does not abort the run.
  pub fn composite(&self, images: Vec<Image>) -> Result<(Image, Vec<OverlayReport>)> {
    let mut images = images.into_iter();
    let mut composite = images.next().ok_or_else(|| BlendError::Args("no input images supplied".to_string()))?;

    let overlays: Vec<Image> = images.collect();

    // Pre-union assembly additionally caps every step's pyramid depth by
    // the depth the union of *every* overlay's alpha would allow, so later
    // steps do not build deeper pyramids than the full composition needs.
    // One-at-a-time assembly omits this extra cap and lets each pair decide
    // its own depth independently (open question resolution, see DESIGN.md).
    let global_cap = if self.config.assembly_mode == AssemblyMode::PreUnion && !overlays.is_empty() {
      self.estimate_global_cap(&composite, &overlays)?
    } else {
      u32::MAX
    };

    let mut reports = Vec::with_capacity(overlays.len());
    for (index, overlay) in overlays.into_iter().enumerate() {
      let mut step_config = self.config.clone();
      step_config.max_levels = step_config.max_levels.min(global_cap);
      let outcome = blend_overlay(&mut composite, &overlay, &step_config)?;
      reports.push(OverlayReport { index, outcome });
    }

    Ok((composite, reports))
  }

  fn estimate_global_cap(&self, composite: &Image, overlays: &[Image]) -> Result<u32> {
    let width = composite.width;
    let height = composite.height;
    let mut union_alpha = composite.alpha_plane();
    for overlay in overlays {
      composite.check_same_shape(overlay)?;
      for (slot, &a) in union_alpha.iter_mut().zip(overlay.alpha_plane().iter()) {
        *slot = (*slot).max(a);
      }
    }
    let zero = vec![0u8; width * height];
    let ubb = match geometry::union_bounding_box(&union_alpha, &zero, width, height) {
      Ok(ubb) => ubb,
      Err(BlendError::EmptyOverlay) => return Ok(u32::MAX),
      Err(e) => return Err(e),
    };
    let half_width = filter_half_width::<u8>(self.config.max_levels.saturating_sub(1));
    let canvas = Rect::new(0, 0, width as i64, height as i64);
    let roi = ubb.dilate(half_width as i64, &canvas);
    Ok(geometry::max_levels(&roi).max(1))
  }
}
