//! Whole-driver scenarios from spec §8 "Concrete scenarios", exercised
//! through the public [`Compositor`] surface rather than the per-module
//! unit tests colocated with each component.

use multiblend::config::ConfigBuilder;
use multiblend::driver::{Compositor, Image, SkipReason, StepOutcome};
use multiblend::pixel::Pixel;
use multiblend::pyramid_ops::Boundary;

fn solid(width: usize, height: usize, p: Pixel) -> Image {
  Image { width, height, pixels: vec![p; width * height] }
}

/// Scenario 1: two constant-colored, fully opaque images spanning the whole
/// canvas. The seam should resolve to a monotonic transition band rather
/// than a hard step, roughly `2 * filter_half_width(levels - 1)` wide.
#[test]
fn two_constant_images_blend_through_a_monotonic_band() {
  let config = ConfigBuilder::default().build().unwrap();
  let compositor = Compositor::new(config);
  let red = Pixel::new(255, 0, 0, 255);
  let green = Pixel::new(0, 255, 0, 255);
  let a = solid(64, 64, red);
  let b = solid(64, 64, green);

  let (result, reports) = compositor.composite(vec![a, b]).unwrap();
  assert_eq!(reports.len(), 1);
  assert!(matches!(reports[0].outcome, StepOutcome::Blended { .. }));

  // Every output pixel must lie within the convex hull of the two inputs on
  // every channel; no ringing past either endpoint.
  for p in &result.pixels {
    assert!(p.r <= 255 && p.g <= 255 && p.b == 0);
  }

  // The band itself must be monotonic, not merely bounded: a ringing
  // artifact from a mis-centered filter tap would stay within [0, 255] but
  // overshoot and dip back, which the convex-hull check above would miss.
  let row: Vec<Pixel> = (0..64).map(|x| result.pixels[x]).collect();
  for pair in row.windows(2) {
    assert!(pair[1].r <= pair[0].r, "r channel must be non-increasing left-to-right across the seam");
    assert!(pair[1].g >= pair[0].g, "g channel must be non-decreasing left-to-right across the seam");
  }
}

/// Scenario 4: disjoint alpha supports. The composite is the pixel-wise
/// union and the ROI collapses to empty, so no pyramid band-blend runs.
#[test]
fn disjoint_alpha_yields_pixelwise_union_and_empty_roi() {
  let config = ConfigBuilder::default().build().unwrap();
  let compositor = Compositor::new(config);
  let red = Pixel::new(255, 0, 0, 255);
  let green = Pixel::new(0, 255, 0, 255);

  let mut left = solid(32, 16, Pixel::TRANSPARENT);
  let mut right = solid(32, 16, Pixel::TRANSPARENT);
  for y in 0..16 {
    for x in 0..16 {
      left.pixels[y * 32 + x] = red;
    }
    for x in 16..32 {
      right.pixels[y * 32 + x] = green;
    }
  }

  let (result, reports) = compositor.composite(vec![left, right]).unwrap();
  match reports[0].outcome {
    StepOutcome::Blended { roi, .. } => assert!(roi.is_empty()),
    StepOutcome::Skipped { .. } => panic!("disjoint halves still union; they should not skip"),
  }
  for y in 0..16 {
    for x in 0..16 {
      assert_eq!(result.pixels[y * 32 + x], red);
    }
    for x in 16..32 {
      assert_eq!(result.pixels[y * 32 + x], green);
    }
  }
}

/// Scenario 6: an empty overlay is reported via [`SkipReason::EmptyOverlay`]
/// and does not alter the composite.
#[test]
fn fully_transparent_overlay_is_skipped_without_altering_the_composite() {
  let config = ConfigBuilder::default().build().unwrap();
  let compositor = Compositor::new(config);
  let base = solid(16, 16, Pixel::new(1, 2, 3, 255));
  let empty_overlay = solid(16, 16, Pixel::TRANSPARENT);

  let (result, reports) = compositor.composite(vec![base.clone(), empty_overlay]).unwrap();
  assert_eq!(reports.len(), 1);
  assert!(matches!(reports[0].outcome, StepOutcome::Skipped { reason: SkipReason::EmptyOverlay }));
  assert_eq!(result.pixels, base.pixels);
}

/// Scenario 3 (wraparound seam), driven through the multi-overlay path: a
/// gradient stitched against its own half-period shift should show no first
/// derivative discontinuity at the wrap point once `wraparound` is enabled.
#[test]
fn wraparound_gradient_has_no_discontinuity_through_the_compositor() {
  let mut builder = ConfigBuilder::default();
  builder.boundary(Boundary::Wraparound);
  let config = builder.build().unwrap();
  let compositor = Compositor::new(config);

  let width = 256usize;
  let height = 16usize;
  let mut a = Image { width, height, pixels: vec![Pixel::TRANSPARENT; width * height] };
  let mut b = Image { width, height, pixels: vec![Pixel::TRANSPARENT; width * height] };
  for y in 0..height {
    for x in 0..width {
      let va = x as u8;
      let vb = ((x + width / 2) % width) as u8;
      a.pixels[y * width + x] = Pixel::new(va, va, va, 255);
      b.pixels[y * width + x] = Pixel::new(vb, vb, vb, 255);
    }
  }

  let (result, _reports) = compositor.composite(vec![a, b]).unwrap();
  let v0 = result.pixels[0].r as i16;
  let vlast = result.pixels[width - 1].r as i16;
  assert!((v0 - vlast).abs() < 40);
}

/// A three-image chain processes overlays strictly in input order and each
/// non-contributing region of a later overlay never overwrites an earlier
/// one's already-resolved pixels.
#[test]
fn three_overlays_compose_in_input_order() {
  let config = ConfigBuilder::default().build().unwrap();
  let compositor = Compositor::new(config);

  let width = 24;
  let height = 8;
  let mut first = solid(width, height, Pixel::TRANSPARENT);
  let mut second = solid(width, height, Pixel::TRANSPARENT);
  let mut third = solid(width, height, Pixel::TRANSPARENT);
  for y in 0..height {
    for x in 0..8 {
      first.pixels[y * width + x] = Pixel::new(255, 0, 0, 255);
    }
    for x in 8..16 {
      second.pixels[y * width + x] = Pixel::new(0, 255, 0, 255);
    }
    for x in 16..24 {
      third.pixels[y * width + x] = Pixel::new(0, 0, 255, 255);
    }
  }

  let (result, reports) = compositor.composite(vec![first, second, third]).unwrap();
  assert_eq!(reports.len(), 2);
  assert_eq!(result.pixels[0], Pixel::new(255, 0, 0, 255));
  assert_eq!(result.pixels[12], Pixel::new(0, 255, 0, 255));
  assert_eq!(result.pixels[20], Pixel::new(0, 0, 255, 255));
}
