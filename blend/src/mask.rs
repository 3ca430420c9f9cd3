//! Binary blend-mask construction over the union bounding box (component C4).

use crate::geometry::Rect;
use crate::pixel::MASK_MAX;
use crate::pyramid_ops::MaskImage;

/// The four-way classification of a pixel inside the UBB, before
/// tie-breaking resolves it to a binary mask value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contribution {
  /// Neither input contributes.
  Neither,
  /// Only the composite ("white") contributes.
  CompositeOnly,
  /// Only the overlay ("black") contributes.
  OverlayOnly,
  /// Both contribute; resolved by the tie-breaking policy.
  Both,
}

/// Distance metric used to resolve the tie-breaking region (overlap and
/// void pixels). All three are equivalent up to the shape of the resulting
/// seam; none changes which side of the tie a pixel falls on more than the
/// chamfer weights below imply, since the final decision only compares the
/// sign of a difference and squaring a non-negative distance never changes
/// its ordering against another squared non-negative distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceNorm {
  Chebyshev,
  #[default]
  Manhattan,
  SquaredEuclidean,
}

impl DistanceNorm {
  fn diagonal_weight(self) -> f64 {
    match self {
      DistanceNorm::Chebyshev => 1.0,
      DistanceNorm::Manhattan => 2.0,
      DistanceNorm::SquaredEuclidean => std::f64::consts::SQRT_2,
    }
  }
}

/// Build the binary blend mask over `ubb`. `alpha_a`/`alpha_b` are full-canvas
/// alpha planes (`width` wide); `ubb` selects the sub-rectangle the returned
/// [`MaskImage`] covers.
pub fn build_mask(alpha_a: &[u8], alpha_b: &[u8], width: usize, ubb: &Rect, norm: DistanceNorm) -> MaskImage {
  let ubb_w = ubb.width() as usize;
  let ubb_h = ubb.height() as usize;

  let classify = |x: usize, y: usize| -> Contribution {
    let idx = (ubb.y0 as usize + y) * width + (ubb.x0 as usize + x);
    let a = alpha_a[idx] != 0;
    let b = alpha_b[idx] != 0;
    match (a, b) {
      (false, false) => Contribution::Neither,
      (true, false) => Contribution::CompositeOnly,
      (false, true) => Contribution::OverlayOnly,
      (true, true) => Contribution::Both,
    }
  };

  let mut codes = vec![Contribution::Neither; ubb_w * ubb_h];
  let mut a_inside = vec![0u8; ubb_w * ubb_h];
  let mut b_inside = vec![0u8; ubb_w * ubb_h];
  for y in 0..ubb_h {
    for x in 0..ubb_w {
      let c = classify(x, y);
      codes[y * ubb_w + x] = c;
      a_inside[y * ubb_w + x] = matches!(c, Contribution::CompositeOnly | Contribution::Both) as u8;
      b_inside[y * ubb_w + x] = matches!(c, Contribution::OverlayOnly | Contribution::Both) as u8;
    }
  }

  let depth_a = chamfer_depth(&a_inside, ubb_w, ubb_h, norm);
  let depth_b = chamfer_depth(&b_inside, ubb_w, ubb_h, norm);

  let mut mask = MaskImage::new(ubb_w, ubb_h);
  for y in 0..ubb_h {
    for x in 0..ubb_w {
      let i = y * ubb_w + x;
      let value = match codes[i] {
        Contribution::CompositeOnly => MASK_MAX,
        Contribution::OverlayOnly => 0,
        Contribution::Neither => 0,
        Contribution::Both => {
          // Closer to B's boundary (shallower inside B) than to A's boundary
          // means farther inside A: keep the composite. Ties favor A.
          if depth_a[i] >= depth_b[i] {
            MASK_MAX
          } else {
            0
          }
        }
      };
      mask.set(x, y, value);
    }
  }

  mask
}

/// Two-pass chamfer distance transform: for each pixel inside `inside`
/// (non-zero), the distance to the nearest pixel where `inside` is zero.
/// Pixels where `inside` is already zero have depth zero.
fn chamfer_depth(inside: &[u8], width: usize, height: usize, norm: DistanceNorm) -> Vec<f64> {
  let orth = 1.0;
  let diag = norm.diagonal_weight();
  let inf = f64::MAX / 4.0;

  let mut dist = vec![inf; width * height];
  for i in 0..inside.len() {
    if inside[i] == 0 {
      dist[i] = 0.0;
    }
  }

  let relax = |dist: &mut Vec<f64>, x: usize, y: usize, nx: i64, ny: i64, weight: f64| {
    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
      return;
    }
    let candidate = dist[ny as usize * width + nx as usize] + weight;
    let here = &mut dist[y * width + x];
    if candidate < *here {
      *here = candidate;
    }
  };

  // Forward pass: neighbours already visited in raster order.
  for y in 0..height {
    for x in 0..width {
      if inside[y * width + x] == 0 {
        continue;
      }
      let (xi, yi) = (x as i64, y as i64);
      relax(&mut dist, x, y, xi - 1, yi, orth);
      relax(&mut dist, x, y, xi, yi - 1, orth);
      relax(&mut dist, x, y, xi - 1, yi - 1, diag);
      relax(&mut dist, x, y, xi + 1, yi - 1, diag);
    }
  }

  // Backward pass: neighbours visited later in raster order.
  for y in (0..height).rev() {
    for x in (0..width).rev() {
      if inside[y * width + x] == 0 {
        continue;
      }
      let (xi, yi) = (x as i64, y as i64);
      relax(&mut dist, x, y, xi + 1, yi, orth);
      relax(&mut dist, x, y, xi, yi + 1, orth);
      relax(&mut dist, x, y, xi + 1, yi + 1, diag);
      relax(&mut dist, x, y, xi - 1, yi + 1, diag);
    }
  }

  dist
}
