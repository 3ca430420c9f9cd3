//! Gaussian and Laplacian pyramid construction (component C5).
//!
//! Levels are computed in memory, one at a time, the way the blend driver
//! consumes them within a single step (§5: in-memory pyramids are owned
//! exclusively by the driver for the duration of one step). Once a level's
//! footprint crosses [`crate::config::Config::memory_budget_bytes`] it can be
//! spilled to a [`TileStore`] between phases and reloaded on demand, giving
//! the out-of-core behaviour the tile store contract exists for.

use crate::error::{BlendError, Result};
use crate::pixel::{LPPixel, Pixel};
use crate::pyramid_ops::{self, Boundary, ExpandOp, LPImage, MaskImage};
use crate::tile_store::{FileTileStore, TileStore};

/// An ordered sequence of pyramid levels, each half the size (rounded up) of
/// the previous one.
#[derive(Debug, Clone)]
pub struct Pyramid<T> {
  pub levels: Vec<T>,
}

impl<T> Pyramid<T> {
  pub fn len(&self) -> usize {
    self.levels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.levels.is_empty()
  }

  /// Level `index`, or [`BlendError::LevelOutOfRange`] if the pyramid is
  /// shallower than that.
  pub fn level(&self, index: usize) -> Result<&T> {
    self.levels.get(index).ok_or(BlendError::LevelOutOfRange { level: index, len: self.levels.len() })
  }
}

fn mask_to_lp(mask: &MaskImage) -> LPImage {
  let mut img = LPImage::new(mask.width, mask.height);
  for (dst, &src) in img.data.iter_mut().zip(mask.data.iter()) {
    *dst = Pixel::new(src, 0, 0, 0).to_lp();
  }
  img
}

fn lp_to_mask(img: &LPImage) -> MaskImage {
  let mut mask = MaskImage::new(img.width, img.height);
  for (dst, &src) in mask.data.iter_mut().zip(img.data.iter()) {
    *dst = src.to_pixel().r;
  }
  mask
}

/// Gaussian pyramid of a plain image, ignoring alpha. `P[0]` is `src`
/// itself; `P[k+1]` is `reduce(P[k])`.
pub fn gaussian_pyramid(src: &LPImage, num_levels: u32, boundary: Boundary) -> Pyramid<LPImage> {
  let mut levels: Vec<LPImage> = Vec::with_capacity(num_levels as usize);
  levels.push(src.clone());
  for k in 1..num_levels as usize {
    let next = pyramid_ops::reduce(&levels[k - 1], boundary);
    levels.push(next);
  }
  Pyramid { levels }
}

/// Gaussian pyramid of an image restricted by an alpha mask: masked-out
/// samples at level 0 are excluded from every coarser level's filter
/// support, with the retained-weight renormalization `reduce_masked`
/// performs. Returns both the image pyramid and the alpha pyramid that
/// tracks which coarser-level samples remain valid.
pub fn gaussian_pyramid_masked(
  src: &LPImage,
  alpha: &MaskImage,
  num_levels: u32,
  boundary: Boundary,
) -> (Pyramid<LPImage>, Pyramid<MaskImage>) {
  let mut levels: Vec<LPImage> = Vec::with_capacity(num_levels as usize);
  let mut alphas: Vec<MaskImage> = Vec::with_capacity(num_levels as usize);
  levels.push(src.clone());
  alphas.push(alpha.clone());

  for k in 1..num_levels as usize {
    let (next, next_alpha) = pyramid_ops::reduce_masked(&levels[k - 1], &alphas[k - 1], boundary);
    levels.push(next);
    alphas.push(next_alpha);
  }

  (Pyramid { levels }, Pyramid { levels: alphas })
}

/// Gaussian pyramid of a mask image. Every level stays within `[0, MAX]`
/// because `reduce`'s weights are a convex combination (invariant 3, §8).
pub fn gaussian_pyramid_mask(mask: &MaskImage, num_levels: u32, boundary: Boundary) -> Pyramid<MaskImage> {
  let as_lp = mask_to_lp(mask);
  let lp_pyramid = gaussian_pyramid(&as_lp, num_levels, boundary);
  Pyramid { levels: lp_pyramid.levels.iter().map(lp_to_mask).collect() }
}

/// Laplacian pyramid: each level but the last is replaced in place by
/// `G[k] - expand(G[k+1])`; the last level keeps the coarsest Gaussian as
/// the pyramid's DC term.
pub fn laplacian_pyramid(src: &LPImage, alpha: Option<&MaskImage>, num_levels: u32, boundary: Boundary) -> Pyramid<LPImage> {
  let mut gaussian = match alpha {
    Some(alpha) => gaussian_pyramid_masked(src, alpha, num_levels, boundary).0,
    None => gaussian_pyramid(src, num_levels, boundary),
  };

  for l in 0..gaussian.levels.len().saturating_sub(1) {
    let (head, tail) = gaussian.levels.split_at_mut(l + 1);
    pyramid_ops::expand(&tail[0], &mut head[l], ExpandOp::Subtract, boundary);
  }

  gaussian
}

/// Collapse a Laplacian pyramid back into a single image in place, working
/// from the smallest level up: `L[k] += expand(L[k+1])`.
pub fn collapse_pyramid(pyramid: &mut Pyramid<LPImage>, boundary: Boundary) {
  let levels = &mut pyramid.levels;
  for l in (0..levels.len().saturating_sub(1)).rev() {
    let (head, tail) = levels.split_at_mut(l + 1);
    pyramid_ops::expand(&tail[0], &mut head[l], ExpandOp::Add, boundary);
  }
}

/// A Gaussian or Laplacian pyramid that may have been spilled to disk
/// because its total footprint crossed the memory budget.
pub enum PyramidStorage {
  InMemory(Pyramid<LPImage>),
  OnDisk { store: FileTileStore, shapes: Vec<(usize, usize)> },
}

impl PyramidStorage {
  /// Total bytes the in-memory representation of `pyramid` would occupy.
  pub fn footprint_bytes(pyramid: &Pyramid<LPImage>) -> usize {
    pyramid.levels.iter().map(|l| l.data.len() * std::mem::size_of::<LPPixel>()).sum()
  }

  /// Spill `pyramid` to a temp-file-backed [`TileStore`] if its footprint
  /// exceeds `budget_bytes`; otherwise keep it in memory untouched.
  pub fn from_pyramid(pyramid: Pyramid<LPImage>, budget_bytes: usize, temp_prefix: &str) -> Result<Self> {
    if Self::footprint_bytes(&pyramid) <= budget_bytes {
      return Ok(PyramidStorage::InMemory(pyramid));
    }

    let element_bytes = std::mem::size_of::<LPPixel>();
    let shapes: Vec<(usize, usize)> = pyramid.levels.iter().map(|l| (l.width, l.height)).collect();
    let max_row_bytes = shapes.iter().map(|&(w, _)| w * element_bytes).max().unwrap_or(0);
    let mut store = FileTileStore::create(temp_prefix, max_row_bytes.max(1))?;

    let mut offset = 0u64;
    for level in &pyramid.levels {
      for row in level.data.chunks(level.width) {
        let bytes = lp_row_to_bytes(row);
        store.write_at(offset, &bytes)?;
        offset += bytes.len() as u64;
      }
    }

    Ok(PyramidStorage::OnDisk { store, shapes })
  }

  /// Bring a pyramid back into memory for computation.
  pub fn materialize(&mut self) -> Result<Pyramid<LPImage>> {
    match self {
      PyramidStorage::InMemory(p) => Ok(p.clone()),
      PyramidStorage::OnDisk { store, shapes } => {
        let element_bytes = std::mem::size_of::<LPPixel>();
        let mut levels = Vec::with_capacity(shapes.len());
        let mut offset = 0u64;
        for &(w, h) in shapes.iter() {
          w.checked_mul(h)
            .ok_or_else(|| BlendError::OutOfMemory(format!("pyramid level {w}x{h} overflows address space")))?;
          let mut img = LPImage::new(w, h);
          for y in 0..h {
            let mut buf = vec![0u8; w * element_bytes];
            store.read_at(offset, &mut buf)?;
            offset += buf.len() as u64;
            img.row_mut(y).copy_from_slice(&bytes_to_lp_row(&buf)?);
          }
          levels.push(img);
        }
        Ok(Pyramid { levels })
      }
    }
  }
}

fn lp_row_to_bytes(row: &[LPPixel]) -> Vec<u8> {
  let mut out = Vec::with_capacity(row.len() * std::mem::size_of::<LPPixel>());
  for p in row {
    out.extend_from_slice(&p.r.to_le_bytes());
    out.extend_from_slice(&p.g.to_le_bytes());
    out.extend_from_slice(&p.b.to_le_bytes());
    out.extend_from_slice(&p.a.to_le_bytes());
  }
  out
}

fn channel_from_le_bytes(chunk: &[u8]) -> Result<i32> {
  let arr: [u8; 4] = chunk.try_into().map_err(|_| BlendError::Format("corrupt pyramid tile row".to_string()))?;
  Ok(i32::from_le_bytes(arr))
}

fn bytes_to_lp_row(bytes: &[u8]) -> Result<Vec<LPPixel>> {
  bytes
    .chunks(std::mem::size_of::<LPPixel>())
    .map(|chunk| {
      Ok(LPPixel {
        r: channel_from_le_bytes(&chunk[0..4])?,
        g: channel_from_le_bytes(&chunk[4..8])?,
        b: channel_from_le_bytes(&chunk[8..12])?,
        a: channel_from_le_bytes(&chunk[12..16])?,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pixel::Pixel;
  use rand::Rng;

  fn random_image(w: usize, h: usize) -> LPImage {
    let mut rng = rand::rng();
    let mut img = LPImage::new(w, h);
    for p in img.data.iter_mut() {
      let v: u8 = rng.random();
      *p = Pixel::new(v, v, v, 255).to_lp();
    }
    img
  }

  #[test]
  fn collapsing_a_laplacian_pyramid_reconstructs_the_source_within_one_lsb() {
    let src = random_image(128, 128);
    let mut pyramid = laplacian_pyramid(&src, None, 5, Boundary::Clamp);
    collapse_pyramid(&mut pyramid, Boundary::Clamp);
    for (a, b) in pyramid.levels[0].data.iter().zip(src.data.iter()) {
      let reconstructed = a.to_pixel();
      let original = b.to_pixel();
      assert!((reconstructed.r as i16 - original.r as i16).abs() <= 1);
      assert!((reconstructed.g as i16 - original.g as i16).abs() <= 1);
      assert!((reconstructed.b as i16 - original.b as i16).abs() <= 1);
    }
  }

  #[test]
  fn gaussian_pyramid_mask_stays_within_0_and_max() {
    let mut mask = MaskImage::new(32, 32);
    for y in 0..32 {
      for x in 0..32 {
        mask.set(x, y, if (x + y) % 7 == 0 { 255 } else { 0 });
      }
    }
    let pyramid = gaussian_pyramid_mask(&mask, 4, Boundary::Clamp);
    for level in &pyramid.levels {
      for &v in &level.data {
        assert!(v <= 255);
      }
    }
  }

  #[test]
  fn pyramid_levels_halve_with_ceiling_rounding() {
    let src = random_image(15, 9);
    let pyramid = gaussian_pyramid(&src, 4, Boundary::Clamp);
    assert_eq!((pyramid.levels[0].width, pyramid.levels[0].height), (15, 9));
    assert_eq!((pyramid.levels[1].width, pyramid.levels[1].height), (8, 5));
    assert_eq!((pyramid.levels[2].width, pyramid.levels[2].height), (4, 3));
    assert_eq!((pyramid.levels[3].width, pyramid.levels[3].height), (2, 2));
  }

  #[test]
  fn spilled_pyramid_materializes_back_to_the_same_values() {
    let src = random_image(32, 32);
    let pyramid = gaussian_pyramid(&src, 3, Boundary::Clamp);
    let mut storage = PyramidStorage::from_pyramid(pyramid.clone(), 0, "blend_pyramid_test_").unwrap();
    assert!(matches!(storage, PyramidStorage::OnDisk { .. }));
    let restored = storage.materialize().unwrap();
    for (level_a, level_b) in pyramid.levels.iter().zip(restored.levels.iter()) {
      assert_eq!(level_a.data, level_b.data);
    }
  }
}
