//! Image file decode/encode (collaborator, spec §6/§2.4): the out-of-core
//! core only ever sees plain RGBA8 buffers, so this module is the entire
//! boundary between the filesystem and [`multiblend::driver::Image`].
//!
//! PNG stands in for the original's libtiff-based I/O; spec §1 explicitly
//! scopes "image-file decoding/encoding" and "output formats other than the
//! chosen raster format" out of the core, so the CLI picks one supported
//! format rather than reimplementing TIFF.

use std::path::Path;

use multiblend::driver::Image;
use multiblend::error::{BlendError, Result};

/// Decode a PNG/JPEG/etc. file (anything the `image` crate's enabled
/// decoders support) into an RGBA8 [`Image`].
pub fn load_image(path: &Path) -> Result<Image> {
  let decoded = image::open(path).map_err(|err| BlendError::Io(std::io::Error::other(format!("{}: {err}", path.display()))))?;
  let rgba = decoded.to_rgba8();
  let (width, height) = rgba.dimensions();
  Image::from_rgba8(width as usize, height as usize, rgba.as_raw())
}

/// Validate that `other` shares input #1's canvas dimensions before it ever
/// reaches the blending core (spec §7 `ErrFormat`).
pub fn check_matches_first(first: &Image, other: &Image, path: &Path) -> Result<()> {
  if first.width != other.width || first.height != other.height {
    return Err(BlendError::Format(format!(
      "{} is {}x{}, expected {}x{} to match the first input",
      path.display(),
      other.width,
      other.height,
      first.width,
      first.height
    )));
  }
  Ok(())
}

/// Encode an RGBA8 composite as a PNG at `path`. Orientation is top-left,
/// 4 samples per pixel at 8 bits each, channel 4 as associated alpha, per
/// spec §6's output-image contract.
pub fn save_image(path: &Path, composite: &Image) -> Result<()> {
  let buffer = image::RgbaImage::from_raw(composite.width as u32, composite.height as u32, composite.to_rgba8())
    .ok_or_else(|| BlendError::Format("composite buffer size does not match its own dimensions".to_string()))?;
  buffer.save(path).map_err(|err| BlendError::Io(std::io::Error::other(format!("{}: {err}", path.display()))))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mismatched_dimensions_are_rejected_before_blending() {
    let first = Image { width: 4, height: 4, pixels: vec![Default::default(); 16] };
    let other = Image { width: 8, height: 4, pixels: vec![Default::default(); 32] };
    let err = check_matches_first(&first, &other, Path::new("b.png")).unwrap_err();
    assert!(matches!(err, BlendError::Format(_)));
  }

  #[test]
  fn round_trips_through_a_temp_png_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.png");
    let image = Image {
      width: 3,
      height: 2,
      pixels: vec![
        multiblend::pixel::Pixel::new(10, 20, 30, 255),
        multiblend::pixel::Pixel::new(40, 50, 60, 255),
        multiblend::pixel::Pixel::new(70, 80, 90, 255),
        multiblend::pixel::Pixel::new(100, 110, 120, 128),
        multiblend::pixel::Pixel::new(130, 140, 150, 0),
        multiblend::pixel::Pixel::new(160, 170, 180, 255),
      ],
    };
    save_image(&path, &image).unwrap();
    let reloaded = load_image(&path).unwrap();
    assert_eq!(reloaded.pixels, image.pixels);
  }
}
