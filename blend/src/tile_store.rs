//! Out-of-core random-access backing store for pyramids and masks that may
//! exceed available memory (component C2).

use std::io::{Read, Seek, SeekFrom, Write};

use tempfile::NamedTempFile;

use crate::error::{BlendError, Result};

/// Random-access, row-oriented backing store. A handle is unique-ownership:
/// moving it out of scope (or calling [`TileStore::release`] explicitly)
/// must release the underlying resource, including on an unwinding panic.
///
/// Access is predominantly sequential in `y`, with occasional
/// level-indexed random access for pyramid storage, so implementations need
/// not optimize arbitrary-offset access.
pub trait TileStore {
  /// Number of bytes in one row.
  fn row_width(&self) -> usize;

  /// Write `bytes` (must be exactly [`TileStore::row_width`] long) as row `y`.
  fn write_row(&mut self, y: u64, bytes: &[u8]) -> Result<()>;

  /// Read row `y` into `buf` (must be exactly [`TileStore::row_width`] long).
  fn read_row(&mut self, y: u64, buf: &mut [u8]) -> Result<()>;

  /// Write `bytes` at an arbitrary byte offset, for level-indexed pyramid
  /// access that does not fit the row model.
  fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

  /// Read `buf.len()` bytes starting at `offset`.
  fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

  /// Explicitly release the backing resource. Consumes the handle so it
  /// cannot be used afterward; dropping without calling this still releases
  /// the resource as a safety net.
  fn release(self) -> Result<()>;
}

/// A [`TileStore`] backed by a named temporary file. The file is created
/// empty and grows as rows are appended; it is deleted when [`release`] is
/// called, or automatically on drop (including during an unwinding panic),
/// whichever comes first.
///
/// [`release`]: TileStore::release
pub struct FileTileStore {
  file: Option<NamedTempFile>,
  row_width: usize,
}

impl FileTileStore {
  /// Create a new file-backed store. `prefix` names the temp file (the
  /// enblend convention of `.enblend_mask_XXXXXX`-style templates, ported to
  /// `tempfile`'s builder API) so a directory listing during a long blend
  /// still identifies which store is which.
  pub fn create(prefix: &str, row_width: usize) -> Result<Self> {
    let file = tempfile::Builder::new().prefix(prefix).suffix(".tmp").tempfile()?;
    Ok(FileTileStore { file: Some(file), row_width })
  }

  fn file_mut(&mut self) -> Result<&mut NamedTempFile> {
    self.file.as_mut().ok_or_else(|| BlendError::Args("tile store used after release".to_string()))
  }
}

impl TileStore for FileTileStore {
  fn row_width(&self) -> usize {
    self.row_width
  }

  fn write_row(&mut self, y: u64, bytes: &[u8]) -> Result<()> {
    debug_assert_eq!(bytes.len(), self.row_width);
    self.write_at(y * self.row_width as u64, bytes)
  }

  fn read_row(&mut self, y: u64, buf: &mut [u8]) -> Result<()> {
    debug_assert_eq!(buf.len(), self.row_width);
    self.read_at(y * self.row_width as u64, buf)
  }

  fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
    let f = self.file_mut()?;
    f.seek(SeekFrom::Start(offset))?;
    f.write_all(bytes)?;
    Ok(())
  }

  fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
    let f = self.file_mut()?;
    f.seek(SeekFrom::Start(offset))?;
    f.read_exact(buf)?;
    Ok(())
  }

  fn release(mut self) -> Result<()> {
    if let Some(file) = self.file.take() {
      file.close().map_err(BlendError::Io)?;
    }
    Ok(())
  }
}

/// A [`TileStore`] backed by an in-memory buffer, used for small images
/// where spilling to disk only adds overhead, and by tests.
pub struct MemoryTileStore {
  data: Vec<u8>,
  row_width: usize,
}

impl MemoryTileStore {
  pub fn create(row_width: usize) -> Self {
    MemoryTileStore { data: Vec::new(), row_width }
  }

  fn ensure_len(&mut self, end: usize) {
    if self.data.len() < end {
      self.data.resize(end, 0);
    }
  }
}

impl TileStore for MemoryTileStore {
  fn row_width(&self) -> usize {
    self.row_width
  }

  fn write_row(&mut self, y: u64, bytes: &[u8]) -> Result<()> {
    debug_assert_eq!(bytes.len(), self.row_width);
    self.write_at(y * self.row_width as u64, bytes)
  }

  fn read_row(&mut self, y: u64, buf: &mut [u8]) -> Result<()> {
    debug_assert_eq!(buf.len(), self.row_width);
    self.read_at(y * self.row_width as u64, buf)
  }

  fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
    let start = offset as usize;
    let end = start + bytes.len();
    self.ensure_len(end);
    self.data[start..end].copy_from_slice(bytes);
    Ok(())
  }

  fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
    let start = offset as usize;
    let end = start + buf.len();
    self.ensure_len(end);
    buf.copy_from_slice(&self.data[start..end]);
    Ok(())
  }

  fn release(self) -> Result<()> {
    Ok(())
  }
}
