use thiserror::Error;

/// Alias to [`BlendError`].
pub type Error = BlendError;

/// The error taxonomy for the multiblend core.
#[derive(Error, Debug)]
pub enum BlendError {
  /// Reading or writing a [`crate::tile_store::TileStore`] backing file failed.
  #[error("temporary store IO error: {0}")]
  Io(#[from] std::io::Error),

  /// Two inputs disagree on canvas dimensions or channel layout.
  #[error("input format mismatch: {0}")]
  Format(String),

  /// An argument (CLI option or config value) was missing or out of range.
  #[error("invalid argument: {0}")]
  Args(String),

  /// An allocation for a row buffer, pyramid level, or tile store page failed.
  #[error("out of memory while allocating {0}")]
  OutOfMemory(String),

  /// An overlay's alpha is entirely transparent and adds nothing to the composite.
  ///
  /// Not fatal: callers should log this and continue with the next overlay.
  #[error("overlay is redundant, it contributes no pixels to the composite")]
  EmptyOverlay,

  /// A pyramid was asked to address a level past its length, or was empty.
  #[error("pyramid level {level} out of range (pyramid has {len} levels)")]
  LevelOutOfRange { level: usize, len: usize },
}

/// A specialized [`Result`] for multiblend operations.
pub type Result<T> = std::result::Result<T, BlendError>;
