//! Multiresolution spline blending core for seamless panorama composites.
//!
//! Given a sequence of pre-aligned, same-size RGBA images with per-pixel
//! alpha, [`driver::Compositor`] blends them into a single composite free of
//! visible seams across a full band of spatial frequencies, the way
//! Burt-Adelson pyramid blending always has: a binary mask over the overlap
//! of each (composite, overlay) pair, a Laplacian pyramid of each image and
//! a Gaussian pyramid of the mask, combined band-by-band and collapsed back
//! to an image.
//!
//! # Example
//!
//! ```rust
//! use multiblend::config::ConfigBuilder;
//! use multiblend::driver::{Compositor, Image};
//! use multiblend::pixel::Pixel;
//!
//! let config = ConfigBuilder::default().build().unwrap();
//! let compositor = Compositor::new(config);
//!
//! let base = Image { width: 4, height: 4, pixels: vec![Pixel::new(200, 0, 0, 255); 16] };
//! let overlay = Image { width: 4, height: 4, pixels: vec![Pixel::TRANSPARENT; 16] };
//!
//! let (composite, _reports) = compositor.composite(vec![base, overlay]).unwrap();
//! assert_eq!(composite.width, 4);
//! ```
//!
//! File I/O, the CLI surface, and the optional parallel-execution backend
//! live outside this crate; see the `multiblend-cli` binary.

pub mod config;
pub mod driver;
pub mod error;
pub mod filter_width;
pub mod geometry;
pub mod mask;
pub mod parallel;
pub mod pixel;
pub mod pyramid;
pub mod pyramid_ops;
pub mod tile_store;

pub use config::{Config, ConfigBuilder};
pub use driver::{Compositor, Image, OverlayReport, SkipReason, StepOutcome};
pub use error::{BlendError as Error, Result};
