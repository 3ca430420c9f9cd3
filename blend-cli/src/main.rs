//! CLI surface for the multiresolution spline blending core (spec §6): a
//! thin binary wiring argument parsing, image file I/O, and verbosity
//! reporting around [`multiblend::driver::Compositor`]. None of this is
//! part of the core; see the `multiblend` library crate for that.

mod args;
mod io;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use multiblend::config::{AssemblyMode, Config, ConfigBuilder};
use multiblend::driver::{Compositor, Image, SkipReason, StepOutcome};
use multiblend::error::BlendError;
use multiblend::pyramid_ops::Boundary;
use tracing::{info, warn};

use args::Cli;

fn init_logging(verbose: u8) {
  use tracing_subscriber::EnvFilter;

  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
}

/// Removes the output file on an unwinding error path, mirroring spec §7
/// "On fatal error ... the output file, if already opened, is removed."
/// Disarmed once the blend finishes successfully.
struct OutputGuard {
  path: PathBuf,
  armed: bool,
}

impl OutputGuard {
  fn new(path: PathBuf) -> Self {
    OutputGuard { path, armed: true }
  }

  fn disarm(mut self) {
    self.armed = false;
  }
}

impl Drop for OutputGuard {
  fn drop(&mut self) {
    if self.armed {
      let _ = std::fs::remove_file(&self.path);
    }
  }
}

fn report_outcome(report: &multiblend::driver::OverlayReport) {
  match report.outcome {
    StepOutcome::Blended { ubb, roi, levels } => {
      info!(overlay = report.index, ?ubb, ?roi, levels, "blended overlay into composite");
    }
    StepOutcome::Skipped { reason: SkipReason::EmptyOverlay } => {
      warn!(overlay = report.index, "overlay contributed no pixels and was skipped");
    }
    StepOutcome::Skipped { reason: SkipReason::ZeroLevels } => {
      warn!(overlay = report.index, "overlay needed no blending; copied verbatim");
    }
  }
}

fn run(cli: Cli) -> anyhow::Result<()> {
  if cli.help {
    use clap::CommandFactory;
    eprintln!("{}", Cli::command().render_long_help());
    anyhow::bail!(BlendError::Args("usage requested via -h".to_string()));
  }

  if !(0.0..=1.0).contains(&cli.stitch_mismatch_threshold) {
    anyhow::bail!(BlendError::Args(format!(
      "stitch mismatch threshold {} outside [0.0, 1.0]",
      cli.stitch_mismatch_threshold
    )));
  }

  let output_path = cli.output.clone().ok_or_else(|| BlendError::Args("missing required output path (-o)".to_string()))?;

  if cli.inputs.is_empty() {
    anyhow::bail!(BlendError::Args("no input images supplied".to_string()));
  }

  if let Some(levels) = cli.levels {
    if levels == 0 {
      anyhow::bail!(BlendError::Args("-l must be at least 1".to_string()));
    }
  }

  init_logging(cli.verbose);

  let mut images = Vec::with_capacity(cli.inputs.len());
  let mut first: Option<Image> = None;
  for path in &cli.inputs {
    let image = io::load_image(path).with_context(|| format!("reading {}", path.display()))?;
    match &first {
      None => first = Some(image.clone()),
      Some(first_image) => io::check_matches_first(first_image, &image, path)?,
    }
    images.push(image);
  }

  let mut builder = ConfigBuilder::default();
  builder.boundary(if cli.wraparound { Boundary::Wraparound } else { Boundary::Clamp });
  builder.assembly_mode(if cli.one_at_a_time { AssemblyMode::OneAtATime } else { AssemblyMode::PreUnion });
  builder.stitch_mismatch_threshold(cli.stitch_mismatch_threshold);
  if let Some(levels) = cli.levels {
    builder.max_levels(levels);
  }
  let config = Config::build(builder)?;

  let compositor = Compositor::new(config);
  let (composite, reports) = compositor.composite(images)?;

  for report in &reports {
    report_outcome(report);
  }

  let guard = OutputGuard::new(output_path.clone());
  io::save_image(&output_path, &composite).with_context(|| format!("writing {}", output_path.display()))?;
  guard.disarm();

  Ok(())
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("multiblend: {err:#}");
      ExitCode::FAILURE
    }
  }
}
