//! The authoritative CLI option list from spec §6, parsed with `clap`'s
//! derive API (already a dependency of the teacher's server crate).
//!
//! `-h` deliberately does not follow the GNU convention of "print usage and
//! exit 0": per spec it prints usage and exits non-zero, matching the
//! original tool's own `-h` behaviour. Clap's automatic `--help`/`-h`
//! handling is disabled so that path can be implemented explicitly in
//! `main`.

use std::path::PathBuf;

use clap::Parser;

/// Multiresolution spline blending of pre-aligned, same-size raster images.
#[derive(Parser, Debug)]
#[command(name = "multiblend", disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
  /// Output file path.
  #[arg(short = 'o', value_name = "PATH")]
  pub output: Option<PathBuf>,

  /// Cap on pyramid depth (must be >= 1).
  #[arg(short = 'l', value_name = "N")]
  pub levels: Option<u32>,

  /// Process overlays one at a time rather than pre-unioning.
  #[arg(short = 's')]
  pub one_at_a_time: bool,

  /// Enable horizontal wraparound.
  #[arg(short = 'w')]
  pub wraparound: bool,

  /// Increase verbosity; repeatable.
  #[arg(short = 'v', action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Reserved stitch-mismatch threshold, must lie in [0.0, 1.0]. Accepted
  /// and range-checked; otherwise inert (spec §9 Open Questions).
  #[arg(short = 't', value_name = "FLOAT", default_value_t = 0.0)]
  pub stitch_mismatch_threshold: f64,

  /// Print usage and exit non-zero.
  #[arg(short = 'h', action = clap::ArgAction::SetTrue)]
  pub help: bool,

  /// Input file paths, in the order they are blended.
  pub inputs: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_the_full_option_set() {
    let cli = Cli::parse_from(["multiblend", "-o", "out.png", "-l", "4", "-s", "-w", "-v", "-v", "-t", "0.5", "a.png", "b.png"]);
    assert_eq!(cli.output, Some(PathBuf::from("out.png")));
    assert_eq!(cli.levels, Some(4));
    assert!(cli.one_at_a_time);
    assert!(cli.wraparound);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.stitch_mismatch_threshold, 0.5);
    assert_eq!(cli.inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
  }

  #[test]
  fn missing_output_parses_fine_and_is_validated_later() {
    let cli = Cli::parse_from(["multiblend", "a.png", "b.png"]);
    assert_eq!(cli.output, None);
  }

  #[test]
  fn help_flag_is_captured_rather_than_handled_by_clap() {
    let cli = Cli::parse_from(["multiblend", "-h"]);
    assert!(cli.help);
  }
}
