//! Command line parsing. Only one flag is required; everything else has a
//! clamped default so the process is forgiving of an orchestrator that
//! passes an out-of-range value rather than refusing to start.
//!
//! Unknown flags are a documented non-fatal condition (they are logged and
//! ignored, not rejected), which is not `clap`'s own default behavior for
//! an unrecognized argument - [`parse_tolerant`] filters argv down to the
//! flags this binary actually understands before handing the rest to
//! `clap`, so a renamed or future-orchestrator flag never aborts startup.

use clap::Parser;

const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=120;
const QUALITY_RANGE: std::ops::RangeInclusive<f32> = 0.1..=1.0;

const VALUE_FLAGS: &[&str] = &["--udid", "--fps", "--quality", "--port"];
const BOOL_FLAGS: &[&str] = &["--help", "-h", "--version", "-V"];

#[derive(Parser, Debug)]
#[command(name = "simulator-server")]
#[command(version, about = "Streams a running iOS Simulator's framebuffer as MJPEG and injects touch input", long_about = None)]
pub struct CliArgs {
    /// UDID of the simulator device to attach to
    #[arg(long, value_name = "UUID")]
    udid: String,

    /// Target capture frame rate, clamped to [1, 120]
    #[arg(long, value_name = "N", default_value_t = 60)]
    fps: u32,

    /// JPEG encode quality, clamped to [0.1, 1.0]
    #[arg(long, value_name = "Q", default_value_t = 0.7)]
    quality: f32,

    /// HTTP port to bind on loopback; 0 picks an ephemeral port
    #[arg(long, value_name = "PORT", default_value_t = 0)]
    port: u16,
}

/// Clamped, ready-to-use configuration derived from [`CliArgs`].
#[derive(Debug, Clone)]
pub struct Config {
    pub udid: String,
    pub fps: u32,
    pub quality: f32,
    pub port: u16,
}

impl CliArgs {
    pub fn into_config(self) -> Config {
        Config {
            udid: self.udid,
            fps: self.fps.clamp(*FPS_RANGE.start(), *FPS_RANGE.end()),
            quality: self.quality.clamp(*QUALITY_RANGE.start(), *QUALITY_RANGE.end()),
            port: self.port,
        }
    }
}

/// Drop any argv token that isn't one of this binary's recognized flags,
/// logging one warning per dropped token. A recognized value-taking flag
/// also consumes the token that follows it; an unrecognized token is
/// dropped on its own, since its arity isn't known.
fn strip_unknown_flags<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut kept = Vec::new();
    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            kept.push(arg);
            if let Some(value) = iter.next() {
                kept.push(value);
            }
        } else if BOOL_FLAGS.contains(&arg.as_str()) {
            kept.push(arg);
        } else {
            tracing::warn!(flag = %arg, "unrecognized command line flag ignored");
        }
    }
    kept
}

/// Parse `argv[1..]` (excluding the program name), tolerating unknown
/// flags per the CLI contract. Exits the process directly: `--help`/
/// `--version` print and exit 0; a genuine usage error such as a missing
/// `--udid` prints usage to stderr and exits 1, per §6/§7's `BadArgument`
/// contract (`clap::Error::exit()` would use exit code 2 for the latter,
/// which the spec does not allow).
pub fn parse_tolerant<I: IntoIterator<Item = String>>(args: I) -> Config {
    let mut full = vec!["simulator-server".to_string()];
    full.extend(strip_unknown_flags(args));

    match CliArgs::try_parse_from(full) {
        Ok(args) => args.into_config(),
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            eprint!("{e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut full = vec!["simulator-server"];
        full.extend_from_slice(args);
        CliArgs::parse_from(full).into_config()
    }

    #[test]
    fn fps_zero_clamps_to_one() {
        assert_eq!(parse(&["--udid", "abc", "--fps", "0"]).fps, 1);
    }

    #[test]
    fn fps_above_range_clamps_to_120() {
        assert_eq!(parse(&["--udid", "abc", "--fps", "999"]).fps, 120);
    }

    #[test]
    fn quality_zero_clamps_to_tenth() {
        assert_eq!(parse(&["--udid", "abc", "--quality", "0"]).quality, 0.1);
    }

    #[test]
    fn quality_above_one_clamps_to_one() {
        assert_eq!(parse(&["--udid", "abc", "--quality", "2"]).quality, 1.0);
    }

    #[test]
    fn port_zero_is_preserved_for_ephemeral_binding() {
        assert_eq!(parse(&["--udid", "abc", "--port", "0"]).port, 0);
    }

    #[test]
    fn missing_udid_is_a_parse_error() {
        let result = CliArgs::try_parse_from(["simulator-server"]);
        assert!(result.is_err());
    }

    #[test]
    fn in_range_values_pass_through_unchanged() {
        let cfg = parse(&["--udid", "abc", "--fps", "45", "--quality", "0.6"]);
        assert_eq!(cfg.fps, 45);
        assert_eq!(cfg.quality, 0.6);
    }

    #[test]
    fn default_fps_and_quality_match_session_parameter_defaults() {
        let cfg = parse(&["--udid", "abc"]);
        assert_eq!(cfg.fps, 60);
        assert_eq!(cfg.quality, 0.7);
    }

    #[test]
    fn unknown_flags_are_stripped_not_rejected() {
        let kept = strip_unknown_flags(
            vec!["--udid", "abc", "--bogus", "value", "--fps", "30"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(kept, vec!["--udid", "abc", "--fps", "30"]);
    }

    #[test]
    fn unknown_boolean_style_flag_is_dropped_alone() {
        let kept = strip_unknown_flags(
            vec!["--udid", "abc", "--verbose"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(kept, vec!["--udid", "abc"]);
    }
}
