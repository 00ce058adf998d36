//! The command-line switch surface.
//!
//! The outer driver binary owns parsing and file handling; this module
//! only defines the switches the pipeline consumes and their mapping to
//! `Options`.

use clap::Parser;
use rustc_hash::FxHashSet;
use strudel_common::options::Options;

#[derive(Debug, Parser)]
#[command(name = "strudel", about = "Datalog compiler")]
pub struct Cli {
    /// Number of parallel evaluation jobs.
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Enable profiling instrumentation, optionally naming the log file.
    #[arg(
        long,
        value_name = "path",
        num_args = 0..=1,
        default_missing_value = "profile.log"
    )]
    pub profile: Option<String>,

    /// Write the debug report to the given path.
    #[arg(long = "debug-report", value_name = "path")]
    pub debug_report: Option<String>,

    /// Print internal analysis listings
    /// (e.g. `type-analysis`, `precedence-graph`).
    #[arg(long, value_name = "listing", value_delimiter = ',')]
    pub show: Vec<String>,

    /// Suppress warnings for the listed relations, or `*` for all.
    #[arg(long = "suppress-warnings", value_name = "rel", value_delimiter = ',')]
    pub suppress_warnings: Vec<String>,

    /// Enable the legacy, weaker kind check at sink positions.
    #[arg(long)]
    pub legacy: bool,

    /// Suppress all warnings.
    #[arg(long = "no-warn")]
    pub no_warn: bool,

    /// Directories searched for functor libraries.
    #[arg(long = "library-dir", value_name = "dir")]
    pub library_dir: Vec<String>,

    /// Functor libraries to bind at evaluation time.
    #[arg(long, value_name = "name", value_delimiter = ',')]
    pub libraries: Vec<String>,
}

impl Cli {
    /// The pipeline options corresponding to these switches.
    #[must_use]
    pub fn to_options(&self) -> Options {
        Options {
            jobs: self.jobs,
            profile: self.profile.clone(),
            debug_report: self.debug_report.clone(),
            show: self.show.iter().cloned().collect::<FxHashSet<_>>(),
            suppress_warnings: self
                .suppress_warnings
                .iter()
                .cloned()
                .collect::<FxHashSet<_>>(),
            legacy: self.legacy,
            no_warn: self.no_warn,
            library_dirs: self.library_dir.clone(),
            libraries: self.libraries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switches_map_to_options() {
        let cli = Cli::parse_from([
            "strudel",
            "--jobs",
            "4",
            "--profile",
            "--suppress-warnings",
            "a,b",
            "--legacy",
            "--show",
            "type-analysis",
        ]);
        let options = cli.to_options();
        assert_eq!(options.jobs, 4);
        assert_eq!(options.profile.as_deref(), Some("profile.log"));
        assert!(options.legacy);
        assert!(options.warnings_suppressed_for("a"));
        assert!(!options.warnings_suppressed_for("c"));
        assert!(options.shows("type-analysis"));
    }

    #[test]
    fn star_suppresses_everything() {
        let cli = Cli::parse_from(["strudel", "--suppress-warnings", "*"]);
        let options = cli.to_options();
        assert!(options.warnings_suppressed_for("anything"));
    }
}
