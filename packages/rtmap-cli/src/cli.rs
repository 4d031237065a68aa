use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rtmap",
    version,
    about = "Real-time read mapping dispatcher",
    long_about = "Multiplex per-channel reads onto a bounded pool of mapping workers.\n\
                  Reads are replayed from JSON-lines files; recorded alignments stand in\n\
                  for a live alignment engine."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map reads until every channel is drained
    Run(RunArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(long, env = "RTMAP_CONF")]
    pub conf: String,

    /// Read files or glob patterns (JSON lines)
    #[arg(long, required = true, num_args = 1..)]
    pub reads: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write records as JSON lines instead of PAF
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Milliseconds between scheduler ticks
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Suppress progress messages and the run summary on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// TOML configuration file
    #[arg(long, env = "RTMAP_CONF")]
    pub conf: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from([
            "rtmap", "run", "--conf", "rt.toml", "--reads", "a.jsonl", "b/*.jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.conf, "rt.toml");
                assert_eq!(args.reads, vec!["a.jsonl", "b/*.jsonl"]);
                assert_eq!(args.tick_interval_ms, 1);
                assert!(args.max_ticks.is_none());
                assert!(!args.json);
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_run_requires_reads() {
        assert!(Cli::try_parse_from(["rtmap", "run", "--conf", "rt.toml"]).is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let result = Cli::try_parse_from([
            "rtmap",
            "run",
            "--conf",
            "rt.toml",
            "--reads",
            "a.jsonl",
            "--tick-interval-ms",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_verbosity() {
        let cli =
            Cli::try_parse_from(["rtmap", "validate", "--conf", "rt.toml", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
