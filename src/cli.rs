use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::filter::TAIL_PAGE_SIZE;
use crate::log::Level;
use crate::rest::Endpoint;
use crate::tail::TailSettings;

/// What the run does once authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Fetch,
    Tail,
    Stats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Plain,
    Json,
    Export(PathBuf),
}

/// Filter flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub level: Option<Level>,
    pub module: Option<String>,
    pub search: Option<String>,
    pub user: Option<String>,
    pub limit: usize,
    pub hours: u32,
}

/// Longest window accepted by `--hours` (ten years).
pub const MAX_HOURS: u32 = 87_600;

/// A value that must never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Immutable configuration used by the application runtime
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub email: String,
    pub password: Option<Secret>,
    pub filters: Filters,
    pub mode: Mode,
    pub output: Output,
    pub no_color: bool,
    pub tail: TailSettings,
    pub verbosity: u8,
}

/// User-facing CLI arguments (kept private to the CLI layer)
#[derive(Parser, Debug)]
#[command(name = "supalog", version, about = "Query, follow and summarise remote application logs")]
struct Args {
    /// Account email
    #[arg(short = 'e', long, env = "SUPALOG_EMAIL")]
    email: String,

    /// Account password (prompted for when omitted)
    #[arg(short = 'p', long, env = "SUPALOG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Project URL, e.g. https://<ref>.supabase.co
    #[arg(long, env = "SUPALOG_URL")]
    url: String,

    /// Public (anon) API key of the project
    #[arg(long, env = "SUPALOG_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// Only rows of this level
    #[arg(short = 'l', long, value_enum, ignore_case = true)]
    level: Option<Level>,

    /// Only rows from this module
    #[arg(short = 'm', long)]
    module: Option<String>,

    /// Case-insensitive substring of the message
    #[arg(short = 's', long)]
    search: Option<String>,

    /// Only rows of this user email
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Maximum rows to fetch
    #[arg(short = 'n', long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(1..=1000))]
    limit: u16,

    /// Window: rows from the last N hours
    #[arg(short = 'H', long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..=MAX_HOURS as i64))]
    hours: u32,

    /// Print JSON instead of formatted lines
    #[arg(long)]
    json: bool,

    /// Write the matching rows to FILE as JSON
    #[arg(long, value_name = "FILE", conflicts_with_all = ["tail", "stats"])]
    export: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long = "no-color")]
    no_color: bool,

    /// Follow new rows as they arrive (like tail -f)
    #[arg(short = 't', long, visible_alias = "follow", short_alias = 'f', conflicts_with = "stats")]
    tail: bool,

    /// Show window statistics instead of rows
    #[arg(long)]
    stats: bool,

    /// Seconds between tail polls
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Seconds to wait after a failed tail poll
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    retry_delay: u64,

    /// More diagnostics on stderr (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mode = if args.stats {
            Mode::Stats
        } else if args.tail {
            Mode::Tail
        } else {
            Mode::Fetch
        };
        let output = match (args.export, args.json) {
            (Some(path), _) => Output::Export(path),
            (None, true) => Output::Json,
            (None, false) => Output::Plain,
        };
        Config {
            endpoint: Endpoint::new(&args.url, &args.anon_key),
            email: args.email,
            password: args.password.map(Secret),
            filters: Filters {
                level: args.level,
                module: args.module,
                search: args.search,
                user: args.user,
                limit: usize::from(args.limit),
                hours: args.hours,
            },
            mode,
            output,
            no_color: args.no_color,
            tail: TailSettings {
                interval: Duration::from_secs(args.poll_interval),
                retry_delay: Duration::from_secs(args.retry_delay),
                page_size: TAIL_PAGE_SIZE,
            },
            verbosity: args.verbose,
        }
    }
}

/// Parse CLI options into an application Config
pub fn parse() -> Config {
    Args::parse().into()
}
