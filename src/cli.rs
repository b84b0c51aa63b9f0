use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Values taken from the command line. Anything left unset falls back to the
/// environment (see `Config::load`).
#[derive(Debug, Default, Clone)]
pub struct CliOptions {
    pub log_level: Option<String>,
    pub version: bool,
    pub tokens: Vec<PathBuf>,
    pub metrics_port: Option<String>,
    pub host: Option<String>,
    pub prom_only: bool,
    pub influx_url: Option<String>,
    pub influx_database: Option<String>,
    pub influx_user: Option<String>,
    pub influx_password: Option<String>,
}

pub fn build_cli() -> Command {
    Command::new("token-counter")
        .about("Count usage of GitHub API tokens")
        .disable_version_flag(true)
        .arg(
            Arg::new("token")
                .long("token")
                .num_args(1)
                .action(ArgAction::Append)
                .value_delimiter(',')
                .help("Token file to track (repeatable or comma separated)"),
        )
        .arg(
            Arg::new("metrics-port")
                .long("metrics-port")
                .num_args(1)
                .help("Port to listen on for prometheus metrics scraping [default: 9090]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .num_args(1)
                .help("Host address to listen on for prometheus metrics scraping"),
        )
        .arg(
            Arg::new("prom-only")
                .long("prom-only")
                .help("Only expose prometheus metrics, don't push to influxdb")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("influx-url")
                .long("influx-url")
                .num_args(1)
                .help("InfluxDB base URL (env: INFLUX_URL)"),
        )
        .arg(
            Arg::new("influx-database")
                .long("influx-database")
                .num_args(1)
                .help("InfluxDB database (env: INFLUX_DATABASE)"),
        )
        .arg(
            Arg::new("influx-user")
                .long("influx-user")
                .num_args(1)
                .help("InfluxDB user (env: INFLUX_USER)"),
        )
        .arg(
            Arg::new("influx-password")
                .long("influx-password")
                .num_args(1)
                .help("InfluxDB password (env: INFLUX_PASSWORD)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

impl CliOptions {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let string = |name: &str| matches.get_one::<String>(name).cloned();
        Self {
            log_level: string("log-level"),
            version: matches.get_flag("version"),
            tokens: matches
                .get_many::<String>("token")
                .map(|vals| vals.map(PathBuf::from).collect())
                .unwrap_or_default(),
            metrics_port: string("metrics-port"),
            host: string("host"),
            prom_only: matches.get_flag("prom-only"),
            influx_url: string("influx-url"),
            influx_database: string("influx-database"),
            influx_user: string("influx-user"),
            influx_password: string("influx-password"),
        }
    }
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, then RUST_LOG, then info.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
