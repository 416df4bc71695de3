use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use ulog_trace::UlogError;
use ulog_trace::config::{self, Config};
use ulog_trace::emit::{Fanout, GraphiteEmitter, JsonEmitter, TableEmitter};
use ulog_trace::follow::{LogFollower, StartPosition};
use ulog_trace::report::ReportingCycle;
use ulog_trace::styling::{
    eprintln, error_message, hint_message, info_message, print, println, warning_message,
};
use ulog_trace::trace::{
    ServiceStore, Snapshot, analyze_reader, render, render_dot, service_rows,
};

/// Correlate Tuxedo ULOG trace records into per-service timings.
///
/// Turn tracing on in the domain with `TMTRACE=*:ulog` (or `chtr` in
/// tmadmin), then follow the live ULOG or analyze a finished one.
#[derive(Parser)]
#[command(name = "ulog-trace", version, about)]
struct Cli {
    /// Config file (default: <config dir>/ulog-trace/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tail today's ULOG and report statistics every window
    Follow(FollowArgs),

    /// Print a per-service timing table for a finished ULOG
    Timing {
        /// ULOG file, or `-` for stdin
        #[arg(default_value = "-")]
        file: PathBuf,

        /// Print the statistics as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the service call graph of a finished ULOG as Graphviz DOT
    Graph {
        /// ULOG file, or `-` for stdin
        #[arg(default_value = "-")]
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct FollowArgs {
    /// ULOG path without the .MMDDYY suffix (default: ULOGPFX, then $APPDIR/ULOG)
    #[arg(long, value_name = "PATH")]
    prefix: Option<PathBuf>,

    /// Reporting window, e.g. `30s` or `5m`
    #[arg(long, value_parser = humantime::parse_duration)]
    window: Option<Duration>,

    /// How long to sleep when the log has nothing new
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Send each window to a Graphite plaintext listener
    #[arg(long, value_name = "HOST:PORT")]
    graphite: Option<String>,

    /// Print each window as a JSON array of metrics instead of a table
    #[arg(long)]
    json: bool,

    /// First segment of every metric name
    #[arg(long)]
    namespace: Option<String>,

    /// Read today's log from the beginning instead of only new lines
    #[arg(long)]
    from_start: bool,

    /// Give up after this many consecutive failures to open the log
    #[arg(long, value_name = "N")]
    max_open_retries: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(path) = cli.config {
        config::set_config_path(path);
    }

    let result = match cli.command {
        Command::Follow(args) => handle_follow(args),
        Command::Timing { file, json } => handle_timing(&file, json),
        Command::Graph { file, output } => handle_graph(&file, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{}", error_message(format!("{e:#}")));
        if let Some(UlogError::MissingPrefix) = e.downcast_ref::<UlogError>() {
            eprintln!(
                "{}",
                hint_message("Pass --prefix, or set ulog-prefix in the config file")
            );
        }
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

fn handle_follow(args: FollowArgs) -> anyhow::Result<()> {
    let mut config = Config::load_resolved()?;
    if let Some(window) = args.window
        && window.subsec_nanos() != 0
    {
        eprintln!(
            "{}",
            warning_message(format!(
                "Windows are whole seconds; using {}s",
                window.as_secs()
            ))
        );
    }
    apply_follow_args(&mut config, args.prefix, args.window, args.poll_interval);
    if let Some(namespace) = args.namespace {
        config.namespace = namespace;
    }
    if args.from_start {
        config.start_at = StartPosition::Beginning;
    }
    if args.max_open_retries.is_some() {
        config.max_open_retries = args.max_open_retries;
    }
    if config.window().is_zero() {
        bail!("Reporting window must be longer than zero");
    }
    if config.max_idle_windows == 0 {
        bail!("max-idle-windows must be at least 1");
    }

    let mut emitters = Fanout::new();
    if args.json {
        emitters.push(Box::new(JsonEmitter::new(io::stdout(), config.namespace.clone())));
    } else {
        emitters.push(Box::new(TableEmitter::new(io::stdout())));
    }
    let graphite = args
        .graphite
        .or_else(|| config.graphite.as_ref().map(|g| g.address.clone()));
    if let Some(address) = graphite {
        emitters.push(Box::new(GraphiteEmitter::new(address, config.namespace.clone())));
    }

    let mut follower = LogFollower::new(config.follow_config()?);
    eprintln!(
        "{}",
        info_message(format!(
            "Following {} every {}",
            follower.path().display(),
            humantime::format_duration(config.window())
        ))
    );

    let mut cycle = ReportingCycle::new(config.window());
    let windows = cycle.run(
        &mut follower,
        &mut config.tracker(),
        &mut ServiceStore::new(),
        &mut emitters,
    );
    log::info!("Stopped after {windows} reports");

    bail!("Log {} can no longer be read", follower.path().display())
}

fn apply_follow_args(
    config: &mut Config,
    prefix: Option<PathBuf>,
    window: Option<Duration>,
    poll_interval: Option<Duration>,
) {
    if prefix.is_some() {
        config.ulog_prefix = prefix;
    }
    if let Some(window) = window {
        config.window_secs = window.as_secs();
    }
    if let Some(poll) = poll_interval {
        config.poll_interval_ms = u64::try_from(poll.as_millis()).unwrap_or(u64::MAX);
    }
}

fn handle_timing(file: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot = read_snapshot(file)?;
    if json {
        let out = serde_json::to_string_pretty(&snapshot).context("Failed to serialize statistics")?;
        println!("{out}");
        return Ok(());
    }

    let rows = service_rows(&snapshot);
    if rows.is_empty() {
        bail!(
            "No completed service calls in {}; is TMTRACE=*:ulog set in the domain?",
            display_input(file)
        );
    }
    print!("{}", render(&rows));
    Ok(())
}

fn handle_graph(file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let dot = render_dot(&read_snapshot(file)?);
    match output {
        Some(path) => std::fs::write(path, dot)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{dot}"),
    }
    Ok(())
}

fn read_snapshot(file: &Path) -> anyhow::Result<Snapshot> {
    if file == Path::new("-") {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            bail!("No input: pass a ULOG file or pipe one to stdin");
        }
        return analyze_reader(stdin.lock()).context("Failed to read stdin");
    }

    let f = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    analyze_reader(BufReader::new(f)).with_context(|| format!("Failed to read {}", file.display()))
}

fn display_input(file: &Path) -> String {
    if file == Path::new("-") {
        "stdin".to_string()
    } else {
        file.display().to_string()
    }
}
