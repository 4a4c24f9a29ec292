//! procman CLI entry point.
//!
//! Without a subcommand procman runs the interactive refresh loop. The
//! other subcommands take one snapshot (or one batch of signals) and exit.

use clap::{Args, Parser, Subcommand};
use pm_common::{format_error_human, OutputFormat};
use pm_core::action::{parse_pid_list, terminate_many, SignalConfig, SignalTerminator};
use pm_core::collect::{
    list_processes, ProcessCpuTracker, PsProcessSource, ScanOptions, Snapshot,
};
use pm_core::config::{
    load_config, Config, ConfigError, ConfigOptions, ConfigOverrides, ResolvedConfig, ENV_CONFIG,
};
use pm_core::controller::{Capabilities, Controller, ControllerSettings, ThreadSleeper};
use pm_core::exit_codes::ExitCode;
use pm_core::export::{ExportFormat, Exporter};
use pm_core::logging::{event_names, generate_run_id, init_logging, LogConfig, LogFormat};
use pm_core::render::{render_json, render_lines, render_markdown, render_summary, Palette};
use pm_core::select::{build_chooser, ChooserKind, TerminalOperator};
use pm_core::session::Session;
use pm_core::view::{project, FilterSpec, SortKey};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gap between the two scans a one-shot snapshot takes to measure CPU usage.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "procman")]
#[command(author, version, about = "Interactive process monitor", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to a TOML config file
    #[arg(long, global = true, env = ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Seconds between refreshes
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Sort key: pid, name, memory or cpu
    #[arg(short, long, global = true)]
    sort: Option<SortKey>,

    /// Filter as field=value (status, name or owner)
    #[arg(short, long, global = true)]
    filter: Option<String>,

    /// How a process is picked from the list
    #[arg(long, global = true, value_enum)]
    chooser: Option<ChooserKind>,

    /// Directory for exported process lists
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    /// Leave kernel threads out of the list
    #[arg(long, global = true)]
    hide_kernel_threads: bool,

    /// Send SIGKILL when SIGTERM is ignored
    #[arg(long, global = true)]
    force: bool,

    /// Stop after this many refresh cycles
    #[arg(long, global = true)]
    cycles: Option<u64>,
}

impl GlobalOpts {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            refresh_interval_secs: self.interval,
            sort: self.sort,
            filter: self.filter.clone(),
            chooser: self.chooser,
            no_color: self.no_color,
            export_dir: self.export_dir.clone(),
            hide_kernel_threads: self.hide_kernel_threads,
            force_kill: self.force,
            max_cycles: self.cycles,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the interactive monitor (the default)
    Run,

    /// Print one snapshot of the process list
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Write one snapshot to a timestamped file
    Export {
        /// File format
        #[arg(long = "as", value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,
    },

    /// Terminate processes by PID
    Kill {
        /// PIDs, separated by spaces or commas
        #[arg(required = true, num_args = 1..)]
        pids: Vec<String>,
    },

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let base = LogConfig::from_env(None, cli.global.log_format);
    let log_config = LogConfig {
        level: base.level.adjust(cli.global.verbose, cli.global.quiet),
        ..base
    };
    init_logging(&log_config);

    let run_id = generate_run_id();
    let _span = tracing::info_span!("procman", run_id = %run_id).entered();

    let err_color = !cli.global.no_color && std::io::stderr().is_terminal();
    let resolved = match resolve_config(&cli.global) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("{}", format_error_human(&err.into(), err_color));
            return ExitCode::ArgsError.into();
        }
    };

    let exit_code = match cli.command {
        None | Some(Commands::Run) => run_interactive(&resolved.config, err_color),
        Some(Commands::List { format }) => run_list(&resolved.config, format, err_color),
        Some(Commands::Export { format }) => run_export(&resolved.config, format, err_color),
        Some(Commands::Kill { pids }) => run_kill(&resolved.config, &pids),
        Some(Commands::Config(args)) => match args.command {
            ConfigCommands::Show => run_config_show(&resolved, err_color),
        },
    };
    debug!(code = exit_code.code_name(), "exiting");
    exit_code.into()
}

/// Load the config file, then apply command-line overrides on top.
fn resolve_config(global: &GlobalOpts) -> Result<ResolvedConfig, ConfigError> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_dir: None,
    };
    let mut resolved = load_config(&options)?;
    match &resolved.source {
        Some(path) => {
            info!(target: event_names::CONFIG_LOADED, path = %path.display(), "config loaded")
        }
        None => {
            debug!(target: event_names::CONFIG_DEFAULT_USED, "no config file; using defaults")
        }
    }
    resolved.config.apply(&global.overrides());
    resolved.config.validate()?;
    Ok(resolved)
}

fn report(err: &pm_common::Error, color: bool) -> ExitCode {
    eprintln!("{}", format_error_human(err, color));
    ExitCode::for_error(err)
}

fn scan_source(config: &Config) -> PsProcessSource {
    PsProcessSource::new(ScanOptions {
        include_kernel_threads: config.include_kernel_threads,
        timeout: config.scan_timeout(),
    })
}

fn filter_of(config: &Config) -> Result<Option<FilterSpec>, pm_common::Error> {
    config.filter_spec().map_err(pm_common::Error::from)
}

fn exporter_of(config: &Config) -> Exporter {
    config
        .export_dir
        .clone()
        .map(Exporter::new)
        .unwrap_or_default()
}

fn terminator_of(config: &Config) -> SignalTerminator {
    SignalTerminator::new(SignalConfig {
        force: config.force_kill,
        grace_ms: config.kill_grace_ms,
        ..SignalConfig::default()
    })
}

fn run_interactive(config: &Config, err_color: bool) -> ExitCode {
    let filter = match filter_of(config) {
        Ok(filter) => filter,
        Err(err) => return report(&err, err_color),
    };

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %err, "could not install the interrupt handler");
    }

    let stdout_tty = std::io::stdout().is_terminal();
    let palette = Palette::new(config.color && stdout_tty);

    let source = scan_source(config);
    let terminator = terminator_of(config);
    let mut chooser = build_chooser(config.chooser, palette);
    let mut operator = TerminalOperator::stdio(palette, stdout_tty);
    let mut sleeper = ThreadSleeper::default();

    let session = Session::new(filter, config.sort, config.refresh_interval());
    let settings = ControllerSettings {
        feedback_pause: config.feedback_pause(),
        max_cycles: config.max_cycles,
        system_summary: true,
    };

    let mut controller = Controller::new(
        Capabilities {
            source: &source,
            chooser: chooser.as_mut(),
            operator: &mut operator,
            terminator: &terminator,
            sleeper: &mut sleeper,
        },
        session,
        settings,
        exporter_of(config),
        interrupt,
    );

    match controller.run() {
        // an interrupted run is a normal exit
        Ok(_) => ExitCode::Clean,
        Err(err) => report(&err, err_color),
    }
}

/// Take one snapshot with per-process CPU usage, or report why that was
/// impossible.
///
/// Usage needs two readings, so the process table is scanned twice
/// `CPU_SAMPLE_WINDOW` apart.
fn sample_snapshot(config: &Config) -> Result<Snapshot, pm_common::Error> {
    let source = scan_source(config);
    let mut tracker = ProcessCpuTracker::new();
    let mut first = list_processes(&source)?;
    tracker.apply(&mut first);
    std::thread::sleep(CPU_SAMPLE_WINDOW);
    let mut snapshot = list_processes(&source)?;
    tracker.apply(&mut snapshot);
    debug!(
        processes = tracker.tracked(),
        window_ms = CPU_SAMPLE_WINDOW.as_millis() as u64,
        "cpu usage sampled"
    );
    Ok(snapshot)
}

fn run_list(config: &Config, format: OutputFormat, err_color: bool) -> ExitCode {
    let result = filter_of(config).and_then(|filter| {
        let snapshot = sample_snapshot(config)?;
        let view = project(&snapshot, filter.as_ref(), config.sort);
        let out = match format {
            OutputFormat::Table => {
                let mut text = render_lines(&view).join("\n");
                if !text.is_empty() {
                    text.push('\n');
                }
                text
            }
            OutputFormat::Json => {
                render_json(&snapshot, &view, filter.as_ref(), config.sort)? + "\n"
            }
            OutputFormat::Md => render_markdown(&view),
            OutputFormat::Summary => render_summary(&snapshot, &view) + "\n",
        };
        Ok(out)
    });

    match result {
        Ok(out) => {
            print!("{out}");
            ExitCode::Clean
        }
        Err(err) => report(&err, err_color),
    }
}

fn run_export(config: &Config, format: ExportFormat, err_color: bool) -> ExitCode {
    let result = filter_of(config).and_then(|filter| {
        let snapshot = sample_snapshot(config)?;
        let view = project(&snapshot, filter.as_ref(), config.sort);
        exporter_of(config)
            .export(format, &view)
            .map_err(pm_common::Error::from)
    });

    match result {
        Ok(path) => {
            println!("{}", format.success_message(&path));
            ExitCode::Clean
        }
        Err(err) => report(&err, err_color),
    }
}

fn run_kill(config: &Config, args: &[String]) -> ExitCode {
    let (pids, malformed) = parse_pid_list(&args.join(","));
    let terminator = terminator_of(config);

    let mut batch = terminate_many(&terminator, &pids);
    batch.malformed = malformed;
    for line in batch.messages() {
        println!("{line}");
    }

    if batch.all_ok() {
        ExitCode::Clean
    } else {
        ExitCode::PartialFail
    }
}

fn run_config_show(resolved: &ResolvedConfig, err_color: bool) -> ExitCode {
    match resolved.config.to_toml() {
        Ok(text) => {
            match &resolved.source {
                Some(path) => println!("# source: {}", path.display()),
                None => println!("# source: built-in defaults"),
            }
            print!("{text}");
            ExitCode::Clean
        }
        Err(err) => {
            let err = pm_common::Error::Config(format!("cannot serialize config: {err}"));
            report(&err, err_color)
        }
    }
}
