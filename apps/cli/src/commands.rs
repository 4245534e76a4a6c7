//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docsmith_core::{BuildResult, ProgressReporter, build_docs, check_directory_links};
use docsmith_dispatch::{CancelHandle, Context};
use docsmith_linkcheck::LinkCheckReport;
use docsmith_shared::{AppConfig, BuildConfig, ValidatorConfig, github_token, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docsmith — assemble documentation trees from local and remote sources.
#[derive(Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Assemble a documentation tree from a manifest and validate its links.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the documentation tree described by a manifest.
    Build {
        /// Manifest file (TOML, or JSON with a .json extension).
        manifest: PathBuf,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent content fetch tasks.
        #[arg(short, long)]
        workers: Option<usize>,

        /// Abort the build after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip external link validation.
        #[arg(long)]
        no_validate_links: bool,

        /// Write <name>.gitinfo.json sidecars for local documents.
        #[arg(long)]
        git_info: bool,
    },

    /// Validate external links in the Markdown files of a directory.
    CheckLinks {
        /// Directory to scan.
        dir: PathBuf,

        /// Concurrent link probes.
        #[arg(short, long)]
        workers: Option<usize>,

        /// Abort after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docsmith=info",
        1 => "docsmith=debug",
        _ => "docsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            manifest,
            output,
            workers,
            timeout,
            no_validate_links,
            git_info,
        } => {
            let config = load_config()?;
            let mut build = BuildConfig::from_app(&config, manifest);
            if let Some(output) = output {
                build.output_dir = output;
            }
            if let Some(workers) = workers {
                build.workers = workers.max(1);
            }
            if let Some(secs) = timeout {
                build.timeout = Some(Duration::from_secs(secs));
            }
            build.validate_links &= !no_validate_links;
            build.git_info |= git_info;
            cmd_build(&build).await
        }
        Command::CheckLinks { dir, workers, timeout } => cmd_check_links(&dir, workers, timeout).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// A context cancelled by Ctrl-C and, optionally, by a deadline.
fn interruptible(timeout: Option<Duration>) -> Context {
    let (ctx, cancel) = Context::background().with_cancel();
    tokio::spawn(cancel_on_interrupt(cancel));
    match timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

async fn cancel_on_interrupt(cancel: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling");
        cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_build(config: &BuildConfig) -> Result<()> {
    info!(
        manifest = %config.manifest.display(),
        output = %config.output_dir.display(),
        workers = config.workers,
        "building documentation"
    );

    let ctx = interruptible(config.timeout);
    let reporter = CliProgress::new();
    let result = build_docs(&ctx, config, &reporter).await?;

    println!();
    println!("  Build {}", if result.is_success() { "finished" } else { "finished with errors" });
    println!("  Run:        {}", result.run_id);
    println!("  Output:     {}", result.output_dir.display());
    println!("  Documents:  {}", result.documents.len());
    println!("  Resources:  {}", result.resources);
    println!("  Failures:   {}", result.failures.len());
    for failure in &result.failures {
        println!("    - {failure}");
    }
    for (container, union) in &result.unions {
        for name in &union.unresolved {
            println!("  Skipped:    {container}/{name} (name collision)");
        }
    }
    if let Some(links) = &result.links {
        print_links(links);
    }
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    if result.cancelled {
        return Err(eyre!("build cancelled"));
    }
    if !result.failures.is_empty() {
        return Err(eyre!("{} task(s) failed", result.failures.len()));
    }
    Ok(())
}

async fn cmd_check_links(dir: &Path, workers: Option<usize>, timeout: Option<u64>) -> Result<()> {
    if !dir.is_dir() {
        return Err(eyre!("'{}' is not a directory", dir.display()));
    }
    let config: AppConfig = load_config()?;
    let workers = workers.unwrap_or(config.link_validation.workers).max(1);
    let validator = ValidatorConfig::from(&config.link_validation);

    let ctx = interruptible(timeout.map(Duration::from_secs));
    let spinner = CliProgress::new();
    spinner.phase("Validating links");
    let report = check_directory_links(&ctx, dir, workers, github_token(&config), validator).await?;
    spinner.spinner.finish_and_clear();

    println!();
    print_links(&report);
    println!();

    if report.cancelled() {
        return Err(eyre!("link check cancelled"));
    }
    Ok(())
}

fn print_links(report: &LinkCheckReport) {
    println!("  Links:      {} checked, {} broken", report.checked(), report.broken().count());
    for outcome in report.broken() {
        println!("    - {} in {} ({:?})", outcome.destination, outcome.source, outcome.status);
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_done(&self, id: &str, ok: bool, current: usize, total: usize) {
        let mark = if ok { "" } else { " (failed)" };
        self.spinner.set_message(format!("Fetching [{current}/{total}] {id}{mark}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}
