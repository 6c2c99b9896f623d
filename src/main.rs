//! rmsync - Two-way synchronization between a reMarkable tablet and a
//! directory of PDFs.
//!
//! Usage:
//!   rmsync [HOST]                 Sync with the device reachable as `ssh HOST`
//!   rmsync --dry-run              Only show what would be done
//!   rmsync --local DIR            Sync with a raw store in a local directory
//!   rmsync --help                 Show help

mod notify;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use rmsync_core::watermark::describe;
use rmsync_core::{DeviceConfig, SyncConfig, Transport};
use rmsync_ops::{DirectoryTransport, ExternalRenderer, Renderer, SshTransport, SyncSession};
use rmsync_plan::{Plan, PlanConfig, SyncPlanner};

use crate::notify::{Notifier, Urgency};
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "rmsync",
    version,
    about = "Synchronize a reMarkable with a local directory",
    long_about = "rmsync renders every notebook on a reMarkable into a local directory, \
                  uploads PDFs and EPUBs added to that directory, and removes local \
                  files that were deleted on the device.\n\n\
                  The device must be reachable with `ssh HOST` without a password."
)]
struct Cli {
    /// SSH host name or alias of the device [default: remarkable]
    host: Option<String>,

    /// Renderer executable, called as `RENDERER <raw input> <output pdf>`
    #[arg(short, long, value_name = "EXE")]
    renderer: Option<String>,

    /// Directory for the rendered files [default: remarkable]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log executed commands and every decision
    #[arg(short, long)]
    verbose: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Only print the plan
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Use a raw store in a local directory instead of SSH
    #[arg(long, value_name = "DIR")]
    local: Option<PathBuf>,

    /// Do not show desktop notifications
    #[arg(long)]
    no_notify: bool,

    /// Settings file [default: <config dir>/rmsync/config.toml]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(renderer) = cli.renderer {
        settings.renderer = renderer;
    }
    if let Some(output_dir) = cli.output_dir {
        settings.output_dir = output_dir;
    }
    settings.notify &= !cli.no_notify;

    let options = RunOptions {
        yes: cli.yes,
        dry_run: cli.dry_run,
        local: cli.local,
    };
    let mut notifier = Notifier::new(settings.notify);

    match run(&settings, &options, &mut notifier) {
        Ok(()) => Ok(()),
        Err(e) => {
            notifier.notify(&format!("Failed: {e}"), Urgency::Critical);
            Err(e)
        }
    }
}

/// Flags that only affect this invocation.
struct RunOptions {
    yes: bool,
    dry_run: bool,
    local: Option<PathBuf>,
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn sync_config(settings: &Settings) -> Result<SyncConfig> {
    let mirror_root = std::path::absolute(&settings.output_dir)
        .with_context(|| format!("Invalid output directory {}", settings.output_dir.display()))?;

    let Some(cache) = settings.cache_dir() else {
        return Ok(SyncConfig::new(mirror_root));
    };
    SyncConfig::builder()
        .mirror_root(mirror_root)
        .metadata_dir(cache.join("metadata"))
        .backup_dir(cache.join("backup"))
        .build()
        .context("Invalid sync configuration")
}

fn transport(settings: &Settings, local: Option<&PathBuf>) -> Result<Box<dyn Transport>> {
    if let Some(dir) = local {
        return Ok(Box::new(DirectoryTransport::new(dir)));
    }
    let device = DeviceConfig::builder()
        .host(settings.host.clone())
        .remote_dir(settings.remote_dir.clone())
        .connect_timeout_secs(settings.connect_timeout_secs)
        .build()
        .context("Invalid device configuration")?;
    Ok(Box::new(SshTransport::new(device)))
}

fn run(settings: &Settings, options: &RunOptions, notifier: &mut Notifier) -> Result<()> {
    let config = sync_config(settings)?;
    let transport = transport(settings, options.local.as_ref())?;
    let planner = SyncPlanner::with_config(
        PlanConfig::builder()
            .pushable_extensions(settings.pushable_extensions.clone())
            .build()
            .context("Invalid planner configuration")?,
    );

    notifier.log(&format!(
        "Synchronizing {} with {}",
        config.mirror_root.display(),
        transport.name()
    ));
    let mut session = SyncSession::prepare(&config, transport.as_ref(), &planner)
        .with_context(|| format!("Failed to compare with {}", transport.name()))?;
    let plan = session.plan();
    println!("Last sync: {}", describe(plan.watermark));

    print_plan(plan);
    if plan.is_empty() {
        notifier.log("Finished (everything was up-to-date)");
        return Ok(());
    }
    if options.dry_run {
        println!("Dry run: {}", plan.summary());
        return Ok(());
    }

    // A missing renderer only matters when something is pulled.
    let renderer = if session.renders_documents() {
        ExternalRenderer::locate(&settings.renderer, settings.renderer_dir.as_deref())?
    } else {
        ExternalRenderer::new(&settings.renderer)
    };
    if !options.yes && !confirm(plan, renderer.name(), notifier)? {
        notifier.log("Aborted (no changes have been made)");
        return Ok(());
    }

    let executor = session.executor(&renderer);
    let report = session.execute(&executor)?;

    for error in &report.errors {
        eprintln!("Failed: {error}");
    }
    if report.bytes_uploaded > 0 {
        println!(
            "Uploaded {}",
            humansize::format_size(report.bytes_uploaded, humansize::BINARY)
        );
    }
    if let Some(aborted) = &report.aborted {
        bail!("Stopped after {}: {aborted}", report.summary());
    }
    if !report.is_success() {
        bail!("Finished with errors ({}); run again to retry", report.summary());
    }

    notifier.log(&format!("Finished ({})", report.summary()));
    Ok(())
}

fn print_plan(plan: &Plan) {
    let total = plan.len();
    for (i, op) in plan.iter().enumerate() {
        println!("? ({}/{total}) {op}", i + 1);
    }
    for path in &plan.unpushable {
        println!("! {path} (cannot be imported by the device)");
    }
}

/// Ask before changing anything; only an explicit "y" proceeds.
fn confirm(plan: &Plan, renderer: &str, notifier: &mut Notifier) -> Result<bool> {
    let question = format!("{}, rendering with {renderer}?", plan.summary());
    notifier.notify(&question, Urgency::Normal);

    print!("{question} (y/n) ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "y")
}
