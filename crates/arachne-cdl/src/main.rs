//! arachne-cdl - Arachne config downloader
//!
//! Keeps the NetworkManager OpenVPN connection (or an `.ovpn` file) in sync
//! with the user's configuration on the Arachne admin server.

mod services;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use gio::prelude::*;
use tracing::{debug, error, info, warn};

use arachne_cdl_core::download::UserContext;
use arachne_cdl_core::{
    Config, ConnectionService, DownloadController, DownloadStatus, HttpFetcher, Notifier, Outcome,
    StateFile, Trigger, logging,
};

use crate::services::config_manager::ConfigManager;
use crate::services::download_service::DownloadService;
use crate::services::network_manager::NetworkManagerClient;
use crate::services::notifier::DesktopNotifier;

const APP_ID: &str = "at.nieslony.ArachneCdl";
const ACTION_DOWNLOAD_NOW: &str = "download-now";
const ACTION_QUIT: &str = "quit";

/// arachne-cdl - Arachne config downloader
#[derive(Parser, Debug)]
#[command(name = "arachne-cdl", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (uses XDG lookup if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Validate configuration and exit (returns non-zero on errors)
    #[arg(long)]
    check_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the configuration now (via the running instance if any)
    DownloadNow,
    /// Stop the running instance
    Quit,
    /// List NetworkManager connections with their UUIDs
    Connections {
        /// Only show active connections
        #[arg(long)]
        active: bool,
    },
    /// Show when the configuration was last downloaded
    Status,
    /// Open the admin server in the default browser
    OpenAdmin,
}

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init(args.verbose);

    // These don't need a config
    match args.command {
        Some(Command::Connections { active }) => return report(print_connections(active)),
        Some(Command::Status) => return print_status(),
        Some(Command::Quit) => return report(remote_quit()),
        _ => {}
    }

    // If --config is specified, it must exist and be valid (no fallback)
    let load_result = match Config::find_and_load(args.config.as_deref()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref source) = load_result.source {
        info!("Loaded configuration from {:?}", source);
    } else if load_result.used_defaults {
        warn!("Using default configuration (no config file found)");
    }

    let config = load_result.config;

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    debug!("Configuration validated successfully");

    if args.check_config {
        if let Some(ref source) = load_result.source {
            println!("Configuration valid: {}", source.display());
        } else {
            println!("Configuration valid (using defaults)");
        }
        for warning in config.warnings() {
            println!("Warning: {}", warning);
        }
        return ExitCode::SUCCESS;
    }

    if args.print_example_config {
        print!("{}", arachne_cdl_core::config::DEFAULT_CONFIG_TOML);
        return ExitCode::SUCCESS;
    }

    match args.command {
        Some(Command::DownloadNow) => report(download_now(config)),
        Some(Command::OpenAdmin) => report(open_admin(&config)),
        _ => {
            debug!("{}", config.summary());
            run_daemon(config, load_result.source)
        }
    }
}

/// Print an error and map to an exit code.
fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn fetcher() -> HttpFetcher {
    #[cfg(feature = "kerberos")]
    {
        HttpFetcher::with_negotiate(Arc::new(arachne_cdl_core::kerberos::KerberosNegotiate))
    }
    #[cfg(not(feature = "kerberos"))]
    {
        HttpFetcher::new()
    }
}

fn build_controller(
    settings: Arc<dyn arachne_cdl_core::SettingsSource>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<DownloadController> {
    let user = UserContext::from_env().context("HOME and USER must be set")?;
    Ok(DownloadController::new(
        settings,
        Arc::new(StateFile::at_default_location()),
        Arc::new(fetcher()),
        Arc::new(NetworkManagerClient::new()),
        notifier,
        user,
    ))
}

/// Register as a client of the running instance. Returns `None` when no
/// instance is running.
fn remote_instance() -> anyhow::Result<Option<gio::Application>> {
    let app = gio::Application::new(Some(APP_ID), gio::ApplicationFlags::empty());
    app.register(None::<&gio::Cancellable>)
        .context("cannot register on the session bus")?;
    Ok(app.is_remote().then_some(app))
}

fn activate_remote(app: &gio::Application, action: &str) -> anyhow::Result<()> {
    app.activate_action(action, None);
    if let Some(bus) = app.dbus_connection() {
        bus.flush_sync(None::<&gio::Cancellable>)
            .context("cannot reach the running instance")?;
    }
    Ok(())
}

fn remote_quit() -> anyhow::Result<()> {
    match remote_instance()? {
        Some(app) => activate_remote(&app, ACTION_QUIT),
        None => bail!("arachne-cdl is not running"),
    }
}

fn download_now(config: Config) -> anyhow::Result<()> {
    if let Some(app) = remote_instance()? {
        info!("Asking the running instance to download");
        return activate_remote(&app, ACTION_DOWNLOAD_NOW);
    }

    let controller = build_controller(Arc::new(config), Arc::new(DesktopNotifier::new()))?;
    match controller.run(Trigger::Manual) {
        Outcome::Applied(applied) => {
            println!("{}", applied);
            Ok(())
        }
        Outcome::Skipped(reason) => bail!("download skipped: {:?}", reason),
        Outcome::Failed(e) => Err(e.into()),
    }
}

fn open_admin(config: &Config) -> anyhow::Result<()> {
    let url = config.admin_server_url();
    info!("Opening {}", url);
    gio::AppInfo::launch_default_for_uri(&url, None::<&gio::AppLaunchContext>)
        .with_context(|| format!("cannot open {}", url))
}

fn print_connections(active_only: bool) -> anyhow::Result<()> {
    let nm = NetworkManagerClient::new();
    let active = nm.list_active().context("cannot list active connections")?;
    let connections = if active_only {
        active.clone()
    } else {
        nm.list_connections().context("cannot list connections")?
    };

    for con in &connections {
        let marker = if active.iter().any(|a| a.id == con.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<10} {:<36} {}",
            marker,
            con.kind.label(),
            con.id,
            con.name
        );
    }
    Ok(())
}

fn print_status() -> ExitCode {
    let state_file = StateFile::at_default_location();
    let state = state_file.load();
    let status = DownloadStatus::classify(state.last_success, Utc::now());

    println!("{}", status.summary());
    if let Some(id) = state.managed_id() {
        println!("Managed connection: {}", id);
    }

    if status.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Run as the primary instance until quit.
fn run_daemon(config: Config, config_source: Option<PathBuf>) -> ExitCode {
    if let Some(ref source) = config_source {
        info!("Running with configuration file: {}", source.display());
    } else {
        info!("Running with default configuration (no file found)");
    }

    let app = gio::Application::new(Some(APP_ID), gio::ApplicationFlags::empty());
    let settings = ConfigManager::new(config, config_source);
    let hold: Rc<RefCell<Option<gio::ApplicationHoldGuard>>> = Rc::new(RefCell::new(None));

    {
        let settings = settings.clone();
        let hold = hold.clone();
        app.connect_startup(move |app| {
            if let Err(e) = start_services(app, &settings, &hold) {
                error!("Startup failed: {:#}", e);
                app.quit();
            }
        });
    }

    app.connect_activate(|_| debug!("Application activated"));

    // Arguments are already parsed by clap.
    let code = app.run_with_args(&["arachne-cdl"]);
    if code == glib::ExitCode::SUCCESS {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn start_services(
    app: &gio::Application,
    settings: &Arc<ConfigManager>,
    hold: &Rc<RefCell<Option<gio::ApplicationHoldGuard>>>,
) -> anyhow::Result<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(DesktopNotifier::new());
    let controller = Arc::new(build_controller(settings.clone(), notifier.clone())?);

    let state = controller.state_file().load();
    let status = DownloadStatus::classify(state.last_success, Utc::now());
    info!("{}", status.summary());
    if status.is_error() {
        notifier.error(&status.summary());
    }
    if settings.config().server.ignore_ssl_errors {
        notifier.error("TLS certificate verification is disabled for the admin server");
    }

    let service = DownloadService::new(controller, settings.clone());

    {
        let service = service.clone();
        settings.on_reload(move |old, new| service.reconfigure(old, new));
    }
    settings.start_watching();

    let download_action = gio::SimpleAction::new(ACTION_DOWNLOAD_NOW, None);
    {
        let service = service.clone();
        download_action.connect_activate(move |_, _| {
            info!("Manual download requested");
            service.download_now();
        });
    }
    app.add_action(&download_action);

    let shutdown: Rc<dyn Fn()> = {
        let app = app.clone();
        let service = service.clone();
        let settings = settings.clone();
        let hold = hold.clone();
        Rc::new(move || {
            info!("Shutting down");
            service.stop();
            settings.stop_watching();
            hold.borrow_mut().take();
            app.quit();
        })
    };

    let quit_action = gio::SimpleAction::new(ACTION_QUIT, None);
    {
        let shutdown = shutdown.clone();
        quit_action.connect_activate(move |_, _| shutdown());
    }
    app.add_action(&quit_action);

    for signum in [libc::SIGINT, libc::SIGTERM] {
        let shutdown = shutdown.clone();
        glib::unix_signal_add_local(signum, move || {
            debug!("Received signal {}", signum);
            shutdown();
            glib::ControlFlow::Continue
        });
    }

    *hold.borrow_mut() = Some(app.hold());
    service.start();
    info!("arachne-cdl {} started", env!("CARGO_PKG_VERSION"));
    Ok(())
}
