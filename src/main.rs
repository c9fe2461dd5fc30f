use clap::{Parser, Subcommand};
use sshmole::config::{self, Config};
use sshmole::platform::get_process_probe;
use sshmole::resolve::SystemResolver;
use sshmole::sshuttle::{self, Action, Outcome, ProcessController, SshuttleLauncher};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sshmole")]
#[command(about = "Manage sshuttle tunnel profiles")]
#[command(version, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $SSHMOLE_CONFIG or ~/.sshmole.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all or the specified profile
    Start { profile: Option<String> },
    /// Stop all or the specified profile
    Stop { profile: Option<String> },
    /// Restart all or the specified profile
    Restart { profile: Option<String> },
    /// Show status of all or the specified profile
    Status { profile: Option<String> },
    /// Install sshuttle and a NOPASSWD sudoers entry
    SetupSshuttle,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = config::config_path(cli.config)?;
    let config = match Config::load(&path, &SystemResolver::new()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let (action, profile) = match cli.command {
        Commands::Start { profile } => (Action::Start, profile),
        Commands::Stop { profile } => (Action::Stop, profile),
        Commands::Restart { profile } => (Action::Restart, profile),
        Commands::Status { profile } => (Action::Status, profile),
        Commands::SetupSshuttle => {
            if let Err(e) = sshuttle::do_setup(&config) {
                error!("Setup failed: {}", e);
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    let launcher = SshuttleLauncher::new(config.sshuttle_dir.clone());
    let probe = get_process_probe()?;
    let controller = ProcessController::new(&config, &launcher, &*probe);

    let report = controller.run(action, profile.as_deref());
    for (profile, result) in &report.results {
        match result {
            Ok(Outcome::Status(status)) => println!("{}: {}", profile, status),
            Ok(Outcome::NotRunning) => info!("{} is not running", profile),
            _ => {}
        }
    }

    if !report.is_success() {
        error!("{} of {} profiles failed", report.failures(), report.results.len());
        std::process::exit(1);
    }

    Ok(())
}
