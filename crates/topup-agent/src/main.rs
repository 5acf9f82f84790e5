use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use topup_agent::cli;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "topup-agent",
    about = "topup-agent: keeps a prepaid data plan topped up",
    version,
    after_help = "Run 'topup-agent <command> --help' for details on each command.\nRun 'topup-agent' with no command to start polling."
)]
struct Cli {
    /// Log filter, e.g. "debug" or "topup_core=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the portal until interrupted (default)
    Run,
    /// Run a single cycle and exit
    Once,
    /// Exit 0 if the agent is healthy, 1 otherwise
    Health {
        /// Data directory to probe
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(log_level: Option<&str>, json: bool) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("topup=info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "topup-agent", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.log_level.as_deref(), cli.json_logs);

    let result = match cli.command {
        None | Some(Commands::Run) => cli::run::run().await,
        Some(Commands::Once) => cli::once::run().await,
        Some(Commands::Health { data_dir }) => std::process::exit(cli::health::run(data_dir)),
        Some(Commands::Doctor) => cli::doctor::run().await,
        Some(Commands::Completions { .. }) => Ok(()),
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
