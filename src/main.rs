use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use licensegate::{gateway, Agent, LicenseGateConfig};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override `license_file_path`
    #[arg(long, global = true)]
    license_file: Option<PathBuf>,

    /// Override `authority_base_url`
    #[arg(long, global = true)]
    authority_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run the license agent: validate periodically, control the backend,
    /// report usage. Exits 1 when the license can no longer be proven.
    Agent,

    /// Run the license gateway in front of the web UI
    Gateway(GatewayArgs),
}

#[derive(Debug, clap::Args)]
struct GatewayArgs {
    /// Override `listen_addr`
    #[arg(long)]
    listen: Option<String>,

    /// Override `upstream_url`
    #[arg(long)]
    upstream: Option<String>,
}

fn setup_logging() {
    use std::io::IsTerminal;
    use tracing_subscriber::{
        filter::{EnvFilter, LevelFilter},
        fmt,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(env_filter)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<LicenseGateConfig> {
    let mut config = match &cli.config {
        Some(path) => LicenseGateConfig::from_file(path)?,
        None => LicenseGateConfig::default(),
    };

    if let Some(path) = &cli.license_file {
        config.license_file_path = path.clone();
    }
    if let Some(url) = &cli.authority_url {
        config.authority_base_url = url.clone();
    }
    if let Commands::Gateway(args) = &cli.command {
        if let Some(listen) = &args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(upstream) = &args.upstream {
            config.upstream_url = upstream.clone();
        }
    }

    config.validate()?;
    Ok(config)
}

/// Resolves on Ctrl-C or SIGTERM. Handlers are installed before returning.
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    Ok(async move {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            sigterm.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        info!("Shutdown signal received");
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let shutdown = shutdown_signal()?;

    match cli.command {
        Commands::Agent => {
            let agent = Agent::from_config(&config).context("Failed to start agent")?;
            tokio::select! {
                result = agent.run() => match result {
                    Ok(never) => match never {},
                    Err(e) => Err(anyhow::Error::new(e).context("License could not be proven, backend stopped")),
                },
                _ = shutdown => Ok(()),
            }
        }
        Commands::Gateway(_) => {
            gateway::run(&config, shutdown).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
