use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rentals_tools::config::{ConfigIssue, EnvironmentConfig, NetworkMode, RentalsToml, Settings};
use rentals_tools::contract::registry_for;
use rentals_tools::pipeline::{Pipeline, Plan};
use rentals_tools::rpc::RpcConnector;

#[derive(Parser)]
#[command(name = "rentals")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diagnostics for deploying and exercising the rental contract")]
struct Cli {
    /// Network mode (local/remote), overrides RENTALS_NETWORK
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Profile file (default: ./rentals.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Abort the whole run after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check (default)
    Diagnose,
    /// Check environment variables only
    CheckEnv,
    /// Verify the local chain, its accounts and the expected account
    VerifyLocal,
    /// Test the remote provider connection and the derived account
    TestRemote,
    /// Inspect the deployed contract: owner, counter, balance
    Interact,
    /// Print the resolved configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "rentals_tools=debug,rentals=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("RENTALS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let command = cli.command.unwrap_or(Commands::Diagnose);
    let (plan, forced_mode) = match &command {
        Commands::Diagnose => (Plan::full(), None),
        Commands::CheckEnv => (Plan::check_env(), None),
        Commands::VerifyLocal => (Plan::verify_local(), Some(NetworkMode::Local)),
        Commands::TestRemote => (Plan::test_remote(), Some(NetworkMode::Remote)),
        Commands::Interact => (Plan::interact(), None),
        Commands::Config { .. } => (Plan::check_env(), None),
    };

    // Bad values are reported by the run and replaced by defaults
    let mut issues = Vec::new();
    let mode_override = match (forced_mode, cli.network.as_deref()) {
        (Some(mode), _) => Some(mode),
        (None, Some(name)) => match NetworkMode::parse(name) {
            Ok(mode) => Some(mode),
            Err(err) => {
                issues.push(ConfigIssue::new("--network", err, "RENTALS_NETWORK or local"));
                None
            }
        },
        (None, None) => None,
    };

    let env = EnvironmentConfig::load();
    let file = match RentalsToml::load(cli.config.as_deref()) {
        Ok(file) => file,
        Err(err) => {
            issues.push(ConfigIssue::new("rentals.toml", err, "built-in defaults"));
            None
        }
    };
    let (settings, resolve_issues) = Settings::resolve_lenient(&env, file.as_ref(), mode_override);
    issues.extend(resolve_issues);

    if let Commands::Config { json } = command {
        if json {
            println!("{}", settings.to_json()?);
        } else {
            settings.print_summary();
        }
        for issue in &issues {
            eprintln!("warning: {}", issue);
        }
        if !issues.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let registry = registry_for(&settings);
    let connector = RpcConnector::default();
    let pipeline = Pipeline::new(&env, &settings, &connector, registry.as_ref(), plan).with_config_issues(&issues);

    let run = match cli.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pipeline.run())
            .await
            .with_context(|| format!("diagnostic run exceeded {}s", secs))?,
        None => pipeline.run().await,
    };

    match cli.format {
        Format::Text => print!("{}", run.report.render_text()),
        Format::Json => println!("{}", run.report.to_json()?),
    }

    let code = run.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
