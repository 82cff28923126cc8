use clap::{Args, Parser, Subcommand};
use floe::{explain, load_request, render, resolve_settings, CliError};
use floe_worker::ConnectorKind;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Floe connector tooling
#[derive(Parser, Debug)]
#[command(name = "floe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging for floe crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a read request and print the native query
    Explain(ExplainArgs),
}

#[derive(Args, Debug)]
struct ExplainArgs {
    /// JSON file holding `{table, columns, constraints, split}`
    #[arg(short, long)]
    request: String,

    /// Settings file; defaults to `FLOE_CONFIG_PATH` or `config/default.toml`
    #[arg(short, long)]
    config: Option<String>,

    /// Backend dialect, overriding the settings file
    #[arg(long)]
    connector: Option<ConnectorKind>,

    /// Print the explained request as JSON
    #[arg(long)]
    json: bool,
}

fn run(args: ExplainArgs) -> Result<(), CliError> {
    let settings = resolve_settings(args.config.as_deref(), args.connector)?;
    let request = load_request(&args.request)?;
    let explained = explain(&settings, &request)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&explained)?);
    } else {
        print!("{}", render(settings.connector, &explained));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "floe=debug" } else { "floe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let result = match cli.command {
        Command::Explain(args) => run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "explain failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
