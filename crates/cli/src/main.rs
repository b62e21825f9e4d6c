use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use opcall_api::{ApiClient, Catalog, CatalogSource, ClientConfig, WaitPolicy, build_surface};
use opcall_engine::Dispatcher;
use opcall_types::{OutputEnvelope, read_input, write_output};
use opcall_util::redact_sensitive;
use tracing::{debug, error};

/// Log filter for opcall; `RUST_LOG` is used when unset.
const LOG_ENV: &str = "OPCALL_LOG";

#[derive(Debug, Parser)]
#[command(name = "opcall", version, about = "Dispatches one JSON operation envelope from stdin to the IONOS Cloud API")]
struct Cli {
    /// Operation catalog to load instead of the embedded one.
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Print the operations of the active catalog and exit.
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(failure) => {
            let message = format!("{failure:#}");
            error!(error = %redact_sensitive(&message), "opcall failed");
            emit(&OutputEnvelope::from_error(message));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = env::var(LOG_ENV)
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let source = CatalogSource::select(cli.catalog.as_deref());
    let catalog = Catalog::load(&source).context("failed to load the operation catalog")?;
    if cli.list {
        for name in catalog.operation_names() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let input = match read_input(io::stdin().lock()) {
        Ok(input) => input,
        Err(failure) => {
            error!(error = %failure, "could not decode the input envelope");
            emit(&OutputEnvelope::from_error(failure.to_string()));
            return Ok(exit_code(failure.exit_status()));
        }
    };
    debug!(operation = %input.operation, params = input.params.len(), "decoded input envelope");

    let config = ClientConfig::resolve(input.options.as_ref()).context("invalid client configuration")?;
    let client = Arc::new(ApiClient::new(config).context("failed to build the API client")?);
    let surface = build_surface(&catalog, client, WaitPolicy::default()).context("invalid operation catalog")?;

    let output = Dispatcher::new(&surface).dispatch(input);
    write_output(io::stdout().lock(), &output).context("failed to write the output envelope")?;
    Ok(ExitCode::SUCCESS)
}

/// Writes `output` to stdout, logging instead of failing.
fn emit(output: &OutputEnvelope) {
    if let Err(failure) = write_output(io::stdout().lock(), output) {
        error!(error = %failure, "could not write the output envelope");
    }
}

fn exit_code(status: i32) -> ExitCode {
    u8::try_from(status).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
