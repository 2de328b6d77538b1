//! appconverge CLI entrypoint.
//!
//! This is the main entrypoint for the appconverge command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use appconverge::cli::{Cli, Commands, OutputFormatter};
use appconverge::config::{ConfigParser, ConfigValidator, ConvergeConfig, find_config_file};
use appconverge::controlplane::HttpControlPlane;
use appconverge::error::Result;
use appconverge::reader::ApplicationReader;
use appconverge::reconciler::Reconciler;
use appconverge::resources::{OsFilesystem, PendingResourceUpload};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let formatter = OutputFormatter::new(cli.output);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over the verbosity flag.
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, formatter),
        Commands::Read { application } => cmd_read(config_path, &application, formatter).await,
        Commands::Plan { detailed } => cmd_plan(config_path, detailed, formatter).await,
        Commands::Upload {
            application,
            resources,
        } => cmd_upload(config_path, &application, &resources, formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;

    emit(&formatter.format_validation(&result, &config, show_warnings));
    Ok(())
}

/// Read one application through the convergent reader.
async fn cmd_read(
    config_path: Option<&PathBuf>,
    application: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let client = create_client(&config)?;

    let ctx = Reconciler::new(&config, &client).context();
    let view = ApplicationReader::new(&client, config.retry.budget())
        .read_application(&ctx, &config.controller.model, application)
        .await?;

    emit(&formatter.format_view(&view));
    Ok(())
}

/// Show the reconcile plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let client = create_client(&config)?;

    let plan = Reconciler::new(&config, &client).plan().await?;

    emit(&formatter.format_plan(&plan, detailed));
    Ok(())
}

/// Upload local resources.
async fn cmd_upload(
    config_path: Option<&PathBuf>,
    application: &str,
    resources: &[PendingResourceUpload],
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let client = create_client(&config)?;

    info!(
        "Uploading {} resource(s) for {application} in model {}",
        resources.len(),
        config.controller.model
    );
    Reconciler::new(&config, &client)
        .upload_resources(application, resources, &OsFilesystem)
        .await?;

    emit(&formatter.format_upload(application, resources));
    Ok(())
}

// Helper functions

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.clone()),
        None => find_config_file(std::env::current_dir()?),
    }
}

fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads and validates configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<ConvergeConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    ConfigValidator::new().validate(&config)?;

    Ok(config)
}

/// Creates the control plane client.
fn create_client(config: &ConvergeConfig) -> Result<HttpControlPlane> {
    let token = ConfigParser::get_api_token()?;
    HttpControlPlane::with_timeout(
        &config.controller.url,
        &token,
        config.controller.timeout_secs,
    )
}

/// Writes command output to stdout.
fn emit(output: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
