use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use rfml::errors::{ErrorCode, StructuredError};
use rfml::limits::SuiteLimits;
use rfml::loader::{load_external_ids, load_file, load_suite};
use rfml::parser::ParseOptions;
use rfml::report::{ParsedTest, SuiteReport};
use rfml::telemetry::{init_telemetry, TelemetryConfig};
use rfml::validation::validate_suite_with_unloaded;
use rfml::writer::render;

/// Exit code for operational failures (unreadable inputs, bad flags).
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "rfml")]
#[command(version, about = "Parse, validate and format RFML test files", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validates a suite of RFML files
    Validate {
        /// RFML files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// JSON list of externally known tests: [{"id": 12, "rfml_id": "login"}]
        #[arg(short, long)]
        external: Option<PathBuf>,

        /// Redirect value for steps without a `# redirect:` directive
        #[arg(long)]
        redirect_default: Option<bool>,

        /// Reject files without a `# title:`
        #[arg(long)]
        require_title: bool,

        /// Path to the output report file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Prints a parsed test as JSON
    Parse {
        file: PathBuf,

        #[arg(long)]
        redirect_default: Option<bool>,
    },

    /// Prints the canonical rendering of a test
    Fmt {
        file: PathBuf,

        #[arg(long)]
        redirect_default: Option<bool>,

        /// Exit with code 1 if the file is not already canonical
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if cli.verbose {
        telemetry = telemetry.verbose();
    }
    if let Err(e) = init_telemetry(telemetry) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    let result = match cli.command {
        Commands::Validate {
            files,
            external,
            redirect_default,
            require_title,
            output,
        } => {
            let mut options = parse_options(redirect_default);
            options.require_title |= require_title;
            validate(&files, external.as_deref(), &options, output.as_deref()).await
        }
        Commands::Parse { file, redirect_default } => parse(&file, &parse_options(redirect_default)),
        Commands::Fmt {
            file,
            redirect_default,
            check,
        } => format(&file, &parse_options(redirect_default), check),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Environment first, CLI flags override.
fn parse_options(redirect_default: Option<bool>) -> ParseOptions {
    let mut options = ParseOptions::from_env();
    if let Some(redirect) = redirect_default {
        options.redirect_default = redirect;
    }
    options
}

async fn validate(
    files: &[PathBuf],
    external: Option<&Path>,
    options: &ParseOptions,
    output: Option<&Path>,
) -> Result<bool> {
    let started_at = Utc::now();
    let limits = SuiteLimits::from_env();

    let external_ids = match external {
        Some(path) => match load_external_ids(path) {
            Ok(ids) => Some(ids),
            Err(e) => {
                let err = StructuredError::new(ErrorCode::INVALID_EXTERNAL_IDS, format!("{:#}", e))
                    .with_location(path.display().to_string());
                anyhow::bail!(err);
            }
        },
        None => None,
    };

    let suite = load_suite(files, options, &limits).await;
    let validation =
        validate_suite_with_unloaded(&suite.definitions, external_ids.as_deref(), &suite.unloaded_ids());
    let report = SuiteReport::build(&suite, &validation, started_at, Utc::now());

    for err in &report.errors {
        eprintln!("{}", err.user_message());
    }

    let json = report.to_json()?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
            info!(path = %path.display(), "Report saved");
        }
        None => println!("{}", json),
    }

    Ok(report.is_valid())
}

fn parse(file: &Path, options: &ParseOptions) -> Result<bool> {
    match load_file(file, options, &SuiteLimits::from_env()) {
        Ok(test) => {
            let json = ParsedTest::new(&test).to_json()?;
            println!("{}", json);
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", e.to_structured().user_message());
            Ok(false)
        }
    }
}

fn format(file: &Path, options: &ParseOptions, check: bool) -> Result<bool> {
    let test = match load_file(file, options, &SuiteLimits::from_env()) {
        Ok(test) => test,
        Err(e) => {
            eprintln!("{}", e.to_structured().user_message());
            return Ok(false);
        }
    };

    let canonical = render(&test, options);

    if check {
        let current = fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
        if current != canonical {
            eprintln!("{} is not canonically formatted", file.display());
            return Ok(false);
        }
        return Ok(true);
    }

    print!("{}", canonical);
    Ok(true)
}
