//! CMD CLI - Conway-Markdown to HTML converter.
//!
//! Converts the named CMD files, or every CMD file under the configured root
//! directory when none are named, writing `.html` files next to the sources.

mod convert;
mod error;
mod output;
mod scanner;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use cmd_config::{CliSettings, Config};
use tracing_subscriber::EnvFilter;

use convert::{Job, convert_all};
use error::CliError;
use output::Output;
use scanner::Scanner;

/// Convert Conway-Markdown (CMD) to HTML.
#[derive(Parser)]
#[command(name = "cmd", version, about, disable_version_flag = true)]
struct Cli {
    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Run in verbose mode (logs every replacement applied).
    #[arg(short = 'x', long)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, env = "CMD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory searched for CMD files when none are named.
    #[arg(long)]
    root_dir: Option<PathBuf>,

    /// Name of CMD file to be converted.
    /// Abbreviate as `file` or `file.` for increased productivity.
    /// Omit to convert all CMD files under the root directory.
    #[arg(value_name = "file.cmd")]
    files: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let cli_settings = CliSettings {
        verbose: cli.verbose.then_some(true),
        root_dir: cli.root_dir.clone(),
    };
    let config = match Config::load(cli.config.as_deref(), Some(&cli_settings)) {
        Ok(config) => config,
        Err(err) => fail(&output, &CliError::from(err)),
    };

    // --verbose enables INFO level, otherwise use RUST_LOG
    let filter = if config.convert.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(&cli.files, &config, &output) {
        fail(&output, &err);
    }
}

fn run(files: &[String], config: &Config, output: &Output) -> Result<(), CliError> {
    let jobs: Vec<Job> = if files.is_empty() {
        discover(config)
    } else {
        files.iter().map(|argument| Job::from_argument(argument)).collect()
    };

    for result in convert_all(&jobs, config.convert.verbose) {
        let converted = result?;
        converted.write()?;
        output.success(&format!("success: wrote to `{}`", converted.html_file.display()));
    }

    Ok(())
}

/// Jobs for every CMD file under the root directory.
///
/// Paths inside the working directory are made relative to it, so document
/// names and rules inclusion behave as if the files had been named.
fn discover(config: &Config) -> Vec<Job> {
    let discovery = &config.discovery_resolved;
    let paths = Scanner::new(discovery.root_dir.clone(), discovery.exclude_patterns()).scan();
    tracing::info!(
        "Found {} CMD files under {}",
        paths.len(),
        discovery.root_dir.display()
    );

    let cwd = std::env::current_dir().unwrap_or_default();
    paths
        .iter()
        .map(|path| Job::from_path(path.strip_prefix(&cwd).unwrap_or(path)))
        .collect()
}

fn fail(output: &Output, err: &CliError) -> ! {
    output.error(&format!("error: {err}"));
    std::process::exit(err.exit_code());
}
