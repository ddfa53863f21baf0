//! Conversion of CMD files to HTML files.
//!
//! Documents are converted on the global rayon thread pool; results come back
//! in input order so they can be written and reported deterministically.

use std::path::{Path, PathBuf};

use cmd_core::cmd_to_html;
use cmd_core::utilities::normalise_path;
use rayon::prelude::*;

use crate::error::CliError;

/// Extract the name without extension from a CMD file name argument.
///
/// The argument may be `name.cmd`, `name.` or `name`. `./` and `../` are
/// resolved lexically.
pub(crate) fn extract_cmd_name(argument: &str) -> String {
    let normalised = normalise_path(argument);
    normalised
        .strip_suffix(".cmd")
        .or_else(|| normalised.strip_suffix('.'))
        .unwrap_or(&normalised)
        .to_owned()
}

/// A document to convert.
#[derive(Debug)]
pub(crate) struct Job {
    /// Command-line argument naming the document, if it was named.
    argument: Option<String>,
    cmd_name: String,
}

/// A converted document, not yet written.
#[derive(Debug)]
pub(crate) struct Converted {
    pub(crate) html_file: PathBuf,
    html: String,
}

impl Job {
    /// Job for a file named on the command line.
    pub(crate) fn from_argument(argument: &str) -> Self {
        Self {
            argument: Some(argument.to_owned()),
            cmd_name: extract_cmd_name(argument),
        }
    }

    /// Job for a discovered file.
    pub(crate) fn from_path(path: &Path) -> Self {
        Self {
            argument: None,
            cmd_name: extract_cmd_name(&path.to_string_lossy()),
        }
    }

    fn cmd_file(&self) -> String {
        format!("{}.cmd", self.cmd_name)
    }

    fn html_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.html", self.cmd_name))
    }

    /// Read and convert the document.
    pub(crate) fn convert(&self, verbose: bool) -> Result<Converted, CliError> {
        let cmd_file = self.cmd_file();
        let cmd = std::fs::read_to_string(&cmd_file).map_err(|source| match &self.argument {
            Some(argument) if source.kind() == std::io::ErrorKind::NotFound => CliError::MissingFile {
                argument: argument.clone(),
                file: cmd_file.clone(),
            },
            _ => CliError::Read {
                file: PathBuf::from(&cmd_file),
                source,
            },
        })?;

        let html = cmd_to_html(&cmd, &cmd_file, verbose)?;
        Ok(Converted {
            html_file: self.html_file(),
            html,
        })
    }
}

impl Converted {
    /// Write the HTML next to its source.
    pub(crate) fn write(&self) -> Result<(), CliError> {
        std::fs::write(&self.html_file, &self.html).map_err(|source| CliError::Write {
            file: self.html_file.clone(),
            source,
        })
    }
}

/// Convert every job, keeping input order.
///
/// Verbose runs convert one document at a time so their traces stay grouped.
pub(crate) fn convert_all(jobs: &[Job], verbose: bool) -> Vec<Result<Converted, CliError>> {
    if verbose {
        jobs.iter().map(|job| job.convert(true)).collect()
    } else {
        jobs.par_iter().map(|job| job.convert(false)).collect()
    }
}
