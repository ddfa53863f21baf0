//! CLI error types.

use std::path::PathBuf;

use cmd_config::ConfigError;
use cmd_core::ConvertError;

/// Exit code for command-line argument errors.
const COMMAND_LINE_ERROR_EXIT_CODE: i32 = 2;

/// Exit code for every other failure.
const GENERIC_ERROR_EXIT_CODE: i32 = 1;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Convert(#[from] ConvertError),

    #[error("argument `{argument}`: file `{file}` not found")]
    MissingFile { argument: String, file: String },

    #[error("cannot read `{}`: {source}", .file.display())]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write to `{}`: {source}", .file.display())]
    Write {
        file: PathBuf,
        source: std::io::Error,
    },
}

impl CliError {
    /// Process exit code for this error.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::MissingFile { .. } => COMMAND_LINE_ERROR_EXIT_CODE,
            _ => GENERIC_ERROR_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_message_and_exit_code() {
        let err = CliError::MissingFile {
            argument: "page.".to_owned(),
            file: "page.cmd".to_owned(),
        };
        assert_eq!(err.to_string(), "argument `page.`: file `page.cmd` not found");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_other_errors_exit_with_one() {
        let err = CliError::Write {
            file: PathBuf::from("page.html"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("cannot write to `page.html`"));
        assert_eq!(err.exit_code(), 1);
    }
}
