use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while provisioning.
///
/// Nothing here is recovered locally: every variant aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Undefined variable '{name}' in '{template}'")]
    UndefinedVariable { name: String, template: String },

    #[error("Cannot {operation} while profile block is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Invalid assignment '{input}' (expected NAME=value)")]
    InvalidAssignment { input: String },

    #[error("Command '{program}' failed{}", exit_suffix(.code))]
    ExternalCommand { program: String, code: Option<i32> },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code the process should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ExternalCommand {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_from_external_command() {
        let err = Error::ExternalCommand {
            program: "apt-get".to_string(),
            code: Some(100),
        };
        assert_eq!(err.exit_code(), 100);
        assert!(err.to_string().contains("exit code 100"));
    }

    #[test]
    fn test_exit_code_defaults_to_one() {
        let err = Error::ExternalCommand {
            program: "vim".to_string(),
            code: None,
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("signal"));

        let err = Error::InvalidAssignment {
            input: "FOO".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
    }
}
