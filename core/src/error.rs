//! Error types shared by the engine.
//!
//! Every failure the engine reports is recoverable: invocation problems abort
//! the current operation, parse problems mean "no data", and batch problems
//! report how far a multi-command operation got.

use std::io;

use thiserror::Error;

use crate::exclusions::ExclusionMode;

/// Failure to run the external tool or a non-zero exit from it.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The process could not be started at all (missing binary, permissions).
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("{program} exited with {}", describe_code(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

impl InvocationError {
    /// Text captured before the failure. The tool often explains itself on
    /// stdout before exiting non-zero, so callers should look at this.
    pub fn output(&self) -> &str {
        match self {
            Self::Launch { .. } => "",
            Self::Failed { output, .. } => output,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// The tool's output did not contain what we were looking for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("output does not contain {0:?}")]
    MissingMarker(&'static str),

    #[error("no locations found in output")]
    NoLocations,
}

/// Configuration file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level error returned by engine queries and commands.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Some domains of a bulk re-apply failed. The external tool's own state is
    /// authoritative; re-query it to see what actually stuck.
    #[error(
        "{} of {} domains failed to apply in {mode} mode",
        .failures.len(),
        .applied + .failures.len()
    )]
    PartialBatch {
        mode: ExclusionMode,
        applied: usize,
        failures: Vec<(String, String)>,
    },

    #[error("invalid domain {0:?}")]
    InvalidDomain(String),

    #[error("invalid location {0:?}")]
    InvalidLocation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_invocation_keeps_output() {
        let err = InvocationError::Failed {
            program: "adguardvpn-cli".to_string(),
            code: Some(1),
            output: "Warning: no license\n".to_string(),
        };
        assert_eq!(err.output(), "Warning: no license\n");
        assert_eq!(err.to_string(), "adguardvpn-cli exited with status 1");
    }

    #[test]
    fn launch_error_has_no_output() {
        let err = InvocationError::Launch {
            program: "missing".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.output(), "");
        assert!(err.to_string().starts_with("failed to launch missing"));
    }

    #[test]
    fn partial_batch_message_counts_failures() {
        let err = EngineError::PartialBatch {
            mode: ExclusionMode::Selective,
            applied: 3,
            failures: vec![("a.com".to_string(), "boom".to_string())],
        };
        assert_eq!(
            err.to_string(),
            "1 of 4 domains failed to apply in selective mode"
        );
    }
}
