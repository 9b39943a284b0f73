use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::pipeline::PipelineOutput;

/// Errors produced while building or running commands.
#[derive(Debug, Error)]
pub enum CmdError {
    #[error("invalid command line {line:?}: {source}")]
    Parse {
        line: String,
        #[source]
        source: shell_words::ParseError,
    },

    #[error("empty command line")]
    EmptyCommand,

    #[error("command not found: {0}")]
    NotFound(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} {}", describe_status(.status))]
    Exit { program: String, status: ExitStatus },

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to read captured output: {0}")]
    Capture(#[source] io::Error),
}

impl CmdError {
    /// Map a spawn failure, turning a missing executable into `NotFound`.
    pub(crate) fn spawn(program: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            CmdError::NotFound(program.to_string())
        } else {
            CmdError::Spawn {
                program: program.to_string(),
                source,
            }
        }
    }

    /// Exit status of the failed process, if the failure was a non-zero exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            CmdError::Exit { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CmdError::NotFound(_))
    }
}

/// Human-readable reason for a non-successful exit.
pub fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with status {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signo) = status.signal() {
            return match nix::sys::signal::Signal::try_from(signo) {
                Ok(signal) => format!("terminated by {}", signal.as_str()),
                Err(_) => format!("terminated by signal {}", signo),
            };
        }
    }

    "terminated abnormally".to_string()
}

/// Failure from a combined-output run, with whatever was captured.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OutputError {
    pub output: String,
    #[source]
    pub error: CmdError,
}

/// Failure from a pipeline run.
///
/// `partial` holds the final-stage stdout and pooled stderr received up to the
/// point of failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineError {
    pub partial: PipelineOutput,
    #[source]
    pub error: CmdError,
}
