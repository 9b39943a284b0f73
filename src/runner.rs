use std::io::{self, Read};
use std::process::{ExitStatus, Stdio};

use tracing::debug;

use crate::cmd::Cmd;
use crate::error::{CmdError, OutputError};
#[cfg(unix)]
use crate::platform;

/// Run a command with stdout and stderr merged into one captured stream.
///
/// Both streams share a single pipe, so the text interleaves in the order the
/// child wrote it. Stdin is connected to the null device.
pub fn combined_output(cmd: &Cmd) -> Result<String, OutputError> {
    let mut captured = Vec::new();
    let result = capture_combined(cmd, &mut captured);
    let output = String::from_utf8_lossy(&captured).into_owned();

    match result {
        Ok(()) => Ok(output),
        Err(error) => Err(OutputError { output, error }),
    }
}

fn capture_combined(cmd: &Cmd, captured: &mut Vec<u8>) -> Result<(), CmdError> {
    let (mut reader, writer) = io::pipe().map_err(CmdError::Pipe)?;

    let mut command = cmd.to_command();
    command
        .stdin(Stdio::null())
        .stdout(writer.try_clone().map_err(CmdError::Pipe)?)
        .stderr(writer);

    debug!(command = %cmd, "spawning with combined output");
    let mut child = command
        .spawn()
        .map_err(|e| CmdError::spawn(cmd.program(), e))?;

    // The command still owns our copies of the write end; reading would never
    // see EOF while it is alive.
    drop(command);

    let read = reader.read_to_end(captured);
    let status = child.wait().map_err(|source| CmdError::Wait {
        program: cmd.program().to_string(),
        source,
    })?;
    read.map_err(CmdError::Capture)?;

    check_status(cmd.program(), status)
}

/// Spawn a command with the caller's stdin, stdout and stderr and wait for it.
pub fn spawn(cmd: &Cmd) -> Result<(), CmdError> {
    debug!(command = %cmd, "spawning with inherited stdio");
    let status = cmd
        .to_command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| CmdError::spawn(cmd.program(), e))?;

    check_status(cmd.program(), status)
}

/// Replace the current process with the command.
///
/// Only returns if the exec failed.
#[cfg(unix)]
pub fn exec(cmd: &Cmd) -> CmdError {
    let argv: Vec<&str> = std::iter::once(cmd.program())
        .chain(cmd.args().iter().map(String::as_str))
        .collect();

    debug!(command = %cmd, "replacing process image");
    let source = match ::exec::execvp(cmd.program(), &argv) {
        ::exec::Error::Errno(errno) => io::Error::from_raw_os_error(errno.0),
        ::exec::Error::BadArgument(nul) => io::Error::new(io::ErrorKind::InvalidInput, nul),
    };

    if source.kind() == io::ErrorKind::NotFound {
        CmdError::NotFound(cmd.program().to_string())
    } else {
        CmdError::Exec {
            program: cmd.program().to_string(),
            source,
        }
    }
}

/// Hand the terminal to a command.
///
/// Where the platform can replace the process image this never returns on
/// success. Elsewhere the command is spawned and waited on, and a failing
/// exit status comes back as an error.
pub fn run(cmd: &Cmd) -> Result<(), CmdError> {
    run_interactive(cmd)
}

#[cfg(unix)]
fn run_interactive(cmd: &Cmd) -> Result<(), CmdError> {
    if platform::CURRENT.supports_exec() {
        Err(exec(cmd))
    } else {
        spawn(cmd)
    }
}

#[cfg(not(unix))]
fn run_interactive(cmd: &Cmd) -> Result<(), CmdError> {
    spawn(cmd)
}

/// Open a location (file, directory or URL) with the macOS `open` tool.
pub fn open(location: &str) -> Result<(), CmdError> {
    run(&Cmd::new("open").with_args([location]))
}

pub(crate) fn check_status(program: &str, status: ExitStatus) -> Result<(), CmdError> {
    if status.success() {
        Ok(())
    } else {
        Err(CmdError::Exit {
            program: program.to_string(),
            status,
        })
    }
}
