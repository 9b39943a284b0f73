//! Multi-stage process pipelines.
//!
//! Every stage is its own OS process. Stage *i*'s stdout is connected to
//! stage *i+1*'s stdin by an OS pipe and the last stage's stdout goes to a
//! capture sink. Each stage's stderr gets its own pipe, and all of them are
//! drained into one shared buffer. All stages are started before any is
//! waited on: pipe buffers are bounded, and waiting on an upstream stage
//! whose consumer has not started can deadlock.

use std::io::{self, PipeReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::cmd::Cmd;
use crate::error::{CmdError, PipelineError};
use crate::runner::check_status;

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Captured text from a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Standard output of the last stage only.
    pub stdout: String,
    /// Standard error of every stage, pooled without stage attribution.
    pub stderr: String,
}

/// Run `cmds` as a pipeline and collect the last stage's stdout and every
/// stage's stderr.
///
/// An empty list is a no-op and succeeds with empty output.
///
/// If a stage fails to start, the remaining stages are not started and
/// nothing already started is waited on. If a stage exits unsuccessfully the
/// wait loop stops there; later stages may be left running. In both cases
/// the error carries whatever output had been captured so far, including
/// all stderr written by stages that have been waited on.
pub fn pipeline(cmds: &[Cmd]) -> Result<PipelineOutput, PipelineError> {
    if cmds.is_empty() {
        return Ok(PipelineOutput::default());
    }

    let fail = |error| PipelineError {
        partial: PipelineOutput::default(),
        error,
    };

    let (stdout_reader, stdout_writer) = io::pipe().map_err(|e| fail(CmdError::Pipe(e)))?;
    let stdout = Sink::drain("cmdpipe-stdout", stdout_reader, Buffer::default()).map_err(fail)?;

    let run = Run {
        stdout,
        stderr: Buffer::default(),
    };

    let commands = match connect(cmds, stdout_writer) {
        Ok(commands) => commands,
        Err(error) => return Err(run.fail(error)),
    };

    // Each command owns parent-side copies of its pipe ends; dropping it
    // right after spawning lets readers see EOF once the children exit.
    let mut stages = Vec::with_capacity(cmds.len());
    for (cmd, (mut command, stderr_reader)) in cmds.iter().zip(commands) {
        let stderr = match Sink::drain("cmdpipe-stderr", stderr_reader, Arc::clone(&run.stderr)) {
            Ok(sink) => sink,
            Err(error) => return Err(run.fail(error)),
        };

        debug!(stage = stages.len(), command = %cmd, "starting pipeline stage");
        match command.spawn() {
            Ok(child) => stages.push(Stage { child, stderr }),
            Err(e) => return Err(run.fail(CmdError::spawn(cmd.program(), e))),
        }
    }

    for (index, (cmd, mut stage)) in cmds.iter().zip(stages).enumerate() {
        let status = match stage.child.wait() {
            Ok(status) => status,
            Err(source) => {
                return Err(run.fail(CmdError::Wait {
                    program: cmd.program().to_string(),
                    source,
                }));
            }
        };
        trace!(stage = index, command = %cmd, %status, "pipeline stage exited");

        // The stage has exited, so its stderr pipe reaches EOF once the
        // drainer has copied everything it wrote.
        let drained = stage.stderr.join();

        if let Err(error) = check_status(cmd.program(), status) {
            return Err(run.fail(error));
        }
        if let Some(error) = drained {
            return Err(run.fail(error));
        }
    }

    run.finish()
}

/// Materialise one `Command` per stage with its stdio wired up, paired with
/// the read end of that stage's stderr pipe. Nothing is spawned yet.
fn connect(cmds: &[Cmd], stdout: io::PipeWriter) -> Result<Vec<(Command, PipeReader)>, CmdError> {
    let mut commands: Vec<Command> = cmds.iter().map(Cmd::to_command).collect();
    let last = commands.len() - 1;

    commands[0].stdin(Stdio::null());

    for i in 0..last {
        let (reader, writer) = io::pipe().map_err(CmdError::Pipe)?;
        commands[i].stdout(writer);
        commands[i + 1].stdin(reader);
    }
    commands[last].stdout(stdout);

    commands
        .into_iter()
        .map(|mut command| -> Result<(Command, PipeReader), CmdError> {
            let (reader, writer) = io::pipe().map_err(CmdError::Pipe)?;
            command.stderr(writer);
            Ok((command, reader))
        })
        .collect()
}

struct Stage {
    child: Child,
    stderr: Sink,
}

struct Run {
    stdout: Sink,
    stderr: Buffer,
}

impl Run {
    /// Snapshot the buffers without waiting for writers that may still be
    /// running.
    fn fail(&self, error: CmdError) -> PipelineError {
        PipelineError {
            partial: PipelineOutput {
                stdout: self.stdout.text(),
                stderr: text(&self.stderr),
            },
            error,
        }
    }

    /// Drain the final stdout to EOF. Only valid once every stage has exited
    /// and its stderr has been drained.
    fn finish(self) -> Result<PipelineOutput, PipelineError> {
        let stdout = self.stdout.text_after_eof();
        let output = PipelineOutput {
            stdout: stdout.0,
            stderr: text(&self.stderr),
        };

        match stdout.1 {
            None => Ok(output),
            Some(error) => Err(PipelineError {
                partial: output,
                error,
            }),
        }
    }
}

fn text(buffer: &Buffer) -> String {
    let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A pipe read end drained into a shared buffer by a background thread.
struct Sink {
    buffer: Buffer,
    handle: JoinHandle<io::Result<()>>,
}

impl Sink {
    fn drain(name: &str, mut reader: PipeReader, buffer: Buffer) -> Result<Self, CmdError> {
        let shared = Arc::clone(&buffer);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    let n = match reader.read(&mut chunk) {
                        Ok(0) => return Ok(()),
                        Ok(n) => n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    };
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]);
                }
            })
            .map_err(CmdError::Capture)?;

        Ok(Self { buffer, handle })
    }

    fn text(&self) -> String {
        text(&self.buffer)
    }

    /// Wait for the drainer to hit EOF.
    fn join(self) -> Option<CmdError> {
        let Sink { handle, .. } = self;
        match handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(CmdError::Capture(e)),
            Err(_) => Some(CmdError::Capture(io::Error::other("capture thread panicked"))),
        }
    }

    fn text_after_eof(self) -> (String, Option<CmdError>) {
        let buffer = Arc::clone(&self.buffer);
        let error = self.join();
        let text = text(&buffer);
        trace!(bytes = text.len(), "capture sink drained");
        (text, error)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> Cmd {
        Cmd::new("sh -c").with_args([script])
    }

    #[test]
    fn test_empty_pipeline_is_noop() {
        let output = pipeline(&[]).unwrap();
        assert_eq!(output, PipelineOutput::default());
    }

    #[test]
    fn test_single_stage_matches_combined_output_stdout() {
        let cmd = Cmd::new("printf abc");
        let output = pipeline(std::slice::from_ref(&cmd)).unwrap();
        assert_eq!(output.stdout, crate::runner::combined_output(&cmd).unwrap());
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn test_single_stage_stderr_goes_to_shared_buffer() {
        let output = pipeline(&[sh("printf out; printf err >&2")]).unwrap();
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
    }

    #[test]
    fn test_two_stage_composition() {
        let output = pipeline(&[
            Cmd::new("printf").with_args(["hello world"]),
            Cmd::new("tr a-z A-Z"),
        ])
        .unwrap();
        assert_eq!(output.stdout, "HELLO WORLD");
    }

    #[test]
    fn test_stderr_pooled_across_stages() {
        let output = pipeline(&[
            sh("printf one >&2; printf data"),
            sh("cat >/dev/null; printf two >&2; printf final"),
        ])
        .unwrap();
        assert_eq!(output.stdout, "final");
        // The first stage has exited before the second writes, since the
        // second waits for EOF on its stdin.
        assert_eq!(output.stderr, "onetwo");
    }

    #[test]
    fn test_large_intermediate_output_does_not_deadlock() {
        // Far more than a pipe buffer holds.
        let output = pipeline(&[
            Cmd::new("head -c 1048576 /dev/zero"),
            Cmd::new("wc -c"),
        ])
        .unwrap();
        assert_eq!(output.stdout.trim(), "1048576");
    }

    #[test]
    fn test_large_final_output_is_fully_captured() {
        let output = pipeline(&[Cmd::new("head -c 300000 /dev/zero"), Cmd::new("cat")]).unwrap();
        assert_eq!(output.stdout.len(), 300000);
    }

    #[test]
    fn test_missing_first_stage_returns_promptly() {
        let started = Instant::now();
        let err = pipeline(&[Cmd::new("cmdpipe-no-such-program"), Cmd::new("cat")]).unwrap_err();
        assert!(err.error.is_not_found());
        assert_eq!(err.partial, PipelineOutput::default());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_last_stage_reports_not_found() {
        let err = pipeline(&[Cmd::new("printf x"), Cmd::new("cmdpipe-no-such-program")]).unwrap_err();
        assert_eq!(err.to_string(), "command not found: cmdpipe-no-such-program");
    }

    #[test]
    fn test_failing_stage_keeps_partial_output() {
        let err = pipeline(&[sh("printf oops >&2; exit 4"), Cmd::new("cat")]).unwrap_err();
        assert_eq!(err.error.exit_status().and_then(|s| s.code()), Some(4));

        assert_eq!(err.partial.stderr, "oops");
    }

    #[test]
    fn test_failing_stage_stderr_kept_while_later_stage_runs() {
        for _ in 0..50 {
            let err = pipeline(&[sh("printf oops >&2; exit 4"), Cmd::new("sleep 1")]).unwrap_err();
            assert_eq!(err.partial.stderr, "oops");
        }
    }

    #[test]
    fn test_stderr_of_waited_stages_pooled_on_failure() {
        let err = pipeline(&[
            sh("printf one >&2; printf data"),
            sh("cat >/dev/null; printf two >&2; exit 3"),
        ])
        .unwrap_err();
        assert_eq!(err.error.exit_status().and_then(|s| s.code()), Some(3));
        assert_eq!(err.partial.stderr, "onetwo");
    }

    #[test]
    fn test_failing_last_stage() {
        let err = pipeline(&[Cmd::new("printf abc"), sh("cat; exit 2")]).unwrap_err();
        assert_eq!(err.to_string(), "sh exited with status 2");
    }

    #[test]
    fn test_three_stage_pipeline() {
        let output = pipeline(&[
            Cmd::new("printf").with_args(["cherry\napple\nbanana\n"]),
            Cmd::new("sort"),
            Cmd::new("head -n 1"),
        ])
        .unwrap();
        assert_eq!(output.stdout, "apple\n");
    }
}
