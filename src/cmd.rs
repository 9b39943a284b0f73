use std::fmt;
use std::process::Command;

use crate::error::CmdError;

/// An OS command: a program name plus its positional arguments.
///
/// The program is resolved against `PATH` when the command is run, not when
/// it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
}

impl Cmd {
    /// Build a command from a literal command line, split with shell quoting
    /// rules.
    ///
    /// # Panics
    ///
    /// Panics if the line has unbalanced quotes or contains no tokens. Use
    /// [`Cmd::parse`] for lines that come from user input.
    pub fn new(line: &str) -> Self {
        Self::parse(line).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Fallible version of [`Cmd::new`].
    pub fn parse(line: &str) -> Result<Self, CmdError> {
        let mut words = shell_words::split(line)
            .map_err(|source| CmdError::Parse {
                line: line.to_string(),
                source,
            })?
            .into_iter();

        let program = match words.next() {
            Some(program) if !program.is_empty() => program,
            _ => return Err(CmdError::EmptyCommand),
        };

        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Append arguments, in order, and hand the command back for chaining.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// A `std::process::Command` for this command, not yet spawned.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}
