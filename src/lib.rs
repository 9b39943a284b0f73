//! Build and run OS commands, including multi-stage pipelines where the
//! stdout of one process feeds the stdin of the next.

pub mod clipboard;
pub mod cmd;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod runner;

pub use cmd::Cmd;
pub use error::{CmdError, OutputError, PipelineError};
pub use pipeline::{PipelineOutput, pipeline};
