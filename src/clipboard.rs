use crate::cmd::Cmd;
use crate::error::PipelineError;
use crate::pipeline::pipeline;
use crate::platform::{self, Platform};

/// The two stages that put `data` on the clipboard: `echo <data>` piped into
/// the platform's clipboard tool.
pub fn copy_commands(platform: Platform, data: &str) -> [Cmd; 2] {
    [
        Cmd::new("echo").with_args([data]),
        Cmd::new(platform.clipboard_tool()),
    ]
}

/// Copy text to the system clipboard.
///
/// No check is made that the clipboard tool exists; a missing tool surfaces
/// as "command not found".
pub fn copy(data: &str) -> Result<(), PipelineError> {
    pipeline(&copy_commands(platform::CURRENT, data)).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_commands_echo_data_as_single_argument() {
        let [echo, tool] = copy_commands(Platform::Unix, "hello world");
        assert_eq!(echo.program(), "echo");
        assert_eq!(echo.args(), ["hello world"]);
        assert_eq!(tool.program(), "pbcopy");
        assert!(tool.args().is_empty());
    }

    #[test]
    fn test_copy_commands_do_not_retokenize_data() {
        let [echo, _] = copy_commands(Platform::Windows, "it's \"quoted\"");
        assert_eq!(echo.args(), ["it's \"quoted\""]);
    }

    #[test]
    fn test_copy_commands_windows_tool() {
        let [_, tool] = copy_commands(Platform::Windows, "x");
        assert_eq!(tool.program(), "clip");
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_copy_to_clipboard() {
        copy("hello world").unwrap();
        let pasted = crate::runner::combined_output(&Cmd::new("pbpaste")).unwrap();
        assert_eq!(pasted, "hello world\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_copy_without_pbcopy_reports_not_found() {
        let has_pbcopy = crate::runner::combined_output(&Cmd::new("sh -c").with_args(["command -v pbcopy"])).is_ok();
        if has_pbcopy {
            return;
        }
        let err = copy("hello world").unwrap_err();
        assert!(err.error.is_not_found());
    }
}
