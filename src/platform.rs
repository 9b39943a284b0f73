/// Host platform family, fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

/// The platform this binary was built for.
pub const CURRENT: Platform = if cfg!(windows) {
    Platform::Windows
} else {
    Platform::Unix
};

impl Platform {
    /// Whether the current process image can be replaced in place (exec).
    pub fn supports_exec(self) -> bool {
        match self {
            Platform::Windows => false,
            Platform::Unix => true,
        }
    }

    /// Tool that writes its stdin to the system clipboard.
    pub fn clipboard_tool(self) -> &'static str {
        match self {
            Platform::Windows => "clip",
            Platform::Unix => "pbcopy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_tool_per_platform() {
        assert_eq!(Platform::Windows.clipboard_tool(), "clip");
        assert_eq!(Platform::Unix.clipboard_tool(), "pbcopy");
    }

    #[test]
    fn test_current_matches_build_target() {
        assert_eq!(CURRENT == Platform::Windows, cfg!(windows));
        assert_eq!(CURRENT.supports_exec(), !cfg!(windows));
    }
}
