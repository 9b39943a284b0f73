#![allow(dead_code)]

use cmdpipe::Cmd;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// A `sh -c <script>` command, with the script passed as one argument.
pub fn sh(script: &str) -> Cmd {
    Cmd::new("sh -c").with_args([script])
}

/// Write an executable shell script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();

    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();

    path
}

/// What `stage` prints when fed `input` on stdin, computed through the shell.
pub fn feed_through_shell(input: &str, stage: &str) -> String {
    let script = format!("printf '%s' \"$1\" | {}", stage);
    let cmd = Cmd::new("sh -c").with_args([script.as_str(), "sh", input]);
    cmdpipe::runner::combined_output(&cmd).unwrap()
}
