use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Credentials this process reads from its own environment. They are stripped
/// from every child so that a terminal session cannot echo them back.
const SCRUBBED_ENV_VARS: &[&str] = &[
    "WEBSEARCH_OPENWEATHER_API_KEY",
    "WEBSEARCH_WEATHERAPI_KEY",
];

/// Build a `Command` that runs `command` through `shell` in `cwd`.
///
/// stdout and stderr are piped, stdin is closed, and the child is killed when its
/// handle is dropped. On Unix the child leads its own process group, so a signal
/// sent to the negated pid reaches everything the shell started.
pub fn shell_command(shell: &str, command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new(shell);
    if cfg!(windows) {
        cmd.arg("/C");
    } else {
        cmd.arg("-c");
    }
    cmd.arg(command);
    for &var in SCRUBBED_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Platform default shell.
pub fn default_shell() -> &'static str {
    if cfg!(windows) { "cmd" } else { "/bin/sh" }
}
