use crate::terminal::{
    CreateOptions, DEFAULT_LIST_LIMIT, DEFAULT_READ_LINES, KillSignal, MAX_LIST_LIMIT,
    MAX_READ_LINES, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, TerminalError, TerminalManager,
    TerminalSession,
};
use crate::tools::base::{Adapter, clamped_u64, optional_str};
use crate::tools::{Tool, ToolResult};
use crate::utils::expand_home;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const ADAPTER_NAME: &str = "terminal-apis";

/// Build the terminal adapter over a shared session manager.
pub fn adapter(manager: TerminalManager, default_timeout: u64) -> Adapter {
    let default_timeout = default_timeout.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
    Adapter::new(
        ADAPTER_NAME,
        "Create, run, read, list and kill terminal sessions addressed by PID",
    )
    .with_tool(Arc::new(CreateTerminalTool {
        manager: manager.clone(),
        default_timeout,
    }))
    .with_tool(Arc::new(RunTerminalTool {
        manager: manager.clone(),
        default_timeout,
    }))
    .with_tool(Arc::new(ReadTerminalTool {
        manager: manager.clone(),
    }))
    .with_tool(Arc::new(ListTerminalsTool {
        manager: manager.clone(),
    }))
    .with_tool(Arc::new(KillTerminalTool { manager }))
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn pid_schema() -> Value {
    json!({
        "type": ["string", "integer"],
        "description": "Terminal PID"
    })
}

fn timeout_schema(default: u64) -> Value {
    json!({
        "type": "integer",
        "minimum": MIN_TIMEOUT_SECS,
        "maximum": MAX_TIMEOUT_SECS,
        "default": default,
        "description": "Timeout in seconds (1-300)"
    })
}

/// Accept a pid given either as a JSON number or as a numeric string.
fn parse_pid(params: &Value) -> std::result::Result<u32, String> {
    let raw = &params["pid"];
    let parsed = match raw {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("Invalid terminal PID: {raw}"))
}

fn failure(error: impl Into<String>, message: &str) -> ToolResult {
    ToolResult::error_json(json!({
        "success": false,
        "error": error.into(),
        "message": message,
    }))
}

/// Structured envelope for a manager error. `message` is the caller-facing hint.
fn terminal_failure(err: &TerminalError, message: &str) -> ToolResult {
    let mut body = json!({
        "success": false,
        "error": err.to_string(),
        "message": message,
    });
    match err {
        TerminalError::NotFound { available, .. } => {
            body["available_sessions"] = json!(
                available.iter().map(ToString::to_string).collect::<Vec<_>>()
            );
        }
        TerminalError::AlreadyRunning { command, .. } => {
            body["current_command"] = json!(command);
            body["status"] = json!("running");
            body["message"] = json!("Wait for current command to complete");
        }
        TerminalError::NotRunning { status, .. } => {
            body["status"] = json!(status.as_str());
            body["message"] = json!("Cannot kill non-running session");
        }
        TerminalError::Spawn(_) | TerminalError::NoPid => {}
    }
    ToolResult::error_json(body)
}

fn summary_json(session: &TerminalSession, is_active: bool) -> Value {
    json!({
        "pid": session.pid,
        "command": session.command,
        "cwd": session.cwd.display().to_string(),
        "status": session.status.as_str(),
        "exit_code": session.exit_code,
        "created_at": ts(&session.created_at),
        "last_updated": ts(&session.last_updated),
        "output_lines": session.output.len(),
        "is_active": is_active,
    })
}

struct CreateTerminalTool {
    manager: TerminalManager,
    default_timeout: u64,
}

#[async_trait]
impl Tool for CreateTerminalTool {
    fn name(&self) -> &'static str {
        "create_terminal"
    }

    fn description(&self) -> &'static str {
        "Create a new terminal session"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Command to run in the terminal"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory (defaults to current directory)"
                },
                "shell": {
                    "type": "string",
                    "description": "Shell to use (e.g., /bin/bash, cmd.exe)"
                },
                "timeout": timeout_schema(self.default_timeout),
                "background": {
                    "type": "boolean",
                    "default": false,
                    "description": "Run in background (don't wait for completion)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let Some(command) = optional_str(&params, "command") else {
            return Ok(failure(
                "Missing 'command' parameter",
                "Failed to create terminal session",
            ));
        };
        let timeout = clamped_u64(
            &params,
            "timeout",
            self.default_timeout,
            MIN_TIMEOUT_SECS,
            MAX_TIMEOUT_SECS,
        );
        let background = params["background"].as_bool().unwrap_or(false);

        let mut opts = CreateOptions::new(command)
            .timeout_secs(timeout)
            .background(background);
        if let Some(cwd) = optional_str(&params, "cwd") {
            opts = opts.cwd(expand_home(cwd));
        }
        if let Some(shell) = optional_str(&params, "shell") {
            opts = opts.shell(shell);
        }

        let session = match self.manager.create(opts) {
            Ok(session) => session,
            Err(TerminalError::NoPid) => {
                return Ok(failure(
                    TerminalError::NoPid.to_string(),
                    "Could not start terminal process",
                ));
            }
            Err(e) => return Ok(terminal_failure(&e, "Failed to create terminal session")),
        };

        let message = if background {
            format!("Terminal PID {} created and running in background", session.pid)
        } else {
            format!("Terminal PID {} created and running", session.pid)
        };
        Ok(ToolResult::json(json!({
            "pid": session.pid,
            "command": session.command,
            "cwd": session.cwd.display().to_string(),
            "shell": session.shell,
            "timeout": timeout,
            "background": background,
            "status": session.status.as_str(),
            "created_at": ts(&session.created_at),
            "message": message,
        })))
    }
}

struct RunTerminalTool {
    manager: TerminalManager,
    default_timeout: u64,
}

#[async_trait]
impl Tool for RunTerminalTool {
    fn name(&self) -> &'static str {
        "run_terminal"
    }

    fn description(&self) -> &'static str {
        "Run a command in a terminal (by PID) and return output"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pid": pid_schema(),
                "command": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Command to run"
                },
                "timeout": timeout_schema(self.default_timeout)
            },
            "required": ["pid", "command"]
        })
    }

    // Run waits for the subprocess, which carries its own timeout.
    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(MAX_TIMEOUT_SECS + 30)
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let pid = match parse_pid(&params) {
            Ok(pid) => pid,
            Err(e) => return Ok(failure(e, "Failed to run command in terminal")),
        };
        let Some(command) = optional_str(&params, "command") else {
            return Ok(failure(
                "Missing 'command' parameter",
                "Failed to run command in terminal",
            ));
        };
        let timeout = clamped_u64(
            &params,
            "timeout",
            self.default_timeout,
            MIN_TIMEOUT_SECS,
            MAX_TIMEOUT_SECS,
        );

        let started_at = Utc::now();
        let outcome = match self.manager.run(pid, command, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let hint = if matches!(e, TerminalError::NotFound { .. }) {
                    "Invalid session ID"
                } else {
                    "Failed to run command in terminal"
                };
                return Ok(terminal_failure(&e, hint));
            }
        };

        let session = &outcome.session;
        Ok(ToolResult::json(json!({
            "pid": session.pid,
            "command": session.command,
            "cwd": session.cwd.display().to_string(),
            "timeout": timeout,
            "status": session.status.as_str(),
            "exit_code": outcome.exit_code,
            "error": session.error,
            "stdout": outcome.stdout.trim(),
            "stderr": outcome.stderr.trim(),
            "started_at": ts(&started_at),
            "finished_at": ts(&session.last_updated),
            "message": format!("Command finished in terminal PID {}", session.pid),
        })))
    }
}

struct ReadTerminalTool {
    manager: TerminalManager,
}

#[async_trait]
impl Tool for ReadTerminalTool {
    fn name(&self) -> &'static str {
        "read_terminal"
    }

    fn description(&self) -> &'static str {
        "Read output from a terminal (by PID)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pid": pid_schema(),
                "lines": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_READ_LINES,
                    "default": DEFAULT_READ_LINES,
                    "description": "Number of recent lines to show (1-15000)"
                }
            },
            "required": ["pid"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let pid = match parse_pid(&params) {
            Ok(pid) => pid,
            Err(e) => return Ok(failure(e, "Failed to read terminal session")),
        };
        let lines = clamped_u64(
            &params,
            "lines",
            DEFAULT_READ_LINES as u64,
            1,
            MAX_READ_LINES as u64,
        ) as usize;

        let read = match self.manager.read(pid, lines) {
            Ok(read) => read,
            Err(e) => return Ok(terminal_failure(&e, "Invalid PID")),
        };

        let session = &read.session;
        let output: Vec<String> = read.lines.iter().map(ToString::to_string).collect();
        Ok(ToolResult::json(json!({
            "pid": session.pid,
            "command": session.command,
            "cwd": session.cwd.display().to_string(),
            "status": session.status.as_str(),
            "exit_code": session.exit_code,
            "error": session.error,
            "created_at": ts(&session.created_at),
            "last_updated": ts(&session.last_updated),
            "total_output_lines": read.total_lines,
            "recent_lines_shown": output.len(),
            "output": output,
            "is_active": read.is_active,
        })))
    }
}

struct ListTerminalsTool {
    manager: TerminalManager,
}

#[async_trait]
impl Tool for ListTerminalsTool {
    fn name(&self) -> &'static str {
        "list_terminals"
    }

    fn description(&self) -> &'static str {
        "List terminal sessions (by PID)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "include_completed": {
                    "type": "boolean",
                    "default": true,
                    "description": "Include completed sessions"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIST_LIMIT,
                    "default": DEFAULT_LIST_LIMIT,
                    "description": "Maximum sessions to show (1-50)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let include_completed = params["include_completed"].as_bool().unwrap_or(true);
        let limit = clamped_u64(
            &params,
            "limit",
            DEFAULT_LIST_LIMIT as u64,
            1,
            MAX_LIST_LIMIT as u64,
        ) as usize;

        let listed = self.manager.list(include_completed, limit);
        let sessions: Vec<Value> = listed
            .sessions
            .iter()
            .map(|s| summary_json(&s.session, s.is_active))
            .collect();
        Ok(ToolResult::json(json!({
            "total_sessions": listed.total,
            "active_sessions": listed.running,
            "completed_sessions": listed.completed,
            "error_sessions": listed.error,
            "sessions_shown": sessions.len(),
            "include_completed": include_completed,
            "sessions": sessions,
        })))
    }
}

struct KillTerminalTool {
    manager: TerminalManager,
}

#[async_trait]
impl Tool for KillTerminalTool {
    fn name(&self) -> &'static str {
        "kill_terminal"
    }

    fn description(&self) -> &'static str {
        "Kill a running terminal session"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pid": pid_schema(),
                "signal": {
                    "type": "string",
                    "enum": ["SIGTERM", "SIGKILL"],
                    "default": "SIGTERM",
                    "description": "Signal to send (SIGTERM or SIGKILL)"
                }
            },
            "required": ["pid"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let pid = match parse_pid(&params) {
            Ok(pid) => pid,
            Err(e) => return Ok(failure(e, "Failed to kill terminal session")),
        };
        let signal = match optional_str(&params, "signal").map(str::parse::<KillSignal>) {
            None => KillSignal::default(),
            Some(Ok(signal)) => signal,
            Some(Err(e)) => return Ok(failure(e, "Failed to kill terminal session")),
        };

        match self.manager.kill(pid, signal) {
            Ok(session) => Ok(ToolResult::json(json!({
                "pid": session.pid,
                "signal": signal.as_str(),
                "killed_at": ts(&session.last_updated),
                "command": session.command,
                "message": format!("Terminal PID {} killed with {}", pid, signal),
            }))),
            Err(e) => {
                let hint = if matches!(e, TerminalError::NotFound { .. }) {
                    "Invalid session ID"
                } else {
                    "Failed to kill terminal session"
                };
                Ok(terminal_failure(&e, hint))
            }
        }
    }
}

#[cfg(test)]
mod tests;
