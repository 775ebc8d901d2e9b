use super::*;
use crate::tools::ToolContent;

fn tools() -> (TerminalManager, Adapter) {
    let manager = TerminalManager::new("/bin/sh", None);
    let adapter = adapter(manager.clone(), 60);
    (manager, adapter)
}

fn tool<'a>(adapter: &'a Adapter, name: &str) -> &'a Arc<dyn Tool> {
    adapter
        .tools
        .iter()
        .find(|t| t.name() == name)
        .unwrap_or_else(|| panic!("missing tool {name}"))
}

fn body(result: &ToolResult) -> &Value {
    match result.content.first() {
        Some(ToolContent::Json(v)) => v,
        other => panic!("expected json content, got {other:?}"),
    }
}

#[test]
fn test_adapter_exposes_five_tools() {
    let (_, adapter) = tools();
    assert_eq!(adapter.name, ADAPTER_NAME);
    assert_eq!(
        adapter.tool_names(),
        vec![
            "create_terminal",
            "run_terminal",
            "read_terminal",
            "list_terminals",
            "kill_terminal"
        ]
    );
}

#[test]
fn test_parse_pid_accepts_string_or_number() {
    assert_eq!(parse_pid(&json!({"pid": 42})), Ok(42));
    assert_eq!(parse_pid(&json!({"pid": " 42 "})), Ok(42));
    assert!(parse_pid(&json!({"pid": "abc"})).is_err());
    assert!(parse_pid(&json!({"pid": -1})).is_err());
    assert!(parse_pid(&json!({})).is_err());
}

#[tokio::test]
async fn test_read_unknown_pid_lists_available_sessions() {
    let (_, adapter) = tools();
    let result = tool(&adapter, "read_terminal")
        .execute(json!({"pid": "123"}))
        .await
        .unwrap();
    assert!(result.is_error);
    let body = body(&result);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Terminal PID 123 not found");
    assert_eq!(body["available_sessions"], json!([]));
    assert_eq!(body["message"], "Invalid PID");
}

#[tokio::test]
async fn test_kill_rejects_unknown_signal() {
    let (_, adapter) = tools();
    let result = tool(&adapter, "kill_terminal")
        .execute(json!({"pid": 1, "signal": "SIGHUP"}))
        .await
        .unwrap();
    assert!(result.is_error);
}

#[tokio::test]
async fn test_list_empty() {
    let (_, adapter) = tools();
    let result = tool(&adapter, "list_terminals")
        .execute(json!({}))
        .await
        .unwrap();
    assert!(!result.is_error);
    let body = body(&result);
    assert_eq!(body["total_sessions"], 0);
    assert_eq!(body["sessions_shown"], 0);
    assert_eq!(body["include_completed"], true);
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_then_read_and_rerun() {
    let (manager, adapter) = tools();
    let created = tool(&adapter, "create_terminal")
        .execute(json!({"command": "echo hi", "timeout": 5}))
        .await
        .unwrap();
    assert!(!created.is_error);
    let created = body(&created).clone();
    assert_eq!(created["status"], "running");
    assert_eq!(created["timeout"], 5);
    assert_eq!(created["background"], false);
    let pid = u32::try_from(created["pid"].as_u64().unwrap()).unwrap();
    assert_eq!(
        created["message"],
        format!("Terminal PID {pid} created and running")
    );

    for _ in 0..100 {
        if !manager.is_active(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let read = tool(&adapter, "read_terminal")
        .execute(json!({"pid": pid.to_string()}))
        .await
        .unwrap();
    let read = body(&read);
    assert_eq!(read["status"], "completed");
    assert_eq!(read["exit_code"], 0);
    assert_eq!(read["total_output_lines"], 1);
    assert_eq!(read["is_active"], false);
    let line = read["output"][0].as_str().unwrap();
    assert!(line.starts_with("[STDOUT] "));
    assert!(line.ends_with(": hi"));

    let run = tool(&adapter, "run_terminal")
        .execute(json!({"pid": pid, "command": "echo again"}))
        .await
        .unwrap();
    assert!(!run.is_error);
    let run = body(&run);
    assert_eq!(run["stdout"], "again");
    assert_eq!(run["stderr"], "");
    assert_eq!(run["status"], "completed");
    assert_eq!(run["exit_code"], 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_reports_start_and_finish_times() {
    let (manager, adapter) = tools();
    let created = tool(&adapter, "create_terminal")
        .execute(json!({"command": "true", "timeout": 5}))
        .await
        .unwrap();
    let pid = u32::try_from(body(&created)["pid"].as_u64().unwrap()).unwrap();
    for _ in 0..100 {
        if !manager.is_active(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let run = tool(&adapter, "run_terminal")
        .execute(json!({"pid": pid, "command": "sleep 1; echo late"}))
        .await
        .unwrap();
    let run = body(&run);
    assert_eq!(run["stdout"], "late");
    let started = DateTime::parse_from_rfc3339(run["started_at"].as_str().unwrap()).unwrap();
    let finished = DateTime::parse_from_rfc3339(run["finished_at"].as_str().unwrap()).unwrap();
    assert!(finished - started >= chrono::Duration::milliseconds(900));
}

#[cfg(unix)]
#[tokio::test]
async fn test_kill_running_then_not_running() {
    let (_, adapter) = tools();
    let created = tool(&adapter, "create_terminal")
        .execute(json!({"command": "sleep 10", "timeout": 30}))
        .await
        .unwrap();
    let pid = body(&created)["pid"].as_u64().unwrap();

    let killed = tool(&adapter, "kill_terminal")
        .execute(json!({"pid": pid, "signal": "SIGKILL"}))
        .await
        .unwrap();
    assert!(!killed.is_error);
    assert_eq!(body(&killed)["signal"], "SIGKILL");

    let again = tool(&adapter, "kill_terminal")
        .execute(json!({"pid": pid}))
        .await
        .unwrap();
    assert!(again.is_error);
    let again = body(&again);
    assert_eq!(again["error"], format!("Terminal PID {pid} is not running"));
    assert_eq!(again["status"], "error");
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_while_running_is_rejected() {
    let (_, adapter) = tools();
    let created = tool(&adapter, "create_terminal")
        .execute(json!({"command": "sleep 5"}))
        .await
        .unwrap();
    let pid = body(&created)["pid"].as_u64().unwrap();

    let run = tool(&adapter, "run_terminal")
        .execute(json!({"pid": pid, "command": "echo nope"}))
        .await
        .unwrap();
    assert!(run.is_error);
    let run = body(&run);
    assert_eq!(run["current_command"], "sleep 5");
    assert_eq!(run["status"], "running");

    tool(&adapter, "kill_terminal")
        .execute(json!({"pid": pid, "signal": "SIGKILL"}))
        .await
        .unwrap();
}
