use super::*;
use serde_json::json;

fn tool(ws: &tempfile::TempDir) -> RunCommandTool {
    RunCommandTool::new(ws.path().to_path_buf(), 10, 12_000, None)
}

#[tokio::test]
async fn test_run_command_captures_stdout() {
    let ws = tempfile::tempdir().unwrap();
    let result = tool(&ws)
        .execute(json!({"command": "echo hello"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result.output.trim(), "hello");
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_run_command_combines_stderr() {
    let ws = tempfile::tempdir().unwrap();
    let result = tool(&ws)
        .execute(
            json!({"command": "echo out; echo err >&2"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert!(result.output.contains("out"));
    assert!(result.output.contains("err"));
}

#[tokio::test]
async fn test_run_command_nonzero_exit_marker() {
    let ws = tempfile::tempdir().unwrap();
    let result = tool(&ws)
        .execute(
            json!({"command": "echo failing; exit 3"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert!(result.output.contains("failing"));
    assert!(result.output.ends_with("[exit code: 3]"));
}

#[tokio::test]
async fn test_run_command_timeout_yields_124() {
    let ws = tempfile::tempdir().unwrap();
    let tool = RunCommandTool::new(ws.path().to_path_buf(), 1, 12_000, None);
    let result = tool
        .execute(json!({"command": "sleep 30"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert!(result.output.contains("[exit code: 124]"));
}

#[tokio::test]
async fn test_run_command_cancellation() {
    let ws = tempfile::tempdir().unwrap();
    let ctx = ExecutionContext::default();
    ctx.cancel.cancel();
    let err = tool(&ws)
        .execute(json!({"command": "sleep 30"}), &ctx)
        .await
        .unwrap_err();
    let err = err.downcast::<crate::errors::NeoclawError>().unwrap();
    assert!(err.is_canceled());
}

#[tokio::test]
async fn test_run_command_runs_in_workspace() {
    let ws = tempfile::tempdir().unwrap();
    let result = tool(&ws)
        .execute(json!({"command": "pwd"}), &ExecutionContext::default())
        .await
        .unwrap();
    let reported = PathBuf::from(result.output.trim());
    let expected = ws.path().canonicalize().unwrap();
    assert_eq!(reported.canonicalize().unwrap_or(reported), expected);
}

#[tokio::test]
async fn test_run_command_workdir_subpath() {
    let ws = tempfile::tempdir().unwrap();
    std::fs::create_dir(ws.path().join("sub")).unwrap();
    let result = tool(&ws)
        .execute(
            json!({"command": "basename \"$PWD\"", "workdir": "sub"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.output.trim(), "sub");
}

#[tokio::test]
async fn test_run_command_workdir_escape_rejected() {
    let ws = tempfile::tempdir().unwrap();
    let err = tool(&ws)
        .execute(
            json!({"command": "pwd", "workdir": "../"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("outside the workspace"));
}

#[tokio::test]
async fn test_run_command_truncates_and_spills() {
    let ws = tempfile::tempdir().unwrap();
    let tool = RunCommandTool::new(ws.path().to_path_buf(), 10, 200, None);
    let result = tool
        .execute(
            json!({"command": "yes x | head -n 500"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert!(result.truncated);
    assert!(result.output.contains("[output truncated"));
    let full_path = result.full_output_path.expect("spill file");
    let full = std::fs::read_to_string(&full_path).unwrap();
    assert_eq!(full.lines().filter(|l| *l == "x").count(), 500);
    std::fs::remove_file(full_path).ok();
}

#[tokio::test]
async fn test_run_command_proxy_env_wiring() {
    let ws = tempfile::tempdir().unwrap();
    let tool = RunCommandTool::new(
        ws.path().to_path_buf(),
        10,
        12_000,
        Some("127.0.0.1:9".to_string()),
    );
    let result = tool
        .execute(
            json!({"command": "echo $HTTP_PROXY"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.output.trim(), "http://127.0.0.1:9");
}

#[tokio::test]
async fn test_run_command_empty_output_placeholder() {
    let ws = tempfile::tempdir().unwrap();
    let result = tool(&ws)
        .execute(json!({"command": "true"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result.output, "(no output)");
}
