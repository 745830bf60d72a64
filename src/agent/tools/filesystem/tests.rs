use super::*;
use crate::agent::tools::base::ExecutionContext;
use serde_json::json;

fn workspace() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

// --- read_file ---

#[tokio::test]
async fn test_read_file_relative_resolves_in_workspace() {
    let ws = workspace();
    std::fs::write(ws.path().join("notes.txt"), "hello world").unwrap();
    let tool = ReadFileTool::new(ws.path().to_path_buf());
    let result = tool
        .execute(json!({"path": "notes.txt"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result.output, "hello world");
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_read_file_missing_errors() {
    let ws = workspace();
    let tool = ReadFileTool::new(ws.path().to_path_buf());
    let err = tool
        .execute(json!({"path": "absent.txt"}), &ExecutionContext::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("absent.txt"));
}

#[tokio::test]
async fn test_read_file_rejects_binary() {
    let ws = workspace();
    std::fs::write(ws.path().join("blob.bin"), b"abc\x00def").unwrap();
    let tool = ReadFileTool::new(ws.path().to_path_buf());
    let err = tool
        .execute(json!({"path": "blob.bin"}), &ExecutionContext::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("appears to be binary"));
}

#[tokio::test]
async fn test_read_file_rejects_invalid_utf8() {
    let ws = workspace();
    std::fs::write(ws.path().join("latin1.txt"), b"caf\xe9").unwrap();
    let tool = ReadFileTool::new(ws.path().to_path_buf());
    let err = tool
        .execute(json!({"path": "latin1.txt"}), &ExecutionContext::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("appears to be binary"));
}

#[tokio::test]
async fn test_read_file_truncation_boundary() {
    let ws = workspace();
    let tool = ReadFileTool::new(ws.path().to_path_buf());

    // Exactly at the limit: intact, not truncated.
    std::fs::write(ws.path().join("exact.txt"), "a".repeat(MAX_READ_BYTES)).unwrap();
    let result = tool
        .execute(json!({"path": "exact.txt"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert!(!result.truncated);
    assert_eq!(result.output.len(), MAX_READ_BYTES);

    // One byte past: truncated to the limit.
    std::fs::write(ws.path().join("over.txt"), "a".repeat(MAX_READ_BYTES + 1)).unwrap();
    let result = tool
        .execute(json!({"path": "over.txt"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert!(result.truncated);
    assert_eq!(result.output.len(), MAX_READ_BYTES);
}

#[tokio::test]
async fn test_read_file_truncation_respects_char_boundary() {
    let ws = workspace();
    // Fill so a multi-byte char straddles the limit.
    let mut content = "a".repeat(MAX_READ_BYTES - 1);
    content.push_str("ééé");
    std::fs::write(ws.path().join("multi.txt"), &content).unwrap();
    let tool = ReadFileTool::new(ws.path().to_path_buf());
    let result = tool
        .execute(json!({"path": "multi.txt"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert!(result.truncated);
    assert!(result.output.len() <= MAX_READ_BYTES);
    assert!(result.output.is_char_boundary(result.output.len()));
}

// --- list_dir ---

#[tokio::test]
async fn test_list_dir_sorted() {
    let ws = workspace();
    std::fs::write(ws.path().join("zeta.txt"), "").unwrap();
    std::fs::write(ws.path().join("alpha.txt"), "").unwrap();
    std::fs::create_dir(ws.path().join("mid")).unwrap();
    let tool = ListDirTool::new(ws.path().to_path_buf());
    let result = tool
        .execute(json!({"path": "."}), &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result.output, "alpha.txt\nmid\nzeta.txt");
}

#[tokio::test]
async fn test_list_dir_missing_errors() {
    let ws = workspace();
    let tool = ListDirTool::new(ws.path().to_path_buf());
    assert!(
        tool.execute(json!({"path": "nope"}), &ExecutionContext::default())
            .await
            .is_err()
    );
}

// --- write_file ---

#[tokio::test]
async fn test_write_file_creates_parents() {
    let ws = workspace();
    let tool = WriteFileTool::new(ws.path().to_path_buf(), SecurityMode::Standard);
    let result = tool
        .execute(
            json!({"path": "sub/dir/out.txt", "content": "data"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert!(result.output.contains("4 bytes"));
    assert_eq!(
        std::fs::read_to_string(ws.path().join("sub/dir/out.txt")).unwrap(),
        "data"
    );
}

#[tokio::test]
async fn test_write_file_rejects_escape() {
    let ws = workspace();
    let tool = WriteFileTool::new(ws.path().to_path_buf(), SecurityMode::Standard);
    for path in ["../outside.txt", "sub/../../outside.txt", "/tmp/outside.txt"] {
        let err = tool
            .execute(
                json!({"path": path, "content": "x"}),
                &ExecutionContext::default(),
            )
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("outside the workspace"),
            "path {} should be rejected",
            path
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_write_file_rejects_symlink_escape() {
    let ws = workspace();
    let outside = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), ws.path().join("link")).unwrap();
    let tool = WriteFileTool::new(ws.path().to_path_buf(), SecurityMode::Standard);
    let err = tool
        .execute(
            json!({"path": "link/escape.txt", "content": "x"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("outside the workspace"));
}

#[tokio::test]
async fn test_write_file_danger_mode_skips_confinement() {
    let ws = workspace();
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("anywhere.txt");
    let tool = WriteFileTool::new(ws.path().to_path_buf(), SecurityMode::Danger);
    tool.execute(
        json!({"path": target.to_str().unwrap(), "content": "x"}),
        &ExecutionContext::default(),
    )
    .await
    .unwrap();
    assert!(target.exists());
}

#[test]
fn test_write_file_summarizer() {
    let tool = WriteFileTool::new(PathBuf::from("/ws"), SecurityMode::Standard);
    let summary = tool
        .summarize_args(&json!({"path": "a.txt", "content": "hello"}))
        .unwrap();
    assert_eq!(summary, "write_file: path=\"a.txt\" (5 bytes)");
}
