use super::*;
use serde_json::json;

struct RecordingWriter {
    sent: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl ChannelWriter for RecordingWriter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_send_message_uses_writer() {
    let writer = Arc::new(RecordingWriter {
        sent: std::sync::Mutex::new(vec![]),
    });
    let tool = SendMessageTool::new(Some(writer.clone()));
    let result = tool
        .execute(
            json!({"message": "working on it"}),
            &ExecutionContext::default(),
        )
        .await
        .unwrap();
    assert!(result.output.contains("message sent"));
    assert_eq!(writer.sent.lock().unwrap().as_slice(), ["working on it"]);
}

#[tokio::test]
async fn test_send_message_stdout_fallback() {
    let tool = SendMessageTool::new(None);
    let result = tool
        .execute(json!({"message": "hello"}), &ExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result.output, "message sent to stdout");
}

#[tokio::test]
async fn test_send_message_requires_message() {
    let tool = SendMessageTool::new(None);
    assert!(
        tool.execute(json!({}), &ExecutionContext::default())
            .await
            .is_err()
    );
}
