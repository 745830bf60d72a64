use async_trait::async_trait;

/// Destination for assistant output. The terminal writer is the default; a
/// chat-bot listener would contribute its own implementation and register it
/// with the scheduler's writer map.
#[async_trait]
pub trait ChannelWriter: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Writes straight to stdout. Used by the terminal REPL and as the
/// `send_message` fallback when no channel sender is wired.
pub struct StdoutWriter;

#[async_trait]
impl ChannelWriter for StdoutWriter {
    fn name(&self) -> &str {
        "terminal"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }
}
