use crate::agent::tools::base::ExecutionContext;
use crate::channels::ChannelWriter;
use crate::errors::NeoclawError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One queued user message and where its response goes.
pub struct TurnRequest {
    pub channel: String,
    pub chat_id: String,
    pub message: String,
    pub responder: Arc<dyn ChannelWriter>,
}

/// The agent handler invoked for each dequeued message.
#[async_trait]
pub trait TurnHandler: Send + Sync {
    async fn handle(&self, ctx: ExecutionContext, message: String)
    -> Result<String, NeoclawError>;
}

/// Bounded FIFO in front of the agent: one in-flight turn, strict arrival
/// order, cancel-current-and-drain on stop.
pub struct Dispatcher {
    tx: mpsc::Sender<TurnRequest>,
    pending: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    current_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn TurnHandler>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<TurnRequest>(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let current_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>> =
            Arc::new(std::sync::Mutex::new(None));

        {
            let pending = pending.clone();
            let in_flight = in_flight.clone();
            let stopped = stopped.clone();
            let current_cancel = current_cancel.clone();
            tokio::spawn(async move {
                while let Some(request) = rx.recv().await {
                    pending.fetch_sub(1, Ordering::SeqCst);
                    if stopped.load(Ordering::SeqCst) {
                        // Drained without running.
                        continue;
                    }

                    in_flight.store(true, Ordering::SeqCst);
                    let token = CancellationToken::new();
                    *current_cancel.lock().expect("cancel slot poisoned") = Some(token.clone());

                    let ctx = ExecutionContext {
                        channel: request.channel,
                        chat_id: request.chat_id,
                        cancel: token,
                    };
                    match handler.handle(ctx, request.message).await {
                        Ok(text) => {
                            if let Err(e) = request.responder.send(&text).await {
                                warn!("failed to deliver response: {}", e);
                            }
                        }
                        Err(e) if e.is_canceled() => {
                            info!("turn canceled, response discarded");
                        }
                        Err(e) => {
                            warn!("turn failed: {}", e);
                            let _ = request.responder.send(&format!("error: {}", e)).await;
                        }
                    }

                    *current_cancel.lock().expect("cancel slot poisoned") = None;
                    in_flight.store(false, Ordering::SeqCst);
                }
            });
        }

        Self {
            tx,
            pending,
            in_flight,
            stopped,
            current_cancel,
        }
    }

    /// Enqueue a message. Applies backpressure when the queue is full; fails
    /// after [`Dispatcher::stop`].
    pub async fn enqueue(&self, request: TurnRequest) -> Result<(), NeoclawError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(NeoclawError::Canceled);
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(request).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            NeoclawError::Canceled
        })
    }

    /// Cancel the in-flight turn and discard every queued message.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(token) = self
            .current_cancel
            .lock()
            .expect("cancel slot poisoned")
            .as_ref()
        {
            token.cancel();
        }
    }

    /// Poll until the queue is empty and no turn is in flight. Returns false
    /// when `cancel` fires first.
    pub async fn wait_until_idle(&self, cancel: &CancellationToken) -> bool {
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 && !self.in_flight.load(Ordering::SeqCst) {
                return true;
            }
            tokio::select! {
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
            }
        }
    }
}
