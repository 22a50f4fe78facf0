//! JSON-RPC client for the language-server subprocess.
//!
//! Implements request/response correlation over the framed transport: every
//! outbound request gets a fresh identifier and a capacity-one delivery slot
//! in the pending-call table; a single background reader task routes each
//! inbound response to the slot matching its identifier. Callers wait on
//! their own slot with a per-call deadline, and session teardown unblocks
//! every waiter at once through a shared cancellation token.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lsp::error::LspError;
use crate::lsp::framing::{self, ReadOutcome};
use crate::lsp::process::LanguageServerProcess;
use crate::lsp::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

type PendingCalls = Arc<RwLock<HashMap<u64, mpsc::Sender<JsonRpcResponse>>>>;

pub struct LspClient {
    /// Outbound stream. Held exclusively for each whole frame so concurrent
    /// writers never interleave header and body bytes.
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,

    /// Correlation identifiers, unique for the lifetime of this session.
    next_id: AtomicU64,

    /// Delivery slots for in-flight requests, keyed by identifier.
    /// Invariant: every inserted identifier is removed exactly once.
    pending: PendingCalls,

    /// Shared lifetime signal; cancelled exactly once, on close.
    shutdown: CancellationToken,

    /// Child process backing the streams, absent when the client was built
    /// directly over in-memory streams.
    process: Mutex<Option<LanguageServerProcess>>,
}

impl LspClient {
    /// Build a client over arbitrary streams and start the reader loop.
    pub fn new<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let pending: PendingCalls = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(read_loop(reader, Arc::clone(&pending), shutdown.clone()));

        Self {
            writer: Mutex::new(Box::new(writer)),
            next_id: AtomicU64::new(1),
            pending,
            shutdown,
            process: Mutex::new(None),
        }
    }

    /// Spawn `program args` and run the protocol over its stdio pipes.
    pub fn start(program: &str, args: &[&str]) -> Result<Self, LspError> {
        let (process, stdin, stdout) = LanguageServerProcess::spawn(program, args)?;
        let mut client = Self::new(stdin, stdout);
        client.process = Mutex::new(Some(process));
        Ok(client)
    }

    /// Send a request and wait for the matching response.
    ///
    /// Returns the response as received, including a carried error field if
    /// the server reported one. Fails with [`LspError::Timeout`] when the
    /// deadline elapses first and [`LspError::SessionClosed`] when the
    /// session is torn down while waiting. On every one of those paths the
    /// identifier's table entry is removed before returning.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<JsonRpcResponse, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (slot, receiver) = mpsc::channel(1);
        self.pending.write().await.insert(id, slot);

        let outcome = self.send_and_wait(id, method, params, timeout, receiver).await;

        // Single removal point, reached on delivery, timeout, write failure,
        // and teardown alike. A response that raced the timeout sits
        // unconsumed in the slot and is dropped with it.
        self.pending.write().await.remove(&id);
        outcome
    }

    async fn send_and_wait(
        &self,
        id: u64,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        mut receiver: mpsc::Receiver<JsonRpcResponse>,
    ) -> Result<JsonRpcResponse, LspError> {
        let request = JsonRpcRequest::new(id, method, params);
        let body = serde_json::to_string(&request)?;
        debug!(method, id, "sending request");
        self.write(&body).await?;

        tokio::select! {
            outcome = tokio::time::timeout(timeout, receiver.recv()) => match outcome {
                Ok(Some(response)) => Ok(response),
                Ok(None) => Err(LspError::SessionClosed),
                Err(_) => Err(LspError::Timeout { method: method.to_string() }),
            },
            _ = self.shutdown.cancelled() => Err(LspError::SessionClosed),
        }
    }

    /// Send a notification; completes as soon as the frame is written.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), LspError> {
        let notification = JsonRpcNotification::new(method, params);
        let body = serde_json::to_string(&notification)?;
        debug!(method, "sending notification");
        self.write(&body).await
    }

    async fn write(&self, body: &str) -> Result<(), LspError> {
        let mut writer = self.writer.lock().await;
        framing::write_message(&mut *writer, body).await?;
        Ok(())
    }

    /// Tear down the session: cancel the shared lifetime signal, unblock
    /// every pending request with a session-closed failure, and kill the
    /// subprocess if one is attached.
    pub async fn close(&self) {
        self.shutdown.cancel();

        // Dropping the delivery slots unblocks waiters that have not yet
        // observed the cancellation.
        self.pending.write().await.clear();

        let _ = self.writer.lock().await.shutdown().await;

        if let Some(mut process) = self.process.lock().await.take() {
            process.kill().await;
        }
    }
}

/// The single inbound drain for one session. Runs until the stream ends or
/// the session is cancelled; a caller that stops waiting never stalls it,
/// because delivery into a slot is non-blocking.
async fn read_loop<R>(reader: R, pending: PendingCalls, shutdown: CancellationToken)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            outcome = framing::read_message(&mut reader) => match outcome {
                ReadOutcome::Message(message) => route_message(message, &pending).await,
                ReadOutcome::Skipped => {}
                ReadOutcome::Closed => break,
            },
        }
    }

    debug!("reader loop terminated");
}

async fn route_message(message: JsonRpcResponse, pending: &RwLock<HashMap<u64, mpsc::Sender<JsonRpcResponse>>>) {
    if !message.is_response() {
        // Server-initiated requests and notifications are outside this
        // bridge's contract.
        debug!(
            method = message.method.as_deref().unwrap_or_default(),
            "dropping non-response message"
        );
        return;
    }

    let Some(id) = message.id.as_u64() else {
        warn!(id = %message.id, "dropping response with unusable identifier");
        return;
    };

    let table = pending.read().await;
    match table.get(&id) {
        Some(slot) => {
            if slot.try_send(message).is_err() {
                // The caller already gave up; the response is stale.
                debug!(id, "no caller waiting for response");
            }
        }
        None => debug!(id, "dropping response for unknown request"),
    }
}
