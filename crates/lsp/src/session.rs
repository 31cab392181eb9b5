use crate::client::LanguageClient;
use crate::error::SessionError;
use crate::framing::{encode_frame, FrameReader};
use migrator_protocol::{
    ExecuteCommandParams, InitializeParams, InitializeResult, Message, Notification, Request,
    RequestId, Response, ResponseError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

type PendingReply = oneshot::Sender<Result<Value, ResponseError>>;

struct WriteRequest {
    bytes: Vec<u8>,
    reply: oneshot::Sender<io::Result<()>>,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<RequestId, PendingReply>>,
    closed: AtomicBool,
}

impl Shared {
    fn fail_pending(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.pending.lock() {
            // Dropping the senders wakes every waiter with `Closed`.
            guard.clear();
        }
    }

    fn take_pending(&self, id: &RequestId) -> Option<PendingReply> {
        self.pending.lock().ok()?.remove(id)
    }
}

// Removes the pending entry if the caller stops waiting (timeout, cancellation).
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shared.pending.lock() {
            guard.remove(&self.id);
        }
    }
}

async fn run_write_loop<W: AsyncWrite + Unpin>(mut write: W, mut rx: mpsc::Receiver<WriteRequest>) {
    while let Some(req) = rx.recv().await {
        let result = async {
            write.write_all(&req.bytes).await?;
            write.flush().await?;
            Ok(())
        }
        .await;
        let should_stop = result.is_err();
        let _ = req.reply.send(result);
        if should_stop {
            break;
        }
    }
}

async fn send_bytes(writer: &mpsc::Sender<WriteRequest>, bytes: Vec<u8>) -> Result<(), SessionError> {
    let (reply_tx, reply_rx) = oneshot::channel::<io::Result<()>>();
    writer
        .send(WriteRequest {
            bytes,
            reply: reply_tx,
        })
        .await
        .map_err(|_| SessionError::Closed)?;
    reply_rx.await.map_err(|_| SessionError::Closed)??;
    Ok(())
}

async fn send_message(
    writer: &mpsc::Sender<WriteRequest>,
    message: &Message,
) -> Result<(), SessionError> {
    let bytes = encode_frame(&message.to_value()?)?;
    send_bytes(writer, bytes).await
}

async fn run_read_loop<R: AsyncRead + Unpin>(
    read: R,
    shared: Arc<Shared>,
    writer: mpsc::Sender<WriteRequest>,
    client: Arc<dyn LanguageClient>,
) {
    let mut frames = FrameReader::new(read);
    loop {
        let value = match frames.next_message().await {
            Ok(Some(value)) => value,
            Ok(None) => {
                log::debug!("Language server closed its output stream");
                break;
            }
            Err(err) => {
                log::error!("Error reading from language server: {err}");
                break;
            }
        };

        let message = match Message::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Ignoring malformed JSON-RPC message: {err}");
                continue;
            }
        };

        match message {
            Message::Response(response) => {
                let Some(id) = response.id.clone() else {
                    log::warn!(
                        "Language server reported an unattributed error: {:?}",
                        response.error
                    );
                    continue;
                };
                match shared.take_pending(&id) {
                    Some(waiter) => {
                        let _ = waiter.send(response.into_result());
                    }
                    None => log::debug!("Dropping response for unknown request id {id}"),
                }
            }
            Message::Notification(note) => {
                client.on_notification(&note.method, note.params.as_ref());
            }
            Message::Request(req) => {
                let response = match client.on_request(&req.method, req.params.as_ref()) {
                    Ok(result) => Response::ok(req.id, result),
                    Err(error) => Response::from_error(req.id, error),
                };
                if let Err(err) = send_message(&writer, &Message::Response(response)).await {
                    log::warn!("Failed to answer server request `{}`: {err}", req.method);
                }
            }
        }
    }
    shared.fail_pending();
}

/// A live JSON-RPC channel to the language server that has not completed the handshake yet.
///
/// The only way to obtain a [`Session`] (and therefore to run commands) is
/// [`Connection::initialize`], which makes the handshake a hard precondition for every query.
pub struct Connection {
    writer: mpsc::Sender<WriteRequest>,
    shared: Arc<Shared>,
    next_id: AtomicI64,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Connection {
    /// Starts the read and write loops on the current Tokio runtime.
    pub fn new<R, W>(read: R, write: W, client: Arc<dyn LanguageClient>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let (write_tx, write_rx) = mpsc::channel::<WriteRequest>(16);
        let write_task = tokio::spawn(run_write_loop(write, write_rx));
        let read_task = tokio::spawn(run_read_loop(
            read,
            shared.clone(),
            write_tx.clone(),
            client,
        ));
        Self {
            writer: write_tx,
            shared,
            next_id: AtomicI64::new(1),
            read_task,
            write_task,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .map_err(|_| SessionError::Closed)?
            .insert(id.clone(), tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            id: id.clone(),
        };
        // The read loop may have died between the check above and the insert.
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let request = Message::Request(Request::new(id, method, params));
        send_message(&self.writer, &request).await?;

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(SessionError::Rpc {
                method: method.to_string(),
                error,
            }),
            Err(_) => Err(SessionError::Closed),
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let note = Message::Notification(Notification::new(method, params));
        send_message(&self.writer, &note).await
    }

    /// Performs the `initialize` request (bounded by `timeout`) followed by the `initialized`
    /// notification, and hands back the ready session.
    pub async fn initialize(
        self,
        params: InitializeParams,
        timeout: Duration,
    ) -> Result<Session, SessionError> {
        let params = serde_json::to_value(&params)?;
        let raw = tokio::time::timeout(timeout, self.request("initialize", Some(params)))
            .await
            .map_err(|_| SessionError::InitializeTimeout(timeout))??;
        let init: InitializeResult =
            serde_json::from_value(raw).map_err(SessionError::MalformedInitialize)?;
        if let Some(info) = init.server_info.as_ref() {
            log::info!(
                "Language server initialized: {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        } else {
            log::info!("Language server initialized");
        }

        self.notify("initialized", Some(serde_json::json!({}))).await?;
        Ok(Session { conn: self, init })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// A handshake-completed session. One per analysis run.
pub struct Session {
    conn: Connection,
    init: InitializeResult,
}

impl Session {
    pub fn initialize_result(&self) -> &InitializeResult {
        &self.init
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// `workspace/executeCommand`. The result shape belongs to the backend and is returned as-is.
    pub async fn execute_command(
        &self,
        command: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, SessionError> {
        let params = serde_json::to_value(ExecuteCommandParams {
            command: command.to_string(),
            arguments,
        })?;
        self.conn
            .request("workspace/executeCommand", Some(params))
            .await
    }

    /// Polite `shutdown` + `exit`. Best-effort: the caller still force-terminates the process.
    pub async fn shutdown(self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.conn.request("shutdown", None)).await {
            Ok(Ok(_)) => {
                if let Err(err) = self.conn.notify("exit", None).await {
                    log::debug!("Failed to send exit notification: {err}");
                }
            }
            Ok(Err(err)) => log::debug!("Language server shutdown request failed: {err}"),
            Err(_) => log::debug!("Language server did not acknowledge shutdown within {timeout:?}"),
        }
    }
}
