use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use starcall_core::{Metadata, Status, StatusCode};

use crate::error::{Error, Result};

/// Payloads buffered per direction before writers suspend.
const CALL_BUFFER: usize = 16;

/// Lifecycle of a raw call handle
///
/// `Completing` means one direction has closed while the other is still in
/// flight. `Finished` requires the request side completed normally and the
/// response side drained to end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Active,
    Completing,
    Finished,
    Disposed,
}

/// Final status and trailing metadata reported by the transport
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub status: Status,
    pub trailers: Metadata,
}

/// Transport-level handle owning the live resources of exactly one call
///
/// Created in a pair with [`TransportCall`] via [`raw_call`]; the raw side
/// is exclusively owned by one typed adapter, the transport side by the
/// channel implementation.
pub struct RawCall {
    requests: Option<mpsc::Sender<Bytes>>,
    responses: mpsc::Receiver<Bytes>,
    responses_done: bool,
    headers: watch::Receiver<Option<Metadata>>,
    completion: watch::Receiver<Option<CallOutcome>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    deadline_hit: bool,
    disposed: bool,
}

enum WriteOp {
    Aborted,
    Deadline,
    Sent(bool),
}

enum ReadOp {
    Aborted,
    Deadline,
    Payload(Option<Bytes>),
}

enum HeaderOp {
    Aborted,
    Deadline,
    Arrived(Option<Metadata>),
    Closed,
}

impl RawCall {
    /// Current lifecycle state
    pub fn state(&self) -> CallState {
        if self.disposed {
            return CallState::Disposed;
        }
        match (self.requests.is_none(), self.responses_done) {
            (true, true) => CallState::Finished,
            (false, false) => CallState::Active,
            _ => CallState::Completing,
        }
    }

    /// Write one opaque payload to the request direction
    ///
    /// Suspends while the transport applies backpressure. Aborts with
    /// `Cancelled` or `DeadlineExceeded` if either fires mid-write.
    pub async fn write_bytes(&mut self, payload: Bytes) -> Result<()> {
        if self.disposed {
            return Err(Error::StreamClosed);
        }
        if self.cancel.is_cancelled() {
            return Err(self.abort_error());
        }
        let Some(sender) = self.requests.clone() else {
            return Err(Error::StreamClosed);
        };

        tracing::trace!(len = payload.len(), "writing request payload");
        let op = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => WriteOp::Aborted,
            _ = deadline_elapsed(self.deadline) => WriteOp::Deadline,
            sent = sender.send(payload) => WriteOp::Sent(sent.is_ok()),
        };

        match op {
            WriteOp::Sent(true) => Ok(()),
            WriteOp::Sent(false) => Err(Error::StreamClosed),
            WriteOp::Aborted => Err(self.abort_error()),
            WriteOp::Deadline => Err(self.expire()),
        }
    }

    /// Next payload from the response direction, `None` at end-of-stream
    ///
    /// The sequence is lazy, ordered as the transport produced it, and not
    /// restartable: once `None` is returned it stays `None`.
    pub async fn read_bytes(&mut self) -> Result<Option<Bytes>> {
        if self.disposed {
            return Err(Error::StreamClosed);
        }
        if self.responses_done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(self.abort_error());
        }

        let op = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => ReadOp::Aborted,
            _ = deadline_elapsed(self.deadline) => ReadOp::Deadline,
            payload = self.responses.recv() => ReadOp::Payload(payload),
        };

        match op {
            ReadOp::Payload(Some(payload)) => {
                tracing::trace!(len = payload.len(), "read response payload");
                Ok(Some(payload))
            }
            ReadOp::Payload(None) => {
                self.responses_done = true;
                Ok(None)
            }
            ReadOp::Aborted => Err(self.abort_error()),
            ReadOp::Deadline => Err(self.expire()),
        }
    }

    /// Close the request direction; idempotent
    pub fn complete_writing(&mut self) {
        self.requests = None;
    }

    /// Final call status; `InvalidState` until the transport reports one
    pub fn status(&self) -> Result<Status> {
        self.outcome().map(|outcome| outcome.status)
    }

    /// Trailing metadata; same availability as [`RawCall::status`]
    pub fn trailers(&self) -> Result<Metadata> {
        self.outcome().map(|outcome| outcome.trailers)
    }

    fn outcome(&self) -> Result<CallOutcome> {
        self.completion
            .borrow()
            .clone()
            .ok_or(Error::InvalidState("call has not completed"))
    }

    /// Await the response headers
    ///
    /// Resolves once headers arrive, or fails once the call does.
    pub async fn response_headers(&mut self) -> Result<Metadata> {
        if self.disposed {
            return Err(Error::StreamClosed);
        }
        if self.cancel.is_cancelled() {
            return Err(self.abort_error());
        }

        let mut headers = self.headers.clone();
        let op = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => HeaderOp::Aborted,
            _ = deadline_elapsed(self.deadline) => HeaderOp::Deadline,
            arrived = headers.wait_for(|h| h.is_some()) => match arrived {
                Ok(value) => HeaderOp::Arrived((*value).clone()),
                Err(_) => HeaderOp::Closed,
            },
        };

        match op {
            HeaderOp::Arrived(Some(headers)) => Ok(headers),
            HeaderOp::Arrived(None) | HeaderOp::Closed => Err(self.failure_error()),
            HeaderOp::Aborted => Err(self.abort_error()),
            HeaderOp::Deadline => Err(self.expire()),
        }
    }

    /// Request cancellation of the call; idempotent and cross-task safe
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observing this call's cancellation
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Release the handle's resources
    ///
    /// A pure release when the call already finished in both directions;
    /// otherwise cancellation is requested first so every pending read or
    /// write resolves instead of hanging. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if self.state() != CallState::Finished {
            tracing::debug!("disposing unfinished call, cancelling outstanding work");
            self.cancel.cancel();
        }
        self.requests = None;
        self.responses.close();
        self.disposed = true;
    }

    /// Failure kind for an aborted operation
    ///
    /// Deadline expiry cancels the same token, so the flag decides which
    /// variant surfaces.
    fn abort_error(&self) -> Error {
        if self.deadline_hit {
            Error::DeadlineExceeded
        } else {
            Error::Cancelled
        }
    }

    fn expire(&mut self) -> Error {
        tracing::debug!("call deadline elapsed, cancelling");
        self.deadline_hit = true;
        self.cancel.cancel();
        Error::DeadlineExceeded
    }

    /// Error for operations that can no longer complete because the call
    /// itself failed: prefer the reported status, fall back to closed.
    fn failure_error(&self) -> Error {
        match self.completion.borrow().clone() {
            Some(outcome) if !outcome.status.is_ok() => Error::from_status(outcome.status),
            _ => Error::StreamClosed,
        }
    }
}

impl Drop for RawCall {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Transport-facing half of a call
///
/// Held by the channel implementation (or a test server): it consumes
/// request payloads, produces response payloads, announces headers and
/// reports the final outcome.
pub struct TransportCall {
    requests: mpsc::Receiver<Bytes>,
    responses: mpsc::Sender<Bytes>,
    headers: watch::Sender<Option<Metadata>>,
    completion: watch::Sender<Option<CallOutcome>>,
    cancel: CancellationToken,
}

impl TransportCall {
    /// Next request payload, `None` once the caller completed writing
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.requests.recv().await
    }

    /// Send one response payload
    pub async fn send(&mut self, payload: Bytes) -> Result<()> {
        self.responses
            .send(payload)
            .await
            .map_err(|_| Error::StreamClosed)
    }

    /// Announce the response headers; later announcements are ignored
    pub fn send_headers(&self, headers: Metadata) {
        self.headers.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(headers);
            true
        });
    }

    /// Report the final status and trailers, closing the response direction
    pub fn finish(self, status: Status, trailers: Metadata) {
        let _ = self.completion.send(Some(CallOutcome { status, trailers }));
    }

    /// Resolves when the caller cancelled the call
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token observing this call's cancellation
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for TransportCall {
    fn drop(&mut self) {
        // A transport that drops the call without finishing still owes the
        // caller an outcome.
        if self.completion.borrow().is_none() {
            let _ = self.completion.send(Some(CallOutcome {
                status: Status::new(StatusCode::Unknown, "call dropped by transport"),
                trailers: Metadata::new(),
            }));
        }
    }
}

/// Create the two halves of one call
///
/// The handle's cancellation token is a child of the configured signal, so
/// triggering the caller's token aborts the call without affecting others
/// sharing that signal.
pub fn raw_call(
    deadline: Option<Instant>,
    cancellation: Option<&CancellationToken>,
) -> (RawCall, TransportCall) {
    let cancel = match cancellation {
        Some(parent) => parent.child_token(),
        None => CancellationToken::new(),
    };
    let (request_tx, request_rx) = mpsc::channel(CALL_BUFFER);
    let (response_tx, response_rx) = mpsc::channel(CALL_BUFFER);
    let (headers_tx, headers_rx) = watch::channel(None);
    let (completion_tx, completion_rx) = watch::channel(None);

    let raw = RawCall {
        requests: Some(request_tx),
        responses: response_rx,
        responses_done: false,
        headers: headers_rx,
        completion: completion_rx,
        cancel: cancel.clone(),
        deadline,
        deadline_hit: false,
        disposed: false,
    };
    let transport = TransportCall {
        requests: request_rx,
        responses: response_tx,
        headers: headers_tx,
        completion: completion_tx,
        cancel,
    };
    (raw, transport)
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
