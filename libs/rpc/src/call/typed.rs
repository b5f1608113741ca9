use std::marker::PhantomData;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use starcall_core::{Metadata, Status};

use crate::call::raw::{CallState, RawCall};
use crate::codec::Codec;
use crate::error::{Error, Result};

/// Typed read/write surface over a raw call handle
///
/// Owns its [`RawCall`] exclusively and releases it on every exit path:
/// explicit [`TypedCall::dispose`], error propagation, or plain drop at
/// the end of the calling scope.
pub struct TypedCall<Req, Res, K> {
    raw: RawCall,
    codec: K,
    read_failed: bool,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, K> TypedCall<Req, Res, K>
where
    Req: Serialize,
    Res: for<'de> Deserialize<'de>,
    K: Codec,
{
    pub fn new(raw: RawCall, codec: K) -> Self {
        Self {
            raw,
            codec,
            read_failed: false,
            _types: PhantomData,
        }
    }

    /// Encode and send one request
    ///
    /// An encode failure is surfaced without disposing the call; the
    /// adapter stays usable for further writes or for dispose.
    pub async fn write(&mut self, request: &Req) -> Result<()> {
        let bytes = self.codec.encode(request)?;
        self.raw.write_bytes(Bytes::from(bytes)).await
    }

    /// Close the request direction; idempotent
    ///
    /// Already a no-op for shapes whose single request was written at
    /// dispatch time.
    pub fn complete_writing(&mut self) {
        self.raw.complete_writing();
    }

    /// Next decoded response, `None` at end-of-stream
    ///
    /// A decode failure terminates the sequence; further reads fail with
    /// `StreamClosed`.
    pub async fn read(&mut self) -> Result<Option<Res>> {
        if self.read_failed {
            return Err(Error::StreamClosed);
        }
        match self.raw.read_bytes().await? {
            Some(payload) => match self.codec.decode(&payload) {
                Ok(response) => Ok(Some(response)),
                Err(err) => {
                    self.read_failed = true;
                    Err(err)
                }
            },
            None => Ok(None),
        }
    }

    pub fn state(&self) -> CallState {
        self.raw.state()
    }

    /// Final call status; `InvalidState` until the call completes
    pub fn status(&self) -> Result<Status> {
        self.raw.status()
    }

    /// Trailing metadata; same availability as [`TypedCall::status`]
    pub fn trailers(&self) -> Result<Metadata> {
        self.raw.trailers()
    }

    /// Await the response headers
    pub async fn response_headers(&mut self) -> Result<Metadata> {
        self.raw.response_headers().await
    }

    /// Request cancellation of the call
    pub fn cancel(&self) {
        self.raw.cancel();
    }

    /// Token observing this call's cancellation
    pub fn cancellation(&self) -> CancellationToken {
        self.raw.cancellation()
    }

    /// Release the underlying handle; idempotent
    ///
    /// Cancels the call first unless both directions already closed
    /// cleanly. Also runs on drop, so early returns and propagated errors
    /// release the handle too.
    pub fn dispose(&mut self) {
        self.raw.dispose();
    }
}

impl<Req, Res, K> Drop for TypedCall<Req, Res, K> {
    fn drop(&mut self) {
        self.raw.dispose();
    }
}
