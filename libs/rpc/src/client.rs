use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use starcall_core::Metadata;

use crate::call::{RawCall, TypedCall};
use crate::codec::{BincodeCodec, Codec};
use crate::config::{CallConfig, CallOptions};
use crate::error::{Error, Result};
use crate::transport::{CallShape, Channel, MethodId};

/// Configured proxy for invoking RPC methods over a channel
///
/// Immutable: every `with_*` transform returns a new client sharing the
/// same channel, so configured clients can be handed out freely across
/// tasks.
pub struct ServiceClient<C, K = BincodeCodec> {
    channel: Arc<C>,
    codec: K,
    config: CallConfig,
}

impl<C: Channel> ServiceClient<C> {
    /// Client over a channel with the default bincode codec
    pub fn new(channel: Arc<C>) -> Self {
        Self::with_codec(channel, BincodeCodec)
    }
}

impl<C, K: Clone> Clone for ServiceClient<C, K> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            codec: self.codec.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, K> ServiceClient<C, K>
where
    C: Channel,
    K: Codec + Clone,
{
    /// Client over a channel with an explicit codec
    pub fn with_codec(channel: Arc<C>, codec: K) -> Self {
        Self {
            channel,
            codec,
            config: CallConfig::new(),
        }
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    fn configured(&self, config: CallConfig) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            codec: self.codec.clone(),
            config,
        }
    }

    pub fn with_options(&self, options: CallOptions) -> Self {
        self.configured(self.config.with_options(options))
    }

    pub fn with_headers(&self, headers: Metadata) -> Self {
        self.configured(self.config.with_headers(headers))
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.configured(self.config.with_deadline(deadline))
    }

    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        self.configured(self.config.with_cancellation(token))
    }

    pub fn with_host(&self, host: impl Into<String>) -> Self {
        self.configured(self.config.with_host(host))
    }

    /// Reject dispatch before touching the channel
    ///
    /// A signal that already fired or a deadline already in the past must
    /// not open a handle at all.
    fn check_dispatchable(&self) -> Result<()> {
        if let Some(token) = self.config.cancellation() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        if let Some(deadline) = self.config.deadline() {
            if deadline <= Instant::now() {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }

    async fn open(&self, method: &MethodId, shape: CallShape) -> Result<RawCall> {
        self.check_dispatchable()?;
        self.channel.open(method, shape, &self.config).await
    }

    /// One request, one response
    pub async fn call_unary<Req, Res>(&self, method: MethodId, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let raw = self.open(&method, CallShape::Unary).await?;
        let mut call: TypedCall<Req, Res, K> = TypedCall::new(raw, self.codec.clone());

        call.write(request).await?;
        call.complete_writing();

        let response = match call.read().await? {
            Some(response) => response,
            None => return Err(missing_response_error(&call)),
        };
        // Drain end-of-stream so dispose is a pure release.
        let _ = call.read().await;
        call.dispose();
        Ok(response)
    }

    /// Stream of requests, one response read from the returned call
    pub async fn open_client_stream<Req, Res>(
        &self,
        method: MethodId,
    ) -> Result<TypedCall<Req, Res, K>>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let raw = self.open(&method, CallShape::ClientStreaming).await?;
        Ok(TypedCall::new(raw, self.codec.clone()))
    }

    /// One request, stream of responses
    pub async fn open_server_stream<Req, Res>(
        &self,
        method: MethodId,
        request: &Req,
    ) -> Result<TypedCall<Req, Res, K>>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let raw = self.open(&method, CallShape::ServerStreaming).await?;
        let mut call = TypedCall::new(raw, self.codec.clone());
        call.write(request).await?;
        call.complete_writing();
        Ok(call)
    }

    /// Streams in both directions
    pub async fn open_duplex_stream<Req, Res>(
        &self,
        method: MethodId,
    ) -> Result<TypedCall<Req, Res, K>>
    where
        Req: Serialize,
        Res: for<'de> Deserialize<'de>,
    {
        let raw = self.open(&method, CallShape::Duplex).await?;
        Ok(TypedCall::new(raw, self.codec.clone()))
    }
}

fn missing_response_error<Req, Res, K>(call: &TypedCall<Req, Res, K>) -> Error
where
    Req: Serialize,
    Res: for<'de> Deserialize<'de>,
    K: Codec,
{
    match call.status() {
        Ok(status) if !status.is_ok() => Error::from_status(status),
        _ => Error::TransportUnavailable("call completed without a response".to_string()),
    }
}
