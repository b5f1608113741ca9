use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use starcall_core::Metadata;

use crate::call::raw::{raw_call, RawCall, TransportCall};
use crate::config::CallConfig;
use crate::error::Result;
use crate::transport::{CallShape, Channel, MethodId};

type CallHandler =
    Arc<dyn Fn(InboundCall) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// One call as seen by an in-memory server
///
/// Carries what a real channel would have negotiated on the wire, plus the
/// transport half of the handle.
pub struct InboundCall {
    pub method: MethodId,
    pub shape: CallShape,
    pub headers: Metadata,
    pub host: Option<String>,
    pub transport: TransportCall,
}

/// In-process channel running a handler task per call
///
/// The concrete transport used by tests and doc examples; network channels
/// implement [`Channel`] the same way against their own wire.
#[derive(Clone)]
pub struct MemChannel {
    handler: CallHandler,
}

impl MemChannel {
    /// Create a channel from an async per-call handler
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(InboundCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |call| Box::pin(handler(call))),
        }
    }
}

#[async_trait::async_trait]
impl Channel for MemChannel {
    async fn open(
        &self,
        method: &MethodId,
        shape: CallShape,
        config: &CallConfig,
    ) -> Result<RawCall> {
        let (raw, transport) = raw_call(config.deadline(), config.cancellation());
        tracing::debug!(method = %method, ?shape, "opening in-memory call");

        let inbound = InboundCall {
            method: method.clone(),
            shape,
            headers: config.headers().clone(),
            host: config.host().map(str::to_owned),
            transport,
        };
        tokio::spawn((self.handler)(inbound));
        Ok(raw)
    }
}
