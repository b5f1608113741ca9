use std::fmt;

use crate::call::RawCall;
use crate::config::CallConfig;
use crate::error::Result;

pub mod mem;

pub use self::mem::{InboundCall, MemChannel};

/// Identifies one method on a service, e.g. `Greeter/Hello`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    service: String,
    method: String,
}

impl MethodId {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.method)
    }
}

/// The four call shapes
///
/// All shapes run over the same raw handle; the shape only decides which
/// directions stream and which carry a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    Duplex,
}

impl CallShape {
    /// True if the caller may write more than one request
    pub fn client_streams(&self) -> bool {
        matches!(self, CallShape::ClientStreaming | CallShape::Duplex)
    }

    /// True if the callee may send more than one response
    pub fn server_streams(&self) -> bool {
        matches!(self, CallShape::ServerStreaming | CallShape::Duplex)
    }
}

/// Channel trait opening raw call handles
///
/// Implementations negotiate the call with the remote side using the
/// configuration's headers, deadline, cancellation and host, and hand back
/// the caller half of the handle.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    /// Open one call of the given shape
    async fn open(&self, method: &MethodId, shape: CallShape, config: &CallConfig)
        -> Result<RawCall>;
}
