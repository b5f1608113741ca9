//! Starcall RPC - Typed call layer over a raw streaming channel
//!
//! Lets callers invoke unary, client-streaming, server-streaming and duplex
//! calls with typed values while the channel underneath only ever sees
//! opaque byte payloads. Per-call configuration (deadline, headers,
//! cancellation, host) is an immutable builder, serialization is pluggable
//! behind the [`Codec`] trait, and every call handle is released on every
//! exit path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde::{Deserialize, Serialize};
//! use starcall_rpc::transport::{InboundCall, MemChannel, MethodId};
//! use starcall_rpc::{Metadata, ServiceClient, Status};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Hello {
//!     name: String,
//! }
//!
//! # async fn example() -> starcall_rpc::Result<()> {
//! // An in-process echo server; a network channel plugs in the same way.
//! let channel = Arc::new(MemChannel::new(|mut inbound: InboundCall| async move {
//!     inbound.transport.send_headers(Metadata::new());
//!     while let Some(payload) = inbound.transport.recv().await {
//!         if inbound.transport.send(payload).await.is_err() {
//!             break;
//!         }
//!     }
//!     inbound.transport.finish(Status::ok(), Metadata::new());
//! }));
//!
//! let client = ServiceClient::new(channel);
//! let reply: Hello = client
//!     .call_unary(
//!         MethodId::new("Greeter", "Hello"),
//!         &Hello { name: "starcall".to_string() },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod service;
pub mod transport;

// Re-exports for convenience
pub use call::{CallState, RawCall, TransportCall, TypedCall};
pub use client::ServiceClient;
pub use codec::{BincodeCodec, Codec, RawCodec};
pub use config::{CallConfig, CallOptions};
pub use error::{Error, Result};
pub use service::{Service, ServiceDescriptor, ServiceMarker, ServiceRegistry};
pub use starcall_core::{Metadata, Status, StatusCode};
pub use transport::{CallShape, Channel, MemChannel, MethodId};
