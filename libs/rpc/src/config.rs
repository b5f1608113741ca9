use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use starcall_core::Metadata;

/// Opaque bag of transport-level call options
///
/// The call layer never interprets these; they are handed to the channel
/// when a call is opened.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    wait_for_ready: bool,
    max_message_size: Option<usize>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the channel to wait for the backend instead of failing fast
    pub fn wait_for_ready(mut self, wait: bool) -> Self {
        self.wait_for_ready = wait;
        self
    }

    /// Cap on a single encoded message
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    pub fn is_wait_for_ready(&self) -> bool {
        self.wait_for_ready
    }

    pub fn get_max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }
}

/// Immutable per-call configuration
///
/// Every `with_*` transform returns a new value and leaves the original
/// untouched, so a config can be shared freely across concurrent calls.
/// Nothing is validated here; a deadline already in the past or an empty
/// host only surface when the call is dispatched.
#[derive(Debug, Clone, Default)]
pub struct CallConfig {
    options: CallOptions,
    headers: Metadata,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    host: Option<String>,
}

impl CallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transport-level options
    pub fn with_options(&self, options: CallOptions) -> Self {
        let mut next = self.clone();
        next.options = options;
        next
    }

    /// Replace the header set (no merging)
    pub fn with_headers(&self, headers: Metadata) -> Self {
        let mut next = self.clone();
        next.headers = headers;
        next
    }

    /// Replace the absolute deadline
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut next = self.clone();
        next.deadline = Some(deadline);
        next
    }

    /// Replace the cooperative cancellation signal
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut next = self.clone();
        next.cancellation = Some(token);
        next
    }

    /// Replace the target host override
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.host = Some(host.into());
        next
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    pub fn headers(&self) -> &Metadata {
        &self.headers
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}
