use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use starcall_rpc::transport::{InboundCall, MemChannel};
use starcall_rpc::{
    BincodeCodec, CallConfig, CallShape, CallState, Channel, Codec, Error, Metadata, MethodId,
    RawCall, ServiceClient, Status, StatusCode,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Ping {
    seq: u32,
    text: String,
}

fn ping(seq: u32, text: &str) -> Ping {
    Ping {
        seq,
        text: text.to_string(),
    }
}

/// Echoes every request payload back, then reports success with a trailer.
fn echo_channel() -> Arc<MemChannel> {
    Arc::new(MemChannel::new(|mut inbound: InboundCall| async move {
        inbound
            .transport
            .send_headers(Metadata::new().with("x-served-by", "echo"));
        while let Some(payload) = inbound.transport.recv().await {
            if inbound.transport.send(payload).await.is_err() {
                break;
            }
        }
        inbound
            .transport
            .finish(Status::ok(), Metadata::new().with("echoed", "yes"));
    }))
}

/// Sends headers, then holds the call open until the caller cancels.
fn silent_channel() -> Arc<MemChannel> {
    Arc::new(MemChannel::new(|inbound: InboundCall| async move {
        inbound.transport.send_headers(Metadata::new());
        inbound.transport.cancelled().await;
    }))
}

/// Channel wrapper counting how often a handle was actually opened.
struct CountingChannel {
    inner: MemChannel,
    opens: AtomicUsize,
}

impl CountingChannel {
    fn new(inner: MemChannel) -> Self {
        Self {
            inner,
            opens: AtomicUsize::new(0),
        }
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Channel for CountingChannel {
    async fn open(
        &self,
        method: &MethodId,
        shape: CallShape,
        config: &CallConfig,
    ) -> starcall_rpc::Result<RawCall> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(method, shape, config).await
    }
}

/// Channel that can never reach its backend.
struct FailingChannel;

#[async_trait::async_trait]
impl Channel for FailingChannel {
    async fn open(
        &self,
        _method: &MethodId,
        _shape: CallShape,
        _config: &CallConfig,
    ) -> starcall_rpc::Result<RawCall> {
        Err(Error::TransportUnavailable("no route to backend".to_string()))
    }
}

/// Serializes fine unless told to refuse; used to fault the encode step.
#[derive(Debug)]
struct Brittle {
    fail: bool,
}

impl Serialize for Brittle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.fail {
            Err(<S::Error as serde::ser::Error>::custom("encode refused"))
        } else {
            serializer.serialize_u32(7)
        }
    }
}

#[tokio::test]
async fn unary_roundtrip() {
    let client = ServiceClient::new(echo_channel());
    let request = ping(1, "hello");

    let response: Ping = client
        .call_unary(MethodId::new("Echo", "Once"), &request)
        .await
        .unwrap();

    assert_eq!(response, request);
}

#[tokio::test]
async fn unary_surfaces_remote_failure_status() {
    let channel = Arc::new(MemChannel::new(|mut inbound: InboundCall| async move {
        // Drain the request but never answer it.
        while inbound.transport.recv().await.is_some() {}
        inbound.transport.finish(
            Status::new(StatusCode::Unavailable, "backend down"),
            Metadata::new(),
        );
    }));
    let client = ServiceClient::new(channel);

    let err = client
        .call_unary::<Ping, Ping>(MethodId::new("Echo", "Once"), &ping(1, "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransportUnavailable(msg) if msg.contains("backend down")));
}

#[tokio::test]
async fn unary_surfaces_channel_open_failure() {
    let client = ServiceClient::new(Arc::new(FailingChannel));

    let err = client
        .call_unary::<Ping, Ping>(MethodId::new("Echo", "Once"), &ping(1, "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransportUnavailable(_)));
}

#[tokio::test]
async fn past_deadline_fails_before_opening_a_handle() {
    let channel = Arc::new(CountingChannel::new(MemChannel::new(
        |_inbound: InboundCall| async move {},
    )));
    let client = ServiceClient::new(Arc::clone(&channel))
        .with_deadline(Instant::now() - Duration::from_millis(1));

    let err = client
        .call_unary::<Ping, Ping>(MethodId::new("Echo", "Once"), &ping(1, "late"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded));
    assert_eq!(channel.opens(), 0);
}

#[tokio::test]
async fn triggered_cancellation_fails_before_opening_a_handle() {
    let channel = Arc::new(CountingChannel::new(MemChannel::new(
        |_inbound: InboundCall| async move {},
    )));
    let token = CancellationToken::new();
    token.cancel();

    let client = ServiceClient::new(Arc::clone(&channel)).with_cancellation(token);
    let err = client
        .call_unary::<Ping, Ping>(MethodId::new("Echo", "Once"), &ping(1, "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(channel.opens(), 0);
}

#[tokio::test]
async fn duplex_write_read_dispose_scenario() {
    let client = ServiceClient::new(echo_channel());
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    let a = ping(1, "A");
    let b = ping(2, "B");
    call.write(&a).await.unwrap();
    call.write(&b).await.unwrap();
    call.complete_writing();

    assert_eq!(call.read().await.unwrap(), Some(a));
    assert_eq!(call.read().await.unwrap(), Some(b));
    assert_eq!(call.read().await.unwrap(), None);
    assert!(call.status().unwrap().is_ok());

    call.dispose();
    assert_eq!(call.state(), CallState::Disposed);
}

#[tokio::test]
async fn cancellation_resolves_inflight_duplex_read() {
    let token = CancellationToken::new();
    let client = ServiceClient::new(silent_channel()).with_cancellation(token.clone());
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(1), call.read())
        .await
        .expect("read must resolve once cancellation fires")
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn deadline_elapses_during_read() {
    let client =
        ServiceClient::new(silent_channel()).with_deadline(Instant::now() + Duration::from_millis(50));
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(1), call.read())
        .await
        .expect("read must resolve once the deadline passes")
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
}

#[tokio::test]
async fn dispose_twice_is_quiet() {
    let client = ServiceClient::new(silent_channel());
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    call.dispose();
    call.dispose();
    assert_eq!(call.state(), CallState::Disposed);
}

#[tokio::test]
async fn dispose_cancels_an_abandoned_call() {
    let cancelled_seen = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled_seen);
    let channel = Arc::new(MemChannel::new(move |inbound: InboundCall| {
        let flag = Arc::clone(&flag);
        async move {
            inbound.transport.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        }
    }));

    let client = ServiceClient::new(channel);
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();
    call.dispose();

    // The transport side must observe the cancellation promptly.
    tokio::time::timeout(Duration::from_secs(1), async {
        while !cancelled_seen.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("transport never saw the cancellation");
}

#[tokio::test]
async fn encode_failure_on_second_write_keeps_call_usable() {
    let channel = Arc::new(MemChannel::new(|mut inbound: InboundCall| async move {
        let mut received = 0u32;
        while inbound.transport.recv().await.is_some() {
            received += 1;
        }
        let payload = BincodeCodec.encode(&received).unwrap();
        let _ = inbound.transport.send(Bytes::from(payload)).await;
        inbound.transport.finish(Status::ok(), Metadata::new());
    }));

    let client = ServiceClient::new(channel);
    let mut call = client
        .open_client_stream::<Brittle, u32>(MethodId::new("Sum", "Count"))
        .await
        .unwrap();

    call.write(&Brittle { fail: false }).await.unwrap();
    let err = call.write(&Brittle { fail: true }).await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));

    // The failed encode never reached the wire; the call is still live.
    call.write(&Brittle { fail: false }).await.unwrap();
    call.complete_writing();

    assert_eq!(call.read().await.unwrap(), Some(2));
    assert_eq!(call.read().await.unwrap(), None);
    call.dispose();
    assert_eq!(call.state(), CallState::Disposed);
}

#[tokio::test]
async fn status_and_trailers_lifecycle() {
    let client = ServiceClient::new(echo_channel());
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    assert!(matches!(call.status(), Err(Error::InvalidState(_))));
    assert!(matches!(call.trailers(), Err(Error::InvalidState(_))));

    call.write(&ping(1, "x")).await.unwrap();
    call.complete_writing();
    assert_eq!(call.read().await.unwrap(), Some(ping(1, "x")));
    assert_eq!(call.read().await.unwrap(), None);

    let first = call.status().unwrap();
    let second = call.status().unwrap();
    assert_eq!(first, second);
    assert!(first.is_ok());
    assert_eq!(call.trailers().unwrap().get("echoed"), Some("yes"));
}

#[tokio::test]
async fn server_stream_delivers_in_order() {
    let channel = Arc::new(MemChannel::new(|mut inbound: InboundCall| async move {
        let payload = inbound.transport.recv().await.unwrap();
        let request: Ping = BincodeCodec.decode(&payload).unwrap();
        for offset in 1..=3u32 {
            let reply = Ping {
                seq: request.seq + offset,
                text: request.text.clone(),
            };
            let bytes = BincodeCodec.encode(&reply).unwrap();
            if inbound.transport.send(Bytes::from(bytes)).await.is_err() {
                return;
            }
        }
        inbound.transport.finish(Status::ok(), Metadata::new());
    }));

    let client = ServiceClient::new(channel);
    let mut call = client
        .open_server_stream::<Ping, Ping>(MethodId::new("Feed", "Watch"), &ping(10, "tick"))
        .await
        .unwrap();

    assert_eq!(call.read().await.unwrap(), Some(ping(11, "tick")));
    assert_eq!(call.read().await.unwrap(), Some(ping(12, "tick")));
    assert_eq!(call.read().await.unwrap(), Some(ping(13, "tick")));
    assert_eq!(call.read().await.unwrap(), None);
}

#[tokio::test]
async fn response_headers_resolve() {
    let client = ServiceClient::new(echo_channel());
    let mut call = client
        .open_duplex_stream::<Ping, Ping>(MethodId::new("Echo", "Both"))
        .await
        .unwrap();

    let headers = call.response_headers().await.unwrap();
    assert_eq!(headers.get("x-served-by"), Some("echo"));
}

#[tokio::test]
async fn configured_headers_reach_the_transport() {
    let seen = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&seen);
    let channel = Arc::new(MemChannel::new(move |mut inbound: InboundCall| {
        let flag = Arc::clone(&flag);
        async move {
            if inbound.headers.get("trace-id") == Some("t-42")
                && inbound.host.as_deref() == Some("edge-1")
            {
                flag.store(true, Ordering::SeqCst);
            }
            while let Some(payload) = inbound.transport.recv().await {
                if inbound.transport.send(payload).await.is_err() {
                    break;
                }
            }
            inbound.transport.finish(Status::ok(), Metadata::new());
        }
    }));

    let client = ServiceClient::new(channel)
        .with_headers(Metadata::new().with("trace-id", "t-42"))
        .with_host("edge-1");

    let _: Ping = client
        .call_unary(MethodId::new("Echo", "Once"), &ping(1, "x"))
        .await
        .unwrap();
    assert!(seen.load(Ordering::SeqCst));
}
