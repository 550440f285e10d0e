//! DefaultChannel 的写队列、panic 隔离与关闭语义；传输用内存双工管道代替套接字。

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chassis_core::channel::{Channel, ChannelId, ChannelParts, DefaultChannel};
use chassis_core::error::ChannelError;
use chassis_core::exception::Exception;
use chassis_core::pipeline::{
    ExceptionHandler, Handler, HandlerContext, InactiveHandler, InboundHandler, Message, Pipeline,
};
use chassis_core::scope::LifecycleScope;
use chassis_transport::{Buffers, Transport};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Duplex(DuplexStream);

impl AsyncRead for Duplex {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for Duplex {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

impl Transport for Duplex {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn raw_transport(&self) -> &dyn Any {
        &self.0
    }
}

/// 读到任何消息都 panic。
struct Explosive;

impl Handler for Explosive {
    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }
}

impl InboundHandler for Explosive {
    fn handle_read(&self, _ctx: &HandlerContext, _message: Message) {
        panic!("boom");
    }
}

/// 读与异常处理都会 panic。
struct Fragile;

impl Handler for Fragile {
    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }

    fn as_exception(&self) -> Option<&dyn ExceptionHandler> {
        Some(self)
    }
}

impl InboundHandler for Fragile {
    fn handle_read(&self, _ctx: &HandlerContext, _message: Message) {
        panic!("fragile read");
    }
}

impl ExceptionHandler for Fragile {
    fn handle_exception(&self, _ctx: &HandlerContext, _exception: Exception) {
        panic!("fragile exception handler");
    }
}

/// 把异常与 inactive 事件以文本形式交给测试任务。
struct Witness {
    events: mpsc::UnboundedSender<String>,
}

impl Handler for Witness {
    fn as_exception(&self) -> Option<&dyn ExceptionHandler> {
        Some(self)
    }

    fn as_inactive(&self) -> Option<&dyn InactiveHandler> {
        Some(self)
    }
}

impl ExceptionHandler for Witness {
    fn handle_exception(&self, _ctx: &HandlerContext, exception: Exception) {
        let _ = self
            .events
            .send(format!("exception:{}:{exception}", exception.kind()));
    }
}

impl InactiveHandler for Witness {
    fn handle_inactive(&self, _ctx: &HandlerContext, exception: Option<Exception>) {
        let event = match exception {
            Some(exception) => format!("inactive:{exception}"),
            None => "inactive".to_owned(),
        };
        let _ = self.events.send(event);
    }
}

fn open(
    pipeline: &Pipeline,
    scope: &LifecycleScope,
    write_queue: usize,
) -> (Arc<DefaultChannel>, DuplexStream) {
    let (local, peer) = tokio::io::duplex(1024);
    let channel = DefaultChannel::new(
        ChannelParts {
            id: ChannelId::new(1),
            scope: scope.clone(),
            pipeline: pipeline.clone(),
            transport: Box::new(Duplex(local)),
        },
        write_queue,
    );
    (channel, peer)
}

fn serve(channel: &Arc<DefaultChannel>) {
    channel
        .pipeline()
        .serve_channel(Arc::clone(channel) as Arc<dyn Channel>)
        .expect("attach");
}

fn witnessed() -> (Pipeline, mpsc::UnboundedReceiver<String>) {
    let (events, received) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new();
    pipeline.add_last([Witness { events }]).expect("add_last");
    (pipeline, received)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(WAIT, events.recv())
        .await
        .expect("event never arrived")
        .expect("witness dropped")
}

#[tokio::test]
async fn full_write_queue_rejects_instead_of_blocking() {
    let pipeline = Pipeline::new();
    let scope = LifecycleScope::new();
    // 容量 0 按 1 处理；未 serve 时队列无人消费。
    let (channel, _peer) = open(&pipeline, &scope, 0);

    channel.write(Bytes::from_static(b"a")).expect("first write fits");
    let err = channel
        .write(Bytes::from_static(b"b"))
        .expect_err("queue is full");
    assert!(matches!(err, ChannelError::QueueFull { capacity: 1 }));
    channel.writev(Buffers::new()).expect("empty write is a no-op");

    channel.close(None);
    assert!(matches!(
        channel.write(Bytes::from_static(b"c")),
        Err(ChannelError::Closed)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_writes_reach_the_peer_in_order() {
    let pipeline = Pipeline::new();
    let scope = LifecycleScope::new();
    let (channel, mut peer) = open(&pipeline, &scope, 4);
    serve(&channel);

    channel.write(Bytes::from_static(b"hello ")).expect("write");
    let mut buffers = Buffers::new();
    buffers.push(Bytes::from_static(b"wor"));
    buffers.push(Bytes::from_static(b"ld"));
    channel.writev(buffers).expect("writev");

    let mut received = [0u8; 11];
    timeout(WAIT, peer.read_exact(&mut received))
        .await
        .expect("bytes never arrived")
        .expect("read");
    assert_eq!(&received, b"hello world");
    channel.close(None);
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_panic_is_reinjected_as_exception() {
    let (events, mut received) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new();
    pipeline
        .add_last([
            Arc::new(Explosive) as Arc<dyn Handler>,
            Arc::new(Witness { events }),
        ])
        .expect("add_last");
    let scope = LifecycleScope::new();
    let (channel, mut peer) = open(&pipeline, &scope, 4);
    serve(&channel);

    for _ in 0..2 {
        peer.write_all(b"x").await.expect("peer write");
        assert_eq!(next_event(&mut received).await, "exception:panic:boom");
        assert!(channel.is_active());
    }

    drop(peer);
    assert_eq!(next_event(&mut received).await, "inactive");
    assert!(!channel.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_exception_handler_closes_the_channel() {
    let (events, mut received) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new();
    pipeline
        .add_last([
            Arc::new(Fragile) as Arc<dyn Handler>,
            Arc::new(Witness { events }),
        ])
        .expect("add_last");
    let scope = LifecycleScope::new();
    let (channel, mut peer) = open(&pipeline, &scope, 4);
    serve(&channel);

    peer.write_all(b"x").await.expect("peer write");
    assert_eq!(next_event(&mut received).await, "inactive:fragile read");
    assert!(!channel.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn inactive_fires_once_with_the_first_close_cause() {
    let (pipeline, mut received) = witnessed();
    let scope = LifecycleScope::new();
    let (channel, peer) = open(&pipeline, &scope, 4);
    serve(&channel);

    channel.close(Some(Exception::new(io::Error::other("reset by peer"))));
    channel.close(Some(Exception::new(io::Error::other("second cause"))));
    channel.close(None);
    drop(peer);

    assert_eq!(next_event(&mut received).await, "inactive:reset by peer");
    assert!(
        timeout(Duration::from_millis(200), received.recv())
            .await
            .is_err(),
        "inactive must fire exactly once"
    );
    assert!(!channel.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn scope_cancellation_closes_served_channels() {
    let scope = LifecycleScope::new();
    let (first_pipeline, mut first_events) = witnessed();
    let (second_pipeline, mut second_events) = witnessed();
    let (first, mut first_peer) = open(&first_pipeline, &scope, 4);
    let (second, mut second_peer) = open(&second_pipeline, &scope, 4);
    serve(&first);
    serve(&second);
    assert!(first.is_active() && second.is_active());

    assert!(scope.cancel());

    assert_eq!(next_event(&mut first_events).await, "inactive");
    assert_eq!(next_event(&mut second_events).await, "inactive");
    assert!(!first.is_active());
    assert!(!second.is_active());
    for peer in [&mut first_peer, &mut second_peer] {
        let mut rest = Vec::new();
        timeout(WAIT, peer.read_to_end(&mut rest))
            .await
            .expect("write side never shut down")
            .expect("read to end");
        assert!(rest.is_empty());
    }
}
