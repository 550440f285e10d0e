use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::BytesMut;
use chassis_transport::{Buffers, Transport, write_buffers};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};

use super::{Channel, ChannelFactory, ChannelId, ChannelParts};
use crate::error::ChannelError;
use crate::exception::{Exception, StackTrace};
use crate::pipeline::{Attachment, Pipeline};
use crate::scope::LifecycleScope;

/// 默认写队列容量（以 `writev` 调用为单位）。
pub const DEFAULT_WRITE_QUEUE: usize = 128;

/// 默认单次读取缓冲区大小。
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// 单次合并写出的最大分片数。
const MAX_WRITE_BATCH: usize = 64;

/// 以 [`DefaultChannel`] 构造 Channel 的工厂。
pub fn default_channel_factory(write_queue: usize) -> ChannelFactory {
    Arc::new(move |parts: ChannelParts| DefaultChannel::new(parts, write_queue) as Arc<dyn Channel>)
}

/// 基于 Tokio 任务的默认 Channel。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让 Bootstrap 开箱即用：读循环把字节送入管道，写队列把管道写出的字节送回传输；
/// - 处理器 panic 不会拖垮读循环，而是被规范化为异常重新注入管道。
///
/// ## 逻辑 (How)
/// - `serve` 把传输拆成读写两半，分别交给读任务与写任务；
/// - 读任务：触发 active → 循环读取并触发 read → 观察关闭信号与生命周期作用域 →
///   退出时触发一次 inactive；
/// - 写任务：从有界 `mpsc` 队列取出分片，合并后以 vectored IO 写出；关闭时先写完已入队
///   的数据，再关闭写方向；
/// - 关闭状态由 `watch` 标志承载，首次 `close` 记录的异常随 inactive 事件送出。
///
/// ## 契约 (What)
/// - `writev` 在队列满时立即返回 [`ChannelError::QueueFull`]，不阻塞调用方；
/// - inactive 恰好触发一次；
/// - `serve` 需在 Tokio 运行时内调用，否则 Channel 以异常关闭。
pub struct DefaultChannel {
    id: ChannelId,
    pipeline: Pipeline,
    scope: LifecycleScope,
    attachment: RwLock<Option<Attachment>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    io: Mutex<Option<(Box<dyn Transport>, mpsc::Receiver<Buffers>)>>,
    queue: mpsc::Sender<Buffers>,
    capacity: usize,
    closed: watch::Sender<bool>,
    cause: Mutex<Option<Exception>>,
}

impl DefaultChannel {
    pub fn new(parts: ChannelParts, write_queue: usize) -> Arc<Self> {
        let ChannelParts {
            id,
            scope,
            pipeline,
            transport,
        } = parts;
        let capacity = write_queue.max(1);
        let (queue, pending) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            id,
            pipeline,
            scope,
            attachment: RwLock::new(None),
            local_addr: transport.local_addr(),
            peer_addr: transport.peer_addr(),
            io: Mutex::new(Some((transport, pending))),
            queue,
            capacity,
            closed,
            cause: Mutex::new(None),
        })
    }

    /// 以 panic 隔离的方式调用管道。
    fn invoke<F>(&self, fire: F)
    where
        F: FnOnce(&Pipeline),
    {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| fire(&self.pipeline))) else {
            return;
        };
        let exception = Exception::from_panic(payload, StackTrace::capture());
        tracing::error!(channel.id = %self.id, error = %exception, "handler panicked");
        let rethrown = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.fire_channel_exception(exception.clone())
        }));
        if rethrown.is_err() {
            tracing::error!(channel.id = %self.id, "exception handler panicked; closing channel");
            self.close(Some(exception));
        }
    }

    async fn read_loop(self: Arc<Self>, mut reader: ReadHalf<Box<dyn Transport>>) {
        self.invoke(|pipeline| pipeline.fire_channel_active());

        let mut closed = self.closed.subscribe();
        let mut buffer = BytesMut::with_capacity(DEFAULT_READ_BUFFER);
        loop {
            buffer.reserve(DEFAULT_READ_BUFFER);
            tokio::select! {
                _ = closed_signal(&mut closed) => break,
                _ = self.scope.cancelled() => {
                    self.close(None);
                    break;
                }
                read = reader.read_buf(&mut buffer) => match read {
                    Ok(0) => {
                        self.close(None);
                        break;
                    }
                    Ok(_) => {
                        let message = buffer.split().freeze();
                        self.invoke(move |pipeline| pipeline.fire_channel_read(Box::new(message)));
                    }
                    Err(err) => {
                        self.close(Some(Exception::new(err)));
                        break;
                    }
                }
            }
        }

        let cause = self.cause.lock().clone();
        tracing::debug!(channel.id = %self.id, error = ?cause.as_ref().map(ToString::to_string), "channel inactive");
        self.invoke(move |pipeline| pipeline.fire_channel_inactive(cause));
    }

    async fn write_loop(
        self: Arc<Self>,
        mut writer: WriteHalf<Box<dyn Transport>>,
        mut queue: mpsc::Receiver<Buffers>,
    ) {
        let mut closed = self.closed.subscribe();
        let mut pending = Buffers::new();
        let mut healthy = true;
        loop {
            tokio::select! {
                biased;
                next = queue.recv() => {
                    let Some(mut buffers) = next else { break };
                    pending.append(&mut buffers);
                    while pending.fragment_count() < MAX_WRITE_BATCH {
                        match queue.try_recv() {
                            Ok(mut more) => pending.append(&mut more),
                            Err(_) => break,
                        }
                    }
                    if let Err(err) = write_buffers(&mut writer, &mut pending).await {
                        healthy = false;
                        self.close(Some(Exception::new(err)));
                        break;
                    }
                }
                _ = closed_signal(&mut closed) => break,
            }
        }

        if healthy {
            while let Ok(mut more) = queue.try_recv() {
                pending.append(&mut more);
            }
            if let Err(err) = write_buffers(&mut writer, &mut pending).await {
                tracing::debug!(channel.id = %self.id, error = %err, "flush on close failed");
            }
        }
        if let Err(err) = writer.shutdown().await {
            tracing::trace!(channel.id = %self.id, error = %err, "transport shutdown failed");
        }
    }
}

/// 等待关闭标志置位；`watch::Ref` 不能跨越 `select!` 分支中的 await 持有。
async fn closed_signal(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl Channel for DefaultChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn attachment(&self) -> Option<Attachment> {
        self.attachment.read().clone()
    }

    fn set_attachment(&self, attachment: Attachment) {
        *self.attachment.write() = Some(attachment);
    }

    fn writev(&self, buffers: Buffers) -> Result<(), ChannelError> {
        if !self.is_active() {
            return Err(ChannelError::Closed);
        }
        if buffers.is_empty() {
            return Ok(());
        }
        self.queue.try_send(buffers).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn close(&self, exception: Option<Exception>) {
        // 持锁翻转标志，保证读任务观察到关闭时原因已经落地。
        let mut cause = self.cause.lock();
        let first = self.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        });
        if first {
            tracing::debug!(channel.id = %self.id, error = ?exception.as_ref().map(ToString::to_string), "channel closing");
            *cause = exception;
        }
    }

    fn is_active(&self) -> bool {
        !*self.closed.borrow()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    fn serve(self: Arc<Self>) {
        let Some((transport, queue)) = self.io.lock().take() else {
            tracing::warn!(channel.id = %self.id, "channel is already serving");
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!(channel.id = %self.id, error = %err, "no tokio runtime to serve channel");
                self.close(Some(Exception::new(err)));
                return;
            }
        };
        let (reader, writer) = tokio::io::split(transport);
        runtime.spawn(Arc::clone(&self).write_loop(writer, queue));
        runtime.spawn(self.read_loop(reader));
    }
}
