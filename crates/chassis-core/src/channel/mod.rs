//! Channel 契约：一条传输连接与一条管道、一份附件的绑定。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - Bootstrap 只负责“拿到传输 → 装配管道 → 挂接”，连接的读写循环由 Channel
//!   实现自行驱动；
//! - 通过 [`ChannelFactory`] 可替换 Channel 实现，默认实现见 [`DefaultChannel`]。
//!
//! ## 契约（What）
//! - `serve` 由 [`Pipeline::serve_channel`](crate::pipeline::Pipeline::serve_channel)
//!   在挂接成功后调用恰好一次，实现方在其中启动自己的 IO；
//! - `write`/`writev` 只负责排队，失败以 [`ChannelError`] 同步返回；
//! - `close` 幂等，首次调用携带的异常随后出现在非活跃事件中。

mod default;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chassis_transport::{Buffers, Transport};

use crate::error::ChannelError;
use crate::exception::Exception;
use crate::pipeline::{Attachment, Pipeline};
use crate::scope::LifecycleScope;

pub use default::{DEFAULT_READ_BUFFER, DEFAULT_WRITE_QUEUE, DefaultChannel, default_channel_factory};

/// 进程内唯一的连接标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 每次调用返回一个新标识的工厂。
pub type ChannelIdFactory = Arc<dyn Fn() -> ChannelId + Send + Sync>;

/// 自增序列标识工厂，从 1 开始。
pub fn sequence_id() -> ChannelIdFactory {
    let counter = Arc::new(AtomicU64::new(0));
    Arc::new(move || ChannelId(counter.fetch_add(1, Ordering::Relaxed) + 1))
}

/// 构造 Channel 所需的全部部件。
pub struct ChannelParts {
    pub id: ChannelId,
    pub scope: LifecycleScope,
    pub pipeline: Pipeline,
    pub transport: Box<dyn Transport>,
}

impl fmt::Debug for ChannelParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelParts")
            .field("id", &self.id)
            .field("pipeline", &self.pipeline)
            .field("peer_addr", &self.transport.peer_addr())
            .finish()
    }
}

/// 把部件绑定为 Channel 的工厂。
pub type ChannelFactory = Arc<dyn Fn(ChannelParts) -> Arc<dyn Channel> + Send + Sync>;

/// 一条活跃连接。
pub trait Channel: Send + Sync + 'static {
    fn id(&self) -> ChannelId;

    fn pipeline(&self) -> &Pipeline;

    fn attachment(&self) -> Option<Attachment>;

    fn set_attachment(&self, attachment: Attachment);

    /// 排队写出一段字节。
    fn write(&self, bytes: Bytes) -> Result<(), ChannelError> {
        let mut buffers = Buffers::new();
        buffers.push(bytes);
        self.writev(buffers)
    }

    /// 排队写出一组分片，分片作为整体入队。
    fn writev(&self, buffers: Buffers) -> Result<(), ChannelError>;

    fn close(&self, exception: Option<Exception>);

    fn is_active(&self) -> bool;

    fn local_addr(&self) -> Option<SocketAddr>;

    fn peer_addr(&self) -> Option<SocketAddr>;

    /// 启动 IO。
    fn serve(self: Arc<Self>);
}
