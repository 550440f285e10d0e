//! 骨架层错误类型。
//!
//! 配置错误（[`PipelineError`]、[`BootstrapError::DuplicateSync`]）属于编程错误，
//! 在出错的调用点同步返回，不经管道传播；[`ChannelError`] 描述写入路径上的运行期失败。

use std::borrow::Cow;

use chassis_transport::TransportError;

/// 管道配置错误。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// 处理器没有实现六类能力中的任何一种。
    #[error("unrecognized handler: {index}:{name}")]
    UnrecognizedHandler { index: usize, name: String },
    /// 插入位置越界。
    #[error("invalid position: {position} (pipeline size {size})")]
    InvalidPosition { position: isize, size: usize },
    /// 管道已挂接 Channel。
    #[error("already attached channel")]
    AlreadyAttached,
    /// 初始化回调拒绝装配当前连接。
    #[error("pipeline initialization failed: {reason}")]
    Initialize { reason: Cow<'static, str> },
}

impl PipelineError {
    pub fn initialize(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Initialize {
            reason: reason.into(),
        }
    }
}

/// Channel 写入失败。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("send queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
    /// 头哨兵无法把出站消息转换为字节。
    #[error("unsupported outbound message type, expected bytes-like value")]
    UnsupportedMessage,
}

/// 连接与监听编排错误。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// 同一个监听器第二次调用 `sync`。
    #[error("duplicate call Listener::sync on `{url}`")]
    DuplicateSync { url: String },
}

impl BootstrapError {
    /// 传输层错误的稳定错误码；其余变体没有错误码。
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Transport(err) => Some(err.code()),
            _ => None,
        }
    }

    /// 接受器已关闭导致的正常终止。
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_closed())
    }
}
