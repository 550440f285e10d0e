//! 传输层三件套：连接、接受器、工厂。

use std::any::Any;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::address::Schemes;
use crate::buffers::{Buffers, write_buffers};
use crate::error::TransportError;
use crate::options::TransportOptions;

const WRITEV_FAILED: &str = "chassis.transport.writev_failed";
const SHUTDOWN_FAILED: &str = "chassis.transport.shutdown_failed";

/// 已建立的字节流连接。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - Channel 只依赖 `AsyncRead + AsyncWrite` 即可驱动读写循环，具体介质（TCP、内存管道）
///   通过实现本 trait 接入；
/// - `raw_transport` 暴露底层 OS 连接的控制句柄，供需要额外套接字操作的处理器向下转型。
///
/// ## 契约（What）
/// - `writev` 必须写出全部分片或返回错误；默认实现基于 [`write_buffers`]；
/// - `close` 执行写方向的优雅关闭，重复调用的结果由具体实现决定，但不得 panic；
/// - 地址方法对非套接字介质可以返回 `None`。
#[async_trait]
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn local_addr(&self) -> Option<SocketAddr>;

    fn peer_addr(&self) -> Option<SocketAddr>;

    /// 底层连接句柄，例如 `tokio::net::TcpStream`。
    fn raw_transport(&self) -> &dyn Any;

    async fn writev(&mut self, buffers: &mut Buffers) -> Result<usize, TransportError> {
        write_buffers(self, buffers)
            .await
            .map_err(|err| TransportError::io(WRITEV_FAILED, "transport writev", err))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shutdown()
            .await
            .map_err(|err| TransportError::io(SHUTDOWN_FAILED, "transport shutdown", err))
    }
}

/// 服务端接受器。
///
/// `accept` 阻塞直到新连接到达或接受器关闭；`close` 幂等，首次调用释放监听套接字
/// 并唤醒挂起的 `accept`（后者返回 [`TransportError::Closed`]），之后的调用为空操作。
#[async_trait]
pub trait Acceptor: Send + Sync + 'static {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError>;

    fn close(&self) -> Result<(), TransportError>;

    fn local_addr(&self) -> Option<SocketAddr>;
}

/// 按方案创建连接与接受器的工厂。
///
/// `connect`/`listen` 会先以 [`Schemes::fix_address`] 修正 `options` 中的地址方案，
/// 因此接收可变引用。
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    fn schemes(&self) -> Schemes;

    async fn connect(
        &self,
        options: &mut TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError>;

    async fn listen(
        &self,
        options: &mut TransportOptions,
    ) -> Result<Box<dyn Acceptor>, TransportError>;
}
