use std::any::Any;
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chassis_transport::{Buffers, Transport, TransportError, write_buffers};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use crate::error::{self, CONFIGURE, map_io_error};
use crate::options::TcpOptions;

/// 已调优的 TCP 连接。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 拨号与接受两条路径在构造时统一应用 [`TcpOptions`]，之后读写直接委托给
///   `TcpStream`，不引入额外锁；
/// - 地址在构造时缓存，连接被拆分为读写两半后仍可查询。
///
/// ## 契约 (What)
/// - `raw_transport` 返回内部的 `tokio::net::TcpStream`；
/// - `writev` 写满全部分片，`close` 关闭写方向；
/// - 套接字调优失败时构造失败，返回 `chassis.transport.tcp.configure_failed`。
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl TcpTransport {
    pub(crate) fn establish(stream: TcpStream, options: &TcpOptions) -> Result<Self, TransportError> {
        options
            .apply(&stream)
            .map_err(|err| map_io_error(CONFIGURE, err))?;
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        Ok(Self {
            stream,
            local_addr,
            peer_addr,
        })
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    fn raw_transport(&self) -> &dyn Any {
        &self.stream
    }

    async fn writev(&mut self, buffers: &mut Buffers) -> Result<usize, TransportError> {
        write_buffers(&mut self.stream, buffers)
            .await
            .map_err(|err| map_io_error(error::WRITE_VECTORED, err))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(map_io_error(error::SHUTDOWN, err)),
        }
    }
}
