use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chassis_transport::{Acceptor, Transport, TransportError};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{self, map_io_error};
use crate::options::TcpOptions;
use crate::transport::TcpTransport;

/// 对 Tokio `TcpListener` 的语义封装。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 提供“监听 → 接受连接”的最小能力，并保证 `close` 可以唤醒正在阻塞的 `accept`；
/// - 每个接受到的连接都应用监听时确定的 [`TcpOptions`]。
///
/// ## 逻辑 (How)
/// - 监听器以 `Arc` 存放在 `Mutex<Option<..>>` 中，`accept` 克隆一份后在锁外等待；
/// - `close` 取走监听器并翻转 `watch` 标志，挂起的 `accept` 在 `select!` 中观察到
///   标志后返回 [`TransportError::Closed`]，随即释放它持有的最后一份监听器引用。
///
/// ## 契约 (What)
/// - `close` 幂等：首次调用释放监听套接字，之后为空操作；
/// - 关闭后的 `accept` 立即返回 [`TransportError::Closed`]。
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: Mutex<Option<Arc<TcpListener>>>,
    closed: watch::Sender<bool>,
    local_addr: SocketAddr,
    options: TcpOptions,
}

impl TcpAcceptor {
    pub(crate) async fn bind(addr: SocketAddr, options: TcpOptions) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| map_io_error(error::BIND, err))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| map_io_error(error::BIND, err))?;
        let (closed, _) = watch::channel(false);
        Ok(Self {
            listener: Mutex::new(Some(Arc::new(listener))),
            closed,
            local_addr,
            options,
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn current(&self) -> Option<Arc<TcpListener>> {
        match self.listener.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let listener = self.current().ok_or(TransportError::Closed)?;
        let mut closed = self.closed.subscribe();
        tokio::select! {
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::Closed),
            accepted = listener.accept() => {
                let (stream, peer) = accepted.map_err(|err| map_io_error(error::ACCEPT, err))?;
                tracing::trace!(peer.addr = %peer, local.addr = %self.local_addr, "tcp connection accepted");
                let transport = TcpTransport::establish(stream, &self.options)?;
                Ok(Box::new(transport) as Box<dyn Transport>)
            }
        }
    }

    fn close(&self) -> Result<(), TransportError> {
        let taken = match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            self.closed.send_replace(true);
            tracing::debug!(local.addr = %self.local_addr, "tcp acceptor closed");
        }
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }
}
