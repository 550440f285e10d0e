use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chassis_transport::{Acceptor, TransportOption, TransportOptions};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::registry::ListenerRegistry;
use super::{BootstrapCore, Side};
use crate::error::BootstrapError;

/// 已登记但惰性绑定的服务端端点。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - `Bootstrap::listen` 只做登记，不做 IO；真正的绑定与接受循环由 [`Listener::sync`]
///   驱动，调用方可以选择在当前任务阻塞运行，或用 [`Listener::run_async`] 放到独立任务；
/// - 每个监听器至多拥有一个接受器。
///
/// ## 逻辑（How）
/// - `sync` 先以原子标志占位，防止并发的第二次调用再打开一个接受器；绑定失败时释放占位，
///   允许重试；
/// - 接受循环：接受 → 检查生命周期作用域 → 装配管道与 Channel → 继续；
/// - 取消是协作式的，只在两次 `accept` 之间检查。阻塞中的 `accept` 需要通过
///   [`Listener::close`]（或 `Bootstrap::shutdown`）关闭接受器才能唤醒。
///
/// ## 契约（What）
/// - 第二次 `sync`（无论第一次仍在运行还是已结束）返回 [`BootstrapError::DuplicateSync`]；
/// - `sync` 仅在接受失败、作用域取消或初始化失败时返回；接受器被关闭时返回的错误满足
///   [`BootstrapError::is_closed`]；
/// - `close` 幂等：存在接受器时从注册表移除自身并关闭接受器，否则为空操作。
pub struct Listener {
    id: u64,
    url: String,
    options: Vec<TransportOption>,
    core: Arc<BootstrapCore>,
    registry: Weak<ListenerRegistry>,
    claimed: AtomicBool,
    acceptor: Mutex<Option<Arc<dyn Acceptor>>>,
}

impl Listener {
    pub(crate) fn new(
        url: String,
        options: Vec<TransportOption>,
        core: Arc<BootstrapCore>,
        registry: &Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            id: registry.allocate_id(),
            url,
            options,
            core,
            registry: Arc::downgrade(registry),
            claimed: AtomicBool::new(false),
            acceptor: Mutex::new(None),
        }
    }

    /// 注册表内唯一的登记序号。
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 登记时使用的原始地址。
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 接受器实际绑定的地址；尚未绑定时为 `None`。
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor
            .lock()
            .as_ref()
            .and_then(|acceptor| acceptor.local_addr())
    }

    pub fn is_bound(&self) -> bool {
        self.acceptor.lock().is_some()
    }

    /// 绑定并运行接受循环，直到接受失败或作用域取消。
    pub async fn sync(&self) -> Result<(), BootstrapError> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return Err(BootstrapError::DuplicateSync {
                url: self.url.clone(),
            });
        }
        let acceptor = match self.open().await {
            Ok(acceptor) => acceptor,
            Err(err) => {
                self.claimed.store(false, Ordering::Release);
                return Err(err);
            }
        };
        tracing::info!(
            listener.url = %self.url,
            local.addr = ?acceptor.local_addr(),
            "listener bound"
        );
        // 关停可能发生在绑定完成之前，此时 `close` 看不到接受器。
        if self.core.scope.is_cancelled() {
            self.close()?;
        }

        let result = self.accept_loop(acceptor.as_ref()).await;
        match &result {
            Ok(()) => tracing::info!(listener.url = %self.url, "listener stopped"),
            Err(err) if err.is_closed() => {
                tracing::info!(listener.url = %self.url, "listener closed")
            }
            Err(err) => tracing::warn!(
                listener.url = %self.url,
                error.code = err.code().unwrap_or("-"),
                error = %err,
                "listener failed"
            ),
        }
        result
    }

    async fn open(&self) -> Result<Arc<dyn Acceptor>, BootstrapError> {
        let mut options = TransportOptions::parse(&self.url, &self.options)?;
        let acceptor: Arc<dyn Acceptor> =
            Arc::from(self.core.transport_factory.listen(&mut options).await?);
        *self.acceptor.lock() = Some(Arc::clone(&acceptor));
        Ok(acceptor)
    }

    async fn accept_loop(&self, acceptor: &dyn Acceptor) -> Result<(), BootstrapError> {
        loop {
            let mut transport = acceptor.accept().await?;
            if self.core.scope.is_cancelled() {
                return transport.close().await.map_err(BootstrapError::from);
            }
            self.core.serve_transport(transport, None, Side::Child)?;
        }
    }

    /// 在独立的 Tokio 任务中运行 [`Listener::sync`]，结束后把结果交给 `callback`。
    pub fn run_async<F>(self: &Arc<Self>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<(), BootstrapError>) + Send + 'static,
    {
        let listener = Arc::clone(self);
        tokio::spawn(async move { callback(listener.sync().await) })
    }

    /// 关闭接受器并从注册表移除自身。
    pub fn close(&self) -> Result<(), BootstrapError> {
        let Some(acceptor) = self.acceptor.lock().clone() else {
            return Ok(());
        };
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self);
        }
        acceptor.close()?;
        Ok(())
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("options", &self.options.len())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
