//! 连接生命周期编排。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 客户端 `connect` 与服务端接受循环共享同一条装配路径：为每个新传输创建全新的管道与
//!   Channel，运行对应的初始化回调填充处理器，最后把管道挂接到 Channel 上；
//! - Bootstrap 持有根生命周期作用域与监听器注册表，`shutdown` 一次性终止全部监听器。
//!
//! ## 契约（What）
//! - `shutdown` 不可逆：取消作用域后逐个关闭快照中的监听器，单个失败只记日志；
//! - `connect` 的解析与拨号失败直接返回，不产生任何副作用。

mod listener;
mod registry;

use std::fmt;
use std::sync::Arc;

use chassis_transport::{Transport, TransportFactory, TransportOption, TransportOptions};
use chassis_transport_tcp::TcpTransportFactory;

use crate::channel::{
    Channel, ChannelFactory, ChannelId, ChannelIdFactory, ChannelParts, DEFAULT_WRITE_QUEUE,
    default_channel_factory, sequence_id,
};
use crate::error::{BootstrapError, PipelineError};
use crate::pipeline::{Attachment, Pipeline, PipelineFactory};
use crate::scope::LifecycleScope;

pub use listener::Listener;
pub use registry::ListenerRegistry;

/// 初始化回调：收到新建的 Channel，负责向其管道填充处理器。
pub type ChannelInitializer =
    Arc<dyn Fn(&Arc<dyn Channel>) -> Result<(), PipelineError> + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Side {
    Client,
    Child,
}

pub(crate) struct BootstrapCore {
    pub(crate) scope: LifecycleScope,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    channel_id_factory: ChannelIdFactory,
    pipeline_factory: PipelineFactory,
    channel_factory: ChannelFactory,
    client_initializer: ChannelInitializer,
    child_initializer: ChannelInitializer,
}

impl BootstrapCore {
    /// 把一个已建立的传输装配为可服务的 Channel。
    pub(crate) fn serve_transport(
        &self,
        transport: Box<dyn Transport>,
        attachment: Option<Attachment>,
        side: Side,
    ) -> Result<Arc<dyn Channel>, BootstrapError> {
        let pipeline = (self.pipeline_factory)();
        let id = (self.channel_id_factory)();
        let channel = (self.channel_factory)(ChannelParts {
            id,
            scope: self.scope.clone(),
            pipeline,
            transport,
        });
        if let Some(attachment) = attachment {
            channel.set_attachment(attachment);
        }

        let initializer = match side {
            Side::Client => &self.client_initializer,
            Side::Child => &self.child_initializer,
        };
        if let Err(err) = initializer(&channel) {
            tracing::warn!(channel.id = %id, ?side, error = %err, "pipeline initializer failed");
            channel.close(None);
            return Err(err.into());
        }

        if let Err(err) = channel.pipeline().serve_channel(Arc::clone(&channel)) {
            tracing::warn!(channel.id = %id, ?side, error = %err, "pipeline attach failed");
            channel.close(None);
            return Err(err.into());
        }
        tracing::debug!(
            channel.id = %id,
            ?side,
            peer.addr = ?channel.peer_addr(),
            "channel serving"
        );
        Ok(channel)
    }
}

/// 进程级编排器。
///
/// 克隆得到的句柄共享同一组工厂、作用域与注册表。
#[derive(Clone)]
pub struct Bootstrap {
    core: Arc<BootstrapCore>,
    listeners: Arc<ListenerRegistry>,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    /// 全部使用默认部件：序列标识、空管道、[`DefaultChannel`](crate::channel::DefaultChannel)
    /// （写队列 128）、TCP 传输、空初始化回调。
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::default()
    }

    /// 拨号并装配客户端 Channel。
    pub async fn connect(
        &self,
        url: &str,
        attachment: Option<Attachment>,
        options: &[TransportOption],
    ) -> Result<Arc<dyn Channel>, BootstrapError> {
        let mut parsed = TransportOptions::parse(url, options)?;
        let transport = self.core.transport_factory.connect(&mut parsed).await?;
        self.core
            .serve_transport(transport, attachment, Side::Client)
    }

    /// 登记一个监听器并立即返回，不做任何 IO。
    pub fn listen<I>(&self, url: &str, options: I) -> Arc<Listener>
    where
        I: IntoIterator<Item = TransportOption>,
    {
        let listener = Arc::new(Listener::new(
            url.to_owned(),
            options.into_iter().collect(),
            Arc::clone(&self.core),
            &self.listeners,
        ));
        self.listeners.insert(Arc::clone(&listener));
        listener
    }

    /// 取消根作用域并关闭所有已登记的监听器。
    pub fn shutdown(&self) {
        if self.core.scope.cancel() {
            tracing::info!(listeners = self.listeners.len(), "bootstrap shutting down");
        }
        for listener in self.listeners.snapshot() {
            if let Err(err) = listener.close() {
                tracing::warn!(
                    listener.url = %listener.url(),
                    error.code = err.code().unwrap_or("-"),
                    error = %err,
                    "listener close failed during shutdown"
                );
            }
        }
    }

    pub fn scope(&self) -> &LifecycleScope {
        &self.core.scope
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("schemes", &self.core.transport_factory.schemes())
            .field("cancelled", &self.core.scope.is_cancelled())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn skip_initialization(_channel: &Arc<dyn Channel>) -> Result<(), PipelineError> {
    Ok(())
}

/// [`Bootstrap`] 的建造器，未设置的部件使用默认值。
pub struct BootstrapBuilder {
    scope: LifecycleScope,
    transport_factory: Arc<dyn TransportFactory>,
    channel_id_factory: ChannelIdFactory,
    pipeline_factory: PipelineFactory,
    channel_factory: ChannelFactory,
    client_initializer: ChannelInitializer,
    child_initializer: ChannelInitializer,
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self {
            scope: LifecycleScope::new(),
            transport_factory: Arc::new(TcpTransportFactory::new()),
            channel_id_factory: sequence_id(),
            pipeline_factory: Arc::new(Pipeline::new),
            channel_factory: default_channel_factory(DEFAULT_WRITE_QUEUE),
            client_initializer: Arc::new(skip_initialization),
            child_initializer: Arc::new(skip_initialization),
        }
    }
}

impl BootstrapBuilder {
    /// 使用外部作用域作为根作用域；外部取消同样会终止本 Bootstrap 的连接与接受循环。
    pub fn with_scope(mut self, scope: LifecycleScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_transport<T: TransportFactory>(mut self, factory: T) -> Self {
        self.transport_factory = Arc::new(factory);
        self
    }

    pub fn with_channel_id_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> ChannelId + Send + Sync + 'static,
    {
        self.channel_id_factory = Arc::new(factory);
        self
    }

    pub fn with_pipeline_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Pipeline + Send + Sync + 'static,
    {
        self.pipeline_factory = Arc::new(factory);
        self
    }

    pub fn with_channel_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(ChannelParts) -> Arc<dyn Channel> + Send + Sync + 'static,
    {
        self.channel_factory = Arc::new(factory);
        self
    }

    pub fn with_client_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Arc<dyn Channel>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        self.client_initializer = Arc::new(initializer);
        self
    }

    pub fn with_child_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Arc<dyn Channel>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        self.child_initializer = Arc::new(initializer);
        self
    }

    pub fn build(self) -> Bootstrap {
        Bootstrap {
            core: Arc::new(BootstrapCore {
                scope: self.scope,
                transport_factory: self.transport_factory,
                channel_id_factory: self.channel_id_factory,
                pipeline_factory: self.pipeline_factory,
                channel_factory: self.channel_factory,
                client_initializer: self.client_initializer,
                child_initializer: self.child_initializer,
            }),
            listeners: Arc::new(ListenerRegistry::new()),
        }
    }
}
