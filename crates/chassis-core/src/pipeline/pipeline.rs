use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::chain::{Chain, NodeId};
use super::context::{
    HandlerContext, dispatch_active, dispatch_event, dispatch_exception, dispatch_inactive,
    dispatch_read, dispatch_write,
};
use super::handler::{Capabilities, Handler, IntoHandler};
use super::sentinel::{HeadHandler, TailHandler};
use super::{Event, Message};
use crate::channel::Channel;
use crate::error::PipelineError;
use crate::exception::Exception;

struct PipelineInner {
    chain: ArcSwap<Chain>,
    mutation: Mutex<()>,
    channel: OnceLock<Weak<dyn Channel>>,
}

/// 一条连接的有序处理器链。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 以“头哨兵 … 用户处理器 … 尾哨兵”的双向链承载协议逻辑：入站事件从头（传输端）
///   流向尾（应用端），出站写从尾流向头；
/// - 头哨兵负责把写出的消息交给 Channel，尾哨兵为无人消费的事件提供默认收尾。
///
/// ## 逻辑（How）
/// - 链路以不可变快照发布在 `ArcSwap` 中；结构变更在互斥锁内克隆快照、拼接节点、
///   整体替换，派发路径只做一次无锁加载；
/// - Channel 以弱引用挂接，避免 Channel ↔ Pipeline 的引用环；
/// - `Pipeline` 本身是廉价克隆的句柄，所有克隆共享同一条链。
///
/// ## 契约（What）
/// - `size()` 始终 ≥ 2（两个哨兵）；
/// - Channel 至多挂接一次，第二次挂接返回 [`PipelineError::AlreadyAttached`]；
/// - 处理器校验先于任何插入发生：一批处理器中只要有一个不合法，整批都不会落地。
///
/// ## 风险提示（Trade-offs）
/// - 每次结构变更复制整条链，O(n)；处理器数量通常很小，换来派发路径无锁；
/// - 结构变更理应在挂接前完成，运行期变更不会影响正在进行的派发。
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

type Prepared = Vec<(Arc<dyn Handler>, Capabilities)>;

impl Pipeline {
    /// 创建仅含头尾哨兵的空管道。
    pub fn new() -> Self {
        let chain = Chain::new(Arc::new(HeadHandler), Arc::new(TailHandler));
        Self {
            inner: Arc::new(PipelineInner {
                chain: ArcSwap::from_pointee(chain),
                mutation: Mutex::new(()),
                channel: OnceLock::new(),
            }),
        }
    }

    /// 逐个把处理器插到头哨兵之后。
    ///
    /// 每个处理器都紧贴头哨兵插入，因此一次传入多个时它们在链中的顺序与参数顺序相反。
    pub fn add_first<I>(&self, handlers: I) -> Result<&Self, PipelineError>
    where
        I: IntoIterator,
        I::Item: IntoHandler,
    {
        let prepared = prepare(handlers)?;
        self.mutate(|chain| {
            for (handler, capabilities) in prepared {
                chain.insert_after(NodeId::HEAD, handler, capabilities);
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// 按参数顺序把处理器插到尾哨兵之前。
    pub fn add_last<I>(&self, handlers: I) -> Result<&Self, PipelineError>
    where
        I: IntoIterator,
        I::Item: IntoHandler,
    {
        let prepared = prepare(handlers)?;
        self.mutate(|chain| {
            for (handler, capabilities) in prepared {
                chain.insert_before(NodeId::TAIL, handler, capabilities);
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// 在第 `position` 个节点之后按参数顺序插入处理器。
    ///
    /// # 教案级注释
    ///
    /// ## 契约（What）
    /// - `position == -1` 或 `position == size() - 1`（尾哨兵）等价于 [`Pipeline::add_last`]；
    /// - `position >= size()` 或 `position < -1` 返回 [`PipelineError::InvalidPosition`]；
    /// - 其余位置从头哨兵（位置 0）向后走 `position` 步，在该节点之后依次插入。
    pub fn add_handler<I>(&self, position: isize, handlers: I) -> Result<&Self, PipelineError>
    where
        I: IntoIterator,
        I::Item: IntoHandler,
    {
        let prepared = prepare(handlers)?;
        self.mutate(|chain| {
            let size = chain.size();
            let last = size as isize - 1;
            if position < -1 || position > last {
                return Err(PipelineError::InvalidPosition { position, size });
            }
            if position == -1 || position == last {
                for (handler, capabilities) in prepared {
                    chain.insert_before(NodeId::TAIL, handler, capabilities);
                }
                return Ok(());
            }
            let mut anchor = chain
                .nth(position as usize)
                .ok_or(PipelineError::InvalidPosition { position, size })?;
            for (handler, capabilities) in prepared {
                anchor = chain.insert_after(anchor, handler, capabilities);
            }
            Ok(())
        })?;
        Ok(self)
    }

    /// 从头哨兵（位置 0）开始查找第一个满足条件的处理器位置。
    pub fn index_of<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&dyn Handler) -> bool,
    {
        let chain = self.inner.chain.load();
        chain
            .iter()
            .position(|id| predicate(chain.node(id).handler.as_ref()))
    }

    /// 从尾哨兵（位置 `size() - 1`）开始反向查找满足条件的处理器位置。
    pub fn last_index_of<F>(&self, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&dyn Handler) -> bool,
    {
        let chain = self.inner.chain.load();
        let last = chain.size() - 1;
        chain
            .iter_rev()
            .position(|id| predicate(chain.node(id).handler.as_ref()))
            .map(|offset| last - offset)
    }

    /// 返回指定位置的上下文；`-1`、负数或越界时为 `None`。
    pub fn context_at(&self, position: isize) -> Option<HandlerContext> {
        let position = usize::try_from(position).ok()?;
        let chain = self.inner.chain.load_full();
        let node = chain.nth(position)?;
        Some(HandlerContext::new(self.clone(), chain, node))
    }

    /// 节点数，包含两个哨兵。
    pub fn size(&self) -> usize {
        self.inner.chain.load().size()
    }

    /// 头 → 尾的处理器名称快照，便于诊断。
    pub fn handler_names(&self) -> Vec<String> {
        let chain = self.inner.chain.load();
        chain
            .iter()
            .map(|id| chain.node(id).handler.name().to_owned())
            .collect()
    }

    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.inner.channel.get().and_then(Weak::upgrade)
    }

    /// 一次性挂接 Channel 并让它开始服务。
    pub fn serve_channel(&self, channel: Arc<dyn Channel>) -> Result<(), PipelineError> {
        self.inner
            .channel
            .set(Arc::downgrade(&channel))
            .map_err(|_| PipelineError::AlreadyAttached)?;
        tracing::debug!(channel.id = %channel.id(), handlers = ?self.handler_names(), "pipeline attached");
        channel.serve();
        Ok(())
    }

    pub fn fire_channel_active(&self) {
        let chain = self.inner.chain.load_full();
        dispatch_active(self, &chain, Some(NodeId::HEAD));
    }

    pub fn fire_channel_read(&self, message: Message) {
        let chain = self.inner.chain.load_full();
        dispatch_read(self, &chain, Some(NodeId::HEAD), message);
    }

    /// 从尾哨兵开始向头部派发写事件。
    pub fn fire_channel_write(&self, message: Message) {
        let chain = self.inner.chain.load_full();
        dispatch_write(self, &chain, Some(NodeId::TAIL), message);
    }

    pub fn fire_channel_exception(&self, exception: Exception) {
        let chain = self.inner.chain.load_full();
        dispatch_exception(self, &chain, Some(NodeId::HEAD), exception);
    }

    pub fn fire_channel_inactive(&self, exception: Option<Exception>) {
        let chain = self.inner.chain.load_full();
        dispatch_inactive(self, &chain, Some(NodeId::HEAD), exception);
    }

    pub fn fire_channel_event(&self, event: Event) {
        let chain = self.inner.chain.load_full();
        dispatch_event(self, &chain, Some(NodeId::HEAD), event);
    }

    fn mutate<F>(&self, splice: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut Chain) -> Result<(), PipelineError>,
    {
        let _guard = self.inner.mutation.lock();
        let mut next = Chain::clone(&self.inner.chain.load());
        splice(&mut next)?;
        self.inner.chain.store(Arc::new(next));
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.handler_names())
            .field("attached", &self.inner.channel.get().is_some())
            .finish()
    }
}

fn prepare<I>(handlers: I) -> Result<Prepared, PipelineError>
where
    I: IntoIterator,
    I::Item: IntoHandler,
{
    handlers
        .into_iter()
        .enumerate()
        .map(|(index, handler)| {
            let handler = handler.into_handler();
            let capabilities = Capabilities::of(handler.as_ref());
            if capabilities.is_empty() {
                return Err(PipelineError::UnrecognizedHandler {
                    index,
                    name: handler.name().to_owned(),
                });
            }
            Ok((handler, capabilities))
        })
        .collect()
}
