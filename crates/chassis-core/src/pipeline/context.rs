//! 处理器上下文与方向性派发。
//!
//! # 教案级说明
//!
//! ## 逻辑（How）
//! - 每次派发从起点出发沿指定方向逐节点检查能力位，遇到声明了对应能力的节点即
//!   为其构造 [`HandlerContext`] 并调用处理器；没有该能力的节点被透明跳过；
//! - 处理器决定是否继续传播：调用上下文的 `fire_*` 把事件（原样或替换后的负载）
//!   交给下一个节点，不调用则传播在此终止。
//!
//! ## 契约（What）
//! - 入站类事件（active/read/exception/inactive/event）向尾部前进，写事件向头部前进；
//! - 一次派发始终沿同一份链路快照行进，期间的结构变更只对之后触发的事件可见。

use std::fmt;
use std::sync::Arc;

use super::chain::{Chain, NodeId};
use super::handler::{Capabilities, Handler};
use super::pipeline::Pipeline;
use super::{Event, Message};
use crate::channel::Channel;
use crate::exception::Exception;

#[derive(Clone, Copy, Debug)]
enum Direction {
    Forward,
    Backward,
}

/// 链路节点在一次事件派发中的视图。
///
/// 上下文持有创建时的链路快照，可以克隆后留存（例如在定时任务中回写），
/// 但它看不到之后的结构变更。
#[derive(Clone)]
pub struct HandlerContext {
    pipeline: Pipeline,
    chain: Arc<Chain>,
    node: NodeId,
}

impl HandlerContext {
    pub(crate) fn new(pipeline: Pipeline, chain: Arc<Chain>, node: NodeId) -> Self {
        Self {
            pipeline,
            chain,
            node,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// 管道挂接的 Channel；尚未挂接或 Channel 已释放时为 `None`。
    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.pipeline.channel()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.chain.node(self.node).handler
    }

    pub fn capabilities(&self) -> Capabilities {
        self.chain.node(self.node).capabilities
    }

    /// 节点在快照中的位置，头哨兵为 0。
    pub fn position(&self) -> usize {
        self.chain.position_of(self.node)
    }

    pub fn is_head(&self) -> bool {
        self.node == NodeId::HEAD
    }

    pub fn is_tail(&self) -> bool {
        self.node == NodeId::TAIL
    }

    pub fn fire_channel_active(&self) {
        dispatch_active(&self.pipeline, &self.chain, self.chain.next(self.node));
    }

    pub fn fire_channel_read(&self, message: Message) {
        dispatch_read(&self.pipeline, &self.chain, self.chain.next(self.node), message);
    }

    /// 把出站消息交给前一个（更靠近传输端的）节点。
    pub fn fire_channel_write(&self, message: Message) {
        dispatch_write(&self.pipeline, &self.chain, self.chain.prev(self.node), message);
    }

    pub fn fire_channel_exception(&self, exception: Exception) {
        dispatch_exception(
            &self.pipeline,
            &self.chain,
            self.chain.next(self.node),
            exception,
        );
    }

    pub fn fire_channel_inactive(&self, exception: Option<Exception>) {
        dispatch_inactive(
            &self.pipeline,
            &self.chain,
            self.chain.next(self.node),
            exception,
        );
    }

    pub fn fire_channel_event(&self, event: Event) {
        dispatch_event(&self.pipeline, &self.chain, self.chain.next(self.node), event);
    }

    /// 从管道尾部写出消息，经过全部出站处理器。
    pub fn write(&self, message: Message) {
        self.pipeline.fire_channel_write(message);
    }

    /// 关闭挂接的 Channel；未挂接时为空操作。
    pub fn close(&self, exception: Option<Exception>) {
        if let Some(channel) = self.channel() {
            channel.close(exception);
        }
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("handler", &self.handler().name())
            .field("position", &self.position())
            .finish()
    }
}

/// 从 `from`（含）起沿 `direction` 寻找第一个声明了 `capability` 的节点。
fn seek(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    capability: Capabilities,
    direction: Direction,
) -> Option<HandlerContext> {
    let mut cursor = from;
    while let Some(id) = cursor {
        if chain.node(id).capabilities.contains(capability) {
            return Some(HandlerContext::new(pipeline.clone(), Arc::clone(chain), id));
        }
        cursor = match direction {
            Direction::Forward => chain.next(id),
            Direction::Backward => chain.prev(id),
        };
    }
    tracing::trace!(?capability, ?direction, "event left the pipeline unhandled");
    None
}

pub(crate) fn dispatch_active(pipeline: &Pipeline, chain: &Arc<Chain>, from: Option<NodeId>) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::ACTIVE, Direction::Forward) {
        if let Some(handler) = ctx.handler().as_active() {
            handler.handle_active(&ctx);
        }
    }
}

pub(crate) fn dispatch_read(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    message: Message,
) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::INBOUND, Direction::Forward) {
        if let Some(handler) = ctx.handler().as_inbound() {
            handler.handle_read(&ctx, message);
        }
    }
}

pub(crate) fn dispatch_write(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    message: Message,
) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::OUTBOUND, Direction::Backward) {
        if let Some(handler) = ctx.handler().as_outbound() {
            handler.handle_write(&ctx, message);
        }
    }
}

pub(crate) fn dispatch_exception(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    exception: Exception,
) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::EXCEPTION, Direction::Forward) {
        if let Some(handler) = ctx.handler().as_exception() {
            handler.handle_exception(&ctx, exception);
        }
    }
}

pub(crate) fn dispatch_inactive(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    exception: Option<Exception>,
) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::INACTIVE, Direction::Forward) {
        if let Some(handler) = ctx.handler().as_inactive() {
            handler.handle_inactive(&ctx, exception);
        }
    }
}

pub(crate) fn dispatch_event(
    pipeline: &Pipeline,
    chain: &Arc<Chain>,
    from: Option<NodeId>,
    event: Event,
) {
    if let Some(ctx) = seek(pipeline, chain, from, Capabilities::EVENT, Direction::Forward) {
        if let Some(handler) = ctx.handler().as_event() {
            handler.handle_event(&ctx, event);
        }
    }
}
