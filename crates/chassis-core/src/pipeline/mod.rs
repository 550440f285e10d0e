//! 事件传播管道。
//!
//! 入站类事件从头哨兵向尾哨兵传播，出站写从尾哨兵向头哨兵传播；每个节点只在
//! 声明了对应能力时才被调用。

mod chain;
mod context;
mod handler;
#[allow(clippy::module_inception)]
mod pipeline;
mod sentinel;

use std::any::Any;
use std::sync::Arc;

pub use context::HandlerContext;
pub use handler::{
    ActiveHandler, Capabilities, EventHandler, ExceptionHandler, Handler, InactiveHandler,
    InboundHandler, IntoHandler, OutboundHandler,
};
pub use pipeline::Pipeline;

/// 沿管道流动的读写消息。
pub type Message = Box<dyn Any + Send>;

/// 自定义用户事件。
pub type Event = Box<dyn Any + Send>;

/// 调用方挂在 Channel 上的任意上下文对象。
pub type Attachment = Arc<dyn Any + Send + Sync>;

/// 每条连接生成一条全新空管道的工厂。
pub type PipelineFactory = Arc<dyn Fn() -> Pipeline + Send + Sync>;

/// 头哨兵的诊断名称。
pub const HEAD_HANDLER_NAME: &str = sentinel::HEAD_NAME;

/// 尾哨兵的诊断名称。
pub const TAIL_HANDLER_NAME: &str = sentinel::TAIL_NAME;
