//! 处理器契约与能力位集。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 处理器通过实现六类能力 trait 中的若干个接入管道；管道在派发事件时只调用
//!   声明了对应能力的处理器，其余节点被透明跳过；
//! - 能力在注册时经 [`Handler`] 的 `as_*` 探针计算一次并存入链节点，派发阶段只做位运算。
//!
//! ## 契约（What）
//! - 一个处理器至少声明一种能力，否则注册被拒绝；
//! - 同一处理器实例可被多个管道共享，前提是它不携带按连接划分的可变状态，
//!   这一点由调用方保证；
//! - 所有回调都是同步的，不应在其中阻塞等待 IO。

use std::ops::BitOr;
use std::sync::Arc;

use super::context::HandlerContext;
use super::{Event, Message};
use crate::exception::Exception;

/// 连接变为可用。
pub trait ActiveHandler: Send + Sync {
    fn handle_active(&self, ctx: &HandlerContext);
}

/// 读到一条入站消息。
pub trait InboundHandler: Send + Sync {
    fn handle_read(&self, ctx: &HandlerContext, message: Message);
}

/// 一条出站消息等待写出。
pub trait OutboundHandler: Send + Sync {
    fn handle_write(&self, ctx: &HandlerContext, message: Message);
}

/// 发生运行期故障。
pub trait ExceptionHandler: Send + Sync {
    fn handle_exception(&self, ctx: &HandlerContext, exception: Exception);
}

/// 连接结束；`exception` 为导致结束的故障（正常关闭时为 `None`）。
pub trait InactiveHandler: Send + Sync {
    fn handle_inactive(&self, ctx: &HandlerContext, exception: Option<Exception>);
}

/// 自定义用户事件。
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, ctx: &HandlerContext, event: Event);
}

/// 管道中的处理单元。
///
/// 实现方通过覆写 `as_*` 探针声明能力，例如：
///
/// ```
/// use chassis_core::pipeline::{Handler, HandlerContext, InboundHandler, Message};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn as_inbound(&self) -> Option<&dyn InboundHandler> {
///         Some(self)
///     }
/// }
///
/// impl InboundHandler for Echo {
///     fn handle_read(&self, ctx: &HandlerContext, message: Message) {
///         ctx.write(message);
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// 诊断用名称，默认取类型名。
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn as_active(&self) -> Option<&dyn ActiveHandler> {
        None
    }

    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        None
    }

    fn as_outbound(&self) -> Option<&dyn OutboundHandler> {
        None
    }

    fn as_exception(&self) -> Option<&dyn ExceptionHandler> {
        None
    }

    fn as_inactive(&self) -> Option<&dyn InactiveHandler> {
        None
    }

    fn as_event(&self) -> Option<&dyn EventHandler> {
        None
    }
}

/// 处理器声明的能力集合。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const ACTIVE: Self = Self(1 << 0);
    pub const INBOUND: Self = Self(1 << 1);
    pub const OUTBOUND: Self = Self(1 << 2);
    pub const EXCEPTION: Self = Self(1 << 3);
    pub const INACTIVE: Self = Self(1 << 4);
    pub const EVENT: Self = Self(1 << 5);

    /// 探测处理器实现了哪些能力。
    pub fn of(handler: &dyn Handler) -> Self {
        let declared = [
            (handler.as_active().is_some(), Self::ACTIVE),
            (handler.as_inbound().is_some(), Self::INBOUND),
            (handler.as_outbound().is_some(), Self::OUTBOUND),
            (handler.as_exception().is_some(), Self::EXCEPTION),
            (handler.as_inactive().is_some(), Self::INACTIVE),
            (handler.as_event().is_some(), Self::EVENT),
        ];
        declared
            .into_iter()
            .filter(|(present, _)| *present)
            .fold(Self::NONE, |acc, (_, flag)| acc | flag)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 可注册进管道的处理器形态。
///
/// 直接传入处理器值、`Arc<T>`（在多个管道间共享同一实例）或 `Arc<dyn Handler>`
/// （混合多种处理器类型）均可。
pub trait IntoHandler {
    fn into_handler(self) -> Arc<dyn Handler>;
}

impl<T: Handler> IntoHandler for T {
    fn into_handler(self) -> Arc<dyn Handler> {
        Arc::new(self)
    }
}

impl<T: Handler> IntoHandler for Arc<T> {
    fn into_handler(self) -> Arc<dyn Handler> {
        self
    }
}

impl IntoHandler for Arc<dyn Handler> {
    fn into_handler(self) -> Arc<dyn Handler> {
        self
    }
}
