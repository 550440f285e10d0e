//! 头尾哨兵的默认行为。
//!
//! - 头哨兵只处理写事件：把字节类消息交给 Channel 写出；无法转换或写入失败时
//!   以 `fire_channel_exception` 注入异常；未挂接 Channel 时丢弃并告警。
//! - 尾哨兵收尾所有入站类事件：读与自定义事件被丢弃；异常记录告警后以该异常关闭
//!   Channel；非活跃事件确保 Channel 已关闭。

use bytes::{Bytes, BytesMut};
use chassis_transport::Buffers;

use super::context::HandlerContext;
use super::handler::{
    ActiveHandler, EventHandler, ExceptionHandler, Handler, InactiveHandler, InboundHandler,
    OutboundHandler,
};
use super::{Event, Message};
use crate::error::ChannelError;
use crate::exception::Exception;

pub(crate) const HEAD_NAME: &str = "chassis::head";
pub(crate) const TAIL_NAME: &str = "chassis::tail";

pub(crate) struct HeadHandler;

impl Handler for HeadHandler {
    fn name(&self) -> &str {
        HEAD_NAME
    }

    fn as_outbound(&self) -> Option<&dyn OutboundHandler> {
        Some(self)
    }
}

impl OutboundHandler for HeadHandler {
    fn handle_write(&self, ctx: &HandlerContext, message: Message) {
        let Some(channel) = ctx.channel() else {
            tracing::warn!("outbound message dropped: pipeline has no attached channel");
            return;
        };
        let result = match into_buffers(message) {
            Ok(buffers) => channel.writev(buffers),
            Err(_) => Err(ChannelError::UnsupportedMessage),
        };
        if let Err(err) = result {
            tracing::debug!(channel.id = %channel.id(), error = %err, "head write failed");
            ctx.pipeline().fire_channel_exception(Exception::new(err));
        }
    }
}

/// 把字节类消息转换为写队列分片；不支持的类型原样退回。
fn into_buffers(message: Message) -> Result<Buffers, Message> {
    let message = match message.downcast::<Buffers>() {
        Ok(buffers) => return Ok(*buffers),
        Err(message) => message,
    };
    let message = match message.downcast::<Bytes>() {
        Ok(bytes) => return Ok(single(*bytes)),
        Err(message) => message,
    };
    let message = match message.downcast::<BytesMut>() {
        Ok(bytes) => return Ok(single(bytes.freeze())),
        Err(message) => message,
    };
    let message = match message.downcast::<Vec<u8>>() {
        Ok(bytes) => return Ok(single(Bytes::from(*bytes))),
        Err(message) => message,
    };
    let message = match message.downcast::<String>() {
        Ok(text) => return Ok(single(Bytes::from(*text))),
        Err(message) => message,
    };
    match message.downcast::<&'static str>() {
        Ok(text) => Ok(single(Bytes::from_static(text.as_bytes()))),
        Err(message) => Err(message),
    }
}

fn single(bytes: Bytes) -> Buffers {
    let mut buffers = Buffers::new();
    buffers.push(bytes);
    buffers
}

pub(crate) struct TailHandler;

impl Handler for TailHandler {
    fn name(&self) -> &str {
        TAIL_NAME
    }

    fn as_active(&self) -> Option<&dyn ActiveHandler> {
        Some(self)
    }

    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }

    fn as_exception(&self) -> Option<&dyn ExceptionHandler> {
        Some(self)
    }

    fn as_inactive(&self) -> Option<&dyn InactiveHandler> {
        Some(self)
    }

    fn as_event(&self) -> Option<&dyn EventHandler> {
        Some(self)
    }
}

impl ActiveHandler for TailHandler {
    fn handle_active(&self, _ctx: &HandlerContext) {}
}

impl InboundHandler for TailHandler {
    fn handle_read(&self, ctx: &HandlerContext, _message: Message) {
        tracing::debug!(
            channel.id = ?ctx.channel().map(|channel| channel.id()),
            "inbound message reached the tail unconsumed; dropped"
        );
    }
}

impl ExceptionHandler for TailHandler {
    fn handle_exception(&self, ctx: &HandlerContext, exception: Exception) {
        tracing::warn!(
            channel.id = ?ctx.channel().map(|channel| channel.id()),
            error.kind = exception.kind(),
            error = %exception,
            "unhandled exception reached the tail; closing channel"
        );
        ctx.close(Some(exception));
    }
}

impl InactiveHandler for TailHandler {
    fn handle_inactive(&self, ctx: &HandlerContext, exception: Option<Exception>) {
        if let Some(channel) = ctx.channel() {
            if channel.is_active() {
                channel.close(exception);
            }
        }
    }
}

impl EventHandler for TailHandler {
    fn handle_event(&self, ctx: &HandlerContext, _event: Event) {
        tracing::debug!(
            channel.id = ?ctx.channel().map(|channel| channel.id()),
            "user event reached the tail unconsumed; dropped"
        );
    }
}
