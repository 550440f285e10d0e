//! 常用类型的一站式导入。

pub use crate::bootstrap::{Bootstrap, ChannelInitializer, Listener};
pub use crate::channel::{Channel, ChannelId};
pub use crate::error::{BootstrapError, ChannelError, PipelineError};
pub use crate::exception::{Exception, StackTrace, as_exception};
pub use crate::pipeline::{
    ActiveHandler, Attachment, Event, EventHandler, ExceptionHandler, Handler, HandlerContext,
    InactiveHandler, InboundHandler, Message, OutboundHandler, Pipeline,
};
pub use crate::scope::LifecycleScope;
pub use chassis_transport::{Buffers, TransportOption};
pub use chassis_transport_tcp::{TcpOptions, with_tcp_options};
