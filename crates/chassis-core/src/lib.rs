//! chassis-core：传输无关的网络应用骨架。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 把原始字节流连接（TCP 或其他可插拔传输）与协议处理逻辑解耦：协议以
//!   [`Handler`](pipeline::Handler) 的形式挂入双向事件管道，骨架只负责连接的
//!   建立、装配与回收；
//! - 运行期故障统一规范化为 [`Exception`]，沿管道传播给处理器决策。
//!
//! ## 结构（How）
//! - [`pipeline`]：有序的处理器链、六类能力、方向性派发与头尾哨兵；
//! - [`channel`]：Channel 契约与默认实现（读循环、有界写队列）；
//! - [`bootstrap`]：连接/监听编排、监听器注册表与关停协调；
//! - [`exception`]：异常包装、栈快照与回溯打印；
//! - [`scope`]：根生命周期作用域（协作式取消）。
//!
//! ## 契约（What）
//! - 管道结构变更应在挂接 Channel 之前完成；运行中变更仅对下一次触发的事件可见；
//! - 配置错误（未识别的处理器、越界位置、重复挂接、重复 `sync`）立即同步返回；
//! - 运行期故障不会从 `fire_*` 调用返回，而是经 `fire_channel_exception` 注入管道。

pub mod bootstrap;
pub mod channel;
pub mod error;
pub mod exception;
pub mod pipeline;
pub mod prelude;
pub mod scope;

pub use bootstrap::{Bootstrap, BootstrapBuilder, Listener, ListenerRegistry};
pub use channel::{Channel, ChannelId};
pub use error::{BootstrapError, ChannelError, PipelineError};
pub use exception::{Exception, StackTrace, as_exception};
pub use pipeline::{HandlerContext, Pipeline};
pub use scope::LifecycleScope;
