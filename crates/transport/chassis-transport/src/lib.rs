//! chassis-transport：传输层契约。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 让 Pipeline/Bootstrap 只面向“可读写的字节流 + 可关闭的接受器”编程，
//!   不感知 TCP、Unix Socket 等具体介质；
//! - 将地址解析、方案（scheme）校验与介质特有选项的承载统一在一处，
//!   具体传输实现只需关心拨号、监听与套接字调优。
//!
//! ## 结构（How）
//! - [`address`]：`scheme://host:port/path` 解析与方案修正；
//! - [`options`]：[`TransportOptions`] 与可组合的 [`TransportOption`]；
//! - [`buffers`]：分片写入队列与 vectored 写入辅助函数；
//! - [`transport`]：[`Transport`]、[`Acceptor`]、[`TransportFactory`] 三个核心 trait；
//! - [`error`]：带稳定错误码的 [`TransportError`]。

pub mod address;
pub mod buffers;
pub mod error;
pub mod options;
pub mod transport;

pub use address::{Address, Schemes};
pub use buffers::{Buffers, write_buffers};
pub use error::TransportError;
pub use options::{OptionExtensions, TransportOption, TransportOptions, with_extension};
pub use transport::{Acceptor, Transport, TransportFactory};
