//! chassis-transport-tcp：默认的 TCP 传输实现。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 为 Bootstrap 提供开箱即用的 `tcp`/`tcp4`/`tcp6` 方案；
//! - 拨号与接受得到的连接应用同一套套接字调优（keep-alive、linger、no-delay、缓冲区）。
//!
//! ## 结构（How）
//! - [`TcpTransportFactory`]：方案校验、带超时的拨号、监听；
//! - [`TcpAcceptor`]：可被 `close` 唤醒的接受循环；
//! - [`TcpTransport`]：对 `tokio::net::TcpStream` 的薄封装；
//! - [`TcpOptions`]：套接字调优参数，经 [`with_tcp_options`] 放入传输选项。

mod acceptor;
mod error;
mod factory;
mod options;
mod transport;

pub use acceptor::TcpAcceptor;
pub use factory::{TCP_SCHEMES, TcpTransportFactory};
pub use options::{TcpOptions, with_tcp_options};
pub use transport::TcpTransport;
