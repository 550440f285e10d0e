//! 最小回显服务：`cargo run -p chassis-core --example echo_server -- tcp://127.0.0.1:7000`。
//!
//! 日志级别由 `RUST_LOG` 控制，默认 `info`；Ctrl-C 触发优雅关停。

use std::sync::Arc;
use std::time::Duration;

use chassis_core::prelude::*;
use tracing_subscriber::EnvFilter;

/// 原样写回收到的字节，并在连接断开时记录原因。
struct Echo;

impl Handler for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }

    fn as_inactive(&self) -> Option<&dyn InactiveHandler> {
        Some(self)
    }
}

impl InboundHandler for Echo {
    fn handle_read(&self, ctx: &HandlerContext, message: Message) {
        ctx.write(message);
    }
}

impl InactiveHandler for Echo {
    fn handle_inactive(&self, ctx: &HandlerContext, exception: Option<Exception>) {
        if let Some(channel) = ctx.channel() {
            match &exception {
                Some(ex) => tracing::info!(channel.id = %channel.id(), error = %ex, "peer gone"),
                None => tracing::info!(channel.id = %channel.id(), "peer gone"),
            }
        }
        ctx.fire_channel_inactive(exception);
    }
}

#[tokio::main]
async fn main() -> Result<(), BootstrapError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:7000".to_owned());

    let bootstrap = Bootstrap::builder()
        .with_child_initializer(|channel: &Arc<dyn Channel>| {
            channel.pipeline().add_last([Echo])?;
            Ok(())
        })
        .build();

    let tuning = TcpOptions::default()
        .with_keep_alive_period(Duration::from_secs(30))
        .with_linger(0);
    let listener = bootstrap.listen(&url, [with_tcp_options(tuning)]);

    let shutdown = bootstrap.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    match listener.sync().await {
        Err(err) if !err.is_closed() => Err(err),
        _ => Ok(()),
    }
}
