use std::net::SocketAddr;

use async_trait::async_trait;
use chassis_transport::{
    Acceptor, Address, Schemes, Transport, TransportError, TransportFactory, TransportOptions,
};
use tokio::net::TcpStream;

use crate::acceptor::TcpAcceptor;
use crate::error::{self, map_io_error, timeout_error};
use crate::options::TcpOptions;
use crate::transport::TcpTransport;

/// TCP 支持的方案，`tcp` 为无方案地址的默认值。
pub const TCP_SCHEMES: Schemes = Schemes::new(&["tcp", "tcp4", "tcp6"]);

/// 默认 TCP 传输工厂。
///
/// # 教案级注释
///
/// ## 逻辑（How）
/// - `connect`：修正方案 → 解析 `host:port` 并按 `tcp4`/`tcp6` 过滤地址族 →
///   在 `connect_timeout` 内依次尝试 → 应用套接字调优；
/// - `listen`：修正方案 → 在去掉主机部分的地址上绑定（所有网卡、同一端口）。
///
/// ## 契约（What）
/// - 超时返回 `chassis.transport.tcp.timeout`；拒绝连接等 IO 失败返回
///   `chassis.transport.tcp.connect_failed` 并保留原始错误；
/// - 方案不受支持时不发生任何 IO。
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpTransportFactory;

impl TcpTransportFactory {
    pub const fn new() -> Self {
        Self
    }
}

async fn resolve(address: &Address) -> Result<Vec<SocketAddr>, TransportError> {
    let target = address.host_port()?;
    let candidates = tokio::net::lookup_host(target.as_str())
        .await
        .map_err(|err| map_io_error(error::RESOLVE, err))?;
    let resolved: Vec<SocketAddr> = candidates
        .filter(|addr| match address.scheme() {
            "tcp4" => addr.is_ipv4(),
            "tcp6" => addr.is_ipv6(),
            _ => true,
        })
        .collect();
    if resolved.is_empty() {
        return Err(TransportError::invalid_address(
            address.to_string(),
            "no address matches the scheme's address family",
        ));
    }
    Ok(resolved)
}

#[async_trait]
impl TransportFactory for TcpTransportFactory {
    fn schemes(&self) -> Schemes {
        TCP_SCHEMES
    }

    async fn connect(
        &self,
        options: &mut TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        TCP_SCHEMES.fix_address(options.address_mut())?;
        let tcp = TcpOptions::from_transport_options(options);

        let dial = async {
            let targets = resolve(options.address()).await?;
            TcpStream::connect(targets.as_slice())
                .await
                .map_err(|err| map_io_error(error::CONNECT, err))
        };
        let stream = tokio::time::timeout(tcp.connect_timeout, dial)
            .await
            .map_err(|_| timeout_error(error::CONNECT))??;

        tracing::debug!(address = %options.address(), "tcp connection established");
        Ok(Box::new(TcpTransport::establish(stream, &tcp)?))
    }

    async fn listen(
        &self,
        options: &mut TransportOptions,
    ) -> Result<Box<dyn Acceptor>, TransportError> {
        TCP_SCHEMES.fix_address(options.address_mut())?;
        let tcp = TcpOptions::from_transport_options(options);
        let bind_addr = options.address().without_host()?;
        let acceptor = TcpAcceptor::bind(bind_addr, tcp).await?;
        tracing::debug!(address = %options.address(), bind.addr = %bind_addr, "tcp listening");
        Ok(Box::new(acceptor))
    }
}
