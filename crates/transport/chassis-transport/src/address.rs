//! 端点地址解析与方案校验。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 统一 `scheme://host:port/path` 形式的端点表示，连接与监听共用同一套解析规则；
//! - 兼容不带方案的 `host:port` 写法：它被视作 `//host:port`，方案留空，
//!   由具体传输的 [`Schemes::fix_address`] 填充默认方案。
//!
//! ## 契约（What）
//! - 解析后路径为空时补为 `/`；
//! - 方案一律小写（由 `url` crate 归一化），主机保持原样（IPv6 带方括号）。

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use url::Url;

use crate::error::TransportError;

/// 无方案地址在解析阶段借用的占位方案，解析完成后即被清空。
const BARE_SCHEME: &str = "chassis-bare";
/// 省略主机的地址在解析阶段借用的占位主机。
const ANY_HOST: &str = "unspecified";
const DEFAULT_PATH: &str = "/";

/// 解析后的端点地址。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
}

impl Address {
    /// 解析端点地址。
    ///
    /// # 教案级注释
    ///
    /// ## 逻辑（How）
    /// - `:8080`、`//:8080`、`tcp://:8080` 这类省略主机的写法先借用占位主机解析，
    ///   完成后把主机记为空串；
    /// - 先按完整 URL 解析；若结果没有主机部分（例如 `localhost:8080` 会被读成
    ///   方案 `localhost`），或输入根本不含方案（`127.0.0.1:8080`），
    ///   则去掉可能存在的前导 `//` 后以占位方案重新解析，并把方案记为空；
    /// - 其余解析失败直接返回 [`TransportError::InvalidAddress`]。
    ///
    /// ## 契约（What）
    /// - 主机只有在紧跟端口时才可以省略，表示“所有网卡”；监听会忽略主机，
    ///   拨号则由 [`Address::host_port`] 拒绝空主机；
    /// - 端口可以缺省，由需要套接字地址的调用点再行校验。
    pub fn parse(input: &str) -> Result<Self, TransportError> {
        match split_empty_host(input) {
            Some((prefix, rest)) => {
                let mut address = Self::parse_url(&format!("{prefix}{ANY_HOST}{rest}"), input)?;
                address.host.clear();
                Ok(address)
            }
            None => Self::parse_url(input, input),
        }
    }

    fn parse_url(candidate: &str, input: &str) -> Result<Self, TransportError> {
        let invalid = |err: url::ParseError| TransportError::invalid_address(input, err.to_string());

        let (url, bare) = match Url::parse(candidate) {
            Ok(url) if url.has_host() => (url, false),
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                let rest = candidate.strip_prefix("//").unwrap_or(candidate);
                let url = Url::parse(&format!("{BARE_SCHEME}://{rest}")).map_err(invalid)?;
                (url, true)
            }
            Err(err) => return Err(invalid(err)),
        };

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => return Err(TransportError::invalid_address(input, "missing host")),
        };
        let path = match url.path() {
            "" => DEFAULT_PATH.to_owned(),
            path => path.to_owned(),
        };

        Ok(Self {
            scheme: if bare {
                String::new()
            } else {
                url.scheme().to_owned()
            },
            host,
            port: url.port(),
            path,
        })
    }

    /// 方案；对 `host:port` 形式的输入，在 [`Schemes::fix_address`] 之前为空串。
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = scheme.into();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 返回拨号使用的 `host:port`。缺少主机或端口时返回 [`TransportError::InvalidAddress`]。
    pub fn host_port(&self) -> Result<String, TransportError> {
        if self.host.is_empty() {
            return Err(TransportError::invalid_address(self.to_string(), "missing host"));
        }
        let port = self.require_port()?;
        Ok(format!("{}:{port}", self.host))
    }

    /// 去掉主机部分，得到“所有网卡上的同一端口”对应的监听地址。
    ///
    /// 方案以 `6` 结尾（如 `tcp6`）时绑定 `[::]`，否则绑定 `0.0.0.0`。
    /// 因此 `tcp` 与 `tcp4` 一样只监听 IPv4，不是双栈监听；需要 IPv6 时使用 `tcp6`。
    pub fn without_host(&self) -> Result<SocketAddr, TransportError> {
        let port = self.require_port()?;
        if self.scheme.ends_with('6') {
            Ok(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))
        } else {
            Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        }
    }

    fn require_port(&self) -> Result<u16, TransportError> {
        self.port
            .ok_or_else(|| TransportError::invalid_address(self.to_string(), "missing port"))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            f.write_str(&self.scheme)?;
            f.write_str(":")?;
        }
        write!(f, "//{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        f.write_str(&self.path)
    }
}

/// 若地址省略了主机（`:8080`、`//:8080`、`tcp://:8080`），拆出主机前后两段。
///
/// 前一段总以 `//` 结尾，插入占位主机后即可按常规地址解析。
fn split_empty_host(input: &str) -> Option<(&str, &str)> {
    if input.starts_with(':') {
        return Some(("//", input));
    }
    let at = input.find("//")?;
    let (prefix, rest) = input.split_at(at + 2);
    (!prefix[..at].contains('/') && rest.starts_with(':')).then_some((prefix, rest))
}

/// 传输实现所支持的方案集合，首个元素为默认方案。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schemes(&'static [&'static str]);

impl Schemes {
    /// `schemes` 不得为空。
    pub const fn new(schemes: &'static [&'static str]) -> Self {
        Self(schemes)
    }

    pub fn as_slice(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.0.iter().any(|candidate| *candidate == scheme)
    }

    /// 校验并修正地址方案：空方案补为默认方案，受支持的方案保持不变，其余拒绝。
    pub fn fix_address(&self, address: &mut Address) -> Result<(), TransportError> {
        if address.scheme.is_empty() {
            if let Some(default) = self.0.first() {
                address.scheme = (*default).to_owned();
                return Ok(());
            }
        } else if self.contains(&address.scheme) {
            return Ok(());
        }
        Err(TransportError::UnsupportedScheme {
            scheme: address.scheme.clone(),
            expected: self.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: Schemes = Schemes::new(&["tcp", "tcp4", "tcp6"]);

    #[test]
    fn parses_full_url_with_default_path() {
        let addr = Address::parse("tcp://127.0.0.1:9527").expect("parse");
        assert_eq!(addr.scheme(), "tcp");
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), Some(9527));
        assert_eq!(addr.path(), "/");
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:9527/");
    }

    #[test]
    fn keeps_explicit_path() {
        let addr = Address::parse("tcp://localhost:80/chat").expect("parse");
        assert_eq!(addr.path(), "/chat");
    }

    #[test]
    fn bare_host_port_is_tolerated() {
        for input in ["127.0.0.1:8080", "localhost:8080", "//localhost:8080"] {
            let addr = Address::parse(input).expect(input);
            assert_eq!(addr.scheme(), "", "{input} 不应带方案");
            assert_eq!(addr.port(), Some(8080));
            assert_eq!(addr.path(), "/");
        }
    }

    #[test]
    fn omitted_host_means_all_interfaces() {
        for (input, scheme) in [(":8080", ""), ("//:8080", ""), ("tcp://:8080", "tcp")] {
            let addr = Address::parse(input).expect(input);
            assert_eq!(addr.scheme(), scheme, "{input}");
            assert_eq!(addr.host(), "", "{input}");
            assert_eq!(addr.port(), Some(8080), "{input}");
            assert_eq!(
                addr.without_host().expect("bind"),
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
            );
        }

        let v6 = Address::parse("tcp6://:9000/chat").expect("parse");
        assert_eq!(v6.path(), "/chat");
        assert_eq!(v6.to_string(), "tcp6://:9000/chat");
        assert_eq!(
            v6.without_host().expect("bind"),
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 9000))
        );
    }

    #[test]
    fn omitted_host_cannot_be_dialed() {
        let addr = Address::parse("tcp://:8080").expect("parse");
        let err = addr.host_port().expect_err("host required");
        assert_eq!(err.code(), "chassis.transport.invalid_address");
        assert!(err.to_string().contains("missing host"), "{err}");
    }

    #[test]
    fn empty_authority_is_still_rejected() {
        for input in ["tcp://", "//", ""] {
            assert!(Address::parse(input).is_err(), "{input}");
        }
    }

    #[test]
    fn ipv6_host_keeps_brackets() {
        let addr = Address::parse("tcp6://[::1]:7000").expect("parse");
        assert_eq!(addr.host_port().expect("host_port"), "[::1]:7000");
        assert_eq!(
            addr.without_host().expect("bind"),
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 7000))
        );
    }

    #[test]
    fn without_host_binds_all_interfaces() {
        let addr = Address::parse("tcp://10.1.2.3:6000").expect("parse");
        assert_eq!(
            addr.without_host().expect("bind"),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 6000))
        );
    }

    #[test]
    fn missing_port_is_reported_on_use() {
        let addr = Address::parse("tcp://localhost").expect("parse");
        let err = addr.host_port().expect_err("port required");
        assert_eq!(err.code(), "chassis.transport.invalid_address");
    }

    #[test]
    fn fix_address_defaults_and_rejects() {
        let mut bare = Address::parse("127.0.0.1:1").expect("parse");
        TCP.fix_address(&mut bare).expect("default scheme");
        assert_eq!(bare.scheme(), "tcp");

        let mut v6 = Address::parse("tcp6://[::1]:1").expect("parse");
        TCP.fix_address(&mut v6).expect("supported scheme");
        assert_eq!(v6.scheme(), "tcp6");

        let mut udp = Address::parse("udp://127.0.0.1:1").expect("parse");
        let err = TCP.fix_address(&mut udp).expect_err("unsupported");
        assert!(matches!(err, TransportError::UnsupportedScheme { .. }));
        assert_eq!(udp.scheme(), "udp");
    }
}
