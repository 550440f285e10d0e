use std::borrow::Cow;
use std::io;

const INVALID_ADDRESS_CODE: &str = "chassis.transport.invalid_address";
const UNSUPPORTED_SCHEME_CODE: &str = "chassis.transport.unsupported_scheme";
const INVALID_OPTION_CODE: &str = "chassis.transport.invalid_option";
const CLOSED_CODE: &str = "chassis.transport.closed";

/// 传输层统一错误类型。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 地址解析、拨号、监听、接受与套接字调优的失败都需要以显式错误返回给调用方，
///   由调用方决定重试策略；
/// - 每个变体都映射到稳定的点分错误码，便于日志聚合与告警规则匹配。
///
/// ## 契约（What）
/// - [`TransportError::code`] 在版本间保持稳定；
/// - `Io` 保留原始 [`io::Error`] 作为 `source`，便于上层追溯系统调用层面的原因；
/// - `Closed` 表示接受器已关闭，属于正常的生命周期终点而非故障。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// 地址无法解析为 `scheme://host:port/path` 形式。
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress {
        address: String,
        reason: Cow<'static, str>,
    },
    /// 地址声明的方案不在传输实现支持的集合中。
    #[error("invalid scheme `{scheme}`, {expected:?}:// are expected")]
    UnsupportedScheme {
        scheme: String,
        expected: &'static [&'static str],
    },
    /// 选项函数拒绝了当前配置。
    #[error("invalid transport option: {reason}")]
    InvalidOption { reason: Cow<'static, str> },
    /// 底层 IO 失败。
    #[error("{message}")]
    Io {
        code: &'static str,
        message: String,
        #[source]
        source: io::Error,
    },
    /// 操作在限定时间内未完成。
    #[error("{message}")]
    Timeout { code: &'static str, message: String },
    /// 接受器或连接已关闭。
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// 构造带稳定错误码的 IO 错误，文案格式为 `"{operation}: {source}"`。
    pub fn io(code: &'static str, operation: &str, source: io::Error) -> Self {
        Self::Io {
            code,
            message: format!("{operation}: {source}"),
            source,
        }
    }

    /// 构造超时错误，文案格式为 `"{operation} timed out"`。
    pub fn timeout(code: &'static str, operation: &str) -> Self {
        Self::Timeout {
            code,
            message: format!("{operation} timed out"),
        }
    }

    pub fn invalid_address(address: impl Into<String>, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_option(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOption {
            reason: reason.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => INVALID_ADDRESS_CODE,
            Self::UnsupportedScheme { .. } => UNSUPPORTED_SCHEME_CODE,
            Self::InvalidOption { .. } => INVALID_OPTION_CODE,
            Self::Io { code, .. } | Self::Timeout { code, .. } => code,
            Self::Closed => CLOSED_CODE,
        }
    }

    /// 底层 IO 错误的分类；非 IO 变体返回 `None`。
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
