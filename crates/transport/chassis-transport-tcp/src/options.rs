use std::io;
use std::time::Duration;

use chassis_transport::{TransportOption, TransportOptions, with_extension};
use serde::Deserialize;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

/// TCP 套接字级配置项，实现对内核行为的显式控制。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 拨号与接受得到的连接需要完全相同的调优，集中在一处描述并应用；
/// - 支持从 TOML/JSON 配置文件反序列化，缺省字段落回默认值。
///
/// ## 契约（What）
/// - `connect_timeout`：拨号上限，默认 5 秒；配置键 `connect_timeout_ms`；
/// - `keep_alive` / `keep_alive_period`：默认开启、探测周期 5 秒；配置键 `keep_alive_period_ms`；
/// - `linger`：秒。负数表示关闭时由内核在后台发完剩余数据（默认 `-1`）；
///   `0` 表示丢弃未发送/未确认的数据；正数表示后台发送至多该时长；
/// - `no_delay`：默认开启，即关闭 Nagle 合并，追求最低延迟；
/// - `sock_buf`：读写缓冲区字节数，非正数沿用内核默认（默认 `-1`）。
///
/// ## 注意事项（Trade-offs）
/// - `SO_LINGER` 在不同平台的精度不同（Linux 取整到秒）；
/// - 内核可能将缓冲区大小翻倍或截断，读取到的值不一定等于配置值。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcpOptions {
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    pub keep_alive: bool,
    #[serde(rename = "keep_alive_period_ms", with = "millis")]
    pub keep_alive_period: Duration,
    pub linger: i32,
    pub no_delay: bool,
    pub sock_buf: i32,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            keep_alive: true,
            keep_alive_period: Duration::from_secs(5),
            linger: -1,
            no_delay: true,
            sock_buf: -1,
        }
    }
}

impl TcpOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_keep_alive_period(mut self, period: Duration) -> Self {
        self.keep_alive_period = period;
        self
    }

    pub fn with_linger(mut self, seconds: i32) -> Self {
        self.linger = seconds;
        self
    }

    pub fn with_no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    pub fn with_sock_buf(mut self, bytes: i32) -> Self {
        self.sock_buf = bytes;
        self
    }

    /// `linger` 到 `SO_LINGER` 的映射：负数为 `None`，其余为对应秒数。
    pub fn linger_duration(&self) -> Option<Duration> {
        u64::try_from(self.linger).ok().map(Duration::from_secs)
    }

    /// 从传输选项中取出 TCP 配置，缺省时使用默认值。
    pub fn from_transport_options(options: &TransportOptions) -> Self {
        options.extension::<Self>().cloned().unwrap_or_default()
    }

    pub(crate) fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        let sock = SockRef::from(stream);
        if self.keep_alive {
            let keepalive = TcpKeepalive::new().with_time(self.keep_alive_period);
            sock.set_tcp_keepalive(&keepalive)?;
        } else {
            sock.set_keepalive(false)?;
        }
        sock.set_linger(self.linger_duration())?;
        stream.set_nodelay(self.no_delay)?;
        if let Ok(size) = usize::try_from(self.sock_buf) {
            if size > 0 {
                sock.set_recv_buffer_size(size)?;
                sock.set_send_buffer_size(size)?;
            }
        }
        Ok(())
    }
}

/// 把 [`TcpOptions`] 放入传输选项。
pub fn with_tcp_options(options: TcpOptions) -> TransportOption {
    with_extension(options)
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prefer_low_latency() {
        let options = TcpOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert!(options.keep_alive);
        assert!(options.no_delay);
        assert_eq!(options.linger_duration(), None);
        assert_eq!(options.sock_buf, -1);
    }

    #[test]
    fn linger_mapping_follows_sign() {
        assert_eq!(TcpOptions::default().with_linger(-3).linger_duration(), None);
        assert_eq!(
            TcpOptions::default().with_linger(0).linger_duration(),
            Some(Duration::ZERO)
        );
        assert_eq!(
            TcpOptions::default().with_linger(7).linger_duration(),
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn deserializes_partial_toml() {
        let options: TcpOptions = toml::from_str(
            r#"
            keep_alive = false
            keep_alive_period_ms = 1500
            sock_buf = 65536
            "#,
        )
        .expect("toml");
        assert!(!options.keep_alive);
        assert_eq!(options.keep_alive_period, Duration::from_millis(1500));
        assert_eq!(options.sock_buf, 65536);
        assert!(options.no_delay, "未出现的字段保持默认值");
    }

    #[test]
    fn rejects_unknown_keys() {
        let result: Result<TcpOptions, _> = toml::from_str("nagle = true");
        assert!(result.is_err());
    }

    #[test]
    fn carried_through_transport_options() {
        let custom = TcpOptions::default().with_sock_buf(4096);
        let parsed =
            TransportOptions::parse("tcp://127.0.0.1:1", &[with_tcp_options(custom.clone())])
                .expect("parse");
        assert_eq!(TcpOptions::from_transport_options(&parsed), custom);

        let bare = TransportOptions::parse("tcp://127.0.0.1:1", &[]).expect("parse");
        assert_eq!(
            TcpOptions::from_transport_options(&bare),
            TcpOptions::default()
        );
    }
}
