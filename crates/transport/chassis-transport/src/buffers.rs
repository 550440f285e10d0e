use std::collections::VecDeque;
use std::io::{self, IoSlice};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 单次 vectored 写入携带的最大分片数。
const MAX_IOV: usize = 64;

/// 待写出的字节分片队列。
///
/// 分片按入队顺序写出；写入成功的部分从队首消费，部分写入的分片保留剩余字节。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Buffers {
    fragments: VecDeque<Bytes>,
    remaining: usize,
}

impl Buffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个分片；空分片直接丢弃。
    pub fn push(&mut self, fragment: impl Into<Bytes>) {
        let fragment = fragment.into();
        if fragment.is_empty() {
            return;
        }
        self.remaining += fragment.len();
        self.fragments.push_back(fragment);
    }

    /// 将 `other` 的全部分片移到队尾，`other` 随之清空。
    pub fn append(&mut self, other: &mut Buffers) {
        self.remaining += other.remaining;
        self.fragments.append(&mut other.fragments);
        other.remaining = 0;
    }

    /// 尚未写出的字节总数。
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// 将剩余分片拼接为一块连续内存。
    pub fn to_bytes(&self) -> Bytes {
        match self.fragments.len() {
            0 => Bytes::new(),
            1 => self.fragments[0].clone(),
            _ => {
                let mut joined = Vec::with_capacity(self.remaining);
                for fragment in &self.fragments {
                    joined.extend_from_slice(fragment);
                }
                Bytes::from(joined)
            }
        }
    }

    fn io_slices(&self) -> Vec<IoSlice<'_>> {
        self.fragments
            .iter()
            .take(MAX_IOV)
            .map(|fragment| IoSlice::new(fragment))
            .collect()
    }

    fn advance(&mut self, mut written: usize) {
        self.remaining -= written;
        while written > 0 {
            let Some(front) = self.fragments.front_mut() else {
                break;
            };
            if written >= front.len() {
                written -= front.len();
                self.fragments.pop_front();
            } else {
                front.advance(written);
                written = 0;
            }
        }
    }
}

impl<B: Into<Bytes>> FromIterator<B> for Buffers {
    fn from_iter<I: IntoIterator<Item = B>>(iter: I) -> Self {
        let mut buffers = Self::new();
        for fragment in iter {
            buffers.push(fragment);
        }
        buffers
    }
}

impl<B: Into<Bytes>> Extend<B> for Buffers {
    fn extend<I: IntoIterator<Item = B>>(&mut self, iter: I) {
        for fragment in iter {
            self.push(fragment);
        }
    }
}

/// 以 vectored IO 写出全部分片并刷新，返回写出的字节数。
///
/// # 教案级注释
///
/// ## 逻辑（How）
/// - 每轮最多组装 64 个 `IoSlice` 调用 `write_vectored`；
/// - 按实际写入字节数推进队列，部分写入的分片保留剩余部分进入下一轮；
/// - 写入返回 0 视为对端不再接收，返回 [`io::ErrorKind::WriteZero`]。
///
/// ## 契约（What）
/// - 成功返回时 `buffers` 为空；失败时 `buffers` 保留尚未写出的字节。
pub async fn write_buffers<W>(writer: &mut W, buffers: &mut Buffers) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut total = 0;
    while !buffers.is_empty() {
        let written = {
            let slices = buffers.io_slices();
            writer.write_vectored(&slices).await?
        };
        if written == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero));
        }
        buffers.advance(written);
        total += written;
    }
    writer.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// 每次最多接收 `chunk` 字节的写端，用于模拟部分写入。
    struct Trickle {
        chunk: usize,
        sink: Vec<u8>,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let n = buf.len().min(self.chunk);
            self.sink.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn partial_writes_drain_every_fragment() {
        let mut buffers: Buffers = ["hello", "", " ", "world"].into_iter().collect();
        assert_eq!(buffers.fragment_count(), 3, "空分片应被忽略");
        assert_eq!(buffers.remaining(), 11);

        let mut writer = Trickle {
            chunk: 3,
            sink: Vec::new(),
        };
        let written = write_buffers(&mut writer, &mut buffers)
            .await
            .expect("write");
        assert_eq!(written, 11);
        assert!(buffers.is_empty());
        assert_eq!(writer.sink, b"hello world");
    }

    #[tokio::test]
    async fn zero_write_reports_write_zero() {
        let mut buffers: Buffers = ["abc"].into_iter().collect();
        let mut writer = Trickle {
            chunk: 0,
            sink: Vec::new(),
        };
        let err = write_buffers(&mut writer, &mut buffers)
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(buffers.remaining(), 3, "失败时保留未写出的字节");
    }

    #[test]
    fn append_moves_fragments() {
        let mut head: Buffers = ["a"].into_iter().collect();
        let mut tail: Buffers = ["bc", "d"].into_iter().collect();
        head.append(&mut tail);
        assert!(tail.is_empty());
        assert_eq!(head.fragment_count(), 3);
        assert_eq!(head.remaining(), 4);
    }

    #[test]
    fn to_bytes_joins_fragments() {
        let buffers: Buffers = ["ab", "cd"].into_iter().collect();
        assert_eq!(buffers.to_bytes(), Bytes::from_static(b"abcd"));
    }
}
