//! 异常规范化：把任意失败值统一为“原因 + 栈快照”。
//!
//! # 教案级说明
//!
//! ## 意图（Why）
//! - 管道中的故障来源五花八门（IO 错误、处理器 panic、业务拒绝），处理器需要一个
//!   统一、可廉价克隆、可沿 `source()` 链追溯的表示；
//! - 包装必须幂等：对已经是 [`Exception`] 的值再次包装，得到的是同一个实例。
//!
//! ## 契约（What）
//! - [`as_exception`]：`None` → `None`；`Exception` → 原样返回；其余错误值 → 以给定栈包装；
//! - 无法作为错误的值（panic 负载、任意 `Debug` 值）经格式化后包装为合成原因；
//! - [`Exception::print_stack_trace`] 的输出格式固定，便于日志检索。

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::sync::Arc;

use bytes::Bytes;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// 捕获到的原始栈字节。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StackTrace(Bytes);

impl StackTrace {
    /// 强制捕获当前线程的回溯，不受 `RUST_BACKTRACE` 影响。
    pub fn capture() -> Self {
        Self(Bytes::from(Backtrace::force_capture().to_string()))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackTrace")
            .field("len", &self.0.len())
            .finish()
    }
}

/// 由非错误值格式化得到的合成原因。
#[derive(Debug)]
struct Formatted(String);

impl fmt::Display for Formatted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Formatted {}

struct ExceptionInner {
    cause: BoxError,
    kind: &'static str,
    stack: StackTrace,
}

/// 规范化后的故障值。
///
/// 克隆只增加引用计数；[`Exception::ptr_eq`] 可判断两个值是否源自同一次包装。
#[derive(Clone)]
pub struct Exception {
    inner: Arc<ExceptionInner>,
}

impl Exception {
    /// 包装错误并立即捕获当前栈。
    pub fn new<E>(error: E) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        Self::wrap(error, StackTrace::capture())
    }

    /// 以给定栈包装错误值；传入的若已是 [`Exception`]，原样返回且忽略 `stack`。
    pub fn wrap<E>(error: E, stack: StackTrace) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        let kind = std::any::type_name::<E>();
        let cause: BoxError = error.into();
        match cause.downcast::<Exception>() {
            Ok(existing) => *existing,
            Err(cause) => Self::from_parts(cause, kind, stack),
        }
    }

    /// 把任意 `Debug` 值格式化为合成原因后包装。
    pub fn from_debug<T: fmt::Debug>(value: T, stack: StackTrace) -> Self {
        Self::from_parts(
            Box::new(Formatted(format!("{value:?}"))),
            std::any::type_name::<T>(),
            stack,
        )
    }

    /// 规范化 `catch_unwind` 得到的 panic 负载。
    pub fn from_panic(payload: Box<dyn Any + Send>, stack: StackTrace) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "opaque panic payload".to_owned()
        };
        Self::from_parts(Box::new(Formatted(message)), "panic", stack)
    }

    fn from_parts(cause: BoxError, kind: &'static str, stack: StackTrace) -> Self {
        Self {
            inner: Arc::new(ExceptionInner { cause, kind, stack }),
        }
    }

    /// 被包装的直接原因。
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.inner.cause.as_ref()
    }

    /// 直接原因的类型名。
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    pub fn stack(&self) -> &StackTrace {
        &self.inner.stack
    }

    /// 尝试把直接原因向下转型为具体类型。
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.inner.cause.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 打印回溯。
    ///
    /// # 教案级注释
    ///
    /// ## 逻辑（How）
    /// - 依次写入 `prefixes`，然后写入 `Error Traceback:` 行；
    /// - 第一跳输出 `kind: message`，之后沿 `Error::source()` 逐跳输出
    ///   `caused by: message`，每跳换行并比上一跳多缩进两个空格；
    /// - 最后换行并追加原始栈字节。
    ///
    /// ## 契约（What）
    /// - `writer` 为 `None` 时写入标准错误输出；
    /// - 整段文本在内存中拼好后一次写出，避免与其他线程的输出交错。
    pub fn print_stack_trace(
        &self,
        writer: Option<&mut dyn Write>,
        prefixes: &[&str],
    ) -> io::Result<()> {
        let mut text = String::new();
        for prefix in prefixes {
            text.push_str(prefix);
        }
        text.push_str("Error Traceback:\n");

        let mut current: &(dyn Error + 'static) = self.inner.cause.as_ref();
        let mut kind = self.inner.kind;
        let mut depth = 0;
        loop {
            depth += 1;
            // 写入 String 不会失败。
            let _ = write!(text, "{kind}: {current}");
            match current.source() {
                Some(next) => {
                    text.push('\n');
                    text.push_str(&"  ".repeat(depth));
                    current = next;
                    kind = "caused by";
                }
                None => break,
            }
        }
        text.push('\n');

        let mut output = text.into_bytes();
        output.extend_from_slice(self.inner.stack.as_bytes());
        match writer {
            Some(writer) => writer.write_all(&output),
            None => io::stderr().lock().write_all(&output),
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("kind", &self.inner.kind)
            .field("cause", &self.inner.cause)
            .field("stack", &self.inner.stack)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.cause, f)
    }
}

impl Error for Exception {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner.cause.as_ref())
    }
}

/// 把可选的失败值规范化为 [`Exception`]。
pub fn as_exception<E>(value: Option<E>, stack: StackTrace) -> Option<Exception>
where
    E: Into<BoxError> + 'static,
{
    value.map(|value| Exception::wrap(value, stack))
}
