use std::sync::Arc;

use tokio::sync::watch;

/// 根生命周期作用域，实现协作式取消。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - Bootstrap 关停时需要一个所有连接与接受循环都能观察到的终止信号；
/// - 取消是协作式的：接受循环只在两次 `accept` 之间检查，阻塞中的 `accept`
///   必须通过关闭接受器来唤醒。
///
/// ## 逻辑（How）
/// - 内部持有 `watch::Sender<bool>`，克隆共享同一标志；
/// - [`LifecycleScope::cancelled`] 订阅该标志，可与 IO 一起放入 `select!`。
///
/// ## 契约（What）
/// - 标志只会从 `false` 变为 `true`，不可恢复；
/// - `cancel` 仅对首次调用返回 `true`。
#[derive(Clone, Debug)]
pub struct LifecycleScope {
    state: Arc<watch::Sender<bool>>,
}

impl Default for LifecycleScope {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleScope {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// 触发取消，返回本次调用是否完成了状态切换。
    pub fn cancel(&self) -> bool {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// 等待取消发生；已取消时立即返回。
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // 发送端由 `self` 持有，等待期间不会关闭。
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_one_way() {
        let scope = LifecycleScope::new();
        let observer = scope.clone();
        assert!(!observer.is_cancelled());
        assert!(scope.cancel(), "首次取消应返回 true");
        assert!(!scope.cancel(), "重复取消应返回 false");
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let scope = LifecycleScope::new();
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.cancelled().await })
        };
        tokio::task::yield_now().await;
        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must wake")
            .expect("join");
    }
}
