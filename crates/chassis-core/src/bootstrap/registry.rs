use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::listener::Listener;

/// 按登记序号索引的并发监听器注册表。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 这是 Bootstrap 内唯一跨任务共享的可变结构：`listen` 插入、`Listener::close`
///   移除、`shutdown` 遍历关闭，三者可能并发发生；
/// - 遍历基于快照，关闭监听器时从表中移除自身不会干扰正在进行的遍历。
///
/// ## 逻辑（How）
/// - 每个监听器在构造时领取一个递增序号，注册表以序号为键；
/// - 同一地址可以登记多次（例如多次 `listen("tcp://127.0.0.1:0")`），彼此独立。
///
/// ## 契约（What）
/// - `insert` 从不替换已有条目；
/// - `remove` 只移除与传入实例相同的那一个。
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: DashMap<u64, Arc<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, listener: Arc<Listener>) {
        self.listeners.insert(listener.id(), listener);
    }

    /// 仅当序号下登记的正是 `listener` 时移除，返回是否移除。
    pub fn remove(&self, listener: &Listener) -> bool {
        self.listeners
            .remove_if(&listener.id(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), listener)
            })
            .is_some()
    }

    /// 是否存在以 `url` 登记的监听器。
    pub fn contains(&self, url: &str) -> bool {
        self.listeners.iter().any(|entry| entry.value().url() == url)
    }

    /// 以 `url` 登记的全部监听器，按登记顺序排列。
    pub fn find(&self, url: &str) -> Vec<Arc<Listener>> {
        let mut found: Vec<_> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().url() == url)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        found.sort_by_key(|listener| listener.id());
        found
    }

    /// 当前全部监听器的快照。
    pub fn snapshot(&self) -> Vec<Arc<Listener>> {
        self.listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
