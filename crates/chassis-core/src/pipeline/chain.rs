//! 以竞技场存储的双向处理器链。
//!
//! 节点存放在 `Vec` 中，以 [`NodeId`]（下标）互相引用；头哨兵固定在 0 号槽，
//! 尾哨兵固定在 1 号槽。链只增不删，下标一经分配即在整个快照谱系中保持有效，
//! 因此无需代际校验。

use std::iter;
use std::sync::Arc;

use super::handler::{Capabilities, Handler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    pub(crate) const HEAD: Self = Self(0);
    pub(crate) const TAIL: Self = Self(1);
}

#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) capabilities: Capabilities,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// 某一时刻的完整链路快照。
#[derive(Clone)]
pub(crate) struct Chain {
    nodes: Vec<Node>,
}

impl Chain {
    pub(crate) fn new(head: Arc<dyn Handler>, tail: Arc<dyn Handler>) -> Self {
        let head_capabilities = Capabilities::of(head.as_ref());
        let tail_capabilities = Capabilities::of(tail.as_ref());
        Self {
            nodes: vec![
                Node {
                    handler: head,
                    capabilities: head_capabilities,
                    prev: None,
                    next: Some(NodeId::TAIL),
                },
                Node {
                    handler: tail,
                    capabilities: tail_capabilities,
                    prev: Some(NodeId::HEAD),
                    next: None,
                },
            ],
        }
    }

    /// 节点总数，含两个哨兵。
    pub(crate) fn size(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    pub(crate) fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev
    }

    /// 在 `anchor` 之后拼接一个节点，返回新节点。
    pub(crate) fn insert_after(
        &mut self,
        anchor: NodeId,
        handler: Arc<dyn Handler>,
        capabilities: Capabilities,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let next = self.nodes[anchor.0].next;
        self.nodes.push(Node {
            handler,
            capabilities,
            prev: Some(anchor),
            next,
        });
        self.nodes[anchor.0].next = Some(id);
        if let Some(next) = next {
            self.nodes[next.0].prev = Some(id);
        }
        id
    }

    /// 在 `anchor` 之前拼接一个节点；`anchor` 不能是头哨兵。
    pub(crate) fn insert_before(
        &mut self,
        anchor: NodeId,
        handler: Arc<dyn Handler>,
        capabilities: Capabilities,
    ) -> NodeId {
        let prev = self.prev(anchor).unwrap_or(NodeId::HEAD);
        self.insert_after(prev, handler, capabilities)
    }

    /// 链路上第 `position` 个节点（头哨兵为 0）。
    pub(crate) fn nth(&self, position: usize) -> Option<NodeId> {
        self.iter().nth(position)
    }

    /// `id` 之前的节点数，即它在链路中的位置。
    pub(crate) fn position_of(&self, id: NodeId) -> usize {
        self.iter().take_while(|candidate| *candidate != id).count()
    }

    /// 头 → 尾。
    pub(crate) fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        iter::successors(Some(NodeId::HEAD), move |id| self.next(*id))
    }

    /// 尾 → 头。
    pub(crate) fn iter_rev(&self) -> impl Iterator<Item = NodeId> + '_ {
        iter::successors(Some(NodeId::TAIL), move |id| self.prev(*id))
    }
}
