//! Weighted summary trees.
//!
//! A summary tree mirrors a [`Step`] tree inside an arena. Every entry
//! knows its parent slot, so a subtree can be replaced in place, and
//! carries the number of source grammars it stands for.

use shapegram_types::ast::{Step, StepKind};

/// Handle of a node in a [`SummaryArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct SummaryNode {
    pub kind: StepKind,
    pub children: Vec<NodeId>,
    /// Parent node and the position of this node among its children.
    pub parent: Option<(NodeId, usize)>,
    /// Accumulated weight.
    pub size: f64,
}

/// Arena holding every summary tree of one summarization.
#[derive(Debug, Default)]
pub struct SummaryArena {
    nodes: Vec<SummaryNode>,
}

impl SummaryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SummaryNode {
        &self.nodes[id.slot()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SummaryNode {
        &mut self.nodes[id.slot()]
    }

    pub fn alloc(&mut self, kind: StepKind, children: Vec<NodeId>, size: f64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for (i, &child) in children.iter().enumerate() {
            self.node_mut(child).parent = Some((id, i));
        }
        self.nodes.push(SummaryNode {
            kind,
            children,
            parent: None,
            size,
        });
        id
    }

    /// Copy `step` into the arena with weight 1 on every node.
    pub fn to_summary(&mut self, step: &Step) -> NodeId {
        let children = step.children.iter().map(|c| self.to_summary(c)).collect();
        self.alloc(step.kind.clone(), children, 1.0)
    }

    /// Read a summary tree back out as a step tree.
    pub fn to_step(&self, id: NodeId) -> Step {
        let node = self.node(id);
        Step::new(
            node.kind.clone(),
            node.children.iter().map(|&c| self.to_step(c)).collect(),
        )
    }

    /// Structural equality of two subtrees. Weights are ignored.
    pub fn equal(&self, a: NodeId, b: NodeId) -> bool {
        let (na, nb) = (self.node(a), self.node(b));
        na.kind == nb.kind
            && na.children.len() == nb.children.len()
            && na
                .children
                .iter()
                .zip(&nb.children)
                .all(|(&ca, &cb)| self.equal(ca, cb))
    }

    /// Add the weights of two equal subtrees, node by node, on both sides.
    pub fn accumulate(&mut self, a: NodeId, b: NodeId) {
        let total = self.node(a).size + self.node(b).size;
        self.node_mut(a).size = total;
        self.node_mut(b).size = total;
        let pairs: Vec<_> = self
            .node(a)
            .children
            .iter()
            .copied()
            .zip(self.node(b).children.iter().copied())
            .collect();
        for (ca, cb) in pairs {
            self.accumulate(ca, cb);
        }
    }

    /// Every node of the subtree at `root` that has children, in pre-order.
    pub fn inner_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.children.is_empty() {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Put `child` at `position` under `parent`.
    pub fn set_child(&mut self, parent: NodeId, position: usize, child: NodeId) {
        self.node_mut(parent).children[position] = child;
        self.node_mut(child).parent = Some((parent, position));
    }

    /// Append `child` under `parent`, returning its position.
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> usize {
        let position = self.node(parent).children.len();
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some((parent, position));
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Step {
        Step::parallel(vec![
            Step::raw(1.0),
            Step::sequential(vec![Step::this(), Step::raw(3.0)]),
        ])
    }

    #[test]
    fn round_trips_steps() {
        let mut arena = SummaryArena::new();
        let root = arena.to_summary(&sample());
        assert_eq!(arena.len(), 5);
        assert_eq!(arena.to_step(root), sample());
        assert_eq!(arena.node(root).size, 1.0);
        assert_eq!(arena.node(root).parent, None);
    }

    #[test]
    fn parent_links() {
        let mut arena = SummaryArena::new();
        let root = arena.to_summary(&sample());
        let seq = arena.node(root).children[1];
        assert_eq!(arena.node(seq).parent, Some((root, 1)));
        let raw = arena.node(seq).children[1];
        assert_eq!(arena.node(raw).parent, Some((seq, 1)));
    }

    #[test]
    fn equality_and_accumulation() {
        let mut arena = SummaryArena::new();
        let a = arena.to_summary(&sample());
        let b = arena.to_summary(&sample());
        let c = arena.to_summary(&Step::parallel(vec![Step::raw(1.0)]));
        assert!(arena.equal(a, b));
        assert!(!arena.equal(a, c));

        arena.accumulate(a, b);
        let leaf_a = arena.node(arena.node(a).children[0]).size;
        let leaf_b = arena.node(arena.node(b).children[0]).size;
        assert_eq!((arena.node(a).size, leaf_a, leaf_b), (2.0, 2.0, 2.0));
    }

    #[test]
    fn inner_nodes_skip_leaves() {
        let mut arena = SummaryArena::new();
        let root = arena.to_summary(&sample());
        let seq = arena.node(root).children[1];
        assert_eq!(arena.inner_nodes(root), vec![root, seq]);
        assert!(arena.inner_nodes(arena.node(seq).children[0]).is_empty());
    }

    #[test]
    fn set_child_relinks() {
        let mut arena = SummaryArena::new();
        let root = arena.to_summary(&sample());
        let fresh = arena.to_summary(&Step::null());
        arena.set_child(root, 0, fresh);
        assert_eq!(arena.node(fresh).parent, Some((root, 0)));
        assert_eq!(
            arena.to_step(root).children[0],
            Step::null()
        );
    }
}
