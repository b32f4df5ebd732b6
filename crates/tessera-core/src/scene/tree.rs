//! The retained scene tree: ownership, dirty propagation, hit testing.

use std::collections::HashMap;

use crate::geometry::{Position, Rect};

use super::node::{BoxVisual, NodeId, NodeKind, SceneNode};

/// The retained node tree.
///
/// Nodes are owned by the tree and addressed by [`NodeId`]; parents hold
/// their children as id lists and children point back by id, so there are
/// no ownership cycles. Destruction is recursive and deterministic.
#[derive(Clone, Debug)]
pub struct SceneTree {
    nodes: HashMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u64,
    insertion_counter: u64,
    focused: Option<NodeId>,
    pub(crate) any_layout_dirty: bool,
    pub(crate) any_render_dirty: bool,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create a tree with a borderless box as root.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            SceneNode::new(root, None, NodeKind::Box(BoxVisual::default()), 0),
        );
        Self {
            nodes,
            root,
            next_id: 1,
            insertion_counter: 1,
            focused: None,
            any_layout_dirty: true,
            any_render_dirty: true,
        }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always at least the root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Mutably borrow a node. Call [`SceneTree::request_render`] or
    /// [`SceneTree::mark_layout_dirty`] afterwards as appropriate.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Create a node under `parent`. Returns the new id, or `None` if the
    /// parent does not exist.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let insertion = self.insertion_counter;
        self.insertion_counter += 1;
        self.nodes
            .insert(id, SceneNode::new(id, Some(parent), kind, insertion));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        self.mark_layout_dirty(id);
        Some(id)
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        for sub in self.subtree(id) {
            if self.focused == Some(sub) {
                self.focused = None;
            }
            self.nodes.remove(&sub);
        }
        self.mark_layout_dirty(parent);
    }

    /// All ids in the subtree rooted at `id`, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get(&cur) {
                out.push(cur);
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// All ids in pre-order from the root.
    pub fn pre_order(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    /// Mark a node render-dirty and propagate the flag to the root so
    /// buffered ancestors re-composite. Does not force a layout pass.
    pub fn request_render(&mut self, id: NodeId) {
        self.any_render_dirty = true;
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.nodes.get_mut(&c) {
                Some(node) => {
                    node.render_dirty = true;
                    cur = node.parent;
                }
                None => break,
            }
        }
    }

    /// Mark a node layout-dirty and propagate to the root.
    pub fn mark_layout_dirty(&mut self, id: NodeId) {
        self.any_layout_dirty = true;
        self.any_render_dirty = true;
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.nodes.get_mut(&c) {
                Some(node) => {
                    node.layout_dirty = true;
                    node.render_dirty = true;
                    cur = node.parent;
                }
                None => break,
            }
        }
    }

    /// Whether any node needs layout.
    pub fn needs_layout(&self) -> bool {
        self.any_layout_dirty
    }

    /// Whether any node needs compositing.
    pub fn needs_render(&self) -> bool {
        self.any_render_dirty
    }

    /// Clear all dirty flags after a completed frame.
    pub(crate) fn clear_dirty(&mut self) {
        self.any_layout_dirty = false;
        self.any_render_dirty = false;
        for node in self.nodes.values_mut() {
            node.layout_dirty = false;
            node.render_dirty = false;
        }
    }

    /// The focused node, if any.
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Move focus. Ignored if the target is not focusable.
    pub fn set_focus(&mut self, id: Option<NodeId>) {
        match id {
            None => self.focused = None,
            Some(id) => {
                if self
                    .nodes
                    .get(&id)
                    .is_some_and(|n| n.kind.is_focusable())
                {
                    self.focused = Some(id);
                }
            }
        }
    }

    /// Clip rectangle of a node: the intersection of its bounds with all
    /// ancestor bounds. `None` when fully clipped away.
    pub fn clip_of(&self, id: NodeId) -> Option<Rect> {
        let mut rect = self.nodes.get(&id)?.rect;
        let mut cur = self.nodes.get(&id)?.parent;
        while let Some(pid) = cur {
            let parent = self.nodes.get(&pid)?;
            rect = rect.intersection(&parent.rect)?;
            cur = parent.parent;
        }
        Some(rect)
    }

    /// Deepest visible mouse-enabled node containing the point, honoring
    /// paint order (topmost child first).
    pub fn hit_test(&self, x: u16, y: u16) -> Option<NodeId> {
        self.hit_test_node(self.root, Position::new(x, y))
    }

    fn hit_test_node(&self, id: NodeId, pos: Position) -> Option<NodeId> {
        let node = self.nodes.get(&id)?;
        if !node.visible {
            return None;
        }
        let clip = self.clip_of(id)?;
        if !clip.contains(pos) {
            return None;
        }
        // Topmost children first: reverse of paint order.
        let mut order: Vec<NodeId> = node.children.clone();
        order.sort_by_key(|cid| {
            self.nodes
                .get(cid)
                .map(|c| (c.z_index, c.insertion))
                .unwrap_or((i32::MIN, 0))
        });
        for child in order.iter().rev() {
            if let Some(hit) = self.hit_test_node(*child, pos) {
                return Some(hit);
            }
        }
        if node.mouse_enabled { Some(id) } else { None }
    }

    /// Ancestor chain from a node up to the root, inclusive.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            out.push(c);
            cur = self.nodes.get(&c).and_then(|n| n.parent);
        }
        out
    }
}
