//! Event bus — hit testing, bubbling dispatch, drag tracking, selection.
//!
//! Raw parser events are resolved against the scene tree: the deepest
//! mouse-target under the pointer receives the event first and it bubbles
//! through the ancestor chain until a handler consumes it. The bus also
//! runs the drag state machine, hover enter/leave derivation, mouse
//! selection on selectable text nodes, and OSC 52 clipboard export.

use std::collections::{HashMap, HashSet};

use base64::Engine;

use crate::input::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use crate::scene::{NodeId, SceneTree};

/// Derived mouse event phase delivered to node handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MousePhase {
    /// Button pressed on the node.
    Down,
    /// Button released.
    Up,
    /// Pointer motion with no button held.
    Move,
    /// Pointer motion with a button held.
    Drag,
    /// The active drag ended (always before any drop).
    DragEnd,
    /// The dragged payload was released over a registered drop target.
    Drop,
    /// Pointer entered the node.
    Over,
    /// Pointer left the node.
    Out,
    /// Wheel scrolled up.
    ScrollUp,
    /// Wheel scrolled down.
    ScrollDown,
}

/// A mouse event as seen by a node handler.
#[derive(Clone, Copy, Debug)]
pub struct NodeMouseEvent {
    /// The derived phase.
    pub phase: MousePhase,
    /// The node this delivery targets.
    pub node: NodeId,
    /// Screen column.
    pub x: u16,
    /// Screen row.
    pub y: u16,
    /// Column relative to the node's rectangle.
    pub local_x: u16,
    /// Row relative to the node's rectangle.
    pub local_y: u16,
    /// The raw parser event.
    pub raw: MouseEvent,
}

/// What a handler did with an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The event was acted on.
    pub handled: bool,
    /// Stop bubbling regardless of `handled`.
    pub stop: bool,
}

impl Outcome {
    /// Not handled; continue bubbling.
    pub const fn ignored() -> Self {
        Self {
            handled: false,
            stop: false,
        }
    }

    /// Handled; bubbling stops.
    pub const fn consumed() -> Self {
        Self {
            handled: true,
            stop: true,
        }
    }
}

/// Handler attached to a node. Receives the tree so it can mutate state.
pub type MouseHandler = Box<dyn FnMut(&mut SceneTree, &NodeMouseEvent) -> Outcome>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DragPhase {
    #[default]
    Idle,
    Pressed(NodeId),
    Dragging(NodeId),
}

/// The event bus.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<NodeId, MouseHandler>,
    drop_targets: HashSet<NodeId>,
    hover: Option<NodeId>,
    drag: DragPhase,
    selecting: Option<NodeId>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a mouse handler to a node, replacing any existing one.
    pub fn on_mouse(&mut self, node: NodeId, handler: MouseHandler) {
        self.handlers.insert(node, handler);
    }

    /// Register a node as a drop target.
    pub fn register_drop_target(&mut self, node: NodeId) {
        self.drop_targets.insert(node);
    }

    /// Forget all state attached to a removed node.
    pub fn remove_node(&mut self, node: NodeId) {
        self.handlers.remove(&node);
        self.drop_targets.remove(&node);
        if self.hover == Some(node) {
            self.hover = None;
        }
        if self.selecting == Some(node) {
            self.selecting = None;
        }
        match self.drag {
            DragPhase::Pressed(n) | DragPhase::Dragging(n) if n == node => {
                self.drag = DragPhase::Idle;
            }
            _ => {}
        }
    }

    /// The node currently under the pointer, if known.
    pub fn hover(&self) -> Option<NodeId> {
        self.hover
    }

    /// The node owning an in-progress mouse selection.
    pub fn selecting(&self) -> Option<NodeId> {
        self.selecting
    }

    /// Dispatch one raw mouse event against the tree.
    pub fn dispatch_mouse(&mut self, tree: &mut SceneTree, event: &MouseEvent) {
        let hit = tree.hit_test(event.x, event.y);
        self.update_hover(tree, hit, event);

        match event.kind {
            MouseEventKind::Down => {
                if let Some(node) = hit {
                    self.drag = DragPhase::Pressed(node);
                    if self.should_start_selection(tree, node) {
                        self.start_selection(tree, node, event);
                    }
                    if tree.node(node).is_some_and(|n| n.kind.is_focusable()) {
                        tree.set_focus(Some(node));
                    }
                    self.deliver_bubbled(tree, node, MousePhase::Down, event);
                }
            }
            MouseEventKind::Drag => {
                let origin = match self.drag {
                    DragPhase::Pressed(n) => {
                        self.drag = DragPhase::Dragging(n);
                        Some(n)
                    }
                    DragPhase::Dragging(n) => Some(n),
                    DragPhase::Idle => None,
                };
                if self.selecting.is_some() {
                    self.extend_selection(tree, event);
                }
                if let Some(origin) = origin {
                    self.deliver_bubbled(tree, origin, MousePhase::Drag, event);
                }
            }
            MouseEventKind::Move => {
                if let Some(node) = hit {
                    self.deliver_bubbled(tree, node, MousePhase::Move, event);
                }
            }
            MouseEventKind::Up => {
                if let DragPhase::Dragging(origin) = self.drag {
                    // drag-end always precedes any drop.
                    self.deliver_single(tree, origin, MousePhase::DragEnd, event);
                    if let Some(target) = hit
                        && self.drop_targets.contains(&target)
                    {
                        self.deliver_single(tree, target, MousePhase::Drop, event);
                    }
                }
                self.drag = DragPhase::Idle;
                self.selecting = None;
                if let Some(node) = hit {
                    self.deliver_bubbled(tree, node, MousePhase::Up, event);
                }
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let phase = if event.kind == MouseEventKind::ScrollUp {
                    MousePhase::ScrollUp
                } else {
                    MousePhase::ScrollDown
                };
                if let Some(node) = hit {
                    let consumed = self.deliver_bubbled(tree, node, phase, event);
                    if !consumed {
                        default_scroll(tree, node, phase);
                    }
                }
            }
        }
    }

    /// Route a key event to the focused node. Editable text nodes get
    /// built-in editing behavior; returns whether the key was consumed.
    pub fn dispatch_key(&mut self, tree: &mut SceneTree, key: &KeyEvent) -> bool {
        let Some(focused) = tree.focused() else {
            return false;
        };
        let Some(node) = tree.node_mut(focused) else {
            return false;
        };
        let Some(view) = node.text_view_mut() else {
            return false;
        };
        if !view.editable {
            return false;
        }

        let (mut row, mut col) = view.cursor.unwrap_or((0, 0));
        let mut edited = true;
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(crate::input::Modifiers::CTRL) => {
                (row, col) = view.buffer.insert_at(row, col, &c.to_string());
            }
            KeyCode::Enter => {
                (row, col) = view.buffer.insert_at(row, col, "\n");
            }
            KeyCode::Backspace => {
                if col > 0 {
                    (row, col) = view.buffer.delete_range(row, col - 1, row, col);
                } else if row > 0 {
                    let prev_len = view.buffer.line_grapheme_len(row - 1).unwrap_or(0);
                    (row, col) = view.buffer.delete_range(row - 1, prev_len, row, 0);
                }
            }
            KeyCode::Delete => {
                let len = view.buffer.line_grapheme_len(row).unwrap_or(0);
                if col < len {
                    (row, col) = view.buffer.delete_range(row, col, row, col + 1);
                } else if row + 1 < view.buffer.line_count() {
                    (row, col) = view.buffer.delete_range(row, len, row + 1, 0);
                }
            }
            KeyCode::Left => {
                if col > 0 {
                    col -= 1;
                } else if row > 0 {
                    row -= 1;
                    col = view.buffer.line_grapheme_len(row).unwrap_or(0);
                }
            }
            KeyCode::Right => {
                let len = view.buffer.line_grapheme_len(row).unwrap_or(0);
                if col < len {
                    col += 1;
                } else if row + 1 < view.buffer.line_count() {
                    row += 1;
                    col = 0;
                }
            }
            KeyCode::Up => {
                if row > 0 {
                    row -= 1;
                    col = col.min(view.buffer.line_grapheme_len(row).unwrap_or(0));
                }
            }
            KeyCode::Down => {
                if row + 1 < view.buffer.line_count() {
                    row += 1;
                    col = col.min(view.buffer.line_grapheme_len(row).unwrap_or(0));
                }
            }
            KeyCode::Home => col = 0,
            KeyCode::End => col = view.buffer.line_grapheme_len(row).unwrap_or(0),
            _ => edited = false,
        }

        if edited {
            view.cursor = Some((row, col));
            tree.request_render(focused);
        }
        edited
    }

    /// Insert pasted text at the focused editor's cursor. Returns whether
    /// the paste was consumed.
    pub fn dispatch_paste(&mut self, tree: &mut SceneTree, text: &str) -> bool {
        let Some(focused) = tree.focused() else {
            return false;
        };
        let Some(view) = tree.node_mut(focused).and_then(|n| n.text_view_mut()) else {
            return false;
        };
        if !view.editable {
            return false;
        }
        let (row, col) = view.cursor.unwrap_or((0, 0));
        view.cursor = Some(view.buffer.insert_at(row, col, text));
        tree.request_render(focused);
        true
    }

    /// The selected text of the active (or last) selecting node.
    pub fn selected_text(&self, tree: &SceneTree) -> Option<String> {
        let node = self.selecting?;
        let view = tree.node(node)?.text_view()?;
        let text = view.buffer.selected_text(view.columnar_copy);
        (!text.is_empty()).then_some(text)
    }

    // --- internals ---

    fn update_hover(&mut self, tree: &mut SceneTree, hit: Option<NodeId>, event: &MouseEvent) {
        if hit == self.hover {
            return;
        }
        if let Some(old) = self.hover {
            self.deliver_single(tree, old, MousePhase::Out, event);
        }
        if let Some(new) = hit {
            self.deliver_single(tree, new, MousePhase::Over, event);
        }
        self.hover = hit;
    }

    fn should_start_selection(&self, tree: &SceneTree, node: NodeId) -> bool {
        tree.node(node).is_some_and(|n| n.kind.is_selectable())
    }

    fn start_selection(&mut self, tree: &mut SceneTree, node: NodeId, event: &MouseEvent) {
        let Some((row, col)) = text_position(tree, node, event.x, event.y) else {
            return;
        };
        if let Some(view) = tree.node_mut(node).and_then(|n| n.text_view_mut()) {
            view.buffer
                .set_selection(Some(crate::text_buffer::Selection {
                    anchor_row: row,
                    anchor_col: col,
                    focus_row: row,
                    focus_col: col,
                }));
        }
        self.selecting = Some(node);
        tree.request_render(node);
    }

    fn extend_selection(&mut self, tree: &mut SceneTree, event: &MouseEvent) {
        let Some(node) = self.selecting else { return };
        let Some((row, col)) = text_position(tree, node, event.x, event.y) else {
            return;
        };
        if let Some(view) = tree.node_mut(node).and_then(|n| n.text_view_mut()) {
            if let Some(mut sel) = view.buffer.selection() {
                sel.focus_row = row;
                sel.focus_col = col;
                view.buffer.set_selection(Some(sel));
            }
        }
        tree.request_render(node);
    }

    fn deliver_bubbled(
        &mut self,
        tree: &mut SceneTree,
        start: NodeId,
        phase: MousePhase,
        event: &MouseEvent,
    ) -> bool {
        for id in tree.ancestors(start) {
            if let Some(outcome) = self.call_handler(tree, id, phase, event) {
                if outcome.stop || outcome.handled {
                    return true;
                }
            }
        }
        false
    }

    fn deliver_single(
        &mut self,
        tree: &mut SceneTree,
        node: NodeId,
        phase: MousePhase,
        event: &MouseEvent,
    ) {
        let _ = self.call_handler(tree, node, phase, event);
    }

    fn call_handler(
        &mut self,
        tree: &mut SceneTree,
        node: NodeId,
        phase: MousePhase,
        event: &MouseEvent,
    ) -> Option<Outcome> {
        let rect = tree.node(node)?.rect();
        let delivery = NodeMouseEvent {
            phase,
            node,
            x: event.x,
            y: event.y,
            local_x: event.x.saturating_sub(rect.x()),
            local_y: event.y.saturating_sub(rect.y()),
            raw: *event,
        };
        let handler = self.handlers.get_mut(&node)?;
        Some(handler(tree, &delivery))
    }
}

/// Built-in scroll behavior when no handler consumed a wheel event:
/// the nearest text view or scroll box in the ancestor chain scrolls.
fn default_scroll(tree: &mut SceneTree, from: NodeId, phase: MousePhase) {
    let delta: i32 = match phase {
        MousePhase::ScrollUp => -1,
        MousePhase::ScrollDown => 1,
        _ => return,
    };
    enum Scrolled {
        No,
        Render,
        Layout,
    }
    for id in tree.ancestors(from) {
        let scrolled = match tree.node_mut(id) {
            Some(node) => match &mut node.kind {
                crate::scene::NodeKind::Text(view) => {
                    view.scroll_row = view.scroll_row.saturating_add_signed(delta as isize);
                    Scrolled::Render
                }
                crate::scene::NodeKind::ScrollBox(state) => {
                    state.offset_y = state.offset_y.saturating_add_signed(delta as i16);
                    Scrolled::Layout
                }
                _ => Scrolled::No,
            },
            None => Scrolled::No,
        };
        match scrolled {
            Scrolled::Render => {
                tree.request_render(id);
                return;
            }
            Scrolled::Layout => {
                tree.mark_layout_dirty(id);
                return;
            }
            Scrolled::No => {}
        }
    }
}

/// Map a screen position to a logical text position within a text node.
fn text_position(
    tree: &mut SceneTree,
    node: NodeId,
    x: u16,
    y: u16,
) -> Option<(usize, usize)> {
    let rect = tree.node(node)?.rect();
    let n = tree.node_mut(node)?;
    let view = n.text_view_mut()?;
    let gutter = view.gutter_width();
    let local_x = x.saturating_sub(rect.x()).saturating_sub(gutter);
    let local_y = y.saturating_sub(rect.y());
    let vrow = view.scroll_row + usize::from(local_y);
    Some(
        view.buffer
            .visual_position_to_logical(vrow, usize::from(local_x)),
    )
}

/// Build an OSC 52 sequence that places `text` on the system clipboard.
pub fn osc52_copy_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x1b\\")
}
