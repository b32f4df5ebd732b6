//! Compositing pass: walk the tree, render drawables, z-merge into the
//! back buffer.
//!
//! Each drawable renders into a node-sized frame buffer which is then
//! alpha-blended into the output under the node's clip rectangle (the
//! intersection of every ancestor's bounds), so a node can never paint
//! into a sibling's area. Buffered nodes keep their frame across frames
//! and skip re-rendering while clean.

use crate::buffer::CellBuffer;
use crate::color::Rgba;
use crate::geometry::Position;
use crate::unicode::calculate_text_width;

use super::node::{BridgeStatus, NodeId, NodeKind, SceneNode, TextView};
use super::tree::SceneTree;

/// Composite the whole tree into `out`.
///
/// Clears `out` to `background` first, then draws in pre-order with
/// children ordered by `(z_index, insertion order)`.
pub fn composite(tree: &mut SceneTree, out: &mut CellBuffer, background: Rgba) {
    out.clear(background);
    let root = tree.root();
    draw_node(tree, out, root);
    tree.any_render_dirty = false;
}

/// Screen position for the terminal cursor, taken from the focused
/// node's cursor hint. `None` parks and hides the cursor.
pub fn cursor_hint(tree: &mut SceneTree) -> Option<Position> {
    let focused = tree.focused()?;
    let (rect, clip) = {
        let node = tree.node(focused)?;
        (node.rect, tree.clip_of(focused)?)
    };
    let node = tree.node_mut(focused)?;
    let gutter = node.text_view().map_or(0, TextView::gutter_width);
    let view = node.text_view_mut()?;
    let (row, col) = view.cursor?;
    let (vrow, vcol) = view.buffer.logical_to_visual(row, col);
    if vrow < view.scroll_row {
        return None;
    }
    let sy = vrow - view.scroll_row;
    let x = rect.x().saturating_add(gutter).saturating_add(vcol as u16);
    let y = rect.y().saturating_add(sy as u16);
    let pos = Position::new(x, y);
    clip.contains(pos).then_some(pos)
}

fn draw_node(tree: &mut SceneTree, out: &mut CellBuffer, id: NodeId) {
    let Some(node) = tree.node(id) else { return };
    if !node.visible {
        return;
    }
    let rect = node.rect;
    let drawable = node.kind.is_drawable();
    let buffered = node.buffered;
    let dirty = node.render_dirty;
    let Some(clip) = tree.clip_of(id) else {
        return; // fully clipped away, children included
    };

    if drawable && !rect.is_empty() && !clip.is_empty() {
        let cached_ok = buffered
            && !dirty
            && tree
                .node(id)
                .and_then(|n| n.frame.as_ref())
                .is_some_and(|f| f.size() == rect.size);

        if cached_ok {
            if let Some(frame) = tree.node(id).and_then(|n| n.frame.as_ref()) {
                out.blend_clipped(frame, rect.x(), rect.y(), clip);
            }
        } else {
            let mut frame = match tree.node_mut(id).and_then(|n| n.frame.take()) {
                Some(mut f) if f.size() == rect.size => {
                    f.clear(Rgba::TRANSPARENT);
                    f
                }
                _ => CellBuffer::new(rect.size),
            };
            if let Some(node) = tree.node_mut(id) {
                render_self(node, &mut frame);
            }
            out.blend_clipped(&frame, rect.x(), rect.y(), clip);
            if let Some(node) = tree.node_mut(id) {
                node.frame = Some(frame);
            }
        }
    }

    let mut order: Vec<NodeId> = tree
        .node(id)
        .map(|n| n.children.clone())
        .unwrap_or_default();
    order.sort_by_key(|cid| {
        tree.node(*cid)
            .map(|c| (c.z_index, c.insertion))
            .unwrap_or((i32::MAX, u64::MAX))
    });
    for child in order {
        draw_node(tree, out, child);
    }

    if let Some(node) = tree.node_mut(id) {
        node.render_dirty = false;
    }
}

/// Render one node's own pixels into its frame buffer.
fn render_self(node: &mut SceneNode, frame: &mut CellBuffer) {
    match &mut node.kind {
        NodeKind::Box(visual) => {
            let w = frame.width();
            let h = frame.height();
            if let Some(bg) = visual.background {
                frame.fill_rect(0, 0, w, h, bg);
            }
            if let Some(style) = visual.border {
                frame.draw_box(0, 0, w, h, style, visual.border_color, None);
                if let Some(title) = &visual.title
                    && w > 4
                {
                    let padded = format!(" {title} ");
                    frame.draw_text(
                        &padded,
                        2,
                        0,
                        visual.border_color,
                        visual.background,
                        crate::attr::Attributes::empty(),
                    );
                }
            }
        }
        NodeKind::Text(view) => render_text(view, frame),
        NodeKind::Bridge(bridge) => {
            if bridge.status == BridgeStatus::Ready
                && let Some(raster) = &bridge.raster
            {
                frame.super_sample_blit(
                    &raster.data,
                    raster.width,
                    raster.height,
                    0,
                    0,
                    bridge.algorithm,
                );
            }
        }
        NodeKind::ScrollBox(_) => {}
    }
}

/// Render a text view's visible virtual rows.
fn render_text(view: &mut TextView, frame: &mut CellBuffer) {
    let w = frame.width();
    let h = frame.height();
    if w == 0 || h == 0 {
        return;
    }
    let gutter_w = view.gutter_width();
    let content_w = w.saturating_sub(gutter_w);

    let wrap_width = match view.wrap_mode {
        crate::unicode::WrapMode::None => 0,
        _ => content_w,
    };
    view.buffer.wrap_to(wrap_width, view.wrap_mode, view.tab_width);

    let total = view.buffer.virtual_line_count();
    let max_scroll = total.saturating_sub(usize::from(h));
    view.scroll_row = view.scroll_row.min(max_scroll);

    let east_asian = view.buffer.east_asian_width();
    let default_fg = view.default_style.fg.unwrap_or(Rgba::WHITE);
    for screen_row in 0..h {
        let vrow = view.scroll_row + usize::from(screen_row);
        if vrow >= total {
            break;
        }

        if gutter_w > 0 {
            let (lrow, start) = view.buffer.visual_to_logical(vrow);
            if start == 0 {
                let number = (lrow + 1).to_string();
                let x = gutter_w
                    .saturating_sub(1)
                    .saturating_sub(number.len() as u16);
                frame.draw_text(
                    &number,
                    x,
                    screen_row,
                    default_fg,
                    None,
                    crate::attr::Attributes::DIM,
                );
            }
        }

        let chunks =
            view.buffer
                .chunks_for_visual_row(vrow, &view.registry, view.selection_style);
        let mut x = gutter_w;
        for chunk in chunks {
            if x >= w {
                break;
            }
            let style = view.default_style.merge(&chunk.style);
            let fg = style.fg.unwrap_or(default_fg);
            frame.draw_text(&chunk.text, x, screen_row, fg, style.bg, style.attrs);
            let cw =
                calculate_text_width(chunk.text.as_bytes(), view.tab_width, true, east_asian)
                    as u16;
            if let Some(url) = &chunk.link {
                frame.annotate_link(x, screen_row, cw.min(w - x), url);
            }
            x = x.saturating_add(cw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BorderStyle;
    use crate::geometry::Size;
    use crate::scene::layout;
    use crate::scene::node::{
        BoxVisual, Dimension as NodeDim, NodeKind, Raster, ScrollState, TextView,
    };

    fn render(tree: &mut SceneTree, size: Size) -> CellBuffer {
        let solved = layout::solve(tree, size);
        assert!(solved.is_ok());
        let mut out = CellBuffer::new(size);
        composite(tree, &mut out, Rgba::BLACK);
        out
    }

    fn row_text(buf: &CellBuffer, y: u16) -> String {
        (0..buf.width())
            .filter_map(|x| buf.get(x, y))
            .filter(|c| !c.is_continuation())
            .map(|c| c.ch)
            .collect()
    }

    #[test]
    fn text_node_renders() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let _text = tree.add(
            root,
            NodeKind::Text(Box::new(TextView::with_text("hello"))),
        );
        let out = render(&mut tree, Size::new(10, 3));
        assert!(row_text(&out, 0).starts_with("hello"));
    }

    #[test]
    fn box_border_renders() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let b = tree.add(
            root,
            NodeKind::Box(BoxVisual {
                border: Some(BorderStyle::Single),
                border_color: Rgba::WHITE,
                background: None,
                title: None,
            }),
        );
        let Some(b) = b else { return };
        if let Some(n) = tree.node_mut(b) {
            n.style.width = NodeDim::Cells(5);
            n.style.height = NodeDim::Cells(3);
        }
        let out = render(&mut tree, Size::new(10, 5));
        assert_eq!(out.get(0, 0).map(|c| c.ch), Some('┌'));
        assert_eq!(out.get(4, 0).map(|c| c.ch), Some('┐'));
        assert_eq!(out.get(0, 2).map(|c| c.ch), Some('└'));
    }

    #[test]
    fn box_title_renders() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let b = tree.add(
            root,
            NodeKind::Box(BoxVisual {
                border: Some(BorderStyle::Single),
                border_color: Rgba::WHITE,
                background: None,
                title: Some("hi".into()),
            }),
        );
        let Some(b) = b else { return };
        if let Some(n) = tree.node_mut(b) {
            n.style.width = NodeDim::Cells(10);
            n.style.height = NodeDim::Cells(3);
        }
        let out = render(&mut tree, Size::new(12, 4));
        assert!(row_text(&out, 0).contains(" hi "));
    }

    #[test]
    fn z_order_paints_higher_last() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let low = tree.add(root, NodeKind::Text(Box::new(TextView::with_text("low"))));
        let high = tree.add(root, NodeKind::Text(Box::new(TextView::with_text("top"))));
        let (Some(low), Some(high)) = (low, high) else {
            return;
        };
        // Overlap both at the origin via absolute positioning.
        for id in [low, high] {
            if let Some(n) = tree.node_mut(id) {
                n.style.position = crate::scene::node::PositionKind::Absolute;
                n.style.left = Some(0);
                n.style.top = Some(0);
            }
        }
        if let Some(n) = tree.node_mut(low) {
            n.z_index = 1;
        }
        if let Some(n) = tree.node_mut(high) {
            n.z_index = 2;
        }
        let out = render(&mut tree, Size::new(10, 2));
        assert!(row_text(&out, 0).starts_with("top"));
    }

    #[test]
    fn invisible_node_skipped() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let hidden = tree.add(root, NodeKind::Text(Box::new(TextView::with_text("x"))));
        let Some(hidden) = hidden else { return };
        if let Some(n) = tree.node_mut(hidden) {
            n.visible = false;
        }
        let out = render(&mut tree, Size::new(5, 2));
        assert_eq!(out.get(0, 0).map(|c| c.ch), Some(' '));
    }

    #[test]
    fn clipping_bounds_children() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let clipper = tree.add(root, NodeKind::ScrollBox(ScrollState::default()));
        let Some(clipper) = clipper else { return };
        if let Some(n) = tree.node_mut(clipper) {
            n.style.width = NodeDim::Cells(3);
            n.style.height = NodeDim::Cells(1);
            n.style.flex_grow = 0.0;
        }
        let child = tree.add(
            clipper,
            NodeKind::Text(Box::new(TextView::with_text("abcdefgh"))),
        );
        let Some(child) = child else { return };
        if let Some(n) = tree.node_mut(child) {
            n.style.width = NodeDim::Cells(8);
            n.style.flex_shrink = 0.0;
            if let NodeKind::Text(view) = &mut n.kind {
                view.wrap_mode = crate::unicode::WrapMode::None;
            }
        }
        let out = render(&mut tree, Size::new(10, 3));
        // Only the clipper's 3 columns show text.
        assert_eq!(row_text(&out, 0), "abc       ");
    }

    #[test]
    fn buffered_node_caches_frame() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let text = tree.add(root, NodeKind::Text(Box::new(TextView::with_text("hi"))));
        let Some(text) = text else { return };
        if let Some(n) = tree.node_mut(text) {
            n.buffered = true;
        }
        let _ = render(&mut tree, Size::new(5, 2));
        assert!(tree.node(text).is_some_and(|n| n.frame.is_some()));
        // Second composite with a clean node reuses the cached frame.
        let mut out = CellBuffer::new(Size::new(5, 2));
        composite(&mut tree, &mut out, Rgba::BLACK);
        assert!(row_text(&out, 0).starts_with("hi"));
    }

    #[test]
    fn gutter_shows_line_numbers() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut view = TextView::with_text("alpha\nbeta");
        view.gutter = true;
        let _ = tree.add(root, NodeKind::Text(Box::new(view)));
        let out = render(&mut tree, Size::new(10, 3));
        assert!(row_text(&out, 0).starts_with("1 alpha"));
        assert!(row_text(&out, 1).starts_with("2 beta"));
    }

    #[test]
    fn bridge_renders_when_ready() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let bridge_kind = {
            let mut b = crate::scene::node::BridgeView::default();
            b.status = BridgeStatus::Ready;
            b.raster = Some(Raster {
                data: vec![255, 0, 0, 255, 255, 0, 0, 255],
                width: 1,
                height: 2,
            });
            NodeKind::Bridge(b)
        };
        let _ = tree.add(root, bridge_kind);
        let out = render(&mut tree, Size::new(4, 2));
        assert_eq!(out.get(0, 0).map(|c| c.ch), Some('█'));
    }

    #[test]
    fn bridge_uninitialized_renders_nothing() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut b = crate::scene::node::BridgeView::default();
        b.raster = Some(Raster {
            data: vec![255, 0, 0, 255],
            width: 1,
            height: 1,
        });
        let _ = tree.add(root, NodeKind::Bridge(b));
        let out = render(&mut tree, Size::new(4, 2));
        assert_eq!(out.get(0, 0).map(|c| c.ch), Some(' '));
    }

    #[test]
    fn cursor_hint_from_focused_editor() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut view = TextView::with_text("hello\nworld");
        view.editable = true;
        view.cursor = Some((1, 2));
        let editor = tree.add(root, NodeKind::Text(Box::new(view)));
        let Some(editor) = editor else { return };
        tree.set_focus(Some(editor));
        let _ = render(&mut tree, Size::new(10, 5));
        assert_eq!(cursor_hint(&mut tree), Some(Position::new(2, 1)));
    }

    #[test]
    fn cursor_hint_none_without_focus() {
        let mut tree = SceneTree::new();
        let _ = render(&mut tree, Size::new(10, 5));
        assert_eq!(cursor_hint(&mut tree), None);
    }

    #[test]
    fn text_scrolls_internally() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let mut view = TextView::with_text("one\ntwo\nthree\nfour");
        view.scroll_row = 2;
        let node = tree.add(root, NodeKind::Text(Box::new(view)));
        let Some(node) = node else { return };
        if let Some(n) = tree.node_mut(node) {
            n.style.height = NodeDim::Cells(2);
            n.style.flex_shrink = 0.0;
        }
        let out = render(&mut tree, Size::new(8, 2));
        assert!(row_text(&out, 0).starts_with("three"));
        assert!(row_text(&out, 1).starts_with("four"));
    }

    #[test]
    fn root_background_fills() {
        let mut tree = SceneTree::new();
        let out = render(&mut tree, Size::new(4, 2));
        assert_eq!(out.get(3, 1).map(|c| c.bg), Some(Rgba::BLACK));
    }

    #[test]
    fn node_never_escapes_clip() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let small = tree.add(root, NodeKind::ScrollBox(ScrollState::default()));
        let Some(small) = small else { return };
        if let Some(n) = tree.node_mut(small) {
            n.style.width = NodeDim::Cells(2);
            n.style.height = NodeDim::Cells(2);
            n.style.flex_grow = 0.0;
        }
        let inner = tree.add(small, NodeKind::Text(Box::new(TextView::with_text("XXXXXX"))));
        let Some(inner) = inner else { return };
        if let Some(n) = tree.node_mut(inner) {
            n.style.width = NodeDim::Cells(6);
            n.style.flex_shrink = 0.0;
            if let NodeKind::Text(view) = &mut n.kind {
                view.wrap_mode = crate::unicode::WrapMode::None;
            }
        }
        let out = render(&mut tree, Size::new(8, 4));
        // Columns 2.. on row 0 belong to the root, not the clipped child.
        assert_eq!(out.get(2, 0).map(|c| c.ch), Some(' '));
        assert_eq!(out.get(0, 0).map(|c| c.ch), Some('X'));
    }
}
