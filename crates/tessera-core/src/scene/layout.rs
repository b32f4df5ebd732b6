//! Flexbox layout over the scene tree, backed by Taffy.
//!
//! Each solve builds a Taffy tree mirroring the scene nodes, computes
//! layout with measure functions for text leaves, and writes absolute
//! cell rectangles back to the nodes. A node whose solve produces
//! non-finite geometry keeps its previous rectangle and is flagged.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::error::{Result, TesseraError};
use crate::geometry::{Rect, Size as CellSize};
use crate::unicode::calculate_text_width;

use super::node::{
    AlignItems as NodeAlign, Dimension as NodeDim, FlexDirection as NodeDir,
    JustifyContent as NodeJustify, LayoutStyle, NodeId as SceneNodeId, NodeKind, PositionKind,
};
use super::tree::SceneTree;

/// Intrinsic content size of a leaf, in cells.
type Intrinsic = (f32, f32);

/// Run a layout pass over the whole tree.
///
/// Always lays out from the root; call only when
/// [`SceneTree::needs_layout`] reports dirt or the terminal resized.
pub fn solve(tree: &mut SceneTree, available: CellSize) -> Result<()> {
    let ids = tree.pre_order();

    // Intrinsic sizes for content leaves. Text measurement needs mutable
    // access for the wrap cache, so this happens before Taffy runs.
    let mut intrinsics: HashMap<SceneNodeId, Intrinsic> = HashMap::new();
    for id in &ids {
        let Some(node) = tree.node_mut(*id) else { continue };
        match &mut node.kind {
            NodeKind::Text(view) => {
                let east_asian = view.buffer.east_asian_width();
                let mut max_w = 0usize;
                for row in 0..view.buffer.line_count() {
                    if let Some(text) = view.buffer.line_text(row) {
                        let w =
                            calculate_text_width(text.as_bytes(), view.tab_width, true, east_asian);
                        max_w = max_w.max(w);
                    }
                }
                let gutter = usize::from(view.gutter_width());
                let h = view.buffer.line_count().max(1);
                intrinsics.insert(*id, ((max_w + gutter) as f32, h as f32));
            }
            NodeKind::Bridge(bridge) => {
                if let Some(raster) = &bridge.raster {
                    let h = match bridge.algorithm {
                        crate::pixel::HalfBlockAlgorithm::Standard => raster.height.div_ceil(2),
                        crate::pixel::HalfBlockAlgorithm::PreSqueezed => raster.height,
                    };
                    intrinsics.insert(*id, (f32::from(raster.width), f32::from(h)));
                }
            }
            _ => {}
        }
    }

    // Mirror the scene tree in Taffy, post-order so children exist first.
    let mut taffy: TaffyTree<Intrinsic> = TaffyTree::new();
    let mut map: HashMap<SceneNodeId, taffy::NodeId> = HashMap::new();
    build_node(tree, &mut taffy, &mut map, &intrinsics, tree.root(), available)?;

    let root_taffy = map
        .get(&tree.root())
        .copied()
        .ok_or_else(|| TesseraError::Layout("root missing from layout tree".into()))?;

    taffy
        .compute_layout_with_measure(
            root_taffy,
            taffy::Size {
                width: AvailableSpace::Definite(f32::from(available.width)),
                height: AvailableSpace::Definite(f32::from(available.height)),
            },
            |known, avail, _node, ctx: Option<&mut Intrinsic>, _style| {
                let Some((iw, ih)) = ctx.copied() else {
                    return taffy::Size::ZERO;
                };
                let width = known.width.unwrap_or(match avail.width {
                    AvailableSpace::Definite(w) => w.min(iw),
                    _ => iw,
                });
                let height = known.height.unwrap_or(ih);
                taffy::Size { width, height }
            },
        )
        .map_err(|e| TesseraError::Layout(format!("{e}")))?;

    // Write absolute rectangles back.
    let root = tree.root();
    let mut warned = false;
    apply_node(tree, &taffy, &map, root, (0, 0), &mut warned)?;

    for id in &ids {
        if let Some(node) = tree.node_mut(*id) {
            node.layout_dirty = false;
        }
    }
    tree.any_layout_dirty = false;
    Ok(())
}

fn build_node(
    tree: &SceneTree,
    taffy: &mut TaffyTree<Intrinsic>,
    map: &mut HashMap<SceneNodeId, taffy::NodeId>,
    intrinsics: &HashMap<SceneNodeId, Intrinsic>,
    id: SceneNodeId,
    available: CellSize,
) -> Result<taffy::NodeId> {
    let node = tree
        .node(id)
        .ok_or_else(|| TesseraError::Layout(format!("unknown node {id:?}")))?;

    let mut style = to_taffy_style(&node.style, !node.visible);
    if id == tree.root() {
        style.size = taffy::Size {
            width: Dimension::Length(f32::from(available.width)),
            height: Dimension::Length(f32::from(available.height)),
        };
    }

    let taffy_id = if node.children.is_empty() {
        match intrinsics.get(&id) {
            Some(intrinsic) => taffy
                .new_leaf_with_context(style, *intrinsic)
                .map_err(|e| TesseraError::Layout(format!("{e}")))?,
            None => taffy
                .new_leaf(style)
                .map_err(|e| TesseraError::Layout(format!("{e}")))?,
        }
    } else {
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(build_node(tree, taffy, map, intrinsics, *child, available)?);
        }
        taffy
            .new_with_children(style, &children)
            .map_err(|e| TesseraError::Layout(format!("{e}")))?
    };
    map.insert(id, taffy_id);
    Ok(taffy_id)
}

fn apply_node(
    tree: &mut SceneTree,
    taffy: &TaffyTree<Intrinsic>,
    map: &HashMap<SceneNodeId, taffy::NodeId>,
    id: SceneNodeId,
    origin: (i32, i32),
    warned: &mut bool,
) -> Result<()> {
    let Some(taffy_id) = map.get(&id).copied() else {
        return Ok(());
    };
    let layout = taffy
        .layout(taffy_id)
        .map_err(|e| TesseraError::Layout(format!("{e}")))?;

    let x = origin.0 + layout.location.x.round() as i32;
    let y = origin.1 + layout.location.y.round() as i32;
    let w = layout.size.width;
    let h = layout.size.height;

    let finite = layout.location.x.is_finite()
        && layout.location.y.is_finite()
        && w.is_finite()
        && h.is_finite()
        && w >= 0.0
        && h >= 0.0;

    let (raw_origin, scroll) = {
        let Some(node) = tree.node_mut(id) else {
            return Ok(());
        };
        if finite {
            node.rect = clamp_rect(x, y, w.round() as i32, h.round() as i32);
            node.layout_error = false;
        } else {
            // Keep the previous geometry; surface the fault once per pass.
            node.layout_error = true;
            if !*warned {
                tracing::warn!(node = ?id, "layout produced non-finite geometry; keeping previous rect");
                *warned = true;
            }
        }
        let scroll = match &node.kind {
            NodeKind::ScrollBox(state) => (i32::from(state.offset_x), i32::from(state.offset_y)),
            _ => (0, 0),
        };
        ((x, y), scroll)
    };

    let children: Vec<SceneNodeId> = tree
        .node(id)
        .map(|n| n.children.clone())
        .unwrap_or_default();
    for child in children {
        apply_node(
            tree,
            taffy,
            map,
            child,
            (raw_origin.0 - scroll.0, raw_origin.1 - scroll.1),
            warned,
        )?;
    }
    Ok(())
}

/// Clamp an i32 rectangle into non-negative cell space. Parts hanging
/// above or left of the screen are cut off.
fn clamp_rect(x: i32, y: i32, w: i32, h: i32) -> Rect {
    let (x, w) = if x < 0 { (0, (w + x).max(0)) } else { (x, w.max(0)) };
    let (y, h) = if y < 0 { (0, (h + y).max(0)) } else { (y, h.max(0)) };
    Rect::new(
        x.min(i32::from(u16::MAX)) as u16,
        y.min(i32::from(u16::MAX)) as u16,
        w.min(i32::from(u16::MAX)) as u16,
        h.min(i32::from(u16::MAX)) as u16,
    )
}

/// Convert node layout attributes to a Taffy style.
fn to_taffy_style(style: &LayoutStyle, hidden: bool) -> Style {
    let mut out = Style {
        display: if hidden { Display::None } else { Display::Flex },
        ..Style::default()
    };

    out.size = taffy::Size {
        width: to_dimension(style.width),
        height: to_dimension(style.height),
    };
    out.min_size = taffy::Size {
        width: opt_cells(style.min_width),
        height: opt_cells(style.min_height),
    };
    out.max_size = taffy::Size {
        width: opt_cells(style.max_width),
        height: opt_cells(style.max_height),
    };
    out.flex_grow = style.flex_grow;
    out.flex_shrink = style.flex_shrink;
    out.flex_basis = to_dimension(style.flex_basis);
    out.flex_direction = match style.direction {
        NodeDir::Row => FlexDirection::Row,
        NodeDir::Column => FlexDirection::Column,
    };
    let gap = LengthPercentage::Length(f32::from(style.gap));
    out.gap = taffy::Size {
        width: gap,
        height: gap,
    };
    out.padding = taffy::Rect {
        left: LengthPercentage::Length(f32::from(style.padding.left)),
        right: LengthPercentage::Length(f32::from(style.padding.right)),
        top: LengthPercentage::Length(f32::from(style.padding.top)),
        bottom: LengthPercentage::Length(f32::from(style.padding.bottom)),
    };
    out.margin = taffy::Rect {
        left: LengthPercentageAuto::Length(f32::from(style.margin.left)),
        right: LengthPercentageAuto::Length(f32::from(style.margin.right)),
        top: LengthPercentageAuto::Length(f32::from(style.margin.top)),
        bottom: LengthPercentageAuto::Length(f32::from(style.margin.bottom)),
    };
    out.align_items = Some(match style.align_items {
        NodeAlign::FlexStart => AlignItems::FlexStart,
        NodeAlign::Center => AlignItems::Center,
        NodeAlign::FlexEnd => AlignItems::FlexEnd,
        NodeAlign::Stretch => AlignItems::Stretch,
    });
    out.justify_content = Some(match style.justify_content {
        NodeJustify::FlexStart => JustifyContent::FlexStart,
        NodeJustify::Center => JustifyContent::Center,
        NodeJustify::FlexEnd => JustifyContent::FlexEnd,
        NodeJustify::SpaceBetween => JustifyContent::SpaceBetween,
    });
    out.position = match style.position {
        PositionKind::Relative => Position::Relative,
        PositionKind::Absolute => Position::Absolute,
    };
    out.inset = taffy::Rect {
        left: style
            .left
            .map_or(LengthPercentageAuto::Auto, |v| {
                LengthPercentageAuto::Length(f32::from(v))
            }),
        top: style
            .top
            .map_or(LengthPercentageAuto::Auto, |v| {
                LengthPercentageAuto::Length(f32::from(v))
            }),
        right: LengthPercentageAuto::Auto,
        bottom: LengthPercentageAuto::Auto,
    };
    out
}

fn to_dimension(dim: NodeDim) -> Dimension {
    match dim {
        NodeDim::Auto => Dimension::Auto,
        NodeDim::Cells(n) => Dimension::Length(f32::from(n)),
        NodeDim::Percent(p) => Dimension::Percent(p / 100.0),
    }
}

fn opt_cells(v: Option<u16>) -> Dimension {
    v.map_or(Dimension::Auto, |n| Dimension::Length(f32::from(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::{BoxVisual, NodeKind, TextView};

    fn boxed() -> NodeKind {
        NodeKind::Box(BoxVisual::default())
    }

    #[test]
    fn root_fills_available() {
        let mut tree = SceneTree::new();
        let ok = solve(&mut tree, CellSize::new(80, 24));
        assert!(ok.is_ok());
        assert_eq!(
            tree.node(tree.root()).map(|n| n.rect()),
            Some(Rect::new(0, 0, 80, 24))
        );
        assert!(!tree.needs_layout());
    }

    #[test]
    fn column_children_stack() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let a = tree.add(root, boxed());
        let b = tree.add(root, boxed());
        let (Some(a), Some(b)) = (a, b) else { return };
        if let Some(n) = tree.node_mut(a) {
            n.style.height = NodeDim::Cells(5);
        }
        if let Some(n) = tree.node_mut(b) {
            n.style.height = NodeDim::Cells(3);
        }
        let ok = solve(&mut tree, CellSize::new(40, 20));
        assert!(ok.is_ok());
        assert_eq!(tree.node(a).map(|n| n.rect()), Some(Rect::new(0, 0, 40, 5)));
        assert_eq!(tree.node(b).map(|n| n.rect()), Some(Rect::new(0, 5, 40, 3)));
    }

    #[test]
    fn row_with_grow() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        if let Some(n) = tree.node_mut(root) {
            n.style.direction = NodeDir::Row;
        }
        let fixed = tree.add(root, boxed());
        let flex = tree.add(root, boxed());
        let (Some(fixed), Some(flex)) = (fixed, flex) else {
            return;
        };
        if let Some(n) = tree.node_mut(fixed) {
            n.style.width = NodeDim::Cells(10);
        }
        if let Some(n) = tree.node_mut(flex) {
            n.style.flex_grow = 1.0;
        }
        let ok = solve(&mut tree, CellSize::new(50, 10));
        assert!(ok.is_ok());
        assert_eq!(
            tree.node(fixed).map(|n| n.rect()),
            Some(Rect::new(0, 0, 10, 10))
        );
        assert_eq!(
            tree.node(flex).map(|n| n.rect()),
            Some(Rect::new(10, 0, 40, 10))
        );
    }

    #[test]
    fn padding_offsets_children() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        if let Some(n) = tree.node_mut(root) {
            n.style.padding = crate::scene::node::Edges::all(2);
        }
        let child = tree.add(root, boxed());
        let Some(child) = child else { return };
        if let Some(n) = tree.node_mut(child) {
            n.style.flex_grow = 1.0;
        }
        let ok = solve(&mut tree, CellSize::new(20, 10));
        assert!(ok.is_ok());
        let rect = tree.node(child).map(|n| n.rect());
        assert_eq!(rect, Some(Rect::new(2, 2, 16, 6)));
    }

    #[test]
    fn percent_width() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        if let Some(n) = tree.node_mut(root) {
            n.style.direction = NodeDir::Row;
        }
        let half = tree.add(root, boxed());
        let Some(half) = half else { return };
        if let Some(n) = tree.node_mut(half) {
            n.style.width = NodeDim::Percent(50.0);
            n.style.height = NodeDim::Cells(4);
        }
        let ok = solve(&mut tree, CellSize::new(40, 10));
        assert!(ok.is_ok());
        assert_eq!(
            tree.node(half).map(|n| n.rect().size.width),
            Some(20)
        );
    }

    #[test]
    fn absolute_position() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let float = tree.add(root, boxed());
        let Some(float) = float else { return };
        if let Some(n) = tree.node_mut(float) {
            n.style.position = PositionKind::Absolute;
            n.style.left = Some(5);
            n.style.top = Some(3);
            n.style.width = NodeDim::Cells(10);
            n.style.height = NodeDim::Cells(4);
        }
        let ok = solve(&mut tree, CellSize::new(40, 20));
        assert!(ok.is_ok());
        assert_eq!(
            tree.node(float).map(|n| n.rect()),
            Some(Rect::new(5, 3, 10, 4))
        );
    }

    #[test]
    fn text_leaf_measures_content() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        if let Some(n) = tree.node_mut(root) {
            n.style.align_items = NodeAlign::FlexStart;
        }
        let text = tree.add(
            root,
            NodeKind::Text(Box::new(TextView::with_text("hello\nworld!"))),
        );
        let Some(text) = text else { return };
        let ok = solve(&mut tree, CellSize::new(40, 20));
        assert!(ok.is_ok());
        let rect = tree.node(text).map(|n| n.rect());
        // Longest line "world!" = 6 wide, two logical lines tall.
        assert_eq!(rect.map(|r| r.size.width), Some(6));
        assert_eq!(rect.map(|r| r.size.height), Some(2));
    }

    #[test]
    fn scroll_offset_moves_children() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let scroll = tree.add(
            root,
            NodeKind::ScrollBox(crate::scene::node::ScrollState {
                offset_x: 0,
                offset_y: 3,
            }),
        );
        let Some(scroll) = scroll else { return };
        let tall = tree.add(scroll, boxed());
        let Some(tall) = tall else { return };
        if let Some(n) = tree.node_mut(tall) {
            n.style.height = NodeDim::Cells(10);
            n.style.flex_shrink = 0.0;
        }
        if let Some(n) = tree.node_mut(scroll) {
            n.style.height = NodeDim::Cells(5);
        }
        let ok = solve(&mut tree, CellSize::new(20, 5));
        assert!(ok.is_ok());
        // Child shifted up by 3 rows and clipped at the top.
        let rect = tree.node(tall).map(|n| n.rect());
        assert_eq!(rect.map(|r| r.position.y), Some(0));
        assert_eq!(rect.map(|r| r.size.height), Some(7));
    }

    #[test]
    fn gap_between_children() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        if let Some(n) = tree.node_mut(root) {
            n.style.gap = 2;
        }
        let a = tree.add(root, boxed());
        let b = tree.add(root, boxed());
        let (Some(a), Some(b)) = (a, b) else { return };
        for id in [a, b] {
            if let Some(n) = tree.node_mut(id) {
                n.style.height = NodeDim::Cells(3);
            }
        }
        let ok = solve(&mut tree, CellSize::new(10, 20));
        assert!(ok.is_ok());
        assert_eq!(tree.node(a).map(|n| n.rect().position.y), Some(0));
        assert_eq!(tree.node(b).map(|n| n.rect().position.y), Some(5));
    }

    #[test]
    fn hidden_subtree_gets_no_space() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let hidden = tree.add(root, boxed());
        let shown = tree.add(root, boxed());
        let (Some(hidden), Some(shown)) = (hidden, shown) else {
            return;
        };
        if let Some(n) = tree.node_mut(hidden) {
            n.style.height = NodeDim::Cells(5);
            n.visible = false;
        }
        if let Some(n) = tree.node_mut(shown) {
            n.style.height = NodeDim::Cells(5);
        }
        let ok = solve(&mut tree, CellSize::new(10, 20));
        assert!(ok.is_ok());
        // The visible child starts at the top; the hidden one takes no row.
        assert_eq!(tree.node(shown).map(|n| n.rect().position.y), Some(0));
    }
}
