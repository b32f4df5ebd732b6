//! Scene node types: layout attributes, renderable variants, node state.

use crate::buffer::{BorderStyle, CellBuffer};
use crate::color::Rgba;
use crate::geometry::Rect;
use crate::pixel::HalfBlockAlgorithm;
use crate::text_buffer::TextBuffer;
use crate::text_style::{StyleRegistry, TextStyle};
use crate::unicode::WrapMode;

/// Identifier of a scene node. Stable for the node's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A size or flex-basis value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Dimension {
    /// Sized by content / flexbox.
    #[default]
    Auto,
    /// Fixed number of cells.
    Cells(u16),
    /// Percentage of the parent, `0.0..=100.0`.
    Percent(f32),
}

/// Per-side cell counts for padding and margin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Edges {
    /// Top side.
    pub top: u16,
    /// Right side.
    pub right: u16,
    /// Bottom side.
    pub bottom: u16,
    /// Left side.
    pub left: u16,
}

impl Edges {
    /// The same value on all four sides.
    pub const fn all(v: u16) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// Main axis direction of a flex container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlexDirection {
    /// Children laid out left to right.
    Row,
    /// Children laid out top to bottom.
    #[default]
    Column,
}

/// Cross-axis alignment of children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlignItems {
    /// Pack to the cross-axis start.
    FlexStart,
    /// Center on the cross axis.
    Center,
    /// Pack to the cross-axis end.
    FlexEnd,
    /// Stretch to fill the cross axis.
    #[default]
    Stretch,
}

/// Main-axis distribution of children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JustifyContent {
    /// Pack to the main-axis start.
    #[default]
    FlexStart,
    /// Center on the main axis.
    Center,
    /// Pack to the main-axis end.
    FlexEnd,
    /// Distribute with equal space between children.
    SpaceBetween,
}

/// Whether a node takes part in flex flow or positions absolutely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionKind {
    /// Normal flex flow.
    #[default]
    Relative,
    /// Positioned against the parent via `left`/`top`.
    Absolute,
}

/// Flexbox layout attributes of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutStyle {
    /// Requested width.
    pub width: Dimension,
    /// Requested height.
    pub height: Dimension,
    /// Minimum width in cells.
    pub min_width: Option<u16>,
    /// Minimum height in cells.
    pub min_height: Option<u16>,
    /// Maximum width in cells.
    pub max_width: Option<u16>,
    /// Maximum height in cells.
    pub max_height: Option<u16>,
    /// Flex grow factor.
    pub flex_grow: f32,
    /// Flex shrink factor.
    pub flex_shrink: f32,
    /// Flex basis.
    pub flex_basis: Dimension,
    /// Main axis of this node's children.
    pub direction: FlexDirection,
    /// Gap between children, both axes.
    pub gap: u16,
    /// Inner padding.
    pub padding: Edges,
    /// Outer margin.
    pub margin: Edges,
    /// Cross-axis alignment of children.
    pub align_items: AlignItems,
    /// Main-axis distribution of children.
    pub justify_content: JustifyContent,
    /// Flow or absolute positioning.
    pub position: PositionKind,
    /// Left inset for absolute positioning.
    pub left: Option<u16>,
    /// Top inset for absolute positioning.
    pub top: Option<u16>,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            flex_basis: Dimension::Auto,
            direction: FlexDirection::Column,
            gap: 0,
            padding: Edges::default(),
            margin: Edges::default(),
            align_items: AlignItems::Stretch,
            justify_content: JustifyContent::FlexStart,
            position: PositionKind::Relative,
            left: None,
            top: None,
        }
    }
}

/// Visual parameters of a box node.
#[derive(Clone, Debug, Default)]
pub struct BoxVisual {
    /// Border style, `None` for a borderless box.
    pub border: Option<BorderStyle>,
    /// Border color.
    pub border_color: Rgba,
    /// Background fill.
    pub background: Option<Rgba>,
    /// Title drawn into the top border.
    pub title: Option<String>,
}

/// A text node: a text buffer plus presentation options.
///
/// Covers plain text, code views, editors, gutters, and tables: they all
/// render virtual rows of styled chunks and differ only in how content
/// and highlights are prepared by the caller.
#[derive(Clone, Debug)]
pub struct TextView {
    /// The content.
    pub buffer: TextBuffer,
    /// Style registry resolving highlight style ids.
    pub registry: StyleRegistry,
    /// Soft-wrap mode.
    pub wrap_mode: WrapMode,
    /// Tab stop width.
    pub tab_width: u16,
    /// Show a line-number gutter.
    pub gutter: bool,
    /// Whether mouse selection may start on this node.
    pub selectable: bool,
    /// Whether the node accepts editing input and a cursor.
    pub editable: bool,
    /// Copy extraction joins columns with `\t` (table-shaped content).
    pub columnar_copy: bool,
    /// Style applied to selected cells.
    pub selection_style: TextStyle,
    /// Base style of unstyled text.
    pub default_style: TextStyle,
    /// First visual row shown (vertical scroll).
    pub scroll_row: usize,
    /// Cursor position in logical `(row, grapheme col)`, if editable.
    pub cursor: Option<(usize, usize)>,
}

impl Default for TextView {
    fn default() -> Self {
        Self {
            buffer: TextBuffer::new(),
            registry: StyleRegistry::default(),
            wrap_mode: WrapMode::Word,
            tab_width: 8,
            gutter: false,
            selectable: true,
            editable: false,
            columnar_copy: false,
            selection_style: TextStyle::new().attrs(crate::attr::Attributes::INVERSE),
            default_style: TextStyle::default(),
            scroll_row: 0,
            cursor: None,
        }
    }
}

impl TextView {
    /// Create a text view over plain text.
    pub fn with_text(text: &str) -> Self {
        let mut view = Self::default();
        view.buffer.set_text(text);
        view
    }

    /// Width of the line-number gutter for the current content, including
    /// one trailing space. Zero when the gutter is disabled.
    pub fn gutter_width(&self) -> u16 {
        if !self.gutter {
            return 0;
        }
        let lines = self.buffer.line_count().max(1);
        let digits = (lines.ilog10() + 1) as u16;
        digits + 1
    }
}

/// Scroll offsets of a scroll container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollState {
    /// Columns scrolled to the right.
    pub offset_x: u16,
    /// Rows scrolled down.
    pub offset_y: u16,
}

/// Lifecycle of the foreign-raster bridge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BridgeStatus {
    /// Nothing initialized yet.
    #[default]
    Uninitialized,
    /// Async initialization in flight.
    Initializing,
    /// Raster frames may be presented.
    Ready,
    /// Initialization failed; the node renders nothing.
    Failed,
}

/// A foreign RGBA raster presented through half-block cells.
#[derive(Clone, Debug, Default)]
pub struct BridgeView {
    /// Initialization state machine.
    pub status: BridgeStatus,
    /// Latest raster frame: tightly packed RGBA8.
    pub raster: Option<Raster>,
    /// Cell encoding of the raster.
    pub algorithm: HalfBlockAlgorithm,
}

impl BridgeView {
    /// Accept a new raster frame. Ignored unless the bridge is ready.
    pub fn submit(&mut self, raster: Raster) {
        if self.status == BridgeStatus::Ready {
            self.raster = Some(raster);
        }
    }
}

/// An RGBA8 pixel raster.
#[derive(Clone, Debug)]
pub struct Raster {
    /// Pixel data, 4 bytes per pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
}

/// The closed set of renderable variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Bordered / filled container.
    Box(BoxVisual),
    /// Text content (plain, code, editor, table).
    Text(Box<TextView>),
    /// Scrolling container.
    ScrollBox(ScrollState),
    /// Foreign raster bridge.
    Bridge(BridgeView),
}

impl NodeKind {
    /// Whether this node paints cells itself.
    pub fn is_drawable(&self) -> bool {
        !matches!(self, NodeKind::ScrollBox(_))
    }

    /// Whether mouse selection may start on this node.
    pub fn is_selectable(&self) -> bool {
        matches!(self, NodeKind::Text(view) if view.selectable)
    }

    /// Whether this node can take keyboard focus.
    pub fn is_focusable(&self) -> bool {
        matches!(self, NodeKind::Text(view) if view.editable)
    }

    /// Whether this node reports line geometry (text-shaped content).
    pub fn is_line_info_provider(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }
}

/// A retained scene node.
#[derive(Clone, Debug)]
pub struct SceneNode {
    /// This node's id.
    pub id: NodeId,
    /// Parent id; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Children in insertion order.
    pub children: Vec<NodeId>,
    /// Flexbox attributes.
    pub style: LayoutStyle,
    /// Stacking order among siblings; ties break by insertion order.
    pub z_index: i32,
    /// Invisible subtrees are skipped entirely.
    pub visible: bool,
    /// Whether this node participates in mouse hit testing.
    pub mouse_enabled: bool,
    /// Keep a cached frame buffer across frames when clean.
    pub buffered: bool,
    /// The renderable payload.
    pub kind: NodeKind,

    pub(crate) rect: Rect,
    pub(crate) render_dirty: bool,
    pub(crate) layout_dirty: bool,
    pub(crate) layout_error: bool,
    pub(crate) frame: Option<CellBuffer>,
    pub(crate) insertion: u64,
}

impl SceneNode {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, kind: NodeKind, insertion: u64) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            style: LayoutStyle::default(),
            z_index: 0,
            visible: true,
            mouse_enabled: true,
            buffered: false,
            kind,
            rect: Rect::default(),
            render_dirty: true,
            layout_dirty: true,
            layout_error: false,
            frame: None,
            insertion,
        }
    }

    /// Absolute bounds computed by the last layout pass.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// True if the last layout pass failed for this node and its previous
    /// geometry was kept.
    pub fn layout_error(&self) -> bool {
        self.layout_error
    }

    /// The text view payload, if this is a text node.
    pub fn text_view(&self) -> Option<&TextView> {
        match &self.kind {
            NodeKind::Text(view) => Some(view),
            _ => None,
        }
    }

    /// Mutable text view payload, if this is a text node.
    pub fn text_view_mut(&mut self) -> Option<&mut TextView> {
        match &mut self.kind {
            NodeKind::Text(view) => Some(view),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_style() {
        let s = LayoutStyle::default();
        assert_eq!(s.width, Dimension::Auto);
        assert_eq!(s.direction, FlexDirection::Column);
        assert!((s.flex_shrink - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn capabilities_by_kind() {
        let boxed = NodeKind::Box(BoxVisual::default());
        assert!(boxed.is_drawable());
        assert!(!boxed.is_selectable());

        let scroll = NodeKind::ScrollBox(ScrollState::default());
        assert!(!scroll.is_drawable());

        let mut view = TextView::default();
        view.editable = true;
        let text = NodeKind::Text(Box::new(view));
        assert!(text.is_drawable());
        assert!(text.is_selectable());
        assert!(text.is_focusable());
        assert!(text.is_line_info_provider());
    }

    #[test]
    fn gutter_width_scales_with_lines() {
        let mut view = TextView::with_text("a\nb\nc");
        assert_eq!(view.gutter_width(), 0);
        view.gutter = true;
        assert_eq!(view.gutter_width(), 2); // 1 digit + space
        view.buffer
            .set_text(&(0..100).map(|i| i.to_string()).collect::<Vec<_>>().join("\n"));
        assert_eq!(view.gutter_width(), 4); // 3 digits + space
    }

    #[test]
    fn bridge_rejects_frames_until_ready() {
        let mut bridge = BridgeView::default();
        let frame = Raster {
            data: vec![0; 4],
            width: 1,
            height: 1,
        };
        bridge.submit(frame.clone());
        assert!(bridge.raster.is_none());
        bridge.status = BridgeStatus::Ready;
        bridge.submit(frame);
        assert!(bridge.raster.is_some());
    }
}
