//! Retained scene graph: node tree, flexbox layout, z-ordered compositing.

pub mod compose;
pub mod layout;
pub mod node;
pub mod tree;

pub use compose::{composite, cursor_hint};
pub use layout::solve;
pub use node::{
    AlignItems, BoxVisual, BridgeStatus, BridgeView, Dimension, Edges, FlexDirection,
    JustifyContent, LayoutStyle, NodeId, NodeKind, PositionKind, Raster, SceneNode, ScrollState,
    TextView,
};
pub use tree::SceneTree;
