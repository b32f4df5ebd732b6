//! tessera-core: a retained-mode terminal renderer engine.
//!
//! This crate provides the cell buffer and frame-diff presenter, the
//! Unicode-aware text layout subsystem (rope, wrap cache, styled text),
//! the flexbox scene graph, the input demultiplexer, and the cooperative
//! frame loop for building terminal user interfaces.

pub mod ansi;
pub mod attr;
pub mod buffer;
pub mod capabilities;
pub mod cell;
pub mod color;
pub mod error;
pub mod events;
pub mod geometry;
pub mod input;
pub mod pixel;
pub mod presenter;
pub mod rope;
pub mod runtime;
pub mod scene;
pub mod terminal;
pub mod text_buffer;
pub mod text_style;
pub mod unicode;

pub use attr::Attributes;
pub use buffer::{BorderStyle, CellBuffer, CellChange, LinkTable};
pub use capabilities::{Capabilities, ColorSupport};
pub use cell::Cell;
pub use color::Rgba;
pub use error::{Result, TesseraError};
pub use events::{EventBus, MouseHandler, MousePhase, NodeMouseEvent, Outcome, osc52_copy_sequence};
pub use geometry::{Position, Rect, Size};
pub use input::{
    CapabilityReply, InputEvent, InputParser, KeyCode, KeyEvent, Modifiers, MouseButton,
    MouseEvent, MouseEventKind,
};
pub use pixel::HalfBlockAlgorithm;
pub use presenter::{ModeOptions, Presenter};
pub use rope::{Item, Rope, Summary};
pub use runtime::{FocusCallback, FrameCallback, KeyHook, Runtime, RuntimeOptions, StopHandle};
pub use scene::{
    AlignItems, BoxVisual, BridgeStatus, BridgeView, Dimension, Edges, FlexDirection,
    JustifyContent, LayoutStyle, NodeId, NodeKind, PositionKind, Raster, SceneNode, SceneTree,
    ScrollState, TextView,
};
pub use terminal::{CrosstermBackend, Terminal, TestBackend};
pub use text_buffer::{Highlight, Selection, TextBuffer, WrapSegment};
pub use text_style::{Chunk, StyleId, StyleRegistry, TextStyle};
pub use unicode::{EastAsianWidth, WrapMode};
