//! Frame loop — the cooperative driver tying input, layout, compositing,
//! and presentation together.
//!
//! Single-threaded: every tick drains input, runs user frame callbacks,
//! and renders if anything is dirty. Frames that blow the budget cause
//! the next render to be skipped; input is still drained every tick.
//! `stop()` is idempotent and the loop restores all terminal modes on
//! every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::capabilities::Capabilities;
use crate::color::Rgba;
use crate::error::Result;
use crate::events::EventBus;
use crate::geometry::Size;
use crate::input::{InputEvent, InputParser};
use crate::presenter::{INPUT_POLL, ModeOptions, Presenter};
use crate::scene::{self, SceneTree};
use crate::terminal::Terminal;
use crate::unicode::EastAsianWidth;

/// Frame loop configuration.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeOptions {
    /// Target frames per second.
    pub target_fps: u32,
    /// Root background color.
    pub background: Rgba,
    /// Terminal modes to acquire.
    pub modes: ModeOptions,
    /// How East Asian ambiguous characters measure.
    pub east_asian: EastAsianWidth,
    /// Whether OSC 8 hyperlinks may be emitted at all.
    pub hyperlinks: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            target_fps: 60,
            background: Rgba::BLACK,
            modes: ModeOptions::default(),
            east_asian: EastAsianWidth::Narrow,
            hyperlinks: true,
        }
    }
}

/// Callback invoked once per frame before layout. Receives the elapsed
/// time since the previous frame.
pub type FrameCallback = Box<dyn FnMut(&mut SceneTree, Duration)>;

/// Callback invoked when the terminal gains or loses focus.
pub type FocusCallback = Box<dyn FnMut(bool)>;

/// Application-level key hook, consulted before focus routing. Returning
/// true consumes the key.
pub type KeyHook = Box<dyn FnMut(&crate::input::KeyEvent) -> bool>;

/// Cloneable handle that requests the loop to stop from callbacks or
/// hooks. Stopping is idempotent.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request the loop to stop at the next tick boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The cooperative frame loop.
pub struct Runtime {
    tree: SceneTree,
    bus: EventBus,
    parser: InputParser,
    presenter: Presenter,
    options: RuntimeOptions,
    callbacks: Vec<FrameCallback>,
    focus_hooks: Vec<FocusCallback>,
    key_hooks: Vec<KeyHook>,
    pending: Vec<InputEvent>,
    running: bool,
    stop_flag: StopHandle,
    overrun: bool,
    last_frame: Option<Instant>,
}

impl Runtime {
    /// Create a runtime with an empty scene, detecting capabilities from
    /// the environment.
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_capabilities(options, Capabilities::from_env())
    }

    /// Create a runtime with an explicit capability table (tests, or a
    /// host that already ran its own detection).
    pub fn with_capabilities(options: RuntimeOptions, caps: Capabilities) -> Self {
        let mut caps = caps;
        if !options.hyperlinks {
            caps.hyperlinks = false;
        }
        Self {
            tree: SceneTree::new(),
            bus: EventBus::new(),
            parser: InputParser::new(),
            presenter: Presenter::new(Size::new(1, 1), caps),
            options,
            callbacks: Vec::new(),
            focus_hooks: Vec::new(),
            key_hooks: Vec::new(),
            pending: Vec::new(),
            running: false,
            stop_flag: StopHandle::default(),
            overrun: false,
            last_frame: None,
        }
    }

    /// The scene tree.
    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// The scene tree, mutably.
    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    /// The event bus.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// The presenter.
    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Register a frame callback; callbacks run in registration order.
    pub fn on_frame(&mut self, cb: FrameCallback) {
        self.callbacks.push(cb);
    }

    /// Register a focus change callback.
    pub fn on_focus_change(&mut self, cb: FocusCallback) {
        self.focus_hooks.push(cb);
    }

    /// Register a key hook consulted before focus routing.
    pub fn on_key(&mut self, cb: KeyHook) {
        self.key_hooks.push(cb);
    }

    /// Request the loop to stop at the next tick boundary. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
        self.stop_flag.stop();
    }

    /// A cloneable handle that can stop the loop from callbacks.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_flag.clone()
    }

    /// Whether the loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Acquire terminal modes and run the capability handshake.
    pub fn start(&mut self, term: &mut dyn Terminal) -> Result<()> {
        self.presenter.acquire_modes(term, self.options.modes)?;
        self.presenter.handshake(term)?;
        self.running = true;
        Ok(())
    }

    /// Drain remaining input and restore the terminal.
    pub fn shutdown(&mut self, term: &mut dyn Terminal) -> Result<()> {
        // Flush whatever input already arrived so the host shell does not
        // see stray escape sequences.
        if let Ok(bytes) = term.poll_input(Duration::from_millis(0)) {
            let _ = self.parser.feed(&bytes);
        }
        self.running = false;
        self.presenter.release_modes(term, self.options.modes)
    }

    /// Run the loop until [`Runtime::stop`] is called or the presenter
    /// enters the stopped state. Terminal modes are restored on exit,
    /// including when a tick returns an error.
    pub fn run(&mut self, term: &mut dyn Terminal) -> Result<()> {
        self.start(term)?;
        let budget = frame_budget(self.options.target_fps);

        let outcome = loop {
            if !self.running || self.stop_flag.is_stopped() || self.presenter.stopped() {
                break Ok(());
            }
            let tick_start = Instant::now();
            if let Err(e) = self.tick(term) {
                break Err(e);
            }
            let spent = tick_start.elapsed();
            if spent > budget {
                // Over budget: skip the next render rather than queueing.
                self.overrun = true;
            } else {
                let remaining = budget - spent;
                match term.poll_input(remaining) {
                    Ok(bytes) if !bytes.is_empty() => {
                        let events = self.parser.feed(&bytes);
                        self.pending.extend(events);
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                }
            }
        };

        let shutdown = self.shutdown(term);
        outcome.and(shutdown)
    }

    /// One loop iteration: drain input, run callbacks, render if dirty.
    pub fn tick(&mut self, term: &mut dyn Terminal) -> Result<()> {
        // 1. Input, in arrival order, before anything composites.
        let bytes = term.poll_input(INPUT_POLL)?;
        let mut events = std::mem::take(&mut self.pending);
        if !bytes.is_empty() {
            events.extend(self.parser.feed(&bytes));
        }
        for event in events {
            self.dispatch(term, event)?;
        }

        // 2. User frame callbacks. A panicking callback is logged and the
        // frame continues.
        let now = Instant::now();
        let elapsed = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.duration_since(last));
        let tree = &mut self.tree;
        for cb in &mut self.callbacks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                cb(tree, elapsed);
            }));
            if result.is_err() {
                tracing::error!("frame callback panicked; frame continues");
            }
        }
        self.last_frame = Some(now);

        // 3. Layout, composite, present when something changed.
        if self.overrun {
            self.overrun = false;
            return Ok(());
        }
        let size = self.presenter.prepare(term)?;
        let size_changed = self
            .tree
            .node(self.tree.root())
            .is_some_and(|n| n.rect().size != size);
        if size_changed {
            let root = self.tree.root();
            self.tree.mark_layout_dirty(root);
        }
        if !self.tree.needs_layout() && !self.tree.needs_render() {
            return Ok(());
        }
        if self.tree.needs_layout() {
            scene::solve(&mut self.tree, size)?;
        }
        scene::composite(&mut self.tree, self.presenter.back_mut(), self.options.background);
        let cursor = scene::cursor_hint(&mut self.tree);
        self.presenter.present(term, cursor)
    }

    fn dispatch(&mut self, term: &mut dyn Terminal, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::Key(key) => {
                let consumed = self.key_hooks.iter_mut().any(|hook| hook(&key));
                if !consumed {
                    self.bus.dispatch_key(&mut self.tree, &key);
                }
            }
            InputEvent::Mouse(mouse) => {
                self.bus.dispatch_mouse(&mut self.tree, &mouse);
            }
            InputEvent::FocusGained => {
                // The terminal may have dropped reporting modes while we
                // were unfocused; turn them back on.
                self.presenter.reassert_modes(term, self.options.modes)?;
                for hook in &mut self.focus_hooks {
                    hook(true);
                }
            }
            InputEvent::FocusLost => {
                for hook in &mut self.focus_hooks {
                    hook(false);
                }
            }
            InputEvent::Paste(text) => {
                self.bus.dispatch_paste(&mut self.tree, &text);
            }
            InputEvent::Capability(reply) => {
                self.presenter.apply_capability(&reply);
            }
        }
        Ok(())
    }
}

/// Duration of one frame at the given fps.
fn frame_budget(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeKind, TextView};
    use crate::terminal::TestBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn runtime() -> Runtime {
        // Fixed capabilities so assertions don't depend on the host env.
        Runtime::with_capabilities(RuntimeOptions::default(), Capabilities::default())
    }

    #[test]
    fn tick_renders_scene() {
        let mut term = TestBackend::new(20, 5);
        let mut rt = runtime();
        let root = rt.tree().root();
        let _ = rt
            .tree_mut()
            .add(root, NodeKind::Text(Box::new(TextView::with_text("hi"))));
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        assert!(term.output().contains("hi"));
    }

    #[test]
    fn clean_tick_writes_nothing() {
        let mut term = TestBackend::new(20, 5);
        let mut rt = runtime();
        let first = rt.tick(&mut term);
        assert!(first.is_ok());
        term.clear_buffer();
        let second = rt.tick(&mut term);
        assert!(second.is_ok());
        assert!(term.buffer().is_empty(), "no dirt, no output");
    }

    #[test]
    fn frame_callbacks_run_in_order() {
        let mut term = TestBackend::new(10, 3);
        let mut rt = runtime();
        let order: Arc<AtomicUsize> = Arc::default();
        let (a, b) = (order.clone(), order.clone());
        rt.on_frame(Box::new(move |_, _| {
            let _ = a.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst);
        }));
        rt.on_frame(Box::new(move |_, _| {
            let _ = b.compare_exchange(1, 2, Ordering::SeqCst, Ordering::SeqCst);
        }));
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_callback_does_not_abort_frame() {
        let mut term = TestBackend::new(10, 3);
        let mut rt = runtime();
        let ran: Arc<AtomicUsize> = Arc::default();
        let flag = ran.clone();
        rt.on_frame(Box::new(|_, _| panic!("boom")));
        rt.on_frame(Box::new(move |_, _| {
            flag.store(1, Ordering::SeqCst);
        }));
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn input_dispatched_before_render() {
        let mut term = TestBackend::new(20, 5);
        let mut rt = runtime();
        let root = rt.tree().root();
        let mut view = TextView::with_text("");
        view.editable = true;
        view.cursor = Some((0, 0));
        let editor = rt.tree_mut().add(root, NodeKind::Text(Box::new(view)));
        let Some(editor) = editor else { return };
        rt.tree_mut().set_focus(Some(editor));

        term.push_input(b"x");
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        // The keystroke landed in the buffer and rendered the same frame.
        assert!(term.output().contains('x'));
    }

    #[test]
    fn capability_replies_update_presenter() {
        let mut term = TestBackend::new(10, 3);
        let mut rt = runtime();
        term.push_input(b"\x1b[?2026;2$y");
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        assert!(rt.presenter().capabilities().synchronized_output);
    }

    #[test]
    fn focus_gained_reasserts_modes_and_fires_hook() {
        let mut term = TestBackend::new(10, 3);
        let mut rt = runtime();
        let seen: Arc<AtomicUsize> = Arc::default();
        let hook = seen.clone();
        rt.on_focus_change(Box::new(move |gained| {
            if gained {
                hook.store(1, Ordering::SeqCst);
            }
        }));
        term.push_input(b"\x1b[I");
        let ok = rt.tick(&mut term);
        assert!(ok.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(term.is_mouse_enabled());
        assert!(term.is_focus_enabled());
        assert!(term.is_paste_enabled());
    }

    #[test]
    fn resize_relayouts() {
        let mut term = TestBackend::new(20, 5);
        let mut rt = runtime();
        let root = rt.tree().root();
        let _ = rt
            .tree_mut()
            .add(root, NodeKind::Text(Box::new(TextView::with_text("abc"))));
        let first = rt.tick(&mut term);
        assert!(first.is_ok());
        assert_eq!(
            rt.tree().node(root).map(|n| n.rect().size),
            Some(Size::new(20, 5))
        );

        term.set_size(30, 8);
        let second = rt.tick(&mut term);
        assert!(second.is_ok());
        assert_eq!(
            rt.tree().node(root).map(|n| n.rect().size),
            Some(Size::new(30, 8))
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let mut rt = runtime();
        rt.stop();
        rt.stop();
        assert!(!rt.is_running());
    }

    #[test]
    fn start_and_shutdown_manage_modes() {
        let mut term = TestBackend::new(10, 3);
        let mut rt = runtime();
        let ok = rt.start(&mut term);
        assert!(ok.is_ok());
        assert!(rt.is_running());
        assert!(term.is_raw_mode());
        assert!(term.is_alt_screen());
        // The handshake queries went out.
        assert!(term.output().contains("\x1b[c"));

        let ok = rt.shutdown(&mut term);
        assert!(ok.is_ok());
        assert!(!term.is_raw_mode());
        assert!(!term.is_alt_screen());
        assert!(!term.is_mouse_enabled());
    }

    #[test]
    fn frame_budget_sane() {
        assert_eq!(frame_budget(60), Duration::from_secs_f64(1.0 / 60.0));
        assert_eq!(frame_budget(0), Duration::from_secs(1));
    }
}
