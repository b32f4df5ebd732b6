//! tessera-cli: thin demo entry point for the tessera renderer.
//!
//! Builds a small scene (a titled box, a wrapped text pane, and an
//! editable line) and drives it with the frame loop until `q` or Ctrl-C.
//! The terminal is restored on every exit path, panics included.

mod cli;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use tessera_core::{
    Attributes, BorderStyle, BoxVisual, CrosstermBackend, Dimension, EastAsianWidth, FlexDirection,
    KeyCode, Modifiers, ModeOptions, NodeKind, Rgba, Runtime, RuntimeOptions, TextStyle, TextView,
};

use cli::{AmbiguousWidth, Cli};

fn main() -> ExitCode {
    let args = Cli::parse_args();
    init_logging(&args);

    // The renderer owns the terminal; panics must not leave it raw. The
    // backend restores all modes on drop, so unwind through it and map
    // the panic to the failure exit code.
    let result = catch_unwind(AssertUnwindSafe(|| run(&args)));
    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("tessera: {e}");
            ExitCode::FAILURE
        }
        Err(_) => ExitCode::FAILURE,
    }
}

fn init_logging(args: &Cli) {
    let Some(path) = &args.log_file else {
        // Logging to the tty we render on would corrupt the frame.
        return;
    };
    let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .try_init();
}

fn run(args: &Cli) -> anyhow::Result<()> {
    let options = RuntimeOptions {
        target_fps: args.fps,
        background: Rgba::from_srgb(24, 24, 32),
        modes: ModeOptions {
            alt_screen: !args.no_alt_screen,
            mouse: !args.no_mouse,
            focus: true,
            bracketed_paste: true,
        },
        east_asian: match args.east_asian_ambiguous {
            AmbiguousWidth::Narrow => EastAsianWidth::Narrow,
            AmbiguousWidth::Wide => EastAsianWidth::Wide,
        },
        hyperlinks: !args.no_hyperlink,
    };

    let mut runtime = Runtime::new(options);
    build_demo_scene(&mut runtime, args)?;

    let stop = runtime.stop_handle();
    runtime.on_key(Box::new(move |key| {
        let quit = key.code == KeyCode::Char('q') && key.modifiers == Modifiers::NONE
            || key.code == KeyCode::Char('c') && key.modifiers.contains(Modifiers::CTRL);
        if quit {
            stop.stop();
        }
        quit
    }));

    let mut term = CrosstermBackend::new();
    runtime.run(&mut term)?;
    Ok(())
}

fn build_demo_scene(runtime: &mut Runtime, args: &Cli) -> anyhow::Result<()> {
    let tree = runtime.tree_mut();
    let root = tree.root();
    if let Some(node) = tree.node_mut(root) {
        node.style.direction = FlexDirection::Column;
        node.style.padding = tessera_core::Edges::all(1);
        node.style.gap = 1;
    }

    let frame = tree
        .add(
            root,
            NodeKind::Box(BoxVisual {
                border: Some(BorderStyle::Rounded),
                border_color: Rgba::from_srgb(137, 180, 250),
                background: Some(Rgba::from_srgb(30, 30, 46)),
                title: Some("tessera".into()),
            }),
        )
        .ok_or_else(|| anyhow::anyhow!("scene root missing"))?;
    if let Some(node) = tree.node_mut(frame) {
        node.style.flex_grow = 1.0;
        node.style.padding = tessera_core::Edges::all(1);
    }

    let mut view = TextView::with_text(
        "Welcome to the tessera renderer demo.\n\n\
         Resize the terminal to watch the flexbox layout reflow, drag \
         with the mouse to select text, and scroll with the wheel. \
         Wide glyphs such as 世界 and emoji stay aligned because the \
         cell buffer tracks their double width.\n\n\
         Press q or Ctrl-C to quit.",
    );
    view.buffer
        .set_east_asian_width(match args.east_asian_ambiguous {
            AmbiguousWidth::Narrow => EastAsianWidth::Narrow,
            AmbiguousWidth::Wide => EastAsianWidth::Wide,
        });
    let text = tree
        .add(frame, NodeKind::Text(Box::new(view)))
        .ok_or_else(|| anyhow::anyhow!("frame node missing"))?;
    if let Some(node) = tree.node_mut(text) {
        node.style.flex_grow = 1.0;
    }

    let mut editor = TextView::with_text("type here");
    editor.editable = true;
    editor.cursor = Some((0, 0));
    editor.default_style = TextStyle::new()
        .fg(Rgba::from_srgb(166, 227, 161))
        .attrs(Attributes::empty());
    let editor_id = tree
        .add(frame, NodeKind::Text(Box::new(editor)))
        .ok_or_else(|| anyhow::anyhow!("frame node missing"))?;
    if let Some(node) = tree.node_mut(editor_id) {
        node.style.height = Dimension::Cells(1);
    }
    tree.set_focus(Some(editor_id));
    Ok(())
}
