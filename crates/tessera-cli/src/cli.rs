//! CLI argument parsing for the tessera demo binary.

use clap::{Parser, ValueEnum};

/// How East Asian ambiguous-width characters are measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AmbiguousWidth {
    /// One column (the common terminal default).
    Narrow,
    /// Two columns (CJK legacy environments).
    Wide,
}

/// tessera - terminal renderer demo.
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about)]
pub struct Cli {
    /// Target frames per second.
    #[arg(long, default_value = "60")]
    pub fps: u32,

    /// Render on the main screen instead of the alternate screen.
    #[arg(long)]
    pub no_alt_screen: bool,

    /// How East Asian ambiguous-width characters are measured.
    #[arg(long, value_enum, default_value = "narrow")]
    pub east_asian_ambiguous: AmbiguousWidth,

    /// Do not capture mouse input.
    #[arg(long)]
    pub no_mouse: bool,

    /// Never emit OSC 8 hyperlinks.
    #[arg(long)]
    pub no_hyperlink: bool,

    /// Append logs to this file instead of disabling them.
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["tessera"]);
        assert_eq!(cli.fps, 60);
        assert!(!cli.no_alt_screen);
        assert_eq!(cli.east_asian_ambiguous, AmbiguousWidth::Narrow);
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "tessera",
            "--fps",
            "30",
            "--no-alt-screen",
            "--east-asian-ambiguous",
            "wide",
            "--no-mouse",
            "--no-hyperlink",
        ]);
        assert_eq!(cli.fps, 30);
        assert!(cli.no_alt_screen);
        assert_eq!(cli.east_asian_ambiguous, AmbiguousWidth::Wide);
        assert!(cli.no_mouse);
        assert!(cli.no_hyperlink);
    }
}
