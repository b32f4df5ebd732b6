//! Styled text chunks and the named style registry.
//!
//! A [`TextStyle`] is the style atom applied to runs of text; a
//! [`Chunk`] pairs text with its style. The [`StyleRegistry`] maps
//! syntax capture names (`keyword.import`, `string.special`, ...) to
//! style atoms with longest-dot-prefix fallback.

use crate::attr::Attributes;
use crate::color::Rgba;
use std::collections::HashMap;

/// Style atom: optional colors plus an attribute set.
///
/// `None` colors inherit whatever is underneath when rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextStyle {
    /// Foreground color.
    pub fg: Option<Rgba>,
    /// Background color.
    pub bg: Option<Rgba>,
    /// Text attributes.
    pub attrs: Attributes,
}

impl TextStyle {
    /// Create an empty style.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the foreground color.
    #[must_use]
    pub fn fg(mut self, color: Rgba) -> Self {
        self.fg = Some(color);
        self
    }

    /// Set the background color.
    #[must_use]
    pub fn bg(mut self, color: Rgba) -> Self {
        self.bg = Some(color);
        self
    }

    /// Add attributes.
    #[must_use]
    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs |= attrs;
        self
    }

    /// Merge another style on top; the overlay's set values win.
    #[must_use]
    pub fn merge(&self, over: &TextStyle) -> TextStyle {
        TextStyle {
            fg: over.fg.or(self.fg),
            bg: over.bg.or(self.bg),
            attrs: if over.attrs.is_empty() {
                self.attrs
            } else {
                over.attrs
            },
        }
    }

    /// Returns true if no colors or attributes are set.
    pub fn is_empty(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.attrs.is_empty()
    }
}

/// A run of text with one style and an optional hyperlink.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    /// The text content.
    pub text: String,
    /// The style applied to the run.
    pub style: TextStyle,
    /// Hyperlink URL attached to the run.
    pub link: Option<String>,
}

impl Chunk {
    /// Create an unstyled chunk.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
            link: None,
        }
    }

    /// Create a styled chunk.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            link: None,
        }
    }

    /// Attach a hyperlink.
    #[must_use]
    pub fn link(mut self, url: impl Into<String>) -> Self {
        self.link = Some(url.into());
        self
    }

    /// Returns true if the chunk has no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Stable identifier of a registered style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(pub u16);

impl StyleId {
    /// The always-present default style.
    pub const DEFAULT: Self = Self(0);
}

/// Registry mapping capture names to style atoms.
///
/// Lookup walks dot-separated scopes from most to least specific:
/// `keyword.import` falls back to `keyword`, then to the default entry.
/// Ids are assigned in registration order and never change.
#[derive(Clone, Debug)]
pub struct StyleRegistry {
    styles: Vec<TextStyle>,
    by_name: HashMap<String, StyleId>,
}

impl StyleRegistry {
    /// Create a registry containing only the default style.
    pub fn new(default: TextStyle) -> Self {
        Self {
            styles: vec![default],
            by_name: HashMap::new(),
        }
    }

    /// Register a style under a capture name, returning its stable id.
    /// Re-registering a name updates the style in place and keeps the id.
    pub fn register(&mut self, name: impl Into<String>, style: TextStyle) -> StyleId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            self.styles[usize::from(id.0)] = style;
            return *id;
        }
        let id = StyleId(self.styles.len() as u16);
        self.styles.push(style);
        self.by_name.insert(name, id);
        id
    }

    /// Resolve a capture name via longest-dot-prefix lookup.
    ///
    /// Always succeeds; unmatched names resolve to [`StyleId::DEFAULT`].
    pub fn resolve(&self, name: &str) -> StyleId {
        let mut scope = name;
        loop {
            if let Some(id) = self.by_name.get(scope) {
                return *id;
            }
            match scope.rfind('.') {
                Some(dot) => scope = &scope[..dot],
                None => return StyleId::DEFAULT,
            }
        }
    }

    /// The style atom for an id. Unknown ids yield the default style.
    pub fn style(&self, id: StyleId) -> TextStyle {
        self.styles
            .get(usize::from(id.0))
            .copied()
            .unwrap_or(self.styles[0])
    }

    /// The number of registered styles, including the default.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Always false; the default entry is always present.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new(TextStyle::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_builder() {
        let s = TextStyle::new()
            .fg(Rgba::rgb(1.0, 0.0, 0.0))
            .attrs(Attributes::BOLD);
        assert_eq!(s.fg, Some(Rgba::rgb(1.0, 0.0, 0.0)));
        assert!(s.attrs.contains(Attributes::BOLD));
        assert!(s.bg.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = TextStyle::new()
            .fg(Rgba::rgb(1.0, 0.0, 0.0))
            .attrs(Attributes::ITALIC);
        let over = TextStyle::new().fg(Rgba::rgb(0.0, 1.0, 0.0));
        let merged = base.merge(&over);
        assert_eq!(merged.fg, Some(Rgba::rgb(0.0, 1.0, 0.0)));
        // Overlay has no attrs set, base attrs survive.
        assert!(merged.attrs.contains(Attributes::ITALIC));
    }

    #[test]
    fn chunk_link() {
        let c = Chunk::new("docs").link("https://example.com");
        assert_eq!(c.link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn registry_default_is_id_zero() {
        let reg = StyleRegistry::default();
        assert_eq!(reg.resolve("anything"), StyleId::DEFAULT);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registry_stable_ids() {
        let mut reg = StyleRegistry::default();
        let kw = reg.register("keyword", TextStyle::new().attrs(Attributes::BOLD));
        let st = reg.register("string", TextStyle::new());
        assert_ne!(kw, st);
        // Re-registering keeps the id.
        let kw2 = reg.register("keyword", TextStyle::new().attrs(Attributes::ITALIC));
        assert_eq!(kw, kw2);
        assert!(reg.style(kw).attrs.contains(Attributes::ITALIC));
    }

    #[test]
    fn longest_prefix_lookup() {
        let mut reg = StyleRegistry::default();
        let kw = reg.register("keyword", TextStyle::new().attrs(Attributes::BOLD));
        let kwi = reg.register("keyword.import", TextStyle::new().attrs(Attributes::UNDERLINE));
        assert_eq!(reg.resolve("keyword.import"), kwi);
        assert_eq!(reg.resolve("keyword.operator"), kw);
        assert_eq!(reg.resolve("keyword.import.special"), kwi);
        assert_eq!(reg.resolve("comment"), StyleId::DEFAULT);
    }

    #[test]
    fn unknown_id_falls_back_to_default() {
        let reg = StyleRegistry::new(TextStyle::new().attrs(Attributes::DIM));
        let s = reg.style(StyleId(99));
        assert!(s.attrs.contains(Attributes::DIM));
    }
}
