//! Canonical keys for string fragments
//!
//! The table never interprets fragments. It asks each one for its canonical
//! key, which is compared for equality and later written verbatim inside an
//! `<si>` element. Producers of rich text implement `Fragment` themselves.

use std::borrow::Cow;

/// A value reducible to a canonical, already XML-escaped key.
///
/// Implementations must be deterministic: equal fragments yield equal keys.
pub trait Fragment {
    /// Returns the canonical key for this fragment
    fn canonical_key(&self) -> Cow<'_, str>;
}

/// Pre-canonicalized keys pass through untouched.
impl Fragment for str {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Fragment for String {
    fn canonical_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

/// Unformatted text, rendered as a single `<t>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlainText {
    text: String,
}

impl PlainText {
    /// Wraps raw (unescaped) text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the raw text
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Fragment for PlainText {
    fn canonical_key(&self) -> Cow<'_, str> {
        let preserve = self.text.starts_with(char::is_whitespace)
            || self.text.ends_with(char::is_whitespace);

        let mut key = String::with_capacity(self.text.len() + 32);
        if preserve {
            key.push_str(r#"<t xml:space="preserve">"#);
        } else {
            key.push_str("<t>");
        }
        escape_text(&mut key, &self.text);
        key.push_str("</t>");
        Cow::Owned(key)
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
