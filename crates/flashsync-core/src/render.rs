//! Field rendering from Markdown to the HTML the store displays.

use pulldown_cmark::{html, Options, Parser};

/// Turns raw field markup into HTML.
///
/// Rendering never fails: markup that produces nothing yields an empty string,
/// which callers treat as "no content".
pub trait FieldRenderer {
    fn render(&self, markup: &str) -> String;
}

/// CommonMark renderer with tables and strikethrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl FieldRenderer for MarkdownRenderer {
    fn render(&self, markup: &str) -> String {
        if markup.trim().is_empty() {
            return String::new();
        }
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut output = String::with_capacity(markup.len() * 3 / 2);
        html::push_html(&mut output, Parser::new_ext(markup, options));
        unwrap_paragraph(output.trim()).to_string()
    }
}

// A lone paragraph is shown without its `<p>` wrapper.
fn unwrap_paragraph(html: &str) -> &str {
    match html
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => html,
    }
}
