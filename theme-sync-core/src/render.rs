//! Markdown documentation → standalone HTML.

use std::fs;
use std::path::Path;

use pulldown_cmark::{html, Options, Parser};
use tracing::{debug, warn};

use crate::contract::MarkdownRenderer;
use crate::error::RenderError;

/// Renders GitHub-flavoured markdown into a styled HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDocumentRenderer;

impl HtmlDocumentRenderer {
    /// Markdown body only, without the surrounding document.
    pub fn render_body(markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(markdown, options);
        let mut body = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut body, parser);
        debug!(
            markdown_len = markdown.len(),
            html_len = body.len(),
            "Rendered markdown"
        );
        body
    }
}

impl MarkdownRenderer for HtmlDocumentRenderer {
    fn render(
        &self,
        markdown: &str,
        title: &str,
        dark_mode: bool,
        base_path: &Path,
    ) -> Result<String, RenderError> {
        let body = Self::render_body(markdown);
        Ok(html_document(&body, title, dark_mode, base_path))
    }
}

/// Read a markdown file and render it with `renderer`.
pub fn render_file(
    renderer: &dyn MarkdownRenderer,
    markdown_file: &Path,
    title: &str,
    dark_mode: bool,
) -> Result<String, RenderError> {
    let markdown = fs::read_to_string(markdown_file).map_err(|e| {
        warn!(error = ?e, path = %markdown_file.display(), "Failed to read markdown file");
        RenderError::Read {
            path: markdown_file.to_path_buf(),
            source: e,
        }
    })?;
    let base = markdown_file.parent().unwrap_or_else(|| Path::new("."));
    renderer.render(&markdown, title, dark_mode, base)
}

fn html_document(body: &str, title: &str, dark_mode: bool, base_path: &Path) -> String {
    let base_href = format!("file://{}/", base_path.display());
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<base href=\"{base}\">\n<title>{title}</title>\n<style>{css}</style>\n</head>\n\
<body>\n<div class=\"markdown-body\">\n{body}</div>\n</body>\n</html>\n",
        base = escape_html(&base_href),
        title = escape_html(title),
        css = stylesheet(dark_mode),
        body = body,
    )
}

fn stylesheet(dark_mode: bool) -> String {
    let (fg, bg, heading, border, link, code_bg, muted) = if dark_mode {
        ("#e6edf3", "#0d1117", "#f0f6fc", "#21262d", "#58a6ff", "#161b22", "#8b949e")
    } else {
        ("#24292f", "#ffffff", "#24292f", "#d1d9e0", "#0969da", "#f6f8fa", "#656d76")
    };
    format!(
        ".markdown-body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Helvetica,Arial,sans-serif;\
font-size:14px;line-height:1.5;color:{fg};background-color:{bg};padding:16px;box-sizing:border-box}}\
.markdown-body h1,.markdown-body h2,.markdown-body h3,.markdown-body h4,.markdown-body h5,.markdown-body h6\
{{color:{heading};border-bottom:1px solid {border};padding-bottom:.3em;margin:24px 0 16px}}\
.markdown-body a{{color:{link};text-decoration:none}}\
.markdown-body code,.markdown-body pre{{background-color:{code_bg};border-radius:4px}}\
.markdown-body pre{{padding:16px;overflow:auto}}\
.markdown-body blockquote{{border-left:4px solid {border};padding-left:16px;margin-left:0;color:{muted}}}\
.markdown-body table{{border-collapse:collapse;width:100%}}\
.markdown-body th,.markdown-body td{{border:1px solid {border};padding:8px 12px;text-align:left}}"
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_gfm_body() {
        let body = HtmlDocumentRenderer::render_body("# Neon\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n");
        assert!(body.contains("<h1>Neon</h1>"));
        assert!(body.contains("<table>"));
        assert!(body.contains("<del>old</del>"));
    }

    #[test]
    fn empty_markdown_renders_empty_body() {
        assert_eq!(HtmlDocumentRenderer::render_body("  \n"), "");
    }

    #[test]
    fn document_carries_title_theme_and_base() {
        let html = HtmlDocumentRenderer
            .render("hello", "A <b> theme", true, Path::new("/providers/acme/docs"))
            .unwrap();
        assert!(html.contains("<title>A &lt;b&gt; theme</title>"));
        assert!(html.contains("#0d1117"));
        assert!(html.contains("<base href=\"file:///providers/acme/docs/\">"));
        assert!(html.contains("<p>hello</p>"));

        let light = HtmlDocumentRenderer
            .render("hello", "t", false, Path::new("/x"))
            .unwrap();
        assert!(light.contains("#ffffff"));
    }
}
