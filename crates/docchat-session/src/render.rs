//! Message rendering.
//!
//! Two targets share the same citation resolution: HTML for embedding
//! clients and plain text for the terminal front end.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use docchat_core::{defaults, Citation, Error, FileMap, Message, Role};

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

/// How to name a citation whose uri is not in the File Map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CitationFallback {
    /// Last `/`-separated segment of the uri.
    #[default]
    LastPathSegment,
    /// The literal "Unknown File".
    UnknownFile,
}

impl CitationFallback {
    /// Read `DOCCHAT_CITATION_FALLBACK` (`segment` or `unknown`).
    pub fn from_env() -> Self {
        std::env::var("DOCCHAT_CITATION_FALLBACK")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for CitationFallback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "segment" | "last_segment" => Ok(Self::LastPathSegment),
            "unknown" | "unknown_file" => Ok(Self::UnknownFile),
            other => Err(Error::Config(format!(
                "unknown citation fallback '{}' (expected segment or unknown)",
                other
            ))),
        }
    }
}

impl fmt::Display for CitationFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastPathSegment => write!(f, "segment"),
            Self::UnknownFile => write!(f, "unknown"),
        }
    }
}

/// Display name for a citation.
pub fn citation_name(citation: &Citation, files: &FileMap, fallback: CitationFallback) -> String {
    if let Some(name) = files.resolve(&citation.uri) {
        return name.to_string();
    }
    match fallback {
        CitationFallback::LastPathSegment => citation.last_segment().to_string(),
        CitationFallback::UnknownFile => defaults::UNKNOWN_FILE.to_string(),
    }
}

/// `name [start-end]`, or just `name` without a start index.
pub fn citation_label(citation: &Citation, files: &FileMap, fallback: CitationFallback) -> String {
    let name = citation_name(citation, files, fallback);
    match citation.range_label() {
        Some(range) => format!("{} {}", name, range),
        None => name,
    }
}

/// Escape the three characters that would otherwise become markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape, then `**x**` to `<b>x</b>`, then newlines to `<br>`.
pub fn format_html(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = BOLD.replace_all(&escaped, "<b>$1</b>");
    bolded.replace('\n', "<br>")
}

/// Render one message body as HTML, with a Sources block for citations.
pub fn render_html(message: &Message, files: &FileMap, fallback: CitationFallback) -> String {
    let mut html = format_html(&message.text);

    if !message.citations.is_empty() {
        html.push_str(
            r#"<div class="citation-block"><span class="citation-title">Sources:</span><br>"#,
        );
        for citation in &message.citations {
            html.push_str(r#"<span class="citation-item">"#);
            html.push_str(&escape_html(&citation_label(citation, files, fallback)));
            html.push_str("</span>");
        }
        html.push_str("</div>");
    }

    html
}

/// Render one message for a terminal.
///
/// Bold markers are dropped; citations follow as an indented Sources list.
pub fn render_plain(message: &Message, files: &FileMap, fallback: CitationFallback) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Ai => "ai",
    };
    let body = BOLD.replace_all(&message.text, "$1");
    let mut out = format!("{}> {}", speaker, body);

    if !message.citations.is_empty() {
        out.push_str("\n  Sources:");
        for citation in &message.citations {
            out.push_str("\n  - ");
            out.push_str(&citation_label(citation, files, fallback));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::FileRecord;

    fn file_map() -> FileMap {
        FileMap::from_records(&[FileRecord {
            uri: "fileSearchStores/s1/files/abc".to_string(),
            name: "a.txt".to_string(),
        }])
    }

    #[test]
    fn test_escape_before_bold() {
        assert_eq!(
            format_html("**<script>** & more"),
            "<b>&lt;script&gt;</b> &amp; more"
        );
    }

    #[test]
    fn test_bold_is_non_greedy() {
        assert_eq!(format_html("**a** and **b**"), "<b>a</b> and <b>b</b>");
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(format_html("one\ntwo"), "one<br>two");
    }

    #[test]
    fn test_bold_does_not_span_lines() {
        assert_eq!(format_html("**a\nb**"), "**a<br>b**");
    }

    #[test]
    fn test_citation_resolves_through_file_map() {
        let citation = Citation::new("fileSearchStores/s1/files/abc").with_range(10, 20);
        assert_eq!(
            citation_label(&citation, &file_map(), CitationFallback::default()),
            "a.txt [10-20]"
        );
    }

    #[test]
    fn test_citation_fallback_last_segment() {
        let citation = Citation::new("corpora/x/documents/report.pdf");
        assert_eq!(
            citation_name(&citation, &FileMap::default(), CitationFallback::LastPathSegment),
            "report.pdf"
        );
    }

    #[test]
    fn test_citation_fallback_unknown() {
        let citation = Citation::new("corpora/x/documents/report.pdf");
        assert_eq!(
            citation_name(&citation, &FileMap::default(), CitationFallback::UnknownFile),
            "Unknown File"
        );
    }

    #[test]
    fn test_render_html_sources_in_order() {
        let message = Message::ai("See **this**").with_citations(vec![
            Citation::new("fileSearchStores/s1/files/abc").with_range(10, 20),
            Citation::new("x/y/b.md"),
        ]);
        let html = render_html(&message, &file_map(), CitationFallback::default());
        assert_eq!(
            html,
            "See <b>this</b><div class=\"citation-block\"><span class=\"citation-title\">Sources:</span><br>\
             <span class=\"citation-item\">a.txt [10-20]</span>\
             <span class=\"citation-item\">b.md</span></div>"
        );
    }

    #[test]
    fn test_render_html_without_citations_has_no_sources() {
        let html = render_html(&Message::ai("plain"), &file_map(), CitationFallback::default());
        assert!(!html.contains("Sources"));
    }

    #[test]
    fn test_render_plain() {
        let message = Message::ai("**Yes**.")
            .with_citations(vec![Citation::new("fileSearchStores/s1/files/abc").with_range(1, 2)]);
        let text = render_plain(&message, &file_map(), CitationFallback::default());
        assert_eq!(text, "ai> Yes.\n  Sources:\n  - a.txt [1-2]");
    }

    #[test]
    fn test_fallback_parse() {
        assert_eq!("unknown".parse::<CitationFallback>().unwrap(), CitationFallback::UnknownFile);
        assert_eq!("Segment".parse::<CitationFallback>().unwrap(), CitationFallback::LastPathSegment);
        assert!("other".parse::<CitationFallback>().is_err());
    }
}
