//! Sentinels left in intermediate HTML for the finalize pass
//!
//! - `<link name="CSS_PLACEHOLDER">` and `<script name="JS_PLACEHOLDER"></script>`
//!   mark where collected CSS and JS should go.
//! - `<!-- _RENDERED class_id,render_id,js_hash,css_hash -->` precedes the markup of
//!   every rendered component and tells finalize which assets that component needs.

use std::fmt;

pub const CSS_PLACEHOLDER_NAME: &str = "CSS_PLACEHOLDER";
pub const JS_PLACEHOLDER_NAME: &str = "JS_PLACEHOLDER";

const MARKER_OPEN: &str = "<!-- _RENDERED ";
const MARKER_CLOSE: &str = " -->";

pub fn css_placeholder() -> String {
    format!(r#"<link name="{}">"#, CSS_PLACEHOLDER_NAME)
}

pub fn js_placeholder() -> String {
    format!(r#"<script name="{}"></script>"#, JS_PLACEHOLDER_NAME)
}

/// Remove every CSS/JS placeholder
pub fn strip_placeholders(html: &str) -> String {
    html.replace(&css_placeholder(), "")
        .replace(&js_placeholder(), "")
}

/// The `_RENDERED` comment of one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMarker {
    pub class_id: String,
    pub render_id: String,
    pub js_hash: Option<String>,
    pub css_hash: Option<String>,
}

impl RenderedMarker {
    fn parse(body: &str) -> Option<Self> {
        let mut fields = body.split(',');
        let class_id = fields.next()?.trim();
        let render_id = fields.next()?.trim();
        let js_hash = fields.next()?.trim();
        let css_hash = fields.next()?.trim();
        if fields.next().is_some() || class_id.is_empty() || render_id.is_empty() {
            return None;
        }
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Some(RenderedMarker {
            class_id: class_id.to_string(),
            render_id: render_id.to_string(),
            js_hash: optional(js_hash),
            css_hash: optional(css_hash),
        })
    }
}

impl fmt::Display for RenderedMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{},{},{}{}",
            MARKER_OPEN,
            self.class_id,
            self.render_id,
            self.js_hash.as_deref().unwrap_or(""),
            self.css_hash.as_deref().unwrap_or(""),
            MARKER_CLOSE
        )
    }
}

/// All well-formed markers in document order
pub fn extract_markers(html: &str) -> Vec<RenderedMarker> {
    let mut markers = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(MARKER_OPEN) {
        let body_start = start + MARKER_OPEN.len();
        let Some(len) = rest[body_start..].find(MARKER_CLOSE) else {
            break;
        };
        if let Some(marker) = RenderedMarker::parse(&rest[body_start..body_start + len]) {
            markers.push(marker);
        }
        rest = &rest[body_start + len + MARKER_CLOSE.len()..];
    }
    markers
}

/// Remove every `_RENDERED` comment
pub fn strip_markers(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(MARKER_OPEN) {
        let body_start = start + MARKER_OPEN.len();
        let Some(len) = rest[body_start..].find(MARKER_CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[body_start + len + MARKER_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(js: Option<&str>, css: Option<&str>) -> RenderedMarker {
        RenderedMarker {
            class_id: "Card_1a2b3c".to_string(),
            render_id: "cAbC123".to_string(),
            js_hash: js.map(str::to_string),
            css_hash: css.map(str::to_string),
        }
    }

    #[test]
    fn test_marker_format() {
        assert_eq!(
            marker(None, Some("ff00aa")).to_string(),
            "<!-- _RENDERED Card_1a2b3c,cAbC123,,ff00aa -->"
        );
    }

    #[test]
    fn test_extract_in_order() {
        let first = marker(Some("111111"), None);
        let second = marker(None, None);
        let html = format!("{}<div>{}<p></p></div>", first, second);
        assert_eq!(extract_markers(&html), vec![first, second]);
    }

    #[test]
    fn test_malformed_markers_skipped() {
        let html = "<!-- _RENDERED only-one-field --><!-- regular comment -->";
        assert!(extract_markers(html).is_empty());
    }

    #[test]
    fn test_strip() {
        let html = format!(
            "{}<div>{}x</div>{}",
            css_placeholder(),
            marker(None, None),
            js_placeholder()
        );
        assert_eq!(strip_placeholders(&strip_markers(&html)), "<div>x</div>");
    }
}
