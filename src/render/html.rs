//! Minimal HTML scanning: child placeholders and root-element attributes

use crate::dependencies::markers::{CSS_PLACEHOLDER_NAME, JS_PLACEHOLDER_NAME};
use crate::render::RenderId;

/// Attribute carried by the placeholder a parent leaves for a child's markup
pub const CHILD_PLACEHOLDER_ATTR: &str = "data-cw-render";

/// Attribute prefix marking the root elements of one render
pub const RENDER_ID_ATTR_PREFIX: &str = "data-cw-id-";

/// Attribute prefix scoping a render's per-instance CSS variables
pub const CSS_HASH_ATTR_PREFIX: &str = "data-cw-css-";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Placeholder marking where a child's finished markup goes
pub fn child_placeholder(id: &RenderId) -> String {
    format!(
        r#"<template {}="{}"></template>"#,
        CHILD_PLACEHOLDER_ATTR, id
    )
}

/// Piece of a component's intermediate markup
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Html(String),
    Child(RenderId),
}

/// Split markup on child placeholders, keeping document order
pub fn split_placeholders(html: &str) -> Vec<Segment> {
    let open = format!(r#"<template {}=""#, CHILD_PLACEHOLDER_ATTR);
    let close = r#""></template>"#;

    let mut segments = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        let Some(id) = RenderId::parse(&after_open[..end]) else {
            segments.push(Segment::Html(rest[..start + open.len()].to_string()));
            rest = after_open;
            continue;
        };
        if start > 0 {
            segments.push(Segment::Html(rest[..start].to_string()));
        }
        segments.push(Segment::Child(id));
        rest = &after_open[end + close.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Html(rest.to_string()));
    }
    segments
}

/// Add boolean attributes to every top-level element of `html`
///
/// Text, comments, doctype and the dependency placeholder tags are left alone.
/// Contents of `<script>` and `<style>` are treated as raw text.
pub fn set_root_attributes(html: &str, attrs: &[String]) -> String {
    if attrs.is_empty() {
        return html.to_string();
    }
    let insertion: String = attrs.iter().map(|a| format!(" {}", a)).collect();

    let len = html.len();
    let mut out = String::with_capacity(len + insertion.len() * 2);
    let mut depth = 0usize;
    let mut i = 0;

    while i < len {
        let Some(rel) = html[i..].find('<') else {
            out.push_str(&html[i..]);
            break;
        };
        let lt = i + rel;
        out.push_str(&html[i..lt]);
        let rest = &html[lt..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(len, |e| lt + e + 3);
            out.push_str(&html[lt..end]);
            i = end;
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map_or(len, |e| lt + e + 1);
            out.push_str(&html[lt..end]);
            i = end;
            continue;
        }
        if rest.starts_with("</") {
            let end = rest.find('>').map_or(len, |e| lt + e + 1);
            out.push_str(&html[lt..end]);
            depth = depth.saturating_sub(1);
            i = end;
            continue;
        }

        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')))
            .unwrap_or(rest.len() - 1);
        let is_tag = rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            && rest[1 + name_len..]
                .chars()
                .next()
                .map_or(true, |c| c.is_ascii_whitespace() || c == '>' || c == '/');
        if !is_tag {
            // A lone '<' in text
            out.push('<');
            i = lt + 1;
            continue;
        }
        let name = rest[1..1 + name_len].to_ascii_lowercase();

        let Some(gt) = find_tag_end(html, lt) else {
            out.push_str(rest);
            break;
        };
        let tag = &html[lt..=gt];
        let self_closing = tag.ends_with("/>");

        if depth == 0 && !is_dependency_placeholder(tag) {
            let insert_at = if self_closing { gt - 1 } else { gt };
            out.push_str(html[lt..insert_at].trim_end());
            out.push_str(&insertion);
            out.push_str(&html[insert_at..=gt]);
        } else {
            out.push_str(tag);
        }
        i = gt + 1;

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            continue;
        }
        depth += 1;

        if name == "script" || name == "style" {
            let closing = format!("</{}", name);
            let body_end = find_ignore_case(&html[i..], &closing).map_or(len, |e| i + e);
            out.push_str(&html[i..body_end]);
            i = body_end;
        }
    }

    out
}

/// Index of the `>` closing the tag opened at `lt`, skipping quoted attribute values
fn find_tag_end(html: &str, lt: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (offset, &b) in html.as_bytes()[lt + 1..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(lt + 1 + offset),
            None => {}
        }
    }
    None
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn is_dependency_placeholder(tag: &str) -> bool {
    tag.contains(&format!(r#"name="{}""#, CSS_PLACEHOLDER_NAME))
        || tag.contains(&format!(r#"name="{}""#, JS_PLACEHOLDER_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_top_level_elements_only() {
        let html = "<div class=\"a\"><span>x</span></div>\n<p>y</p>";
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            "<div class=\"a\" data-x><span>x</span></div>\n<p data-x>y</p>"
        );
    }

    #[test]
    fn test_void_and_self_closing() {
        let html = "<img src=\"a.png\"><br/><div></div>";
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            "<img src=\"a.png\" data-x><br data-x/><div data-x></div>"
        );
    }

    #[test]
    fn test_skips_comments_doctype_and_text() {
        let html = "<!DOCTYPE html><!-- <p> -->text<html></html>";
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            "<!DOCTYPE html><!-- <p> -->text<html data-x></html>"
        );
    }

    #[test]
    fn test_script_body_is_raw_text() {
        let html = "<script>if (a < b) { x = '<div>'; }</script><p></p>";
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            "<script data-x>if (a < b) { x = '<div>'; }</script><p data-x></p>"
        );
    }

    #[test]
    fn test_angle_brackets_in_prose_are_text() {
        let html = "Option<T,E> or a<b.c <em>x</em>";
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            "Option<T,E> or a<b.c <em data-x>x</em>"
        );
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let html = r#"<a title="1 > 0">x</a>"#;
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x", "data-y"])),
            r#"<a title="1 > 0" data-x data-y>x</a>"#
        );
    }

    #[test]
    fn test_dependency_placeholders_untouched() {
        let html = r#"<link name="CSS_PLACEHOLDER"><div></div>"#;
        assert_eq!(
            set_root_attributes(html, &attrs(&["data-x"])),
            r#"<link name="CSS_PLACEHOLDER"><div data-x></div>"#
        );
    }

    #[test]
    fn test_split_placeholders() {
        let a = RenderId::parse("cAAAAAA").unwrap();
        let b = RenderId::parse("cBBBBBB").unwrap();
        let html = format!("<ul>{}<li/>{}</ul>", child_placeholder(&a), child_placeholder(&b));
        assert_eq!(
            split_placeholders(&html),
            vec![
                Segment::Html("<ul>".to_string()),
                Segment::Child(a),
                Segment::Html("<li/>".to_string()),
                Segment::Child(b),
                Segment::Html("</ul>".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_without_placeholders() {
        assert_eq!(
            split_placeholders("<p>plain</p>"),
            vec![Segment::Html("<p>plain</p>".to_string())]
        );
    }
}
