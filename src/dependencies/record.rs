//! Individual JS/CSS dependencies and their HTML form

use std::collections::BTreeMap;

use thiserror::Error;

use crate::component::ClassId;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("inline {kind} of component '{component}' contains a literal '{needle}'")]
    UnsafeContent {
        component: String,
        kind: &'static str,
        needle: &'static str,
    },

    #[error("no cached {kind} variables for class '{class_id}' with hash '{hash}'")]
    UnknownInstanceVars {
        class_id: String,
        kind: &'static str,
        hash: String,
    },

    #[error("{kind} variables of class '{class_id}' collide with different data under hash '{hash}'")]
    HashCollision {
        class_id: String,
        kind: &'static str,
        hash: String,
    },

    #[error("failed to serialize dependency data: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    InlineScript,
    InlineStyle,
    ExternalScript,
    ExternalStyle,
}

impl DependencyKind {
    pub fn is_script(&self) -> bool {
        matches!(self, DependencyKind::InlineScript | DependencyKind::ExternalScript)
    }
}

/// Identity of a record for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Url(String),
    Inline(ClassId, DependencyKind, String),
}

/// One JS or CSS asset
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRecord {
    pub kind: DependencyKind,
    /// Inline content, or the resolved url for external assets
    pub content: String,
    pub owner: ClassId,
    pub content_hash: Option<String>,
    pub attrs: BTreeMap<String, String>,
}

impl DependencyRecord {
    pub fn external(kind: DependencyKind, url: String, owner: ClassId) -> Self {
        Self {
            kind,
            content: url,
            owner,
            content_hash: None,
            attrs: BTreeMap::new(),
        }
    }

    pub fn inline(kind: DependencyKind, content: String, owner: ClassId, hash: String) -> Self {
        Self {
            kind,
            content,
            owner,
            content_hash: Some(hash),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn dedup_key(&self) -> DedupKey {
        match self.kind {
            DependencyKind::ExternalScript | DependencyKind::ExternalStyle => {
                DedupKey::Url(self.content.clone())
            }
            DependencyKind::InlineScript | DependencyKind::InlineStyle => DedupKey::Inline(
                self.owner.clone(),
                self.kind,
                self.content_hash.clone().unwrap_or_default(),
            ),
        }
    }

    /// The tag that loads or embeds this asset
    pub fn to_html(&self) -> Result<String, DependencyError> {
        let attrs = render_attrs(&self.attrs);
        let html = match self.kind {
            DependencyKind::ExternalScript => {
                format!(r#"<script src="{}"{}></script>"#, escape_attr(&self.content), attrs)
            }
            DependencyKind::ExternalStyle => format!(
                r#"<link href="{}"{} rel="stylesheet">"#,
                escape_attr(&self.content),
                attrs
            ),
            DependencyKind::InlineScript => {
                check_content(&self.content, "script", self.owner.as_str())?;
                format!("<script{}>{}</script>", attrs, self.content)
            }
            DependencyKind::InlineStyle => {
                check_content(&self.content, "style", self.owner.as_str())?;
                format!("<style{}>{}</style>", attrs, self.content)
            }
        };
        Ok(html)
    }
}

/// Inline content must not close its own tag
pub fn check_content(content: &str, kind: &'static str, component: &str) -> Result<(), DependencyError> {
    let needle = match kind {
        "script" => "</script",
        _ => "</style",
    };
    let bytes = needle.as_bytes();
    let unsafe_found = content
        .as_bytes()
        .windows(bytes.len())
        .any(|w| w.eq_ignore_ascii_case(bytes));
    if unsafe_found {
        return Err(DependencyError::UnsafeContent {
            component: component.to_string(),
            kind,
            needle,
        });
    }
    Ok(())
}

fn render_attrs(attrs: &BTreeMap<String, String>) -> String {
    attrs
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                format!(" {}", k)
            } else {
                format!(r#" {}="{}""#, k, escape_attr(v))
            }
        })
        .collect()
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ClassId {
        ClassId::derive("record::tests", "Owner")
    }

    #[test]
    fn test_external_style_with_media() {
        let record = DependencyRecord::external(
            DependencyKind::ExternalStyle,
            "/static/print.css".to_string(),
            owner(),
        )
        .with_attr("media", "print");
        assert_eq!(
            record.to_html().unwrap(),
            r#"<link href="/static/print.css" media="print" rel="stylesheet">"#
        );
    }

    #[test]
    fn test_inline_script_with_closing_tag_is_rejected() {
        let record = DependencyRecord::inline(
            DependencyKind::InlineScript,
            "document.write('</SCRIPT>')".to_string(),
            owner(),
            "abc123".to_string(),
        );
        assert!(matches!(
            record.to_html(),
            Err(DependencyError::UnsafeContent { kind: "script", .. })
        ));
    }

    #[test]
    fn test_style_may_mention_script_end_tag() {
        let record = DependencyRecord::inline(
            DependencyKind::InlineStyle,
            "/* </script> */ .x { color: red; }".to_string(),
            owner(),
            "abc123".to_string(),
        );
        assert!(record.to_html().is_ok());
    }

    #[test]
    fn test_dedup_keys() {
        let a = DependencyRecord::external(DependencyKind::ExternalScript, "a.js".into(), owner());
        let b = DependencyRecord::external(
            DependencyKind::ExternalScript,
            "a.js".into(),
            ClassId::derive("record::tests", "Other"),
        );
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_boolean_attribute() {
        let record = DependencyRecord::inline(
            DependencyKind::InlineScript,
            "1".to_string(),
            owner(),
            "h".to_string(),
        )
        .with_attr("data-cw-loader", "");
        assert_eq!(record.to_html().unwrap(), "<script data-cw-loader>1</script>");
    }
}
