//! Collects JS/CSS from rendered markup and places it according to a strategy

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::component::{identity, ClassId, ComponentClass};
use crate::render::html::CSS_HASH_ATTR_PREFIX;
use crate::value::Bindings;
use crate::RenderError;

use super::cache::{content_hash, AssetKind, ClassAssets, InstanceVarsCache};
use super::markers::{self, css_placeholder, js_placeholder};
use super::record::{DedupKey, DependencyError, DependencyKind, DependencyRecord};
use super::{AssetResolver, DependencyStrategy};

/// Attribute marking the client-side loader script
pub const LOADER_ATTR: &str = "data-cw-loader";

/// Attribute of the script appended after a fragment manifest
pub const BOOTSTRAP_ATTR: &str = "data-cw-bootstrap";

/// Runs the page-level loader, if one exists, when a fragment is parsed as
/// part of a document. Fragments inserted through `innerHTML` are picked up
/// by the loader's mutation observer instead.
const FRAGMENT_BOOTSTRAP: &str =
    "window.ComponentWeave && window.ComponentWeave.scan(document);";

/// Client-side runtime: records per-instance JS variables, dispatches a
/// `cw:render` event per component call, and loads fragment manifests,
/// including ones added to the document after load.
pub const LOADER_JS: &str = r#"(function () {
  var cw = window.ComponentWeave = window.ComponentWeave || { vars: {}, loaded: {} };
  function json(el) { try { return JSON.parse(el.textContent); } catch (e) { return null; } }
  function insert(html, target) {
    if (cw.loaded[html]) { return; }
    cw.loaded[html] = true;
    var tpl = document.createElement("template");
    tpl.innerHTML = html;
    Array.prototype.forEach.call(tpl.content.childNodes, function (node) {
      if (node.nodeName === "SCRIPT") {
        var s = document.createElement("script");
        Array.prototype.forEach.call(node.attributes, function (a) { s.setAttribute(a.name, a.value); });
        s.textContent = node.textContent;
        node = s;
      }
      target.appendChild(node);
    });
  }
  function call(entry) {
    var classId = entry[0], renderId = entry[1], jsHash = entry[2];
    var els = document.querySelectorAll("[data-cw-id-" + renderId + "]");
    var detail = { classId: classId, renderId: renderId, vars: cw.vars[classId + ":" + jsHash] || {}, elements: els };
    document.dispatchEvent(new CustomEvent("cw:render", { detail: detail }));
  }
  cw.scan = function (root) {
    (root || document).querySelectorAll("script[data-cw-vars]").forEach(function (el) {
      cw.vars[el.getAttribute("data-cw-vars")] = json(el);
    });
    (root || document).querySelectorAll("script[data-cw-fragment]").forEach(function (el) {
      if (el.hasAttribute("data-cw-done")) { return; }
      el.setAttribute("data-cw-done", "");
      var manifest = json(el) || { css: [], js: [], calls: [] };
      manifest.css.forEach(function (html) { insert(html, document.head); });
      manifest.js.forEach(function (html) { insert(html, document.body); });
      cw.scan(document);
      manifest.calls.forEach(call);
      el.remove();
    });
    (root || document).querySelectorAll("script[data-cw-calls]").forEach(function (el) {
      (json(el) || []).forEach(call);
      el.remove();
    });
  };
  function watch() {
    cw.scan(document);
    if (cw.observer || typeof MutationObserver === "undefined") { return; }
    cw.observer = new MutationObserver(function (records) {
      for (var i = 0; i < records.length; i++) {
        if (records[i].addedNodes.length) { cw.scan(document); return; }
      }
    });
    cw.observer.observe(document.documentElement, { childList: true, subtree: true });
  }
  if (document.readyState === "loading") {
    document.addEventListener("DOMContentLoaded", watch);
  } else {
    watch();
  }
})();"#;

/// Assets gathered from the markers of one document, in encounter order
#[derive(Debug, Default)]
pub struct Collected {
    pub css: Vec<DependencyRecord>,
    pub js: Vec<DependencyRecord>,
    pub js_vars: Vec<DependencyRecord>,
    /// `[class_id, render_id, js_hash]` for every component with JS
    pub calls: Vec<[String; 3]>,
}

impl Collected {
    fn push(list: &mut Vec<DependencyRecord>, seen: &mut HashSet<DedupKey>, record: DependencyRecord) {
        if seen.insert(record.dedup_key()) {
            list.push(record);
        }
    }
}

#[derive(Serialize)]
struct FragmentManifest<'a> {
    css: Vec<String>,
    js: Vec<String>,
    calls: &'a [[String; 3]],
}

pub struct DependencyAggregator {
    resolver: Arc<dyn AssetResolver>,
    dirs: Vec<PathBuf>,
}

impl DependencyAggregator {
    pub fn new(resolver: Arc<dyn AssetResolver>, dirs: Vec<PathBuf>) -> Self {
        Self { resolver, dirs }
    }

    /// Load and hash a class's static JS/CSS; runs once per class
    pub fn register(&self, class: &ComponentClass) -> Result<Arc<ClassAssets>, RenderError> {
        class
            .assets_cell()
            .get_or_try_init(|| -> Result<Arc<ClassAssets>, RenderError> {
                let c = class.component();
                let js = class.load_source("js", c.js(), c.js_file(), &self.dirs)?;
                let css = class.load_source("css", c.css(), c.css_file(), &self.dirs)?;
                tracing::debug!(
                    class_id = %class.id(),
                    js = js.is_some(),
                    css = css.is_some(),
                    "registered class assets"
                );
                Ok(Arc::new(ClassAssets {
                    js_hash: js.as_deref().map(content_hash),
                    css_hash: css.as_deref().map(content_hash),
                    js,
                    css,
                    media: c.media(),
                }))
            })
            .cloned()
    }

    /// Cache the JS or CSS generated from one instance's variables
    ///
    /// The hash depends only on the data, so instances with identical data share
    /// one entry.
    pub fn register_instance_vars(
        &self,
        class: &ComponentClass,
        kind: AssetKind,
        data: &Bindings,
    ) -> Result<String, DependencyError> {
        let json = serde_json::to_string(data)?;
        let hash = content_hash(&json);
        let content = match kind {
            AssetKind::Css => css_vars_block(&hash, data),
            AssetKind::Js => json,
        };
        let inserted = InstanceVarsCache::global().insert_if_absent(class.id(), kind, &hash, content)?;
        if inserted {
            tracing::trace!(class_id = %class.id(), kind = %kind, hash = %hash, "cached instance variables");
        }
        Ok(hash)
    }

    /// Gather the assets of every component marked in `html`
    ///
    /// `classes` are consulted before the process-wide identity registry.
    pub fn collect(
        &self,
        html: &str,
        classes: &HashMap<String, ComponentClass>,
    ) -> Result<Collected, RenderError> {
        let mut collected = Collected::default();
        let mut seen = HashSet::new();
        let mut called = HashSet::new();

        for marker in markers::extract_markers(html) {
            let class = match classes.get(&marker.class_id) {
                Some(class) => class.clone(),
                None => identity::lookup(&marker.class_id)?,
            };
            let assets = self.register(&class)?;
            let owner = class.id().clone();

            for css in &assets.media.css {
                let mut record = DependencyRecord::external(
                    DependencyKind::ExternalStyle,
                    self.resolver.resolve(&css.url),
                    owner.clone(),
                );
                record.attrs = css.attrs.clone();
                Collected::push(&mut collected.css, &mut seen, record);
            }
            if let (Some(css), Some(hash)) = (&assets.css, &assets.css_hash) {
                let record = DependencyRecord::inline(
                    DependencyKind::InlineStyle,
                    css.clone(),
                    owner.clone(),
                    hash.clone(),
                );
                Collected::push(&mut collected.css, &mut seen, record);
            }
            if let Some(hash) = &marker.css_hash {
                let content = instance_vars(&owner, AssetKind::Css, hash)?;
                let record = DependencyRecord::inline(
                    DependencyKind::InlineStyle,
                    content.to_string(),
                    owner.clone(),
                    format!("vars-{}", hash),
                );
                Collected::push(&mut collected.css, &mut seen, record);
            }

            for url in &assets.media.js {
                let record = DependencyRecord::external(
                    DependencyKind::ExternalScript,
                    self.resolver.resolve(url),
                    owner.clone(),
                );
                Collected::push(&mut collected.js, &mut seen, record);
            }
            if let (Some(js), Some(hash)) = (&assets.js, &assets.js_hash) {
                let record = DependencyRecord::inline(
                    DependencyKind::InlineScript,
                    js.clone(),
                    owner.clone(),
                    hash.clone(),
                );
                Collected::push(&mut collected.js, &mut seen, record);
            }
            if let Some(hash) = &marker.js_hash {
                let content = instance_vars(&owner, AssetKind::Js, hash)?;
                let record = DependencyRecord::inline(
                    DependencyKind::InlineScript,
                    content.to_string(),
                    owner.clone(),
                    format!("vars-{}", hash),
                )
                .with_attr("type", "application/json")
                .with_attr("data-cw-vars", format!("{}:{}", marker.class_id, hash));
                Collected::push(&mut collected.js_vars, &mut seen, record);
            }

            let has_js = assets.has_js() || marker.js_hash.is_some();
            if has_js && called.insert(marker.render_id.clone()) {
                collected.calls.push([
                    marker.class_id.clone(),
                    marker.render_id.clone(),
                    marker.js_hash.clone().unwrap_or_default(),
                ]);
            }
        }

        Ok(collected)
    }

    /// Replace markers in `html` with the collected assets
    pub fn finalize(
        &self,
        html: &str,
        strategy: DependencyStrategy,
        classes: &HashMap<String, ComponentClass>,
    ) -> Result<String, RenderError> {
        if strategy == DependencyStrategy::Ignore {
            return Ok(html.to_string());
        }

        let collected = self.collect(html, classes)?;
        let body = markers::strip_markers(html);

        let css = tags(&collected.css, &body)?;
        let js = tags(&collected.js, &body)?;

        let output = match strategy {
            DependencyStrategy::Document => {
                let mut scripts = String::new();
                if !body.contains(LOADER_ATTR) {
                    scripts.push_str(&format!("<script {}>{}</script>", LOADER_ATTR, LOADER_JS));
                }
                scripts.push_str(&js);
                scripts.push_str(&tags(&collected.js_vars, &body)?);
                if !collected.calls.is_empty() {
                    let calls = script_json(&collected.calls)?;
                    scripts.push_str(&format!(
                        r#"<script type="application/json" data-cw-calls>{}</script>"#,
                        calls
                    ));
                }
                place(&body, &css, &scripts)
            }
            DependencyStrategy::Simple => place(&body, &css, &js),
            DependencyStrategy::Fragment => {
                let mut out = markers::strip_placeholders(&body);
                let mut js_tags = split_tags(&collected.js, &body)?;
                js_tags.extend(split_tags(&collected.js_vars, &body)?);
                let manifest = FragmentManifest {
                    css: split_tags(&collected.css, &body)?,
                    js: js_tags,
                    calls: &collected.calls,
                };
                if !(manifest.css.is_empty() && manifest.js.is_empty() && manifest.calls.is_empty()) {
                    let json = script_json(&manifest)?;
                    out.push_str(&format!(
                        r#"<script type="application/json" data-cw-fragment>{}</script>"#,
                        json
                    ));
                    out.push_str(&format!(
                        "<script {}>{}</script>",
                        BOOTSTRAP_ATTR, FRAGMENT_BOOTSTRAP
                    ));
                }
                out
            }
            DependencyStrategy::Prepend => {
                format!("{}{}{}", css, js, markers::strip_placeholders(&body))
            }
            DependencyStrategy::Append => {
                format!("{}{}{}", markers::strip_placeholders(&body), css, js)
            }
            DependencyStrategy::Ignore => html.to_string(),
        };

        tracing::debug!(
            strategy = %strategy,
            css = collected.css.len(),
            js = collected.js.len(),
            calls = collected.calls.len(),
            "finalized dependencies"
        );
        Ok(output)
    }
}

fn instance_vars(owner: &ClassId, kind: AssetKind, hash: &str) -> Result<Arc<str>, RenderError> {
    InstanceVarsCache::global()
        .get(owner, kind, hash)
        .ok_or_else(|| {
            DependencyError::UnknownInstanceVars {
                class_id: owner.to_string(),
                kind: kind.as_str(),
                hash: hash.to_string(),
            }
            .into()
        })
}

/// JSON safe to embed in a `<script>` body
fn script_json<T: Serialize>(value: &T) -> Result<String, RenderError> {
    let json = serde_json::to_string(value).map_err(DependencyError::from)?;
    Ok(json.replace("</", "<\\/"))
}

/// `[data-cw-css-HASH] { --name: value; ... }`
fn css_vars_block(hash: &str, data: &Bindings) -> String {
    let vars: Vec<String> = data
        .iter()
        .map(|(name, value)| format!("--{}: {};", name, value.render()))
        .collect();
    format!("[{}{}] {{ {} }}", CSS_HASH_ATTR_PREFIX, hash, vars.join(" "))
}

/// HTML of records not already present in `existing`
fn split_tags(records: &[DependencyRecord], existing: &str) -> Result<Vec<String>, RenderError> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let tag = record.to_html()?;
        if !existing.contains(&tag) {
            out.push(tag);
        }
    }
    Ok(out)
}

fn tags(records: &[DependencyRecord], existing: &str) -> Result<String, RenderError> {
    Ok(split_tags(records, existing)?.concat())
}

/// Put CSS at its placeholder (else before `</head>`, else first) and JS at its
/// placeholder (else before `</body>`, else last)
fn place(html: &str, css: &str, js: &str) -> String {
    let with_css = insert_at_marker(html, &css_placeholder(), "</head>", css, true);
    insert_at_marker(&with_css, &js_placeholder(), "</body>", js, false)
}

fn insert_at_marker(html: &str, placeholder: &str, closing: &str, content: &str, at_start: bool) -> String {
    if let Some(pos) = html.find(placeholder) {
        let before = &html[..pos];
        let after = html[pos + placeholder.len()..].replace(placeholder, "");
        return format!("{}{}{}", before, content, after);
    }
    if content.is_empty() {
        return html.to_string();
    }
    if let Some(pos) = find_ignore_case(html, closing) {
        return format!("{}{}{}", &html[..pos], content, &html[pos..]);
    }
    if at_start {
        format!("{}{}", content, html)
    } else {
        format!("{}{}", html, content)
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}
