//! Integration tests for JS/CSS collection and placement

use std::collections::BTreeSet;

use component_weave::component::TemplateComponent;
use component_weave::dependencies::{
    content_hash, AssetKind, DependencyError, InstanceVarsCache, LOADER_ATTR,
};
use component_weave::{
    ComponentClass, DependencyStrategy, Engine, Environment, Media, RenderError, RenderRequest,
    Settings,
};
use pretty_assertions::assert_eq;
use regex::Regex;

const MODULE: &str = "tests::dependencies";

fn engine_with(settings: Settings, components: Vec<(&str, &str, TemplateComponent)>) -> Engine {
    let mut engine = Engine::new(settings);
    for (tag, class_name, component) in components {
        engine
            .register(tag, ComponentClass::new(MODULE, class_name, component))
            .expect("component should register");
    }
    engine
}

fn render(engine: &Engine, source: &str, strategy: DependencyStrategy) -> Result<String, RenderError> {
    engine.render_source(source, Environment::new(), Some(strategy))
}

fn normalize(html: &str) -> String {
    Regex::new(r"(data-cw-id-|_RENDERED [^,]+,)c[0-9A-Za-z]{6}")
        .unwrap()
        .replace_all(html, "${1}cID")
        .into_owned()
}

fn widget() -> TemplateComponent {
    TemplateComponent::new("<div class=\"w\">{{ n }}</div>")
        .with_css(".w{margin:0}")
        .with_js("window.widgets = (window.widgets || 0) + 1;")
        .with_media(
            Media::new()
                .css("widget.css")
                .css_for("print.css", "print")
                .js("https://cdn.example.com/lib.js"),
        )
}

const THREE_WIDGETS: &str = r#"<html><head>{% component_css_dependencies %}</head><body>{% component "widget" n=1 / %}{% component "widget" n=2 / %}{% component "widget" n=3 / %}{% component_js_dependencies %}</body></html>"#;

#[test]
fn test_each_asset_emitted_once() {
    let engine = engine_with(
        Settings::default().with_static_url("/static/"),
        vec![("widget", "DepWidgetA", widget())],
    );
    for strategy in [DependencyStrategy::Document, DependencyStrategy::Simple] {
        let html = render(&engine, THREE_WIDGETS, strategy).unwrap();
        assert_eq!(html.matches(r#"href="/static/widget.css""#).count(), 1, "{}", strategy);
        assert_eq!(
            html.matches(r#"<link href="/static/print.css" media="print" rel="stylesheet">"#)
                .count(),
            1
        );
        assert_eq!(html.matches(r#"src="https://cdn.example.com/lib.js""#).count(), 1);
        assert_eq!(html.matches("<style>.w{margin:0}</style>").count(), 1);
        assert_eq!(html.matches("window.widgets").count(), 1);
        assert!(!html.contains("_RENDERED"));
        assert!(!html.contains("CSS_PLACEHOLDER"));
        assert!(!html.contains("JS_PLACEHOLDER"));
    }
}

#[test]
fn test_assets_land_at_placeholders_in_encounter_order() {
    let engine = engine_with(
        Settings::default(),
        vec![("widget", "DepWidgetB", widget())],
    );
    let html = render(&engine, THREE_WIDGETS, DependencyStrategy::Simple).unwrap();

    let head_end = html.find("</head>").unwrap();
    let body_start = html.find("<body>").unwrap();
    let css_link = html.find(r#"href="widget.css""#).unwrap();
    let print_link = html.find(r#"href="print.css""#).unwrap();
    let inline_css = html.find("<style>").unwrap();
    let script = html.find("window.widgets").unwrap();
    assert!(css_link < print_link && print_link < inline_css && inline_css < head_end);
    assert!(script > body_start);
    assert!(html.ends_with("</script></body></html>"));
}

#[test]
fn test_placement_falls_back_to_head_and_body() {
    let engine = engine_with(
        Settings::default(),
        vec![(
            "plain",
            "DepPlain",
            TemplateComponent::new("<p>x</p>")
                .with_css("p{}")
                .with_js("void 0;"),
        )],
    );
    let html = render(
        &engine,
        r#"<html><head><title>t</title></head><body>{% component "plain" / %}</body></html>"#,
        DependencyStrategy::Simple,
    )
    .unwrap();
    assert_eq!(
        normalize(&html),
        "<html><head><title>t</title><style>p{}</style></head><body><p data-cw-id-cID>x</p><script>void 0;</script></body></html>"
    );
}

#[test]
fn test_loader_emitted_once_across_finalize_passes() {
    let engine = engine_with(
        Settings::default(),
        vec![("widget", "DepWidgetC", widget())],
    );

    // First stage: render a fragment and defer dependency handling
    let fragment = engine
        .render(
            "widget",
            RenderRequest::new()
                .with_kwarg("n", 1)
                .with_strategy(DependencyStrategy::Ignore),
        )
        .unwrap();
    assert!(fragment.contains("_RENDERED"));

    // Second stage: embed it in a page rendered with the loader
    let env = Environment::new().with_global("fragment", fragment);
    let page = engine
        .render_source(
            r#"<html><head></head><body>{{ fragment }}{% component "widget" n=2 / %}</body></html>"#,
            env,
            Some(DependencyStrategy::Document),
        )
        .unwrap();
    let again = engine.finalize(&page, DependencyStrategy::Document).unwrap();

    for html in [&page, &again] {
        assert_eq!(html.matches(LOADER_ATTR).count(), 1);
        assert_eq!(html.matches("<style>.w{margin:0}</style>").count(), 1);
        assert_eq!(html.matches("window.widgets").count(), 1);
    }
    assert_eq!(page, again);
}

#[test]
fn test_document_strategy_records_component_calls() {
    let engine = engine_with(
        Settings::default(),
        vec![(
            "counter",
            "DepCounter",
            TemplateComponent::new("<button>{{ start }}</button>")
                .with_js("/* counter */")
                .with_js_vars(["start"]),
        )],
    );
    let source = r#"{% component "counter" start=5 / %}{% component "counter" start=5 / %}"#;

    let html = render(&engine, source, DependencyStrategy::Document).unwrap();
    let vars = Regex::new(r#"<script data-cw-vars="(DepCounter_[0-9a-f]{6}):([0-9a-f]{16})" type="application/json">\{"start":5\}</script>"#).unwrap();
    assert_eq!(vars.find_iter(&html).count(), 1);

    let calls = Regex::new(r#"<script type="application/json" data-cw-calls>(.*?)</script>"#).unwrap();
    let calls = &calls.captures(&html).expect("calls manifest")[1];
    let parsed: Vec<[String; 3]> = serde_json::from_str(calls).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_ne!(parsed[0][1], parsed[1][1]);
    assert_eq!(parsed[0][2], parsed[1][2]);

    // Instance JS variables need the loader, so simple output leaves them out
    let simple = render(&engine, source, DependencyStrategy::Simple).unwrap();
    assert!(!simple.contains("data-cw-vars"));
    assert!(!simple.contains(LOADER_ATTR));
    assert!(simple.contains("/* counter */"));
}

#[test]
fn test_media_only_js_still_records_a_call() {
    let engine = engine_with(
        Settings::default(),
        vec![
            (
                "chart",
                "DepMediaChart",
                TemplateComponent::new("<canvas></canvas>")
                    .with_media(Media::new().js("https://cdn.example.com/chart.js")),
            ),
            ("plain", "DepPlainText", TemplateComponent::new("<p>t</p>")),
        ],
    );
    let html = render(
        &engine,
        r#"{% component "chart" / %}{% component "plain" / %}"#,
        DependencyStrategy::Document,
    )
    .unwrap();

    let calls = Regex::new(r#"<script type="application/json" data-cw-calls>(.*?)</script>"#).unwrap();
    let calls = &calls.captures(&html).expect("calls manifest")[1];
    let parsed: Vec<[String; 3]> = serde_json::from_str(calls).unwrap();
    assert_eq!(parsed.len(), 1);
    assert!(parsed[0][0].starts_with("DepMediaChart_"));
}

#[test]
fn test_css_variables_per_distinct_value() {
    let engine = engine_with(
        Settings::default(),
        vec![(
            "a",
            "DepColored",
            TemplateComponent::new(r#"<span class="x">{{ c }}</span>"#)
                .with_css(".x{color:var(--c)}")
                .with_css_vars(["c"]),
        )],
    );
    let html = render(
        &engine,
        r#"{% component "a" c="red" / %}{% component "a" c="blue" / %}{% component "a" c="red" / %}"#,
        DependencyStrategy::Simple,
    )
    .unwrap();

    let attr = Regex::new(r"data-cw-css-([0-9a-f]{16})>(red|blue)<").unwrap();
    let pairs: Vec<(String, String)> = attr
        .captures_iter(&html)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[0].0, pairs[2].0);
    assert_ne!(pairs[0].0, pairs[1].0);

    let hashes: BTreeSet<&str> = pairs.iter().map(|(h, _)| h.as_str()).collect();
    for hash in &hashes {
        let block = format!("[data-cw-css-{}] {{", hash);
        assert_eq!(html.matches(&block).count(), 1, "{}", html);
    }
    assert!(html.contains(&format!("[data-cw-css-{}] {{ --c: red; }}", pairs[0].0)));
    assert!(html.contains(&format!("[data-cw-css-{}] {{ --c: blue; }}", pairs[1].0)));
    assert_eq!(html.matches(".x{color:var(--c)}").count(), 1);
}

#[test]
fn test_colliding_instance_hash_fails_instead_of_reusing_vars() {
    let class = ComponentClass::new(
        MODULE,
        "DepCollide",
        TemplateComponent::new("<i>{{ c }}</i>").with_css_vars(["c"]),
    );
    let hash = content_hash(r#"{"c":"v3622"}"#);
    InstanceVarsCache::global()
        .insert_if_absent(
            class.id(),
            AssetKind::Css,
            &hash,
            format!("[data-cw-css-{}] {{ --c: v3519; }}", hash),
        )
        .unwrap();

    let mut engine = Engine::new(Settings::default());
    engine.register("collide", class).unwrap();
    let err = render(
        &engine,
        r#"{% component "collide" c="v3622" / %}"#,
        DependencyStrategy::Simple,
    )
    .unwrap_err();
    assert_eq!(err.component_path(), Some("DepCollide"));
    assert!(matches!(
        err.root_cause(),
        RenderError::Dependency(DependencyError::HashCollision { .. })
    ));
}

#[test]
fn test_prepend_and_append() {
    let engine = engine_with(
        Settings::default(),
        vec![(
            "box",
            "DepBox",
            TemplateComponent::new("<div>b</div>")
                .with_css("div{}")
                .with_js("go();"),
        )],
    );
    let source = r#"{% component "box" / %}"#;

    let prepended = normalize(&render(&engine, source, DependencyStrategy::Prepend).unwrap());
    assert_eq!(prepended, "<style>div{}</style><script>go();</script><div data-cw-id-cID>b</div>");

    let appended = normalize(&render(&engine, source, DependencyStrategy::Append).unwrap());
    assert_eq!(appended, "<div data-cw-id-cID>b</div><style>div{}</style><script>go();</script>");
}

#[test]
fn test_fragment_strategy_emits_manifest_only() {
    let engine = engine_with(
        Settings::default(),
        vec![("widget", "DepWidgetD", widget())],
    );
    let html = render(&engine, THREE_WIDGETS, DependencyStrategy::Fragment).unwrap();

    assert!(!html.contains("<style>"));
    assert!(!html.contains(LOADER_ATTR));
    assert!(!html.contains("_RENDERED"));
    assert!(!html.contains("CSS_PLACEHOLDER"));

    let manifest = Regex::new(
        r#"<script type="application/json" data-cw-fragment>(.*?)</script><script data-cw-bootstrap>([^<]*)</script>$"#,
    )
    .unwrap();
    let captures = manifest.captures(&html).expect("fragment manifest");
    let json = &captures[1];
    assert!(captures[2].contains("ComponentWeave.scan"));
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["css"].as_array().unwrap().len(), 3);
    assert_eq!(value["js"].as_array().unwrap().len(), 2);
    assert_eq!(value["calls"].as_array().unwrap().len(), 3);
}

#[test]
fn test_ignore_then_finalize_matches_direct_render() {
    let engine = engine_with(
        Settings::default(),
        vec![("widget", "DepWidgetE", widget())],
    );
    let deferred = render(&engine, THREE_WIDGETS, DependencyStrategy::Ignore).unwrap();
    assert!(deferred.contains("_RENDERED"));
    assert!(deferred.contains("CSS_PLACEHOLDER"));

    let finalized = engine.finalize(&deferred, DependencyStrategy::Simple).unwrap();
    let direct = render(&engine, THREE_WIDGETS, DependencyStrategy::Simple).unwrap();
    assert_eq!(normalize(&finalized), normalize(&direct));
}

#[test]
fn test_closing_tag_in_inline_content_is_fatal() {
    let engine = engine_with(
        Settings::default(),
        vec![
            (
                "evil_css",
                "DepEvilCss",
                TemplateComponent::new("<i></i>").with_css("i::after{content:'</STYLE>'}"),
            ),
            (
                "evil_js",
                "DepEvilJs",
                TemplateComponent::new("<b></b>").with_js("document.write('</script>')"),
            ),
        ],
    );
    for tag in ["evil_css", "evil_js"] {
        let source = format!(r#"{{% component "{}" / %}}"#, tag);
        let err = render(&engine, &source, DependencyStrategy::Simple).unwrap_err();
        assert!(
            matches!(
                err.root_cause(),
                RenderError::Dependency(DependencyError::UnsafeContent { .. })
            ),
            "{:?}",
            err
        );
    }
}

#[test]
fn test_instance_css_with_closing_tag_is_fatal() {
    let engine = engine_with(
        Settings::default(),
        vec![(
            "sneaky",
            "DepSneaky",
            TemplateComponent::new("<i></i>").with_css_vars(["c"]),
        )],
    );
    let err = render(
        &engine,
        r#"{% component "sneaky" c="</style><script>" / %}"#,
        DependencyStrategy::Simple,
    )
    .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        RenderError::Dependency(DependencyError::UnsafeContent { .. })
    ));
}

#[test]
fn test_finalize_unknown_class_is_lookup_error() {
    let engine = Engine::new(Settings::default());
    let html = "<!-- _RENDERED Gone_000000,cAAAAAA,, --><p></p>";
    let err = engine.finalize(html, DependencyStrategy::Simple).unwrap_err();
    assert!(matches!(err, RenderError::Identity(_)));
}
