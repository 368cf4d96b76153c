//! Class and instance-variable registration from many threads at once
//!
//! Kept in its own test binary so the process-wide cache holds only these entries.

use std::sync::{Arc, Barrier};
use std::thread;

use component_weave::component::{identity, TemplateComponent};
use component_weave::dependencies::{
    AssetKind, DependencyAggregator, InstanceVarsCache, StaticUrlResolver,
};
use component_weave::{bindings, ComponentClass};
use pretty_assertions::assert_eq;

const THREADS: usize = 8;

#[test]
fn test_same_class_and_data_from_many_threads() {
    let aggregator = DependencyAggregator::new(Arc::new(StaticUrlResolver::default()), Vec::new());
    let data = bindings([("color", "teal"), ("size", "2rem")]);
    let barrier = Barrier::new(THREADS);

    let results: Vec<(ComponentClass, String, String)> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let class = ComponentClass::new(
                        "tests::concurrent_registration",
                        "ConcurrentMeter",
                        TemplateComponent::new("<meter></meter>")
                            .with_css_vars(["color", "size"])
                            .with_js_vars(["color"]),
                    );
                    let css = aggregator
                        .register_instance_vars(&class, AssetKind::Css, &data)
                        .unwrap();
                    let js = aggregator
                        .register_instance_vars(&class, AssetKind::Js, &data)
                        .unwrap();
                    (class, css, js)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let (first, css_hash, js_hash) = &results[0];
    for (class, css, js) in &results {
        assert_eq!(class.id(), first.id());
        assert_eq!(css, css_hash);
        assert_eq!(js, js_hash);
    }
    assert_eq!(InstanceVarsCache::global().len(), 2);
    assert!(InstanceVarsCache::global()
        .get(first.id(), AssetKind::Css, css_hash)
        .is_some_and(|block| block.contains("teal")));

    let live = identity::lookup(first.id().as_str()).unwrap();
    assert!(results.iter().any(|(class, _, _)| class.ptr_eq(&live)));
    assert_eq!(identity::IdentityRegistry::global().len(), 1);
}
