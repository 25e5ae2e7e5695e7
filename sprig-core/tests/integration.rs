//! Integration Tests
//!
//! These tests drive the public API end to end: server render, parse,
//! hydrate, then update through signals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use sprig_core::config::HydrationConfig;
use sprig_core::dom::{parse_fragment, Node};
use sprig_core::error::HydrationError;
use sprig_core::hydrate::{hydrate, island, Component, ComponentRegistry};
use sprig_core::reactive::{
    create_signal, create_signal_in, create_signal_with, use_on_destroy, Scheduler, SetSignal,
};
use sprig_core::render::{conditional, each, raw, render, render_to_string, ClientRenderer, Renderable};
use sprig_core::tags::{div, li, p, script, span, ul};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Item {
    id: u32,
    name: String,
}

type ItemSetter = Arc<Mutex<Option<SetSignal<Vec<Item>>>>>;

/// Counters shared between a component and the test driving it.
#[derive(Default)]
struct Counters {
    renders: AtomicUsize,
    destroyed: AtomicUsize,
}

/// `div(each(items, id, span(name)))`, exposing its setter through `slot`.
fn item_list(
    slot: ItemSetter,
    counts: Arc<Counters>,
) -> impl Fn(&Value, Renderable) -> Renderable + Send + Sync + 'static {
    move |props, _children| {
        let items: Vec<Item> = serde_json::from_value(props["items"].clone()).unwrap_or_default();
        let (list, set_list) = create_signal_in(&Scheduler::current(), items);
        *slot.lock() = Some(set_list);
        let counts = counts.clone();
        div()
            .class("list")
            .child(each(
                &list,
                |item: &Item| item.id,
                move |item, _| {
                    counts.renders.fetch_add(1, Ordering::SeqCst);
                    let counts = counts.clone();
                    use_on_destroy(move || {
                        counts.destroyed.fetch_add(1, Ordering::SeqCst);
                    });
                    span().child(item.derive(|item: &Item, _| item.name.clone()))
                },
            ))
            .into()
    }
}

fn spans(root: &Node) -> Vec<Node> {
    root.find_all(&|n| n.tag_name() == Some("span"))
}

/// Server render a hydration container with a single island.
fn server_markup(config: &HydrationConfig, name: &str, props: &Value, component: &dyn Component) -> Vec<Node> {
    let html = render_to_string(|| {
        div()
            .bool_attr("data-hydrate", true)
            .child(island(config, name, props, component, ()).unwrap())
    });
    parse_fragment(&html).unwrap()
}

#[tokio::test]
async fn hydrated_list_reorders_existing_nodes() {
    let scheduler = Scheduler::new();
    let previous = Scheduler::install(scheduler.clone());
    let config = HydrationConfig::default();
    let props = json!({ "items": [{ "id": 1, "name": "a" }, { "id": 2, "name": "b" }] });

    let server_counts = Arc::new(Counters::default());
    let server_component = item_list(Arc::default(), server_counts);
    let roots = server_markup(&config, "List", &props, &server_component);
    assert_eq!(
        roots[0].outer_html(),
        "<div data-hydrate=\"\"><!--start-->\
         <!--{\"name\":\"List\",\"props\":{\"items\":[{\"id\":1,\"name\":\"a\"},{\"id\":2,\"name\":\"b\"}]}}-->\
         <div class=\"list\"><!----><span><!---->a<!----></span><span><!---->b<!----></span><!----></div>\
         <!--end--></div>"
    );

    let slot: ItemSetter = Arc::default();
    let counts = Arc::new(Counters::default());
    let registry = ComponentRegistry::new();
    registry.register("List", item_list(slot.clone(), counts.clone()));
    let renderer = ClientRenderer::with_scheduler(scheduler.clone());

    let report = hydrate(&roots, &registry, &renderer, &config).await;
    assert!(report.is_ok(), "{:?}", report.errors);
    scheduler.run_until_idle();
    assert_eq!(counts.renders.load(Ordering::SeqCst), 2);

    let before = spans(&roots[0]);
    assert_eq!(before.len(), 2);
    let elements_before = roots[0].find_all(&|n| n.tag_name().is_some()).len();

    let set_list = slot.lock().clone().unwrap();
    set_list.set(vec![
        Item { id: 2, name: "b".into() },
        Item { id: 1, name: "a".into() },
    ]);
    scheduler.run_until_idle();

    let after = spans(&roots[0]);
    assert_eq!(after, vec![before[1].clone(), before[0].clone()]);
    assert_eq!(counts.renders.load(Ordering::SeqCst), 2);
    assert_eq!(counts.destroyed.load(Ordering::SeqCst), 0);
    assert_eq!(roots[0].find_all(&|n| n.tag_name().is_some()).len(), elements_before);
    assert_eq!(
        report.hydrated[0].nodes[0].inner_html(),
        "<!----><span><!---->b<!----></span><span><!---->a<!----></span><!---->"
    );

    if let Some(previous) = previous {
        Scheduler::install(previous);
    }
}

#[tokio::test]
async fn client_render_with_different_shape_is_rejected() {
    let config = HydrationConfig::default();
    let props = json!({ "items": [{ "id": 1, "name": "a" }] });
    let server_component = item_list(Arc::default(), Arc::default());
    let roots = server_markup(&config, "List", &props, &server_component);

    let registry = ComponentRegistry::new();
    registry.register("List", |_: &Value, _: Renderable| {
        vec![Renderable::from(div()), Renderable::from(div())]
    });
    let scheduler = Scheduler::new();
    let renderer = ClientRenderer::with_scheduler(scheduler.clone());

    let report = hydrate(&roots, &registry, &renderer, &config).await;
    scheduler.run_until_idle();
    assert!(report.hydrated.is_empty());
    assert!(matches!(
        report.errors.as_slice(),
        [HydrationError::NodeCountMismatch { server: 1, client: 2, .. }]
    ));
    // The server markup is left untouched.
    assert_eq!(spans(&roots[0]).len(), 1);
}

#[test]
fn server_and_client_agree_on_markup() {
    let scheduler = Scheduler::new();
    let (count, _) = create_signal_in(&scheduler, 3);
    let (items, _) = create_signal_in(&scheduler, vec![(1, "x"), (2, "y")]);
    let view = || {
        div()
            .attr("title", "t")
            .bool_attr("hidden", true)
            .bool_attr("disabled", false)
            .child(count.clone())
            .child(ul().child(each(&items, |item| item.0, |item, _| li().child(item.derive(|i, _| i.1)))))
            .child(conditional(&count, |n| *n > 0, |n| span().child(n)))
    };

    let server = render_to_string(&view);
    let renderer = ClientRenderer::with_scheduler(scheduler.clone());
    let client = render(&renderer, &view);
    assert_eq!(client.nodes.len(), 1);
    assert_eq!(client.nodes[0].outer_html(), server);
    assert_eq!(
        server,
        "<div title=\"t\" hidden=\"\"><!---->3<!---->\
         <ul><!----><li><!---->x<!----></li><li><!---->y<!----></li><!----></ul>\
         <!----><span><!---->3<!----></span><!----></div>"
    );
}

#[test]
fn server_output_is_escaped_except_raw_text() {
    let html = render_to_string(|| {
        div()
            .child(p().attr("title", "\"x\" & 'y'").child("<b>&</b>"))
            .child(script().child("if (a < b) { go() }"))
            .child(raw("<i>trusted</i>"))
    });
    assert_eq!(
        html,
        "<div><p title=\"&quot;x&quot; &amp; &#39;y&#39;\">&lt;b&gt;&amp;&lt;/b&gt;</p>\
         <script>if (a < b) { go() }</script><i>trusted</i></div>"
    );
}

#[test]
fn conditional_swaps_content_only_when_the_predicate_flips() {
    let scheduler = Scheduler::new();
    let renderer = ClientRenderer::with_scheduler(scheduler.clone());
    let (value, set_value) = create_signal_in(&scheduler, 1);
    let renders = Arc::new(AtomicUsize::new(0));
    let counter = renders.clone();
    let output = render(&renderer, || {
        div().child(conditional(&value, |v| *v > 0, move |value| {
            counter.fetch_add(1, Ordering::SeqCst);
            if value.get() > 0 {
                Renderable::from(span().child(value))
            } else {
                Renderable::Empty
            }
        }))
    });
    let root = output.nodes[0].clone();
    let first_span = spans(&root)[0].clone();

    set_value.set(7);
    scheduler.run_until_idle();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(spans(&root), vec![first_span.clone()]);
    assert_eq!(root.inner_html(), "<!----><span><!---->7<!----></span><!---->");

    set_value.set(0);
    scheduler.run_until_idle();
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(root.inner_html(), "<!----><!---->");

    set_value.set(2);
    scheduler.run_until_idle();
    assert_eq!(renders.load(Ordering::SeqCst), 3);
    assert_ne!(spans(&root)[0], first_span);
    assert_eq!(root.inner_html(), "<!----><span><!---->2<!----></span><!---->");
}

#[test]
fn derived_chain_is_consistent_when_set_returns() {
    let (base, set_base) = create_signal(1);
    let doubled = base.derive(|n, _| n * 2);
    let label = doubled.derive(|n, _| format!("#{n}"));
    assert_eq!(label.get(), "#2");

    set_base.set(5);
    assert_eq!(doubled.get(), 10);
    assert_eq!(label.get(), "#10");
}

#[test]
fn derive_sees_its_previous_value() {
    let (value, set_value) = create_signal(1);
    let history = value.derive(|n, previous: Option<&Vec<i32>>| {
        let mut history = previous.cloned().unwrap_or_default();
        history.push(*n);
        history
    });
    assert_eq!(history.get(), vec![1]);

    set_value.set(2);
    set_value.set(3);
    assert_eq!(history.get(), vec![1, 2, 3]);
}

#[test]
fn equal_values_do_not_notify() {
    let scheduler = Scheduler::new();
    let (value, set_value) = create_signal_in(&scheduler, 4);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let _sub = value.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(value.get(), 4);

    set_value.set(4);
    assert_eq!(scheduler.pending_tasks(), 0);
    set_value.set(5);
    scheduler.run_until_idle();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn custom_equality_controls_notification() {
    let (value, set_value) = create_signal_with(0.0_f64, |a: &f64, b: &f64| (a - b).abs() < 0.5);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let _sub = value.subscribe_direct(move |v| log.lock().push(*v));
    value.get();

    set_value.set(0.2);
    set_value.set(1.0);
    assert_eq!(*seen.lock(), vec![1.0]);
    assert_eq!(value.get(), 1.0);
}

#[test]
fn functional_updates_read_the_latest_value() {
    let (count, set_count) = create_signal(0);
    set_count.update(|n| n + 1);
    set_count.update(|n| n + 1);
    assert_eq!(count.get(), 2);
}

#[test]
fn direct_listeners_run_before_deferred_ones() {
    let scheduler = Scheduler::new();
    let (value, set_value) = create_signal_in(&scheduler, 0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let deferred_log = log.clone();
    let _deferred = value.subscribe(move |v| deferred_log.lock().push(format!("deferred {v}")));
    let direct_log = log.clone();
    let _direct = value.subscribe_direct(move |v| direct_log.lock().push(format!("direct {v}")));
    value.get();

    set_value.set(1);
    assert_eq!(*log.lock(), vec!["direct 1"]);

    scheduler.run_tasks();
    assert_eq!(*log.lock(), vec!["direct 1", "deferred 1"]);
}

#[test]
fn cancelled_subscription_stops_pending_tasks() {
    let scheduler = Scheduler::new();
    let (value, set_value) = create_signal_in(&scheduler, 0);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut sub = value.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    value.get();

    set_value.set(1);
    sub.unsubscribe();
    scheduler.run_until_idle();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(value.subscriber_count(), 0);
}
