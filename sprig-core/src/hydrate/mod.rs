//! Hydration
//!
//! Turns server-rendered islands into live, reactive content without
//! rebuilding what the server already produced.
//!
//! # Protocol
//!
//! A hydration container is an element carrying the container marker
//! attribute (`data-hydrate` by default). Its direct children hold one or
//! more islands:
//!
//! ```text
//! <div data-hydrate>
//!   <!--start--><!--{"name":"Counter","props":{"start":1}}-->
//!   ...server-rendered nodes...
//!   <!--end-->
//! </div>
//! ```
//!
//! [`island`] emits this sequence on the server. Children forwarded to the
//! component are bracketed by `<!--children-->` and `<!--/children-->`.
//!
//! # Process
//!
//! For each island, concurrently:
//!
//! 1. Load the component by name through the [`ComponentLoader`].
//! 2. Render it on the client with the island's props and a children
//!    placeholder comment.
//! 3. Put the server-rendered children run where the placeholder ended up.
//! 4. Check that client and server rendered the same number of top-level
//!    nodes.
//! 5. In an animation frame, replace each server node with its client
//!    counterpart, leaving identical nodes in place.
//!
//! A failing island is logged and reported; its siblings still hydrate.

mod registry;
mod relocate;
mod scanner;

pub use registry::{Component, ComponentLoader, ComponentRegistry, LoadFuture};
pub use relocate::{list_run, move_run, path_from_root, resolve_path, sibling_run, TreePath};
pub use scanner::{encode_info, scan, Island, IslandInfo};

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::HydrationConfig;
use crate::dom::Node;
use crate::error::HydrationError;
use crate::reactive::RenderScope;
use crate::render::{render, ClientRenderer, Renderable};

/// Wrap a server render of `component` in the island protocol.
pub fn island(
    config: &HydrationConfig,
    name: &str,
    props: &Value,
    component: &dyn Component,
    children: impl Into<Renderable>,
) -> Result<Renderable, HydrationError> {
    // Bracketed even when empty: the client always receives a placeholder.
    let forwarded = Renderable::List(vec![
        Renderable::Comment(config.children_marker.clone()),
        children.into(),
        Renderable::Comment(config.children_end_marker.clone()),
    ]);
    Ok(Renderable::List(vec![
        Renderable::Comment(config.start_marker.clone()),
        Renderable::Comment(encode_info(name, props)?),
        component.render(props, forwarded),
        Renderable::Comment(config.end_marker.clone()),
    ]))
}

/// A successfully hydrated island.
#[derive(Debug)]
pub struct HydratedIsland {
    pub name: String,
    /// The client nodes now in the tree.
    pub nodes: Vec<Node>,
    /// Owns the island's subscriptions; destroy it to tear the island down.
    pub scope: RenderScope,
}

/// The outcome of [`hydrate`].
#[derive(Debug, Default)]
pub struct HydrationReport {
    pub hydrated: Vec<HydratedIsland>,
    pub errors: Vec<HydrationError>,
}

impl HydrationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Every element under `roots` (inclusive) carrying the container marker.
pub fn find_containers(roots: &[Node], config: &HydrationConfig) -> Vec<Node> {
    let marker = config.container_marker.as_str();
    let mut containers = Vec::new();
    for root in roots {
        if root.has_attribute(marker) {
            containers.push(root.clone());
        }
        containers.extend(root.find_all(&|node| node.has_attribute(marker)));
    }
    containers
}

/// Hydrate every island under `roots`.
///
/// Islands load and render concurrently. The DOM writes are queued as
/// animation frames on the renderer's scheduler, so the caller drains the
/// scheduler afterwards.
pub async fn hydrate(
    roots: &[Node],
    loader: &dyn ComponentLoader,
    renderer: &ClientRenderer,
    config: &HydrationConfig,
) -> HydrationReport {
    let mut report = HydrationReport::default();
    let mut islands = Vec::new();
    for container in find_containers(roots, config) {
        for scanned in scan(&container, config) {
            match scanned {
                Ok(island) => islands.push(island),
                Err(err) => report.errors.push(err),
            }
        }
    }
    debug!(islands = islands.len(), "hydrating islands");

    let results = join_all(
        islands
            .into_iter()
            .map(|island| hydrate_island(island, loader, renderer, config)),
    )
    .await;

    for result in results {
        match result {
            Ok(hydrated) => report.hydrated.push(hydrated),
            Err(err) => {
                error!(error = %err, "failed to hydrate island");
                report.errors.push(err);
            }
        }
    }
    info!(
        hydrated = report.hydrated.len(),
        failed = report.errors.len(),
        "hydration finished"
    );
    report
}

async fn hydrate_island(
    island: Island,
    loader: &dyn ComponentLoader,
    renderer: &ClientRenderer,
    config: &HydrationConfig,
) -> Result<HydratedIsland, HydrationError> {
    let name = island.info.name.clone();
    let component = loader.load(&name).await?;

    let placeholder = Node::comment(config.children_marker.as_str());
    let output = render(renderer, || {
        component.render(&island.info.props, Renderable::Node(placeholder.clone()))
    });

    let plan = match plan_children(&name, &island.nodes, output.nodes, &placeholder, config) {
        Ok(plan) => plan,
        Err(err) => {
            output.scope.destroy();
            return Err(err);
        }
    };
    let ChildrenPlan { nodes, relocate } = plan;

    if nodes.len() != island.nodes.len() {
        output.scope.destroy();
        return Err(HydrationError::NodeCountMismatch {
            name,
            server: island.nodes.len(),
            client: nodes.len(),
        });
    }

    let old = island.nodes;
    let new = nodes.clone();
    renderer.scheduler().request_animation_frame(move || {
        if let Some(run) = relocate {
            move_run(&run, &placeholder);
        }
        let mut replaced = 0;
        for (old, new) in old.iter().zip(&new) {
            if old != new {
                old.replace_with(new);
                replaced += 1;
            }
        }
        debug!(replaced, "swapped server nodes for client nodes");
    });

    Ok(HydratedIsland {
        name,
        nodes,
        scope: output.scope,
    })
}

struct ChildrenPlan {
    /// The client's top-level nodes, with a top-level placeholder already
    /// replaced by the server run.
    nodes: Vec<Node>,
    /// A server run to move to a nested placeholder.
    relocate: Option<Vec<Node>>,
}

fn plan_children(
    name: &str,
    server: &[Node],
    mut client: Vec<Node>,
    placeholder: &Node,
    config: &HydrationConfig,
) -> Result<ChildrenPlan, HydrationError> {
    let open = config.children_marker.as_str();
    let close = config.children_end_marker.as_str();
    let missing = || HydrationError::MissingChildren {
        name: name.to_string(),
    };

    if let Some(index) = client.iter().position(|node| node == placeholder) {
        let run = list_run(server, index, open, close).ok_or_else(missing)?;
        client.splice(index..=index, run);
        return Ok(ChildrenPlan {
            nodes: client,
            relocate: None,
        });
    }

    let (top, path) = path_from_root(placeholder);
    let Some(top_index) = client.iter().position(|node| *node == top) else {
        // The component did not use its children.
        return Ok(ChildrenPlan {
            nodes: client,
            relocate: None,
        });
    };
    let run = server
        .get(top_index)
        .and_then(|root| resolve_path(root, &path))
        .and_then(|opener| sibling_run(&opener, open, close))
        .ok_or_else(missing)?;
    Ok(ChildrenPlan {
        nodes: client,
        relocate: Some(run),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;
    use crate::reactive::{create_signal_in, Scheduler};
    use crate::render::render_to_string;
    use crate::tags::{button, div, section, span};

    fn counter(props: &Value, _children: Renderable) -> Renderable {
        let start = props["start"].as_i64().unwrap_or_default();
        let (count, set_count) = create_signal_in(&Scheduler::current(), start);
        Renderable::from(vec![
            Renderable::from(span().child(count)),
            Renderable::from(button().on("click", move |_| set_count.update(|n| n + 1)).child("+")),
        ])
    }

    fn card(props: &Value, children: Renderable) -> Renderable {
        section()
            .child(span().child(props["title"].as_str().unwrap_or_default().to_string()))
            .child(div().class("body").child(children))
            .into()
    }

    fn server_page(config: &HydrationConfig) -> Vec<Node> {
        let html = render_to_string(|| {
            div()
                .bool_attr("data-hydrate", true)
                .child(island(config, "Counter", &serde_json::json!({ "start": 5 }), &counter, ()).unwrap())
        });
        parse_fragment(&html).unwrap()
    }

    #[test]
    fn island_emits_protocol_comments() {
        let config = HydrationConfig::default();
        let html = render_to_string(|| {
            island(&config, "Card", &serde_json::json!({ "title": "T" }), &card, "kids").unwrap()
        });
        assert_eq!(
            html,
            "<!--start--><!--{\"name\":\"Card\",\"props\":{\"title\":\"T\"}}-->\
             <section><span>T</span><div class=\"body\"><!--children-->kids<!--/children--></div></section>\
             <!--end-->"
        );
    }

    #[tokio::test]
    async fn hydrates_and_keeps_reactivity() {
        let scheduler = Scheduler::new();
        let previous = Scheduler::install(scheduler.clone());
        let config = HydrationConfig::default();
        let roots = server_page(&config);
        let registry = ComponentRegistry::new();
        registry.register("Counter", counter);
        let renderer = ClientRenderer::with_scheduler(scheduler.clone());

        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert!(report.is_ok());
        assert_eq!(report.hydrated.len(), 1);
        scheduler.run_until_idle();

        let container = &roots[0];
        let buttons = container.find_all(&|n| n.tag_name() == Some("button"));
        assert!(buttons[0].dispatch("click"));
        scheduler.run_until_idle();
        assert_eq!(
            container.outer_html(),
            "<div data-hydrate=\"\"><!--start--><!--{\"name\":\"Counter\",\"props\":{\"start\":5}}-->\
             <span><!---->6<!----></span><button>+</button><!--end--></div>"
        );
        if let Some(previous) = previous {
            Scheduler::install(previous);
        }
    }

    #[tokio::test]
    async fn node_count_mismatch_is_reported() {
        let config = HydrationConfig::default();
        let roots = server_page(&config);
        let registry = ComponentRegistry::new();
        registry.register("Counter", |_: &Value, _: Renderable| span());
        let renderer = ClientRenderer::with_scheduler(Scheduler::new());

        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert!(matches!(
            report.errors.as_slice(),
            [HydrationError::NodeCountMismatch { server: 2, client: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn one_failing_island_does_not_stop_the_others() {
        let config = HydrationConfig::default();
        let html = render_to_string(|| {
            div().bool_attr("data-hydrate", true).children(vec![
                island(&config, "Missing", &Value::Null, &card, ()).unwrap(),
                island(&config, "Counter", &serde_json::json!({ "start": 1 }), &counter, ()).unwrap(),
            ])
        });
        let roots = parse_fragment(&html).unwrap();
        let registry = ComponentRegistry::new();
        registry.register("Counter", counter);
        let renderer = ClientRenderer::with_scheduler(Scheduler::new());

        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert_eq!(report.hydrated.len(), 1);
        assert_eq!(report.hydrated[0].name, "Counter");
        assert!(matches!(
            report.errors.as_slice(),
            [HydrationError::UnknownComponent { name }] if name == "Missing"
        ));
    }

    #[tokio::test]
    async fn nested_children_are_moved_not_recreated() {
        let config = HydrationConfig::default();
        let html = render_to_string(|| {
            div().bool_attr("data-hydrate", true).child(
                island(&config, "Card", &serde_json::json!({ "title": "T" }), &card, span().child("kid"))
                    .unwrap(),
            )
        });
        let roots = parse_fragment(&html).unwrap();
        let server_kid = roots[0].find_all(&|n| n.tag_name() == Some("span"))[1].clone();

        let registry = ComponentRegistry::new();
        registry.register("Card", card);
        let scheduler = Scheduler::new();
        let renderer = ClientRenderer::with_scheduler(scheduler.clone());
        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert!(report.is_ok(), "{:?}", report.errors);
        scheduler.run_until_idle();

        let section = &report.hydrated[0].nodes[0];
        assert_eq!(section.parent().as_ref(), Some(&roots[0]));
        let body = &section.children()[1];
        assert_eq!(body.children()[1], server_kid);
        assert_eq!(
            roots[0].inner_html(),
            "<!--start--><!--{\"name\":\"Card\",\"props\":{\"title\":\"T\"}}-->\
             <section><span>T</span><div class=\"body\"><!--children--><span>kid</span><!--/children--></div></section>\
             <!--end-->"
        );
    }

    #[tokio::test]
    async fn top_level_children_run_is_kept_in_place() {
        let config = HydrationConfig::default();
        let passthrough = |_: &Value, children: Renderable| {
            Renderable::from(vec![Renderable::from(span().child("head")), children])
        };
        let html = render_to_string(|| {
            div()
                .bool_attr("data-hydrate", true)
                .child(island(&config, "Pass", &Value::Null, &passthrough, "text").unwrap())
        });
        let roots = parse_fragment(&html).unwrap();
        let server_text = roots[0].children()[4].clone();

        let registry = ComponentRegistry::new();
        registry.register("Pass", passthrough);
        let scheduler = Scheduler::new();
        let renderer = ClientRenderer::with_scheduler(scheduler.clone());
        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert!(report.is_ok(), "{:?}", report.errors);
        scheduler.run_until_idle();

        assert_eq!(report.hydrated[0].nodes.len(), 4);
        assert_eq!(roots[0].children()[4], server_text);
        assert_eq!(server_text.data(), "text");
    }

    #[tokio::test]
    async fn empty_children_keep_parity() {
        let config = HydrationConfig::default();
        let html = render_to_string(|| {
            div()
                .bool_attr("data-hydrate", true)
                .child(island(&config, "Card", &serde_json::json!({ "title": "T" }), &card, ()).unwrap())
        });
        assert!(html.contains("<div class=\"body\"><!--children--><!--/children--></div>"));

        let roots = parse_fragment(&html).unwrap();
        let registry = ComponentRegistry::new();
        registry.register("Card", card);
        let scheduler = Scheduler::new();
        let renderer = ClientRenderer::with_scheduler(scheduler.clone());
        let report = hydrate(&roots, &registry, &renderer, &config).await;
        assert!(report.is_ok(), "{:?}", report.errors);
    }
}
