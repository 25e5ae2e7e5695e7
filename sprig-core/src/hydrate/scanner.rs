//! Island scanner.
//!
//! Walks the direct children of a hydration container and splits them into
//! islands. The container's children follow this grammar, repeated:
//!
//! ```text
//! <!--start--> <!--{"name": .., "props": ..}--> content* <!--end-->
//! ```
//!
//! The scanner is a three-state machine with five transitions:
//!
//! | state        | input                | next                          |
//! |--------------|----------------------|-------------------------------|
//! | Seek         | start comment        | ExpectInfo                    |
//! | Seek         | anything else        | Seek                          |
//! | ExpectInfo   | any node             | Collect (or Seek if invalid)  |
//! | Collect      | end comment          | Seek, island emitted          |
//! | Collect      | anything else        | Collect, node collected       |

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::HydrationConfig;
use crate::dom::Node;
use crate::error::HydrationError;

/// The JSON payload of an island's info comment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IslandInfo {
    /// Component name (or module path) to load.
    #[serde(alias = "path")]
    pub name: String,
    #[serde(default)]
    pub props: Value,
}

/// One server-rendered island.
#[derive(Debug, Clone)]
pub struct Island {
    pub info: IslandInfo,
    pub start: Node,
    pub info_node: Node,
    /// Server-rendered content between the info comment and the end marker.
    pub nodes: Vec<Node>,
    pub end: Node,
}

enum ScanState {
    Seek,
    ExpectInfo { start: Node },
    Collect { start: Node, info: IslandInfo, info_node: Node, nodes: Vec<Node> },
}

/// Split a container's children into islands.
///
/// Malformed info comments yield an error entry; scanning resumes at the
/// next start marker either way.
pub fn scan(container: &Node, config: &HydrationConfig) -> Vec<Result<Island, HydrationError>> {
    let mut islands = Vec::new();
    let mut state = ScanState::Seek;

    for node in container.children() {
        state = match state {
            ScanState::Seek if node.is_comment_with(&config.start_marker) => {
                ScanState::ExpectInfo { start: node }
            }
            ScanState::Seek => ScanState::Seek,
            ScanState::ExpectInfo { start } => match parse_info(&node) {
                Ok(info) => ScanState::Collect {
                    start,
                    info,
                    info_node: node,
                    nodes: Vec::new(),
                },
                Err(err) => {
                    warn!(error = %err, "island start marker not followed by a valid info comment");
                    islands.push(Err(err));
                    ScanState::Seek
                }
            },
            ScanState::Collect {
                start,
                info,
                info_node,
                nodes,
            } if node.is_comment_with(&config.end_marker) => {
                islands.push(Ok(Island {
                    info,
                    start,
                    info_node,
                    nodes,
                    end: node,
                }));
                ScanState::Seek
            }
            ScanState::Collect {
                start,
                info,
                info_node,
                mut nodes,
            } => {
                nodes.push(node);
                ScanState::Collect {
                    start,
                    info,
                    info_node,
                    nodes,
                }
            }
        };
    }

    match state {
        ScanState::Seek => {}
        ScanState::ExpectInfo { .. } => warn!("container ends right after an island start marker"),
        ScanState::Collect { info, .. } => {
            warn!(island = %info.name, "container ends before the island's end marker")
        }
    }
    islands
}

fn parse_info(node: &Node) -> Result<IslandInfo, HydrationError> {
    let data = if node.is_comment() {
        node.data()
    } else {
        String::new()
    };
    Ok(serde_json::from_str(&data)?)
}

/// Encode island info for a comment node. `<` and `>` are escaped so the
/// JSON can never close the comment.
pub fn encode_info(name: &str, props: &Value) -> Result<String, HydrationError> {
    let json = serde_json::to_string(&serde_json::json!({ "name": name, "props": props }))?;
    Ok(json.replace('<', "\\u003c").replace('>', "\\u003e"))
}
