//! HTML serialization of node trees.
//!
//! The output format matches the server renderer byte for byte, so a client
//! render serialized here can be compared directly with server output.

use indexmap::IndexMap;

use super::node::{Node, NodeKind};
use crate::render::escape_html;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text content is not escaped or entity-decoded.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

/// `k: v;` pairs joined by a space.
pub fn style_text(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(k, v)| format!("{k}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a `style` attribute into ordered properties.
pub fn parse_style(text: &str) -> IndexMap<String, String> {
    text.split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn outer_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, false, &mut out);
    out
}

pub fn inner_html(node: &Node) -> String {
    let mut out = String::new();
    let raw = node.tag_name().is_some_and(is_raw_text);
    write_children(node, raw, &mut out);
    out
}

fn write_children(node: &Node, raw: bool, out: &mut String) {
    if let Some(shadow) = node.shadow_root() {
        let mode = match shadow.kind() {
            NodeKind::ShadowRoot(mode) => mode.clone(),
            _ => "open".to_string(),
        };
        out.push_str(&format!(
            "<template shadowrootmode=\"{}\">",
            escape_html(&mode)
        ));
        write_children(&shadow, false, out);
        out.push_str("</template>");
    }
    let children = match node.template_content() {
        Some(content) => content.children(),
        None => node.children(),
    };
    for child in &children {
        write_node(child, raw, out);
    }
}

fn write_node(node: &Node, raw: bool, out: &mut String) {
    match node.kind() {
        NodeKind::Text if raw => out.push_str(&node.data()),
        NodeKind::Text => out.push_str(&escape_html(&node.data())),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.data());
            out.push_str("-->");
        }
        NodeKind::Fragment | NodeKind::ShadowRoot(_) => write_children(node, false, out),
        NodeKind::Element(name) => {
            out.push('<');
            out.push_str(name);
            for (key, value) in node.attributes() {
                out.push_str(&format!(" {key}=\"{}\"", escape_html(&value)));
            }
            out.push('>');
            if is_void(name) {
                return;
            }
            write_children(node, is_raw_text(name), out);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_elements_text_and_comments() {
        let div = Node::element("div");
        div.set_attribute("class", "a\"b");
        div.append_child(&Node::comment(""));
        div.append_child(&Node::text("1 < 2"));
        div.append_child(&Node::comment(""));
        div.append_child(&Node::element("br"));

        assert_eq!(
            div.outer_html(),
            "<div class=\"a&quot;b\"><!---->1 &lt; 2<!----><br></div>"
        );
    }

    #[test]
    fn script_text_is_not_escaped() {
        let script = Node::element("script");
        script.append_child(&Node::text("a < b && c"));
        assert_eq!(script.outer_html(), "<script>a < b && c</script>");
    }

    #[test]
    fn shadow_root_serializes_as_declarative_template() {
        let host = Node::element("x-card");
        let shadow = host.attach_shadow("open");
        shadow.append_child(&Node::element("slot"));
        host.append_child(&Node::text("body"));

        assert_eq!(
            host.outer_html(),
            "<x-card><template shadowrootmode=\"open\"><slot></slot></template>body</x-card>"
        );
    }

    #[test]
    fn style_round_trip() {
        let parsed = parse_style("color: red;  --gap:4px; ;bad");
        assert_eq!(parsed.get("color").map(String::as_str), Some("red"));
        assert_eq!(parsed.get("--gap").map(String::as_str), Some("4px"));
        assert_eq!(parsed.len(), 2);
        assert_eq!(style_text(&parsed), "color: red; --gap: 4px;");
    }
}
