use super::{Element, Node, merge_style};
use crate::theme::Theme;

/// Marker attribute on the wrapper produced by [`apply`].
pub const EXPORT_ROOT_ATTR: &str = "data-export-root";

/// Produce a themed copy of `root`.
///
/// The copy is wrapped in a `<div>` carrying the font family, text colour and
/// background colour. Headings take the primary colour, links the accent
/// colour and table header cells the secondary colour with white text.
/// Children are never removed or reordered.
pub fn apply(root: &Element, theme: &Theme) -> Element {
    let mut wrapper = Element::new("div");
    wrapper.set_attr(EXPORT_ROOT_ATTR, String::new());
    let mut style = String::new();
    style = merge_style(&style, "font-family", &theme.font_family);
    style = merge_style(&style, "color", &theme.text);
    style = merge_style(&style, "background-color", &theme.background);
    wrapper.set_attr("style", style);
    wrapper.children = root
        .children
        .iter()
        .map(|child| decorate(child, theme))
        .collect();
    wrapper
}

fn decorate(node: &Node, theme: &Theme) -> Node {
    let Node::Element(el) = node else {
        return node.clone();
    };
    let mut out = Element {
        name: el.name.clone(),
        attrs: el.attrs.clone(),
        children: el.children.iter().map(|c| decorate(c, theme)).collect(),
    };
    let rules: Vec<(&str, &str)> = match el.name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => vec![("color", theme.primary.as_str())],
        "a" => vec![("color", theme.accent.as_str())],
        "th" => vec![
            ("background-color", theme.secondary.as_str()),
            ("color", "#ffffff"),
        ],
        _ => Vec::new(),
    };
    if !rules.is_empty() {
        let mut style = out.attr("style").unwrap_or("").to_string();
        for (property, value) in rules {
            style = merge_style(&style, property, value);
        }
        out.set_attr("style", style);
    }
    Node::Element(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse;

    fn themed(html: &str) -> Element {
        let theme = Theme {
            primary: "#aa0000".into(),
            secondary: "#112233".into(),
            accent: "#00aa00".into(),
            background: "#fafafa".into(),
            text: "#222222".into(),
            font_family: "Georgia, serif".into(),
        };
        apply(&parse(html).unwrap(), &theme)
    }

    fn find<'a>(el: &'a Element, name: &str) -> Option<&'a Element> {
        if el.name == name {
            return Some(el);
        }
        el.elements().find_map(|c| find(c, name))
    }

    #[test]
    fn wrapper_carries_base_styles() {
        let root = themed("<p>x</p>");
        assert!(root.attr(EXPORT_ROOT_ATTR).is_some());
        assert_eq!(root.style_value("font-family").as_deref(), Some("Georgia, serif"));
        assert_eq!(root.style_value("color").as_deref(), Some("#222222"));
        assert_eq!(root.style_value("background-color").as_deref(), Some("#fafafa"));
    }

    #[test]
    fn rules_apply_per_element() {
        let root = themed(
            "<div><h3 style=\"color: red; margin: 0\">T</h3><a href=\"#\">l</a></div>\
             <table><tr><th>H</th></tr></table>",
        );
        let h3 = find(&root, "h3").unwrap();
        assert_eq!(h3.style_value("color").as_deref(), Some("#aa0000"));
        assert_eq!(h3.style_value("margin").as_deref(), Some("0"));
        assert_eq!(find(&root, "a").unwrap().style_value("color").as_deref(), Some("#00aa00"));
        let th = find(&root, "th").unwrap();
        assert_eq!(th.style_value("background-color").as_deref(), Some("#112233"));
        assert_eq!(th.style_value("color").as_deref(), Some("#ffffff"));
    }

    #[test]
    fn structure_is_preserved() {
        let source = parse("<p>a<b>b</b>c</p><ul><li>1</li><li>2</li></ul>").unwrap();
        let root = themed("<p>a<b>b</b>c</p><ul><li>1</li><li>2</li></ul>");
        assert_eq!(root.children, source.children);
    }
}
