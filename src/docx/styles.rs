use crate::theme::{Palette, to_hex};

use super::{WML_NS, escape_xml};

/// Half-point sizes of the built-in paragraph styles.
const TITLE_HALF_PTS: u32 = 48;
const BODY_HALF_PTS: u32 = 22;

pub(super) fn heading_half_pts(level: u8) -> u32 {
    match level {
        1 => 36,
        2 => 30,
        3 => 26,
        4 => 24,
        _ => 22,
    }
}

fn paragraph_style(id: &str, name: &str, half_pts: u32, color: &str, space_before: u32) -> String {
    format!(
        r#"<w:style w:type="paragraph" w:styleId="{id}"><w:name w:val="{name}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="{space_before}" w:after="120"/></w:pPr><w:rPr><w:b/><w:color w:val="{color}"/><w:sz w:val="{half_pts}"/><w:szCs w:val="{half_pts}"/></w:rPr></w:style>"#
    )
}

/// `word/styles.xml`: document defaults in the theme font and text colour,
/// plus `Title` and `Heading1`..`Heading6` in the primary colour.
pub(super) fn styles_xml(font: &str, palette: &Palette) -> String {
    let font = escape_xml(font);
    let text = to_hex(palette.text);
    let primary = to_hex(palette.primary);
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="{WML_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/><w:color w:val="{text}"/><w:sz w:val="{BODY_HALF_PTS}"/><w:szCs w:val="{BODY_HALF_PTS}"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#
    );
    xml.push_str(&paragraph_style("Title", "Title", TITLE_HALF_PTS, &primary, 0));
    for level in 1..=6u8 {
        xml.push_str(&paragraph_style(
            &format!("Heading{level}"),
            &format!("heading {level}"),
            heading_half_pts(level),
            &primary,
            240,
        ));
    }
    xml.push_str(r#"<w:style w:type="character" w:styleId="Hyperlink"><w:name w:val="Hyperlink"/><w:rPr><w:u w:val="single"/></w:rPr></w:style>"#);
    xml.push_str("</w:styles>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;

    #[test]
    fn headings_use_primary_colour() {
        let palette = Palette::of(&Theme {
            primary: "#aa0000".into(),
            ..Theme::default()
        });
        let xml = styles_xml("Georgia", &palette);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let title = doc
            .descendants()
            .find(|n| n.attribute((WML_NS, "styleId")) == Some("Title"))
            .unwrap();
        let color = title
            .descendants()
            .find(|n| n.tag_name().name() == "color")
            .and_then(|n| n.attribute((WML_NS, "val")));
        assert_eq!(color, Some("aa0000"));
        assert!(xml.contains(r#"w:styleId="Heading6""#));
        assert!(xml.contains(r#"w:ascii="Georgia""#));
    }
}
