//! KLayout layer-property (`.lyp`) reader.
//!
//! A `.lyp` file is an XML list of `<properties>` entries, optionally grouped
//! through `<group-members>`. Group fields are inherited by their members.
//! Every member with a concrete `layer/datatype` source becomes one
//! [`LayerStyle`]; wildcard sources are skipped.

use std::fs;
use std::io;
use std::path::Path;

use roxmltree::Node;
use thiserror::Error;

use tapeart_core::layer::{DitherPattern, LineStyle};
use tapeart_core::{Color, LayerSpec, LayerStyle, LayerStyleTable, PatternIndex};

#[derive(Error, Debug)]
pub enum LypError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("No <layer-properties> element found")]
    MissingRoot,

    #[error("Invalid value '{value}' for <{field}>")]
    InvalidValue { field: String, value: String },
}

/// Read a layer-property file from disk.
pub fn read_lyp<P: AsRef<Path>>(path: P) -> Result<LayerStyleTable, LypError> {
    let path = path.as_ref();
    log::info!("Loading layer properties {}", path.display());
    let text = fs::read_to_string(path)?;
    parse_lyp(&text)
}

/// Parse layer-property XML.
pub fn parse_lyp(text: &str) -> Result<LayerStyleTable, LypError> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc
        .descendants()
        .find(|n| n.has_tag_name("layer-properties"))
        .ok_or(LypError::MissingRoot)?;

    let mut table = LayerStyleTable::new();
    let mut order = 0usize;

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "properties" => {
                read_properties(child, &PartialStyle::default(), &mut table, &mut order)?;
            }
            "custom-dither-pattern" => {
                let (index, name) = pattern_header(child)?;
                let rows: Vec<&str> = child
                    .children()
                    .filter(|n| n.has_tag_name("pattern"))
                    .flat_map(|p| p.children().filter(|n| n.has_tag_name("line")))
                    .map(|line| line.text().unwrap_or(""))
                    .collect();
                table
                    .custom_dither_patterns
                    .insert(index, DitherPattern::from_rows(&name, &rows));
            }
            "custom-line-style" => {
                let (index, name) = pattern_header(child)?;
                let pattern = child_text(child, "pattern").unwrap_or("");
                table
                    .custom_line_styles
                    .insert(index, LineStyle::from_pattern(&name, pattern));
            }
            _ => {}
        }
    }

    log::info!(
        "Loaded {} layer styles, {} custom patterns, {} custom line styles",
        table.len(),
        table.custom_dither_patterns.len(),
        table.custom_line_styles.len()
    );
    Ok(table)
}

/// Fields of one `<properties>` entry; `None` means "inherit".
#[derive(Debug, Clone, Default)]
struct PartialStyle {
    frame_color: Option<Color>,
    fill_color: Option<Color>,
    frame_brightness: Option<i32>,
    fill_brightness: Option<i32>,
    dither_pattern: Option<PatternIndex>,
    line_style: Option<PatternIndex>,
    visible: Option<bool>,
    transparent: Option<bool>,
    width: Option<u32>,
}

impl PartialStyle {
    fn parse(node: Node) -> Result<Self, LypError> {
        Ok(Self {
            frame_color: parse_field(node, "frame-color", Color::from_hex)?,
            fill_color: parse_field(node, "fill-color", Color::from_hex)?,
            frame_brightness: parse_field(node, "frame-brightness", |s| s.parse().ok())?,
            fill_brightness: parse_field(node, "fill-brightness", |s| s.parse().ok())?,
            dither_pattern: parse_field(node, "dither-pattern", parse_pattern_index)?,
            line_style: parse_field(node, "line-style", parse_pattern_index)?,
            visible: parse_field(node, "visible", parse_bool)?,
            transparent: parse_field(node, "transparent", parse_bool)?,
            width: parse_field(node, "width", |s| s.parse().ok())?,
        })
    }

    /// `self` overrides `parent` wherever it is set, except that a hidden
    /// group hides all of its members.
    fn inherit(self, parent: &PartialStyle) -> Self {
        Self {
            frame_color: self.frame_color.or(parent.frame_color),
            fill_color: self.fill_color.or(parent.fill_color),
            frame_brightness: self.frame_brightness.or(parent.frame_brightness),
            fill_brightness: self.fill_brightness.or(parent.fill_brightness),
            dither_pattern: self.dither_pattern.or(parent.dither_pattern),
            line_style: self.line_style.or(parent.line_style),
            visible: match (self.visible, parent.visible) {
                (_, Some(false)) => Some(false),
                (own, inherited) => own.or(inherited),
            },
            transparent: self.transparent.or(parent.transparent),
            width: self.width.or(parent.width),
        }
    }

    fn resolve(&self, source: LayerSpec, name: Option<&str>, order: usize) -> LayerStyle {
        let mut style = LayerStyle::new(source);
        if let Some(name) = name {
            style.name = Some(name.to_string());
        }
        if let Some(c) = self.fill_color {
            style.fill_color = c.brighter(self.fill_brightness.unwrap_or(0));
        }
        if let Some(c) = self.frame_color {
            style.frame_color = c.brighter(self.frame_brightness.unwrap_or(0));
        }
        style.dither_pattern = self.dither_pattern.unwrap_or(style.dither_pattern);
        style.line_style = self.line_style.unwrap_or(style.line_style);
        style.visible = self.visible.unwrap_or(style.visible);
        style.transparent = self.transparent.unwrap_or(style.transparent);
        style.width = self.width.unwrap_or(style.width);
        style.order = order;
        style
    }
}

fn read_properties(
    node: Node,
    parent: &PartialStyle,
    table: &mut LayerStyleTable,
    order: &mut usize,
) -> Result<(), LypError> {
    let style = PartialStyle::parse(node)?.inherit(parent);

    let mut is_group = false;
    for members in node.children().filter(|n| n.has_tag_name("group-members")) {
        is_group = true;
        for member in members.children().filter(|n| n.has_tag_name("properties")) {
            read_properties(member, &style, table, order)?;
        }
    }
    if is_group {
        return Ok(());
    }

    let source_text = child_text(node, "source").unwrap_or("");
    let Some(source) = parse_source(source_text) else {
        log::debug!("Skipping layer entry with source '{}'", source_text);
        return Ok(());
    };

    let name = child_text(node, "name").filter(|s| !s.is_empty());
    if !table.insert(style.resolve(source, name, *order)) {
        log::warn!("Duplicate layer property for {}; keeping the first", source);
    }
    *order += 1;
    Ok(())
}

/// `<order>` and `<name>` of a custom pattern definition.
fn pattern_header(node: Node) -> Result<(u32, String), LypError> {
    let order = child_text(node, "order").unwrap_or("0");
    let index = order.parse().map_err(|_| LypError::InvalidValue {
        field: "order".into(),
        value: order.into(),
    })?;
    let name = child_text(node, "name").unwrap_or("").to_string();
    Ok((index, name))
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .map(|n| n.text().unwrap_or("").trim())
}

/// Parse an optional child element; empty elements count as absent.
fn parse_field<T>(
    node: Node,
    tag: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, LypError> {
    match child_text(node, tag) {
        None | Some("") => Ok(None),
        Some(value) => parse(value).map(Some).ok_or_else(|| LypError::InvalidValue {
            field: tag.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `I<n>` built-in, `C<n>` custom, or a bare built-in number.
fn parse_pattern_index(s: &str) -> Option<PatternIndex> {
    if let Some(n) = s.strip_prefix('I') {
        n.parse().ok().map(PatternIndex::Builtin)
    } else if let Some(n) = s.strip_prefix('C') {
        n.parse().ok().map(PatternIndex::Custom)
    } else {
        s.parse().ok().map(PatternIndex::Builtin)
    }
}

/// Extract `layer/datatype` from a source such as `1/0@1`,
/// `Activ 1/0@1` or `Activ (1/0)@1`.
fn parse_source(source: &str) -> Option<LayerSpec> {
    source
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '@')
        .find_map(|token| {
            let (layer, datatype) = token.split_once('/')?;
            Some(LayerSpec::new(layer.parse().ok()?, datatype.parse().ok()?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<layer-properties>
 <properties>
  <frame-color>#00ff00</frame-color>
  <fill-color>#00ff00</fill-color>
  <frame-brightness>0</frame-brightness>
  <fill-brightness>0</fill-brightness>
  <dither-pattern>I5</dither-pattern>
  <line-style/>
  <valid>true</valid>
  <visible>true</visible>
  <transparent>false</transparent>
  <width>1</width>
  <marked>false</marked>
  <xfill>false</xfill>
  <animation>0</animation>
  <name>Activ.drawing</name>
  <source>1/0@1</source>
 </properties>
 <properties>
  <frame-color>#808080</frame-color>
  <fill-color>#808080</fill-color>
  <dither-pattern>C1</dither-pattern>
  <visible>true</visible>
  <width>2</width>
  <name>TopMetal2.drawing</name>
  <source>TopMetal2 (126/0)@1</source>
 </properties>
 <properties>
  <fill-color>#0000ff</fill-color>
  <visible>false</visible>
  <source>*/*@*</source>
  <group-members>
   <properties>
    <name>Metal1.drawing</name>
    <source>8/0@1</source>
   </properties>
   <properties>
    <visible>true</visible>
    <fill-color>#ff0000</fill-color>
    <source>Metal1.pin 8/2@1</source>
   </properties>
  </group-members>
 </properties>
 <properties>
  <fill-color>#ffffff</fill-color>
  <source>1/0@1</source>
 </properties>
 <custom-dither-pattern>
  <pattern>
   <line>*.</line>
   <line>.*</line>
  </pattern>
  <order>1</order>
  <name>checker</name>
 </custom-dither-pattern>
 <custom-line-style>
  <pattern>**..</pattern>
  <order>1</order>
  <name>dash</name>
 </custom-line-style>
 <name>sg13g2</name>
</layer-properties>
"##;

    #[test]
    fn test_parse_sample() {
        let table = parse_lyp(SAMPLE).unwrap();
        assert_eq!(table.len(), 4);

        let activ = table.get(&LayerSpec::new(1, 0)).unwrap();
        assert_eq!(activ.name.as_deref(), Some("Activ.drawing"));
        assert_eq!(activ.fill_color, Color(0x00ff00));
        assert_eq!(activ.dither_pattern, PatternIndex::Builtin(5));
        assert_eq!(activ.line_style, PatternIndex::SOLID);
        assert!(activ.visible);
        assert_eq!(activ.order, 0);

        let top_metal = table.get(&LayerSpec::new(126, 0)).unwrap();
        assert_eq!(top_metal.dither_pattern, PatternIndex::Custom(1));
        assert_eq!(top_metal.width, 2);
    }

    #[test]
    fn test_group_members_inherit() {
        let table = parse_lyp(SAMPLE).unwrap();
        let m1 = table.get(&LayerSpec::new(8, 0)).unwrap();
        assert_eq!(m1.fill_color, Color(0x0000ff));
        assert!(!m1.visible);

        // Its own flag does not unhide a member of a hidden group.
        let pin = table.get(&LayerSpec::new(8, 2)).unwrap();
        assert_eq!(pin.fill_color, Color(0xff0000));
        assert!(!pin.visible);
        assert!(pin.order > m1.order);
    }

    #[test]
    fn test_member_of_visible_group_can_hide() {
        let lyp = "<layer-properties><properties><visible>true</visible>\
                   <group-members>\
                   <properties><source>5/0@1</source></properties>\
                   <properties><visible>false</visible><source>6/0@1</source></properties>\
                   </group-members></properties></layer-properties>";
        let table = parse_lyp(lyp).unwrap();
        assert!(table.get(&LayerSpec::new(5, 0)).unwrap().visible);
        assert!(!table.get(&LayerSpec::new(6, 0)).unwrap().visible);
    }

    #[test]
    fn test_duplicate_source_keeps_first() {
        let table = parse_lyp(SAMPLE).unwrap();
        assert_eq!(
            table.get(&LayerSpec::new(1, 0)).unwrap().fill_color,
            Color(0x00ff00)
        );
    }

    #[test]
    fn test_custom_patterns() {
        let table = parse_lyp(SAMPLE).unwrap();
        let checker = &table.custom_dither_patterns[&1];
        assert_eq!(checker.name, "checker");
        assert!(checker.is_set(0, 0));
        assert!(!checker.is_set(0, 1));
        assert_eq!(table.custom_line_styles[&1].bits, vec![true, true, false, false]);
    }

    #[test]
    fn test_parse_source_forms() {
        assert_eq!(parse_source("1/0@1"), Some(LayerSpec::new(1, 0)));
        assert_eq!(parse_source("Activ 1/0@1"), Some(LayerSpec::new(1, 0)));
        assert_eq!(parse_source("TopMetal2 (126/0)@1"), Some(LayerSpec::new(126, 0)));
        assert_eq!(parse_source("*/*@*"), None);
        assert_eq!(parse_source(""), None);
    }

    #[test]
    fn test_invalid_values() {
        let bad = "<layer-properties><properties><visible>maybe</visible>\
                   <source>1/0@1</source></properties></layer-properties>";
        assert!(matches!(
            parse_lyp(bad),
            Err(LypError::InvalidValue { ref field, .. }) if field == "visible"
        ));
        assert!(matches!(parse_lyp("<other/>"), Err(LypError::MissingRoot)));
        assert!(matches!(parse_lyp("<unclosed>"), Err(LypError::Xml(_))));
    }

    #[test]
    fn test_brightness_applied() {
        let xml = "<layer-properties><properties><fill-color>#404040</fill-color>\
                   <fill-brightness>-256</fill-brightness><source>5/0@1</source>\
                   </properties></layer-properties>";
        let table = parse_lyp(xml).unwrap();
        assert_eq!(table.get(&LayerSpec::new(5, 0)).unwrap().fill_color, Color::BLACK);
    }

    #[test]
    fn test_read_lyp_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_lyp(dir.path().join("none.lyp")).unwrap_err();
        assert!(matches!(err, LypError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
