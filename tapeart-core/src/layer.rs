use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A GDS drawing layer: `(layer, datatype)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u16, u16)", into = "(u16, u16)")]
pub struct LayerSpec {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerSpec {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

impl From<(u16, u16)> for LayerSpec {
    fn from((layer, datatype): (u16, u16)) -> Self {
        Self::new(layer, datatype)
    }
}

impl From<LayerSpec> for (u16, u16) {
    fn from(spec: LayerSpec) -> Self {
        (spec.layer, spec.datatype)
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.datatype)
    }
}

/// 24-bit RGB color, `0xRRGGBB`. `Color(0)` is black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xFFFFFF);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Parse `#rrggbb` (or `#rgb`).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(Color),
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let (r, g, b) = ((v >> 8) & 0xF, (v >> 4) & 0xF, v & 0xF);
                Some(Color((r * 17) << 16 | (g * 17) << 8 | b * 17))
            }
            _ => None,
        }
    }

    pub fn r(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(&self) -> u8 {
        self.0 as u8
    }

    pub fn to_rgb_array(&self) -> [u8; 3] {
        [self.r(), self.g(), self.b()]
    }

    /// Brightness adjustment as used by layer-property files:
    /// positive values move towards white, negative towards black.
    pub fn brighter(&self, amount: i32) -> Self {
        if amount == 0 {
            return *self;
        }
        let adjust = |c: u8| -> u8 {
            let c = c as i32;
            let v = if amount > 0 {
                255 - ((255 - c) * (256 - amount.min(255))) / 256
            } else {
                (c * (256 + amount.max(-255))) / 256
            };
            v.clamp(0, 255) as u8
        };
        Color::rgb(adjust(self.r()), adjust(self.g()), adjust(self.b()))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xFF_FFFF)
    }
}

/// Reference to a dither pattern or line style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternIndex {
    /// One of the built-in stipples.
    Builtin(u32),
    /// A pattern defined by the layer-property file, by its order number.
    Custom(u32),
}

impl PatternIndex {
    /// Solid fill / solid line.
    pub const SOLID: PatternIndex = PatternIndex::Builtin(0);
}

impl Default for PatternIndex {
    fn default() -> Self {
        Self::SOLID
    }
}

/// A custom fill stipple: rows of on/off pixels, top row first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DitherPattern {
    pub name: String,
    pub rows: Vec<Vec<bool>>,
}

impl DitherPattern {
    /// Build from rows such as `"*.*."`.
    pub fn from_rows<S: AsRef<str>>(name: &str, rows: &[S]) -> Self {
        Self {
            name: name.to_string(),
            rows: rows
                .iter()
                .map(|r| r.as_ref().chars().map(|c| c == '*' || c == 'x').collect())
                .filter(|r: &Vec<bool>| !r.is_empty())
                .collect(),
        }
    }

    /// Whether the pixel at `(x, y)` is set. Empty patterns are solid.
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if self.rows.is_empty() {
            return true;
        }
        let row = &self.rows[y as usize % self.rows.len()];
        row.is_empty() || row[x as usize % row.len()]
    }
}

/// A custom outline stipple: one period of on/off pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub name: String,
    pub bits: Vec<bool>,
}

impl LineStyle {
    pub fn from_pattern(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            bits: pattern.chars().map(|c| c == '*' || c == 'x').collect(),
        }
    }

    pub fn is_set(&self, step: u32) -> bool {
        self.bits.is_empty() || self.bits[step as usize % self.bits.len()]
    }
}

/// Visual attributes of one drawing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub source: LayerSpec,
    pub name: Option<String>,
    pub visible: bool,
    pub transparent: bool,
    pub fill_color: Color,
    pub frame_color: Color,
    pub dither_pattern: PatternIndex,
    pub line_style: PatternIndex,
    /// Outline width in pixels; 0 draws no outline.
    pub width: u32,
    /// Position in the layer-property list; higher values are drawn on top.
    pub order: usize,
}

impl LayerStyle {
    pub fn new(source: LayerSpec) -> Self {
        Self {
            source,
            name: None,
            visible: true,
            transparent: false,
            fill_color: Color(0x808080),
            frame_color: Color(0x808080),
            dither_pattern: PatternIndex::SOLID,
            line_style: PatternIndex::SOLID,
            width: 1,
            order: 0,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.fill_color = color;
        self.frame_color = color;
        self
    }

    pub fn with_pattern(mut self, pattern: PatternIndex) -> Self {
        self.dither_pattern = pattern;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Solid fill without outline.
    pub fn set_solid_fill(&mut self) {
        self.dither_pattern = PatternIndex::SOLID;
        self.line_style = PatternIndex::SOLID;
        self.frame_color = Color::BLACK;
        self.width = 0;
    }
}

/// Styles of every layer known to a technology, keyed by [`LayerSpec`].
#[derive(Debug, Clone, Default)]
pub struct LayerStyleTable {
    styles: HashMap<LayerSpec, LayerStyle>,
    pub custom_dither_patterns: BTreeMap<u32, DitherPattern>,
    pub custom_line_styles: BTreeMap<u32, LineStyle>,
}

impl LayerStyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a style. The first style seen for a layer wins; returns `false`
    /// when the layer was already present.
    pub fn insert(&mut self, style: LayerStyle) -> bool {
        if self.styles.contains_key(&style.source) {
            return false;
        }
        self.styles.insert(style.source, style);
        true
    }

    pub fn get(&self, spec: &LayerSpec) -> Option<&LayerStyle> {
        self.styles.get(spec)
    }

    pub fn get_mut(&mut self, spec: &LayerSpec) -> Option<&mut LayerStyle> {
        self.styles.get_mut(spec)
    }

    pub fn contains(&self, spec: &LayerSpec) -> bool {
        self.styles.contains_key(spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerStyle> {
        self.styles.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LayerStyle> {
        self.styles.values_mut()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Styles sorted bottom-most first.
    pub fn drawing_order(&self) -> Vec<&LayerStyle> {
        let mut styles: Vec<&LayerStyle> = self.styles.values().collect();
        styles.sort_by_key(|s| (s.order, s.source));
        styles
    }
}

/// Per-layer overrides applied on top of a technology's layer properties.
///
/// Layers in `disabled` are hidden. Layers in `fill` are drawn as solid
/// regions without outline; their visibility is left alone, so a layer in
/// both sets ends up fill-styled and hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerOverridePolicy {
    #[serde(default)]
    pub disabled: BTreeSet<LayerSpec>,
    #[serde(default)]
    pub fill: BTreeSet<LayerSpec>,
}

/// What [`LayerOverridePolicy::apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideReport {
    pub hidden: Vec<LayerSpec>,
    pub filled: Vec<LayerSpec>,
    /// Policy layers the table does not define.
    pub missing: Vec<LayerSpec>,
}

impl Default for LayerOverridePolicy {
    /// Policy for IHP SG13G2 snapshots.
    fn default() -> Self {
        Self {
            disabled: [LayerSpec::new(189, 4), LayerSpec::new(126, 23)]
                .into_iter()
                .collect(),
            fill: [LayerSpec::new(126, 0)].into_iter().collect(),
        }
    }
}

impl LayerOverridePolicy {
    pub fn empty() -> Self {
        Self {
            disabled: BTreeSet::new(),
            fill: BTreeSet::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Mutate `table` in place. Layers outside both sets are not touched.
    pub fn apply(&self, table: &mut LayerStyleTable) -> OverrideReport {
        let mut report = OverrideReport::default();

        for style in table.iter_mut() {
            if self.disabled.contains(&style.source) {
                style.visible = false;
                report.hidden.push(style.source);
            }
            if self.fill.contains(&style.source) {
                style.set_solid_fill();
                report.filled.push(style.source);
            }
        }
        report.hidden.sort();
        report.filled.sort();

        for spec in self.disabled.union(&self.fill) {
            if !table.contains(spec) {
                log::warn!("Layer override for {} has no matching layer property", spec);
                report.missing.push(*spec);
            }
        }

        log::debug!(
            "Layer overrides: {} hidden, {} filled, {} missing",
            report.hidden.len(),
            report.filled.len(),
            report.missing.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LayerStyleTable {
        let mut table = LayerStyleTable::new();
        let mut order = 0;
        for (l, d, color) in [
            (1, 0, 0x00ff00),
            (8, 0, 0x0000ff),
            (126, 0, 0x808080),
            (189, 4, 0xff0000),
            (126, 23, 0x00ffff),
        ] {
            let mut style = LayerStyle::new(LayerSpec::new(l, d))
                .with_color(Color(color))
                .with_pattern(PatternIndex::Builtin(5));
            style.line_style = PatternIndex::Builtin(2);
            style.width = 2;
            style.order = order;
            order += 1;
            table.insert(style);
        }
        table
    }

    #[test]
    fn test_default_policy_hides_and_fills() {
        let mut t = table();
        let report = LayerOverridePolicy::default().apply(&mut t);

        assert!(!t.get(&LayerSpec::new(189, 4)).unwrap().visible);
        assert!(!t.get(&LayerSpec::new(126, 23)).unwrap().visible);

        let filled = t.get(&LayerSpec::new(126, 0)).unwrap();
        assert!(filled.visible);
        assert_eq!(filled.dither_pattern, PatternIndex::SOLID);
        assert_eq!(filled.line_style, PatternIndex::SOLID);
        assert_eq!(filled.frame_color, Color::BLACK);
        assert_eq!(filled.width, 0);
        // fill color comes from the table
        assert_eq!(filled.fill_color, Color(0x808080));

        assert_eq!(report.filled, vec![LayerSpec::new(126, 0)]);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_fill_does_not_restore_visibility() {
        let mut t = table();
        let spec = LayerSpec::new(8, 0);
        let policy = LayerOverridePolicy {
            disabled: [spec].into_iter().collect(),
            fill: [spec].into_iter().collect(),
        };
        policy.apply(&mut t);

        let style = t.get(&spec).unwrap();
        assert!(!style.visible);
        assert_eq!(style.dither_pattern, PatternIndex::SOLID);
        assert_eq!(style.width, 0);
    }

    #[test]
    fn test_fill_only_keeps_table_visibility() {
        let mut t = table();
        let spec = LayerSpec::new(1, 0);
        t.get_mut(&spec).unwrap().visible = false;
        let policy = LayerOverridePolicy {
            disabled: BTreeSet::new(),
            fill: [spec].into_iter().collect(),
        };
        policy.apply(&mut t);
        assert!(!t.get(&spec).unwrap().visible);
    }

    #[test]
    fn test_untargeted_layers_unchanged() {
        let before = table();
        let mut after = before.clone();
        LayerOverridePolicy::default().apply(&mut after);
        for spec in [LayerSpec::new(1, 0), LayerSpec::new(8, 0)] {
            assert_eq!(before.get(&spec), after.get(&spec));
        }
    }

    #[test]
    fn test_missing_layers_reported() {
        let mut t = LayerStyleTable::new();
        t.insert(LayerStyle::new(LayerSpec::new(1, 0)));
        let report = LayerOverridePolicy::default().apply(&mut t);
        assert_eq!(report.missing.len(), 3);
        assert!(t.get(&LayerSpec::new(1, 0)).unwrap().visible);
    }

    #[test]
    fn test_policy_from_json() {
        let policy =
            LayerOverridePolicy::from_json(r#"{"disabled": [[189, 4]], "fill": [[126, 0]]}"#)
                .unwrap();
        assert!(policy.disabled.contains(&LayerSpec::new(189, 4)));
        assert!(policy.fill.contains(&LayerSpec::new(126, 0)));

        let only_fill = LayerOverridePolicy::from_json(r#"{"fill": [[5, 1]]}"#).unwrap();
        assert!(only_fill.disabled.is_empty());
    }

    #[test]
    fn test_first_style_wins() {
        let mut t = LayerStyleTable::new();
        assert!(t.insert(LayerStyle::new(LayerSpec::new(1, 0)).with_name("first")));
        assert!(!t.insert(LayerStyle::new(LayerSpec::new(1, 0)).with_name("second")));
        assert_eq!(t.get(&LayerSpec::new(1, 0)).unwrap().name.as_deref(), Some("first"));
    }

    #[test]
    fn test_color_parse_and_brightness() {
        assert_eq!(Color::from_hex("#ff8000"), Some(Color(0xff8000)));
        assert_eq!(Color::from_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("red"), None);
        assert_eq!(Color(0x123456).brighter(0), Color(0x123456));
        assert_eq!(Color::BLACK.brighter(-64), Color::BLACK);
        let lighter = Color(0x404040).brighter(128);
        assert!(lighter.r() > 0x40);
    }

    #[test]
    fn test_dither_pattern_lookup() {
        let p = DitherPattern::from_rows("checker", &["*.", ".*"]);
        assert!(p.is_set(0, 0));
        assert!(!p.is_set(1, 0));
        assert!(p.is_set(3, 1));
        let l = LineStyle::from_pattern("dash", "**..");
        assert!(l.is_set(1));
        assert!(!l.is_set(6));
    }
}
