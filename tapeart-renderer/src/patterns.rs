//! Built-in dither patterns and line styles, numbered like KLayout's.

use tapeart_core::layer::{DitherPattern, LineStyle};
use tapeart_core::{LayerStyleTable, PatternIndex};

/// Diagonal hatch with the given period and stroke thickness.
/// `left` hatches run top-left to bottom-right.
fn hatch(name: &str, period: usize, thickness: usize, left: bool) -> DitherPattern {
    let rows: Vec<String> = (0..period)
        .map(|y| {
            (0..period)
                .map(|x| {
                    let d = if left {
                        (x + period - y) % period
                    } else {
                        (x + y) % period
                    };
                    if d < thickness {
                        '*'
                    } else {
                        '.'
                    }
                })
                .collect()
        })
        .collect();
    DitherPattern::from_rows(name, &rows)
}

/// Union of a left and a right hatch.
fn cross(name: &str, period: usize, thickness: usize) -> DitherPattern {
    let l = hatch(name, period, thickness, true);
    let r = hatch(name, period, thickness, false);
    DitherPattern {
        name: name.to_string(),
        rows: l
            .rows
            .iter()
            .zip(&r.rows)
            .map(|(a, b)| a.iter().zip(b).map(|(p, q)| *p || *q).collect())
            .collect(),
    }
}

/// The built-in fill stipple for `index`.
pub fn builtin_dither(index: u32) -> Option<DitherPattern> {
    let p = |name: &str, rows: &[&str]| DitherPattern::from_rows(name, rows);
    Some(match index {
        0 => p("solid", &["*"]),
        1 => p("hollow", &["."]),
        2 => p("dotted", &["*.", ".."]),
        3 => p("coarsely dotted", &["*...", "....", "..*.", "...."]),
        4 => hatch("left-hatched", 4, 1, true),
        5 => hatch("lightly left-hatched", 8, 1, true),
        6 => hatch("strongly left-hatched dense", 4, 2, true),
        7 => hatch("strongly left-hatched sparse", 8, 2, true),
        8 => hatch("right-hatched", 4, 1, false),
        9 => hatch("lightly right-hatched", 8, 1, false),
        10 => hatch("strongly right-hatched dense", 4, 2, false),
        11 => hatch("strongly right-hatched sparse", 8, 2, false),
        12 => cross("cross-hatched", 4, 1),
        13 => cross("lightly cross-hatched", 8, 1),
        14 => p("checkerboard 2px", &["**..", "**..", "..**", "..**"]),
        15 => cross("strongly cross-hatched sparse", 8, 2),
        16 => p("heavy checkerboard", &["*.", ".*"]),
        17 => p("hollow bubbles", &[".***....", "*...*...", "*...*...", "*...*...", ".***....", "........", "........", "........"]),
        18 => p("solid bubbles", &[".***....", "*****...", "*****...", "*****...", ".***....", "........", "........", "........"]),
        19 => p("pyramids", &["...*....", "..*.*...", ".*...*..", "*******.", "........", "........", "........", "........"]),
        20 => p("turned pyramids", &["*******.", ".*...*..", "..*.*...", "...*....", "........", "........", "........", "........"]),
        21 => p("plus", &["..*.....", "..*.....", "*****...", "..*.....", "..*.....", "........", "........", "........"]),
        22 => p("minus", &["........", "........", "*****...", "........", "........", "........", "........", "........"]),
        23 => p("horizontal lines", &["*", ".", ".", "."]),
        24 => p("vertical lines", &["*..."]),
        _ => return None,
    })
}

/// The built-in line style for `index`.
pub fn builtin_line_style(index: u32) -> Option<LineStyle> {
    let l = |name: &str, pattern: &str| LineStyle::from_pattern(name, pattern);
    Some(match index {
        0 => l("solid", "*"),
        1 => l("dotted", "*."),
        2 => l("dashed", "****...."),
        3 => l("dash-dotted", "******..*.."),
        4 => l("short dashed", "**.."),
        5 => l("short dash-dotted", "**..*.."),
        6 => l("long dashed", "************...."),
        7 => l("dash-double-dotted", "******..*..*.."),
        _ => return None,
    })
}

/// Resolves pattern references against the built-ins and a table's custom
/// definitions. Unknown references fall back to solid.
pub struct Stipples<'a> {
    table: &'a LayerStyleTable,
    solid: DitherPattern,
    solid_line: LineStyle,
}

impl<'a> Stipples<'a> {
    pub fn new(table: &'a LayerStyleTable) -> Self {
        Self {
            table,
            solid: DitherPattern::from_rows("solid", &["*"]),
            solid_line: LineStyle::from_pattern("solid", "*"),
        }
    }

    pub fn dither(&self, index: PatternIndex) -> DitherPattern {
        let found = match index {
            PatternIndex::Builtin(i) => builtin_dither(i),
            PatternIndex::Custom(i) => self.table.custom_dither_patterns.get(&i).cloned(),
        };
        found.unwrap_or_else(|| {
            log::debug!("Unknown dither pattern {:?}, using solid", index);
            self.solid.clone()
        })
    }

    pub fn line_style(&self, index: PatternIndex) -> LineStyle {
        let found = match index {
            PatternIndex::Builtin(i) => builtin_line_style(i),
            PatternIndex::Custom(i) => self.table.custom_line_styles.get(&i).cloned(),
        };
        found.unwrap_or_else(|| {
            log::debug!("Unknown line style {:?}, using solid", index);
            self.solid_line.clone()
        })
    }
}

/// Whether a pattern draws nothing at all.
pub fn is_hollow(pattern: &DitherPattern) -> bool {
    pattern.rows.iter().all(|row| row.iter().all(|bit| !bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_solid_and_hollow() {
        let solid = builtin_dither(0).unwrap();
        assert!(solid.is_set(17, 3));
        let hollow = builtin_dither(1).unwrap();
        assert!(is_hollow(&hollow));
        assert!(!is_hollow(&solid));
    }

    #[test]
    fn test_hatch_direction() {
        let left = builtin_dither(4).unwrap();
        assert!(left.is_set(0, 0));
        assert!(left.is_set(1, 1));
        assert!(!left.is_set(1, 0));
        let right = builtin_dither(8).unwrap();
        assert!(right.is_set(0, 0));
        assert!(right.is_set(3, 1));
        assert!(!right.is_set(1, 1));
    }

    #[test]
    fn test_every_builtin_is_square_or_row() {
        for i in 0..=24 {
            let p = builtin_dither(i).unwrap();
            assert!(!p.rows.is_empty(), "pattern {} is empty", i);
        }
        assert!(builtin_dither(200).is_none());
    }

    #[test]
    fn test_stipples_resolve_custom_and_fallback() {
        let mut table = LayerStyleTable::new();
        table
            .custom_dither_patterns
            .insert(3, DitherPattern::from_rows("mine", &["."]));
        let stipples = Stipples::new(&table);
        assert!(is_hollow(&stipples.dither(PatternIndex::Custom(3))));
        assert!(!is_hollow(&stipples.dither(PatternIndex::Custom(4))));
        assert_eq!(stipples.line_style(PatternIndex::Builtin(2)).name, "dashed");
        assert_eq!(stipples.line_style(PatternIndex::Builtin(99)).name, "solid");
    }
}
