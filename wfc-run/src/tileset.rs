use hashbrown::HashMap;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::{
    attributes, bool_attribute, f64_attribute, required, Attributes, ConfigError,
};

/// One `<tile>` declaration from a rules file.
#[derive(Debug, Clone)]
pub struct TileDecl {
    pub name: String,
    pub symmetry: char,
    pub weight: f64,
}

/// Simple-tiled neighbour rule: `left` (at the given orientation) may sit
/// immediately west of `right`.
#[derive(Debug, Clone)]
pub struct PairRule {
    pub left: String,
    pub left_orientation: u32,
    pub right: String,
    pub right_orientation: u32,
}

/// Mosaic neighbour rule: four directional flags for one (tile, neighbour)
/// pair.
#[derive(Debug, Clone)]
pub struct CellRule {
    pub tile: String,
    pub neighbor: String,
    pub up: bool,
    pub left: bool,
    pub right: bool,
    pub down: bool,
}

/// A parsed rules file. `pair_rules` is populated by simple-tiled style
/// `<neighbor left right>` elements, `cell_rules` by mosaic style
/// per-tile blocks; a file uses one or the other.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub unique: bool,
    pub tiles: Vec<TileDecl>,
    pub pair_rules: Vec<PairRule>,
    pub cell_rules: Vec<CellRule>,
    pub subsets: HashMap<String, Vec<String>>,
}

impl RuleSet {
    /// The tile names selected by `subset`. `None` means no filtering:
    /// either the subset is not declared or it is empty.
    pub fn subset_filter(&self, subset: &str) -> Option<&[String]> {
        match self.subsets.get(subset) {
            Some(names) if !names.is_empty() => Some(names),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Top,
    Tiles,
    Neighbors,
    Subsets,
}

fn oriented_name(
    attrs: &Attributes,
    element: &str,
    attribute: &str,
) -> Result<(String, u32), ConfigError> {
    let value = required(attrs, element, attribute)?;
    let mut parts = value.splitn(2, ' ');
    let name = parts.next().unwrap_or("").to_string();
    let orientation = match parts.next() {
        None => 0,
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAttribute {
                element: element.to_string(),
                attribute: attribute.to_string(),
                value: value.clone(),
            })?,
    };
    Ok((name, orientation))
}

fn tile_decl(attrs: &Attributes) -> Result<TileDecl, ConfigError> {
    Ok(TileDecl {
        name: required(attrs, "tile", "name")?,
        symmetry: attrs
            .get("symmetry")
            .and_then(|s| s.chars().next())
            .unwrap_or('X'),
        weight: f64_attribute(attrs, "tile", "weight", 1.0)?,
    })
}

/// Parse a rules file: a `<set>` root with `<tiles>`, `<neighbors>` and
/// optional `<subsets>` blocks.
pub fn parse_rule_set(xml: &str) -> Result<RuleSet, ConfigError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rule_set = RuleSet::default();
    let mut section = Section::Top;
    let mut rule_tile: Option<String> = None;
    let mut subset_name: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ConfigError::Xml(e.to_string()))?;
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));
                match element.name().as_ref() {
                    b"set" => {
                        let attrs = attributes(element)?;
                        rule_set.unique = bool_attribute(&attrs, "set", "unique", false)?;
                    }
                    b"tiles" if is_start => section = Section::Tiles,
                    b"neighbors" if is_start => section = Section::Neighbors,
                    b"subsets" if is_start => section = Section::Subsets,
                    b"tile" => match section {
                        Section::Tiles => {
                            rule_set.tiles.push(tile_decl(&attributes(element)?)?);
                        }
                        Section::Neighbors => {
                            let attrs = attributes(element)?;
                            let name = required(&attrs, "tile", "name")?;
                            if is_start {
                                rule_tile = Some(name);
                            }
                        }
                        Section::Subsets => {
                            let attrs = attributes(element)?;
                            let name = required(&attrs, "tile", "name")?;
                            if let Some(subset) = &subset_name {
                                rule_set
                                    .subsets
                                    .get_mut(subset)
                                    .expect("open subset is registered")
                                    .push(name);
                            }
                        }
                        Section::Top => {}
                    },
                    b"neighbor" if section == Section::Neighbors => {
                        let attrs = attributes(element)?;
                        match &rule_tile {
                            Some(tile) => {
                                rule_set.cell_rules.push(CellRule {
                                    tile: tile.clone(),
                                    neighbor: required(&attrs, "neighbor", "name")?,
                                    up: bool_attribute(&attrs, "neighbor", "up", false)?,
                                    left: bool_attribute(&attrs, "neighbor", "left", false)?,
                                    right: bool_attribute(&attrs, "neighbor", "right", false)?,
                                    down: bool_attribute(&attrs, "neighbor", "down", false)?,
                                });
                            }
                            None => {
                                let (left, left_orientation) =
                                    oriented_name(&attrs, "neighbor", "left")?;
                                let (right, right_orientation) =
                                    oriented_name(&attrs, "neighbor", "right")?;
                                rule_set.pair_rules.push(PairRule {
                                    left,
                                    left_orientation,
                                    right,
                                    right_orientation,
                                });
                            }
                        }
                    }
                    b"subset" if section == Section::Subsets => {
                        let attrs = attributes(element)?;
                        let name = required(&attrs, "subset", "name")?;
                        rule_set.subsets.entry(name.clone()).or_default();
                        if is_start {
                            subset_name = Some(name);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref element) => match element.name().as_ref() {
                b"tiles" | b"neighbors" | b"subsets" => section = Section::Top,
                b"tile" => rule_tile = None,
                b"subset" => subset_name = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rule_set)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_simpletiled_rules_file() {
        let xml = r#"
            <set>
              <tiles>
                <tile name="corner" symmetry="L" weight="0.5"/>
                <tile name="line" symmetry="I"/>
                <tile name="blank"/>
              </tiles>
              <neighbors>
                <neighbor left="corner 1" right="line"/>
                <neighbor left="blank" right="blank"/>
              </neighbors>
              <subsets>
                <subset name="Plain">
                  <tile name="blank"/>
                  <tile name="line"/>
                </subset>
              </subsets>
            </set>
        "#;
        let rules = parse_rule_set(xml).unwrap();
        assert!(!rules.unique);
        assert_eq!(rules.tiles.len(), 3);
        assert_eq!(rules.tiles[0].symmetry, 'L');
        assert_eq!(rules.tiles[0].weight, 0.5);
        assert_eq!(rules.tiles[2].symmetry, 'X');
        assert_eq!(rules.tiles[2].weight, 1.0);

        assert_eq!(rules.pair_rules.len(), 2);
        assert_eq!(rules.pair_rules[0].left, "corner");
        assert_eq!(rules.pair_rules[0].left_orientation, 1);
        assert_eq!(rules.pair_rules[0].right, "line");
        assert_eq!(rules.pair_rules[0].right_orientation, 0);

        assert_eq!(
            rules.subset_filter("Plain"),
            Some(&["blank".to_string(), "line".to_string()][..])
        );
        assert_eq!(rules.subset_filter("tiles"), None);
    }

    #[test]
    fn parses_a_mosaic_rules_file() {
        let xml = r#"
            <set>
              <tiles>
                <tile name="water"/>
                <tile name="shore"/>
              </tiles>
              <neighbors>
                <tile name="water">
                  <neighbor name="water" up="true" left="true" right="true" down="true"/>
                  <neighbor name="shore" right="true"/>
                </tile>
              </neighbors>
            </set>
        "#;
        let rules = parse_rule_set(xml).unwrap();
        assert!(rules.pair_rules.is_empty());
        assert_eq!(rules.cell_rules.len(), 2);
        let shore = &rules.cell_rules[1];
        assert_eq!(shore.tile, "water");
        assert_eq!(shore.neighbor, "shore");
        assert!(shore.right && !shore.up && !shore.left && !shore.down);
    }

    #[test]
    fn unique_flag_is_read_from_the_root() {
        let rules = parse_rule_set(r#"<set unique="true"><tiles/></set>"#).unwrap();
        assert!(rules.unique);
    }
}
