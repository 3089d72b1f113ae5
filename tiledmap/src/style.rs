//! Style driven type selection
//!
//! A style decides which object types are visible at a given magnification.
//! The service only needs that decision, expressed as a [`TypeDefinition`]:
//! one type set per category telling the loaders what to request.
//!
//! [`StyleSheet`] is a small declarative implementation of
//! [`StyleProvider`] based on per-type zoom ranges.

use serde::{Deserialize, Serialize};

use crate::coord::Magnification;
use crate::types::{ObjectTypeId, TypeSet};

/// Types to load per category for one magnification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDefinition {
    pub node_types: TypeSet,
    pub way_types: TypeSet,
    pub area_types: TypeSet,
    pub route_types: TypeSet,
    pub optimized_way_types: TypeSet,
    pub optimized_area_types: TypeSet,
}

impl TypeDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the way types covered by a low zoom index into the optimized set.
    pub fn route_low_zoom_ways(&mut self, low_zoom_types: &TypeSet) {
        self.optimized_way_types = self.way_types.intersection(low_zoom_types);
        self.way_types.remove_all(&self.optimized_way_types);
    }

    /// Moves the area types covered by a low zoom index into the optimized set.
    pub fn route_low_zoom_areas(&mut self, low_zoom_types: &TypeSet) {
        self.optimized_area_types = self.area_types.intersection(low_zoom_types);
        self.area_types.remove_all(&self.optimized_area_types);
    }

    /// Returns true if no category requests any type.
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
            && self.way_types.is_empty()
            && self.area_types.is_empty()
            && self.route_types.is_empty()
            && self.optimized_way_types.is_empty()
            && self.optimized_area_types.is_empty()
    }
}

/// Source of the visible object types per magnification.
pub trait StyleProvider: Send + Sync {
    /// Returns the types visible at `magnification`.
    ///
    /// Implementations fill the plain node/way/area/route sets. Routing to
    /// the optimized low zoom sets is done by the service.
    fn required_types(&self, magnification: Magnification) -> TypeDefinition;
}

// =============================================================================
// StyleSheet
// =============================================================================

/// Object kind a style rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Node,
    Way,
    Area,
    Route,
}

/// Visibility rule for one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub type_id: ObjectTypeId,
    pub kind: ObjectKind,
    /// Lowest level at which the type is drawn.
    #[serde(default)]
    pub min_level: u32,
    /// Highest level at which the type is drawn, unbounded if absent.
    #[serde(default)]
    pub max_level: Option<u32>,
}

impl StyleRule {
    pub fn is_visible(&self, magnification: Magnification) -> bool {
        let level = magnification.level();
        level >= self.min_level && self.max_level.map_or(true, |max| level <= max)
    }
}

/// Declarative style: a list of per-type visibility rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule making `type_id` visible from `min_level` on.
    pub fn with_rule(mut self, type_id: ObjectTypeId, kind: ObjectKind, min_level: u32) -> Self {
        self.rules.push(StyleRule {
            type_id,
            kind,
            min_level,
            max_level: None,
        });
        self
    }

    pub fn add_rule(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }
}

impl StyleProvider for StyleSheet {
    fn required_types(&self, magnification: Magnification) -> TypeDefinition {
        let mut definition = TypeDefinition::new();
        for rule in self.rules.iter().filter(|r| r.is_visible(magnification)) {
            let set = match rule.kind {
                ObjectKind::Node => &mut definition.node_types,
                ObjectKind::Way => &mut definition.way_types,
                ObjectKind::Area => &mut definition.area_types,
                ObjectKind::Route => &mut definition.route_types,
            };
            set.insert(rule.type_id);
        }
        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u16]) -> TypeSet {
        ids.iter().map(|id| ObjectTypeId(*id)).collect()
    }

    #[test]
    fn test_style_sheet_filters_by_level() {
        let style = StyleSheet::new()
            .with_rule(ObjectTypeId(0), ObjectKind::Node, 12)
            .with_rule(ObjectTypeId(1), ObjectKind::Way, 0)
            .with_rule(ObjectTypeId(2), ObjectKind::Area, 5)
            .with_rule(ObjectTypeId(3), ObjectKind::Route, 8);

        let low = style.required_types(Magnification::CONTINENT);
        assert!(low.node_types.is_empty());
        assert_eq!(low.way_types, set(&[1]));
        assert!(low.area_types.is_empty());
        assert!(low.route_types.is_empty());

        let high = style.required_types(Magnification::SUBURB);
        assert_eq!(high.node_types, set(&[0]));
        assert_eq!(high.area_types, set(&[2]));
        assert_eq!(high.route_types, set(&[3]));
        assert!(high.optimized_way_types.is_empty());
    }

    #[test]
    fn test_rule_max_level() {
        let mut style = StyleSheet::new();
        style.add_rule(StyleRule {
            type_id: ObjectTypeId(4),
            kind: ObjectKind::Area,
            min_level: 2,
            max_level: Some(6),
        });

        assert!(style.required_types(Magnification::from_level(1)).is_empty());
        assert_eq!(
            style.required_types(Magnification::from_level(6)).area_types,
            set(&[4])
        );
        assert!(style.required_types(Magnification::from_level(7)).is_empty());
    }

    #[test]
    fn test_low_zoom_routing_moves_types() {
        let mut definition = TypeDefinition {
            way_types: set(&[1, 2]),
            area_types: set(&[3, 4]),
            ..TypeDefinition::default()
        };
        let low_zoom = set(&[2, 4, 9]);

        definition.route_low_zoom_ways(&low_zoom);
        definition.route_low_zoom_areas(&low_zoom);

        assert_eq!(definition.way_types, set(&[1]));
        assert_eq!(definition.optimized_way_types, set(&[2]));
        assert_eq!(definition.area_types, set(&[3]));
        assert_eq!(definition.optimized_area_types, set(&[4]));
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: StyleRule = serde_json::from_str(r#"{"type_id": 3, "kind": "way"}"#).unwrap();
        assert_eq!(rule.min_level, 0);
        assert_eq!(rule.max_level, None);
        assert_eq!(rule.kind, ObjectKind::Way);
    }
}
