//! Object type registry and type sets
//!
//! Every map object carries an [`ObjectTypeId`] assigned by the database's
//! type configuration. Loads are requested and tracked per set of types, so
//! [`TypeSet`] is a compact bitset with the usual set algebra.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an object type, dense and starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectTypeId(pub u16);

impl ObjectTypeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// TypeSet
// =============================================================================

const BITS: usize = u64::BITS as usize;

/// A set of object types backed by a growable bitset.
///
/// Trailing zero words are irrelevant for equality, so two sets holding the
/// same types compare equal regardless of how they were built.
#[derive(Debug, Clone, Default)]
pub struct TypeSet {
    words: Vec<u64>,
}

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ObjectTypeId) {
        let (word, bit) = (id.index() / BITS, id.index() % BITS);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    pub fn remove(&mut self, id: ObjectTypeId) {
        let (word, bit) = (id.index() / BITS, id.index() % BITS);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1 << bit);
        }
    }

    pub fn contains(&self, id: ObjectTypeId) -> bool {
        let (word, bit) = (id.index() / BITS, id.index() % BITS);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Adds every type of `other` to this set.
    pub fn union_with(&mut self, other: &TypeSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Removes every type of `other` from this set.
    pub fn remove_all(&mut self, other: &TypeSet) {
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= !o;
        }
    }

    /// Keeps only the types also present in `other`.
    pub fn intersect_with(&mut self, other: &TypeSet) {
        for (i, w) in self.words.iter_mut().enumerate() {
            *w &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// Returns `self − other`.
    pub fn difference(&self, other: &TypeSet) -> TypeSet {
        let mut result = self.clone();
        result.remove_all(other);
        result
    }

    /// Returns `self ∩ other`.
    pub fn intersection(&self, other: &TypeSet) -> TypeSet {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Returns true if both sets share at least one type.
    pub fn intersects(&self, other: &TypeSet) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// Returns true if every type of this set is also in `other`.
    pub fn is_subset(&self, other: &TypeSet) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    /// Iterates the contained types in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ObjectTypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            let word = *word;
            (0..BITS)
                .filter(move |bit| word & (1u64 << *bit) != 0)
                .map(move |bit| ObjectTypeId((i * BITS + bit) as u16))
        })
    }
}

impl PartialEq for TypeSet {
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for TypeSet {}

impl FromIterator<ObjectTypeId> for TypeSet {
    fn from_iter<I: IntoIterator<Item = ObjectTypeId>>(iter: I) -> Self {
        let mut set = TypeSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl Extend<ObjectTypeId> for TypeSet {
    fn extend<I: IntoIterator<Item = ObjectTypeId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", id.0)?;
        }
        write!(f, "}}")
    }
}

// =============================================================================
// Type configuration
// =============================================================================

/// Schema information about one object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub id: ObjectTypeId,
    pub name: String,
    /// Whether a pre-simplified low zoom index exists for this type.
    #[serde(default)]
    pub optimize_low_zoom: bool,
}

/// Registry of all object types known to a database.
#[derive(Debug, Clone, Default)]
pub struct TypeConfig {
    types: Vec<TypeInfo>,
    by_name: HashMap<String, ObjectTypeId>,
}

impl TypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new type and returns its id.
    ///
    /// Registering an existing name returns the id already assigned.
    pub fn register(&mut self, name: impl Into<String>, optimize_low_zoom: bool) -> ObjectTypeId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = ObjectTypeId(self.types.len() as u16);
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeInfo {
            id,
            name,
            optimize_low_zoom,
        });
        id
    }

    pub fn type_by_name(&self, name: &str) -> Option<ObjectTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn type_info(&self, id: ObjectTypeId) -> Option<&TypeInfo> {
        self.types.get(id.index())
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types flagged for the low zoom optimization.
    pub fn low_zoom_types(&self) -> TypeSet {
        self.types
            .iter()
            .filter(|info| info.optimize_low_zoom)
            .map(|info| info.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u16]) -> TypeSet {
        ids.iter().map(|id| ObjectTypeId(*id)).collect()
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut types = TypeSet::new();
        assert!(types.is_empty());

        types.insert(ObjectTypeId(3));
        types.insert(ObjectTypeId(130));
        assert!(types.contains(ObjectTypeId(3)));
        assert!(types.contains(ObjectTypeId(130)));
        assert!(!types.contains(ObjectTypeId(4)));
        assert_eq!(types.len(), 2);

        types.remove(ObjectTypeId(130));
        assert!(!types.contains(ObjectTypeId(130)));
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn test_equality_ignores_trailing_words() {
        let mut a = set(&[1]);
        a.insert(ObjectTypeId(200));
        a.remove(ObjectTypeId(200));
        assert_eq!(a, set(&[1]));
    }

    #[test]
    fn test_set_algebra() {
        let a = set(&[1, 2, 3, 70]);
        let b = set(&[2, 3, 4]);

        assert_eq!(a.difference(&b), set(&[1, 70]));
        assert_eq!(a.intersection(&b), set(&[2, 3]));
        assert!(a.intersects(&b));
        assert!(!set(&[1]).intersects(&set(&[2])));

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u, set(&[1, 2, 3, 4, 70]));
    }

    #[test]
    fn test_subset() {
        assert!(set(&[]).is_subset(&set(&[1])));
        assert!(set(&[1, 65]).is_subset(&set(&[1, 2, 65])));
        assert!(!set(&[1, 130]).is_subset(&set(&[1])));
    }

    #[test]
    fn test_iter_ascending() {
        let types = set(&[64, 0, 5, 129]);
        let ids: Vec<u16> = types.iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 5, 64, 129]);
        assert_eq!(types.to_string(), "{0,5,64,129}");
    }

    #[test]
    fn test_type_config_register() {
        let mut config = TypeConfig::new();
        let road = config.register("highway_primary", true);
        let shop = config.register("amenity_shop", false);
        assert_eq!(config.register("highway_primary", false), road);

        assert_eq!(config.len(), 2);
        assert_eq!(config.type_by_name("amenity_shop"), Some(shop));
        assert_eq!(config.low_zoom_types(), set(&[road.0]));
        assert_eq!(config.type_info(shop).map(|t| t.name.as_str()), Some("amenity_shop"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn type_set() -> impl Strategy<Value = TypeSet> {
            prop::collection::vec(0u16..300, 0..40).prop_map(|ids| set(&ids))
        }

        proptest! {
            #[test]
            fn difference_and_intersection_partition(a in type_set(), b in type_set()) {
                let diff = a.difference(&b);
                let inter = a.intersection(&b);

                prop_assert!(!diff.intersects(&inter));
                prop_assert!(!diff.intersects(&b));
                prop_assert_eq!(diff.len() + inter.len(), a.len());

                let mut rebuilt = diff.clone();
                rebuilt.union_with(&inter);
                prop_assert_eq!(rebuilt, a);
            }
        }
    }
}
