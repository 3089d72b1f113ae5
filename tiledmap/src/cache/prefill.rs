//! Approximating tile contents from cached parent tiles.

use crate::coord::GeoBox;
use crate::object::MapObject;
use crate::tile::TileData;
use crate::types::TypeSet;

/// Copies the objects of `parent` that `store` still lacks into its prefill
/// buffer.
///
/// The copied type set is `(requested − store.types) ∩ parent.types`; of
/// those types only objects intersecting `bbox` are taken.
///
/// Returns true if any object was copied.
pub(super) fn resolve_from_parent<T: MapObject>(
    store: &TileData<T>,
    parent: &TileData<T>,
    bbox: &GeoBox,
    requested: &TypeSet,
) -> bool {
    let parent_types = parent.types();
    if !requested.intersects(&parent_types) {
        return false;
    }

    let mut subset = requested.difference(&store.types());
    subset.intersect_with(&parent_types);
    if subset.is_empty() {
        return false;
    }

    let mut data = Vec::with_capacity(parent.data_len());
    parent.copy_data(|object| {
        if subset.contains(object.object_type()) && object.intersects(bbox) {
            data.push(object.clone());
        }
    });

    let copied = !data.is_empty();
    store.add_prefill_data(&subset, data);
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::coord::GeoCoord;
    use crate::object::Way;
    use crate::types::ObjectTypeId;

    fn set(ids: &[u16]) -> TypeSet {
        ids.iter().map(|id| ObjectTypeId(*id)).collect()
    }

    fn way(offset: u64, type_id: u16, from: (f64, f64), to: (f64, f64)) -> Arc<Way> {
        Arc::new(
            Way::new(
                offset,
                ObjectTypeId(type_id),
                vec![GeoCoord::new(from.0, from.1), GeoCoord::new(to.0, to.1)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_skips_types_already_recorded() {
        let parent = TileData::new();
        parent.set_data(
            &set(&[1, 2]),
            vec![way(1, 1, (0.0, 0.0), (1.0, 1.0)), way(2, 2, (0.0, 0.0), (1.0, 1.0))],
        );
        let store = TileData::new();
        store.set_data(&set(&[1]), Vec::new());

        resolve_from_parent(&store, &parent, &GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0), &set(&[1, 2]));

        let offsets: Vec<u64> = store.snapshot().iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![2]);
        assert_eq!(store.types(), set(&[1, 2]));
    }

    #[test]
    fn test_filters_by_bounding_box() {
        let parent = TileData::new();
        parent.set_data(
            &set(&[1]),
            vec![
                way(1, 1, (0.0, 0.0), (0.5, 0.5)),
                way(2, 1, (5.0, 5.0), (6.0, 6.0)),
                way(3, 1, (-1.0, -1.0), (2.0, 2.0)),
            ],
        );
        let store = TileData::new();

        resolve_from_parent(&store, &parent, &GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0), &set(&[1]));

        let offsets: Vec<u64> = store.snapshot().iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![1, 3]);
        assert!(!store.is_complete());
    }

    #[test]
    fn test_disjoint_types_copy_nothing() {
        let parent = TileData::new();
        parent.set_data(&set(&[1]), vec![way(1, 1, (0.0, 0.0), (0.5, 0.5))]);
        let store: TileData<Way> = TileData::new();

        resolve_from_parent(&store, &parent, &GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0), &set(&[2]));

        assert!(store.is_empty());
        assert_eq!(store.data_len(), 0);
    }
}
