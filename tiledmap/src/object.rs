//! Map objects
//!
//! The cache treats geometry as opaque: all it needs from an object is its
//! file offset (the de-duplication key), its type, and enough geometry for
//! intersection tests against tile bounding boxes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coord::{GeoBox, GeoCoord};
use crate::types::ObjectTypeId;

/// Stable on-disk address of an object.
pub type FileOffset = u64;

/// Common view on every loadable object kind.
pub trait MapObject: Send + Sync + 'static {
    fn file_offset(&self) -> FileOffset;

    fn object_type(&self) -> ObjectTypeId;

    fn bounding_box(&self) -> GeoBox;

    /// Returns true if the object's geometry touches `bbox`.
    fn intersects(&self, bbox: &GeoBox) -> bool {
        self.bounding_box().intersects(bbox)
    }
}

/// A point object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub offset: FileOffset,
    pub type_id: ObjectTypeId,
    pub coord: GeoCoord,
}

impl MapObject for Node {
    fn file_offset(&self) -> FileOffset {
        self.offset
    }

    fn object_type(&self) -> ObjectTypeId {
        self.type_id
    }

    fn bounding_box(&self) -> GeoBox {
        GeoBox::new(self.coord, self.coord)
    }

    fn intersects(&self, bbox: &GeoBox) -> bool {
        bbox.includes(&self.coord)
    }
}

/// A polyline object such as a road or river.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub offset: FileOffset,
    pub type_id: ObjectTypeId,
    pub nodes: Vec<GeoCoord>,
    pub bbox: GeoBox,
}

impl Way {
    /// Creates a way, deriving its bounding box from the node list.
    ///
    /// Returns `None` if `nodes` is empty.
    pub fn new(offset: FileOffset, type_id: ObjectTypeId, nodes: Vec<GeoCoord>) -> Option<Self> {
        let bbox = GeoBox::enclosing(nodes.iter())?;
        Some(Self {
            offset,
            type_id,
            nodes,
            bbox,
        })
    }
}

impl MapObject for Way {
    fn file_offset(&self) -> FileOffset {
        self.offset
    }

    fn object_type(&self) -> ObjectTypeId {
        self.type_id
    }

    fn bounding_box(&self) -> GeoBox {
        self.bbox
    }
}

/// A closed polygon object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub offset: FileOffset,
    pub type_id: ObjectTypeId,
    pub outer: Vec<GeoCoord>,
    pub bbox: GeoBox,
}

impl Area {
    /// Creates an area from its outer ring.
    ///
    /// Returns `None` if the ring is empty.
    pub fn new(offset: FileOffset, type_id: ObjectTypeId, outer: Vec<GeoCoord>) -> Option<Self> {
        let bbox = GeoBox::enclosing(outer.iter())?;
        Some(Self {
            offset,
            type_id,
            outer,
            bbox,
        })
    }
}

impl MapObject for Area {
    fn file_offset(&self) -> FileOffset {
        self.offset
    }

    fn object_type(&self) -> ObjectTypeId {
        self.type_id
    }

    fn bounding_box(&self) -> GeoBox {
        self.bbox
    }
}

/// A relation grouping ways into a named route (bus line, hiking trail).
///
/// Members are referenced by file offset. They are only resolved into
/// [`Route::members`] when the load is asked to resolve route members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub offset: FileOffset,
    pub type_id: ObjectTypeId,
    pub bbox: GeoBox,
    #[serde(default)]
    pub member_offsets: Vec<FileOffset>,
    #[serde(skip)]
    pub members: Vec<WayRef>,
}

impl MapObject for Route {
    fn file_offset(&self) -> FileOffset {
        self.offset
    }

    fn object_type(&self) -> ObjectTypeId {
        self.type_id
    }

    fn bounding_box(&self) -> GeoBox {
        self.bbox
    }
}

pub type NodeRef = Arc<Node>;
pub type WayRef = Arc<Way>;
pub type AreaRef = Arc<Area>;
pub type RouteRef = Arc<Route>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_intersects_uses_coordinate() {
        let node = Node {
            offset: 1,
            type_id: ObjectTypeId(0),
            coord: GeoCoord::new(1.0, 1.0),
        };
        assert!(node.intersects(&GeoBox::from_bounds(0.0, 0.0, 1.0, 1.0)));
        assert!(!node.intersects(&GeoBox::from_bounds(0.0, 0.0, 0.5, 0.5)));
    }

    #[test]
    fn test_way_derives_bounding_box() {
        let way = Way::new(
            10,
            ObjectTypeId(2),
            vec![GeoCoord::new(0.0, 0.0), GeoCoord::new(2.0, -1.0)],
        )
        .unwrap();
        assert_eq!(way.bounding_box(), GeoBox::from_bounds(0.0, -1.0, 2.0, 0.0));
        assert!(way.intersects(&GeoBox::from_bounds(1.0, -0.5, 3.0, 3.0)));
        assert!(Way::new(11, ObjectTypeId(2), Vec::new()).is_none());
    }

    #[test]
    fn test_area_intersects_by_bounding_box() {
        let area = Area::new(
            20,
            ObjectTypeId(3),
            vec![
                GeoCoord::new(0.0, 0.0),
                GeoCoord::new(0.0, 1.0),
                GeoCoord::new(1.0, 1.0),
            ],
        )
        .unwrap();
        assert_eq!(area.file_offset(), 20);
        assert!(area.intersects(&GeoBox::from_bounds(0.5, 0.5, 5.0, 5.0)));
        assert!(!area.intersects(&GeoBox::from_bounds(2.0, 2.0, 5.0, 5.0)));
    }
}
