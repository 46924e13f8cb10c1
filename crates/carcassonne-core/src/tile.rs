//! Tile definitions, features and the standard tile set.
//!
//! A `TileDefinition` is an immutable template: four edge kinds plus the
//! features a marker can claim. Definitions are shared through `Arc` between
//! the draw pile, the board and every snapshot, and are never mutated once
//! built. Rotation is applied by looking edges up through a `Rotation`, never
//! by rewriting the definition.

use crate::grid::Direction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Terrain a tile presents on one of its faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Road,
    City,
    Field,
}

/// Kind of scorable region on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Road,
    City,
    Monastery,
    Field,
}

/// A region of a tile that can host at most one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    /// Faces of the (unrotated) tile this feature touches
    pub edges: Vec<Direction>,
    /// City pennant, doubles the city's value in full scoring
    pub has_shield: bool,
}

impl Feature {
    pub fn new(kind: FeatureKind, edges: &[Direction]) -> Self {
        Self {
            kind,
            edges: edges.to_vec(),
            has_shield: false,
        }
    }

    pub fn road(edges: &[Direction]) -> Self {
        Self::new(FeatureKind::Road, edges)
    }

    pub fn city(edges: &[Direction]) -> Self {
        Self::new(FeatureKind::City, edges)
    }

    pub fn field(edges: &[Direction]) -> Self {
        Self::new(FeatureKind::Field, edges)
    }

    pub fn monastery() -> Self {
        Self::new(FeatureKind::Monastery, &[])
    }

    /// Mark this feature as carrying a shield
    pub fn with_shield(mut self) -> Self {
        self.has_shield = true;
        self
    }
}

/// Clockwise rotation of a placed tile.
///
/// Serialized as its degree value (0, 90, 180 or 270); any other number is
/// rejected when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

/// A rotation value that is not a multiple of 90 in `0..360`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid rotation {0}: must be 0, 90, 180 or 270")]
pub struct InvalidRotation(pub u16);

impl Rotation {
    /// All rotations in ascending order
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// Number of clockwise quarter turns
    pub const fn quarter_turns(self) -> usize {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    pub const fn degrees(self) -> u16 {
        self.quarter_turns() as u16 * 90
    }

    pub const fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::R0),
            90 => Some(Rotation::R90),
            180 => Some(Rotation::R180),
            270 => Some(Rotation::R270),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees).ok_or(InvalidRotation(degrees))
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Immutable tile template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDefinition {
    pub id: u32,
    /// Edge kinds indexed by `Direction::index` (N, E, S, W)
    pub edges: [EdgeKind; 4],
    pub features: Vec<Feature>,
    pub has_monastery: bool,
    pub has_shield: bool,
}

impl TileDefinition {
    /// Build a definition from edges given in N, E, S, W order.
    ///
    /// Monastery and shield flags are derived from the features.
    pub fn new(id: u32, edges: [EdgeKind; 4], features: Vec<Feature>) -> Self {
        let has_monastery = features.iter().any(|f| f.kind == FeatureKind::Monastery);
        let has_shield = features.iter().any(|f| f.has_shield);
        Self {
            id,
            edges,
            features,
            has_monastery,
            has_shield,
        }
    }

    /// Edge kind on a face of the unrotated tile
    pub fn edge(&self, direction: Direction) -> EdgeKind {
        self.edges[direction.index()]
    }

    /// Edge kind facing `direction` once the tile is turned by `rotation`.
    ///
    /// A clockwise turn moves the definition's north face to the east, so the
    /// lookup turns the requested direction back counter-clockwise.
    pub fn edge_rotated(&self, direction: Direction, rotation: Rotation) -> EdgeKind {
        self.edge(direction.rotated_ccw(rotation.quarter_turns()))
    }

    /// Index of the first feature of the given kind
    pub fn feature_index(&self, kind: FeatureKind) -> Option<usize> {
        self.features.iter().position(|f| f.kind == kind)
    }

    /// Index of the monastery feature, if the tile has one
    pub fn monastery_feature(&self) -> Option<usize> {
        self.feature_index(FeatureKind::Monastery)
    }
}

use Direction::{East as E, North as N, South as S, West as W};
use EdgeKind::{City as C, Field as F, Road as R};

/// One row of the standard set: how many copies, edges (N, E, S, W), features.
struct TileKind {
    count: usize,
    edges: [EdgeKind; 4],
    features: fn() -> Vec<Feature>,
}

fn standard_kinds() -> Vec<TileKind> {
    vec![
        // Straight road
        TileKind {
            count: 8,
            edges: [F, R, F, R],
            features: || vec![Feature::road(&[E, W]), Feature::field(&[N]), Feature::field(&[S])],
        },
        // Road curve south-west
        TileKind {
            count: 9,
            edges: [F, F, R, R],
            features: || vec![Feature::road(&[S, W]), Feature::field(&[N, E]), Feature::field(&[])],
        },
        // Three-way junction
        TileKind {
            count: 4,
            edges: [F, R, R, R],
            features: || {
                vec![
                    Feature::road(&[E]),
                    Feature::road(&[S]),
                    Feature::road(&[W]),
                    Feature::field(&[N]),
                ]
            },
        },
        // Crossroads
        TileKind {
            count: 1,
            edges: [R, R, R, R],
            features: || {
                vec![
                    Feature::road(&[N]),
                    Feature::road(&[E]),
                    Feature::road(&[S]),
                    Feature::road(&[W]),
                ]
            },
        },
        // City cap
        TileKind {
            count: 5,
            edges: [C, F, F, F],
            features: || vec![Feature::city(&[N]), Feature::field(&[E, S, W])],
        },
        // City cap over a straight road
        TileKind {
            count: 3,
            edges: [C, R, F, R],
            features: || {
                vec![
                    Feature::city(&[N]),
                    Feature::road(&[E, W]),
                    Feature::field(&[]),
                    Feature::field(&[S]),
                ]
            },
        },
        // City cap over a road curve
        TileKind {
            count: 3,
            edges: [C, F, R, R],
            features: || vec![Feature::city(&[N]), Feature::road(&[S, W]), Feature::field(&[E])],
        },
        // City on two opposite sides
        TileKind {
            count: 3,
            edges: [F, C, F, C],
            features: || vec![Feature::city(&[E, W]), Feature::field(&[N]), Feature::field(&[S])],
        },
        // City corner
        TileKind {
            count: 3,
            edges: [C, C, F, F],
            features: || vec![Feature::city(&[N, E]), Feature::field(&[S, W])],
        },
        // City corner with shield
        TileKind {
            count: 2,
            edges: [C, C, F, F],
            features: || vec![Feature::city(&[N, E]).with_shield(), Feature::field(&[S, W])],
        },
        // City on three sides
        TileKind {
            count: 3,
            edges: [C, C, F, C],
            features: || vec![Feature::city(&[N, E, W]), Feature::field(&[S])],
        },
        // City on three sides with a road leaving south
        TileKind {
            count: 1,
            edges: [C, C, R, C],
            features: || {
                vec![
                    Feature::city(&[N, E, W]).with_shield(),
                    Feature::road(&[S]),
                    Feature::field(&[S]),
                ]
            },
        },
        // Full city
        TileKind {
            count: 1,
            edges: [C, C, C, C],
            features: || vec![Feature::city(&[N, E, S, W]).with_shield()],
        },
        // Monastery
        TileKind {
            count: 4,
            edges: [F, F, F, F],
            features: || vec![Feature::monastery(), Feature::field(&[N, E, S, W])],
        },
        // Monastery with a road leaving south
        TileKind {
            count: 2,
            edges: [F, F, R, F],
            features: || {
                vec![
                    Feature::monastery(),
                    Feature::road(&[S]),
                    Feature::field(&[N, E, S, W]),
                ]
            },
        },
    ]
}

/// The starting tile: a city cap above a straight east-west road.
pub fn starting_tile() -> Arc<TileDefinition> {
    Arc::new(TileDefinition::new(
        0,
        [C, R, F, R],
        vec![
            Feature::city(&[N]),
            Feature::road(&[E, W]),
            Feature::field(&[]),
            Feature::field(&[S]),
        ],
    ))
}

/// The standard tile set in a fixed order, starting tile first.
///
/// Ids are assigned sequentially from 0; the starting tile is always id 0.
pub fn standard_tile_set() -> Vec<Arc<TileDefinition>> {
    let mut tiles = vec![starting_tile()];
    let mut next_id = 1;
    for kind in standard_kinds() {
        for _ in 0..kind.count {
            tiles.push(Arc::new(TileDefinition::new(
                next_id,
                kind.edges,
                (kind.features)(),
            )));
            next_id += 1;
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rotation_degrees_roundtrip() {
        for rotation in Rotation::ALL {
            assert_eq!(Rotation::try_from(rotation.degrees()), Ok(rotation));
        }
        assert_eq!(Rotation::try_from(45), Err(InvalidRotation(45)));
        assert_eq!(Rotation::try_from(360), Err(InvalidRotation(360)));
    }

    #[test]
    fn test_rotation_serializes_as_degrees() {
        let json = serde_json::to_string(&Rotation::R270).unwrap();
        assert_eq!(json, "270");
        let parsed: Rotation = serde_json::from_str("90").unwrap();
        assert_eq!(parsed, Rotation::R90);
        assert!(serde_json::from_str::<Rotation>("100").is_err());
    }

    #[test]
    fn test_edge_rotated_moves_north_to_east() {
        let tile = TileDefinition::new(1, [C, F, F, F], vec![Feature::city(&[N])]);
        assert_eq!(tile.edge_rotated(Direction::North, Rotation::R0), C);
        assert_eq!(tile.edge_rotated(Direction::East, Rotation::R90), C);
        assert_eq!(tile.edge_rotated(Direction::South, Rotation::R180), C);
        assert_eq!(tile.edge_rotated(Direction::West, Rotation::R270), C);
        assert_eq!(tile.edge_rotated(Direction::North, Rotation::R90), F);
    }

    #[test]
    fn test_flags_derived_from_features() {
        let monastery = TileDefinition::new(
            7,
            [F, F, F, F],
            vec![Feature::monastery(), Feature::field(&[N, E, S, W])],
        );
        assert!(monastery.has_monastery);
        assert!(!monastery.has_shield);
        assert_eq!(monastery.monastery_feature(), Some(0));

        let shielded = TileDefinition::new(8, [C, C, C, C], vec![Feature::city(&[N]).with_shield()]);
        assert!(shielded.has_shield);
        assert_eq!(shielded.monastery_feature(), None);
    }

    #[test]
    fn test_standard_set_ids_unique_and_start_first() {
        let tiles = standard_tile_set();
        assert_eq!(tiles[0].id, 0);
        assert_eq!(tiles[0].edge(Direction::East), R);

        let ids: HashSet<_> = tiles.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), tiles.len());
        assert_eq!(tiles.len(), 53);
    }

    #[test]
    fn test_standard_set_features_reference_matching_edges() {
        for tile in standard_tile_set() {
            assert!(!tile.features.is_empty(), "tile {} has no features", tile.id);
            for feature in &tile.features {
                let expected = match feature.kind {
                    FeatureKind::Road => R,
                    FeatureKind::City => C,
                    FeatureKind::Field | FeatureKind::Monastery => continue,
                };
                for dir in &feature.edges {
                    assert_eq!(tile.edge(*dir), expected, "tile {} face {:?}", tile.id, dir);
                }
            }
        }
    }
}
