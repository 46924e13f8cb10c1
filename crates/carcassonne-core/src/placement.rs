//! Tile placement validation.
//!
//! Pure functions over the placed-tile map. A placement is legal when the
//! target cell is empty, at least one orthogonal neighbor is occupied, and
//! every occupied neighbor presents the same edge kind on the shared face.
//! Nothing here holds state, so the board and the bots call into it freely.

use crate::grid::{Direction, Position};
use crate::player::Marker;
use crate::tile::{EdgeKind, Rotation, TileDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// A tile definition fixed to a cell with a rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTile {
    pub tile: Arc<TileDefinition>,
    pub position: Position,
    pub rotation: Rotation,
    pub markers: Vec<Marker>,
}

impl PlacedTile {
    pub fn new(tile: Arc<TileDefinition>, position: Position, rotation: Rotation) -> Self {
        Self {
            tile,
            position,
            rotation,
            markers: Vec::new(),
        }
    }

    /// Edge kind facing `direction` after rotation
    pub fn edge_at(&self, direction: Direction) -> EdgeKind {
        edge_at(self, direction)
    }

    /// Whether any marker already claims the feature
    pub fn is_feature_occupied(&self, feature_index: usize) -> bool {
        self.markers.iter().any(|m| m.feature_index == feature_index)
    }
}

/// Placed tiles keyed by cell
pub type TileMap = HashMap<Position, PlacedTile>;

/// A candidate (cell, rotation) pair for the tile in hand.
///
/// Ordered by position then rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub rotation: Rotation,
}

impl Placement {
    pub const fn new(position: Position, rotation: Rotation) -> Self {
        Self { position, rotation }
    }
}

/// Why a placement was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlacementError {
    #[error("cell {0} is already occupied")]
    Occupied(Position),

    #[error("cell {0} has no neighboring tile")]
    NotAdjacent(Position),

    #[error("{direction:?} edge does not match the neighboring tile")]
    EdgeMismatch { direction: Direction },
}

/// Edge kind a placed tile presents toward `direction`
pub fn edge_at(placed: &PlacedTile, direction: Direction) -> EdgeKind {
    placed.tile.edge_rotated(direction, placed.rotation)
}

/// Check a placement, reporting the first rule it breaks.
///
/// Every occupied neighbor is checked; one mismatching face rejects the
/// whole placement.
pub fn check_placement(
    tiles: &TileMap,
    tile: &TileDefinition,
    position: Position,
    rotation: Rotation,
) -> Result<(), PlacementError> {
    if tiles.contains_key(&position) {
        return Err(PlacementError::Occupied(position));
    }

    let mut has_neighbor = false;
    for (direction, neighbor_pos) in position.neighbors() {
        let Some(neighbor) = tiles.get(&neighbor_pos) else {
            continue;
        };
        has_neighbor = true;

        let ours = tile.edge_rotated(direction, rotation);
        let theirs = neighbor.edge_at(direction.opposite());
        if ours != theirs {
            return Err(PlacementError::EdgeMismatch { direction });
        }
    }

    if !has_neighbor {
        return Err(PlacementError::NotAdjacent(position));
    }

    Ok(())
}

/// Whether `tile` may be placed at `position` with `rotation`
pub fn can_place(
    tiles: &TileMap,
    tile: &TileDefinition,
    position: Position,
    rotation: Rotation,
) -> bool {
    check_placement(tiles, tile, position, rotation).is_ok()
}

/// Empty cells orthogonally adjacent to at least one placed tile, sorted
pub fn candidate_positions(tiles: &TileMap) -> BTreeSet<Position> {
    tiles
        .keys()
        .flat_map(|pos| pos.neighbors())
        .map(|(_, pos)| pos)
        .filter(|pos| !tiles.contains_key(pos))
        .collect()
}

/// All legal placements for `tile`, ordered by position then rotation.
///
/// The order only depends on the board contents, so two calls on the same
/// board and tile return identical sequences.
pub fn enumerate_legal_placements(tiles: &TileMap, tile: &TileDefinition) -> Vec<Placement> {
    candidate_positions(tiles)
        .into_iter()
        .flat_map(|position| Rotation::ALL.map(|rotation| Placement::new(position, rotation)))
        .filter(|p| can_place(tiles, tile, p.position, p.rotation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Feature, TileDefinition};
    use EdgeKind::{City as C, Field as F, Road as R};

    fn tile(id: u32, edges: [EdgeKind; 4]) -> Arc<TileDefinition> {
        Arc::new(TileDefinition::new(id, edges, vec![Feature::field(&[])]))
    }

    fn board_with(origin: [EdgeKind; 4]) -> TileMap {
        let mut tiles = TileMap::new();
        tiles.insert(
            Position::ORIGIN,
            PlacedTile::new(tile(0, origin), Position::ORIGIN, Rotation::R0),
        );
        tiles
    }

    #[test]
    fn test_edge_at_applies_rotation() {
        let placed = PlacedTile::new(tile(1, [C, R, F, F]), Position::ORIGIN, Rotation::R90);
        assert_eq!(placed.edge_at(Direction::East), C);
        assert_eq!(placed.edge_at(Direction::South), R);
        assert_eq!(placed.edge_at(Direction::North), F);
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let tiles = board_with([F, F, F, F]);
        let result = check_placement(&tiles, &tile(1, [F, F, F, F]), Position::ORIGIN, Rotation::R0);
        assert_eq!(result, Err(PlacementError::Occupied(Position::ORIGIN)));
    }

    #[test]
    fn test_floating_cell_rejected() {
        let tiles = board_with([F, F, F, F]);
        let far = Position::new(2, 0);
        assert_eq!(
            check_placement(&tiles, &tile(1, [F, F, F, F]), far, Rotation::R0),
            Err(PlacementError::NotAdjacent(far))
        );
    }

    #[test]
    fn test_cells_at_coordinate_limits_rejected() {
        let tiles = board_with([F, F, F, F]);
        for corner in [
            Position::new(i32::MAX, 0),
            Position::new(i32::MIN, 0),
            Position::new(0, i32::MAX),
            Position::new(i32::MIN, i32::MIN),
        ] {
            assert_eq!(
                check_placement(&tiles, &tile(1, [F, F, F, F]), corner, Rotation::R0),
                Err(PlacementError::NotAdjacent(corner))
            );
        }
    }

    #[test]
    fn test_edge_mismatch_rejects_whole_placement() {
        // Origin road faces east; a city facing west cannot sit there
        let tiles = board_with([F, R, F, R]);
        let candidate = tile(1, [F, R, F, C]);
        let east = Position::new(1, 0);
        assert_eq!(
            check_placement(&tiles, &candidate, east, Rotation::R0),
            Err(PlacementError::EdgeMismatch {
                direction: Direction::West
            })
        );
        assert!(can_place(&tiles, &candidate, east, Rotation::R180));
    }

    #[test]
    fn test_every_neighbor_must_match() {
        let mut tiles = board_with([F, F, F, F]);
        tiles.insert(
            Position::new(1, 0),
            PlacedTile::new(tile(1, [F, F, F, F]), Position::new(1, 0), Rotation::R0),
        );
        tiles.insert(
            Position::new(1, 1),
            PlacedTile::new(tile(2, [F, F, F, C]), Position::new(1, 1), Rotation::R0),
        );

        // (0,1) sits below the origin (field) and left of (1,1) (city)
        let target = Position::new(0, 1);
        let field_only = tile(3, [F, F, F, F]);
        assert_eq!(
            check_placement(&tiles, &field_only, target, Rotation::R0),
            Err(PlacementError::EdgeMismatch {
                direction: Direction::East
            })
        );

        let city_east = tile(4, [F, C, F, F]);
        assert!(can_place(&tiles, &city_east, target, Rotation::R0));
    }

    #[test]
    fn test_candidate_positions_deduplicated() {
        let mut tiles = board_with([F, F, F, F]);
        tiles.insert(
            Position::new(1, 0),
            PlacedTile::new(tile(1, [F, F, F, F]), Position::new(1, 0), Rotation::R0),
        );
        let candidates = candidate_positions(&tiles);
        assert_eq!(candidates.len(), 6);
        assert!(!candidates.contains(&Position::ORIGIN));
    }

    #[test]
    fn test_enumeration_is_sorted_and_deterministic() {
        let tiles = board_with([C, R, F, R]);
        let candidate = tile(1, [F, R, F, R]);
        let first = enumerate_legal_placements(&tiles, &candidate);
        let second = enumerate_legal_placements(&tiles, &candidate);
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);

        for p in &first {
            assert!(can_place(&tiles, &candidate, p.position, p.rotation));
        }
        // Straight road fits east and west of the origin in two rotations each,
        // and south in the two rotations that show field north
        assert_eq!(first.len(), 6);
    }
}
