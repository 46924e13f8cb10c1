//! Square grid coordinate system.
//!
//! The board is an unbounded grid of square cells addressed by integer
//! `(x, y)` pairs. The origin tile sits at `(0, 0)`; `y` grows southward so
//! that north is `y - 1`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four compass faces of a square tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in clockwise order starting from North
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Clockwise index (North = 0, West = 3)
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Direction for a clockwise index, wrapping modulo 4
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    /// The face pointing the other way
    pub const fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Rotate clockwise by a number of quarter turns
    pub const fn rotated_cw(self, quarter_turns: usize) -> Self {
        Self::from_index(self.index() + quarter_turns % 4)
    }

    /// Rotate counter-clockwise by a number of quarter turns
    pub const fn rotated_ccw(self, quarter_turns: usize) -> Self {
        Self::from_index(self.index() + 4 - quarter_turns % 4)
    }
}

/// A cell on the board.
///
/// Ordered by `x` then `y`, which gives placement enumeration a stable order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// The origin cell, home of the starting tile
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell adjacent across the given face, `None` past the edge of the
    /// coordinate range
    pub fn neighbor(self, direction: Direction) -> Option<Self> {
        match direction {
            Direction::North => self.offset(0, -1),
            Direction::East => self.offset(1, 0),
            Direction::South => self.offset(0, 1),
            Direction::West => self.offset(-1, 0),
        }
    }

    /// The orthogonal neighbors that exist, paired with the face they sit across
    pub fn neighbors(self) -> impl Iterator<Item = (Direction, Position)> {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.neighbor(dir).map(|pos| (dir, pos)))
    }

    /// The up to eight cells surrounding this one (orthogonal and diagonal)
    pub fn surrounding(self) -> impl Iterator<Item = Position> {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
        ];
        OFFSETS
            .into_iter()
            .filter_map(move |(dx, dy)| self.offset(dx, dy))
    }

    fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Position::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_opposites() {
        assert_eq!(Direction::North.opposite(), Direction::South);
        assert_eq!(Direction::East.opposite(), Direction::West);
        assert_eq!(Direction::West.opposite(), Direction::East);
    }

    #[test]
    fn test_rotation_wraps() {
        assert_eq!(Direction::West.rotated_cw(1), Direction::North);
        assert_eq!(Direction::North.rotated_ccw(1), Direction::West);
        for dir in Direction::ALL {
            assert_eq!(dir.rotated_cw(4), dir);
            assert_eq!(dir.rotated_cw(3).rotated_ccw(3), dir);
        }
    }

    #[test]
    fn test_neighbors_are_unique_and_reciprocal() {
        let center = Position::new(3, -2);
        let unique: HashSet<_> = center.neighbors().map(|(_, p)| p).collect();
        assert_eq!(unique.len(), 4);

        for (dir, pos) in center.neighbors() {
            assert_eq!(pos.neighbor(dir.opposite()), Some(center));
        }
    }

    #[test]
    fn test_north_is_negative_y() {
        assert_eq!(Position::ORIGIN.neighbor(Direction::North), Some(Position::new(0, -1)));
        assert_eq!(Position::ORIGIN.neighbor(Direction::East), Some(Position::new(1, 0)));
    }

    #[test]
    fn test_surrounding_excludes_self() {
        let center = Position::new(1, 1);
        let cells: HashSet<_> = center.surrounding().collect();
        assert_eq!(cells.len(), 8);
        assert!(!cells.contains(&center));
    }

    #[test]
    fn test_neighbors_stop_at_coordinate_limits() {
        let corner = Position::new(i32::MAX, i32::MIN);
        assert_eq!(corner.neighbor(Direction::East), None);
        assert_eq!(corner.neighbor(Direction::North), None);
        assert_eq!(
            corner.neighbor(Direction::West),
            Some(Position::new(i32::MAX - 1, i32::MIN))
        );

        let dirs: Vec<Direction> = corner.neighbors().map(|(dir, _)| dir).collect();
        assert_eq!(dirs, vec![Direction::South, Direction::West]);
        assert_eq!(corner.surrounding().count(), 3);
    }
}
