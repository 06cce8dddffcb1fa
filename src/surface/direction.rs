/// Compass directions used for patch and surface adjacency.
///
/// The discriminants index the 8-entry neighbour tables and the first 8 of a
/// patch's [`NORMAL_REGION_COUNT`] normal-invalidation regions. The last one,
/// [`MIDDLE_REGION`], is the patch interior.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    East = 0,
    North = 1,
    West = 2,
    South = 3,
    NorthEast = 4,
    NorthWest = 5,
    SouthWest = 6,
    SouthEast = 7,
}

pub const DIRECTION_COUNT: usize = 8;

impl Direction {
    pub const ALL: [Direction; DIRECTION_COUNT] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::North => Direction::South,
            Direction::West => Direction::East,
            Direction::South => Direction::North,
            Direction::NorthEast => Direction::SouthWest,
            Direction::NorthWest => Direction::SouthEast,
            Direction::SouthWest => Direction::NorthEast,
            Direction::SouthEast => Direction::NorthWest,
        }
    }

    pub fn is_cardinal(self) -> bool {
        (self as u8) < 4
    }

    /// The two corners touching a cardinal edge. Corners return themselves.
    pub fn adjacent_corners(self) -> [Direction; 2] {
        match self {
            Direction::East => [Direction::NorthEast, Direction::SouthEast],
            Direction::North => [Direction::NorthEast, Direction::NorthWest],
            Direction::West => [Direction::NorthWest, Direction::SouthWest],
            Direction::South => [Direction::SouthWest, Direction::SouthEast],
            Direction::NorthEast => [Direction::East, Direction::North],
            Direction::NorthWest => [Direction::North, Direction::West],
            Direction::SouthWest => [Direction::West, Direction::South],
            Direction::SouthEast => [Direction::East, Direction::South],
        }
    }

    /// Unit step in patch-grid coordinates.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::North => (0, 1),
            Direction::West => (-1, 0),
            Direction::South => (0, -1),
            Direction::NorthEast => (1, 1),
            Direction::NorthWest => (-1, 1),
            Direction::SouthWest => (-1, -1),
            Direction::SouthEast => (1, -1),
        }
    }

    /// Edge bit for cardinal directions.
    pub fn edge(self) -> Option<EdgeMask> {
        match self {
            Direction::East => Some(EdgeMask::EAST),
            Direction::North => Some(EdgeMask::NORTH),
            Direction::West => Some(EdgeMask::WEST),
            Direction::South => Some(EdgeMask::SOUTH),
            _ => None,
        }
    }
}

pub const NORMAL_REGION_COUNT: usize = 9;
pub const MIDDLE_REGION: usize = 8;

/// Which patch edges border a connected neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeMask(u8);

impl EdgeMask {
    pub const NONE: EdgeMask = EdgeMask(0);
    pub const EAST: EdgeMask = EdgeMask(1);
    pub const NORTH: EdgeMask = EdgeMask(2);
    pub const WEST: EdgeMask = EdgeMask(4);
    pub const SOUTH: EdgeMask = EdgeMask(8);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: EdgeMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: EdgeMask) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: EdgeMask) {
        self.0 &= !other.0;
    }
}
