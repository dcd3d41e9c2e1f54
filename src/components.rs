use serde::{Deserialize, Serialize};

/// A cell coordinate. Signed so the warp-tunnel step past either edge
/// (`x == -1` or `x == width`) is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Dir) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn offset(self, dir: Option<Dir>, tiles: i32) -> Self {
        let (dx, dy) = dir.map(Dir::delta).unwrap_or((0, 0));
        Self {
            x: self.x + dx * tiles,
            y: self.y + dy * tiles,
        }
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn distance_sq(self, other: GridPos) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn clamp_to(self, width: usize, height: usize) -> Self {
        Self {
            x: self.x.clamp(0, width as i32 - 1),
            y: self.y.clamp(0, height as i32 - 1),
        }
    }

    pub fn center(self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    /// Fixed iteration order; also the tie-break priority for enemy steering.
    pub const ALL: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

/// A normalized movement intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Steer {
    Idle,
    Toward(Dir),
}

impl Steer {
    /// Normalizes an input vector. Diagonals and out-of-range components
    /// yield `None` and are ignored by the caller.
    pub fn from_vector(x: i32, y: i32) -> Option<Steer> {
        match (x, y) {
            (0, 0) => Some(Steer::Idle),
            (0, -1) => Some(Steer::Toward(Dir::Up)),
            (0, 1) => Some(Steer::Toward(Dir::Down)),
            (-1, 0) => Some(Steer::Toward(Dir::Left)),
            (1, 0) => Some(Steer::Toward(Dir::Right)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Wall,
    Empty,
    Pellet,
    PowerPellet,
}

impl Cell {
    pub fn is_wall(self) -> bool {
        self == Cell::Wall
    }

    pub fn pellet_kind(self) -> Option<PelletKind> {
        match self {
            Cell::Pellet => Some(PelletKind::Normal),
            Cell::PowerPellet => Some(PelletKind::Power),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum PelletKind {
    Normal,
    Power,
}
