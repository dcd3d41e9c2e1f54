//! Grid-locked movement with continuous interpolation between cells.

use serde::Serialize;

use crate::components::{Dir, GridPos};
use crate::maze::MazeConfig;

/// Snap tolerance, in cells.
const SNAP_EPSILON: f32 = 0.04;

/// Position state shared by every moving entity.
///
/// An entity is either at rest on `cell`, or travelling from `cell` toward
/// `target`, which was checked passable before the move began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mover {
    pub cell: GridPos,
    pub target: GridPos,
    pub pos: (f32, f32),
    pub dir: Option<Dir>,
    pub moving: bool,
}

/// What happened to a mover during one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Travelling,
    Settled(GridPos),
    Warped { from: GridPos, to: GridPos },
}

impl Mover {
    pub fn at(cell: GridPos) -> Self {
        Self {
            cell,
            target: cell,
            pos: cell.center(),
            dir: None,
            moving: false,
        }
    }

    /// Relocates instantly and cancels any move in progress. Direction is
    /// kept so steering still treats a reversal as a reversal.
    pub fn place(&mut self, cell: GridPos) {
        self.cell = cell;
        self.target = cell;
        self.pos = cell.center();
        self.moving = false;
    }

    pub fn reset(&mut self, cell: GridPos) {
        *self = Self::at(cell);
    }

    /// Commits to a step if the neighbouring cell is passable.
    pub fn try_begin(&mut self, maze: &MazeConfig, dir: Dir) -> bool {
        if self.moving {
            return false;
        }
        let next = self.cell.step(dir);
        if !maze.can_move_to(next) {
            return false;
        }
        self.dir = Some(dir);
        self.target = next;
        self.moving = true;
        true
    }

    /// Turns around on the spot, or heads back to the cell just left when
    /// caught mid-move.
    pub fn reverse(&mut self) {
        let Some(dir) = self.dir else { return };
        self.dir = Some(dir.opposite());
        if self.moving {
            std::mem::swap(&mut self.cell, &mut self.target);
        }
    }

    /// Moves `step` cells toward the target, snapping once within reach.
    pub fn advance(&mut self, maze: &MazeConfig, step: f32) -> Arrival {
        if !self.moving {
            return Arrival::Travelling;
        }
        let (tx, ty) = self.target.center();
        let (dx, dy) = (tx - self.pos.0, ty - self.pos.1);
        let dist = (dx * dx + dy * dy).sqrt();

        if dist <= step || dist < SNAP_EPSILON {
            let reached = self.target;
            self.place(reached);
            if let Some(to) = maze.warp_destination(reached) {
                self.place(to);
                return Arrival::Warped { from: reached, to };
            }
            return Arrival::Settled(reached);
        }

        self.pos.0 += dx / dist * step;
        self.pos.1 += dy / dist * step;
        Arrival::Travelling
    }

    pub fn overlaps(&self, other: (f32, f32), radius: f32) -> bool {
        (self.pos.0 - other.0).abs() < radius && (self.pos.1 - other.1).abs() < radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate;

    fn open_maze() -> MazeConfig {
        generate(21, 21, Some(1), Some(3))
    }

    #[test]
    fn interpolates_then_snaps() {
        let maze = open_maze();
        let mut m = Mover::at(GridPos::new(1, 1));
        assert!(m.try_begin(&maze, Dir::Right));
        assert_eq!(m.advance(&maze, 0.4), Arrival::Travelling);
        assert!((m.pos.0 - 1.4).abs() < 1e-5);
        assert_eq!(m.cell, GridPos::new(1, 1));
        assert_eq!(m.advance(&maze, 0.7), Arrival::Settled(GridPos::new(2, 1)));
        assert_eq!(m.pos, (2.0, 1.0));
        assert!(!m.moving);
    }

    #[test]
    fn cannot_start_into_wall_or_mid_move() {
        let maze = open_maze();
        let mut m = Mover::at(GridPos::new(1, 1));
        assert!(!m.try_begin(&maze, Dir::Up));
        assert!(m.try_begin(&maze, Dir::Down));
        assert!(!m.try_begin(&maze, Dir::Right));
        assert_eq!(m.dir, Some(Dir::Down));
    }

    #[test]
    fn warps_on_arrival_at_tunnel_mouth() {
        let maze = open_maze();
        let mut m = Mover::at(GridPos::new(1, 10));
        assert!(m.try_begin(&maze, Dir::Left));
        let arrival = m.advance(&maze, 2.0);
        assert_eq!(
            arrival,
            Arrival::Warped {
                from: GridPos::new(0, 10),
                to: GridPos::new(19, 10)
            }
        );
        assert_eq!(m.cell, GridPos::new(19, 10));
    }

    #[test]
    fn reverse_mid_move_heads_back() {
        let maze = open_maze();
        let mut m = Mover::at(GridPos::new(1, 1));
        m.try_begin(&maze, Dir::Right);
        m.advance(&maze, 0.3);
        m.reverse();
        assert_eq!(m.dir, Some(Dir::Left));
        assert_eq!(m.target, GridPos::new(1, 1));
        assert_eq!(m.advance(&maze, 0.5), Arrival::Settled(GridPos::new(1, 1)));
    }
}
