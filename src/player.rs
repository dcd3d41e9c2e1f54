use serde::Serialize;

use crate::components::{Dir, GridPos, Steer};
use crate::constants::INVINCIBLE_SECS;
use crate::maze::MazeConfig;
use crate::movement::{Arrival, Mover};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub mover: Mover,
    pub spawn: GridPos,
    pub lives: u32,
    pub invincible_until: f64,
    /// Latched turn, applied at the next cell.
    pub next_dir: Option<Dir>,
    stopping: bool,
}

impl Player {
    pub fn new(spawn: GridPos, lives: u32) -> Self {
        Self {
            mover: Mover::at(spawn),
            spawn,
            lives,
            invincible_until: f64::NEG_INFINITY,
            next_dir: None,
            stopping: false,
        }
    }

    pub fn cell(&self) -> GridPos {
        self.mover.cell
    }

    pub fn is_out(&self) -> bool {
        self.lives == 0
    }

    /// Direction of travel, or `None` when standing still.
    pub fn heading(&self) -> Option<Dir> {
        if self.mover.moving {
            self.mover.dir
        } else {
            None
        }
    }

    pub fn steer(&mut self, steer: Steer) {
        match steer {
            Steer::Idle => {
                self.next_dir = None;
                self.stopping = true;
            }
            Steer::Toward(dir) => {
                self.next_dir = Some(dir);
                self.stopping = false;
            }
        }
    }

    pub fn is_invincible(&self, now: f64) -> bool {
        now < self.invincible_until
    }

    /// Picks the next move when at rest: the latched turn if open, else
    /// straight on, else stop.
    pub fn update(&mut self, maze: &MazeConfig, step: f32) -> Arrival {
        if !self.mover.moving {
            let turned = self.next_dir.is_some_and(|d| self.mover.try_begin(maze, d));
            if !turned && !self.stopping {
                if let Some(d) = self.mover.dir {
                    self.mover.try_begin(maze, d);
                }
            }
        }
        self.mover.advance(maze, step)
    }

    /// Back to spawn with a grace window; the latched turn is forgotten.
    pub fn respawn(&mut self, now: f64) {
        self.mover.reset(self.spawn);
        self.next_dir = None;
        self.stopping = false;
        self.invincible_until = now + INVINCIBLE_SECS;
    }

    /// New level: new spawn, same lives.
    pub fn relocate(&mut self, spawn: GridPos) {
        self.spawn = spawn;
        self.mover.reset(spawn);
        self.next_dir = None;
        self.stopping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate;

    #[test]
    fn queued_turn_waits_for_cell() {
        let maze = generate(21, 21, Some(1), Some(3));
        let mut p = Player::new(GridPos::new(1, 1), 3);
        p.steer(Steer::Toward(Dir::Right));
        p.update(&maze, 0.5);
        assert_eq!(p.heading(), Some(Dir::Right));
        // (1,2) is open below the spawn, but the move in flight finishes first
        p.steer(Steer::Toward(Dir::Down));
        p.update(&maze, 0.2);
        assert_eq!(p.mover.dir, Some(Dir::Right));
        assert_eq!(p.update(&maze, 0.5), Arrival::Settled(GridPos::new(2, 1)));
    }

    #[test]
    fn idle_stops_after_current_move() {
        let maze = generate(21, 21, Some(1), Some(3));
        let mut p = Player::new(GridPos::new(1, 1), 3);
        p.steer(Steer::Toward(Dir::Down));
        p.update(&maze, 0.5);
        p.steer(Steer::Idle);
        assert_eq!(p.update(&maze, 0.6), Arrival::Settled(GridPos::new(1, 2)));
        p.update(&maze, 0.5);
        assert_eq!(p.cell(), GridPos::new(1, 2));
        assert_eq!(p.heading(), None);
    }

    #[test]
    fn respawn_grants_invincibility() {
        let mut p = Player::new(GridPos::new(1, 1), 3);
        p.mover.place(GridPos::new(5, 5));
        p.respawn(10.0);
        assert_eq!(p.cell(), GridPos::new(1, 1));
        assert!(p.is_invincible(12.0));
        assert!(!p.is_invincible(12.5));
    }
}
