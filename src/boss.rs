use rand::Rng;
use serde::Serialize;

use crate::components::GridPos;
use crate::constants::{BOSS_HIT_COOLDOWN_SECS, BOSS_HP};
use crate::director::GhostMode;
use crate::ghost::{choose_direction, Goal};
use crate::maze::MazeConfig;
use crate::movement::Mover;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossHit {
    Wounded { hp: u32 },
    Defeated,
}

/// Boss-level enemy. Ignores scatter; runs from the player while
/// frightened; takes one hit per cooldown window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boss {
    pub mover: Mover,
    pub hp: u32,
    pub max_hp: u32,
    pub active: bool,
    last_hit: Option<f64>,
}

impl Boss {
    pub fn spawn_at(cell: GridPos) -> Self {
        Self {
            mover: Mover::at(cell),
            hp: BOSS_HP,
            max_hp: BOSS_HP,
            active: true,
            last_hit: None,
        }
    }

    pub fn update(
        &mut self,
        maze: &MazeConfig,
        mode: GhostMode,
        player: GridPos,
        step: f32,
        rng: &mut impl Rng,
    ) {
        if !self.active {
            return;
        }
        if !self.mover.moving {
            let goal = match mode {
                GhostMode::Frightened => Goal::Flee(player),
                GhostMode::Scatter | GhostMode::Chase => Goal::Seek(player),
            };
            if let Some(dir) = choose_direction(maze, self.mover.cell, self.mover.dir, goal, rng) {
                self.mover.try_begin(maze, dir);
            }
        }
        self.mover.advance(maze, step);
    }

    pub fn can_be_hit(&self, now: f64) -> bool {
        self.active && self.last_hit.map_or(true, |t| now - t >= BOSS_HIT_COOLDOWN_SECS)
    }

    pub fn hit(&mut self, now: f64) -> BossHit {
        self.last_hit = Some(now);
        self.hp = self.hp.saturating_sub(1);
        if self.hp == 0 {
            self.active = false;
            BossHit::Defeated
        } else {
            BossHit::Wounded { hp: self.hp }
        }
    }
}
