//! Standard enemies: the four targeting personalities and the shared
//! direction chooser that every enemy kind steers with.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Dir, GridPos};
use crate::constants::{AMBUSH_TILES, EATEN_RETURN_SECS, FLANK_TILES, SHY_RADIUS};
use crate::director::GhostMode;
use crate::maze::MazeConfig;
use crate::movement::Mover;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Personality {
    Chaser,
    Ambusher,
    Flanker,
    Shy,
}

/// What an enemy needs to know about the world to pick a target.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext {
    pub player: GridPos,
    pub player_dir: Option<Dir>,
    /// Current cell of the chaser, the pivot for the flanker.
    pub chaser: GridPos,
    pub width: usize,
    pub height: usize,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Chaser,
        Personality::Ambusher,
        Personality::Flanker,
        Personality::Shy,
    ];

    /// Chase-mode target.
    pub fn chase_target(self, me: GridPos, scatter: GridPos, ctx: &TargetContext) -> GridPos {
        match self {
            Personality::Chaser => ctx.player,
            Personality::Ambusher => ctx
                .player
                .offset(ctx.player_dir, AMBUSH_TILES)
                .clamp_to(ctx.width, ctx.height),
            Personality::Flanker => {
                let pivot = ctx.player.offset(ctx.player_dir, FLANK_TILES);
                GridPos::new(2 * pivot.x - ctx.chaser.x, 2 * pivot.y - ctx.chaser.y)
                    .clamp_to(ctx.width, ctx.height)
            }
            Personality::Shy => {
                if me.manhattan(ctx.player) > SHY_RADIUS {
                    ctx.player
                } else {
                    scatter
                }
            }
        }
    }
}

/// How an enemy wants to move this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Seek(GridPos),
    Flee(GridPos),
    Wander,
}

/// Picks the next direction from `from`. Reversing `current` is considered
/// only when nothing else is passable.
pub fn choose_direction(
    maze: &MazeConfig,
    from: GridPos,
    current: Option<Dir>,
    goal: Goal,
    rng: &mut impl Rng,
) -> Option<Dir> {
    let passable: Vec<Dir> = Dir::ALL
        .into_iter()
        .filter(|&d| maze.can_move_to(from.step(d)))
        .collect();
    let forward: Vec<Dir> = passable
        .iter()
        .copied()
        .filter(|&d| current.map_or(true, |c| d != c.opposite()))
        .collect();

    if forward.is_empty() {
        return passable.first().copied();
    }

    match goal {
        Goal::Wander => forward.choose(rng).copied(),
        Goal::Seek(target) => forward
            .into_iter()
            .min_by_key(|&d| from.step(d).distance_sq(target)),
        Goal::Flee(threat) => forward
            .into_iter()
            .max_by_key(|&d| from.step(d).distance_sq(threat)),
    }
}

/// A consumed enemy gliding back to its spawn; not collidable meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EatenReturn {
    pub from: (f32, f32),
    pub started_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enemy {
    pub personality: Personality,
    pub mover: Mover,
    pub scatter_target: GridPos,
    pub spawn: GridPos,
    pub returning: Option<EatenReturn>,
}

impl Enemy {
    pub fn new(personality: Personality, spawn: GridPos, scatter_target: GridPos) -> Self {
        Self {
            personality,
            mover: Mover::at(spawn),
            scatter_target,
            spawn,
            returning: None,
        }
    }

    pub fn is_eaten(&self) -> bool {
        self.returning.is_some()
    }

    pub fn eat(&mut self, now: f64) {
        self.returning = Some(EatenReturn {
            from: self.mover.pos,
            started_at: now,
        });
        self.mover.moving = false;
    }

    /// Interpolates the glide home. Returns true on the tick it lands.
    pub fn update_return(&mut self, now: f64) -> bool {
        let Some(ret) = self.returning else {
            return false;
        };
        let t = ((now - ret.started_at) / EATEN_RETURN_SECS).clamp(0.0, 1.0) as f32;
        if t >= 1.0 {
            self.returning = None;
            self.mover.reset(self.spawn);
            return true;
        }
        let (sx, sy) = self.spawn.center();
        self.mover.pos = (ret.from.0 + (sx - ret.from.0) * t, ret.from.1 + (sy - ret.from.1) * t);
        false
    }

    pub fn goal(&self, mode: GhostMode, ctx: &TargetContext) -> Goal {
        let me = self.mover.cell;
        match mode {
            GhostMode::Frightened => Goal::Wander,
            GhostMode::Scatter => Goal::Seek(self.scatter_target),
            GhostMode::Chase => {
                Goal::Seek(self.personality.chase_target(me, self.scatter_target, ctx))
            }
        }
    }

    /// Steers if at rest, then advances. Eaten enemies only glide home.
    pub fn update(
        &mut self,
        maze: &MazeConfig,
        mode: GhostMode,
        ctx: &TargetContext,
        step: f32,
        rng: &mut impl Rng,
    ) {
        if self.is_eaten() {
            return;
        }
        if !self.mover.moving {
            let goal = self.goal(mode, ctx);
            if let Some(dir) = choose_direction(maze, self.mover.cell, self.mover.dir, goal, rng) {
                self.mover.try_begin(maze, dir);
            }
        }
        self.mover.advance(maze, step);
    }
}
