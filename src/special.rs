//! Teleporter and splitter enemies, kept in an id-keyed arena so children
//! can be added and the defeated removed mid-level.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::components::{Dir, GridPos};
use crate::constants::{
    SPECIAL_HIT_COOLDOWN_SECS, SPLITTER_HP, SPLITTER_MIN_LEVEL, TELEPORTER_MIN_LEVEL,
    TELEPORT_INTERVAL_SECS, TELEPORT_MAX_DIST, TELEPORT_MIN_DIST,
};
use crate::ghost::{choose_direction, Goal};
use crate::maze::MazeConfig;
use crate::movement::Mover;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialKind {
    Teleporter,
    Splitter,
}

impl SpecialKind {
    /// Roll order when a level picks its special.
    pub const ALL: [SpecialKind; 2] = [SpecialKind::Teleporter, SpecialKind::Splitter];

    pub fn min_level(self) -> u32 {
        match self {
            SpecialKind::Teleporter => TELEPORTER_MIN_LEVEL,
            SpecialKind::Splitter => SPLITTER_MIN_LEVEL,
        }
    }

    fn hp(self) -> u32 {
        match self {
            SpecialKind::Teleporter => 1,
            SpecialKind::Splitter => SPLITTER_HP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EnemyId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialEnemy {
    pub kind: SpecialKind,
    pub mover: Mover,
    pub hp: u32,
    pub is_child: bool,
    pub last_ability_at: f64,
    last_hit: Option<f64>,
}

/// Result of landing a frightened-mode hit on a special enemy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialHit {
    Wounded { hp: u32 },
    Destroyed,
    Split { children: Vec<EnemyId> },
}

impl SpecialEnemy {
    pub fn new(kind: SpecialKind, cell: GridPos, now: f64) -> Self {
        Self {
            kind,
            mover: Mover::at(cell),
            hp: kind.hp(),
            is_child: false,
            last_ability_at: now,
            last_hit: None,
        }
    }

    fn child(cell: GridPos, now: f64) -> Self {
        Self {
            kind: SpecialKind::Splitter,
            mover: Mover::at(cell),
            hp: 1,
            is_child: true,
            last_ability_at: now,
            last_hit: None,
        }
    }

    pub fn can_be_hit(&self, now: f64) -> bool {
        self.last_hit
            .map_or(true, |t| now - t >= SPECIAL_HIT_COOLDOWN_SECS)
    }

    /// Always heads straight for the player.
    pub fn update(&mut self, maze: &MazeConfig, player: GridPos, step: f32, rng: &mut impl Rng) {
        if !self.mover.moving {
            let goal = Goal::Seek(player);
            if let Some(dir) = choose_direction(maze, self.mover.cell, self.mover.dir, goal, rng) {
                self.mover.try_begin(maze, dir);
            }
        }
        self.mover.advance(maze, step);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecialRoster {
    next_id: u32,
    enemies: BTreeMap<EnemyId, SpecialEnemy>,
}

impl SpecialRoster {
    pub fn insert(&mut self, enemy: SpecialEnemy) -> EnemyId {
        let id = EnemyId(self.next_id);
        self.next_id += 1;
        self.enemies.insert(id, enemy);
        id
    }

    pub fn remove(&mut self, id: EnemyId) -> Option<SpecialEnemy> {
        self.enemies.remove(&id)
    }

    pub fn get(&self, id: EnemyId) -> Option<&SpecialEnemy> {
        self.enemies.get(&id)
    }

    pub fn ids(&self) -> Vec<EnemyId> {
        self.enemies.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EnemyId, &SpecialEnemy)> {
        self.enemies.iter().map(|(&id, e)| (id, e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EnemyId, &mut SpecialEnemy)> {
        self.enemies.iter_mut().map(|(&id, e)| (id, e))
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    pub fn clear(&mut self) {
        self.enemies.clear();
    }

    /// Applies one hit. A splitter parent reaching zero is replaced by up
    /// to two children on its passable left/right neighbours.
    pub fn hit(&mut self, id: EnemyId, maze: &MazeConfig, now: f64) -> Option<SpecialHit> {
        let enemy = self.enemies.get_mut(&id)?;
        enemy.last_hit = Some(now);
        enemy.hp = enemy.hp.saturating_sub(1);
        if enemy.hp > 0 {
            return Some(SpecialHit::Wounded { hp: enemy.hp });
        }

        let splits = enemy.kind == SpecialKind::Splitter && !enemy.is_child;
        let at = enemy.mover.cell;
        self.remove(id);
        if !splits {
            return Some(SpecialHit::Destroyed);
        }

        let children = [Dir::Left, Dir::Right]
            .into_iter()
            .map(|d| at.step(d))
            .filter(|&cell| maze.can_move_to(cell))
            .map(|cell| self.insert(SpecialEnemy::child(cell, now)))
            .collect();
        Some(SpecialHit::Split { children })
    }
}

/// Open interior cell at a Manhattan distance strictly between the band
/// limits from `player`.
pub fn teleport_destination(
    maze: &MazeConfig,
    player: GridPos,
    rng: &mut impl Rng,
) -> Option<GridPos> {
    let (w, h) = (maze.width as i32, maze.height as i32);
    let candidates: Vec<GridPos> = (1..h - 1)
        .flat_map(|y| (1..w - 1).map(move |x| GridPos::new(x, y)))
        .filter(|&p| maze.grid.is_open(p))
        .filter(|&p| {
            let d = p.manhattan(player);
            d > TELEPORT_MIN_DIST && d < TELEPORT_MAX_DIST
        })
        .collect();
    candidates.choose(rng).copied()
}

pub fn teleport_due(enemy: &SpecialEnemy, now: f64) -> bool {
    enemy.kind == SpecialKind::Teleporter && now - enemy.last_ability_at > TELEPORT_INTERVAL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn splitter_splits_once() {
        let maze = generate(21, 21, Some(1), Some(8));
        // the spawn cell (1,1) is always open, so the left child fits
        let mut roster = SpecialRoster::default();
        let id = roster.insert(SpecialEnemy::new(SpecialKind::Splitter, GridPos::new(2, 1), 0.0));
        assert_eq!(roster.hit(id, &maze, 0.0), Some(SpecialHit::Wounded { hp: 1 }));
        let Some(SpecialHit::Split { children }) = roster.hit(id, &maze, 2.0) else {
            panic!("parent should split");
        };
        assert!(!children.is_empty());
        assert!(roster.get(id).is_none());
        assert_eq!(roster.len(), children.len());
        for child in children {
            assert!(roster.get(child).is_some_and(|c| c.is_child && c.hp == 1));
            assert_eq!(roster.hit(child, &maze, 4.0), Some(SpecialHit::Destroyed));
        }
        assert!(roster.is_empty());
    }

    #[test]
    fn teleporter_lands_in_band() {
        let maze = generate(21, 21, Some(8), Some(12));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let player = GridPos::new(1, 1);
        for _ in 0..50 {
            let p = teleport_destination(&maze, player, &mut rng).expect("band is non-empty");
            let d = p.manhattan(player);
            assert!(d > TELEPORT_MIN_DIST && d < TELEPORT_MAX_DIST);
            assert!(maze.grid.is_open(p));
        }
    }

    #[test]
    fn teleport_interval() {
        let e = SpecialEnemy::new(SpecialKind::Teleporter, GridPos::new(3, 3), 10.0);
        assert!(!teleport_due(&e, 15.0));
        assert!(teleport_due(&e, 15.01));
        let s = SpecialEnemy::new(SpecialKind::Splitter, GridPos::new(3, 3), 10.0);
        assert!(!teleport_due(&s, 100.0));
    }
}
