use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Cell, GridPos};
use crate::constants::{POWER_UP_SPAWN_CHANCE, POWER_UP_SPAWN_INTERVAL_SECS};
use crate::maze::MazeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUpKind {
    Speed,
    Shield,
    Magnet,
    Freeze,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Speed,
        PowerUpKind::Shield,
        PowerUpKind::Magnet,
        PowerUpKind::Freeze,
    ];

    pub fn duration_secs(self) -> f64 {
        match self {
            PowerUpKind::Speed => 5.0,
            PowerUpKind::Shield => 8.0,
            PowerUpKind::Magnet => 6.0,
            PowerUpKind::Freeze => 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivePowerUp {
    pub kind: PowerUpKind,
    pub expires_at: f64,
}

/// Power-ups lying in the maze plus the single active effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerUps {
    pub placed: BTreeMap<GridPos, PowerUpKind>,
    pub active: Option<ActivePowerUp>,
    last_spawn_at: f64,
}

impl PowerUps {
    /// Clears the board and restarts the spawn interval from `now`.
    pub fn reset_level(&mut self, now: f64) {
        self.placed.clear();
        self.last_spawn_at = now;
    }

    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.active.is_some_and(|a| a.kind == kind)
    }

    pub fn remaining(&self, now: f64) -> f64 {
        self.active.map_or(0.0, |a| (a.expires_at - now).max(0.0))
    }

    /// Activates whatever lies on `cell`, replacing any current effect.
    pub fn pick_up(&mut self, cell: GridPos, now: f64) -> Option<PowerUpKind> {
        let kind = self.placed.remove(&cell)?;
        self.active = Some(ActivePowerUp {
            kind,
            expires_at: now + kind.duration_secs(),
        });
        Some(kind)
    }

    /// Drops the active effect once past its deadline. Returns the kind that
    /// just lapsed.
    pub fn expire(&mut self, now: f64) -> Option<PowerUpKind> {
        let active = self.active?;
        if now < active.expires_at {
            return None;
        }
        self.active = None;
        Some(active.kind)
    }

    /// Rolls for a new power-up once the spawn interval has passed.
    pub fn maybe_spawn(
        &mut self,
        maze: &MazeConfig,
        occupied: &[GridPos],
        frequency: f64,
        now: f64,
        rng: &mut impl Rng,
    ) -> Option<(GridPos, PowerUpKind)> {
        if now - self.last_spawn_at < POWER_UP_SPAWN_INTERVAL_SECS {
            return None;
        }
        if rng.gen::<f64>() >= POWER_UP_SPAWN_CHANCE * frequency {
            return None;
        }
        let (w, h) = (maze.width as i32, maze.height as i32);
        let cells: Vec<GridPos> = (1..h - 1)
            .flat_map(|y| (1..w - 1).map(move |x| GridPos::new(x, y)))
            .filter(|p| maze.grid.get(*p) == Some(Cell::Empty))
            .filter(|p| !self.placed.contains_key(p) && !occupied.contains(p))
            .collect();
        let cell = *cells.choose(rng)?;
        let kind = *PowerUpKind::ALL.choose(rng)?;
        self.placed.insert(cell, kind);
        self.last_spawn_at = now;
        Some((cell, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pickup_overwrites_and_expires() {
        let mut p = PowerUps::default();
        p.placed.insert(GridPos::new(3, 1), PowerUpKind::Shield);
        p.placed.insert(GridPos::new(5, 1), PowerUpKind::Freeze);
        assert_eq!(p.pick_up(GridPos::new(3, 1), 0.0), Some(PowerUpKind::Shield));
        assert_eq!(p.pick_up(GridPos::new(5, 1), 1.0), Some(PowerUpKind::Freeze));
        assert!(p.is_active(PowerUpKind::Freeze));
        assert!(!p.is_active(PowerUpKind::Shield));
        assert_eq!(p.pick_up(GridPos::new(5, 1), 1.0), None);
        assert_eq!(p.expire(4.9), None);
        assert_eq!(p.expire(5.0), Some(PowerUpKind::Freeze));
        assert!(p.active.is_none());
    }

    #[test]
    fn spawns_only_after_interval() {
        let maze = generate(21, 21, Some(1), Some(3));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut p = PowerUps::default();
        p.reset_level(0.0);
        for _ in 0..500 {
            assert!(p.maybe_spawn(&maze, &[], 1.0, 10.0, &mut rng).is_none());
        }
        let spawned = (0..2000).find_map(|_| p.maybe_spawn(&maze, &[], 1.0, 25.0, &mut rng));
        let (cell, _) = spawned.expect("2% per roll spawns within 2000 rolls");
        assert_eq!(maze.grid.get(cell), Some(Cell::Empty));
        assert!(p.placed.contains_key(&cell));
    }
}
