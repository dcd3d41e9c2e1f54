use serde::Serialize;

use crate::components::{Cell, GridPos};
use crate::constants::{CENTER_SEARCH_RADIUS, FRUIT_INTERVAL_SECS, FRUIT_LIFETIME_SECS, FRUIT_POINTS};
use crate::level::nearest_to_center;
use crate::maze::MazeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fruit {
    pub cell: GridPos,
    pub points: u64,
    pub expires_at: f64,
}

/// Bonus item timer: one fruit at a time, on a fixed cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FruitTimer {
    pub current: Option<Fruit>,
    last_spawn_at: f64,
}

pub fn fruit_points(level: u32) -> u64 {
    let idx = (level.max(1) as usize - 1).min(FRUIT_POINTS.len() - 1);
    FRUIT_POINTS[idx]
}

impl FruitTimer {
    pub fn rearm(&mut self, now: f64) {
        self.current = None;
        self.last_spawn_at = now;
    }

    /// Despawns a stale fruit and spawns a new one when due. Returns the
    /// fruit spawned this call, if any.
    pub fn update(
        &mut self,
        maze: &MazeConfig,
        level: u32,
        pellets_eaten: u32,
        now: f64,
    ) -> Option<Fruit> {
        if self.current.is_some_and(|f| now >= f.expires_at) {
            self.current = None;
        }
        if self.current.is_some()
            || pellets_eaten == 0
            || now - self.last_spawn_at < FRUIT_INTERVAL_SECS
        {
            return None;
        }
        self.last_spawn_at = now;
        let cell = nearest_to_center(maze, CENTER_SEARCH_RADIUS, |p| {
            maze.grid.get(p) == Some(Cell::Empty)
        })?;
        let fruit = Fruit {
            cell,
            points: fruit_points(level),
            expires_at: now + FRUIT_LIFETIME_SECS,
        };
        self.current = Some(fruit);
        Some(fruit)
    }

    pub fn take_at(&mut self, cell: GridPos) -> Option<Fruit> {
        if self.current.is_some_and(|f| f.cell == cell) {
            return self.current.take();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::generate;

    #[test]
    fn points_scale_with_level_then_cap() {
        assert_eq!(fruit_points(1), 100);
        assert_eq!(fruit_points(3), 500);
        assert_eq!(fruit_points(8), 5000);
        assert_eq!(fruit_points(30), 5000);
    }

    #[test]
    fn spawns_on_cadence_and_lapses() {
        let maze = generate(21, 21, Some(5), Some(1));
        let mut timer = FruitTimer::default();
        timer.rearm(0.0);
        assert!(timer.update(&maze, 1, 0, 20.0).is_none());
        assert!(timer.update(&maze, 1, 3, 10.0).is_none());
        let fruit = timer.update(&maze, 2, 3, 15.0).expect("arena centre is clear");
        assert_eq!(fruit.points, 300);
        assert!(timer.update(&maze, 2, 3, 22.0).is_none());
        assert!(timer.current.is_some());
        timer.update(&maze, 2, 3, 23.5);
        assert!(timer.current.is_none());
        assert!(timer.take_at(fruit.cell).is_none());
    }
}
