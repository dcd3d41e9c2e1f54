use serde::Serialize;

use crate::components::GridPos;
use crate::maze::MazeConfig;

pub const ENEMY_COUNT: usize = 4;

/// Where everything starts on a freshly generated maze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelLayout {
    pub player_start: GridPos,
    pub player_two_start: GridPos,
    pub enemy_starts: Vec<GridPos>,
    pub scatter_corners: [GridPos; ENEMY_COUNT],
}

pub fn create_layout(maze: &MazeConfig) -> LevelLayout {
    LevelLayout {
        player_start: MazeConfig::spawn(),
        player_two_start: player_two_start(maze),
        enemy_starts: enemy_starts(maze),
        scatter_corners: scatter_corners(maze),
    }
}

fn center(maze: &MazeConfig) -> GridPos {
    GridPos::new((maze.width / 2) as i32, (maze.height / 2) as i32)
}

fn is_interior(maze: &MazeConfig, pos: GridPos) -> bool {
    pos.x > 0 && pos.y > 0 && pos.x < maze.width as i32 - 1 && pos.y < maze.height as i32 - 1
}

/// Cells on the square ring at Chebyshev distance `r` from `origin`, row by
/// row from the top.
fn ring(origin: GridPos, r: i32) -> impl Iterator<Item = GridPos> {
    (-r..=r).flat_map(move |dy| {
        (-r..=r)
            .filter(move |dx| dx.abs() == r || dy.abs() == r)
            .map(move |dx| GridPos::new(origin.x + dx, origin.y + dy))
    })
}

/// First open interior cells found ringing outward from the centre, keeping
/// clear of the player's spawn corner.
fn enemy_starts(maze: &MazeConfig) -> Vec<GridPos> {
    let origin = center(maze);
    let max_r = maze.width.max(maze.height) as i32;
    (0..max_r)
        .flat_map(|r| ring(origin, r))
        .filter(|&p| is_interior(maze, p) && maze.grid.is_open(p) && !(p.x <= 2 && p.y <= 2))
        .take(ENEMY_COUNT)
        .collect()
}

/// Top-right, top-left, bottom-right, bottom-left, in personality order.
fn scatter_corners(maze: &MazeConfig) -> [GridPos; ENEMY_COUNT] {
    let (r, b) = (maze.width as i32 - 2, maze.height as i32 - 2);
    [
        GridPos::new(r, 1),
        GridPos::new(1, 1),
        GridPos::new(r, b),
        GridPos::new(1, b),
    ]
}

/// First open cell scanning backwards from the bottom-right interior corner.
fn player_two_start(maze: &MazeConfig) -> GridPos {
    let (r, b) = (maze.width as i32 - 2, maze.height as i32 - 2);
    (1..=b)
        .rev()
        .flat_map(|y| (1..=r).rev().map(move |x| GridPos::new(x, y)))
        .find(|&p| maze.grid.is_open(p))
        .unwrap_or(GridPos::new(r, b))
}

/// Nearest cell to the centre, within `radius` rings, accepted by `accept`.
pub fn nearest_to_center(
    maze: &MazeConfig,
    radius: i32,
    accept: impl Fn(GridPos) -> bool,
) -> Option<GridPos> {
    let origin = center(maze);
    (0..=radius)
        .flat_map(|r| ring(origin, r))
        .find(|&p| is_interior(maze, p) && accept(p))
}
