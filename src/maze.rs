//! Procedural maze generation.
//!
//! Every generator works on an odd-sized grid whose cells at odd
//! coordinates are rooms and whose even coordinates are walls until carved.
//! All randomness flows through one `ChaCha8Rng`, so a given
//! `(width, height, level, seed)` always yields the same grid.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Cell, Dir, GridPos};
use crate::constants::{MIN_MAZE_DIM, SPAWN};

const EXTRA_PASSAGE_CHANCE: f64 = 0.15;
const OPEN_PASSAGE_CHANCE: f64 = 0.35;
const CENTER_SEAM_CHANCE: f64 = 0.6;
const SPIRAL_LINK_CHANCE: f64 = 0.4;
const ARENA_RADIUS: i32 = 4;
const PILLAR_OFFSET: i32 = 2;
const POWER_PELLET_CHANCE: f64 = 0.03;
const PELLET_CHANCE: f64 = 0.4;
const MIN_PELLETS: usize = 10;
const BACKFILL_PELLETS: usize = 20;
const ARENA_LEVEL_INTERVAL: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, cell: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![cell; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width + pos.x as usize)
    }

    pub fn get(&self, pos: GridPos) -> Option<Cell> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: GridPos, cell: Cell) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = cell;
        }
    }

    pub fn is_wall(&self, pos: GridPos) -> bool {
        self.get(pos).map_or(true, Cell::is_wall)
    }

    pub fn is_open(&self, pos: GridPos) -> bool {
        !self.is_wall(pos)
    }

    pub fn open_neighbors(&self, pos: GridPos) -> usize {
        Dir::ALL
            .iter()
            .filter(|&&d| self.is_open(pos.step(d)))
            .count()
    }

    pub fn pellet_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.pellet_kind().is_some())
            .count()
    }

    pub fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| GridPos::new(x, y)))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MazeType {
    Standard,
    Open,
    Symmetric,
    Arena,
    Spiral,
}

impl MazeType {
    const ROTATION: [MazeType; 4] = [
        MazeType::Standard,
        MazeType::Open,
        MazeType::Symmetric,
        MazeType::Spiral,
    ];

    /// Every fifth level is an arena; the other levels rotate through the
    /// remaining types, with arena levels skipped in the count.
    pub fn for_level(level: u32) -> MazeType {
        let level = level.max(1);
        if level % ARENA_LEVEL_INTERVAL == 0 {
            return MazeType::Arena;
        }
        let played = level - 1 - level / ARENA_LEVEL_INTERVAL;
        Self::ROTATION[(played % Self::ROTATION.len() as u32) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MazeConfig {
    pub width: usize,
    pub height: usize,
    pub grid: Grid,
    pub maze_type: MazeType,
    pub warp_tunnel_row: i32,
    pub has_warp_tunnel: bool,
}

impl MazeConfig {
    pub fn spawn() -> GridPos {
        GridPos::new(SPAWN.0, SPAWN.1)
    }

    fn is_warp_row(&self, y: i32) -> bool {
        self.has_warp_tunnel && y == self.warp_tunnel_row
    }

    /// Passability test shared by every entity. Stepping past either edge
    /// is allowed only on the warp row.
    pub fn can_move_to(&self, pos: GridPos) -> bool {
        if self.is_warp_row(pos.y) && (pos.x < 0 || pos.x >= self.width as i32) {
            return true;
        }
        self.grid.is_open(pos)
    }

    /// Where an entity that just settled on `pos` is relocated, if `pos` is
    /// a tunnel mouth.
    pub fn warp_destination(&self, pos: GridPos) -> Option<GridPos> {
        if !self.is_warp_row(pos.y) {
            return None;
        }
        if pos.x <= 0 {
            Some(GridPos::new(self.width as i32 - 2, pos.y))
        } else if pos.x >= self.width as i32 - 1 {
            Some(GridPos::new(1, pos.y))
        } else {
            None
        }
    }

    pub fn pellets_remaining(&self) -> usize {
        self.grid.pellet_count()
    }

    /// Open cells a walker starting at the spawn cannot reach.
    pub fn unreachable_cells(&self) -> Vec<GridPos> {
        let warp = self.has_warp_tunnel.then_some(self.warp_tunnel_row);
        let reached = flood(&self.grid, warp, Self::spawn());
        self.grid
            .positions()
            .filter(|&p| self.grid.is_open(p) && !reached[p.y as usize * self.width + p.x as usize])
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MazeOptions {
    /// Carve walls between disconnected regions before placing pellets.
    pub repair_disconnected: bool,
}

pub fn maze_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Rounds a requested dimension up to the next odd value no smaller than
/// the minimum playable size.
pub fn normalize_dim(dim: usize) -> usize {
    let dim = dim.max(MIN_MAZE_DIM);
    if dim % 2 == 0 {
        dim + 1
    } else {
        dim
    }
}

pub fn generate(width: usize, height: usize, level: Option<u32>, seed: Option<u64>) -> MazeConfig {
    generate_with(width, height, level, seed, MazeOptions::default())
}

pub fn generate_with(
    width: usize,
    height: usize,
    level: Option<u32>,
    seed: Option<u64>,
    options: MazeOptions,
) -> MazeConfig {
    let maze_type = level.map_or(MazeType::Standard, MazeType::for_level);
    let mut rng = maze_rng(seed);
    let w = normalize_dim(width);
    let h = normalize_dim(height);

    let mut grid = match maze_type {
        MazeType::Standard => standard_maze(w, h, &mut rng),
        MazeType::Open => open_maze(w, h, &mut rng),
        MazeType::Symmetric => symmetric_maze(w, h, &mut rng),
        MazeType::Arena => arena_maze(w, h, &mut rng),
        MazeType::Spiral => spiral_maze(w, h, &mut rng),
    };

    let warp_row = (h / 2) as i32;
    let has_warp = maze_type != MazeType::Arena;
    if has_warp {
        add_warp_tunnel(&mut grid, warp_row);
    }

    let spawn = MazeConfig::spawn();
    grid.set(spawn, Cell::Empty);
    grid.set(spawn.step(Dir::Right), Cell::Empty);
    grid.set(spawn.step(Dir::Down), Cell::Empty);

    if options.repair_disconnected {
        ensure_connected(&mut grid, has_warp.then_some(warp_row), spawn);
    }

    place_pellets(&mut grid, &mut rng);

    tracing::debug!(?maze_type, w, h, pellets = grid.pellet_count(), "maze generated");

    MazeConfig {
        width: w,
        height: h,
        grid,
        maze_type,
        warp_tunnel_row: warp_row,
        has_warp_tunnel: has_warp,
    }
}

fn shuffled_dirs(rng: &mut impl Rng) -> [Dir; 4] {
    let mut dirs = Dir::ALL;
    dirs.shuffle(rng);
    dirs
}

struct CarveFrame {
    pos: GridPos,
    dirs: [Dir; 4],
    next: usize,
}

/// Depth-first backtracker stepping two cells at a time. `x_limit` is the
/// exclusive upper bound for room columns.
fn carve_backtrack(grid: &mut Grid, start: GridPos, x_limit: i32, rng: &mut impl Rng) {
    let y_limit = grid.height() as i32 - 1;
    grid.set(start, Cell::Empty);
    let mut stack = vec![CarveFrame {
        pos: start,
        dirs: shuffled_dirs(rng),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(&dir) = frame.dirs.get(frame.next) else {
            stack.pop();
            continue;
        };
        frame.next += 1;
        let from = frame.pos;

        let mid = from.step(dir);
        let to = mid.step(dir);
        if to.x > 0 && to.x < x_limit && to.y > 0 && to.y < y_limit && grid.is_wall(to) {
            grid.set(mid, Cell::Empty);
            grid.set(to, Cell::Empty);
            stack.push(CarveFrame {
                pos: to,
                dirs: shuffled_dirs(rng),
                next: 0,
            });
        }
    }
}

fn extra_passages(grid: &mut Grid, chance: f64, max_open: usize, rng: &mut impl Rng) {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    for y in 2..h - 2 {
        for x in 2..w - 2 {
            let pos = GridPos::new(x, y);
            if grid.is_wall(pos) && rng.gen::<f64>() < chance {
                let open = grid.open_neighbors(pos);
                if (1..=max_open).contains(&open) {
                    grid.set(pos, Cell::Empty);
                }
            }
        }
    }
}

fn standard_maze(w: usize, h: usize, rng: &mut impl Rng) -> Grid {
    let mut grid = Grid::filled(w, h, Cell::Wall);
    carve_backtrack(&mut grid, MazeConfig::spawn(), w as i32 - 1, rng);
    extra_passages(&mut grid, EXTRA_PASSAGE_CHANCE, 2, rng);
    grid
}

fn open_maze(w: usize, h: usize, rng: &mut impl Rng) -> Grid {
    let mut grid = standard_maze(w, h, rng);
    extra_passages(&mut grid, OPEN_PASSAGE_CHANCE, 3, rng);
    grid
}

fn symmetric_maze(w: usize, h: usize, rng: &mut impl Rng) -> Grid {
    let half_w = w.div_ceil(2);
    let mut left = Grid::filled(half_w, h, Cell::Wall);
    carve_backtrack(&mut left, MazeConfig::spawn(), half_w as i32, rng);

    let mut grid = Grid::filled(w, h, Cell::Wall);
    for y in 0..h as i32 {
        for x in 0..half_w as i32 {
            let cell = left.get(GridPos::new(x, y)).unwrap_or(Cell::Wall);
            grid.set(GridPos::new(x, y), cell);
            grid.set(GridPos::new(w as i32 - 1 - x, y), cell);
        }
    }

    let mid_x = (w / 2) as i32;
    for y in 1..h as i32 - 1 {
        if rng.gen::<f64>() < CENTER_SEAM_CHANCE {
            grid.set(GridPos::new(mid_x, y), Cell::Empty);
        }
    }
    grid
}

fn arena_maze(w: usize, h: usize, rng: &mut impl Rng) -> Grid {
    let mut grid = standard_maze(w, h, rng);
    let (w, h) = (w as i32, h as i32);
    let (mid_x, mid_y) = (w / 2, h / 2);
    let interior = |x: i32, y: i32| x > 0 && x < w - 1 && y > 0 && y < h - 1;

    for y in mid_y - ARENA_RADIUS..=mid_y + ARENA_RADIUS {
        for x in mid_x - ARENA_RADIUS..=mid_x + ARENA_RADIUS {
            if interior(x, y) {
                grid.set(GridPos::new(x, y), Cell::Empty);
            }
        }
    }

    for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
        let (px, py) = (mid_x + dx * PILLAR_OFFSET, mid_y + dy * PILLAR_OFFSET);
        if interior(px, py) {
            grid.set(GridPos::new(px, py), Cell::Wall);
        }
    }
    grid
}

fn spiral_maze(w: usize, h: usize, rng: &mut impl Rng) -> Grid {
    let mut grid = Grid::filled(w, h, Cell::Wall);
    let (w, h) = (w as i32, h as i32);
    let mut open = |x: i32, y: i32| grid.set(GridPos::new(x, y), Cell::Empty);

    let (mut top, mut bottom, mut left, mut right) = (1, h - 2, 1, w - 2);
    while top <= bottom && left <= right {
        for x in left..=right {
            open(x, top);
        }
        top += 2;
        for y in top - 1..=bottom {
            open(right, y);
        }
        right -= 2;
        if top <= bottom {
            for x in (left..=right + 1).rev() {
                open(x, bottom);
            }
            bottom -= 2;
        }
        if left <= right {
            for y in (top..=bottom + 1).rev() {
                open(left, y);
            }
            left += 2;
        }
    }

    for y in (3..h - 3).step_by(2) {
        for x in (3..w - 3).step_by(2) {
            let pos = GridPos::new(x, y);
            if grid.is_wall(pos) && rng.gen::<f64>() < SPIRAL_LINK_CHANCE && grid.open_neighbors(pos) >= 2 {
                grid.set(pos, Cell::Empty);
            }
        }
    }
    grid
}

fn add_warp_tunnel(grid: &mut Grid, row: i32) {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    if row < 1 || row >= h - 1 {
        return;
    }
    for x in [0, 1, 2, w - 1, w - 2, w - 3] {
        grid.set(GridPos::new(x, row), Cell::Empty);
    }
    if row > 1 {
        grid.set(GridPos::new(0, row - 1), Cell::Wall);
        grid.set(GridPos::new(w - 1, row - 1), Cell::Wall);
    }
    if row < h - 2 {
        grid.set(GridPos::new(0, row + 1), Cell::Wall);
        grid.set(GridPos::new(w - 1, row + 1), Cell::Wall);
    }
}

fn place_pellets(grid: &mut Grid, rng: &mut impl Rng) {
    let spawn = MazeConfig::spawn();
    let mut pellets = 0;
    let cells: Vec<GridPos> = grid.positions().collect();
    for &pos in &cells {
        if pos == spawn || grid.get(pos) != Some(Cell::Empty) {
            continue;
        }
        if rng.gen::<f64>() < POWER_PELLET_CHANCE {
            grid.set(pos, Cell::PowerPellet);
        } else if rng.gen::<f64>() < PELLET_CHANCE {
            grid.set(pos, Cell::Pellet);
            pellets += 1;
        }
    }

    if pellets < MIN_PELLETS {
        let (w, h) = (grid.width() as i32, grid.height() as i32);
        for pos in cells {
            if pellets >= BACKFILL_PELLETS {
                break;
            }
            let interior = pos.x > 0 && pos.y > 0 && pos.x < w - 1 && pos.y < h - 1;
            if interior && pos != spawn && grid.get(pos) == Some(Cell::Empty) {
                grid.set(pos, Cell::Pellet);
                pellets += 1;
            }
        }
    }
}

/// Breadth-first reachability over open cells, following the warp row's
/// edge-to-edge relocation.
fn flood(grid: &Grid, warp_row: Option<i32>, start: GridPos) -> Vec<bool> {
    let (w, h) = (grid.width(), grid.height());
    let mut seen = vec![false; w * h];
    if grid.is_wall(start) {
        return seen;
    }
    let idx = |p: GridPos| p.y as usize * w + p.x as usize;
    let mut q = VecDeque::new();
    seen[idx(start)] = true;
    q.push_back(start);

    while let Some(pos) = q.pop_front() {
        let mut next: Vec<GridPos> = Dir::ALL.iter().map(|&d| pos.step(d)).collect();
        if warp_row == Some(pos.y) {
            if pos.x == 0 {
                next.push(GridPos::new(w as i32 - 2, pos.y));
            } else if pos.x == w as i32 - 1 {
                next.push(GridPos::new(1, pos.y));
            }
        }
        for n in next {
            if grid.is_open(n) && !seen[idx(n)] {
                seen[idx(n)] = true;
                q.push_back(n);
            }
        }
    }
    seen
}

/// Opens one wall at a time between a reached and an unreached region until
/// every open cell is reachable from `start`.
fn ensure_connected(grid: &mut Grid, warp_row: Option<i32>, start: GridPos) {
    let (w, h) = (grid.width() as i32, grid.height() as i32);
    let idx = |p: GridPos| p.y as usize * w as usize + p.x as usize;
    let mut reached = flood(grid, warp_row, start);
    let mut iterations = 0;

    let has_unreached = |grid: &Grid, reached: &[bool]| {
        grid.positions().any(|p| grid.is_open(p) && !reached[idx(p)])
    };

    while has_unreached(grid, &reached) && iterations < (w * h) as usize {
        let bridge = (1..h - 1)
            .flat_map(|y| (1..w - 1).map(move |x| GridPos::new(x, y)))
            .find(|&pos| {
                if grid.is_open(pos) {
                    return false;
                }
                let mut touches_reached = false;
                let mut touches_unreached = false;
                for d in Dir::ALL {
                    let n = pos.step(d);
                    if !grid.is_open(n) {
                        continue;
                    }
                    if reached[idx(n)] {
                        touches_reached = true;
                    } else {
                        touches_unreached = true;
                    }
                }
                touches_reached && touches_unreached
            });

        let Some(bridge) = bridge else { break };
        grid.set(bridge, Cell::Empty);
        reached = flood(grid, warp_row, start);
        iterations += 1;
    }
}
