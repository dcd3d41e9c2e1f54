//! Gameplay constants. Durations are in seconds of simulation time, speeds
//! in cells per second.

pub const DEFAULT_MAZE_W: usize = 21;
pub const DEFAULT_MAZE_H: usize = 21;
pub const MIN_MAZE_DIM: usize = 7;

pub const SPAWN: (i32, i32) = (1, 1);

pub const PELLET_SCORE: u64 = 10;
pub const POWER_PELLET_SCORE: u64 = 50;
pub const GHOST_SCORE: u64 = 200;
pub const SPECIAL_HIT_SCORE: u64 = 300;
pub const BOSS_SCORE: u64 = 5000;
pub const FRUIT_POINTS: [u64; 8] = [100, 300, 500, 700, 1000, 2000, 3000, 5000];

pub const PLAYER_SPEED: f32 = 6.0;
pub const ENEMY_SPEED: f32 = 4.0;
pub const FRIGHTENED_SPEED_MULT: f32 = 0.5;
pub const SPEED_BOOST_MULT: f32 = 1.5;
pub const BOSS_SPEED_MULT: f32 = 0.7;
pub const LEVEL_SPEED_STEP: f32 = 0.08;
pub const LEVEL_SPEED_CAP: f32 = 2.0;
pub const WAVE_SPEED_STEP: f32 = 0.05;

pub const ENEMY_HIT_RADIUS: f32 = 0.5;
pub const BOSS_HIT_RADIUS: f32 = 0.7;

pub const INVINCIBLE_SECS: f64 = 2.5;
pub const EATEN_RETURN_SECS: f64 = 1.2;

pub const AMBUSH_TILES: i32 = 4;
pub const FLANK_TILES: i32 = 2;
pub const SHY_RADIUS: i32 = 8;

pub const BOSS_HP: u32 = 3;
pub const BOSS_HIT_COOLDOWN_SECS: f64 = 1.0;
pub const BOSS_SPAWN_DELAY_SECS: f64 = 1.0;

pub const SPECIAL_SPAWN_DELAY_SECS: f64 = 2.0;
pub const SPECIAL_SPAWN_CHANCE: f64 = 0.3;
pub const TELEPORTER_MIN_LEVEL: u32 = 8;
pub const SPLITTER_MIN_LEVEL: u32 = 12;
pub const TELEPORT_INTERVAL_SECS: f64 = 5.0;
pub const TELEPORT_MIN_DIST: i32 = 3;
pub const TELEPORT_MAX_DIST: i32 = 10;
pub const SPLITTER_HP: u32 = 2;
pub const SPECIAL_HIT_COOLDOWN_SECS: f64 = 1.0;

pub const COMBO_MAX: u32 = 20;

pub const POWER_UP_SPAWN_CHANCE: f64 = 0.02;
pub const POWER_UP_SPAWN_INTERVAL_SECS: f64 = 20.0;

pub const FRUIT_INTERVAL_SECS: f64 = 15.0;
pub const FRUIT_LIFETIME_SECS: f64 = 8.0;
pub const CENTER_SEARCH_RADIUS: i32 = 5;

pub const LEVEL_SPLASH_SECS: f64 = 2.0;
pub const INTERMISSION_SECS: f64 = 3.0;
pub const INTERMISSION_EVERY: u32 = 3;

pub const TIME_ATTACK_SECS: f64 = 180.0;
pub const ENDLESS_WAVE_SECS: f64 = 30.0;

pub const COMMENTARY_SCORE_STEP: u64 = 50;
