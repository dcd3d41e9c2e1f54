//! Simulation core for a maze-chase arcade game: procedural mazes, grid
//! movement, enemy AI, scoring and level flow. Rendering, audio and
//! persistence live outside; the core takes intents and hands back events.

pub mod boss;
pub mod combo;
pub mod components;
pub mod config;
pub mod constants;
pub mod director;
pub mod events;
pub mod fruit;
pub mod ghost;
pub mod level;
pub mod maze;
pub mod movement;
pub mod player;
pub mod powerup;
pub mod sim;
pub mod special;

pub use components::{Cell, Dir, GridPos, PelletKind, Steer};
pub use config::{ConfigError, SimConfig};
pub use director::{Difficulty, GameMode, GhostMode};
pub use events::{Event, ModeEvent};
pub use maze::{generate, MazeConfig, MazeType};
pub use sim::{Command, PlayerSlot, Simulation, Snapshot};
