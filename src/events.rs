//! Outbound notifications. A tick reports each kind at most once; a later
//! event of the same kind replaces the earlier one. Every mode notification
//! tag counts as its own kind, so a boss spawn and a wave change in the same
//! tick both come through.

use serde::Serialize;

use crate::powerup::PowerUpKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Pellet,
    PowerPellet,
    Fruit,
    PowerUp(PowerUpKind),
    Enemy,
    Special,
    Boss,
}

/// Who collected an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    PlayerOne,
    PlayerTwo,
    Magnet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ghosts_eaten: u32,
    pub fruits_eaten: u32,
    pub deaths: u32,
    pub bosses_defeated: u32,
    pub highest_combo: u32,
    pub level: u32,
    pub score: u64,
}

/// Generic mode notification, carried as a tag plus payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum ModeEvent {
    WaveChanged { wave: u32 },
    Paused,
    Resumed,
    TimeUp { score: u64 },
    GameOver { score: u64, level: u32 },
    Intermission { level: u32 },
    BossSpawned,
    BossDefeated,
    SpecialSpawned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    ScoreChanged { score: u64 },
    ItemConsumed { item: ItemKind, source: Source },
    LifeLost { player: u8, lives: u32 },
    Commentary { text: String },
    LevelCompleted { level: u32 },
    Stats(StatsSnapshot),
    ComboChanged { count: u32 },
    TimeRemaining { secs: f64 },
    PowerUpChanged { kind: Option<PowerUpKind>, remaining: f64 },
    Mode(ModeEvent),
}

impl ModeEvent {
    fn slot(&self) -> usize {
        match self {
            ModeEvent::WaveChanged { .. } => 0,
            ModeEvent::Paused => 1,
            ModeEvent::Resumed => 2,
            ModeEvent::TimeUp { .. } => 3,
            ModeEvent::GameOver { .. } => 4,
            ModeEvent::Intermission { .. } => 5,
            ModeEvent::BossSpawned => 6,
            ModeEvent::BossDefeated => 7,
            ModeEvent::SpecialSpawned => 8,
        }
    }
}

impl Event {
    fn slot(&self) -> usize {
        match self {
            Event::ScoreChanged { .. } => 0,
            Event::ItemConsumed { .. } => 1,
            Event::LifeLost { .. } => 2,
            Event::Commentary { .. } => 3,
            Event::LevelCompleted { .. } => 4,
            Event::Stats(_) => 5,
            Event::ComboChanged { .. } => 6,
            Event::TimeRemaining { .. } => 7,
            Event::PowerUpChanged { .. } => 8,
            Event::Mode(mode) => 9 + mode.slot(),
        }
    }
}

const MODE_SLOTS: usize = 9;
const SLOTS: usize = 9 + MODE_SLOTS;

#[derive(Debug, Default)]
pub struct EventBuffer {
    slots: [Option<Event>; SLOTS],
}

impl EventBuffer {
    pub fn push(&mut self, event: Event) {
        let slot = event.slot();
        self.slots[slot] = Some(event);
    }

    /// Empties the buffer in a fixed kind order.
    pub fn drain(&mut self) -> Vec<Event> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}
