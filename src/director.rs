//! Global timers: the ghost-mode phase clock, difficulty profiles, game
//! modes and level gating.

use serde::{Deserialize, Serialize};

use crate::constants::{LEVEL_SPEED_CAP, LEVEL_SPEED_STEP, WAVE_SPEED_STEP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GhostMode {
    Scatter,
    Chase,
    Frightened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    pub enemy_speed_mult: f32,
    pub player_speed_mult: f32,
    pub lives: u32,
    pub power_up_frequency: f64,
    pub frightened_secs: f64,
    pub combo_window_secs: f64,
}

impl Difficulty {
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                enemy_speed_mult: 0.7,
                player_speed_mult: 1.1,
                lives: 5,
                power_up_frequency: 1.5,
                frightened_secs: 12.0,
                combo_window_secs: 3.0,
            },
            Difficulty::Normal => DifficultyProfile {
                enemy_speed_mult: 1.0,
                player_speed_mult: 1.0,
                lives: 3,
                power_up_frequency: 1.0,
                frightened_secs: 8.0,
                combo_window_secs: 2.0,
            },
            Difficulty::Hard => DifficultyProfile {
                enemy_speed_mult: 1.4,
                player_speed_mult: 0.95,
                lives: 2,
                power_up_frequency: 0.5,
                frightened_secs: 5.0,
                combo_window_secs: 1.5,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    #[default]
    Classic,
    Endless,
    TimeAttack,
    Coop,
}

impl GameMode {
    /// Time attack ends on the clock, never on lives.
    pub fn consumes_lives(self) -> bool {
        self != GameMode::TimeAttack
    }

    pub fn has_second_player(self) -> bool {
        self == GameMode::Coop
    }
}

pub fn is_boss_level(level: u32, interval: u32) -> bool {
    interval > 0 && level > 0 && level % interval == 0
}

/// Multiplier applied to enemy speed as levels and endless waves climb.
pub fn enemy_speed_scale(level: u32, wave: Option<u32>) -> f32 {
    let level_mult = (1.0 + level.saturating_sub(1) as f32 * LEVEL_SPEED_STEP).min(LEVEL_SPEED_CAP);
    let wave_mult = wave.map_or(1.0, |w| 1.0 + w as f32 * WAVE_SPEED_STEP);
    level_mult * wave_mult
}

/// One scatter or chase window. `secs: None` lasts forever.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub mode: GhostMode,
    pub secs: Option<f64>,
}

pub fn default_phases() -> Vec<Phase> {
    let p = |mode, secs| Phase {
        mode,
        secs: Some(secs),
    };
    vec![
        p(GhostMode::Scatter, 7.0),
        p(GhostMode::Chase, 20.0),
        p(GhostMode::Scatter, 7.0),
        p(GhostMode::Chase, 20.0),
        p(GhostMode::Scatter, 5.0),
        Phase {
            mode: GhostMode::Chase,
            secs: None,
        },
    ]
}

/// A mode change the caller should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeShift {
    Phase(GhostMode),
    FrightenedOver(GhostMode),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frightened {
    until: f64,
    eaten_chain: u32,
}

/// The shared scatter/chase/frightened clock.
///
/// Keeps its own time axis so the caller can stop it (freeze power-up)
/// without the deadlines drifting. Once the schedule runs out the last
/// phase's mode holds forever.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeClock {
    phases: Vec<Phase>,
    index: usize,
    now: f64,
    phase_started: f64,
    frightened: Option<Frightened>,
}

impl ModeClock {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self {
            phases,
            index: 0,
            now: 0.0,
            phase_started: 0.0,
            frightened: None,
        }
    }

    /// Back to the first phase, not frightened.
    pub fn rearm(&mut self) {
        self.index = 0;
        self.phase_started = self.now;
        self.frightened = None;
    }

    /// The scheduled mode, ignoring any frightened override.
    pub fn base_mode(&self) -> GhostMode {
        let last = self.phases.len().saturating_sub(1);
        self.phases
            .get(self.index.min(last))
            .map_or(GhostMode::Chase, |p| p.mode)
    }

    pub fn mode(&self) -> GhostMode {
        if self.frightened.is_some() {
            GhostMode::Frightened
        } else {
            self.base_mode()
        }
    }

    pub fn is_frightened(&self) -> bool {
        self.frightened.is_some()
    }

    pub fn frightened_remaining(&self) -> f64 {
        self.frightened.map_or(0.0, |f| (f.until - self.now).max(0.0))
    }

    /// Enters (or restarts) frightened mode. Returns true when enemies were
    /// not already frightened and should reverse.
    pub fn frighten(&mut self, secs: f64) -> bool {
        let entering = self.frightened.is_none();
        self.frightened = Some(Frightened {
            until: self.now + secs,
            eaten_chain: 0,
        });
        entering
    }

    /// Counts one more enemy eaten in this frightened window and returns the
    /// chain length, starting at 1.
    pub fn record_eat(&mut self) -> u32 {
        match self.frightened.as_mut() {
            Some(f) => {
                f.eaten_chain += 1;
                f.eaten_chain
            }
            None => 1,
        }
    }

    pub fn advance(&mut self, dt: f64) -> Option<ModeShift> {
        self.now += dt;

        if let Some(f) = self.frightened {
            if self.now < f.until {
                return None;
            }
            self.frightened = None;
            self.phase_started = self.now;
            return Some(ModeShift::FrightenedOver(self.base_mode()));
        }

        let phase = self.phases.get(self.index)?;
        let secs = phase.secs?;
        if self.now - self.phase_started < secs {
            return None;
        }
        self.phase_started = self.now;
        if self.index + 1 < self.phases.len() {
            self.index += 1;
            Some(ModeShift::Phase(self.base_mode()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(clock: &mut ModeClock, secs: f64) -> Vec<ModeShift> {
        let steps = (secs * 10.0).round() as usize;
        (0..steps).filter_map(|_| clock.advance(0.1)).collect()
    }

    #[test]
    fn boss_gating() {
        for level in [5, 10, 15] {
            assert!(is_boss_level(level, 5));
        }
        for level in (1..=4).chain(6..=9) {
            assert!(!is_boss_level(level, 5));
        }
        assert!(!is_boss_level(3, 0));
    }

    #[test]
    fn phase_schedule_runs_then_chases_forever() {
        let mut clock = ModeClock::new(default_phases());
        assert_eq!(clock.mode(), GhostMode::Scatter);
        let shifts = run(&mut clock, 7.05);
        assert_eq!(shifts, vec![ModeShift::Phase(GhostMode::Chase)]);
        run(&mut clock, 20.0 + 7.0 + 20.0 + 5.0 + 0.5);
        assert_eq!(clock.mode(), GhostMode::Chase);
        assert!(run(&mut clock, 600.0).is_empty());
    }

    #[test]
    fn frightened_restores_previous_mode() {
        let mut clock = ModeClock::new(default_phases());
        run(&mut clock, 8.0);
        assert_eq!(clock.mode(), GhostMode::Chase);
        assert!(clock.frighten(8.0));
        assert_eq!(clock.mode(), GhostMode::Frightened);
        assert!(!clock.frighten(8.0));
        assert_eq!(clock.record_eat(), 1);
        assert_eq!(clock.record_eat(), 2);
        let shifts = run(&mut clock, 8.1);
        assert_eq!(shifts, vec![ModeShift::FrightenedOver(GhostMode::Chase)]);
        assert_eq!(clock.mode(), GhostMode::Chase);
    }

    #[test]
    fn difficulty_profiles() {
        assert_eq!(Difficulty::Easy.profile().lives, 5);
        assert_eq!(Difficulty::default().profile().frightened_secs, 8.0);
        assert_eq!(Difficulty::Hard.profile().combo_window_secs, 1.5);
    }

    #[test]
    fn enemy_speed_caps() {
        assert_eq!(enemy_speed_scale(1, None), 1.0);
        assert!((enemy_speed_scale(2, None) - 1.08).abs() < 1e-6);
        assert_eq!(enemy_speed_scale(40, None), 2.0);
        assert!((enemy_speed_scale(1, Some(2)) - 1.1).abs() < 1e-6);
    }
}
