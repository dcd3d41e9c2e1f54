//! The per-frame driver. Owns every piece of mutable game state and advances
//! it in one fixed order per tick:
//!
//! 1. drain queued commands (input intents, pause toggles)
//! 2. move players, then enemies unless a freeze is active
//! 3. resolve collisions: pellet, power-up, fruit, then enemies
//! 4. level clear, only when no one died this tick
//! 5. combo, mode clock, power-up, fruit and spawn timers
//! 6. game-over check, then hand the coalesced events back

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::boss::{Boss, BossHit};
use crate::combo::Combo;
use crate::components::{Cell, Dir, GridPos, PelletKind, Steer};
use crate::config::{Result, SimConfig};
use crate::constants::{
    BOSS_HIT_RADIUS, BOSS_SCORE, BOSS_SPAWN_DELAY_SECS, BOSS_SPEED_MULT, CENTER_SEARCH_RADIUS,
    COMMENTARY_SCORE_STEP, ENDLESS_WAVE_SECS, ENEMY_HIT_RADIUS, FRIGHTENED_SPEED_MULT,
    GHOST_SCORE, INTERMISSION_EVERY, INTERMISSION_SECS, LEVEL_SPLASH_SECS, PELLET_SCORE,
    POWER_PELLET_SCORE, SPECIAL_HIT_SCORE, SPECIAL_SPAWN_CHANCE, SPECIAL_SPAWN_DELAY_SECS,
    SPEED_BOOST_MULT, TIME_ATTACK_SECS,
};
use crate::director::{
    enemy_speed_scale, is_boss_level, DifficultyProfile, GameMode, GhostMode, ModeClock,
    ModeShift,
};
use crate::events::{Event, EventBuffer, ItemKind, ModeEvent, Source, StatsSnapshot};
use crate::fruit::FruitTimer;
use crate::ghost::{Enemy, Personality, TargetContext};
use crate::level::{create_layout, nearest_to_center, LevelLayout};
use crate::maze::{generate_with, maze_rng, MazeConfig, MazeOptions};
use crate::movement::Arrival;
use crate::player::Player;
use crate::powerup::{PowerUpKind, PowerUps};
use crate::special::{
    teleport_destination, teleport_due, SpecialEnemy, SpecialHit, SpecialKind, SpecialRoster,
};

const COMMENTARY: [&str; 8] = [
    "Another row of pellets gone. The claw is relentless.",
    "The corridors remember every pinch.",
    "Scatter all you like. The claw knows these walls.",
    "Fifty more points of pure crustacean ambition.",
    "The maze rearranges itself. The claw does not care.",
    "Somewhere a ghost is rethinking its career.",
    "Combo counters were made to be broken.",
    "Through the tunnel and out the other side, still hungry.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    fn source(self) -> Source {
        match self {
            PlayerSlot::One => Source::PlayerOne,
            PlayerSlot::Two => Source::PlayerTwo,
        }
    }

    fn from_index(i: usize) -> Self {
        if i == 0 {
            PlayerSlot::One
        } else {
            PlayerSlot::Two
        }
    }
}

/// Intents from outside, applied at the top of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Steer(PlayerSlot, Steer),
    TogglePause,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    ghosts_eaten: u32,
    fruits_eaten: u32,
    deaths: u32,
    bosses_defeated: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub cell: GridPos,
    pub pos: (f32, f32),
    pub heading: Option<Dir>,
    pub lives: u32,
    pub invincible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnemyView {
    pub personality: Personality,
    pub cell: GridPos,
    pub pos: (f32, f32),
    pub eaten: bool,
}

/// Plain-data picture of one frame for renderers and replay recorders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub frame: u64,
    pub time: f64,
    pub score: u64,
    pub level: u32,
    pub mode: GhostMode,
    pub paused: bool,
    pub held: bool,
    pub players: Vec<PlayerView>,
    pub enemies: Vec<EnemyView>,
    pub boss: Option<(GridPos, u32)>,
    pub specials: Vec<(SpecialKind, GridPos)>,
    pub combo: u32,
    pub frightened_remaining: f64,
    pub power_up: Option<PowerUpKind>,
    pub power_up_remaining: f64,
    pub fruit: Option<GridPos>,
    pub pellets_remaining: usize,
    pub time_remaining: Option<f64>,
}

pub struct Simulation {
    config: SimConfig,
    profile: DifficultyProfile,
    rng: ChaCha8Rng,
    now: f64,
    frame: u64,
    paused: bool,
    hold_until: Option<f64>,
    maze: MazeConfig,
    layout: LevelLayout,
    players: Vec<Player>,
    enemies: Vec<Enemy>,
    boss: Option<Boss>,
    boss_spawn_at: Option<f64>,
    specials: SpecialRoster,
    special_roll_at: Option<f64>,
    mode_clock: ModeClock,
    combo: Combo,
    powerups: PowerUps,
    fruit: FruitTimer,
    score: u64,
    level: u32,
    tally: Tally,
    pellets_eaten: u32,
    run_started: f64,
    wave: u32,
    commands: Vec<Command>,
    events: EventBuffer,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let profile = config.difficulty.profile();
        let mut rng = maze_rng(config.seed);
        let level = 1;
        let maze = build_maze(&config, level, &mut rng);
        let layout = create_layout(&maze);

        let mut sim = Self {
            profile,
            rng,
            now: 0.0,
            frame: 0,
            paused: false,
            hold_until: None,
            players: Vec::new(),
            enemies: Vec::new(),
            boss: None,
            boss_spawn_at: None,
            specials: SpecialRoster::default(),
            special_roll_at: None,
            mode_clock: ModeClock::new(config.phases.clone()),
            combo: Combo::new(profile.combo_window_secs),
            powerups: PowerUps::default(),
            fruit: FruitTimer::default(),
            score: 0,
            level,
            tally: Tally::default(),
            pellets_eaten: 0,
            run_started: 0.0,
            wave: 0,
            commands: Vec::new(),
            events: EventBuffer::default(),
            maze,
            layout,
            config,
        };
        sim.spawn_players();
        sim.spawn_enemies();
        sim.begin_play();
        info!(mode = ?sim.config.mode, difficulty = ?sim.config.difficulty, "simulation started");
        Ok(sim)
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Queues a raw `{x, y}` intent. Diagonal or out-of-range vectors are
    /// dropped.
    pub fn input(&mut self, slot: PlayerSlot, x: i32, y: i32) {
        if let Some(steer) = Steer::from_vector(x, y) {
            self.push(Command::Steer(slot, steer));
        }
    }

    pub fn toggle_pause(&mut self) {
        self.push(Command::TogglePause);
    }

    pub fn maze(&self) -> &MazeConfig {
        &self.maze
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn mode(&self) -> GhostMode {
        self.mode_clock.mode()
    }

    pub fn game_mode(&self) -> GameMode {
        self.config.mode
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True during the splash or intermission after a level clear.
    pub fn is_held(&self) -> bool {
        self.hold_until.is_some()
    }

    pub fn is_boss_level(&self) -> bool {
        is_boss_level(self.level, self.config.boss_level_interval)
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.players.get(slot.index())
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn boss(&self) -> Option<&Boss> {
        self.boss.as_ref()
    }

    pub fn specials(&self) -> &SpecialRoster {
        &self.specials
    }

    pub fn combo(&self) -> &Combo {
        &self.combo
    }

    pub fn power_ups(&self) -> &PowerUps {
        &self.powerups
    }

    pub fn fruit(&self) -> &FruitTimer {
        &self.fruit
    }

    pub fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    pub fn time_remaining(&self) -> Option<f64> {
        (self.config.mode == GameMode::TimeAttack)
            .then(|| (TIME_ATTACK_SECS - (self.now - self.run_started)).max(0.0))
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            ghosts_eaten: self.tally.ghosts_eaten,
            fruits_eaten: self.tally.fruits_eaten,
            deaths: self.tally.deaths,
            bosses_defeated: self.tally.bosses_defeated,
            highest_combo: self.combo.highest,
            level: self.level,
            score: self.score,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            frame: self.frame,
            time: self.now,
            score: self.score,
            level: self.level,
            mode: self.mode(),
            paused: self.paused,
            held: self.is_held(),
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    cell: p.cell(),
                    pos: p.mover.pos,
                    heading: p.heading(),
                    lives: p.lives,
                    invincible: p.is_invincible(self.now),
                })
                .collect(),
            enemies: self
                .enemies
                .iter()
                .map(|e| EnemyView {
                    personality: e.personality,
                    cell: e.mover.cell,
                    pos: e.mover.pos,
                    eaten: e.is_eaten(),
                })
                .collect(),
            boss: self
                .boss
                .as_ref()
                .filter(|b| b.active)
                .map(|b| (b.mover.cell, b.hp)),
            specials: self.specials.iter().map(|(_, s)| (s.kind, s.mover.cell)).collect(),
            combo: self.combo.count,
            frightened_remaining: self.mode_clock.frightened_remaining(),
            power_up: self.powerups.active.map(|a| a.kind),
            power_up_remaining: self.powerups.remaining(self.now),
            fruit: self.fruit.current.map(|f| f.cell),
            pellets_remaining: self.maze.pellets_remaining(),
            time_remaining: self.time_remaining(),
        }
    }

    /// Eats the pellet at `pos` on behalf of player one. Clearing the last
    /// pellet advances the level at once.
    pub fn consume_pellet_at(&mut self, pos: GridPos) -> Option<PelletKind> {
        let kind = self.eat_pellet(pos, Source::PlayerOne)?;
        if self.maze.pellets_remaining() == 0 {
            self.complete_level();
        }
        Some(kind)
    }

    /// Advances the simulation by `dt` seconds and returns this tick's
    /// events. Never fails; non-finite or negative deltas count as zero.
    pub fn tick(&mut self, dt: f64) -> Vec<Event> {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.apply_commands();
        if self.paused {
            return self.events.drain();
        }

        self.frame += 1;
        self.now += dt;

        if let Some(until) = self.hold_until {
            if self.now < until {
                return self.events.drain();
            }
            self.hold_until = None;
            self.begin_play();
        }

        let frozen = self.powerups.is_active(PowerUpKind::Freeze);
        self.move_players(dt);
        if !frozen {
            self.move_enemies(dt);
        }
        self.update_returns();

        let died = self.resolve_collisions();
        if !died && self.maze.pellets_remaining() == 0 {
            self.complete_level();
            return self.events.drain();
        }

        self.update_timers(dt, frozen);
        self.check_game_over();
        self.events.drain()
    }

    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                Command::Steer(slot, steer) => {
                    if let Some(p) = self.players.get_mut(slot.index()) {
                        p.steer(steer);
                    }
                }
                Command::TogglePause => {
                    self.paused = !self.paused;
                    let event = if self.paused {
                        ModeEvent::Paused
                    } else {
                        ModeEvent::Resumed
                    };
                    self.events.push(Event::Mode(event));
                }
            }
        }
    }

    fn spawn_players(&mut self) {
        let lives = self.profile.lives;
        self.players = vec![Player::new(self.layout.player_start, lives)];
        if self.config.mode.has_second_player() {
            self.players
                .push(Player::new(self.layout.player_two_start, lives));
        }
    }

    fn spawn_enemies(&mut self) {
        self.enemies = self
            .layout
            .enemy_starts
            .iter()
            .zip(Personality::ALL)
            .zip(self.layout.scatter_corners)
            .map(|((&start, personality), corner)| Enemy::new(personality, start, corner))
            .collect();
    }

    /// Starts the clocks for the current level.
    fn begin_play(&mut self) {
        self.mode_clock.rearm();
        self.fruit.rearm(self.now);
        self.powerups.reset_level(self.now);
        self.boss_spawn_at = self
            .is_boss_level()
            .then_some(self.now + BOSS_SPAWN_DELAY_SECS);
        self.special_roll_at = Some(self.now + SPECIAL_SPAWN_DELAY_SECS);
    }

    fn player_speed(&self) -> f32 {
        let boost = if self.powerups.is_active(PowerUpKind::Speed) {
            SPEED_BOOST_MULT
        } else {
            1.0
        };
        self.config.player_speed * self.profile.player_speed_mult * boost
    }

    fn enemy_speed(&self) -> f32 {
        let wave = (self.config.mode == GameMode::Endless).then_some(self.wave);
        let frightened = if self.mode_clock.is_frightened() {
            FRIGHTENED_SPEED_MULT
        } else {
            1.0
        };
        self.config.enemy_speed
            * self.profile.enemy_speed_mult
            * enemy_speed_scale(self.level, wave)
            * frightened
    }

    fn move_players(&mut self, dt: f64) {
        let step = self.player_speed() * dt as f32;
        for (i, player) in self.players.iter_mut().enumerate() {
            if player.is_out() {
                continue;
            }
            if let Arrival::Warped { from, to } = player.update(&self.maze, step) {
                debug!(player = i + 1, ?from, ?to, "warp");
            }
        }
    }

    fn move_enemies(&mut self, dt: f64) {
        let mode = self.mode_clock.mode();
        let enemy_step = self.enemy_speed() * dt as f32;
        let boss_step = self.config.enemy_speed * BOSS_SPEED_MULT * dt as f32;
        let special_step = self.config.enemy_speed * self.profile.enemy_speed_mult * dt as f32;
        let chaser = self
            .enemies
            .iter()
            .find(|e| e.personality == Personality::Chaser)
            .map(|e| e.mover.cell);

        let Self {
            players,
            enemies,
            boss,
            specials,
            maze,
            rng,
            ..
        } = self;

        for enemy in enemies.iter_mut() {
            let me = enemy.mover.cell;
            let Some(target) = nearest_player(players.as_slice(), me) else {
                continue;
            };
            let ctx = TargetContext {
                player: target.cell(),
                player_dir: target.heading(),
                chaser: chaser.unwrap_or(me),
                width: maze.width,
                height: maze.height,
            };
            enemy.update(maze, mode, &ctx, enemy_step, rng);
        }

        if let Some(boss) = boss.as_mut() {
            if let Some(target) = nearest_player(players.as_slice(), boss.mover.cell) {
                boss.update(maze, mode, target.cell(), boss_step, rng);
            }
        }

        for (_, special) in specials.iter_mut() {
            if let Some(target) = nearest_player(players.as_slice(), special.mover.cell) {
                special.update(maze, target.cell(), special_step, rng);
            }
        }
    }

    fn update_returns(&mut self) {
        let now = self.now;
        for enemy in &mut self.enemies {
            if enemy.update_return(now) {
                debug!(personality = ?enemy.personality, "enemy back at spawn");
            }
        }
    }

    /// Returns true if any player lost a life this tick.
    fn resolve_collisions(&mut self) -> bool {
        let mut died = false;
        for i in 0..self.players.len() {
            if self.players[i].is_out() {
                continue;
            }
            let slot = PlayerSlot::from_index(i);
            let cell = self.players[i].cell();

            self.eat_pellet(cell, slot.source());
            if self.powerups.is_active(PowerUpKind::Magnet) {
                for d in Dir::ALL {
                    self.eat_pellet(cell.step(d), Source::Magnet);
                }
            }
            self.pick_up_power_up(cell, slot);
            self.pick_up_fruit(cell, slot);

            if self.collide_enemies(i) {
                died = true;
            }
        }
        died
    }

    fn add_score(&mut self, points: u64) {
        self.score += points;
        self.events.push(Event::ScoreChanged { score: self.score });
    }

    fn emit_stats(&mut self) {
        let stats = self.stats();
        self.events.push(Event::Stats(stats));
    }

    fn eat_pellet(&mut self, pos: GridPos, source: Source) -> Option<PelletKind> {
        let kind = self.maze.grid.get(pos)?.pellet_kind()?;
        self.maze.grid.set(pos, Cell::Empty);
        self.pellets_eaten += 1;

        let count = self.combo.register(self.now);
        self.events.push(Event::ComboChanged { count });
        let (base, item) = match kind {
            PelletKind::Normal => (PELLET_SCORE, ItemKind::Pellet),
            PelletKind::Power => (POWER_PELLET_SCORE, ItemKind::PowerPellet),
        };
        self.add_score(base * self.combo.multiplier());
        self.events.push(Event::ItemConsumed { item, source });

        if kind == PelletKind::Power {
            self.frighten();
        }
        if self.score % COMMENTARY_SCORE_STEP == 0 {
            if let Some(text) = COMMENTARY.choose(&mut self.rng) {
                self.events.push(Event::Commentary {
                    text: (*text).to_string(),
                });
            }
        }
        Some(kind)
    }

    fn frighten(&mut self) {
        if self.mode_clock.frighten(self.profile.frightened_secs) {
            for enemy in self.enemies.iter_mut().filter(|e| !e.is_eaten()) {
                enemy.mover.reverse();
            }
            if let Some(boss) = self.boss.as_mut().filter(|b| b.active) {
                boss.mover.reverse();
            }
        }
        debug!(secs = self.profile.frightened_secs, "enemies frightened");
    }

    fn pick_up_power_up(&mut self, cell: GridPos, slot: PlayerSlot) {
        let Some(kind) = self.powerups.pick_up(cell, self.now) else {
            return;
        };
        debug!(?kind, "power-up collected");
        self.events.push(Event::ItemConsumed {
            item: ItemKind::PowerUp(kind),
            source: slot.source(),
        });
        self.events.push(Event::PowerUpChanged {
            kind: Some(kind),
            remaining: self.powerups.remaining(self.now),
        });
    }

    fn pick_up_fruit(&mut self, cell: GridPos, slot: PlayerSlot) {
        let Some(fruit) = self.fruit.take_at(cell) else {
            return;
        };
        self.add_score(fruit.points * self.combo.multiplier());
        self.tally.fruits_eaten += 1;
        self.events.push(Event::ItemConsumed {
            item: ItemKind::Fruit,
            source: slot.source(),
        });
        self.emit_stats();
    }

    /// Enemy, special and boss contact for one player. Returns true on a
    /// lost life, which ends this player's checks for the tick.
    fn collide_enemies(&mut self, i: usize) -> bool {
        let now = self.now;
        let frightened = self.mode_clock.is_frightened();
        let pos = self.players[i].mover.pos;
        let slot = PlayerSlot::from_index(i);

        for e in 0..self.enemies.len() {
            let enemy = &self.enemies[e];
            if enemy.is_eaten() || !enemy.mover.overlaps(pos, ENEMY_HIT_RADIUS) {
                continue;
            }
            if frightened {
                self.eat_enemy(e, slot);
            } else if self.hurt_player(i) {
                return true;
            }
        }

        for id in self.specials.ids() {
            let Some(special) = self.specials.get(id) else {
                continue;
            };
            if !special.mover.overlaps(pos, ENEMY_HIT_RADIUS) {
                continue;
            }
            if frightened {
                if !special.can_be_hit(now) {
                    continue;
                }
                let hit = self.specials.hit(id, &self.maze, now);
                self.add_score(SPECIAL_HIT_SCORE * self.combo.multiplier());
                self.events.push(Event::ItemConsumed {
                    item: ItemKind::Special,
                    source: slot.source(),
                });
                match hit {
                    Some(SpecialHit::Split { children }) => {
                        debug!(children = children.len(), "splitter split")
                    }
                    Some(SpecialHit::Destroyed) => debug!("special enemy destroyed"),
                    Some(SpecialHit::Wounded { hp }) => debug!(hp, "special enemy hit"),
                    None => {}
                }
            } else if self.hurt_player(i) {
                return true;
            }
        }

        let boss_contact = self
            .boss
            .as_ref()
            .is_some_and(|b| b.active && b.mover.overlaps(pos, BOSS_HIT_RADIUS));
        if boss_contact {
            if frightened {
                self.hit_boss(slot);
            } else if self.hurt_player(i) {
                return true;
            }
        }
        false
    }

    fn eat_enemy(&mut self, e: usize, slot: PlayerSlot) {
        let chain = self.mode_clock.record_eat();
        let points = GHOST_SCORE * 2u64.pow(chain.saturating_sub(1).min(16)) * self.combo.multiplier();
        self.enemies[e].eat(self.now);
        self.add_score(points);
        self.tally.ghosts_eaten += 1;
        self.events.push(Event::ItemConsumed {
            item: ItemKind::Enemy,
            source: slot.source(),
        });
        self.emit_stats();
        debug!(chain, points, "enemy eaten");
    }

    fn hit_boss(&mut self, slot: PlayerSlot) {
        let now = self.now;
        let Some(boss) = self.boss.as_mut().filter(|b| b.can_be_hit(now)) else {
            return;
        };
        match boss.hit(now) {
            BossHit::Wounded { hp } => debug!(hp, "boss hit"),
            BossHit::Defeated => {
                self.boss = None;
                self.add_score(BOSS_SCORE);
                self.tally.bosses_defeated += 1;
                self.events.push(Event::ItemConsumed {
                    item: ItemKind::Boss,
                    source: slot.source(),
                });
                self.events.push(Event::Mode(ModeEvent::BossDefeated));
                self.emit_stats();
                info!(level = self.level, "boss defeated");
            }
        }
    }

    /// Non-frightened contact. Returns true if a life was lost.
    fn hurt_player(&mut self, i: usize) -> bool {
        let now = self.now;
        if self.players[i].is_invincible(now) || self.powerups.is_active(PowerUpKind::Shield) {
            return false;
        }
        let consumes = self.config.mode.consumes_lives();
        let player = &mut self.players[i];
        if consumes {
            player.lives = player.lives.saturating_sub(1);
        }
        player.respawn(now);
        let lives = player.lives;
        self.tally.deaths += 1;
        self.events.push(Event::LifeLost {
            player: i as u8 + 1,
            lives,
        });
        self.emit_stats();
        info!(player = i + 1, lives, "life lost");
        true
    }

    fn complete_level(&mut self) {
        let finished = self.level;
        self.level += 1;
        self.events.push(Event::LevelCompleted { level: finished });

        let mut hold = LEVEL_SPLASH_SECS;
        if finished % INTERMISSION_EVERY == 0 {
            hold += INTERMISSION_SECS;
            self.events
                .push(Event::Mode(ModeEvent::Intermission { level: finished }));
        }

        self.load_level();
        self.emit_stats();
        self.hold_until = Some(self.now + hold);
        info!(level = self.level, maze = ?self.maze.maze_type, "level cleared");
    }

    /// Fresh maze and roster for `self.level`. Score, lives and stats carry.
    fn load_level(&mut self) {
        self.maze = build_maze(&self.config, self.level, &mut self.rng);
        self.layout = create_layout(&self.maze);
        self.players[0].relocate(self.layout.player_start);
        if let Some(p2) = self.players.get_mut(1) {
            p2.relocate(self.layout.player_two_start);
        }
        self.spawn_enemies();
        self.boss = None;
        self.boss_spawn_at = None;
        self.specials.clear();
        self.special_roll_at = None;
        self.combo.reset();
        self.mode_clock.rearm();
        self.powerups.reset_level(self.now);
        self.fruit.rearm(self.now);
        self.pellets_eaten = 0;
    }

    fn update_timers(&mut self, dt: f64, frozen: bool) {
        let now = self.now;

        if self.combo.expire(now) {
            self.events.push(Event::ComboChanged { count: 0 });
        }

        if !frozen {
            match self.mode_clock.advance(dt) {
                Some(ModeShift::Phase(mode)) => debug!(?mode, "phase change"),
                Some(ModeShift::FrightenedOver(mode)) => debug!(?mode, "frightened over"),
                None => {}
            }
        }

        if self.powerups.expire(now).is_some() {
            self.events.push(Event::PowerUpChanged {
                kind: None,
                remaining: 0.0,
            });
        }
        let occupied: Vec<GridPos> = self.players.iter().map(Player::cell).collect();
        let frequency = self.profile.power_up_frequency;
        if let Some((cell, kind)) =
            self.powerups
                .maybe_spawn(&self.maze, &occupied, frequency, now, &mut self.rng)
        {
            debug!(?cell, ?kind, "power-up spawned");
        }

        if let Some(fruit) = self.fruit.update(&self.maze, self.level, self.pellets_eaten, now) {
            debug!(cell = ?fruit.cell, points = fruit.points, "fruit spawned");
        }

        self.update_specials(now);
        self.update_boss_spawn(now);
        self.update_game_mode_clock(now);
    }

    fn update_specials(&mut self, now: f64) {
        if self.special_roll_at.is_some_and(|t| now >= t) {
            self.special_roll_at = None;
            self.roll_special(now);
        }

        let Some(anchor) = self.players.first().map(Player::cell) else {
            return;
        };
        let Self {
            specials,
            maze,
            rng,
            ..
        } = self;
        for (id, special) in specials.iter_mut() {
            if !teleport_due(special, now) {
                continue;
            }
            special.last_ability_at = now;
            if let Some(to) = teleport_destination(maze, anchor, rng) {
                special.mover.place(to);
                debug!(?id, ?to, "teleported");
            }
        }
    }

    /// At most one special per level; each kind the level qualifies for
    /// gets one roll, in order.
    fn roll_special(&mut self, now: f64) {
        for kind in SpecialKind::ALL {
            if self.level < kind.min_level() || self.rng.gen::<f64>() >= SPECIAL_SPAWN_CHANCE {
                continue;
            }
            let maze = &self.maze;
            let Some(cell) = nearest_to_center(maze, CENTER_SEARCH_RADIUS, |p| maze.grid.is_open(p))
            else {
                return;
            };
            self.specials.insert(SpecialEnemy::new(kind, cell, now));
            self.events.push(Event::Mode(ModeEvent::SpecialSpawned));
            info!(?kind, ?cell, "special enemy spawned");
            return;
        }
    }

    fn update_boss_spawn(&mut self, now: f64) {
        if !self.boss_spawn_at.is_some_and(|t| now >= t) {
            return;
        }
        self.boss_spawn_at = None;
        let maze = &self.maze;
        let cell = nearest_to_center(maze, CENTER_SEARCH_RADIUS, |p| maze.grid.is_open(p))
            .or_else(|| self.layout.enemy_starts.first().copied())
            .unwrap_or(self.layout.player_two_start);
        self.boss = Some(Boss::spawn_at(cell));
        self.events.push(Event::Mode(ModeEvent::BossSpawned));
        info!(level = self.level, ?cell, "boss spawned");
    }

    fn update_game_mode_clock(&mut self, now: f64) {
        match self.config.mode {
            GameMode::Endless => {
                let wave = ((now - self.run_started) / ENDLESS_WAVE_SECS).floor() as u32;
                if wave > self.wave {
                    self.wave = wave;
                    self.events
                        .push(Event::Mode(ModeEvent::WaveChanged { wave: wave + 1 }));
                    info!(wave = wave + 1, "wave");
                }
            }
            GameMode::TimeAttack => {
                if let Some(secs) = self.time_remaining() {
                    self.events.push(Event::TimeRemaining { secs });
                }
            }
            GameMode::Classic | GameMode::Coop => {}
        }
    }

    fn check_game_over(&mut self) {
        let over = match self.config.mode {
            GameMode::TimeAttack => self.time_remaining().is_some_and(|t| t <= 0.0),
            GameMode::Coop => self.players.iter().all(Player::is_out),
            GameMode::Classic | GameMode::Endless => self.players[0].is_out(),
        };
        if !over {
            return;
        }

        let (score, level) = (self.score, self.level);
        let event = if self.config.mode == GameMode::TimeAttack {
            ModeEvent::TimeUp { score }
        } else {
            ModeEvent::GameOver { score, level }
        };
        info!(score, level, "game over");
        self.reset_run();
        self.events.push(Event::Mode(event));
    }

    /// Fresh run: score, lives, level, stats and maze start over.
    fn reset_run(&mut self) {
        self.score = 0;
        self.level = 1;
        self.tally = Tally::default();
        self.combo = Combo::new(self.profile.combo_window_secs);
        self.wave = 0;
        self.run_started = self.now;
        self.hold_until = None;
        self.powerups = PowerUps::default();
        self.load_level();
        self.spawn_players();
        self.begin_play();
        self.events.push(Event::ScoreChanged { score: 0 });
        self.emit_stats();
    }
}

fn build_maze(config: &SimConfig, level: u32, rng: &mut ChaCha8Rng) -> MazeConfig {
    let seed = if config.daily_challenge {
        config.seed
    } else {
        Some(rng.gen::<u64>())
    };
    let options = MazeOptions {
        repair_disconnected: config.repair_disconnected_mazes,
    };
    generate_with(config.maze_width, config.maze_height, Some(level), seed, options)
}

/// Closest live player by Manhattan distance; player one wins ties.
fn nearest_player(players: &[Player], from: GridPos) -> Option<&Player> {
    players
        .iter()
        .filter(|p| !p.is_out())
        .min_by_key(|p| p.cell().manhattan(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::default_phases;
    use crate::fruit::{fruit_points, Fruit};
    use crate::powerup::ActivePowerUp;

    const DT: f64 = 1.0 / 60.0;

    fn sim(mode: GameMode) -> Simulation {
        let config = SimConfig {
            seed: Some(7),
            mode,
            ..SimConfig::default()
        };
        Simulation::new(config).unwrap()
    }

    fn park_enemies_far(sim: &mut Simulation) {
        let corner = GridPos::new(sim.maze.width as i32 - 2, sim.maze.height as i32 - 2);
        for e in &mut sim.enemies {
            e.mover.reset(corner);
        }
    }

    /// Puts enemy 0 exactly on top of player one, on a bare cell.
    fn enemy_on_player(sim: &mut Simulation, at: GridPos) {
        sim.maze.grid.set(at, Cell::Empty);
        sim.players[0].mover.reset(at);
        sim.enemies[0].mover.reset(at);
        sim.powerups.active = None;
    }

    #[test]
    fn life_loss_resets_to_spawn_with_invincibility() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        enemy_on_player(&mut sim, GridPos::new(5, 5));
        assert_eq!(sim.players[0].lives, 3);
        assert_eq!(sim.mode(), GhostMode::Scatter);

        assert!(sim.resolve_collisions());
        assert_eq!(sim.players[0].lives, 2);
        assert_eq!(sim.players[0].cell(), GridPos::new(1, 1));

        enemy_on_player(&mut sim, GridPos::new(5, 5));
        sim.now += 1.0;
        assert!(!sim.resolve_collisions());
        assert_eq!(sim.players[0].lives, 2);
    }

    #[test]
    fn time_attack_keeps_lives() {
        let mut sim = sim(GameMode::TimeAttack);
        park_enemies_far(&mut sim);
        enemy_on_player(&mut sim, GridPos::new(5, 5));
        assert!(sim.resolve_collisions());
        assert_eq!(sim.players[0].lives, 3);
        assert_eq!(sim.players[0].cell(), GridPos::new(1, 1));
    }

    #[test]
    fn shield_absorbs_contact() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        enemy_on_player(&mut sim, GridPos::new(5, 5));
        sim.powerups.placed.insert(GridPos::new(5, 5), PowerUpKind::Shield);
        assert!(!sim.resolve_collisions());
        assert_eq!(sim.players[0].lives, 3);
    }

    #[test]
    fn second_enemy_eaten_scores_more() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        sim.mode_clock.frighten(8.0);
        let at = GridPos::new(5, 5);
        sim.maze.grid.set(at, Cell::Empty);
        sim.players[0].mover.reset(at);
        sim.enemies[0].mover.reset(at);

        let before = sim.score;
        sim.resolve_collisions();
        let first = sim.score - before;
        assert!(sim.enemies[0].is_eaten());

        sim.enemies[1].mover.reset(at);
        let before = sim.score;
        sim.resolve_collisions();
        let second = sim.score - before;

        assert_eq!(first, 200);
        assert_eq!(second, 400);
        assert_eq!(sim.stats().ghosts_eaten, 2);
    }

    #[test]
    fn power_pellet_frightens_then_reverts_to_chase() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        sim.mode_clock.advance(8.0);
        assert_eq!(sim.mode(), GhostMode::Chase);

        let at = GridPos::new(3, 1);
        sim.maze.grid.set(at, Cell::PowerPellet);
        assert_eq!(sim.consume_pellet_at(at), Some(PelletKind::Power));
        assert_eq!(sim.mode(), GhostMode::Frightened);

        let secs = sim.profile.frightened_secs;
        let mut t = 0.0;
        while t < secs + 0.1 {
            sim.mode_clock.advance(0.05);
            t += 0.05;
        }
        assert_eq!(sim.mode(), GhostMode::Chase);
    }

    #[test]
    fn boss_spawns_on_boss_levels_only() {
        let mut sim = sim(GameMode::Classic);
        while sim.level < 5 {
            let cells: Vec<GridPos> = sim
                .maze
                .grid
                .positions()
                .filter(|&p| sim.maze.grid.get(p).and_then(Cell::pellet_kind).is_some())
                .collect();
            assert!(sim.boss.is_none());
            for cell in cells {
                sim.consume_pellet_at(cell);
            }
        }
        assert!(sim.is_boss_level());
        assert!(sim.is_held());
        for _ in 0..400 {
            sim.tick(1.0 / 60.0);
        }
        assert!(sim.boss.is_some() || sim.stats().bosses_defeated == 1);
    }

    #[test]
    fn pause_freezes_time() {
        let mut sim = sim(GameMode::Classic);
        sim.toggle_pause();
        let events = sim.tick(0.5);
        assert!(events.contains(&Event::Mode(ModeEvent::Paused)));
        assert_eq!(sim.now(), 0.0);
        sim.toggle_pause();
        sim.tick(0.5);
        assert_eq!(sim.now(), 0.5);
    }

    #[test]
    fn coop_ends_only_when_both_out() {
        let mut sim = sim(GameMode::Coop);
        assert_eq!(sim.players.len(), 2);
        sim.players[0].lives = 0;
        sim.check_game_over();
        assert_eq!(sim.players[0].lives, 0);
        sim.players[1].lives = 0;
        sim.score = 120;
        sim.check_game_over();
        assert_eq!(sim.score, 0);
        assert_eq!(sim.players[0].lives, 3);
        assert_eq!(sim.players[1].lives, 3);
    }

    #[test]
    fn magnet_pulls_adjacent_pellets() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        let at = GridPos::new(1, 1);
        sim.players[0].mover.reset(at);
        sim.maze.grid.set(at.step(Dir::Right), Cell::Pellet);
        sim.maze.grid.set(at.step(Dir::Down), Cell::Pellet);
        sim.powerups.placed.insert(at, PowerUpKind::Magnet);
        // pick up first, pull next
        sim.resolve_collisions();
        sim.resolve_collisions();
        assert_eq!(sim.maze.grid.get(at.step(Dir::Right)), Some(Cell::Empty));
        assert_eq!(sim.maze.grid.get(at.step(Dir::Down)), Some(Cell::Empty));
    }

    #[test]
    fn freeze_halts_enemies_and_mode_clock() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        let maze = &sim.maze;
        let center = nearest_to_center(maze, CENTER_SEARCH_RADIUS, |p| maze.grid.is_open(p)).unwrap();
        sim.boss = Some(Boss::spawn_at(center));
        let special = sim.specials.insert(SpecialEnemy::new(SpecialKind::Splitter, center, 0.0));
        sim.mode_clock.frighten(8.0);
        sim.powerups.active = Some(ActivePowerUp {
            kind: PowerUpKind::Freeze,
            expires_at: 4.0,
        });

        let enemies: Vec<_> = sim.enemies.iter().map(|e| e.mover).collect();
        let boss = sim.boss.as_ref().unwrap().mover;
        let remaining = sim.mode_clock.frightened_remaining();
        for _ in 0..30 {
            sim.tick(DT);
        }

        let after: Vec<_> = sim.enemies.iter().map(|e| e.mover).collect();
        assert_eq!(after, enemies);
        assert_eq!(sim.boss.as_ref().unwrap().mover, boss);
        assert_eq!(sim.specials.get(special).unwrap().mover.pos, center.center());
        assert_eq!(sim.mode(), GhostMode::Frightened);
        assert_eq!(sim.mode_clock.frightened_remaining(), remaining);
        let snap = sim.snapshot();
        assert_eq!(snap.power_up, Some(PowerUpKind::Freeze));
        assert_eq!(snap.frightened_remaining, remaining);
        assert!((snap.power_up_remaining - (4.0 - sim.now)).abs() < 1e-9);

        sim.powerups.active = None;
        for _ in 0..30 {
            sim.tick(DT);
        }
        assert!(sim.mode_clock.frightened_remaining() < remaining);
        assert_ne!(sim.enemies.iter().map(|e| e.mover).collect::<Vec<_>>(), enemies);
    }

    #[test]
    fn endless_wave_raises_enemy_speed() {
        let mut sim = sim(GameMode::Endless);
        park_enemies_far(&mut sim);
        let base = sim.enemy_speed();
        sim.now = ENDLESS_WAVE_SECS - 0.01;
        let events = sim.tick(0.02);
        assert_eq!(sim.wave, 1);
        assert!(events.contains(&Event::Mode(ModeEvent::WaveChanged { wave: 2 })));
        assert!(sim.enemy_speed() > base);
    }

    #[test]
    fn eaten_enemy_is_harmless_and_not_eaten_twice() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        enemy_on_player(&mut sim, GridPos::new(5, 5));
        sim.mode_clock.frighten(8.0);
        sim.resolve_collisions();
        assert!(sim.enemies[0].is_eaten());
        let score = sim.score;

        assert!(!sim.resolve_collisions());
        assert_eq!(sim.score, score);
        assert_eq!(sim.stats().ghosts_eaten, 1);

        // frightened over, the enemy still gliding home
        sim.mode_clock = ModeClock::new(default_phases());
        assert_eq!(sim.mode(), GhostMode::Scatter);
        assert!(!sim.resolve_collisions());
        assert_eq!(sim.players[0].lives, 3);
        assert_eq!(sim.stats().ghosts_eaten, 1);
    }

    #[test]
    fn frightened_start_reverses_live_enemies_only() {
        let mut sim = sim(GameMode::Classic);
        let mut heading = Vec::new();
        for e in 0..2 {
            let maze = &sim.maze;
            let enemy = &mut sim.enemies[e];
            let dir = Dir::ALL
                .into_iter()
                .find(|&d| maze.can_move_to(enemy.mover.cell.step(d)))
                .unwrap();
            assert!(enemy.mover.try_begin(maze, dir));
            heading.push(dir);
        }
        let now = sim.now;
        sim.enemies[1].eat(now);

        let at = GridPos::new(3, 1);
        sim.maze.grid.set(at, Cell::PowerPellet);
        sim.consume_pellet_at(at);

        assert_eq!(sim.enemies[0].mover.dir, Some(heading[0].opposite()));
        assert!(sim.enemies[0].mover.moving);
        assert_eq!(sim.enemies[1].mover.dir, Some(heading[1]));
    }

    #[test]
    fn death_on_last_pellet_holds_the_level() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        let cells: Vec<GridPos> = sim.maze.grid.positions().collect();
        for p in cells {
            if sim.maze.grid.get(p).and_then(Cell::pellet_kind).is_some() {
                sim.maze.grid.set(p, Cell::Empty);
            }
        }
        let spawn = sim.players[0].cell();
        sim.maze.grid.set(spawn, Cell::Pellet);
        sim.enemies[0].mover.reset(spawn);

        let events = sim.tick(DT);
        assert_eq!(sim.maze.pellets_remaining(), 0);
        assert_eq!(sim.players[0].lives, 2);
        assert_eq!(sim.level, 1);
        assert!(!events.iter().any(|e| matches!(e, Event::LevelCompleted { .. })));

        // invincible now, so the clear goes through
        let events = sim.tick(DT);
        assert_eq!(sim.level, 2);
        assert!(events.contains(&Event::LevelCompleted { level: 1 }));
    }

    #[test]
    fn fruit_pickup_scores_with_combo() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        let cell = sim.players[0].cell();
        sim.combo.register(0.0);
        sim.combo.register(0.0);
        assert_eq!(sim.combo.multiplier(), 2);
        sim.fruit.current = Some(Fruit {
            cell,
            points: fruit_points(sim.level),
            expires_at: 8.0,
        });

        let events = sim.tick(DT);
        assert_eq!(sim.score, fruit_points(1) * 2);
        assert_eq!(sim.stats().fruits_eaten, 1);
        assert!(sim.fruit.current.is_none());
        assert!(events.contains(&Event::ItemConsumed {
            item: ItemKind::Fruit,
            source: Source::PlayerOne,
        }));
    }

    #[test]
    fn idle_combo_lapses_inside_tick() {
        let mut sim = sim(GameMode::Classic);
        park_enemies_far(&mut sim);
        sim.combo.register(0.0);
        sim.now = sim.combo.window_secs + 0.5;
        let events = sim.tick(DT);
        assert!(events.contains(&Event::ComboChanged { count: 0 }));
        assert_eq!(sim.combo.count, 0);
    }
}
