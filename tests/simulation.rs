use clawman::events::ModeEvent;
use clawman::{
    Cell, ConfigError, Event, GameMode, GridPos, MazeType, PlayerSlot, SimConfig, Simulation,
};

const DT: f64 = 1.0 / 60.0;

fn seeded(seed: u64) -> SimConfig {
    SimConfig {
        seed: Some(seed),
        ..SimConfig::default()
    }
}

fn pellet_cells(sim: &Simulation) -> Vec<GridPos> {
    let grid = &sim.maze().grid;
    grid.positions()
        .filter(|&p| grid.get(p).and_then(Cell::pellet_kind).is_some())
        .collect()
}

fn clear_level(sim: &mut Simulation) {
    for pos in pellet_cells(sim) {
        sim.consume_pellet_at(pos);
    }
}

#[test]
fn eating_every_pellet_advances_exactly_one_level() {
    let mut sim = Simulation::new(seeded(4)).unwrap();
    assert_eq!(sim.level(), 1);
    assert_eq!(sim.maze().maze_type, MazeType::Standard);

    clear_level(&mut sim);

    assert_eq!(sim.level(), 2);
    assert_eq!(sim.maze().maze_type, MazeType::Open);
    assert!(sim.maze().pellets_remaining() > 0);
    assert!(sim.is_held());

    let events = sim.tick(DT);
    let completed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::LevelCompleted { .. }))
        .collect();
    assert_eq!(completed, vec![&Event::LevelCompleted { level: 1 }]);
    assert_eq!(sim.level(), 2);
}

#[test]
fn level_hold_releases_after_splash() {
    let mut sim = Simulation::new(seeded(4)).unwrap();
    clear_level(&mut sim);
    let start = sim.player(PlayerSlot::One).unwrap().cell();
    sim.input(PlayerSlot::One, 1, 0);
    for _ in 0..60 {
        sim.tick(DT);
    }
    assert!(sim.is_held());
    assert_eq!(sim.player(PlayerSlot::One).unwrap().cell(), start);
    for _ in 0..90 {
        sim.tick(DT);
    }
    assert!(!sim.is_held());
}

#[test]
fn score_survives_level_change() {
    let mut sim = Simulation::new(seeded(12)).unwrap();
    clear_level(&mut sim);
    assert!(sim.score() > 0);
    let score = sim.score();
    assert_eq!(sim.stats().score, score);
    assert_eq!(sim.stats().level, 2);
}

#[test]
fn fifth_level_is_a_boss_arena() {
    let mut sim = Simulation::new(seeded(21)).unwrap();
    assert!(!sim.is_boss_level());
    for _ in 0..4 {
        clear_level(&mut sim);
    }
    assert_eq!(sim.level(), 5);
    assert!(sim.is_boss_level());
    assert_eq!(sim.maze().maze_type, MazeType::Arena);
}

#[test]
fn boss_interval_is_configurable() {
    let config = SimConfig {
        boss_level_interval: 2,
        ..seeded(21)
    };
    let mut sim = Simulation::new(config).unwrap();
    assert!(!sim.is_boss_level());
    clear_level(&mut sim);
    assert!(sim.is_boss_level());
}

#[test]
fn same_seed_and_inputs_replay_identically() {
    let script = [(0, 1, 0), (40, 0, 1), (90, -1, 0), (150, 0, -1), (220, 1, 0)];
    let run = || {
        let mut sim = Simulation::new(seeded(99)).unwrap();
        let mut log = Vec::new();
        for frame in 0..400 {
            for &(at, x, y) in &script {
                if at == frame {
                    sim.input(PlayerSlot::One, x, y);
                }
            }
            log.push(sim.tick(DT));
        }
        (sim.snapshot(), log)
    };
    let (snap_a, log_a) = run();
    let (snap_b, log_b) = run();
    assert_eq!(snap_a, snap_b);
    assert_eq!(log_a, log_b);
}

#[test]
fn snapshot_reflects_roster() {
    let mut sim = Simulation::new(seeded(3)).unwrap();
    sim.tick(DT);
    let snap = sim.snapshot();
    assert_eq!(snap.frame, 1);
    assert_eq!(snap.level, 1);
    assert_eq!(snap.players.len(), 1);
    assert_eq!(snap.players[0].lives, 3);
    assert_eq!(snap.enemies.len(), 4);
    assert!(snap.boss.is_none());
    assert_eq!(snap.pellets_remaining, sim.maze().pellets_remaining());
    assert_eq!(snap.time_remaining, None);
    assert_eq!(snap.frightened_remaining, 0.0);
    assert_eq!(snap.power_up, None);
    assert_eq!(snap.power_up_remaining, 0.0);
    assert!(!snap.paused);
}

#[test]
fn coop_adds_second_player_in_far_corner() {
    let config = SimConfig {
        mode: GameMode::Coop,
        ..seeded(3)
    };
    let sim = Simulation::new(config).unwrap();
    let snap = sim.snapshot();
    assert_eq!(snap.players.len(), 2);
    let p2 = snap.players[1].cell;
    assert!(sim.maze().grid.is_open(p2));
    assert!(p2.x > sim.maze().width as i32 / 2);
    assert!(p2.y > sim.maze().height as i32 / 2);
}

#[test]
fn time_attack_counts_down() {
    let config = SimConfig {
        mode: GameMode::TimeAttack,
        ..seeded(3)
    };
    let mut sim = Simulation::new(config).unwrap();
    let before = sim.time_remaining().unwrap();
    for _ in 0..60 {
        sim.tick(DT);
    }
    let after = sim.time_remaining().unwrap();
    assert!((before - after - 1.0).abs() < 1e-6);
}

#[test]
fn pause_round_trip_emits_both_events() {
    let mut sim = Simulation::new(seeded(3)).unwrap();
    sim.toggle_pause();
    let events = sim.tick(DT);
    assert!(events.contains(&Event::Mode(ModeEvent::Paused)));
    assert_eq!(sim.now(), 0.0);
    sim.toggle_pause();
    let events = sim.tick(DT);
    assert!(events.contains(&Event::Mode(ModeEvent::Resumed)));
    assert!(sim.now() > 0.0);
}

#[test]
fn bad_deltas_do_not_move_time() {
    let mut sim = Simulation::new(seeded(3)).unwrap();
    sim.tick(f64::NAN);
    sim.tick(-1.0);
    sim.tick(f64::INFINITY);
    assert_eq!(sim.now(), 0.0);
}

#[test]
fn config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("clawman-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "maze_width = 25\nmaze_height = 19\nseed = 5\nmode = \"endless\"\ndifficulty = \"easy\"\n",
    )
    .unwrap();
    let config = SimConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.mode, GameMode::Endless);
    let sim = Simulation::new(config).unwrap();
    assert_eq!((sim.maze().width, sim.maze().height), (25, 19));
    assert_eq!(sim.player(PlayerSlot::One).unwrap().lives, 5);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let path = std::env::temp_dir().join("clawman-does-not-exist.toml");
    assert!(matches!(SimConfig::load(&path), Err(ConfigError::Io(_))));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let config = SimConfig {
        player_speed: 0.0,
        ..SimConfig::default()
    };
    assert!(matches!(Simulation::new(config), Err(ConfigError::Invalid(_))));
}

#[test]
fn daily_challenge_repeats_the_maze_seed() {
    let config = SimConfig {
        daily_challenge: true,
        ..seeded(2024)
    };
    let a = Simulation::new(config.clone()).unwrap();
    let b = Simulation::new(config).unwrap();
    assert_eq!(a.maze(), b.maze());
    assert_eq!(a.maze(), &clawman::generate(21, 21, Some(1), Some(2024)));
}
