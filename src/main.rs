use std::fs::File;
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use clawman::director::GhostMode;
use clawman::events::{Event, ModeEvent};
use clawman::{Cell as MazeCell, GridPos, PlayerSlot, SimConfig, Simulation, Snapshot};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{ExecutableCommand, QueueableCommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

const CELL_W: usize = 2;
const DEFAULT_TICK_MS: u64 = 16;
const DEFAULT_RENDER_FPS: u64 = 60;
const BANNER_SECS: u64 = 3;

#[derive(Clone, Copy, PartialEq)]
enum Glyph {
    PlayerOne,
    PlayerTwo,
    Enemy,
    Frightened,
    Boss,
    Special,
    Wall,
    Empty,
    Pellet,
    Power,
    Fruit,
    PowerUp,
}

#[derive(Clone, Copy, PartialEq)]
struct Tile {
    glyph: Glyph,
    color: Color,
}

struct Renderer {
    last: Vec<Tile>,
    last_hud: String,
    needs_full: bool,
    origin_x: u16,
    origin_y: u16,
    width: usize,
    height: usize,
    banner: Option<(String, Instant)>,
}

impl Renderer {
    fn new(width: usize, height: usize) -> Self {
        Self {
            last: vec![
                Tile {
                    glyph: Glyph::Empty,
                    color: Color::Reset,
                };
                width * height
            ],
            last_hud: String::new(),
            needs_full: true,
            origin_x: 0,
            origin_y: 1,
            width,
            height,
            banner: None,
        }
    }

    fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            *self = Renderer::new(width, height);
        }
    }
}

fn main() -> io::Result<()> {
    init_logging();
    let config = load_config();
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(err) => {
            warn!(%err, "invalid config, using defaults");
            Simulation::new(SimConfig::default())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        }
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(Hide)?;

    let result = run(&mut stdout, &mut sim);

    stdout.execute(Show)?;
    stdout.execute(LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    result
}

/// Logs go to a file so they never scribble over the maze.
fn init_logging() {
    let Ok(filter) = std::env::var("CLAWMAN_LOG") else {
        return;
    };
    let path = std::env::var("CLAWMAN_LOG_FILE").unwrap_or_else(|_| "clawman.log".to_string());
    let Ok(file) = File::create(&path) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn load_config() -> SimConfig {
    let Some(path) = std::env::var_os("CLAWMAN_CONFIG").map(PathBuf::from) else {
        return SimConfig::default();
    };
    match SimConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), %err, "config not loaded, using defaults");
            SimConfig::default()
        }
    }
}

fn read_speed_settings() -> (u64, u64) {
    let tick_ms = std::env::var("CLAWMAN_TICK_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_TICK_MS);
    let render_fps = std::env::var("CLAWMAN_FPS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RENDER_FPS);
    (tick_ms, render_fps)
}

fn run(stdout: &mut Stdout, sim: &mut Simulation) -> io::Result<()> {
    let (tick_ms, render_fps) = read_speed_settings();
    let tick = Duration::from_millis(tick_ms);
    let frame_time = Duration::from_micros(1_000_000 / render_fps.max(1));
    let mut renderer = Renderer::new(sim.maze().width, sim.maze().height);
    let mut last_tick = Instant::now();
    // WASD drives the second player in coop, otherwise it mirrors hjkl.
    let wasd = if sim.game_mode().has_second_player() {
        PlayerSlot::Two
    } else {
        PlayerSlot::One
    };

    loop {
        let frame_start = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            if let TermEvent::Key(key) = event::read()? {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('p') => sim.toggle_pause(),
                    KeyCode::Char('k') | KeyCode::Up => sim.input(PlayerSlot::One, 0, -1),
                    KeyCode::Char('j') | KeyCode::Down => sim.input(PlayerSlot::One, 0, 1),
                    KeyCode::Char('h') | KeyCode::Left => sim.input(PlayerSlot::One, -1, 0),
                    KeyCode::Char('l') | KeyCode::Right => sim.input(PlayerSlot::One, 1, 0),
                    KeyCode::Char('w') => sim.input(wasd, 0, -1),
                    KeyCode::Char('s') => sim.input(wasd, 0, 1),
                    KeyCode::Char('a') => sim.input(wasd, -1, 0),
                    KeyCode::Char('d') => sim.input(wasd, 1, 0),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick {
            let dt = last_tick.elapsed().as_secs_f64();
            last_tick = Instant::now();
            for event in sim.tick(dt) {
                if let Some(text) = banner_for(&event) {
                    renderer.banner = Some((text, Instant::now()));
                }
            }
        }
        render(stdout, sim, &mut renderer)?;

        let elapsed = frame_start.elapsed();
        if elapsed < frame_time {
            thread::sleep(frame_time - elapsed);
        }
    }
}

fn banner_for(event: &Event) -> Option<String> {
    let text = match event {
        Event::LevelCompleted { level } => format!("LEVEL {level} CLEAR"),
        Event::Commentary { text } => text.clone(),
        Event::Mode(ModeEvent::GameOver { score, level }) => {
            format!("GAME OVER - Final Score: {score} (level {level})")
        }
        Event::Mode(ModeEvent::TimeUp { score }) => format!("TIME UP - Final Score: {score}"),
        Event::Mode(ModeEvent::WaveChanged { wave }) => format!("WAVE {wave}"),
        Event::Mode(ModeEvent::BossSpawned) => "BOSS INCOMING".to_string(),
        Event::Mode(ModeEvent::BossDefeated) => "BOSS DEFEATED".to_string(),
        _ => return None,
    };
    Some(text)
}

fn render(stdout: &mut Stdout, sim: &Simulation, renderer: &mut Renderer) -> io::Result<()> {
    let maze = sim.maze();
    renderer.resize(maze.width, maze.height);
    let needed_h = (maze.height + 3) as u16;
    let needed_w = (maze.width * CELL_W) as u16;

    stdout.queue(MoveTo(0, 0))?;

    let (term_w, term_h) = terminal::size()?;
    if term_w < needed_w || term_h < needed_h {
        stdout.queue(Clear(ClearType::All))?;
        let msg = format!(
            "Terminal too small. Need at least {}x{} (cols x rows). Current: {}x{}.",
            needed_w, needed_h, term_w, term_h
        );
        stdout.queue(Print(msg))?;
        stdout.flush()?;
        renderer.needs_full = true;
        return Ok(());
    }

    let origin_x = (term_w - needed_w) / 2;
    let origin_y = (term_h - needed_h) / 2 + 1;
    if origin_x != renderer.origin_x || origin_y != renderer.origin_y {
        renderer.origin_x = origin_x;
        renderer.origin_y = origin_y;
        renderer.needs_full = true;
    }

    let snap = sim.snapshot();
    let hud = hud_line(&snap);
    if renderer.needs_full || hud != renderer.last_hud {
        stdout.queue(MoveTo(renderer.origin_x, renderer.origin_y - 1))?;
        stdout.queue(SetForegroundColor(Color::White))?;
        stdout.queue(Clear(ClearType::CurrentLine))?;
        stdout.queue(Print(&hud))?;
        stdout.queue(ResetColor)?;
        renderer.last_hud = hud;
    }

    for y in 0..maze.height {
        for x in 0..maze.width {
            let pos = GridPos::new(x as i32, y as i32);
            let tile = tile_for(sim, &snap, pos);
            let idx = y * maze.width + x;
            if renderer.needs_full || tile != renderer.last[idx] {
                renderer.last[idx] = tile;
                draw_tile(stdout, renderer, x, y, tile)?;
            }
        }
    }

    let banner_y = renderer.origin_y + maze.height as u16;
    stdout.queue(MoveTo(renderer.origin_x, banner_y))?;
    stdout.queue(Clear(ClearType::CurrentLine))?;
    if let Some((text, at)) = &renderer.banner {
        if at.elapsed() < Duration::from_secs(BANNER_SECS) {
            stdout.queue(SetForegroundColor(Color::Yellow))?;
            stdout.queue(Print(text))?;
            stdout.queue(ResetColor)?;
        }
    }
    renderer.needs_full = false;

    stdout.flush()?;
    Ok(())
}

fn hud_line(snap: &Snapshot) -> String {
    let lives: Vec<String> = snap.players.iter().map(|p| p.lives.to_string()).collect();
    let mut hud = format!(
        "Score: {}  Lives: {}  Level: {}  Combo: {}",
        snap.score,
        lives.join("/"),
        snap.level,
        snap.combo
    );
    if snap.frightened_remaining > 0.0 {
        hud.push_str(&format!("  Scared: {:.0}s", snap.frightened_remaining.ceil()));
    }
    if let Some(kind) = snap.power_up {
        hud.push_str(&format!("  Power: {kind:?} {:.0}s", snap.power_up_remaining.ceil()));
    }
    if let Some(secs) = snap.time_remaining {
        hud.push_str(&format!("  Time: {}:{:02}", secs as u64 / 60, secs as u64 % 60));
    }
    if snap.paused {
        hud.push_str("  PAUSED");
    }
    hud.push_str("  (p pause, q quit)");
    hud
}

fn tile_for(sim: &Simulation, snap: &Snapshot, pos: GridPos) -> Tile {
    let tile = |glyph, color| Tile { glyph, color };
    if let Some(i) = snap.players.iter().position(|p| p.cell == pos && p.lives > 0) {
        return if i == 0 {
            tile(Glyph::PlayerOne, Color::Yellow)
        } else {
            tile(Glyph::PlayerTwo, Color::Cyan)
        };
    }
    if snap.boss.is_some_and(|(cell, _)| cell == pos) {
        return tile(Glyph::Boss, Color::DarkRed);
    }
    if snap.specials.iter().any(|(_, cell)| *cell == pos) {
        return tile(Glyph::Special, Color::Magenta);
    }
    if snap.enemies.iter().any(|e| e.cell == pos && !e.eaten) {
        if snap.mode == GhostMode::Frightened {
            return tile(Glyph::Frightened, Color::Blue);
        }
        return tile(Glyph::Enemy, Color::Red);
    }
    if snap.fruit == Some(pos) {
        return tile(Glyph::Fruit, Color::Green);
    }
    if sim.power_ups().placed.contains_key(&pos) {
        return tile(Glyph::PowerUp, Color::Yellow);
    }
    match sim.maze().grid.get(pos) {
        Some(MazeCell::Wall) | None => tile(Glyph::Wall, Color::Blue),
        Some(MazeCell::Empty) => tile(Glyph::Empty, Color::Reset),
        Some(MazeCell::Pellet) => tile(Glyph::Pellet, Color::White),
        Some(MazeCell::PowerPellet) => tile(Glyph::Power, Color::Magenta),
    }
}

fn draw_tile(stdout: &mut Stdout, renderer: &Renderer, x: usize, y: usize, tile: Tile) -> io::Result<()> {
    let text = match tile.glyph {
        Glyph::PlayerOne => "🦀",
        Glyph::PlayerTwo => "🦞",
        Glyph::Enemy => "👻",
        Glyph::Frightened => "😱",
        Glyph::Boss => "👹",
        Glyph::Special => "🌀",
        Glyph::Wall => "██",
        Glyph::Empty => "  ",
        Glyph::Pellet => "· ",
        Glyph::Power => "● ",
        Glyph::Fruit => "🍒",
        Glyph::PowerUp => "⭐",
    };
    let x_pos = renderer.origin_x + (x * CELL_W) as u16;
    let y_pos = renderer.origin_y + y as u16;
    stdout.queue(MoveTo(x_pos, y_pos))?;
    stdout.queue(SetForegroundColor(tile.color))?;
    stdout.queue(Print(text))?;
    let w = UnicodeWidthStr::width(text);
    if w < CELL_W {
        for _ in 0..(CELL_W - w) {
            stdout.queue(Print(' '))?;
        }
    }
    stdout.queue(ResetColor)?;
    Ok(())
}
