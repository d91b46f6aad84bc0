//! Drift
//!
//! A headless simulation demonstrating the cadence runtime.
//! - Ships drift across a wrapping 100x100 field
//! - A timer subscription, running on its own thread, spawns ships
//! - Thrust is read from the input snapshot every fixed step
//! - Frames are "rendered" by logging a summary of the sorted draw list

use cadence_core::{Cmd, Dispatch, Disposer, Frame, Pipeline, RenderBuffer, Renderer, Sub};
use cadence_runtime::{Program, Runtime, RuntimeConfig, StepContext, ViewContext};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulation constants
const FIELD_SIZE: f64 = 100.0;
const MAX_SHIPS: u32 = 8;
const SPAWN_INTERVAL: Duration = Duration::from_millis(400);
const THRUST_FACTOR: f64 = 1.02;
const RUN_FOR: Duration = Duration::from_secs(4);
const FRAME_SLEEP: Duration = Duration::from_millis(16);
const LOG_EVERY_FRAMES: u64 = 60;

#[derive(Debug, Clone, Copy)]
struct Ship {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

#[derive(Debug, Clone, Default)]
struct World {
    ships: Vec<Ship>,
    spawned: u32,
    wraps: u32,
    spawning: bool,
}

#[derive(Debug, Clone, Copy)]
enum Msg {
    Spawn,
    Wrapped(usize),
    StopSpawning,
}

/// Input snapshot read once per frame
#[derive(Debug, Clone, Copy, Default)]
struct Controls {
    thrust: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layer {
    Background,
    Ships,
    Hud,
}

#[derive(Debug, Clone)]
enum DrawCmd {
    Clear,
    Ship { x: f64, y: f64 },
    Text(String),
}

struct Drift;

impl Program for Drift {
    type State = World;
    type Msg = Msg;
    type Input = Controls;
    type SortKey = Layer;
    type Draw = DrawCmd;

    fn init(&self) -> (World, Cmd<Msg>) {
        let world = World {
            spawning: true,
            ..World::default()
        };
        (world, Cmd::of_msg(Msg::Spawn))
    }

    fn update(&self, mut world: World, msg: Msg) -> (World, Cmd<Msg>) {
        match msg {
            Msg::Spawn => {
                if world.spawned >= MAX_SHIPS {
                    return (world, Cmd::none());
                }
                let n = f64::from(world.spawned);
                world.ships.push(Ship {
                    x: FIELD_SIZE / 2.0,
                    y: FIELD_SIZE / 2.0,
                    vx: 10.0 + 5.0 * n,
                    vy: 20.0 - 6.0 * n,
                });
                world.spawned += 1;
                let cmd = if world.spawned == MAX_SHIPS {
                    Cmd::of_msg(Msg::StopSpawning)
                } else {
                    Cmd::none()
                };
                (world, cmd)
            }
            Msg::Wrapped(_) => {
                world.wraps += 1;
                (world, Cmd::none())
            }
            Msg::StopSpawning => {
                world.spawning = false;
                (world, Cmd::none())
            }
        }
    }

    fn step(&self, world: World, ctx: &StepContext<'_, Controls>) -> (World, Cmd<Msg>) {
        let thrust = ctx.input.thrust;
        let dt = ctx.dt;
        Pipeline::start(world)
            .pipe_mut(|w| apply_thrust(w, thrust))
            .pipe(|w| movement(w, dt))
            .pipe(wrap_edges)
            .done()
    }

    fn subscriptions(&self, world: &World) -> Sub<Msg> {
        if world.spawning {
            every(SPAWN_INTERVAL).map("spawner", |()| Msg::Spawn)
        } else {
            Sub::empty()
        }
    }

    fn view(&self, world: &World, ctx: &ViewContext, buffer: &mut RenderBuffer<Layer, DrawCmd>) {
        buffer.add(
            Layer::Hud,
            DrawCmd::Text(format!(
                "tick {} ships {} wraps {}",
                ctx.tick,
                world.ships.len(),
                world.wraps
            )),
        );
        for ship in &world.ships {
            buffer.add(Layer::Ships, DrawCmd::Ship { x: ship.x, y: ship.y });
        }
        buffer.add(Layer::Background, DrawCmd::Clear);
    }
}

fn apply_thrust(world: &mut World, thrust: bool) -> Cmd<Msg> {
    if thrust {
        for ship in &mut world.ships {
            ship.vx *= THRUST_FACTOR;
            ship.vy *= THRUST_FACTOR;
        }
    }
    Cmd::none()
}

fn movement(world: World, dt: f64) -> (World, Cmd<Msg>) {
    let ships = world
        .ships
        .iter()
        .map(|s| Ship {
            x: s.x + s.vx * dt,
            y: s.y + s.vy * dt,
            ..*s
        })
        .collect();
    (World { ships, ..world }, Cmd::none())
}

fn wrap_edges(mut world: World) -> (World, Vec<Cmd<Msg>>) {
    let mut cmds = Vec::new();
    for (i, ship) in world.ships.iter_mut().enumerate() {
        let (x, y) = (ship.x.rem_euclid(FIELD_SIZE), ship.y.rem_euclid(FIELD_SIZE));
        if x != ship.x || y != ship.y {
            ship.x = x;
            ship.y = y;
            cmds.push(Cmd::of_msg(Msg::Wrapped(i)));
        }
    }
    (world, cmds)
}

/// A timer firing every `interval` on a background thread until disposed
fn every(interval: Duration) -> Sub<()> {
    let key = format!("every/{}ms", interval.as_millis());
    Sub::active(key, move |dispatch: Dispatch<()>| {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        thread::spawn(move || {
            while flag.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if flag.load(Ordering::Relaxed) {
                    dispatch.send(());
                }
            }
        });
        Disposer::new(move || running.store(false, Ordering::Relaxed))
    })
}

/// Logs a summary of every Nth frame instead of drawing it
#[derive(Default)]
struct LogRenderer {
    frames: u64,
}

impl Renderer<Layer, DrawCmd> for LogRenderer {
    fn submit_frame(&mut self, frame: Frame<Layer, DrawCmd>) {
        self.frames += 1;
        if self.frames % LOG_EVERY_FRAMES != 0 {
            return;
        }
        let hud = frame.commands().find_map(|cmd| match cmd {
            DrawCmd::Text(text) => Some(text.as_str()),
            _ => None,
        });
        info!(
            frame = self.frames,
            draw_commands = frame.len(),
            hud = hud.unwrap_or_default(),
            "frame"
        );
    }
}

fn load_config() -> Result<RuntimeConfig, Box<dyn std::error::Error>> {
    // Try multiple paths for the config file
    let paths = ["demos/drift/data/config.ron", "data/config.ron"];

    for path in &paths {
        if Path::new(path).exists() {
            let text = fs::read_to_string(path)?;
            info!(path, "loaded runtime config");
            return Ok(RuntimeConfig::from_ron_str(&text)?);
        }
    }

    info!("no config file found, using defaults");
    Ok(RuntimeConfig::default())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let mut runtime = Runtime::new(Drift, config)?;
    let mut renderer = LogRenderer::default();
    let mut world = runtime.init()?;

    let started = Instant::now();
    let mut last = started;
    while started.elapsed() < RUN_FOR {
        thread::sleep(FRAME_SLEEP);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        // Thrust during odd seconds
        let controls = Controls {
            thrust: started.elapsed().as_secs() % 2 == 1,
        };
        let (next, _report) = runtime.frame(world, dt, &controls, &mut renderer)?;
        world = next;
    }

    runtime.shutdown();
    info!(
        ticks = runtime.clock().tick(),
        ships = world.ships.len(),
        wraps = world.wraps,
        "simulation finished"
    );
    Ok(())
}
