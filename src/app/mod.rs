use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::cache::ResourceCache;
use crate::config::AppConfig;
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::systems::SystemPipeline;
use crate::ecs::{Database, EnemyTag, Entity};
use crate::scripts::{register_builtin_components, BehaviorCache, ScriptEngine};
use crate::stage::Stage;
use crate::state::{GameEvent, GameState};
use crate::time::{FrameStats, Time};

mod runtime_loop;

use runtime_loop::FixedStepper;

/// Headless host for one game session: database, scripts, pipeline and the
/// game-state machine.
pub struct Simulation {
    db: Database,
    scripts: ScriptEngine,
    behaviors: BehaviorCache,
    stages: ResourceCache<Stage>,
    pipeline: SystemPipeline,
    state: GameState,
    stats: FrameStats,
    saw_enemies: bool,
}

impl Simulation {
    pub fn new(config: &AppConfig) -> Self {
        let mut scripts = ScriptEngine::new(&config.scripts);
        register_builtin_components(&mut scripts);
        let mut db = Database::new();
        scripts.name_components(&mut db);
        let behaviors = scripts.behavior_cache();
        let stages = ResourceCache::new(|path| Ok(Rc::new(Stage::load(path)?)));
        Self {
            db,
            scripts,
            behaviors,
            stages,
            pipeline: SystemPipeline::new(),
            state: GameState::default(),
            stats: FrameStats::default(),
            saw_enemies: false,
        }
    }

    /// Replaces the database contents with the stage's entities.
    pub fn load_stage(&mut self, path: impl AsRef<Path>) -> Result<Vec<Entity>> {
        let key = path.as_ref().to_string_lossy().into_owned();
        let stage = self.stages.get(&key)?;
        self.db.clear();
        self.saw_enemies = false;
        let spawned = stage.spawn(&mut self.db, &self.scripts.loaders())?;
        info!(target: "app", "Stage '{}' loaded with {} entities", stage.name, spawned.len());
        Ok(spawned)
    }

    /// Advances one frame. Outside of gameplay this only records the frame.
    pub fn frame(&mut self, dt: f32) -> Result<()> {
        self.stats.record(dt);
        if !self.state.is_running() {
            return Ok(());
        }
        self.pipeline.run(&mut self.db, &mut self.behaviors, dt).with_context(|| {
            format!("Frame {} (t = {:.3}s)", self.stats.frames(), self.stats.simulated_seconds())
        })?;

        let enemies = self.db.count::<&EnemyTag>();
        if enemies > 0 {
            self.saw_enemies = true;
        } else if self.saw_enemies {
            self.handle(GameEvent::StageCleared);
        }
        Ok(())
    }

    pub fn handle(&mut self, event: GameEvent) -> GameState {
        let next = self.state.transition(event);
        if next != self.state {
            info!(target: "app", "{} -> {} ({event:?})", self.state, next);
            self.state = next;
        } else {
            debug!(target: "app", "Ignoring {event:?} in {}", self.state);
        }
        self.state
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn scripts(&self) -> &ScriptEngine {
        &self.scripts
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn profiler(&self) -> &SystemProfiler {
        self.pipeline.profiler()
    }
}

/// Loads the configured stage and runs until the frame budget is spent or
/// the game leaves `Gameplay`.
pub fn run(config: &AppConfig) -> Result<GameState> {
    let mut sim = Simulation::new(config);
    sim.load_stage(&config.stage.path)?;
    sim.handle(GameEvent::Start);

    let sim_cfg = &config.simulation;
    if sim_cfg.realtime {
        let mut stepper = FixedStepper::new(Time::new(), sim_cfg.fixed_dt, sim_cfg.max_backlog);
        while sim.state().is_running() && sim.stats().frames() < u64::from(sim_cfg.max_frames) {
            let steps = stepper.poll();
            if steps.discarded > 0.0 {
                warn!(target: "app", "Fell behind; dropped {:.3}s of simulation time", steps.discarded);
            }
            for _ in 0..steps.count {
                if !sim.state().is_running() || sim.stats().frames() >= u64::from(sim_cfg.max_frames) {
                    break;
                }
                sim.frame(steps.dt)?;
            }
            std::thread::sleep(stepper.until_next_step());
        }
        debug!(target: "app", "Wall clock: {:.2}s", stepper.clock().elapsed_seconds());
    } else {
        for _ in 0..sim_cfg.max_frames {
            if !sim.state().is_running() {
                break;
            }
            sim.frame(sim_cfg.fixed_dt)?;
        }
    }

    info!(
        target: "app",
        "Finished in {} after {} frames ({:.2}s simulated at {:.1} steps/s, {} entities alive)",
        sim.state(),
        sim.stats().frames(),
        sim.stats().simulated_seconds(),
        sim.stats().fps().unwrap_or(0.0),
        sim.db().len()
    );
    let (frame_avg, frame_max) = sim.profiler().frame_ms();
    debug!(target: "pipeline", "Frame: avg {frame_avg:.3}ms max {frame_max:.3}ms over {} frames", sim.profiler().frames());
    for timings in sim.profiler().summaries() {
        debug!(
            target: "pipeline",
            "{}: last {:.3}ms avg {:.3}ms max {:.3}ms over {} samples",
            timings.system.name(),
            timings.last_ms,
            timings.average_ms,
            timings.max_ms,
            timings.samples
        );
    }
    Ok(sim.state())
}
