use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};

use super::profiler::SystemProfiler;
use super::{Database, Entity, Script};
use crate::scripts::{Behavior, BehaviorCache};

mod collision;
mod detection;
mod lifetime;
mod movement;
mod scripting;

pub use collision::{find_collisions, sys_collision, Manifold};
pub use detection::sys_detection;
pub use lifetime::{sys_death_timer, sys_fire_damage};
pub use movement::sys_movement;
pub use scripting::sys_scripting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemId {
    Movement,
    Collision,
    Scripting,
    Detection,
    DeathTimer,
    FireDamage,
}

impl SystemId {
    /// Frame order. Detection relies on death timers attached by fire damage
    /// one frame earlier, and removal happening only in the death-timer pass.
    pub const ORDER: [SystemId; 6] = [
        SystemId::Movement,
        SystemId::Collision,
        SystemId::Scripting,
        SystemId::Detection,
        SystemId::DeathTimer,
        SystemId::FireDamage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemId::Movement => "sys_movement",
            SystemId::Collision => "sys_collision",
            SystemId::Scripting => "sys_scripting",
            SystemId::Detection => "sys_detection",
            SystemId::DeathTimer => "sys_death_timer",
            SystemId::FireDamage => "sys_fire_damage",
        }
    }

    fn run(self, db: &mut Database, behaviors: &mut BehaviorCache, dt: f32) -> Result<()> {
        match self {
            SystemId::Movement => sys_movement(db, dt),
            SystemId::Collision => sys_collision(db, behaviors),
            SystemId::Scripting => sys_scripting(db, behaviors, dt),
            SystemId::Detection => sys_detection(db, behaviors),
            SystemId::DeathTimer => sys_death_timer(db, behaviors, dt),
            SystemId::FireDamage => sys_fire_damage(db, dt),
        }
    }
}

/// Runs every system once per frame in [`SystemId::ORDER`].
#[derive(Default)]
pub struct SystemPipeline {
    profiler: SystemProfiler,
}

impl SystemPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first failing system aborts the frame; later systems do not run.
    pub fn run(&mut self, db: &mut Database, behaviors: &mut BehaviorCache, dt: f32) -> Result<()> {
        let frame_start = Instant::now();
        for id in SystemId::ORDER {
            self.profiler
                .measure(id, || id.run(db, behaviors, dt))
                .with_context(|| format!("{} failed", id.name()))?;
        }
        self.profiler.finish_frame(frame_start.elapsed());
        Ok(())
    }

    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }
}

/// Behaviour named by the entity's `script` component. `None` when the entity
/// is gone, has no script, or the script name is blank.
pub(crate) fn script_behavior(
    db: &Database,
    behaviors: &mut BehaviorCache,
    entity: Entity,
) -> Result<Option<Rc<dyn Behavior>>> {
    if !db.has_component::<Script>(entity) {
        return Ok(None);
    }
    let name = db.read_component::<Script>(entity)?.name.clone();
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(behaviors.get(&name)?))
}
