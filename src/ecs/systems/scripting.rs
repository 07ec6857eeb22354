use anyhow::Result;

use crate::ecs::{Database, Script};
use crate::scripts::BehaviorCache;

/// Per-entity behaviour tick.
pub fn sys_scripting(db: &mut Database, behaviors: &mut BehaviorCache, dt: f32) -> Result<()> {
    db.try_visit::<&Script, anyhow::Error, _>(|db, entity, script| {
        let name = script.name.clone();
        drop(script);
        if name.is_empty() {
            return Ok(());
        }
        behaviors.get(&name)?.update(db, entity, dt)
    })
}
