use anyhow::Result;

use super::script_behavior;
use crate::ecs::{Database, DeathTimer, Detector, EnemyTag, Entity, Position};
use crate::scripts::BehaviorCache;

enum Transition {
    Enter(Entity),
    Leave(Entity),
}

/// Keeps each detector's tracked list in sync with the enemies inside its
/// radius. Dying enemies (those with a death timer) can leave but never enter.
///
/// Transitions are applied to the list while scanning and the tower's hooks
/// run afterwards, once the detector is no longer borrowed.
pub fn sys_detection(db: &mut Database, behaviors: &mut BehaviorCache) -> Result<()> {
    db.try_visit::<(&mut Detector, &Position), anyhow::Error, _>(|db, tower, (mut detector, tower_pos)| {
        detector.entities.retain(|&tracked| db.exists(tracked));
        let origin = tower_pos.as_vec2();
        drop(tower_pos);

        let mut transitions = Vec::new();
        db.visit::<(&Position, &EnemyTag)>(|db, enemy, (enemy_pos, _)| {
            if enemy == tower {
                return;
            }
            let in_range = origin.distance(enemy_pos.as_vec2()) < detector.radius;
            let dying = db.has_component::<DeathTimer>(enemy);
            match detector.entities.iter().position(|&tracked| tracked == enemy) {
                None if in_range && !dying => {
                    detector.entities.push(enemy);
                    transitions.push(Transition::Enter(enemy));
                }
                Some(slot) if !in_range || dying => {
                    detector.entities.remove(slot);
                    transitions.push(Transition::Leave(enemy));
                }
                _ => {}
            }
        })?;
        drop(detector);

        if transitions.is_empty() {
            return Ok(());
        }
        let Some(behavior) = script_behavior(db, behaviors, tower)? else {
            return Ok(());
        };
        for transition in transitions {
            match transition {
                Transition::Enter(enemy) => behavior.on_enter(db, tower, enemy)?,
                Transition::Leave(enemy) => behavior.on_leave(db, tower, enemy)?,
            }
        }
        Ok(())
    })
}
