use anyhow::Result;

use super::script_behavior;
use crate::ecs::{Database, DbError, DeathTimer, FireDamage, Health};
use crate::scripts::BehaviorCache;

/// Counts death timers down; an expired entity gets its `on_death` hook and is
/// then destroyed regardless of what the hook did.
pub fn sys_death_timer(db: &mut Database, behaviors: &mut BehaviorCache, dt: f32) -> Result<()> {
    db.try_visit::<&mut DeathTimer, anyhow::Error, _>(|db, entity, mut timer| {
        timer.time -= dt;
        let expired = timer.time <= 0.0;
        drop(timer);
        if !expired {
            return Ok(());
        }
        if let Some(behavior) = script_behavior(db, behaviors, entity)? {
            behavior.on_death(db, entity)?;
        }
        db.destroy_entity(entity);
        Ok(())
    })
}

/// Burn damage: one point per `rate` seconds until `duration` runs out. An
/// entity whose health drops to zero is marked with a death timer; removal is
/// left to the death-timer pass of a later frame.
pub fn sys_fire_damage(db: &mut Database, dt: f32) -> Result<()> {
    db.try_visit::<(&mut FireDamage, &mut Health), DbError, _>(|db, entity, (mut fire, mut health)| {
        fire.next -= dt;
        fire.duration -= dt;
        if fire.next <= 0.0 {
            fire.next = fire.rate;
            health.max_health -= 1;
        }
        let burnt_out = fire.duration <= 0.0;
        let dead = health.max_health <= 0;
        drop((fire, health));

        if burnt_out {
            db.destroy_component::<FireDamage>(entity);
        }
        // Overwrites any running timer, so the kill lands on the next death-timer pass.
        if dead {
            db.create_component(entity, DeathTimer::default())?;
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_scripts() -> BehaviorCache {
        BehaviorCache::new(|name| anyhow::bail!("no script {name}"))
    }

    #[test]
    fn timer_destroys_once_expired() {
        let mut db = Database::new();
        let e = db.create_entity();
        db.create_component(e, DeathTimer::new(1.0)).unwrap();
        let mut behaviors = no_scripts();
        sys_death_timer(&mut db, &mut behaviors, 0.5).unwrap();
        assert!(db.exists(e));
        assert_eq!(db.read_component::<DeathTimer>(e).unwrap().time, 0.5);
        sys_death_timer(&mut db, &mut behaviors, 0.5).unwrap();
        assert!(!db.exists(e));
    }

    #[test]
    fn burn_ends_after_duration() {
        let mut db = Database::new();
        let e = db.create_entity();
        db.create_component(e, Health::new(10)).unwrap();
        db.create_component(e, FireDamage::new(1.0, 2.0)).unwrap();
        for _ in 0..4 {
            sys_fire_damage(&mut db, 0.5).unwrap();
        }
        assert!(!db.has_component::<FireDamage>(e));
        assert_eq!(db.read_component::<Health>(e).unwrap().max_health, 8);
        sys_fire_damage(&mut db, 0.5).unwrap();
        assert_eq!(db.read_component::<Health>(e).unwrap().max_health, 8);
    }

    #[test]
    fn lethal_burn_marks_but_does_not_destroy() {
        let mut db = Database::new();
        let e = db.create_entity();
        db.create_component(e, Health::new(1)).unwrap();
        db.create_component(e, FireDamage::new(0.5, 10.0)).unwrap();
        sys_fire_damage(&mut db, 0.5).unwrap();
        assert!(db.exists(e));
        assert!(db.has_component::<DeathTimer>(e));
    }

    #[test]
    fn lethal_burn_overrides_a_longer_death_timer() {
        let mut db = Database::new();
        let e = db.create_entity();
        db.create_component(e, Health::new(0)).unwrap();
        db.create_component(e, FireDamage::new(1.0, 10.0)).unwrap();
        db.create_component(e, DeathTimer::new(3.0)).unwrap();
        sys_fire_damage(&mut db, 0.25).unwrap();
        assert_eq!(db.read_component::<DeathTimer>(e).unwrap().time, 0.0);

        let mut behaviors = no_scripts();
        sys_death_timer(&mut db, &mut behaviors, 0.25).unwrap();
        assert!(!db.exists(e));
    }
}
