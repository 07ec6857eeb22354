use std::cell::RefCell;

use anyhow::Result;

use super::script_behavior;
use crate::ecs::{Aabb, Database, DbError, Entity, Position};
use crate::scripts::BehaviorCache;

/// Overlap between two entities' world-space boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    pub a: Entity,
    pub b: Entity,
    pub region: Aabb,
}

/// All overlapping `position` + `aabb` pairs, each unordered pair once.
pub fn find_collisions(db: &Database) -> Result<Vec<Manifold>, DbError> {
    let found = RefCell::new(Vec::new());
    let sink = &found;
    db.visit_pairs::<(&Position, &Aabb), (&Position, &Aabb), _>(|a, (pos_a, box_a)| {
        let bounds_a = box_a.translated(&pos_a);
        move |b, (pos_b, box_b)| {
            let region = bounds_a.intersection(&box_b.translated(&pos_b));
            if region.is_valid() {
                sink.borrow_mut().push(Manifold { a, b, region });
            }
        }
    })?;
    Ok(found.into_inner())
}

/// Collects every collision first, then notifies both participants. Handlers
/// may destroy entities, so a participant that is gone by the time its turn
/// comes is skipped.
pub fn sys_collision(db: &mut Database, behaviors: &mut BehaviorCache) -> Result<()> {
    for manifold in find_collisions(db)? {
        notify(db, behaviors, manifold.a, manifold.b, &manifold.region)?;
        notify(db, behaviors, manifold.b, manifold.a, &manifold.region)?;
    }
    Ok(())
}

fn notify(db: &mut Database, behaviors: &mut BehaviorCache, entity: Entity, other: Entity, region: &Aabb) -> Result<()> {
    if let Some(behavior) = script_behavior(db, behaviors, entity)? {
        behavior.on_collide(db, entity, other, region)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(db: &mut Database, x: f32, y: f32) -> Entity {
        let e = db.create_entity();
        db.create_component(e, Position::new(x, y)).unwrap();
        db.create_component(e, Aabb::centered(0.5, 0.5)).unwrap();
        e
    }

    #[test]
    fn three_overlapping_boxes_yield_three_manifolds() {
        let mut db = Database::new();
        let a = boxed(&mut db, 0.0, 0.0);
        let b = boxed(&mut db, 0.2, 0.0);
        let c = boxed(&mut db, 0.0, 0.2);
        let pairs: Vec<(Entity, Entity)> =
            find_collisions(&db).unwrap().into_iter().map(|m| (m.a, m.b)).collect();
        assert_eq!(pairs, vec![(a, b), (a, c), (b, c)]);
    }

    #[test]
    fn region_is_world_space_overlap() {
        let mut db = Database::new();
        boxed(&mut db, 0.0, 0.0);
        boxed(&mut db, 0.9, 0.0);
        boxed(&mut db, 5.0, 5.0);
        let manifolds = find_collisions(&db).unwrap();
        assert_eq!(manifolds.len(), 1);
        let region = manifolds[0].region;
        assert!((region.left - 0.4).abs() < 1e-5);
        assert!((region.right - 0.5).abs() < 1e-5);
    }

    #[test]
    fn entities_without_boxes_are_ignored() {
        let mut db = Database::new();
        boxed(&mut db, 0.0, 0.0);
        let bare = db.create_entity();
        db.create_component(bare, Position::new(0.0, 0.0)).unwrap();
        assert!(find_collisions(&db).unwrap().is_empty());
    }
}
