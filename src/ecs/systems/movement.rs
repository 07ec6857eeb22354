use anyhow::Result;

use crate::ecs::{Database, Position, Velocity};

pub fn sys_movement(db: &mut Database, dt: f32) -> Result<()> {
    db.visit::<(&mut Position, &Velocity)>(|_, _, (mut pos, vel)| {
        pos.x += vel.vx * dt;
        pos.y += vel.vy * dt;
    })?;
    Ok(())
}
