use super::Entity;
use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }
}

/// Axis-aligned box. Stored in object space; translate by the owner's
/// [`Position`] before comparing against other boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aabb {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Aabb {
    pub fn new(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        Self { left, right, bottom, top }
    }

    /// Box of the given half extents centred on the origin.
    pub fn centered(half_width: f32, half_height: f32) -> Self {
        Self::new(-half_width, half_width, -half_height, half_height)
    }

    pub fn translated(&self, pos: &Position) -> Self {
        Self::new(self.left + pos.x, self.right + pos.x, self.bottom + pos.y, self.top + pos.y)
    }

    /// Overlap region; degenerate (see [`Aabb::is_valid`]) when the boxes are disjoint.
    pub fn intersection(&self, other: &Aabb) -> Self {
        Self::new(
            self.left.max(other.left),
            self.right.min(other.right),
            self.bottom.max(other.bottom),
            self.top.min(other.top),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.bottom < self.top
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// Names the behaviour script that drives this entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub name: String,
}

impl Script {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Tracks which enemies are inside `radius`. The list is a cache maintained
/// by the detection system and may briefly hold destroyed entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detector {
    pub radius: f32,
    pub entities: Vec<Entity>,
}

impl Detector {
    pub fn new(radius: f32) -> Self {
        Self { radius, entities: Vec::new() }
    }

    pub fn is_tracking(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tower {
    pub target: Option<Entity>,
    pub time: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub max_health: i32,
}

impl Health {
    pub fn new(max_health: i32) -> Self {
        Self { max_health }
    }
}

/// Seconds until the entity is destroyed. Presence alone marks an entity as dying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathTimer {
    pub time: f32,
}

impl DeathTimer {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

/// Burn effect: one point of damage every `rate` seconds for `duration` seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireDamage {
    pub next: f32,
    pub rate: f32,
    pub duration: f32,
}

impl FireDamage {
    pub fn new(rate: f32, duration: f32) -> Self {
        Self { next: rate, rate, duration }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Animation {
    pub name: String,
    pub cycle: String,
    pub frame: i64,
    pub t: f32,
    pub scale: f32,
    pub rot: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            name: String::new(),
            cycle: String::new(),
            frame: 0,
            t: 0.0,
            scale: 1.0,
            rot: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speed {
    pub speed: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pathing {
    pub path: String,
    pub waypoint: i64,
}

/// Periodically instantiates `template`; the spawning itself is scripted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spawner {
    pub template: String,
    pub interval: f32,
    pub next: f32,
    pub remaining: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyTag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletTag;
