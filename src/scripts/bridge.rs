//! Script-facing CRUD surface over the database.
//!
//! Every operation reports misuse (dead entity, missing component) on the
//! `bridge` log target and then carries on. Scripts never see an exception from
//! this layer.

use log::{error, info, warn};
use rand::Rng;
use rhai::{Array, Dynamic, Engine, ImmutableString, Map, FLOAT, INT};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use super::{ScriptEngine, ScriptWorld};
use crate::ecs::*;
use crate::stage;

/// A value component scripts can construct, read and write back.
pub trait ScriptComponent: Component + Clone + Default + DeserializeOwned {
    const NAME: &'static str;

    /// Registers rhai getters and setters for the component's fields.
    fn register_fields(_engine: &mut Engine) {}
}

/// A zero-payload marker component.
pub trait ScriptTag: Component + Default {
    const NAME: &'static str;
}

/// Conversion between a component field and a rhai value.
pub trait ScriptField: Sized {
    fn to_script(&self) -> Dynamic;
    fn from_script(value: Dynamic) -> Option<Self>;
}

impl ScriptField for f32 {
    fn to_script(&self) -> Dynamic {
        Dynamic::from_float(*self as FLOAT)
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        value.as_float().ok().map(|v| v as f32).or_else(|| value.as_int().ok().map(|v| v as f32))
    }
}

impl ScriptField for i32 {
    fn to_script(&self) -> Dynamic {
        Dynamic::from_int(*self as INT)
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        value.as_int().ok().and_then(|v| i32::try_from(v).ok())
    }
}

impl ScriptField for i64 {
    fn to_script(&self) -> Dynamic {
        Dynamic::from_int(*self as INT)
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        value.as_int().ok()
    }
}

impl ScriptField for String {
    fn to_script(&self) -> Dynamic {
        Dynamic::from(self.clone())
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        value.into_string().ok()
    }
}

impl ScriptField for Option<Entity> {
    fn to_script(&self) -> Dynamic {
        match self {
            Some(entity) => Dynamic::from(*entity),
            None => Dynamic::UNIT,
        }
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        if value.is_unit() {
            return Some(None);
        }
        value.try_cast::<Entity>().map(Some)
    }
}

impl ScriptField for Vec<Entity> {
    fn to_script(&self) -> Dynamic {
        Dynamic::from_array(self.iter().map(|entity| Dynamic::from(*entity)).collect())
    }

    fn from_script(value: Dynamic) -> Option<Self> {
        value.into_array().ok()?.into_iter().map(|item| item.try_cast::<Entity>()).collect()
    }
}

macro_rules! script_fields {
    ($engine:expr, $ty:ty { $($field:ident),* $(,)? }) => {
        $(
            $engine.register_get_set(
                stringify!($field),
                |component: &mut $ty| ScriptField::to_script(&component.$field),
                |component: &mut $ty, value: Dynamic| {
                    assign(&mut component.$field, value, <$ty as ScriptComponent>::NAME, stringify!($field))
                },
            );
            $engine.register_get_set(
                stringify!($field),
                |handle: &mut ComponentRef<$ty>| handle.read(|component| ScriptField::to_script(&component.$field)),
                |handle: &mut ComponentRef<$ty>, value: Dynamic| {
                    handle.write(|component| {
                        assign(&mut component.$field, value, <$ty as ScriptComponent>::NAME, stringify!($field))
                    })
                },
            );
        )*
    };
}

fn assign<F: ScriptField>(slot: &mut F, value: Dynamic, component: &str, field: &str) {
    match F::from_script(value) {
        Some(value) => *slot = value,
        None => warn!(target: "bridge", "Ignoring value of the wrong type for {component}.{field}"),
    }
}

/// Live handle to a component, returned by `get_<name>`.
///
/// Field reads and writes go straight to the database, so `p.x = 1.0` needs no
/// `create_<name>` afterwards. A handle whose entity or component has gone away
/// reads as `()` and ignores writes.
pub struct ComponentRef<T> {
    world: ScriptWorld,
    entity: Entity,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        Self { world: self.world.clone(), entity: self.entity, marker: PhantomData }
    }
}

impl<T: ScriptComponent> ComponentRef<T> {
    fn new(world: ScriptWorld, entity: Entity) -> Self {
        Self { world, entity, marker: PhantomData }
    }

    fn read(&self, f: impl FnOnce(&T) -> Dynamic) -> Dynamic {
        let db = self.world.db().borrow();
        let value = match db.read_component::<T>(self.entity) {
            Ok(component) => f(&*component),
            Err(err) => {
                warn!(target: "bridge", "Reading {} of entity {}: {err}", T::NAME, self.entity.index());
                Dynamic::UNIT
            }
        };
        value
    }

    fn write(&self, f: impl FnOnce(&mut T)) {
        let db = self.world.db().borrow();
        let outcome = db.get_component::<T>(self.entity).map(|mut component| f(&mut *component));
        if let Err(err) = outcome {
            warn!(target: "bridge", "Writing {} of entity {}: {err}", T::NAME, self.entity.index());
        }
    }

    /// Current value, detached from the database.
    fn snapshot(&self) -> Option<T> {
        let db = self.world.db().borrow();
        let value = db.read_component::<T>(self.entity).ok().map(|component| T::clone(&component));
        value
    }
}

macro_rules! script_component {
    ($ty:ty, $name:literal { $($field:ident),* $(,)? }) => {
        impl ScriptComponent for $ty {
            const NAME: &'static str = $name;

            fn register_fields(engine: &mut Engine) {
                script_fields!(engine, $ty { $($field),* });
            }
        }
    };
}

script_component!(Position, "position" { x, y });
script_component!(Velocity, "velocity" { vx, vy });
script_component!(Aabb, "aabb" { left, right, bottom, top });
script_component!(Script, "script" { name });
script_component!(Detector, "detector" { radius, entities });
script_component!(Tower, "tower" { target, time });
script_component!(Health, "health" { max_health });
script_component!(DeathTimer, "death_timer" { time });
script_component!(FireDamage, "fire_damage" { next, rate, duration });
script_component!(Animation, "animation" { name, cycle, frame, t, scale, rot, offset_x, offset_y });
script_component!(Speed, "speed" { speed });
script_component!(Pathing, "pathing" { path, waypoint });
script_component!(Spawner, "spawner" { template, interval, next, remaining });

impl ScriptTag for EnemyTag {
    const NAME: &'static str = "enemy_tag";
}

impl ScriptTag for BulletTag {
    const NAME: &'static str = "bullet_tag";
}

pub fn register_builtin_components(scripts: &mut ScriptEngine) {
    scripts.register_component::<Position>();
    scripts.register_component::<Velocity>();
    scripts.register_component::<Aabb>();
    scripts.register_component::<Script>();
    scripts.register_component::<Detector>();
    scripts.register_component::<Tower>();
    scripts.register_component::<Health>();
    scripts.register_component::<DeathTimer>();
    scripts.register_component::<FireDamage>();
    scripts.register_component::<Animation>();
    scripts.register_component::<Speed>();
    scripts.register_component::<Pathing>();
    scripts.register_component::<Spawner>();
    scripts.register_tag::<EnemyTag>();
    scripts.register_tag::<BulletTag>();
}

pub(super) fn register_value<T: ScriptComponent>(engine: &mut Engine) {
    engine.register_type_with_name::<T>(T::NAME);
    engine.register_type_with_name::<ComponentRef<T>>(T::NAME);
    engine.register_fn(T::NAME, T::default);
    T::register_fields(engine);
    engine.register_fn(format!("create_{}", T::NAME), create_component::<T>);
    engine.register_fn(format!("create_{}", T::NAME), copy_component::<T>);
    engine.register_fn(format!("get_{}", T::NAME), get_component::<T>);
    engine.register_fn(format!("has_{}", T::NAME), has_component::<T>);
    engine.register_fn(format!("destroy_{}", T::NAME), destroy_component::<T>);
}

pub(super) fn register_tag<T: ScriptTag>(engine: &mut Engine) {
    engine.register_fn(format!("create_{}", T::NAME), create_tag::<T>);
    engine.register_fn(format!("has_{}", T::NAME), has_tag::<T>);
    engine.register_fn(format!("destroy_{}", T::NAME), destroy_tag::<T>);
}

fn create_component<T: ScriptComponent>(world: &mut ScriptWorld, entity: Entity, value: T) {
    let mut db = world.db().borrow_mut();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to add component {} to nonexistent entity {}", T::NAME, entity.index());
    }
    if let Err(err) = db.create_component(entity, value) {
        warn!(target: "bridge", "create_{}: {err}", T::NAME);
    }
}

/// Re-attaches the value a handle points at, typically to copy a component
/// from one entity to another.
fn copy_component<T: ScriptComponent>(world: &mut ScriptWorld, entity: Entity, source: ComponentRef<T>) {
    match source.snapshot() {
        Some(value) => create_component(world, entity, value),
        None => warn!(
            target: "bridge",
            "Attempting to copy component {} from entity {} which no longer has it",
            T::NAME,
            source.entity.index()
        ),
    }
}

fn get_component<T: ScriptComponent>(world: &mut ScriptWorld, entity: Entity) -> Dynamic {
    let found = {
        let db = world.db().borrow();
        if !db.exists(entity) {
            error!(target: "bridge", "Attempting to get component {} from nonexistent entity {}", T::NAME, entity.index());
            false
        } else if !db.has_component::<T>(entity) {
            error!(target: "bridge", "Attempting to get nonexistent component {} from entity {}", T::NAME, entity.index());
            false
        } else {
            true
        }
    };
    if !found {
        return Dynamic::UNIT;
    }
    Dynamic::from(ComponentRef::<T>::new(world.clone(), entity))
}

fn has_component<T: ScriptComponent>(world: &mut ScriptWorld, entity: Entity) -> bool {
    let db = world.db().borrow();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to check component {} for nonexistent entity {}", T::NAME, entity.index());
    }
    db.has_component::<T>(entity)
}

fn destroy_component<T: ScriptComponent>(world: &mut ScriptWorld, entity: Entity) -> bool {
    let mut db = world.db().borrow_mut();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to remove component {} from nonexistent entity {}", T::NAME, entity.index());
    }
    db.destroy_component::<T>(entity)
}

fn create_tag<T: ScriptTag>(world: &mut ScriptWorld, entity: Entity) {
    let mut db = world.db().borrow_mut();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to add tag {} to nonexistent entity {}", T::NAME, entity.index());
    }
    if let Err(err) = db.create_component(entity, T::default()) {
        warn!(target: "bridge", "create_{}: {err}", T::NAME);
    }
}

fn has_tag<T: ScriptTag>(world: &mut ScriptWorld, entity: Entity) -> bool {
    let db = world.db().borrow();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to check tag {} for nonexistent entity {}", T::NAME, entity.index());
    }
    db.has_component::<T>(entity)
}

fn destroy_tag<T: ScriptTag>(world: &mut ScriptWorld, entity: Entity) -> bool {
    let mut db = world.db().borrow_mut();
    if !db.exists(entity) {
        error!(target: "bridge", "Attempting to remove tag {} from nonexistent entity {}", T::NAME, entity.index());
    }
    db.destroy_component::<T>(entity)
}

impl ScriptWorld {
    fn create_entity(&mut self) -> Entity {
        self.db().borrow_mut().create_entity()
    }

    fn destroy_entity(&mut self, entity: Entity) -> bool {
        self.db().borrow_mut().destroy_entity(entity)
    }

    fn exists(&mut self, entity: Entity) -> bool {
        self.db().borrow().exists(entity)
    }

    fn spawn_entity(&mut self, description: Map) -> Dynamic {
        match self.try_spawn(Dynamic::from_map(description)) {
            Ok(entity) => Dynamic::from(entity),
            Err(err) => {
                error!(target: "bridge", "spawn_entity failed: {err:#}");
                Dynamic::UNIT
            }
        }
    }

    fn spawn_entities(&mut self, descriptions: Array) -> Array {
        descriptions
            .into_iter()
            .map(|description| match self.try_spawn(description) {
                Ok(entity) => Dynamic::from(entity),
                Err(err) => {
                    error!(target: "bridge", "spawn_entities failed: {err:#}");
                    Dynamic::UNIT
                }
            })
            .collect()
    }

    fn try_spawn(&mut self, description: Dynamic) -> anyhow::Result<Entity> {
        let json: serde_json::Value =
            rhai::serde::from_dynamic(&description).map_err(|err| anyhow::anyhow!("{err}"))?;
        let loaders = self.loaders().borrow();
        let mut db = self.db().borrow_mut();
        stage::load_entity(&mut db, &loaders, &json)
    }

    fn log(&mut self, message: ImmutableString) {
        info!(target: "script", "{message}");
    }

    fn random_range(&mut self, min: FLOAT, max: FLOAT) -> FLOAT {
        if min.partial_cmp(&max) != Some(std::cmp::Ordering::Less) {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }
}

pub(super) fn register_world_api(engine: &mut Engine) {
    engine.register_type_with_name::<Entity>("Entity");
    engine.register_get("index", |entity: &mut Entity| entity.index() as INT);
    engine.register_get("generation", |entity: &mut Entity| entity.generation() as INT);
    engine.register_fn("to_string", |entity: &mut Entity| entity.to_string());
    engine.register_fn("to_debug", |entity: &mut Entity| format!("{entity:?}"));
    engine.register_fn("==", |a: Entity, b: Entity| a == b);
    engine.register_fn("!=", |a: Entity, b: Entity| a != b);

    engine.register_type_with_name::<ScriptWorld>("World");
    engine.register_fn("create_entity", ScriptWorld::create_entity);
    engine.register_fn("destroy_entity", ScriptWorld::destroy_entity);
    engine.register_fn("exists", ScriptWorld::exists);
    engine.register_fn("spawn_entity", ScriptWorld::spawn_entity);
    engine.register_fn("spawn_entities", ScriptWorld::spawn_entities);
    engine.register_fn("log", ScriptWorld::log);
    engine.register_fn("rand", ScriptWorld::random_range);
}
