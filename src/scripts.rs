use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use bitflags::bitflags;
use log::{debug, info};
use rhai::{CallFnOptions, Dynamic, Engine, FuncArgs, Map, Scope, AST, FLOAT};

use crate::cache::ResourceCache;
use crate::config::ScriptConfig;
use crate::ecs::{Aabb, Database, Entity};
use crate::stage::ComponentLoaders;

pub mod bridge;

pub use bridge::{register_builtin_components, ScriptComponent, ScriptTag};

/// Per-entity behaviour hooks. Every hook is optional; the defaults do nothing.
pub trait Behavior {
    fn update(&self, _db: &mut Database, _entity: Entity, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn on_collide(&self, _db: &mut Database, _entity: Entity, _other: Entity, _region: &Aabb) -> Result<()> {
        Ok(())
    }

    fn on_enter(&self, _db: &mut Database, _entity: Entity, _other: Entity) -> Result<()> {
        Ok(())
    }

    fn on_leave(&self, _db: &mut Database, _entity: Entity, _other: Entity) -> Result<()> {
        Ok(())
    }

    fn on_death(&self, _db: &mut Database, _entity: Entity) -> Result<()> {
        Ok(())
    }
}

/// Behaviours keyed by script name.
pub type BehaviorCache = ResourceCache<dyn Behavior>;

bitflags! {
    /// Hooks a compiled script actually defines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HookSet: u8 {
        const UPDATE = 1;
        const ON_COLLIDE = 1 << 1;
        const ON_ENTER = 1 << 2;
        const ON_LEAVE = 1 << 3;
        const ON_DEATH = 1 << 4;
    }
}

impl HookSet {
    /// Every hook receives the world handle first, so `update(world, entity, dt)`
    /// has arity 3. A function with the right name but another arity is not a hook.
    pub fn from_ast(ast: &AST) -> Self {
        let mut hooks = HookSet::empty();
        for func in ast.iter_functions() {
            hooks |= match (func.name, func.params.len()) {
                ("update", 3) => HookSet::UPDATE,
                ("on_collide", 4) => HookSet::ON_COLLIDE,
                ("on_enter", 3) => HookSet::ON_ENTER,
                ("on_leave", 3) => HookSet::ON_LEAVE,
                ("on_death", 2) => HookSet::ON_DEATH,
                _ => continue,
            };
        }
        hooks
    }
}

/// Script-side handle to the database, exposed to rhai as `World`.
///
/// The slot only holds the live database while a hook is running; see
/// [`ScriptWorld::lend`]. Outside of that it holds an empty placeholder.
#[derive(Clone, Default)]
pub struct ScriptWorld {
    db: Rc<RefCell<Database>>,
    loaders: Rc<RefCell<ComponentLoaders>>,
}

impl ScriptWorld {
    /// Moves `db` into the shared slot for the duration of `f`, then moves it
    /// back, also when `f` unwinds.
    pub fn lend<R>(&self, db: &mut Database, f: impl FnOnce() -> R) -> R {
        std::mem::swap(db, &mut *self.db.borrow_mut());
        let _loan = Loan { slot: &self.db, db };
        f()
    }

    pub(crate) fn db(&self) -> &RefCell<Database> {
        &self.db
    }

    pub(crate) fn loaders(&self) -> &RefCell<ComponentLoaders> {
        &self.loaders
    }
}

/// Swaps the lent database back into its owner when dropped.
struct Loan<'a> {
    slot: &'a RefCell<Database>,
    db: &'a mut Database,
}

impl Drop for Loan<'_> {
    fn drop(&mut self) {
        std::mem::swap(self.db, &mut *self.slot.borrow_mut());
    }
}

struct ScriptRuntime {
    engine: RefCell<Engine>,
    world: ScriptWorld,
}

/// A compiled rhai script. Script state survives between calls through `this`,
/// which is bound to a per-behaviour object map.
pub struct RhaiBehavior {
    name: String,
    runtime: Rc<ScriptRuntime>,
    ast: AST,
    hooks: HookSet,
    scope: RefCell<Scope<'static>>,
    state: RefCell<Dynamic>,
}

impl RhaiBehavior {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn call(&self, db: &mut Database, hook: HookSet, func: &str, args: impl FuncArgs) -> Result<()> {
        if !self.hooks.contains(hook) {
            return Ok(());
        }
        let engine = self.runtime.engine.borrow();
        let mut scope = self.scope.borrow_mut();
        let mut state = self.state.borrow_mut();
        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut *state);
        self.runtime
            .world
            .lend(db, || engine.call_fn_with_options::<Dynamic>(options, &mut *scope, &self.ast, func, args))
            .map_err(|err| anyhow!("Script '{}' failed in {func}: {err}", self.name))?;
        Ok(())
    }

    fn world(&self) -> ScriptWorld {
        self.runtime.world.clone()
    }
}

impl Behavior for RhaiBehavior {
    fn update(&self, db: &mut Database, entity: Entity, dt: f32) -> Result<()> {
        self.call(db, HookSet::UPDATE, "update", (self.world(), entity, dt as FLOAT))
    }

    fn on_collide(&self, db: &mut Database, entity: Entity, other: Entity, region: &Aabb) -> Result<()> {
        self.call(db, HookSet::ON_COLLIDE, "on_collide", (self.world(), entity, other, *region))
    }

    fn on_enter(&self, db: &mut Database, entity: Entity, other: Entity) -> Result<()> {
        self.call(db, HookSet::ON_ENTER, "on_enter", (self.world(), entity, other))
    }

    fn on_leave(&self, db: &mut Database, entity: Entity, other: Entity) -> Result<()> {
        self.call(db, HookSet::ON_LEAVE, "on_leave", (self.world(), entity, other))
    }

    fn on_death(&self, db: &mut Database, entity: Entity) -> Result<()> {
        self.call(db, HookSet::ON_DEATH, "on_death", (self.world(), entity))
    }
}

/// Owns the rhai engine, the script-facing component surface and the
/// component loaders shared with stage loading.
pub struct ScriptEngine {
    runtime: Rc<ScriptRuntime>,
    config: ScriptConfig,
}

impl ScriptEngine {
    pub fn new(config: &ScriptConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        engine.on_print(|text| info!(target: "script", "{text}"));
        engine.on_debug(|text, source, pos| debug!(target: "script", "{}{pos:?} {text}", source.unwrap_or("")));
        bridge::register_world_api(&mut engine);
        let runtime = Rc::new(ScriptRuntime { engine: RefCell::new(engine), world: ScriptWorld::default() });
        Self { runtime, config: config.clone() }
    }

    /// Exposes `T` to scripts and to stage descriptions under `T::NAME`.
    pub fn register_component<T: ScriptComponent>(&mut self) {
        bridge::register_value::<T>(&mut self.runtime.engine.borrow_mut());
        self.runtime.world.loaders().borrow_mut().register::<T>(T::NAME);
    }

    pub fn register_tag<T: ScriptTag>(&mut self) {
        bridge::register_tag::<T>(&mut self.runtime.engine.borrow_mut());
        self.runtime.world.loaders().borrow_mut().register_tag::<T>(T::NAME);
    }

    /// Snapshot of the registered component loaders.
    pub fn loaders(&self) -> ComponentLoaders {
        self.runtime.world.loaders().borrow().clone()
    }

    /// Gives every registered component its script name in `db` diagnostics.
    pub fn name_components(&self, db: &mut Database) {
        self.runtime.world.loaders().borrow().name_components(db);
    }

    pub fn compile_behavior(&self, name: &str, source: &str) -> Result<Rc<RhaiBehavior>> {
        compile(&self.runtime, name, source)
    }

    /// Cache that compiles `<root>/<name>.<extension>` on first use.
    pub fn behavior_cache(&self) -> BehaviorCache {
        let runtime = Rc::clone(&self.runtime);
        let config = self.config.clone();
        ResourceCache::new(move |name| {
            let behavior: Rc<dyn Behavior> = load(&runtime, &config.path_for(name), name)?;
            Ok(behavior)
        })
    }

    /// Evaluates a one-off snippet with `world` bound to `db`.
    pub fn run(&self, db: &mut Database, source: &str) -> Result<Dynamic> {
        let engine = self.runtime.engine.borrow();
        let mut scope = Scope::new();
        scope.push("world", self.runtime.world.clone());
        self.runtime
            .world
            .lend(db, || engine.eval_with_scope::<Dynamic>(&mut scope, source))
            .map_err(|err| anyhow!("Script error: {err}"))
    }
}

fn load(runtime: &Rc<ScriptRuntime>, path: &Path, name: &str) -> Result<Rc<RhaiBehavior>> {
    let source = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    compile(runtime, name, &source).with_context(|| format!("Loading script {}", path.display()))
}

fn compile(runtime: &Rc<ScriptRuntime>, name: &str, source: &str) -> Result<Rc<RhaiBehavior>> {
    let ast = runtime.engine.borrow().compile(source).with_context(|| "Compiling Rhai script")?;
    let hooks = HookSet::from_ast(&ast);
    debug!(target: "script", "Compiled '{name}' with hooks {hooks:?}");
    Ok(Rc::new(RhaiBehavior {
        name: name.to_string(),
        runtime: Rc::clone(runtime),
        ast,
        hooks,
        scope: RefCell::new(Scope::new()),
        state: RefCell::new(Dynamic::from_map(Map::new())),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Position;

    fn engine() -> ScriptEngine {
        let mut scripts = ScriptEngine::new(&ScriptConfig::default());
        register_builtin_components(&mut scripts);
        scripts
    }

    #[test]
    fn hooks_are_detected_by_name_and_arity() {
        let scripts = engine();
        let behavior = scripts
            .compile_behavior(
                "hooked",
                "fn update(world, e, dt) {} fn on_death(world, e) {} fn on_enter(world, e) {} fn helper() {}",
            )
            .unwrap();
        assert_eq!(behavior.hooks(), HookSet::UPDATE | HookSet::ON_DEATH);
    }

    #[test]
    fn update_mutates_lent_database() {
        let scripts = engine();
        let behavior = scripts
            .compile_behavior(
                "mover",
                r#"
                fn update(world, e, dt) {
                    let p = world.get_position(e);
                    p.x += dt;
                    world.create_position(e, p);
                }
                "#,
            )
            .unwrap();
        let mut db = Database::new();
        let e = db.create_entity();
        db.create_component(e, Position::new(1.0, 0.0)).unwrap();
        behavior.update(&mut db, e, 0.5).unwrap();
        assert_eq!(*db.read_component::<Position>(e).unwrap(), Position::new(1.5, 0.0));
        assert!(db.exists(e));
    }

    #[test]
    fn this_persists_between_calls() {
        let scripts = engine();
        let behavior = scripts
            .compile_behavior(
                "counter",
                r#"
                fn update(world, e, dt) {
                    if !("calls" in this) { this.calls = 0; }
                    this.calls += 1;
                    world.create_health(e, health());
                    let h = world.get_health(e);
                    h.max_health = this.calls;
                    world.create_health(e, h);
                }
                "#,
            )
            .unwrap();
        let mut db = Database::new();
        let e = db.create_entity();
        for _ in 0..3 {
            behavior.update(&mut db, e, 0.1).unwrap();
        }
        assert_eq!(db.read_component::<crate::ecs::Health>(e).unwrap().max_health, 3);
    }

    #[test]
    fn runtime_errors_name_the_script() {
        let scripts = engine();
        let behavior = scripts.compile_behavior("broken", "fn on_death(world, e) { throw \"boom\"; }").unwrap();
        let mut db = Database::new();
        let e = db.create_entity();
        let err = behavior.on_death(&mut db, e).unwrap_err();
        assert!(err.to_string().contains("broken"));
        // The database comes back even when the hook fails.
        assert!(db.exists(e));
    }

    #[test]
    fn lend_returns_the_database_after_a_panic() {
        let world = ScriptWorld::default();
        let mut db = Database::new();
        let e = db.create_entity();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            world.lend(&mut db, || {
                assert!(world.db().borrow().exists(e));
                panic!("hook blew up");
            })
        }));
        assert!(outcome.is_err());
        assert!(db.exists(e));
        assert!(world.db().borrow().is_empty());
    }

    #[test]
    fn compile_errors_propagate() {
        let scripts = engine();
        assert!(scripts.compile_behavior("bad", "fn update(world, e, dt) {").is_err());
    }

    #[test]
    fn run_binds_world() {
        let scripts = engine();
        let mut db = Database::new();
        let value = scripts.run(&mut db, "let e = world.create_entity(); world.exists(e)").unwrap();
        assert!(value.as_bool().unwrap());
        assert_eq!(db.len(), 1);
    }
}
