use log::{Level, LevelFilter, Log, Metadata, Record};
use rampart::config::ScriptConfig;
use rampart::ecs::Database;
use rampart::scripts::{register_builtin_components, ScriptEngine};
use std::cell::RefCell;
use std::sync::Once;

struct Captured {
    level: Level,
    target: String,
    message: String,
}

thread_local! {
    static RECORDS: RefCell<Vec<Captured>> = RefCell::new(Vec::new());
}

/// Keeps records per thread so parallel tests only see their own output.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records.borrow_mut().push(Captured {
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            })
        });
    }

    fn flush(&self) {}
}

fn capture(f: impl FnOnce()) -> Vec<Captured> {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_boxed_logger(Box::new(CaptureLogger)).expect("no other logger installed");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
    f();
    RECORDS.with(|records| records.take())
}

fn engine() -> ScriptEngine {
    let mut scripts = ScriptEngine::new(&ScriptConfig::default());
    register_builtin_components(&mut scripts);
    scripts
}

fn assert_reported(records: &[Captured], needle: &str) {
    let found = records
        .iter()
        .any(|r| r.target == "bridge" && r.level <= Level::Warn && r.message.contains(needle));
    let seen: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
    assert!(found, "no bridge warning containing {needle:?} in {seen:#?}");
}

#[test]
fn dead_handles_are_reported_for_every_operation() {
    let scripts = engine();
    let mut db = Database::new();
    let records = capture(|| {
        scripts
            .run(
                &mut db,
                r#"
                    let e = world.create_entity();
                    world.destroy_entity(e);
                    world.create_position(e, position());
                    world.get_position(e);
                    world.has_position(e);
                    world.destroy_position(e);
                    world.create_enemy_tag(e);
                    world.has_enemy_tag(e);
                    world.destroy_enemy_tag(e);
                    "still running"
                "#,
            )
            .expect("misuse is not an exception");
    });

    assert_reported(&records, "add component position to nonexistent entity");
    assert_reported(&records, "get component position from nonexistent entity");
    assert_reported(&records, "check component position for nonexistent entity");
    assert_reported(&records, "remove component position from nonexistent entity");
    assert_reported(&records, "add tag enemy_tag to nonexistent entity");
    assert_reported(&records, "check tag enemy_tag for nonexistent entity");
    assert_reported(&records, "remove tag enemy_tag from nonexistent entity");
    assert!(db.is_empty());
}

#[test]
fn missing_components_and_bad_field_values_are_reported() {
    let scripts = engine();
    let mut db = Database::new();
    let records = capture(|| {
        scripts
            .run(
                &mut db,
                r#"
                    let e = world.create_entity();
                    world.get_health(e);
                    world.create_velocity(e, velocity());
                    let v = world.get_velocity(e);
                    v.vx = "fast";
                    world.destroy_velocity(e);
                    v.vy = 1.0;
                "#,
            )
            .expect("misuse is not an exception");
    });

    assert_reported(&records, "get nonexistent component health");
    assert_reported(&records, "wrong type for velocity.vx");
    assert_reported(&records, "Writing velocity");
}

#[test]
fn failed_spawns_are_reported() {
    let scripts = engine();
    let mut db = Database::new();
    let records = capture(|| {
        scripts.run(&mut db, "world.spawn_entity(#{ turret: #{} })").expect("soft failure");
    });
    assert_reported(&records, "Unknown component 'turret'");
    assert!(db.is_empty());
}
