use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::ecs::{Component, Database, Entity};

type LoadFn = fn(&mut Database, Entity, &Value) -> Result<()>;
type NameFn = fn(&mut Database, &'static str);

#[derive(Clone, Copy)]
struct Loader {
    load: LoadFn,
    name: NameFn,
}

/// Maps a component's data name (`"position"`, `"enemy_tag"`, ...) to the code
/// that builds it from a JSON description and attaches it to an entity.
#[derive(Clone, Default)]
pub struct ComponentLoaders {
    loaders: BTreeMap<&'static str, Loader>,
}

impl ComponentLoaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Component + DeserializeOwned>(&mut self, name: &'static str) {
        self.loaders.insert(name, Loader { load: load_value::<T>, name: name_type::<T> });
    }

    /// Tags carry no data; any JSON value marks presence.
    pub fn register_tag<T: Component + Default>(&mut self, name: &'static str) {
        self.loaders.insert(name, Loader { load: load_tag::<T>, name: name_type::<T> });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.loaders.keys().copied()
    }

    /// Registers every known component's data name with the database so that
    /// diagnostics use the names stage files use.
    pub fn name_components(&self, db: &mut Database) {
        for (&name, loader) in &self.loaders {
            (loader.name)(db, name);
        }
    }

    pub fn load_component(&self, db: &mut Database, entity: Entity, name: &str, value: &Value) -> Result<()> {
        let loader = self.loaders.get(name).ok_or_else(|| {
            anyhow!("Unknown component '{name}' (known: {})", self.names().collect::<Vec<_>>().join(", "))
        })?;
        (loader.load)(db, entity, value).with_context(|| format!("Loading component '{name}'"))
    }
}

fn load_value<T: Component + DeserializeOwned>(db: &mut Database, entity: Entity, value: &Value) -> Result<()> {
    let component: T = serde_json::from_value(value.clone())?;
    db.create_component(entity, component)?;
    Ok(())
}

fn load_tag<T: Component + Default>(db: &mut Database, entity: Entity, _value: &Value) -> Result<()> {
    db.create_component(entity, T::default())?;
    Ok(())
}

fn name_type<T: Component>(db: &mut Database, name: &'static str) {
    db.register_name::<T>(name);
}

/// Builds one entity from a `{ "<component>": { fields... }, ... }` object.
/// Nothing is left behind if any component fails to load.
pub fn load_entity(db: &mut Database, loaders: &ComponentLoaders, description: &Value) -> Result<Entity> {
    let Some(fields) = description.as_object() else {
        bail!("Entity description must be a JSON object, got {description}");
    };
    let entity = db.create_entity();
    for (name, value) in fields {
        if let Err(err) = loaders.load_component(db, entity, name, value) {
            db.destroy_entity(entity);
            return Err(err);
        }
    }
    Ok(entity)
}

/// Loads each description in order. Stops at the first failure; entities
/// built before it stay in the database.
pub fn load_entities(db: &mut Database, loaders: &ComponentLoaders, descriptions: &[Value]) -> Result<Vec<Entity>> {
    descriptions
        .iter()
        .enumerate()
        .map(|(index, description)| {
            load_entity(db, loaders, description).with_context(|| format!("Entity #{index}"))
        })
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<Value>,
}

impl Stage {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("Reading stage {}", path.display()))?;
        let stage = Self::parse(&text).with_context(|| format!("Parsing stage {}", path.display()))?;
        debug!(target: "stage", "Loaded stage '{}' ({} entities) from {}", stage.name, stage.entities.len(), path.display());
        Ok(stage)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn spawn(&self, db: &mut Database, loaders: &ComponentLoaders) -> Result<Vec<Entity>> {
        load_entities(db, loaders, &self.entities).with_context(|| format!("Spawning stage '{}'", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EnemyTag, Health, Position};
    use serde_json::json;

    fn loaders() -> ComponentLoaders {
        let mut loaders = ComponentLoaders::new();
        loaders.register::<Position>("position");
        loaders.register::<Health>("health");
        loaders.register_tag::<EnemyTag>("enemy_tag");
        loaders
    }

    #[test]
    fn builds_entity_with_defaults_for_missing_fields() {
        let mut db = Database::new();
        let entity =
            load_entity(&mut db, &loaders(), &json!({ "position": { "x": 2.0 }, "enemy_tag": {} })).unwrap();
        assert_eq!(*db.read_component::<Position>(entity).unwrap(), Position::new(2.0, 0.0));
        assert!(db.has_component::<EnemyTag>(entity));
        assert!(!db.has_component::<Health>(entity));
    }

    #[test]
    fn unknown_component_removes_partial_entity() {
        let mut db = Database::new();
        let err = load_entity(&mut db, &loaders(), &json!({ "health": { "max_health": 3 }, "wings": {} }))
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Unknown component 'wings'"), "{message}");
        assert!(message.contains("known: "), "{message}");
        assert!(message.contains("health"), "{message}");
        assert!(db.is_empty());
    }

    #[test]
    fn non_object_description_is_rejected() {
        let mut db = Database::new();
        assert!(load_entity(&mut db, &loaders(), &json!([1, 2])).is_err());
        assert!(db.is_empty());
    }

    #[test]
    fn malformed_field_names_the_component() {
        let mut db = Database::new();
        let err = load_entity(&mut db, &loaders(), &json!({ "health": { "max_health": "lots" } })).unwrap_err();
        assert!(format!("{err:#}").contains("Loading component 'health'"));
    }

    #[test]
    fn stage_spawns_all_entities() {
        let stage = Stage::parse(
            r#"{ "name": "test", "entities": [ { "position": {} }, { "position": { "y": 1.0 }, "enemy_tag": true } ] }"#,
        )
        .unwrap();
        let mut db = Database::new();
        let spawned = stage.spawn(&mut db, &loaders()).unwrap();
        assert_eq!(spawned.len(), 2);
        assert_eq!(db.count::<(&Position, &EnemyTag)>(), 1);
    }

    #[test]
    fn component_names_reach_the_database() {
        let mut db = Database::new();
        loaders().name_components(&mut db);
        assert_eq!(db.component_name::<EnemyTag>(), "enemy_tag");
    }
}
