use super::entity::{Entity, EntityAllocator};
use super::query::{Query, TypeList};
use super::storage::{Cell, Component, ErasedStorage, Storage};
use super::{short_type_name, DbError};
use std::any::TypeId;
use std::cell::{Ref, RefMut};
use std::collections::HashMap;

/// Entity/component database: the single source of truth for simulation state.
///
/// Component types are not declared up front. Each type gets its own sparse
/// set the first time a value of that type is attached, so types registered
/// later (for instance from the scripting layer) join the same query engine.
#[derive(Default)]
pub struct Database {
    entities: EntityAllocator,
    storages: HashMap<TypeId, Box<dyn ErasedStorage>>,
    names: HashMap<TypeId, &'static str>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self) -> Entity {
        self.entities.allocate()
    }

    pub fn exists(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Removes the entity and every component attached to it. Destroying a
    /// dead or stale handle is a no-op and returns `false`.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.entities.deallocate(entity) {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove(entity);
        }
        true
    }

    /// Destroys every entity. Handles held elsewhere become stale.
    pub fn clear(&mut self) {
        let alive: Vec<Entity> = self.entities.iter_alive().collect();
        for entity in alive {
            self.entities.deallocate(entity);
        }
        for storage in self.storages.values_mut() {
            storage.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alive entities in slot order.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.iter_alive().collect()
    }

    /// Attaches `value`, overwriting any previous `T` on the entity.
    pub fn create_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), DbError> {
        if !self.exists(entity) {
            return Err(DbError::NoSuchEntity(entity));
        }
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::new()))
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .expect("storage registered under the wrong TypeId")
            .insert(entity, value);
        Ok(())
    }

    /// Returns `true` if a component was removed.
    pub fn destroy_component<T: Component>(&mut self, entity: Entity) -> bool {
        match self.storages.get_mut(&TypeId::of::<T>()) {
            Some(storage) => storage.remove(entity),
            None => false,
        }
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.exists(entity) && self.storage::<T>().is_some_and(|storage| storage.contains(entity))
    }

    /// Exclusive access to a component. Requires `has_component::<T>(entity)`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<RefMut<'_, T>, DbError> {
        self.checked_cell::<T>(entity)?
            .try_borrow_mut()
            .map_err(|_| DbError::ComponentBorrowed { entity, component: self.component_name::<T>() })
    }

    /// Shared access to a component; succeeds while a visit holds a shared borrow.
    pub fn read_component<T: Component>(&self, entity: Entity) -> Result<Ref<'_, T>, DbError> {
        self.checked_cell::<T>(entity)?
            .try_borrow()
            .map_err(|_| DbError::ComponentBorrowed { entity, component: self.component_name::<T>() })
    }

    /// Gives `T` a display name for diagnostics.
    pub fn register_name<T: Component>(&mut self, name: &'static str) {
        self.names.insert(TypeId::of::<T>(), name);
    }

    pub fn component_name<T: Component>(&self) -> &'static str {
        self.names.get(&TypeId::of::<T>()).copied().unwrap_or_else(short_type_name::<T>)
    }

    /// Number of entities matching `Q`.
    pub fn count<Q: Query>(&self) -> usize {
        self.matching::<Q>().len()
    }

    /// Invokes `f` once for every entity holding all of `Q`'s components.
    ///
    /// The matching set is captured before the first call, in slot order.
    /// Entities created by `f` are not visited in this pass; entities destroyed
    /// by `f` (or that lose a queried component) are skipped when reached.
    pub fn visit<Q: Query>(
        &mut self,
        mut f: impl for<'a> FnMut(&mut Database, Entity, Q::Item<'a>),
    ) -> Result<(), DbError> {
        self.visit_with::<Q, DbError, _>(|db, entity, item| {
            f(db, entity, item);
            Ok(())
        })
    }

    /// Fallible [`visit`](Self::visit): the first error ends the pass.
    pub fn try_visit<Q, E, F>(&mut self, f: F) -> Result<(), E>
    where
        Q: Query,
        E: From<DbError>,
        F: for<'a> FnMut(&mut Database, Entity, Q::Item<'a>) -> Result<(), E>,
    {
        self.visit_with::<Q, E, F>(f)
    }

    fn visit_with<Q, E, F>(&mut self, mut f: F) -> Result<(), E>
    where
        Q: Query,
        E: From<DbError>,
        F: for<'a> FnMut(&mut Database, Entity, Q::Item<'a>) -> Result<(), E>,
    {
        for entity in self.matching::<Q>() {
            if !self.exists(entity) {
                continue;
            }
            let Some(cells) = Q::fetch(self, entity) else {
                continue;
            };
            let item = Q::borrow(&cells, entity)?;
            f(self, entity, item)?;
        }
        Ok(())
    }

    /// All-pairs query. `outer` receives an entity matching `A` and returns a
    /// closure that is then called for every other entity matching `B`.
    ///
    /// Each unordered pair is delivered once: `(a, b)` is skipped when `(b, a)`
    /// is also a valid pairing and `b` comes first in slot order. Self-pairs
    /// are never delivered.
    pub fn visit_pairs<A, B, G>(&self, mut outer: impl for<'a> FnMut(Entity, A::Item<'a>) -> G) -> Result<(), DbError>
    where
        A: Query,
        B: Query,
        G: for<'b> FnMut(Entity, B::Item<'b>),
    {
        let outer_set = self.matching::<A>();
        let inner_set = self.matching::<B>();
        for &a in &outer_set {
            let Some(cells_a) = A::fetch(self, a) else {
                continue;
            };
            let mut inner = outer(a, A::borrow(&cells_a, a)?);
            let a_matches_inner = inner_set.binary_search(&a).is_ok();
            for &b in &inner_set {
                if b == a {
                    continue;
                }
                if a_matches_inner && b < a && outer_set.binary_search(&b).is_ok() {
                    continue;
                }
                let Some(cells_b) = B::fetch(self, b) else {
                    continue;
                };
                inner(b, B::borrow(&cells_b, b)?);
            }
        }
        Ok(())
    }

    pub(crate) fn cell<T: Component>(&self, entity: Entity) -> Option<&Cell<T>> {
        self.storage::<T>()?.cell(entity)
    }

    fn checked_cell<T: Component>(&self, entity: Entity) -> Result<&Cell<T>, DbError> {
        if !self.exists(entity) {
            return Err(DbError::NoSuchEntity(entity));
        }
        self.cell::<T>(entity)
            .ok_or(DbError::MissingComponent { entity, component: self.component_name::<T>() })
    }

    fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages.get(&TypeId::of::<T>())?.as_any().downcast_ref::<Storage<T>>()
    }

    /// Sorted snapshot of the entities holding every component in `Q`.
    fn matching<Q: Query>(&self) -> Vec<Entity> {
        let mut types = TypeList::new();
        Q::push_types(&mut types);
        let mut storages = Vec::with_capacity(types.len());
        for ty in &types {
            match self.storages.get(ty) {
                Some(storage) => storages.push(storage.as_ref()),
                None => return Vec::new(),
            }
        }
        let Some(driver) = storages.iter().min_by_key(|storage| storage.len()) else {
            return self.entities();
        };
        let mut matched: Vec<Entity> = driver
            .entities()
            .iter()
            .copied()
            .filter(|&entity| storages.iter().all(|storage| storage.contains(entity)))
            .collect();
        matched.sort_unstable();
        matched
    }
}
