use super::entity::Entity;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Any `'static` type can be attached to an entity.
pub trait Component: 'static {}
impl<T: 'static> Component for T {}

/// Shared cell holding one component value.
pub(crate) type Cell<T> = Rc<RefCell<T>>;

/// Uniform interface over the per-type sparse sets so the database can hold
/// an open-ended set of component types.
pub(crate) trait ErasedStorage {
    fn remove(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn entities(&self) -> &[Entity];
    fn len(&self) -> usize;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Sparse set keyed by entity slot.
pub(crate) struct Storage<T> {
    sparse: Vec<Option<usize>>,
    entities: Vec<Entity>,
    cells: Vec<Cell<T>>,
}

impl<T: Component> Storage<T> {
    pub fn new() -> Self {
        Self { sparse: Vec::new(), entities: Vec::new(), cells: Vec::new() }
    }

    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let dense = (*self.sparse.get(entity.index() as usize)?)?;
        (self.entities[dense] == entity).then_some(dense)
    }

    /// Installs a fresh cell, replacing any previous value. Handles to the old
    /// cell stay valid and keep observing the old value.
    pub fn insert(&mut self, entity: Entity, value: T) {
        let cell = Rc::new(RefCell::new(value));
        let slot = entity.index() as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, None);
        }
        match self.sparse[slot] {
            Some(dense) => {
                self.entities[dense] = entity;
                self.cells[dense] = cell;
            }
            None => {
                self.sparse[slot] = Some(self.entities.len());
                self.entities.push(entity);
                self.cells.push(cell);
            }
        }
    }

    pub fn cell(&self, entity: Entity) -> Option<&Cell<T>> {
        self.dense_index(entity).map(|dense| &self.cells[dense])
    }
}

impl<T: Component> ErasedStorage for Storage<T> {
    fn remove(&mut self, entity: Entity) -> bool {
        let Some(dense) = self.dense_index(entity) else {
            return false;
        };
        self.sparse[entity.index() as usize] = None;
        self.entities.swap_remove(dense);
        self.cells.swap_remove(dense);
        if let Some(moved) = self.entities.get(dense) {
            self.sparse[moved.index() as usize] = Some(dense);
        }
        true
    }

    fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn len(&self) -> usize {
        self.entities.len()
    }

    fn clear(&mut self) {
        self.sparse.clear();
        self.entities.clear();
        self.cells.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_remove_keeps_sparse_index_consistent() {
        let mut storage = Storage::<u32>::new();
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        let c = Entity::new(2, 0);
        storage.insert(a, 10);
        storage.insert(b, 20);
        storage.insert(c, 30);
        assert!(storage.remove(a));
        assert!(!storage.contains(a));
        assert_eq!(*storage.cell(c).expect("c present").borrow(), 30);
        assert_eq!(*storage.cell(b).expect("b present").borrow(), 20);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn stale_generation_does_not_match() {
        let mut storage = Storage::<u32>::new();
        storage.insert(Entity::new(3, 1), 7);
        assert!(!storage.contains(Entity::new(3, 0)));
        assert!(!storage.remove(Entity::new(3, 2)));
    }

    #[test]
    fn reinsert_replaces_cell_without_touching_old_handle() {
        let mut storage = Storage::<u32>::new();
        let e = Entity::new(0, 0);
        storage.insert(e, 1);
        let old = storage.cell(e).cloned().expect("present");
        storage.insert(e, 2);
        assert_eq!(*old.borrow(), 1);
        assert_eq!(*storage.cell(e).expect("present").borrow(), 2);
    }
}
