use super::database::Database;
use super::entity::Entity;
use super::storage::{Cell, Component};
use super::{short_type_name, DbError};
use smallvec::SmallVec;
use std::any::TypeId;
use std::cell::{Ref, RefMut};

pub(crate) type TypeList = SmallVec<[TypeId; 6]>;

/// A component signature: `&T` for shared access, `&mut T` for exclusive
/// access, or a tuple of those.
///
/// Fetching clones the component cells, so an item stays valid even if the
/// entity is destroyed while the callback that received it is still running.
pub trait Query {
    type Cells: 'static;
    type Item<'a>;

    fn push_types(types: &mut TypeList);
    fn fetch(db: &Database, entity: Entity) -> Option<Self::Cells>;
    fn borrow<'a>(cells: &'a Self::Cells, entity: Entity) -> Result<Self::Item<'a>, DbError>;
}

impl<'q, T: Component> Query for &'q T {
    type Cells = Cell<T>;
    type Item<'a> = Ref<'a, T>;

    fn push_types(types: &mut TypeList) {
        types.push(TypeId::of::<T>());
    }

    fn fetch(db: &Database, entity: Entity) -> Option<Self::Cells> {
        db.cell::<T>(entity).cloned()
    }

    fn borrow<'a>(cells: &'a Self::Cells, entity: Entity) -> Result<Self::Item<'a>, DbError> {
        cells
            .try_borrow()
            .map_err(|_| DbError::ComponentBorrowed { entity, component: short_type_name::<T>() })
    }
}

impl<'q, T: Component> Query for &'q mut T {
    type Cells = Cell<T>;
    type Item<'a> = RefMut<'a, T>;

    fn push_types(types: &mut TypeList) {
        types.push(TypeId::of::<T>());
    }

    fn fetch(db: &Database, entity: Entity) -> Option<Self::Cells> {
        db.cell::<T>(entity).cloned()
    }

    fn borrow<'a>(cells: &'a Self::Cells, entity: Entity) -> Result<Self::Item<'a>, DbError> {
        cells
            .try_borrow_mut()
            .map_err(|_| DbError::ComponentBorrowed { entity, component: short_type_name::<T>() })
    }
}

macro_rules! impl_query_tuple {
    ($($name:ident),+) => {
        impl<$($name: Query),+> Query for ($($name,)+) {
            type Cells = ($($name::Cells,)+);
            type Item<'a> = ($($name::Item<'a>,)+);

            fn push_types(types: &mut TypeList) {
                $($name::push_types(types);)+
            }

            fn fetch(db: &Database, entity: Entity) -> Option<Self::Cells> {
                Some(($($name::fetch(db, entity)?,)+))
            }

            #[allow(non_snake_case)]
            fn borrow<'a>(cells: &'a Self::Cells, entity: Entity) -> Result<Self::Item<'a>, DbError> {
                let ($($name,)+) = cells;
                Ok(($($name::borrow($name, entity)?,)+))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
