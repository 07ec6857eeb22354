mod database;
mod entity;
pub mod profiler;
mod query;
mod storage;
pub mod systems;
pub mod types;

pub use database::Database;
pub use entity::Entity;
pub use query::Query;
pub use storage::Component;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("entity {0} does not exist")]
    NoSuchEntity(Entity),
    #[error("entity {entity} has no {component} component")]
    MissingComponent { entity: Entity, component: &'static str },
    #[error("{component} on entity {entity} is already borrowed by a running query")]
    ComponentBorrowed { entity: Entity, component: &'static str },
}

/// Last path segment of `T`'s type name, used when no display name was registered.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_type_name_strips_module_path() {
        assert_eq!(short_type_name::<Position>(), "Position");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }
}
