use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Context, Result};

type Factory<V> = Box<dyn FnMut(&str) -> Result<Rc<V>>>;

/// Memoizing loader keyed by name. Values are produced on first request and
/// kept for the lifetime of the cache; there is no eviction.
pub struct ResourceCache<V: ?Sized> {
    entries: HashMap<String, Rc<V>>,
    factory: Factory<V>,
}

impl<V: ?Sized> ResourceCache<V> {
    pub fn new(factory: impl FnMut(&str) -> Result<Rc<V>> + 'static) -> Self {
        Self { entries: HashMap::new(), factory: Box::new(factory) }
    }

    /// Returns the cached handle for `key`, running the factory on first use.
    /// A failed load is not cached, so the next request retries.
    pub fn get(&mut self, key: &str) -> Result<Rc<V>> {
        if let Some(value) = self.entries.get(key) {
            return Ok(Rc::clone(value));
        }
        let value = (self.factory)(key).with_context(|| format!("Loading resource '{key}'"))?;
        self.entries.insert(key.to_string(), Rc::clone(&value));
        Ok(value)
    }

    /// Seeds `key` without consulting the factory. Replaces any cached value.
    pub fn insert(&mut self, key: impl Into<String>, value: Rc<V>) {
        self.entries.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn factory_runs_once_per_key() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut cache = ResourceCache::<String>::new(move |key| {
            counter.set(counter.get() + 1);
            Ok(Rc::new(key.to_uppercase()))
        });
        let first = cache.get("x").unwrap();
        let second = cache.get("x").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        cache.get("y").unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_loads_are_retried() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut cache = ResourceCache::<u32>::new(move |_| {
            counter.set(counter.get() + 1);
            anyhow::bail!("not ready")
        });
        let err = cache.get("x").unwrap_err();
        assert!(format!("{err:#}").contains("Loading resource 'x'"));
        assert!(cache.get("x").is_err());
        assert_eq!(calls.get(), 2);
        assert!(!cache.contains("x"));
    }

    #[test]
    fn inserted_values_bypass_the_factory() {
        let mut cache = ResourceCache::<u32>::new(|_| anyhow::bail!("factory disabled"));
        cache.insert("seeded", Rc::new(7));
        assert_eq!(*cache.get("seeded").unwrap(), 7);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["seeded"]);
    }
}
